//! Authenticated HTTP client

use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

use questadmin_session::TokenProvider;

use crate::error::ApiError;
use crate::Result;

type UnauthorizedHandler = Arc<dyn Fn() + Send + Sync>;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

pub struct ApiClient {
    http: reqwest::Client,
    /// Always ends in `/`, so relative paths append instead of replacing
    base_url: Url,
    tokens: Arc<dyn TokenProvider>,
    timeout: Duration,
    on_unauthorized: Option<UnauthorizedHandler>,
}

impl ApiClient {
    pub fn new(base_url: Url, tokens: Arc<dyn TokenProvider>) -> Result<Self> {
        let http = reqwest::Client::builder().build()?;

        Ok(Self {
            http,
            base_url: with_trailing_slash(base_url),
            tokens,
            timeout: DEFAULT_TIMEOUT,
            on_unauthorized: None,
        })
    }

    /// Per-request timeout, 30 seconds unless set
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Called once for every response with status 401
    pub fn with_unauthorized_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.on_unauthorized = Some(Arc::new(handler));
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Resolve `path` against the base URL.
    ///
    /// Absolute and scheme-relative URLs are refused, as is anything that
    /// resolves outside the base origin: the bearer token only goes to the
    /// configured backend.
    pub fn url(&self, path: &str) -> Result<Url> {
        if path.starts_with("//") || Url::parse(path).is_ok() {
            return Err(ApiError::ForeignUrl(path.to_string()));
        }

        let url = self.base_url.join(path.trim_start_matches('/'))?;
        if url.origin() != self.base_url.origin() {
            return Err(ApiError::ForeignUrl(path.to_string()));
        }
        Ok(url)
    }

    /// Start a request, attaching the bearer token if one is available
    pub fn request(&self, method: Method, path: &str) -> Result<RequestBuilder> {
        let url = self.url(path)?;
        let builder = self.http.request(method, url).timeout(self.timeout);

        Ok(match self.tokens.token() {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        })
    }

    pub async fn send(&self, builder: RequestBuilder) -> Result<Response> {
        let response = builder.send().await?;
        let status = response.status();

        if status == StatusCode::UNAUTHORIZED {
            tracing::warn!(url = %response.url(), "Request rejected as unauthorized");
            if let Some(handler) = &self.on_unauthorized {
                handler();
            }
            return Err(ApiError::Unauthorized);
        }

        if !status.is_success() {
            let url = response.url().clone();
            let body = response.text().await.unwrap_or_default();
            tracing::debug!(url = %url, status = status.as_u16(), "Request failed");
            return Err(ApiError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response)
    }

    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self.send(self.request(Method::GET, path)?).await?;
        Ok(response.json().await?)
    }

    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let builder = self.request(Method::POST, path)?.json(body);
        let response = self.send(builder).await?;
        Ok(response.json().await?)
    }

    pub async fn delete(&self, path: &str) -> Result<()> {
        self.send(self.request(Method::DELETE, path)?).await?;
        Ok(())
    }
}

impl Clone for ApiClient {
    fn clone(&self) -> Self {
        Self {
            http: self.http.clone(),
            base_url: self.base_url.clone(),
            tokens: Arc::clone(&self.tokens),
            timeout: self.timeout,
            on_unauthorized: self.on_unauthorized.clone(),
        }
    }
}

fn with_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}
