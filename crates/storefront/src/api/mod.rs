//! HTTP client for the MangaVerse shop API.
//!
//! Every call goes through [`ApiClient`], which attaches the stored bearer
//! token, classifies failures into [`ApiError`], and clears the token when the
//! API rejects the session.

use std::sync::Arc;

use reqwest::{Method, RequestBuilder, StatusCode};
use secrecy::ExposeSecret;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::config::StorefrontConfig;
use crate::error::{ApiError, ErrorBody, Result};
use crate::token::TokenStore;

/// Whether `path` is an authentication endpoint.
///
/// Those are sent without a bearer token, and a 401/403 from them means bad
/// credentials rather than an expired session.
#[must_use]
pub fn is_public(path: &str) -> bool {
    path.contains("login") || path.contains("register")
}

// =============================================================================
// ApiClient
// =============================================================================

/// Client for the shop API.
///
/// Cheap to clone; clones share the connection pool and token store.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ApiClientInner>,
}

struct ApiClientInner {
    client: reqwest::Client,
    base: String,
    tokens: Arc<dyn TokenStore>,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base", &self.inner.base)
            .field("tokens", &self.inner.tokens)
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    /// Create a client for the configured API.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::InvalidRequest`] if the HTTP client cannot be built.
    pub fn new(config: &StorefrontConfig, tokens: Arc<dyn TokenStore>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .user_agent(concat!("mangaverse/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ApiError::InvalidRequest(e.to_string()))?;

        Ok(Self {
            inner: Arc::new(ApiClientInner {
                client,
                base: config.api_url.as_str().trim_end_matches('/').to_string(),
                tokens,
            }),
        })
    }

    /// The token store this client reads from and clears.
    #[must_use]
    pub fn tokens(&self) -> &Arc<dyn TokenStore> {
        &self.inner.tokens
    }

    /// The API base URL, without a trailing slash.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.inner.base
    }

    /// Absolute URL for an API path.
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.inner.base, path.trim_start_matches('/'))
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self.inner.client.request(method, self.url(path));
        if is_public(path) {
            return builder;
        }
        match self.inner.tokens.load() {
            Some(token) => builder.bearer_auth(token.expose_secret()),
            None => builder,
        }
    }

    /// Send a request and return the raw body of a successful response.
    async fn execute(&self, path: &str, builder: RequestBuilder) -> Result<String> {
        let response = builder.send().await.map_err(ApiError::Network)?;
        let status = response.status();
        let body = response.text().await.map_err(ApiError::Network)?;

        if status.is_success() {
            return Ok(body);
        }

        if matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) && !is_public(path) {
            warn!(%status, path, "Session rejected, clearing stored token");
            if let Err(e) = self.inner.tokens.clear() {
                warn!(error = %e, "Failed to clear stored token");
            }
            return Err(ApiError::Unauthorized { status });
        }

        debug!(
            %status,
            path,
            body = %body.chars().take(200).collect::<String>(),
            "API returned non-success status"
        );
        Err(ApiError::Server {
            status,
            message: ErrorBody::message_from(&body),
        })
    }

    fn decode<T: DeserializeOwned>(body: &str) -> Result<T> {
        // Some write endpoints answer 200/204 with nothing at all.
        let body = if body.trim().is_empty() { "null" } else { body };
        Ok(serde_json::from_str(body)?)
    }

    /// GET `path` and decode the JSON body.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] on transport failure, non-success status, or a
    /// body that does not decode into `T`.
    #[instrument(skip(self))]
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let body = self.execute(path, self.request(Method::GET, path)).await?;
        Self::decode(&body)
    }

    /// POST a JSON body and decode the JSON response.
    ///
    /// # Errors
    ///
    /// See [`ApiClient::get`].
    #[instrument(skip(self, body))]
    pub async fn post<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        let body = self
            .execute(path, self.request(Method::POST, path).json(body))
            .await?;
        Self::decode(&body)
    }

    /// PUT a JSON body and decode the JSON response.
    ///
    /// # Errors
    ///
    /// See [`ApiClient::get`].
    #[instrument(skip(self, body))]
    pub async fn put<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        let body = self
            .execute(path, self.request(Method::PUT, path).json(body))
            .await?;
        Self::decode(&body)
    }

    /// POST a JSON body, ignoring whatever the server answers on success.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] on transport failure or non-success status.
    #[instrument(skip(self, body))]
    pub async fn post_unit<B>(&self, path: &str, body: &B) -> Result<()>
    where
        B: Serialize + ?Sized + Sync,
    {
        self.execute(path, self.request(Method::POST, path).json(body))
            .await
            .map(drop)
    }

    /// PUT a JSON body, ignoring whatever the server answers on success.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] on transport failure or non-success status.
    #[instrument(skip(self, body))]
    pub async fn put_unit<B>(&self, path: &str, body: &B) -> Result<()>
    where
        B: Serialize + ?Sized + Sync,
    {
        self.execute(path, self.request(Method::PUT, path).json(body))
            .await
            .map(drop)
    }

    /// DELETE `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] on transport failure or non-success status.
    #[instrument(skip(self))]
    pub async fn delete(&self, path: &str) -> Result<()> {
        self.execute(path, self.request(Method::DELETE, path))
            .await
            .map(drop)
    }

    /// POST a multipart form. The response body is returned as loose JSON,
    /// or `null` when it is not JSON.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] on transport failure or non-success status.
    #[instrument(skip(self, form))]
    pub async fn post_multipart(&self, path: &str, form: reqwest::multipart::Form) -> Result<Value> {
        let body = self
            .execute(path, self.request(Method::POST, path).multipart(form))
            .await?;
        Ok(serde_json::from_str(&body).unwrap_or(Value::Null))
    }

    /// GET each path in turn and return the first body that `accept` takes.
    ///
    /// A path is skipped when it fails or when `accept` returns `None` for
    /// its body. `Ok(None)` means every path was skipped.
    ///
    /// # Errors
    ///
    /// Stops at the first terminal error (see [`ApiError::is_terminal`]).
    pub async fn first_success<T, F>(&self, paths: &[&str], accept: F) -> Result<Option<(String, T)>>
    where
        F: Fn(Value) -> Option<T>,
    {
        for path in paths {
            match self.get::<Value>(path).await {
                Ok(body) => match accept(body) {
                    Some(value) => return Ok(Some(((*path).to_string(), value))),
                    None => debug!(path, "Response had an unexpected shape, trying next endpoint"),
                },
                Err(e) if e.is_terminal() => return Err(e),
                Err(e) => debug!(path, error = %e, "Endpoint failed, trying next"),
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::token::MemoryTokenStore;

    fn client(base: &str) -> ApiClient {
        let config = StorefrontConfig::for_api(&url::Url::parse(base).unwrap()).unwrap();
        ApiClient::new(&config, Arc::new(MemoryTokenStore::new())).unwrap()
    }

    #[test]
    fn test_is_public() {
        assert!(is_public("/login"));
        assert!(is_public("/register"));
        assert!(!is_public("/carrinho"));
        assert!(!is_public("/produtos"));
    }

    #[test]
    fn test_url_join() {
        let api = client("http://localhost:8000/");
        assert_eq!(api.url("/produtos"), "http://localhost:8000/produtos");
        assert_eq!(api.url("carrinho"), "http://localhost:8000/carrinho");

        let nested = client("http://localhost:8000/api");
        assert_eq!(nested.url("/me"), "http://localhost:8000/api/me");
    }

    #[test]
    fn test_decode_empty_body() {
        let value: Value = ApiClient::decode("").unwrap();
        assert!(value.is_null());
        let value: Option<Vec<u8>> = ApiClient::decode("  ").unwrap();
        assert!(value.is_none());
    }
}
