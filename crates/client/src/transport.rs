//! Authenticated JSON requests against one base URL.

use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::types::MatrixErrorBody;

/// User agent sent with every request.
pub const USER_AGENT: &str = "provider-matrix";

/// Build the HTTP client shared by the standard and admin transports.
pub(crate) fn build_http_client(config: &ClientConfig) -> Result<reqwest::Client> {
    let mut auth = HeaderValue::from_str(&format!("Bearer {}", config.access_token))
        .map_err(|e| Error::config_error(format!("access token is not a valid header: {e}")))?;
    auth.set_sensitive(true);

    let mut headers = HeaderMap::new();
    headers.insert(AUTHORIZATION, auth);

    reqwest::Client::builder()
        .timeout(config.timeout)
        .user_agent(USER_AGENT)
        .default_headers(headers)
        .build()
        .map_err(|e| Error::config_error(format!("failed to build HTTP client: {e}")))
}

#[derive(Debug, Clone)]
pub(crate) struct Transport {
    http: reqwest::Client,
    base: Url,
}

impl Transport {
    pub(crate) const fn new(http: reqwest::Client, base: Url) -> Self {
        Self { http, base }
    }

    /// Append percent-encoded path segments to the base URL.
    pub(crate) fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|()| {
                Error::config_error(format!("{} cannot be used as a base URL", self.base))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    pub(crate) async fn get<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        url: Url,
    ) -> Result<T> {
        self.execute(operation, self.http.get(url)).await
    }

    pub(crate) async fn send<B, T>(
        &self,
        operation: &'static str,
        method: Method,
        url: Url,
        body: &B,
    ) -> Result<T>
    where
        B: Serialize + Sync + ?Sized,
        T: DeserializeOwned,
    {
        self.execute(operation, self.http.request(method, url).json(body))
            .await
    }

    pub(crate) async fn delete<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        url: Url,
    ) -> Result<T> {
        self.execute(operation, self.http.delete(url)).await
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        request: RequestBuilder,
    ) -> Result<T> {
        let response = request
            .send()
            .await
            .map_err(|e| Error::transport(operation, e))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| Error::transport(operation, e))?;

        debug!(operation, status = status.as_u16(), "Homeserver responded");

        if !status.is_success() {
            return Err(api_error(operation, status, &body));
        }

        let body: &[u8] = if body.is_empty() { b"null" } else { &body };
        serde_json::from_slice(body).map_err(|e| Error::decode(operation, e.to_string()))
    }
}

/// Turn an error response into [`Error::Api`], keeping the Matrix `errcode`.
fn api_error(operation: &'static str, status: StatusCode, body: &[u8]) -> Error {
    let parsed: MatrixErrorBody = serde_json::from_slice(body).unwrap_or_default();

    let message = parsed
        .error
        .or_else(|| {
            let text = String::from_utf8_lossy(body).trim().to_string();
            (!text.is_empty()).then_some(text)
        })
        .or_else(|| status.canonical_reason().map(str::to_string))
        .unwrap_or_default();

    Error::api(operation, status.as_u16(), parsed.errcode, message)
}
