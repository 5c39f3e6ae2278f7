//! Authenticated HTTP client for the Microsoft Graph API.
//!
//! `GraphClient` wraps a `reqwest::Client` and a `TokenProvider` behind a
//! `Mutex`, providing ergonomic JSON-based request helpers (`get`, `post`,
//! `patch`, `delete`).
//!
//! Token lifecycle:
//! - Lazy acquisition: the first request that finds no cached token triggers
//!   `refresh_token()` automatically via `bearer_token()`.
//! - Expiry-aware: `TokenProvider::token()` returns `None` when the cached
//!   token has expired, which triggers a fresh refresh on the next request.
//! - One-shot 401 retry: if Graph returns `401 Unauthorized` (e.g. because
//!   the token was revoked server-side before our local expiry check caught
//!   it), the client invalidates the cached token, refreshes once, and
//!   retries the request exactly once. A second 401 is treated as a hard
//!   failure — no infinite retry loop.
//!
//! There is deliberately no throttling/backoff layer here: backup runs are
//! sequential and low-volume, and batch calls keep the request count small.

use reqwest::{Client, Method, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use std::time::Duration;
use tokio::sync::Mutex;

use crate::auth::TokenProvider;
use crate::error::{GraphError, Result};

/// Microsoft Graph beta endpoint. Intune device-management resources
/// (`deviceManagementScripts`, `deviceHealthScripts`, partner connections,
/// audit events) are only fully exposed on beta.
const BASE_URL: &str = "https://graph.microsoft.com/beta/";

/// Connect timeout for the Graph API HTTP client.
/// Covers TCP + TLS handshake only. 10 seconds is generous for Azure services.
const API_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Overall request timeout for Graph API calls.
/// Covers the full round-trip including response body download. Batch
/// responses carrying twenty script payloads can run to several MB, so
/// this is set well above the typical single-object response time.
const API_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Builds a `reqwest::Client` with explicit timeouts for Graph API calls.
///
/// Separating this from the `TokenProvider`'s client allows different
/// timeout policies: token requests are small and fast, while batch
/// requests may carry large embedded script payloads.
fn build_api_client() -> Client {
    Client::builder()
        .connect_timeout(API_CONNECT_TIMEOUT)
        .timeout(API_REQUEST_TIMEOUT)
        .build()
        .expect("failed to build HTTP client for Graph API")
}

/// Authenticated HTTP client for the Microsoft Graph REST API.
///
/// Design decisions:
/// - `auth` is behind a `Mutex` because `refresh_token()` requires `&mut self`
///   while API methods only need `&self`. The lock is held only for the brief
///   token check/refresh, never across an HTTP round-trip.
/// - `base_url` is stored as a `String` rather than a `&'static str` so it
///   can be overridden in tests (e.g. pointing at a wiremock server).
pub struct GraphClient {
    client: Client,
    base_url: String,
    auth: Mutex<TokenProvider>,
}

impl GraphClient {
    pub fn new(auth: TokenProvider) -> Self {
        GraphClient {
            client: build_api_client(),
            base_url: BASE_URL.to_string(),
            auth: Mutex::new(auth),
        }
    }

    /// Constructor that accepts a custom base URL, used by tests to point
    /// at a local mock server instead of the real Graph API.
    pub fn with_base_url(auth: TokenProvider, base_url: &str) -> Self {
        GraphClient {
            client: build_api_client(),
            base_url: base_url.to_string(),
            auth: Mutex::new(auth),
        }
    }

    /// Returns a valid bearer token, refreshing if none is cached or if the
    /// current token has expired.
    ///
    /// The mutex is held only for the token check and optional refresh.
    /// If refresh itself fails, the error propagates to the caller.
    async fn bearer_token(&self) -> Result<String> {
        let mut auth = self.auth.lock().await;
        if auth.token().is_none() {
            auth.refresh_token().await?;
        }

        auth.token()
            .map(str::to_owned)
            .ok_or_else(|| GraphError::Auth {
                message: "token missing after refresh".to_string(),
                source: None,
            })
    }

    /// Invalidates the current token and acquires a fresh one from Azure AD.
    ///
    /// Called when the API returns 401, indicating the token was rejected
    /// server-side (revocation, clock skew, etc.) before our local expiry
    /// tracking detected it.
    async fn force_refresh(&self) -> Result<String> {
        let mut auth = self.auth.lock().await;
        auth.invalidate();
        auth.refresh_token().await?;

        auth.token()
            .map(str::to_owned)
            .ok_or_else(|| GraphError::Auth {
                message: "token missing after forced refresh".to_string(),
                source: None,
            })
    }

    /// Core HTTP method: sends an authenticated JSON request and returns the
    /// response body. All verb-specific methods (`get`, `post`, `patch`,
    /// `delete`) delegate here.
    ///
    /// `path` is relative to `base_url` (no leading slash needed).
    /// `body` is serialized as JSON when present; omitted for GET/DELETE.
    ///
    /// 401 retry behavior:
    /// - If the response is `401 Unauthorized`, the client assumes the token
    ///   was rejected server-side. It invalidates the cached token, acquires
    ///   a fresh one, and retries the request exactly once.
    /// - If the retry also returns 401, the error propagates to the caller.
    /// - Non-401 error status codes (403, 404, 500, etc.) are never retried
    ///   and surface as `GraphError::Api` with the response body preserved.
    async fn send_json<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<(StatusCode, String)> {
        let url = format!("{}{}", self.base_url, path);

        // First attempt with current (possibly cached) token.
        let token = self.bearer_token().await?;
        let resp = self
            .build_request(method.clone(), &url, &token, body)
            .send()
            .await?;

        // On 401, force a token refresh and retry exactly once.
        // Any other status (success or non-401 error) skips the retry path.
        let resp = if resp.status() == StatusCode::UNAUTHORIZED {
            let fresh_token = self.force_refresh().await?;
            self.build_request(method, &url, &fresh_token, body)
                .send()
                .await?
        } else {
            resp
        };

        // Read the body before checking status so Graph's error details
        // (error.code / error.message) survive into the error value.
        let status = resp.status();
        let text = resp.text().await?;

        if !status.is_success() {
            return Err(GraphError::Api { status, body: text });
        }

        Ok((status, text))
    }

    /// Constructs an authenticated request builder with optional JSON body.
    ///
    /// Factored out of `send_json` so the first attempt and retry can both
    /// build requests without duplicating the header/body attachment logic.
    fn build_request<B: Serialize + ?Sized>(
        &self,
        method: Method,
        url: &str,
        token: &str,
        body: Option<&B>,
    ) -> reqwest::RequestBuilder {
        let mut req = self.client.request(method, url).bearer_auth(token);
        if let Some(payload) = body {
            req = req.json(payload);
        }
        req
    }

    /// Sends an authenticated GET request and deserializes the JSON response.
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let (_, text) = self.send_json::<()>(Method::GET, path, None).await?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Sends an authenticated POST request with a JSON body and deserializes
    /// the response.
    pub async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let (_, text) = self.send_json(Method::POST, path, Some(body)).await?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Sends an authenticated POST whose success response carries no body
    /// (e.g. the `assign` action endpoints, which return 204 No Content).
    pub async fn post_no_content<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<()> {
        self.send_json(Method::POST, path, Some(body)).await?;
        Ok(())
    }

    /// Sends an authenticated PATCH request with a JSON body. Graph PATCH
    /// endpoints commonly return 204 No Content, so the response body is
    /// discarded.
    pub async fn patch<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<()> {
        self.send_json(Method::PATCH, path, Some(body)).await?;
        Ok(())
    }

    /// Sends an authenticated DELETE request. Success is 204 No Content.
    pub async fn delete(&self, path: &str) -> Result<()> {
        self.send_json::<()>(Method::DELETE, path, None).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_base_url_is_graph_beta() {
        let client = GraphClient::new(TokenProvider::with_token("t"));
        assert_eq!(client.base_url, "https://graph.microsoft.com/beta/");
    }

    #[test]
    fn base_url_override_is_stored_verbatim() {
        let client =
            GraphClient::with_base_url(TokenProvider::with_token("t"), "http://127.0.0.1:9999/");
        assert_eq!(client.base_url, "http://127.0.0.1:9999/");
    }
}
