//! Transport to the REST backend
//!
//! `Upstream` is the seam between the coordinator and the network. The HTTP
//! implementation wraps a shared `reqwest::Client`; tests substitute a
//! scripted fake.

use std::future::Future;
use std::pin::Pin;

use reqwest::header::HeaderMap;
use session_auth::RefreshResponse;
use tracing::debug;

use crate::error::{ClientError, Result};
use crate::request::{ApiRequest, ApiResponse};

/// Boxed future so `Upstream` can be used as a trait object.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub trait Upstream: Send + Sync {
    /// Send one request with exactly the given headers. Any status code is a
    /// successful send; only transport failures are errors.
    fn send<'a>(
        &'a self,
        request: &'a ApiRequest,
        headers: HeaderMap,
    ) -> BoxFuture<'a, Result<ApiResponse>>;

    /// Raw refresh exchange. Never passes through the authenticator or the
    /// coordinator.
    fn refresh<'a>(&'a self, refresh_token: &'a str) -> BoxFuture<'a, Result<RefreshResponse>>;
}

/// `Upstream` over HTTP.
pub struct HttpUpstream {
    client: reqwest::Client,
    base_url: String,
}

impl HttpUpstream {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }
}

impl Upstream for HttpUpstream {
    fn send<'a>(
        &'a self,
        request: &'a ApiRequest,
        headers: HeaderMap,
    ) -> BoxFuture<'a, Result<ApiResponse>> {
        Box::pin(async move {
            let url = session_auth::endpoint(&self.base_url, request.path());
            let mut builder = self
                .client
                .request(request.method().clone(), &url)
                .headers(headers);
            if let Some(body) = request.body() {
                builder = builder.json(body);
            }

            let response = builder.send().await.map_err(|e| {
                if e.is_timeout() {
                    ClientError::Network(format!("request to {url} timed out: {e}"))
                } else {
                    ClientError::Network(format!("request to {url} failed: {e}"))
                }
            })?;

            let status = response.status();
            let headers = response.headers().clone();
            let body = response
                .bytes()
                .await
                .map_err(|e| ClientError::Network(format!("reading response body: {e}")))?;

            debug!(%status, path = %request.path(), "upstream responded");
            Ok(ApiResponse::new(status, headers, body))
        })
    }

    fn refresh<'a>(&'a self, refresh_token: &'a str) -> BoxFuture<'a, Result<RefreshResponse>> {
        Box::pin(async move {
            session_auth::refresh_token(&self.client, &self.base_url, refresh_token)
                .await
                .map_err(ClientError::from_refresh)
        })
    }
}
