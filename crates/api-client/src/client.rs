//! HTTP client facade
//!
//! `ApiClient` ties the credential store, the bearer authenticator and the
//! refresh coordinator together behind plain REST verbs, plus the session
//! operations (login, register, logout) that talk to the token endpoints.

use std::sync::Arc;
use std::time::{Duration, Instant};

use common::Secret;
use session_auth::{CURRENT_USER_PATH, CredentialStore, DEFAULT_API_BASE_URL, RegisterData, UserData};
use tracing::{Span, debug, info, instrument, warn};

use crate::authenticator::{BearerAuthenticator, HeaderInjection};
use crate::coordinator::RefreshCoordinator;
use crate::error::{ClientError, Result};
use crate::metrics;
use crate::request::{ApiRequest, ApiResponse};
use crate::upstream::HttpUpstream;

/// Settings for building an `ApiClient`.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// API root, e.g. `http://localhost:8000/api`. Request paths are appended.
    pub base_url: String,
    /// Per-request timeout, applied to replays and the refresh exchange too.
    pub timeout: Duration,
    pub default_headers: Vec<HeaderInjection>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_BASE_URL.to_string(),
            timeout: Duration::from_secs(30),
            default_headers: Vec::new(),
        }
    }
}

/// Authenticated client for the notes API.
///
/// Cheap to clone; clones share the store and the refresh state.
#[derive(Clone)]
pub struct ApiClient {
    coordinator: RefreshCoordinator,
    http: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(config: ClientConfig, store: Arc<CredentialStore>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ClientError::Setup(format!("building HTTP client: {e}")))?;

        let upstream = Arc::new(HttpUpstream::new(http.clone(), config.base_url.clone()));
        let authenticator = Arc::new(BearerAuthenticator::new(config.default_headers));

        Ok(Self {
            coordinator: RefreshCoordinator::new(store, upstream, authenticator),
            http,
            base_url: config.base_url,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn store(&self) -> &Arc<CredentialStore> {
        self.coordinator.store()
    }

    /// Send one request. An expired access token is refreshed and the request
    /// replayed once before any error reaches the caller.
    #[instrument(skip_all, fields(request_id = tracing::field::Empty, method = %request.method(), path = %request.path()))]
    pub async fn send(&self, request: ApiRequest) -> Result<ApiResponse> {
        let request_id = format!("req_{}", uuid::Uuid::new_v4().as_simple());
        Span::current().record("request_id", request_id.as_str());

        let method = request.method().to_string();
        let start = Instant::now();
        let result = self.coordinator.execute(request, &request_id).await;
        let elapsed = start.elapsed().as_secs_f64();

        let status = match &result {
            Ok(response) => response.status().as_u16().to_string(),
            Err(ClientError::Server { status, .. }) => status.to_string(),
            Err(ClientError::AuthorizationExpired(_)) => "401".to_string(),
            Err(e) => e.kind().to_string(),
        };
        metrics::record_request(&status, &method, elapsed);

        match &result {
            Ok(_) => debug!(%status, elapsed, "request completed"),
            Err(e) => warn!(error = %e, kind = e.kind(), "request failed"),
        }
        result
    }

    pub async fn get(&self, path: impl Into<String>) -> Result<ApiResponse> {
        self.send(ApiRequest::get(path)).await
    }

    pub async fn post(&self, path: impl Into<String>, body: serde_json::Value) -> Result<ApiResponse> {
        self.send(ApiRequest::post(path).with_json(body)).await
    }

    pub async fn put(&self, path: impl Into<String>, body: serde_json::Value) -> Result<ApiResponse> {
        self.send(ApiRequest::put(path).with_json(body)).await
    }

    pub async fn delete(&self, path: impl Into<String>) -> Result<ApiResponse> {
        self.send(ApiRequest::delete(path)).await
    }

    /// Log in with a username or email and store the returned pair.
    pub async fn login(&self, identifier: &str, password: &Secret<String>) -> Result<UserData> {
        let auth = session_auth::login(&self.http, &self.base_url, identifier, password)
            .await
            .map_err(ClientError::from_login)?;
        self.store().write(auth.credential_pair())?;
        info!(user = %auth.user.username, role = %auth.user.role, "logged in");
        Ok(auth.user)
    }

    /// Register an account. The backend logs it in; the returned pair is stored.
    pub async fn register(&self, data: &RegisterData) -> Result<UserData> {
        let auth = session_auth::register(&self.http, &self.base_url, data)
            .await
            .map_err(ClientError::from_login)?;
        self.store().write(auth.credential_pair())?;
        info!(user = %auth.user.username, role = %auth.user.role, "registered");
        Ok(auth.user)
    }

    /// Drop the stored session. Idempotent.
    pub fn logout(&self) -> Result<()> {
        self.store().clear()?;
        info!("logged out");
        Ok(())
    }

    pub async fn current_user(&self) -> Result<UserData> {
        self.get(CURRENT_USER_PATH).await?.json()
    }

    pub fn is_authenticated(&self) -> bool {
        !self.store().is_empty()
    }
}
