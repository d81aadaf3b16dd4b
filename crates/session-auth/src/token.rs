//! Token endpoint calls: refresh exchange, login, registration
//!
//! These are raw `reqwest` calls. They never pass through the API client's
//! authenticator or refresh coordinator, so a rejected refresh token can
//! never start another refresh.

use std::path::PathBuf;

use common::Secret;
use reqwest::StatusCode;
use reqwest::multipart::{Form, Part};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::constants::{LOGIN_PATH, REFRESH_PATH, REGISTER_PATH, endpoint};
use crate::credentials::CredentialPair;
use crate::error::{Error, Result};

/// Response from the refresh endpoint.
///
/// The backend only returns a new refresh token when rotation is enabled;
/// otherwise the current one stays valid.
#[derive(Debug, Deserialize, Serialize)]
pub struct RefreshResponse {
    pub access: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh: Option<String>,
}

impl RefreshResponse {
    /// Pair to store after this refresh, keeping `current_refresh` when none was rotated in.
    pub fn into_pair(self, current_refresh: &str) -> CredentialPair {
        let refresh = self
            .refresh
            .unwrap_or_else(|| current_refresh.to_owned());
        CredentialPair::new(self.access, refresh)
    }
}

/// Token pair as returned by login and registration.
#[derive(Debug, Deserialize, Serialize)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

/// Profile of the authenticated user.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct UserData {
    pub id: i64,
    pub username: String,
    #[serde(default)]
    pub role: String,
}

/// Body of a successful login or registration.
#[derive(Debug, Deserialize, Serialize)]
pub struct AuthResponse {
    pub tokens: TokenPair,
    pub user: UserData,
}

impl AuthResponse {
    pub fn credential_pair(&self) -> CredentialPair {
        CredentialPair::new(self.tokens.access.clone(), self.tokens.refresh.clone())
    }
}

/// Account role chosen at registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Driver,
    Client,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Driver => "driver",
            Role::Client => "client",
        }
    }
}

/// Registration form. Driver-only fields are dropped for clients.
#[derive(Debug)]
pub struct RegisterData {
    pub username: String,
    pub email: String,
    pub phone: String,
    pub role: Role,
    pub password: Secret<String>,
    pub license_number: Option<String>,
    pub frequent_location: Option<String>,
    /// Scan of an identity document, uploaded as a file part
    pub personal_id: Option<PathBuf>,
}

/// Exchange a refresh token for a new access token.
///
/// 401/403 from the endpoint means the refresh token itself is expired or
/// revoked and maps to `InvalidCredentials`.
pub async fn refresh_token(
    client: &reqwest::Client,
    base_url: &str,
    refresh: &str,
) -> Result<RefreshResponse> {
    let response = client
        .post(endpoint(base_url, REFRESH_PATH))
        .json(&serde_json::json!({ "refresh": refresh }))
        .send()
        .await
        .map_err(|e| Error::Http(format!("token refresh request failed: {e}")))?;

    read_json(response, "token refresh").await
}

/// Log in with a username or email plus password.
pub async fn login(
    client: &reqwest::Client,
    base_url: &str,
    identifier: &str,
    password: &Secret<String>,
) -> Result<AuthResponse> {
    let response = client
        .post(endpoint(base_url, LOGIN_PATH))
        .json(&serde_json::json!({
            "identifier": identifier,
            "password": password.expose(),
        }))
        .send()
        .await
        .map_err(|e| Error::Http(format!("login request failed: {e}")))?;

    read_json(response, "login").await
}

/// Register a new account. The backend logs the account in on success.
pub async fn register(
    client: &reqwest::Client,
    base_url: &str,
    data: &RegisterData,
) -> Result<AuthResponse> {
    let mut form = Form::new()
        .text("username", data.username.clone())
        .text("email", data.email.clone())
        .text("phone", data.phone.clone())
        .text("role", data.role.as_str())
        .text("password", data.password.expose().clone());

    if data.role == Role::Driver {
        if let Some(license) = &data.license_number {
            form = form.text("license_number", license.clone());
        }
        if let Some(location) = &data.frequent_location {
            form = form.text("frequent_location", location.clone());
        }
        if let Some(path) = &data.personal_id {
            let bytes = tokio::fs::read(path)
                .await
                .map_err(|e| Error::Io(format!("reading {}: {e}", path.display())))?;
            let file_name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "personal_id".to_owned());
            form = form.part("personalID", Part::bytes(bytes).file_name(file_name));
        }
    }

    let response = client
        .post(endpoint(base_url, REGISTER_PATH))
        .multipart(form)
        .send()
        .await
        .map_err(|e| Error::Http(format!("register request failed: {e}")))?;

    read_json(response, "register").await
}

/// Decode a token endpoint response, mapping 401/403 to `InvalidCredentials`.
async fn read_json<T: DeserializeOwned>(response: reqwest::Response, what: &str) -> Result<T> {
    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| String::from("<no body>"));
        debug!(%status, what, "token endpoint rejected request");

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(Error::InvalidCredentials(format!(
                "{what} rejected ({status}): {body}"
            )));
        }

        return Err(Error::TokenExchange(format!(
            "{what} returned {status}: {body}"
        )));
    }

    response
        .json::<T>()
        .await
        .map_err(|e| Error::TokenExchange(format!("invalid {what} response: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Json;
    use axum::Router;
    use axum::http::StatusCode as AxumStatus;
    use axum::response::IntoResponse;
    use axum::routing::post;

    /// Serve `app` on an ephemeral port and return its `/api` base URL.
    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}/api")
    }

    fn auth_body(access: &str, refresh: &str) -> serde_json::Value {
        serde_json::json!({
            "tokens": { "access": access, "refresh": refresh },
            "user": { "id": 7, "username": "dana", "role": "client" }
        })
    }

    #[test]
    fn refresh_response_without_rotation_keeps_refresh_token() {
        let response: RefreshResponse = serde_json::from_str(r#"{"access":"T2"}"#).unwrap();
        let pair = response.into_pair("rt_old");
        assert_eq!(pair.access(), "T2");
        assert_eq!(pair.refresh(), "rt_old");
    }

    #[test]
    fn refresh_response_with_rotation_replaces_refresh_token() {
        let response: RefreshResponse =
            serde_json::from_str(r#"{"access":"T2","refresh":"rt_new"}"#).unwrap();
        let pair = response.into_pair("rt_old");
        assert_eq!(pair.refresh(), "rt_new");
    }

    #[test]
    fn auth_response_deserializes() {
        let response: AuthResponse = serde_json::from_value(auth_body("at", "rt")).unwrap();
        assert_eq!(response.user.username, "dana");
        assert_eq!(response.credential_pair().access(), "at");
        assert_eq!(response.credential_pair().refresh(), "rt");
    }

    #[test]
    fn role_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Role::Driver).unwrap(), "\"driver\"");
        assert_eq!(Role::Client.as_str(), "client");
    }

    #[tokio::test]
    async fn refresh_posts_refresh_token_and_returns_access() {
        let app = Router::new().route(
            "/api/token/refresh/",
            post(|Json(body): Json<serde_json::Value>| async move {
                assert_eq!(body["refresh"], "rt_1");
                Json(serde_json::json!({ "access": "T2" }))
            }),
        );
        let base = serve(app).await;

        let response = refresh_token(&reqwest::Client::new(), &base, "rt_1")
            .await
            .unwrap();
        assert_eq!(response.access, "T2");
        assert!(response.refresh.is_none());
    }

    #[tokio::test]
    async fn refresh_401_is_invalid_credentials() {
        let app = Router::new().route(
            "/api/token/refresh/",
            post(|| async {
                (
                    AxumStatus::UNAUTHORIZED,
                    Json(serde_json::json!({ "detail": "Token is invalid or expired" })),
                )
                    .into_response()
            }),
        );
        let base = serve(app).await;

        let err = refresh_token(&reqwest::Client::new(), &base, "rt_dead")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidCredentials(_)), "got: {err:?}");
        assert!(err.to_string().contains("Token is invalid or expired"));
    }

    #[tokio::test]
    async fn refresh_500_is_token_exchange_error() {
        let app = Router::new().route(
            "/api/token/refresh/",
            post(|| async { AxumStatus::INTERNAL_SERVER_ERROR }),
        );
        let base = serve(app).await;

        let err = refresh_token(&reqwest::Client::new(), &base, "rt_1")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::TokenExchange(_)), "got: {err:?}");
    }

    #[tokio::test]
    async fn refresh_against_dead_server_is_http_error() {
        // Bind then drop to get a port nothing listens on
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = refresh_token(&reqwest::Client::new(), &format!("http://{addr}/api"), "rt")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Http(_)), "got: {err:?}");
    }

    #[tokio::test]
    async fn login_sends_identifier_and_password() {
        let app = Router::new().route(
            "/api/auth/token/login/",
            post(|Json(body): Json<serde_json::Value>| async move {
                assert_eq!(body["identifier"], "dana@example.com");
                assert_eq!(body["password"], "hunter2");
                Json(auth_body("at_login", "rt_login"))
            }),
        );
        let base = serve(app).await;

        let response = login(
            &reqwest::Client::new(),
            &base,
            "dana@example.com",
            &Secret::new("hunter2".to_string()),
        )
        .await
        .unwrap();
        assert_eq!(response.tokens.access, "at_login");
        assert_eq!(response.user.id, 7);
    }

    #[tokio::test]
    async fn login_with_bad_password_is_invalid_credentials() {
        let app = Router::new().route(
            "/api/auth/token/login/",
            post(|| async { AxumStatus::UNAUTHORIZED }),
        );
        let base = serve(app).await;

        let err = login(
            &reqwest::Client::new(),
            &base,
            "dana",
            &Secret::new("wrong".to_string()),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, Error::InvalidCredentials(_)));
    }

    #[tokio::test]
    async fn register_client_omits_driver_fields() {
        let app = Router::new().route(
            "/api/auth/register/",
            post(|body: axum::body::Bytes| async move {
                let text = String::from_utf8_lossy(&body).into_owned();
                assert!(text.contains("name=\"username\""));
                assert!(text.contains("name=\"role\""));
                assert!(!text.contains("name=\"license_number\""));
                (AxumStatus::CREATED, Json(auth_body("at_reg", "rt_reg")))
            }),
        );
        let base = serve(app).await;

        let data = RegisterData {
            username: "dana".into(),
            email: "dana@example.com".into(),
            phone: "+15550100".into(),
            role: Role::Client,
            password: Secret::new("hunter2".to_string()),
            license_number: Some("ignored-for-clients".into()),
            frequent_location: None,
            personal_id: None,
        };
        let response = register(&reqwest::Client::new(), &base, &data)
            .await
            .unwrap();
        assert_eq!(response.tokens.refresh, "rt_reg");
    }

    #[tokio::test]
    async fn register_driver_uploads_personal_id() {
        let dir = tempfile::tempdir().unwrap();
        let id_path = dir.path().join("id-card.png");
        std::fs::write(&id_path, b"fake-png").unwrap();

        let app = Router::new().route(
            "/api/auth/register/",
            post(|body: axum::body::Bytes| async move {
                let text = String::from_utf8_lossy(&body).into_owned();
                assert!(text.contains("name=\"license_number\""));
                assert!(text.contains("filename=\"id-card.png\""));
                assert!(text.contains("fake-png"));
                (AxumStatus::CREATED, Json(auth_body("at_drv", "rt_drv")))
            }),
        );
        let base = serve(app).await;

        let data = RegisterData {
            username: "sam".into(),
            email: "sam@example.com".into(),
            phone: "+15550101".into(),
            role: Role::Driver,
            password: Secret::new("hunter2".to_string()),
            license_number: Some("DL-1234".into()),
            frequent_location: Some("Tirana".into()),
            personal_id: Some(id_path),
        };
        let response = register(&reqwest::Client::new(), &base, &data)
            .await
            .unwrap();
        assert_eq!(response.tokens.access, "at_drv");
    }
}
