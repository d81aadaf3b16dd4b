//! Error taxonomy for API calls

/// Failure of a single API call.
///
/// `Clone` because one refresh failure is delivered to every caller that was
/// queued behind it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClientError {
    /// The server rejected the access token and no refresh could recover the call.
    #[error("authorization expired: {0}")]
    AuthorizationExpired(String),

    /// The refresh token itself was refused. The session is over; log in again.
    #[error("token refresh rejected: {0}")]
    RefreshRejected(String),

    /// Login or registration was refused.
    #[error("login failed: {0}")]
    LoginFailed(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("server returned {status}: {body}")]
    Server { status: u16, body: String },

    #[error("response decode failed: {0}")]
    Decode(String),

    #[error("credential store error: {0}")]
    Credential(String),

    /// A queued call lost its completion handle (runtime shut down mid-refresh).
    #[error("request canceled: {0}")]
    Canceled(String),

    #[error("client setup failed: {0}")]
    Setup(String),
}

impl ClientError {
    /// Short label for metrics and structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            ClientError::AuthorizationExpired(_) => "authorization_expired",
            ClientError::RefreshRejected(_) => "refresh_rejected",
            ClientError::LoginFailed(_) => "login_failed",
            ClientError::Network(_) => "network",
            ClientError::Server { .. } => "server",
            ClientError::Decode(_) => "decode",
            ClientError::Credential(_) => "credential",
            ClientError::Canceled(_) => "canceled",
            ClientError::Setup(_) => "setup",
        }
    }

    /// Whether the caller has to log in again before retrying.
    pub fn requires_login(&self) -> bool {
        matches!(
            self,
            ClientError::AuthorizationExpired(_) | ClientError::RefreshRejected(_)
        )
    }

    /// Map a refresh exchange failure.
    ///
    /// Transport failures stay `Network`; every answer from the endpoint that
    /// is not a new token counts as a rejection.
    pub fn from_refresh(err: session_auth::Error) -> Self {
        match err {
            session_auth::Error::Http(msg) => ClientError::Network(msg),
            other if other.is_rejection() => ClientError::RefreshRejected(other.to_string()),
            other => ClientError::RefreshRejected(format!("unreadable refresh response: {other}")),
        }
    }

    /// Map a login or registration failure.
    pub fn from_login(err: session_auth::Error) -> Self {
        match err {
            session_auth::Error::Http(msg) => ClientError::Network(msg),
            session_auth::Error::InvalidCredentials(msg)
            | session_auth::Error::TokenExchange(msg) => ClientError::LoginFailed(msg),
            session_auth::Error::Io(msg) => ClientError::Setup(msg),
            other => ClientError::LoginFailed(other.to_string()),
        }
    }
}

impl From<session_auth::Error> for ClientError {
    fn from(err: session_auth::Error) -> Self {
        ClientError::Credential(err.to_string())
    }
}

/// Result alias for API calls.
pub type Result<T> = std::result::Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refresh_rejection_maps_to_refresh_rejected() {
        let err = ClientError::from_refresh(session_auth::Error::InvalidCredentials(
            "token refresh rejected (401 Unauthorized)".into(),
        ));
        assert!(matches!(err, ClientError::RefreshRejected(_)));
        assert!(err.requires_login());
    }

    #[test]
    fn refresh_transport_failure_maps_to_network() {
        let err = ClientError::from_refresh(session_auth::Error::Http("connection refused".into()));
        assert_eq!(err, ClientError::Network("connection refused".into()));
        assert!(!err.requires_login());
    }

    #[test]
    fn login_rejection_is_not_a_refresh_rejection() {
        let err = ClientError::from_login(session_auth::Error::InvalidCredentials("bad".into()));
        assert!(matches!(err, ClientError::LoginFailed(_)));
    }

    #[test]
    fn store_errors_convert_to_credential() {
        let err: ClientError = session_auth::Error::Io("disk full".into()).into();
        assert_eq!(err.kind(), "credential");
        assert!(err.to_string().contains("disk full"));
    }

    #[test]
    fn server_error_display_includes_status_and_body() {
        let err = ClientError::Server {
            status: 503,
            body: "maintenance".into(),
        };
        assert_eq!(err.to_string(), "server returned 503: maintenance");
    }
}
