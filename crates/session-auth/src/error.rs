//! Error types for session credential operations

/// Errors from the token endpoints and the credential store.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The request never got an answer (connect, TLS, timeout).
    #[error("HTTP request failed: {0}")]
    Http(String),

    /// The endpoint answered with a non-success status other than 401/403.
    #[error("token exchange failed: {0}")]
    TokenExchange(String),

    /// 401/403: the submitted password or refresh token is not accepted.
    #[error("invalid credentials: {0}")]
    InvalidCredentials(String),

    #[error("credential parse error: {0}")]
    CredentialParse(String),

    #[error("I/O error: {0}")]
    Io(String),
}

impl Error {
    /// The server answered, and the answer was no.
    pub fn is_rejection(&self) -> bool {
        matches!(self, Error::InvalidCredentials(_) | Error::TokenExchange(_))
    }
}

/// Result alias for session operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejections_are_server_answers() {
        assert!(Error::InvalidCredentials("401".into()).is_rejection());
        assert!(Error::TokenExchange("500".into()).is_rejection());
        assert!(!Error::Http("connection refused".into()).is_rejection());
    }

    #[test]
    fn local_failures_are_not_rejections() {
        assert!(!Error::Io("disk full".into()).is_rejection());
        assert!(!Error::CredentialParse("expected value".into()).is_rejection());
    }
}
