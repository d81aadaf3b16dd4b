//! Request authentication
//!
//! The `Authenticator` trait decides which headers go out with a request.
//! `BearerAuthenticator` layers configured default headers under the caller's
//! own headers and attaches the stored access token as a bearer credential.

use std::str::FromStr;

use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderName, HeaderValue};
use serde::Deserialize;
use session_auth::CredentialPair;
use tracing::warn;

use crate::request::ApiRequest;

/// Default header added to every request (name + value pair from config).
#[derive(Debug, Clone, Deserialize)]
pub struct HeaderInjection {
    pub name: String,
    pub value: String,
}

/// Produces the outbound headers for a request.
///
/// Best effort: never fails and never blocks. Called again for every replay,
/// always starting from the request's original headers.
pub trait Authenticator: Send + Sync {
    /// Identifier for logging
    fn id(&self) -> &str;

    /// Headers to send for `request`, given the current credential (if any).
    fn authenticate(&self, request: &ApiRequest, credential: Option<&CredentialPair>) -> HeaderMap;
}

/// Bearer-token authenticator with configured default headers.
pub struct BearerAuthenticator {
    defaults: Vec<(HeaderName, HeaderValue)>,
}

impl BearerAuthenticator {
    /// Parse the configured defaults, skipping invalid entries and any attempt
    /// to set `Authorization`.
    pub fn new(defaults: Vec<HeaderInjection>) -> Self {
        let mut parsed = Vec::with_capacity(defaults.len());
        for injection in defaults {
            let name = match HeaderName::from_str(&injection.name) {
                Ok(n) => n,
                Err(e) => {
                    warn!(header = %injection.name, error = %e, "skipping invalid header name");
                    continue;
                }
            };
            if name == AUTHORIZATION {
                warn!(header = %injection.name, "refusing to configure authorization as a default header");
                continue;
            }
            let value = match HeaderValue::from_str(&injection.value) {
                Ok(v) => v,
                Err(e) => {
                    warn!(header = %injection.name, error = %e, "skipping invalid header value");
                    continue;
                }
            };
            parsed.push((name, value));
        }
        Self { defaults: parsed }
    }
}

impl Default for BearerAuthenticator {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl Authenticator for BearerAuthenticator {
    fn id(&self) -> &str {
        "bearer"
    }

    fn authenticate(&self, request: &ApiRequest, credential: Option<&CredentialPair>) -> HeaderMap {
        let mut headers = request.headers().clone();

        for (name, value) in &self.defaults {
            if !headers.contains_key(name) {
                headers.insert(name.clone(), value.clone());
            }
        }

        if let Some(credential) = credential {
            match HeaderValue::from_str(&format!("Bearer {}", credential.access())) {
                Ok(mut value) => {
                    value.set_sensitive(true);
                    headers.insert(AUTHORIZATION, value);
                }
                Err(e) => {
                    warn!(error = %e, "stored access token is not a valid header value, sending unauthenticated");
                }
            }
        }

        headers
    }
}
