//! Backend endpoint paths
//!
//! Paths are relative to the configured API base URL. They carry the trailing
//! slash the Django REST backend requires.

/// Base URL used when neither the config file nor `API_BASE_URL` sets one
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8000/api";

/// Refresh exchange: trades a refresh token for a new access token
pub const REFRESH_PATH: &str = "/token/refresh/";

/// Login with username-or-email plus password
pub const LOGIN_PATH: &str = "/auth/token/login/";

/// Account registration (multipart form)
pub const REGISTER_PATH: &str = "/auth/register/";

/// Profile of the authenticated user
pub const CURRENT_USER_PATH: &str = "/auth/user/";

/// Join a base URL and an endpoint path without doubling the slash.
pub fn endpoint(base_url: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
