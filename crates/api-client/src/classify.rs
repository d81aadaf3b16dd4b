//! Response classification
//!
//! Sorts a response into success, an expired access credential, or any other
//! failure. Only an authorization failure is handed to the refresh
//! coordinator; everything else passes straight through to the caller.

use crate::error::{ClientError, Result};
use crate::request::ApiResponse;

/// Outcome class of one HTTP response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Success,
    /// 401: the access credential was rejected.
    AuthorizationFailure,
    /// Any other non-success status, including 403.
    ServerFailure,
}

/// Classify an HTTP status code.
///
/// 403 is a permission problem, not an expired token, so it never triggers a
/// refresh.
pub fn classify_status(status: u16) -> Classification {
    match status {
        200..=399 => Classification::Success,
        401 => Classification::AuthorizationFailure,
        _ => Classification::ServerFailure,
    }
}

/// Turn a response into the caller-facing result.
pub fn into_result(response: ApiResponse) -> Result<ApiResponse> {
    let status = response.status().as_u16();
    match classify_status(status) {
        Classification::Success => Ok(response),
        Classification::AuthorizationFailure => {
            Err(ClientError::AuthorizationExpired(response.text()))
        }
        Classification::ServerFailure => Err(ClientError::Server {
            status,
            body: response.text(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use reqwest::StatusCode;
    use reqwest::header::HeaderMap;

    fn response(status: u16, body: &'static str) -> ApiResponse {
        ApiResponse::new(
            StatusCode::from_u16(status).unwrap(),
            HeaderMap::new(),
            Bytes::from_static(body.as_bytes()),
        )
    }

    #[test]
    fn classify_2xx_and_3xx_as_success() {
        assert_eq!(classify_status(200), Classification::Success);
        assert_eq!(classify_status(201), Classification::Success);
        assert_eq!(classify_status(204), Classification::Success);
        assert_eq!(classify_status(304), Classification::Success);
    }

    #[test]
    fn classify_only_401_as_authorization_failure() {
        assert_eq!(classify_status(401), Classification::AuthorizationFailure);
        assert_eq!(classify_status(403), Classification::ServerFailure);
    }

    #[test]
    fn classify_other_errors_as_server_failure() {
        assert_eq!(classify_status(400), Classification::ServerFailure);
        assert_eq!(classify_status(404), Classification::ServerFailure);
        assert_eq!(classify_status(429), Classification::ServerFailure);
        assert_eq!(classify_status(500), Classification::ServerFailure);
        assert_eq!(classify_status(503), Classification::ServerFailure);
    }

    #[test]
    fn into_result_passes_success_through() {
        let ok = into_result(response(200, "[]")).unwrap();
        assert_eq!(ok.text(), "[]");
    }

    #[test]
    fn into_result_maps_401_to_authorization_expired() {
        let err = into_result(response(401, "token_not_valid")).unwrap_err();
        assert_eq!(
            err,
            ClientError::AuthorizationExpired("token_not_valid".into())
        );
    }

    #[test]
    fn into_result_keeps_server_status_and_body() {
        let err = into_result(response(404, "not found")).unwrap_err();
        assert_eq!(
            err,
            ClientError::Server {
                status: 404,
                body: "not found".into()
            }
        );
    }
}
