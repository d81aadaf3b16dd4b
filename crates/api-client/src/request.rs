//! Request and response values passed through the client
//!
//! An `ApiRequest` is immutable once built. The authenticator derives the
//! headers to send from it on every attempt, so a replay always starts from
//! the caller's original headers.

use std::sync::Arc;

use bytes::Bytes;
use reqwest::Method;
use reqwest::StatusCode;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::de::DeserializeOwned;

use crate::error::{ClientError, Result};

/// Description of one REST call, relative to the API base URL.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    method: Method,
    path: String,
    body: Option<serde_json::Value>,
    headers: HeaderMap,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: None,
            headers: HeaderMap::new(),
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Attach a JSON body.
    pub fn with_json(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Add or replace a caller-supplied header.
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn body(&self) -> Option<&serde_json::Value> {
        self.body.as_ref()
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }
}

/// Fully read response from the server.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
}

impl ApiResponse {
    pub fn new(status: StatusCode, headers: HeaderMap, body: Bytes) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn bytes(&self) -> &Bytes {
        &self.body
    }

    /// Body as text, lossily decoded.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Decode the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.body)
            .map_err(|e| ClientError::Decode(format!("{} body: {e}", self.status)))
    }
}

/// One attempt at sending a request.
///
/// `retried` is fixed at construction. A first send is never a retry; every
/// replay after a refresh is, and a retry is never recovered a second time.
#[derive(Debug, Clone)]
pub struct Attempt {
    request: Arc<ApiRequest>,
    retried: bool,
}

impl Attempt {
    pub fn first(request: ApiRequest) -> Self {
        Self {
            request: Arc::new(request),
            retried: false,
        }
    }

    /// The same request, marked as already retried.
    pub fn replay(&self) -> Self {
        Self {
            request: Arc::clone(&self.request),
            retried: true,
        }
    }

    pub fn request(&self) -> &ApiRequest {
        &self.request
    }

    pub fn is_retry(&self) -> bool {
        self.retried
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builders_set_method_and_path() {
        let request = ApiRequest::delete("/notes/5/");
        assert_eq!(request.method(), Method::DELETE);
        assert_eq!(request.path(), "/notes/5/");
        assert!(request.body().is_none());
    }

    #[test]
    fn caller_headers_are_kept() {
        let request = ApiRequest::get("/notes/").with_header(
            HeaderName::from_static("accept-language"),
            HeaderValue::from_static("sq"),
        );
        assert_eq!(request.headers().get("accept-language").unwrap(), "sq");
    }

    #[test]
    fn replay_shares_request_and_marks_retry() {
        let first = Attempt::first(
            ApiRequest::post("/notes/").with_json(serde_json::json!({ "content": "hi" })),
        );
        assert!(!first.is_retry());

        let replay = first.replay();
        assert!(replay.is_retry());
        assert!(!first.is_retry(), "original attempt must not change");
        assert!(Arc::ptr_eq(&first.request, &replay.request));
        assert_eq!(replay.request().body().unwrap()["content"], "hi");
    }

    #[test]
    fn response_json_decodes_body() {
        let response = ApiResponse::new(
            StatusCode::OK,
            HeaderMap::new(),
            Bytes::from_static(br#"[{"id":1}]"#),
        );
        let value: serde_json::Value = response.json().unwrap();
        assert_eq!(value[0]["id"], 1);
    }

    #[test]
    fn response_json_failure_is_decode_error() {
        let response = ApiResponse::new(StatusCode::OK, HeaderMap::new(), Bytes::from_static(b"<html>"));
        let err = response.json::<serde_json::Value>().unwrap_err();
        assert!(matches!(err, ClientError::Decode(_)));
    }
}
