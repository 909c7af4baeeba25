use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{api_error, status_to_error, Result};

/// One logical call to the application server.
///
/// The retry marker lives on the request itself, so concurrent requests
/// never share it.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub(crate) method: Method,
    pub(crate) path: String,
    pub(crate) query: Vec<(String, String)>,
    pub(crate) body: Option<serde_json::Value>,
    pub(crate) refresh_on_expiry: bool,
    pub(crate) retried: bool,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
            refresh_on_expiry: true,
            retried: false,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }

    pub fn query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }

    pub fn json<T: Serialize + ?Sized>(mut self, body: &T) -> Result<Self> {
        self.body = Some(serde_json::to_value(body)?);
        Ok(self)
    }

    /// Surface a 401 directly instead of attempting a silent refresh.
    ///
    /// Used for credential-issuing endpoints, where a 401 means the submitted
    /// email/password was wrong rather than that the session expired.
    pub fn without_refresh(mut self) -> Self {
        self.refresh_on_expiry = false;
        self
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn is_retry(&self) -> bool {
        self.retried
    }

    pub(crate) fn into_retry(mut self) -> Self {
        self.retried = true;
        self
    }
}

/// Buffered response from the application server.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    status: StatusCode,
    body: String,
}

impl ApiResponse {
    pub(crate) fn new(status: StatusCode, body: String) -> Self {
        Self { status, body }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status == StatusCode::UNAUTHORIZED
    }

    /// Decode the body; empty bodies decode as JSON `null`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        if self.body.trim().is_empty() {
            return Ok(serde_json::from_value(serde_json::Value::Null)?);
        }
        Ok(serde_json::from_str(&self.body)?)
    }

    pub(crate) fn into_result(self) -> Result<Self> {
        if self.status.is_success() {
            Ok(self)
        } else {
            Err(status_to_error(self.status.as_u16(), &self.body))
        }
    }

    /// Like `into_result`, but a 401 stays a plain API error.
    pub(crate) fn into_api_result(self) -> Result<Self> {
        if self.status.is_success() {
            Ok(self)
        } else {
            Err(api_error(self.status.as_u16(), &self.body))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AuthError;

    #[test]
    fn retry_marker_is_per_request() {
        let original = ApiRequest::get("/me");
        let retry = original.clone().into_retry();
        assert!(!original.is_retry());
        assert!(retry.is_retry());
    }

    #[test]
    fn empty_body_decodes_as_unit() {
        let response = ApiResponse::new(StatusCode::NO_CONTENT, String::new());
        response.json::<()>().unwrap();
    }

    #[test]
    fn non_success_becomes_error() {
        let response = ApiResponse::new(StatusCode::BAD_REQUEST, r#"{"detail":"Email taken"}"#.into());
        match response.into_result() {
            Err(AuthError::Api { status, message }) => {
                assert_eq!(status, 400);
                assert_eq!(message, "Email taken");
            }
            other => panic!("expected Api error, got {other:?}"),
        }
    }
}
