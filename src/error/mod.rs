//! Error types for authkeep.

use thiserror::Error;

/// Broad classification used by presentation code to decide how to react.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// The identity provider itself reported a failure.
    Provider,
    /// A code or token exchange with the application server failed.
    Exchange,
    /// The access credential was rejected; a silent refresh may recover.
    CredentialExpired,
    /// The refresh credential could not be exchanged; the session is gone.
    SessionLost,
    /// The redirect did not carry any recognizable parameters.
    MalformedCallback,
    /// The application server rejected the request for another reason.
    Api,
    Network,
    Configuration,
    Storage,
    Unknown,
}

/// Primary error type for all authkeep operations.
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Authentication failed: {}", provider_message(.code, .description.as_deref()))]
    Provider {
        code: String,
        description: Option<String>,
    },

    #[error("Code exchange failed: {0}")]
    Exchange(String),

    #[error("Credential expired: {0}")]
    CredentialExpired(String),

    #[error("Session refresh failed: {0}")]
    RefreshFailed(String),

    #[error("Missing authentication parameters")]
    MissingParameters,

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),
}

impl AuthError {
    /// Create an API error from a status code and message.
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    /// Classify this error into a category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Provider { .. } => ErrorCategory::Provider,
            Self::Exchange(_) => ErrorCategory::Exchange,
            Self::CredentialExpired(_) => ErrorCategory::CredentialExpired,
            Self::RefreshFailed(_) => ErrorCategory::SessionLost,
            Self::MissingParameters => ErrorCategory::MalformedCallback,
            Self::Api { .. } => ErrorCategory::Api,
            Self::Network(_) => ErrorCategory::Network,
            Self::Configuration(_) | Self::InvalidUrl(_) => ErrorCategory::Configuration,
            Self::Io(_) | Self::Serialization(_) => ErrorCategory::Storage,
            Self::InvalidState(_) => ErrorCategory::Unknown,
        }
    }

    /// Whether this error should be shown to the user as-is.
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::Provider
                | ErrorCategory::Exchange
                | ErrorCategory::SessionLost
                | ErrorCategory::MalformedCallback
                | ErrorCategory::Api
        )
    }

    /// Whether the same call may succeed if issued again.
    ///
    /// Callback and refresh failures are never retryable; only transport
    /// failures and server-side 5xx responses are.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network(_) => true,
            Self::Api { status, .. } => (500..=599).contains(status),
            _ => false,
        }
    }
}

fn provider_message(code: &str, description: Option<&str>) -> String {
    match description {
        Some(description) if !description.is_empty() => format!("{code} - {description}"),
        _ => code.to_string(),
    }
}

impl From<serde_json::Error> for AuthError {
    fn from(error: serde_json::Error) -> Self {
        Self::Serialization(error.to_string())
    }
}

impl From<toml::de::Error> for AuthError {
    fn from(error: toml::de::Error) -> Self {
        Self::Serialization(error.to_string())
    }
}

impl From<toml::ser::Error> for AuthError {
    fn from(error: toml::ser::Error) -> Self {
        Self::Serialization(error.to_string())
    }
}

impl From<url::ParseError> for AuthError {
    fn from(error: url::ParseError) -> Self {
        Self::InvalidUrl(error.to_string())
    }
}

/// Map a non-success server response onto the error taxonomy.
///
/// The server reports failures as `{"detail": "..."}`; the raw body is used
/// when that field is missing.
pub fn status_to_error(status: u16, body: &str) -> AuthError {
    match status {
        401 => AuthError::CredentialExpired(server_message(body)),
        _ => api_error(status, body),
    }
}

/// Like [`status_to_error`], but never classifies the response as an
/// expired credential.
pub fn api_error(status: u16, body: &str) -> AuthError {
    AuthError::api(status, server_message(body))
}

fn server_message(body: &str) -> String {
    extract_detail(body).unwrap_or_else(|| body.to_string())
}

fn extract_detail(body: &str) -> Option<String> {
    let value = serde_json::from_str::<serde_json::Value>(body).ok()?;
    match value.get("detail")? {
        serde_json::Value::String(detail) => Some(detail.clone()),
        other => Some(other.to_string()),
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, AuthError>;
