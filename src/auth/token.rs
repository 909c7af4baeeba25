use std::fmt;

use serde::{Deserialize, Serialize};

/// Access and refresh credentials issued together by the application server.
///
/// Both values are opaque bearer tokens. No expiry is tracked client-side;
/// an expired access token is discovered when a request is rejected.
///
/// # Example
/// ```
/// use authkeep::auth::CredentialPair;
///
/// let pair = CredentialPair::new("access", "refresh");
/// assert_eq!(pair.bearer(), "Bearer access");
/// ```
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialPair {
    pub access_token: String,
    pub refresh_token: String,
}

impl CredentialPair {
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
        }
    }

    /// Value for the `Authorization` header.
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.access_token)
    }

    /// Both halves are present and non-blank.
    pub fn is_complete(&self) -> bool {
        !self.access_token.trim().is_empty() && !self.refresh_token.trim().is_empty()
    }
}

impl fmt::Debug for CredentialPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialPair")
            .field("access_token", &fingerprint(&self.access_token))
            .field("refresh_token", &fingerprint(&self.refresh_token))
            .finish()
    }
}

/// Short, log-safe prefix of a secret.
pub(crate) fn fingerprint(secret: &str) -> String {
    let prefix: String = secret.chars().take(6).collect();
    if secret.chars().count() > 6 {
        format!("{prefix}…")
    } else {
        prefix
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_output_does_not_leak_full_tokens() {
        let pair = CredentialPair::new("eyJhbGciOiJIUzI1NiJ9.secret", "refresh-secret-value");
        let rendered = format!("{pair:?}");
        assert!(!rendered.contains("secret-value"));
        assert!(!rendered.contains("IUzI1NiJ9"));
        assert!(rendered.contains("eyJhbG"));
    }

    #[test]
    fn blank_halves_are_incomplete() {
        assert!(!CredentialPair::new("", "refresh").is_complete());
        assert!(!CredentialPair::new("access", "  ").is_complete());
        assert!(CredentialPair::new("access", "refresh").is_complete());
    }
}
