//! Wire types exchanged with the application server.

use bon::Builder;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::auth::CredentialPair;
use crate::error::{AuthError, Result};

/// Minimal identity of the signed-in user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
}

/// Subscription tier assigned by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Tier {
    #[default]
    Free,
    Basic,
    Pro,
    Enterprise,
}

/// How the account was originally created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum AuthProvider {
    #[default]
    Email,
    Google,
    Apple,
}

/// Server-authoritative profile snapshot.
///
/// Replaced wholesale on every fetch or update; never patched locally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub auth_provider: AuthProvider,
    #[serde(default)]
    pub last_login_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub tier: Tier,
    #[serde(default)]
    pub is_admin: bool,
    #[serde(default)]
    pub monthly_budget_usd: f64,
    #[serde(default)]
    pub current_month_spent_usd: f64,
    #[serde(default)]
    pub budget_alert_threshold: f64,
    #[serde(default)]
    pub timezone: Option<String>,
    #[serde(default)]
    pub default_citation_style: Option<String>,
    #[serde(default)]
    pub ai_features_enabled: bool,
    #[serde(default)]
    pub auto_ingest_uploads: bool,
    #[serde(default)]
    pub rag_search_enabled: bool,
    #[serde(default)]
    pub kg_search_enabled: bool,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl UserProfile {
    pub fn user(&self) -> User {
        User {
            id: self.id.clone(),
            email: self.email.clone(),
        }
    }

    /// Fraction of the monthly budget already spent.
    pub fn budget_used_ratio(&self) -> Option<f64> {
        (self.monthly_budget_usd > 0.0)
            .then(|| self.current_month_spent_usd / self.monthly_budget_usd)
    }
}

/// Body of `POST /register`.
#[derive(Debug, Clone, Serialize)]
pub struct SignupRequest {
    pub email: String,
    pub password: String,
    pub full_name: String,
}

/// Body of `POST /login`.
#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Fields a user may change on their own profile; unset fields are omitted.
///
/// # Example
/// ```
/// use authkeep::api::ProfileUpdate;
///
/// let update = ProfileUpdate::builder()
///     .full_name("Ada Lovelace".to_string())
///     .rag_search_enabled(true)
///     .build();
/// assert!(!update.is_empty());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Builder, Serialize, Deserialize)]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_citation_style: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ai_features_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_ingest_uploads: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rag_search_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kg_search_enabled: Option<bool>,
}

impl ProfileUpdate {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionTokens {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthUser {
    pub id: String,
    pub email: String,
    pub profile: Option<UserProfile>,
}

/// Response of the credential-issuing endpoints.
///
/// Tokens may arrive at the top level or nested under `session`; both
/// shapes are accepted.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthResponse {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub session: Option<SessionTokens>,
    pub user: AuthUser,
}

impl AuthResponse {
    /// Extract the credential pair, preferring the nested `session` block.
    pub fn credentials(&self) -> Result<CredentialPair> {
        let pair = match (&self.session, &self.access_token, &self.refresh_token) {
            (Some(session), _, _) => {
                CredentialPair::new(&session.access_token, &session.refresh_token)
            }
            (None, Some(access), Some(refresh)) => CredentialPair::new(access, refresh),
            _ => {
                return Err(AuthError::Exchange(
                    "server response did not include a session".to_string(),
                ))
            }
        };
        if pair.is_complete() {
            Ok(pair)
        } else {
            Err(AuthError::Exchange(
                "server returned an incomplete session".to_string(),
            ))
        }
    }

    pub fn user(&self) -> User {
        User {
            id: self.user.id.clone(),
            email: self.user.email.clone(),
        }
    }
}

/// Response of `GET /me`: the profile doubles as the identity.
#[derive(Debug, Clone, Deserialize)]
pub struct CurrentUser {
    pub user: UserProfile,
}

/// Response of `PATCH /profile`.
#[derive(Debug, Clone, Deserialize)]
pub struct ProfileResponse {
    pub profile: UserProfile,
}

/// Page of users returned by the admin listing.
#[derive(Debug, Clone, Deserialize)]
pub struct UserPage {
    pub users: Vec<UserProfile>,
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub page: u32,
    #[serde(default)]
    pub limit: u32,
}

/// Admin-side changes to another user's account.
#[derive(Debug, Clone, Default, PartialEq, Builder, Serialize)]
pub struct AdminUserUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tier: Option<Tier>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub monthly_budget_usd: Option<f64>,
}
