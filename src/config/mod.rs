//! Client configuration (layered: code > env > defaults).

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use strum::{Display, EnumString};

use crate::auth::pkce::PkceConfig;
use crate::error::{AuthError, Result};

const DEFAULT_API_URL: &str = "http://localhost:8000";
const DEFAULT_API_PREFIX: &str = "/api/core";
const DEFAULT_ENTRY_PATH: &str = "/login";
const DEFAULT_LANDING_PATH: &str = "/dashboard";
const DEFAULT_REDIRECT_DELAY: Duration = Duration::from_secs(3);
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// How an authorization `code` from the provider is turned into credentials.
///
/// A deployment picks one mode; the reconciler never mixes them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum CallbackMode {
    /// Send the code to the application server, which performs the exchange.
    #[default]
    Server,
    /// Exchange the code locally against the identity provider using PKCE.
    Pkce,
}

/// Configuration for the session client.
///
/// Resolution order:
/// 1. Explicit `with_*` setters
/// 2. Environment variables (`AUTHKEEP_*`, `.env` honored)
/// 3. Built-in defaults
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Scheme and host of the application server.
    pub api_url: String,
    /// Path prefix every endpoint lives under.
    pub api_prefix: String,
    /// Unauthenticated entry point users are sent back to.
    pub entry_path: String,
    /// Where a successful callback lands.
    pub landing_path: String,
    /// Grace period before redirecting away from a failed callback.
    pub redirect_delay: Duration,
    pub callback_mode: CallbackMode,
    pub pkce: Option<PkceConfig>,
    pub credentials_dir: PathBuf,
    pub request_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            api_prefix: DEFAULT_API_PREFIX.to_string(),
            entry_path: DEFAULT_ENTRY_PATH.to_string(),
            landing_path: DEFAULT_LANDING_PATH.to_string(),
            redirect_delay: DEFAULT_REDIRECT_DELAY,
            callback_mode: CallbackMode::default(),
            pkce: None,
            credentials_dir: default_credentials_dir(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

impl ClientConfig {
    pub fn new(api_url: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
            ..Self::default()
        }
    }

    /// Load from environment variables on top of the defaults.
    ///
    /// Recognized variables: `AUTHKEEP_API_URL`, `AUTHKEEP_API_PREFIX`,
    /// `AUTHKEEP_CREDENTIALS_DIR`, `AUTHKEEP_CALLBACK_MODE`,
    /// `AUTHKEEP_REDIRECT_DELAY_MS`, and the `AUTHKEEP_PKCE_*` group.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv(); // load .env if present, ignore error
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(url) = lookup("AUTHKEEP_API_URL") {
            config.api_url = url;
        }
        if let Some(prefix) = lookup("AUTHKEEP_API_PREFIX") {
            config.api_prefix = prefix;
        }
        if let Some(dir) = lookup("AUTHKEEP_CREDENTIALS_DIR") {
            config.credentials_dir = PathBuf::from(dir);
        }
        if let Some(mode) = lookup("AUTHKEEP_CALLBACK_MODE") {
            config.callback_mode = CallbackMode::from_str(&mode).map_err(|_| {
                AuthError::Configuration(format!(
                    "AUTHKEEP_CALLBACK_MODE must be 'server' or 'pkce', got '{mode}'"
                ))
            })?;
        }
        if let Some(delay) = lookup("AUTHKEEP_REDIRECT_DELAY_MS") {
            let millis = delay.parse::<u64>().map_err(|_| {
                AuthError::Configuration(format!(
                    "AUTHKEEP_REDIRECT_DELAY_MS must be an integer, got '{delay}'"
                ))
            })?;
            config.redirect_delay = Duration::from_millis(millis);
        }

        let pkce_keys = (
            lookup("AUTHKEEP_PKCE_AUTHORIZE_URL"),
            lookup("AUTHKEEP_PKCE_TOKEN_URL"),
            lookup("AUTHKEEP_PKCE_CLIENT_ID"),
            lookup("AUTHKEEP_PKCE_REDIRECT_URI"),
        );
        if let (Some(authorize_url), Some(token_url), Some(client_id), Some(redirect_uri)) =
            pkce_keys
        {
            let mut pkce = PkceConfig::new(authorize_url, token_url, client_id, redirect_uri);
            if let Some(scopes) = lookup("AUTHKEEP_PKCE_SCOPES") {
                pkce.scopes = scopes;
            }
            config.pkce = Some(pkce);
        }

        config.validate()?;
        Ok(config)
    }

    pub fn with_api_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.api_prefix = prefix.into();
        self
    }

    pub fn with_entry_path(mut self, path: impl Into<String>) -> Self {
        self.entry_path = path.into();
        self
    }

    pub fn with_landing_path(mut self, path: impl Into<String>) -> Self {
        self.landing_path = path.into();
        self
    }

    pub fn with_redirect_delay(mut self, delay: Duration) -> Self {
        self.redirect_delay = delay;
        self
    }

    pub fn with_pkce(mut self, pkce: PkceConfig) -> Self {
        self.callback_mode = CallbackMode::Pkce;
        self.pkce = Some(pkce);
        self
    }

    pub fn with_credentials_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.credentials_dir = dir.into();
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Reject combinations that cannot work at runtime.
    pub fn validate(&self) -> Result<()> {
        reqwest::Url::parse(&self.api_url)?;
        if self.callback_mode == CallbackMode::Pkce && self.pkce.is_none() {
            return Err(AuthError::Configuration(
                "callback mode 'pkce' requires AUTHKEEP_PKCE_* settings".to_string(),
            ));
        }
        Ok(())
    }

    /// Absolute URL of an application-server endpoint.
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}{}{}",
            self.api_url.trim_end_matches('/'),
            normalize_segment(&self.api_prefix),
            normalize_segment(path)
        )
    }

    /// Redirect target that starts the Google sign-in flow.
    pub fn google_auth_url(&self) -> String {
        self.endpoint("/google")
    }
}

fn normalize_segment(segment: &str) -> String {
    let trimmed = segment.trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{trimmed}")
    }
}

fn default_credentials_dir() -> PathBuf {
    directories::UserDirs::new()
        .map(|dirs| dirs.home_dir().join(".authkeep"))
        .unwrap_or_else(|| PathBuf::from(".authkeep"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_point_at_local_server() {
        let config = ClientConfig::default();
        assert_eq!(config.endpoint("/me"), "http://localhost:8000/api/core/me");
        assert_eq!(config.entry_path, "/login");
        assert_eq!(config.redirect_delay, Duration::from_secs(3));
        assert_eq!(config.callback_mode, CallbackMode::Server);
    }

    #[test]
    fn endpoint_tolerates_stray_slashes() {
        let config = ClientConfig::new("http://api.test/").with_api_prefix("v1/");
        assert_eq!(config.endpoint("refresh"), "http://api.test/v1/refresh");
        let bare = ClientConfig::new("http://api.test").with_api_prefix("");
        assert_eq!(bare.endpoint("/login"), "http://api.test/login");
    }

    #[test]
    fn google_auth_url_uses_prefix() {
        let config = ClientConfig::new("https://app.example.com");
        assert_eq!(
            config.google_auth_url(),
            "https://app.example.com/api/core/google"
        );
    }

    #[test]
    fn lookup_overrides_defaults() {
        let config = ClientConfig::from_lookup(lookup_from(&[
            ("AUTHKEEP_API_URL", "https://api.example.com"),
            ("AUTHKEEP_REDIRECT_DELAY_MS", "250"),
            ("AUTHKEEP_CALLBACK_MODE", "SERVER"),
        ]))
        .unwrap();
        assert_eq!(config.api_url, "https://api.example.com");
        assert_eq!(config.redirect_delay, Duration::from_millis(250));
        assert_eq!(config.callback_mode, CallbackMode::Server);
    }

    #[test]
    fn invalid_delay_is_a_configuration_error() {
        let err = ClientConfig::from_lookup(lookup_from(&[(
            "AUTHKEEP_REDIRECT_DELAY_MS",
            "soon",
        )]))
        .unwrap_err();
        assert!(matches!(err, AuthError::Configuration(_)));
    }

    #[test]
    fn pkce_mode_without_settings_is_rejected() {
        let err = ClientConfig::from_lookup(lookup_from(&[("AUTHKEEP_CALLBACK_MODE", "pkce")]))
            .unwrap_err();
        assert!(matches!(err, AuthError::Configuration(msg) if msg.contains("pkce")));
    }

    #[test]
    fn pkce_settings_are_collected_from_lookup() {
        let config = ClientConfig::from_lookup(lookup_from(&[
            ("AUTHKEEP_CALLBACK_MODE", "pkce"),
            ("AUTHKEEP_PKCE_AUTHORIZE_URL", "https://idp.test/authorize"),
            ("AUTHKEEP_PKCE_TOKEN_URL", "https://idp.test/token"),
            ("AUTHKEEP_PKCE_CLIENT_ID", "client-1"),
            ("AUTHKEEP_PKCE_REDIRECT_URI", "https://app.test/auth/callback"),
        ]))
        .unwrap();
        let pkce = config.pkce.expect("pkce config");
        assert_eq!(pkce.client_id, "client-1");
        assert_eq!(config.callback_mode, CallbackMode::Pkce);
    }

    #[test]
    fn invalid_api_url_is_rejected() {
        let err = ClientConfig::new("not a url").validate().unwrap_err();
        assert!(matches!(err, AuthError::InvalidUrl(_)));
    }
}
