//! Reconciliation of identity-provider redirects.
//!
//! A provider sends the browser back with parameters in the query string,
//! the fragment, or both. [`classify`] decides which protocol occurred using
//! a fixed precedence:
//!
//! 1. an `error` key in either source wins outright;
//! 2. a `code` in the query means an authorization-code flow;
//! 3. `access_token` + `refresh_token` (fragment first, query as fallback)
//!    means direct delivery, with `type=signup` marking a first-time user;
//! 4. anything else is a malformed callback.
//!
//! [`CallbackReconciler`] then finishes the code exchange or signup
//! provisioning, and [`CallbackHandler`] drives storage and navigation.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use super::pkce::{PkceFlow, PkceSession};
use super::token::CredentialPair;
use crate::api::AuthApi;
use crate::config::ClientConfig;
use crate::error::{AuthError, Result};
use crate::gateway::Navigator;
use crate::session::Session;

/// Parameters carried by a provider redirect, split by source.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallbackParams {
    query: HashMap<String, String>,
    fragment: HashMap<String, String>,
}

impl CallbackParams {
    /// Parse a full redirect URL.
    pub fn from_url(url: &str) -> Result<Self> {
        let parsed = reqwest::Url::parse(url)?;
        Ok(Self::from_parts(
            parsed.query().unwrap_or_default(),
            parsed.fragment().unwrap_or_default(),
        ))
    }

    /// Build from raw query and fragment strings, with or without their
    /// leading `?` / `#`.
    pub fn from_parts(query: &str, fragment: &str) -> Self {
        Self {
            query: parse_pairs(query.trim_start_matches('?')),
            fragment: parse_pairs(fragment.trim_start_matches('#')),
        }
    }

    pub fn query(&self, key: &str) -> Option<&str> {
        non_empty(self.query.get(key))
    }

    pub fn fragment(&self, key: &str) -> Option<&str> {
        non_empty(self.fragment.get(key))
    }

    /// Fragment value, falling back to the query.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fragment(key).or_else(|| self.query(key))
    }

    pub fn is_signup(&self) -> bool {
        self.get("type") == Some("signup")
    }
}

fn parse_pairs(raw: &str) -> HashMap<String, String> {
    url::form_urlencoded::parse(raw.as_bytes())
        .into_owned()
        .collect()
}

fn non_empty(value: Option<&String>) -> Option<&str> {
    value.map(String::as_str).filter(|value| !value.is_empty())
}

/// Which stage of the callback failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The provider reported an error in the redirect.
    Provider,
    /// Exchanging a code, or provisioning a signup, failed.
    Exchange,
    /// Nothing recognizable was present.
    MissingParameters,
}

/// Classified failure of a callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackFailure {
    pub kind: FailureKind,
    pub code: String,
    pub description: Option<String>,
}

impl CallbackFailure {
    fn provider(code: &str, description: Option<&str>) -> Self {
        Self {
            kind: FailureKind::Provider,
            code: code.to_string(),
            description: description.map(str::to_string),
        }
    }

    fn exchange(description: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Exchange,
            code: "exchange_failed".to_string(),
            description: Some(description.into()),
        }
    }

    fn missing_parameters() -> Self {
        Self {
            kind: FailureKind::MissingParameters,
            code: "missing_parameters".to_string(),
            description: None,
        }
    }

    /// Text shown to the user before the redirect.
    pub fn message(&self) -> String {
        match self.kind {
            FailureKind::MissingParameters => "Missing authentication tokens".to_string(),
            FailureKind::Exchange => self
                .description
                .clone()
                .unwrap_or_else(|| "Failed to complete authentication".to_string()),
            FailureKind::Provider => match &self.description {
                Some(description) => {
                    format!("Authentication failed: {} - {description}", self.code)
                }
                None => format!("Authentication failed: {}", self.code),
            },
        }
    }
}

impl fmt::Display for CallbackFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message())
    }
}

impl From<CallbackFailure> for AuthError {
    fn from(failure: CallbackFailure) -> Self {
        match failure.kind {
            FailureKind::Provider => AuthError::Provider {
                code: failure.code,
                description: failure.description,
            },
            FailureKind::Exchange => AuthError::Exchange(failure.message()),
            FailureKind::MissingParameters => AuthError::MissingParameters,
        }
    }
}

/// Result of reconciling one redirect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackOutcome {
    Tokens(CredentialPair),
    Code(String),
    Error(CallbackFailure),
}

/// Decide which protocol a redirect represents, without any I/O.
pub fn classify(params: &CallbackParams) -> CallbackOutcome {
    let error = params.fragment("error").or_else(|| params.query("error"));
    if let Some(code) = error {
        let description = params
            .fragment("error_description")
            .or_else(|| params.query("error_description"));
        return CallbackOutcome::Error(CallbackFailure::provider(code, description));
    }

    if let Some(code) = params.query("code") {
        return CallbackOutcome::Code(code.to_string());
    }

    match (params.get("access_token"), params.get("refresh_token")) {
        (Some(access), Some(refresh)) => {
            CallbackOutcome::Tokens(CredentialPair::new(access, refresh))
        }
        _ => CallbackOutcome::Error(CallbackFailure::missing_parameters()),
    }
}

/// Turns an authorization code into credentials.
///
/// A deployment installs exactly one implementation.
#[async_trait]
pub trait CodeExchange: Send + Sync {
    async fn exchange(&self, code: &str, state: Option<&str>) -> Result<CredentialPair>;
}

/// The application server performs the exchange.
#[derive(Debug, Clone)]
pub struct ServerCodeExchange {
    api: AuthApi,
}

impl ServerCodeExchange {
    pub fn new(api: AuthApi) -> Self {
        Self { api }
    }
}

#[async_trait]
impl CodeExchange for ServerCodeExchange {
    async fn exchange(&self, code: &str, _state: Option<&str>) -> Result<CredentialPair> {
        self.api.exchange_code(code).await
    }
}

/// The code is exchanged locally with the provider using the PKCE secret
/// created when the flow started.
#[derive(Debug, Clone)]
pub struct PkceCodeExchange {
    flow: PkceFlow,
    session: PkceSession,
}

impl PkceCodeExchange {
    pub fn new(flow: PkceFlow, session: PkceSession) -> Self {
        Self { flow, session }
    }
}

#[async_trait]
impl CodeExchange for PkceCodeExchange {
    async fn exchange(&self, code: &str, state: Option<&str>) -> Result<CredentialPair> {
        self.flow.exchange(&self.session, code, state).await
    }
}

/// Resolves a redirect into either credentials or a classified failure.
pub struct CallbackReconciler {
    api: AuthApi,
    exchange: Arc<dyn CodeExchange>,
}

impl CallbackReconciler {
    pub fn new(api: AuthApi, exchange: Arc<dyn CodeExchange>) -> Self {
        Self { api, exchange }
    }

    /// Reconciler whose codes are exchanged by the application server.
    pub fn server_side(api: AuthApi) -> Self {
        let exchange = Arc::new(ServerCodeExchange::new(api.clone()));
        Self::new(api, exchange)
    }

    /// Produce a final outcome: never [`CallbackOutcome::Code`].
    pub async fn reconcile(&self, params: &CallbackParams) -> CallbackOutcome {
        match classify(params) {
            CallbackOutcome::Error(failure) => {
                debug!(code = %failure.code, "Provider redirect carried an error");
                CallbackOutcome::Error(failure)
            }
            CallbackOutcome::Code(code) => {
                debug!("Exchanging authorization code");
                match self.exchange.exchange(&code, params.query("state")).await {
                    Ok(pair) if pair.is_complete() => CallbackOutcome::Tokens(pair),
                    Ok(_) => CallbackOutcome::Error(CallbackFailure::exchange(
                        "Exchange returned an incomplete session",
                    )),
                    Err(err) => CallbackOutcome::Error(CallbackFailure::exchange(
                        exchange_message(err),
                    )),
                }
            }
            CallbackOutcome::Tokens(pair) => {
                if params.is_signup() {
                    debug!("First-time OAuth signup; provisioning profile");
                    if let Err(err) = self.api.provision_oauth_signup(&pair).await {
                        return CallbackOutcome::Error(CallbackFailure::exchange(
                            exchange_message(err),
                        ));
                    }
                }
                CallbackOutcome::Tokens(pair)
            }
        }
    }
}

fn exchange_message(err: AuthError) -> String {
    match err {
        AuthError::Exchange(message) => message,
        other => other.to_string(),
    }
}

impl fmt::Debug for CallbackReconciler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackReconciler").finish_non_exhaustive()
    }
}

/// What the handler did with a redirect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackReport {
    pub outcome: CallbackOutcome,
    pub navigated_to: String,
}

impl CallbackReport {
    pub fn failure(&self) -> Option<&CallbackFailure> {
        match &self.outcome {
            CallbackOutcome::Error(failure) => Some(failure),
            _ => None,
        }
    }
}

/// Handles the callback landing page end to end.
///
/// Success stores the credentials, signals the session, and navigates to the
/// landing path. Failure waits the configured grace period so the message can
/// be read, then navigates to the entry path. Nothing is retried.
pub struct CallbackHandler {
    reconciler: CallbackReconciler,
    session: Arc<Session>,
    navigator: Arc<dyn Navigator>,
    config: ClientConfig,
}

impl CallbackHandler {
    pub fn new(
        reconciler: CallbackReconciler,
        session: Arc<Session>,
        navigator: Arc<dyn Navigator>,
        config: ClientConfig,
    ) -> Self {
        Self {
            reconciler,
            session,
            navigator,
            config,
        }
    }

    pub async fn handle(&self, url: &str) -> CallbackReport {
        let outcome = match CallbackParams::from_url(url) {
            Ok(params) => self.reconciler.reconcile(&params).await,
            Err(err) => {
                warn!(error = %err, "Callback URL could not be parsed");
                CallbackOutcome::Error(CallbackFailure::missing_parameters())
            }
        };

        let outcome = match outcome {
            CallbackOutcome::Tokens(pair) => match self.session.establish(&pair) {
                Ok(()) => CallbackOutcome::Tokens(pair),
                Err(err) => CallbackOutcome::Error(CallbackFailure::exchange(err.to_string())),
            },
            other => other,
        };

        match &outcome {
            CallbackOutcome::Tokens(_) => {
                info!("Provider callback completed");
                self.navigator.navigate(&self.config.landing_path);
                CallbackReport {
                    outcome,
                    navigated_to: self.config.landing_path.clone(),
                }
            }
            CallbackOutcome::Error(failure) => {
                warn!(code = %failure.code, "Provider callback failed: {}", failure.message());
                tokio::time::sleep(self.config.redirect_delay).await;
                self.navigator.navigate(&self.config.entry_path);
                CallbackReport {
                    outcome,
                    navigated_to: self.config.entry_path.clone(),
                }
            }
            CallbackOutcome::Code(_) => {
                // reconcile() never yields a bare code.
                let failure = CallbackFailure::exchange("Authorization code was not exchanged");
                self.navigator.navigate(&self.config.entry_path);
                CallbackReport {
                    outcome: CallbackOutcome::Error(failure),
                    navigated_to: self.config.entry_path.clone(),
                }
            }
        }
    }
}
