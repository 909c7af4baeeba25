//! Authenticated request gateway.
//!
//! Every call to the application server goes through [`Gateway::send`]. The
//! gateway attaches the stored access token, and when the server answers
//! `401` it performs at most one silent refresh-and-retry for that request.
//! Concurrent requests that fail with the same expired token share a single
//! refresh call.

pub mod navigator;
pub mod request;

pub use navigator::{Navigator, RecordingNavigator, TracingNavigator};
pub use request::{ApiRequest, ApiResponse};

use std::sync::{Arc, Mutex as StdMutex};

use reqwest::header::AUTHORIZATION;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::auth::store::CredentialStore;
use crate::auth::token::{fingerprint, CredentialPair};
use crate::config::ClientConfig;
use crate::error::{status_to_error, AuthError, Result};

/// HTTP front door to the application server.
///
/// # Example
/// ```no_run
/// use std::sync::Arc;
/// use authkeep::auth::MemoryCredentialStore;
/// use authkeep::config::ClientConfig;
/// use authkeep::gateway::{ApiRequest, Gateway, TracingNavigator};
///
/// # async fn example() -> authkeep::error::Result<()> {
/// let gateway = Gateway::new(
///     ClientConfig::default(),
///     Arc::new(MemoryCredentialStore::new()),
///     Arc::new(TracingNavigator),
/// )?;
/// let me: serde_json::Value = gateway.json(ApiRequest::get("/me")).await?;
/// # Ok(())
/// # }
/// ```
pub struct Gateway {
    client: reqwest::Client,
    shared: Arc<Shared>,
}

/// Called with the reason whenever a failed refresh ends the session.
pub type TeardownHook = Arc<dyn Fn(&str) + Send + Sync>;

/// State the refresh task needs after the requesting caller may be gone.
struct Shared {
    client: reqwest::Client,
    config: ClientConfig,
    store: Arc<dyn CredentialStore>,
    navigator: Arc<dyn Navigator>,
    refresh_lock: Mutex<()>,
    teardown_hooks: StdMutex<Vec<TeardownHook>>,
}

impl Gateway {
    pub fn new(
        config: ClientConfig,
        store: Arc<dyn CredentialStore>,
        navigator: Arc<dyn Navigator>,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self::with_client(client, config, store, navigator))
    }

    /// Use a preconfigured HTTP client (custom TLS, proxies, tests).
    pub fn with_client(
        client: reqwest::Client,
        config: ClientConfig,
        store: Arc<dyn CredentialStore>,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        let shared = Arc::new(Shared {
            client: client.clone(),
            config,
            store,
            navigator,
            refresh_lock: Mutex::new(()),
            teardown_hooks: StdMutex::new(Vec::new()),
        });
        Self { client, shared }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.shared.config
    }

    pub fn store(&self) -> &Arc<dyn CredentialStore> {
        &self.shared.store
    }

    pub fn navigator(&self) -> &Arc<dyn Navigator> {
        &self.shared.navigator
    }

    /// Register a hook run after a failed refresh has cleared the
    /// credentials, whichever request triggered it.
    pub fn on_teardown<F>(&self, hook: F)
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        if let Ok(mut hooks) = self.shared.teardown_hooks.lock() {
            hooks.push(Arc::new(hook));
        }
    }

    /// Send a request and decode a successful JSON body.
    pub async fn json<T: serde::de::DeserializeOwned>(&self, request: ApiRequest) -> Result<T> {
        self.send(request).await?.json()
    }

    /// Send a request, recovering once from an expired access token.
    ///
    /// A retried request that is rejected again is returned to the caller as
    /// [`AuthError::CredentialExpired`] without a second refresh. When the
    /// refresh itself fails, the credentials are cleared, the navigator is
    /// sent to the entry path, teardown hooks run, and
    /// [`AuthError::RefreshFailed`] is returned in place of the original
    /// response.
    ///
    /// The refresh runs on its own task: dropping this future does not
    /// abandon a refresh the server may already have honoured.
    pub async fn send(&self, request: ApiRequest) -> Result<ApiResponse> {
        let (response, sent_with) = self.dispatch(&request).await?;
        if !request.refresh_on_expiry {
            return response.into_api_result();
        }
        if !response.is_unauthorized() {
            return response.into_result();
        }
        if request.is_retry() {
            debug!(path = %request.path, "Retried request rejected again; giving up");
            return response.into_result();
        }

        debug!(path = %request.path, "Access token rejected; attempting refresh");
        let shared = self.shared.clone();
        tokio::spawn(async move { shared.recover(sent_with).await })
            .await
            .map_err(|err| AuthError::RefreshFailed(format!("refresh task ended: {err}")))??;

        let retry = request.into_retry();
        let (response, _) = self.dispatch(&retry).await?;
        response.into_result()
    }

    async fn dispatch(&self, request: &ApiRequest) -> Result<(ApiResponse, Option<String>)> {
        let current = self.shared.current_pair();
        let url = self.shared.config.endpoint(&request.path);

        let mut builder = self.client.request(request.method.clone(), &url);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }
        if let Some(pair) = &current {
            builder = builder.header(AUTHORIZATION, pair.bearer());
        }

        debug!(
            method = %request.method,
            path = %request.path,
            authenticated = current.is_some(),
            retry = request.retried,
            "Sending request"
        );
        let resp = builder.send().await?;
        let status = resp.status();
        let body = resp.text().await?;
        Ok((
            ApiResponse::new(status, body),
            current.map(|pair| pair.access_token),
        ))
    }
}

impl Shared {
    fn current_pair(&self) -> Option<CredentialPair> {
        match self.store.get() {
            Ok(pair) => pair,
            Err(err) => {
                warn!(error = %err, "Credential store unreadable; sending unauthenticated");
                None
            }
        }
    }

    /// Obtain a fresh pair after `stale` was rejected.
    ///
    /// Holders of the same stale token queue on `refresh_lock`; only the
    /// first one reaches the server, the rest pick up the pair it stored.
    async fn recover(&self, stale: Option<String>) -> Result<CredentialPair> {
        let _guard = self.refresh_lock.lock().await;

        let current = match self.store.get() {
            Ok(current) => current,
            Err(err) => return Err(self.teardown(err.to_string())),
        };

        let pair = match current {
            Some(pair) if Some(&pair.access_token) != stale.as_ref() => {
                debug!("Credentials already refreshed by a concurrent request");
                return Ok(pair);
            }
            Some(pair) => pair,
            None if stale.is_some() => {
                // A concurrent refresh already failed and tore the session down.
                return Err(AuthError::RefreshFailed(
                    "session ended while waiting for refresh".to_string(),
                ));
            }
            None => return Err(self.teardown("no refresh credential stored".to_string())),
        };

        match self.refresh(&pair.refresh_token).await {
            Ok(fresh) => {
                if let Err(err) = self.store.set(&fresh) {
                    return Err(self.teardown(err.to_string()));
                }
                info!(access = %fingerprint(&fresh.access_token), "Session refreshed");
                Ok(fresh)
            }
            Err(err) => Err(self.teardown(err.to_string())),
        }
    }

    async fn refresh(&self, refresh_token: &str) -> Result<CredentialPair> {
        let url = self.config.endpoint("/refresh");
        let resp = self
            .client
            .post(&url)
            .json(&RefreshRequest { refresh_token })
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(status_to_error(status.as_u16(), &body));
        }

        let payload: RefreshResponse = resp.json().await?;
        // Servers that do not rotate refresh tokens omit the field.
        let refresh = payload
            .refresh_token
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| refresh_token.to_string());
        Ok(CredentialPair::new(payload.access_token, refresh))
    }

    fn teardown(&self, reason: String) -> AuthError {
        warn!(%reason, "Session could not be refreshed; signing out");
        if let Err(err) = self.store.clear() {
            warn!(error = %err, "Failed to clear credentials");
        }
        let hooks = self
            .teardown_hooks
            .lock()
            .map(|hooks| hooks.clone())
            .unwrap_or_default();
        for hook in hooks {
            hook(&reason);
        }
        self.navigator.navigate(&self.config.entry_path);
        AuthError::RefreshFailed(reason)
    }
}

impl std::fmt::Debug for Gateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gateway")
            .field("api_url", &self.shared.config.api_url)
            .field("has_credentials", &self.shared.store.has_credentials())
            .finish()
    }
}

#[derive(Debug, Serialize)]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    access_token: String,
    refresh_token: Option<String>,
}
