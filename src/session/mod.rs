//! Session state machine.
//!
//! [`Session`] owns the single [`SessionState`] of the application and the
//! lifecycle operations that change it. Presentation code observes the state
//! through [`Session::subscribe`] and never mutates it directly.

pub mod state;

pub use state::{Phase, SessionState};

use std::future::Future;
use std::sync::{Arc, Weak};

use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn};

use crate::api::{AuthApi, AuthResponse, LoginRequest, ProfileUpdate, SignupRequest, UserProfile};
use crate::auth::{CredentialPair, CredentialStore};
use crate::error::{AuthError, Result};
use crate::gateway::Gateway;

/// The authenticated application session.
///
/// Lifecycle-mutating operations are serialized: each one runs to completion
/// before the next starts, so their state writes never interleave.
///
/// # Example
/// ```no_run
/// use std::sync::Arc;
/// use authkeep::auth::FileCredentialStore;
/// use authkeep::config::ClientConfig;
/// use authkeep::gateway::{Gateway, TracingNavigator};
/// use authkeep::session::Session;
///
/// # async fn example() -> authkeep::error::Result<()> {
/// let config = ClientConfig::from_env()?;
/// let store = Arc::new(FileCredentialStore::new(&config.credentials_dir));
/// let gateway = Arc::new(Gateway::new(config, store, Arc::new(TracingNavigator))?);
/// let session = Session::new(gateway);
///
/// let state = session.bootstrap().await;
/// if !state.is_authenticated() {
///     session.login("ada@example.com", "correct horse").await?;
/// }
/// # Ok(())
/// # }
/// ```
pub struct Session {
    inner: Arc<Inner>,
}

struct Inner {
    api: AuthApi,
    store: Arc<dyn CredentialStore>,
    state: watch::Sender<SessionState>,
    lifecycle: Mutex<()>,
}

impl Session {
    pub fn new(gateway: Arc<Gateway>) -> Self {
        let store = gateway.store().clone();
        let (state, _) = watch::channel(SessionState::default());
        let inner = Arc::new(Inner {
            api: AuthApi::new(gateway.clone()),
            store,
            state,
            lifecycle: Mutex::new(()),
        });

        // A refresh failure on any request ends the session, not only the
        // ones issued from here.
        let weak: Weak<Inner> = Arc::downgrade(&inner);
        gateway.on_teardown(move |reason| {
            if let Some(inner) = weak.upgrade() {
                inner.end_session(reason);
            }
        });

        Self { inner }
    }

    pub fn api(&self) -> &AuthApi {
        &self.inner.api
    }

    /// Snapshot of the current state.
    pub fn state(&self) -> SessionState {
        self.inner.current()
    }

    /// Read-only view that is notified on every transition.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.inner.state.subscribe()
    }

    /// Resolve the initial state from stored credentials.
    ///
    /// Runs once; later calls return the current state untouched. Failures
    /// never surface: they clear the credentials and end in `Anonymous`.
    pub async fn bootstrap(&self) -> SessionState {
        match self.run(|inner| async move { inner.bootstrap().await }).await {
            Ok(state) => state,
            Err(err) => {
                warn!(error = %err, "Bootstrap did not complete");
                self.state()
            }
        }
    }

    pub async fn signup(&self, email: &str, password: &str, full_name: &str) -> Result<()> {
        let body = SignupRequest {
            email: email.to_string(),
            password: password.to_string(),
            full_name: full_name.to_string(),
        };
        self.run(|inner| async move {
            inner.ensure_bootstrapped()?;
            let response = inner.api.signup(&body).await?;
            inner.adopt(response)
        })
        .await?
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<()> {
        let body = LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        };
        self.run(|inner| async move {
            inner.ensure_bootstrapped()?;
            let response = inner.api.login(&body).await?;
            inner.adopt(response)
        })
        .await?
    }

    /// Send the browsing context to the provider's sign-in page.
    ///
    /// Does not change the state; the redirect back is handled by
    /// [`crate::auth::CallbackHandler`].
    pub fn login_with_google(&self) -> String {
        let api = &self.inner.api;
        let url = api.google_auth_url();
        info!("Redirecting to Google sign-in");
        api.gateway().navigator().navigate(&url);
        url
    }

    /// Sign out locally, telling the server on a best-effort basis.
    ///
    /// Always ends `Anonymous` with an empty credential store, whether or
    /// not the server could be reached.
    pub async fn logout(&self) {
        let outcome = self.run(|inner| async move { inner.logout().await }).await;
        if let Err(err) = outcome {
            warn!(error = %err, "Logout task did not complete; signing out locally");
            self.inner.clear_credentials();
            self.inner.state.send_replace(SessionState::anonymous());
        }
    }

    /// Apply a profile change and replace the stored profile with the
    /// server's answer. The identity is left untouched.
    pub async fn update_profile(&self, update: &ProfileUpdate) -> Result<UserProfile> {
        let update = update.clone();
        self.run(|inner| async move {
            inner.ensure_bootstrapped()?;
            if !inner.current().is_authenticated() {
                return Err(AuthError::InvalidState("not signed in".to_string()));
            }
            let profile = inner.api.update_profile(&update).await?.profile;
            inner
                .state
                .send_modify(|state| state.replace_profile(profile.clone()));
            Ok(profile)
        })
        .await?
    }

    /// Re-fetch identity and profile.
    pub async fn refresh_user(&self) -> Result<()> {
        self.run(|inner| async move {
            inner.ensure_bootstrapped()?;
            let current = inner.api.me().await?;
            let user = current.user.user();
            inner
                .state
                .send_replace(SessionState::authenticated(user, Some(current.user)));
            Ok(())
        })
        .await?
    }

    /// Accept credentials produced by a provider callback.
    ///
    /// The pair is stored; the visible state is unchanged until
    /// [`Session::bootstrap`] or [`Session::refresh_user`] fetches the
    /// identity.
    pub fn establish(&self, pair: &CredentialPair) -> Result<()> {
        self.inner.store.set(pair)?;
        info!("Session established from provider callback");
        Ok(())
    }

    /// Run a lifecycle operation on its own task, after any earlier one.
    ///
    /// Dropping the returned future does not cancel the operation, so a
    /// caller that gives up never leaves the state half-written.
    async fn run<T, F, Fut>(&self, op: F) -> Result<T>
    where
        F: FnOnce(Arc<Inner>) -> Fut,
        Fut: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let inner = self.inner.clone();
        let task = op(inner.clone());
        tokio::spawn(async move {
            let _guard = inner.lifecycle.lock().await;
            task.await
        })
        .await
        .map_err(|err| {
            AuthError::InvalidState(format!("session operation did not complete: {err}"))
        })
    }
}

impl Inner {
    fn current(&self) -> SessionState {
        self.state.borrow().clone()
    }

    async fn bootstrap(&self) -> SessionState {
        if self.current().phase() != Phase::Uninitialized {
            return self.current();
        }
        self.state.send_replace(SessionState::loading());

        if !self.store.has_credentials() {
            debug!("No stored credentials; starting anonymous");
            self.state.send_replace(SessionState::anonymous());
            return self.current();
        }

        match self.api.me().await {
            Ok(current) => {
                info!(user_id = %current.user.id, "Restored session");
                let user = current.user.user();
                self.state
                    .send_replace(SessionState::authenticated(user, Some(current.user)));
            }
            Err(err) => {
                warn!(error = %err, "Failed to restore session; clearing credentials");
                self.clear_credentials();
                self.state.send_replace(SessionState::anonymous());
            }
        }
        self.current()
    }

    async fn logout(&self) {
        if self.store.has_credentials() {
            if let Err(err) = self.api.logout().await {
                warn!(error = %err, "Server logout failed; signing out locally");
            }
        }
        self.clear_credentials();
        self.state.send_replace(SessionState::anonymous());
        info!("Signed out");
    }

    fn adopt(&self, response: AuthResponse) -> Result<()> {
        let pair = response.credentials()?;
        self.store.set(&pair)?;
        let user = response.user();
        info!(user_id = %user.id, "Signed in");
        self.state
            .send_replace(SessionState::authenticated(user, response.user.profile));
        Ok(())
    }

    fn ensure_bootstrapped(&self) -> Result<()> {
        if self.current().is_loading() {
            return Err(AuthError::InvalidState(
                "session has not been bootstrapped".to_string(),
            ));
        }
        Ok(())
    }

    /// The gateway already cleared the store and redirected; mirror that in
    /// the visible state.
    fn end_session(&self, reason: &str) {
        let ended = self.state.send_if_modified(|state| {
            if state.is_authenticated() {
                *state = SessionState::anonymous();
                true
            } else {
                false
            }
        });
        if ended {
            info!(%reason, "Session ended by failed refresh");
        }
    }

    fn clear_credentials(&self) {
        if let Err(err) = self.store.clear() {
            warn!(error = %err, "Failed to clear credentials");
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("phase", &self.inner.current().phase())
            .finish()
    }
}
