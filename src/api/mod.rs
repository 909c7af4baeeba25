//! Typed endpoints of the application server.

pub mod admin;
pub mod types;

pub use admin::{AdminApi, ListUsersQuery};
pub use types::{
    AdminUserUpdate, AuthProvider, AuthResponse, AuthUser, CurrentUser, LoginRequest,
    ProfileResponse, ProfileUpdate, SessionTokens, SignupRequest, Tier, User, UserPage,
    UserProfile,
};

use std::sync::Arc;

use crate::auth::CredentialPair;
use crate::error::{AuthError, Result};
use crate::gateway::{ApiRequest, Gateway};

/// Account and session endpoints.
#[derive(Debug, Clone)]
pub struct AuthApi {
    gateway: Arc<Gateway>,
}

impl AuthApi {
    pub fn new(gateway: Arc<Gateway>) -> Self {
        Self { gateway }
    }

    pub fn gateway(&self) -> &Arc<Gateway> {
        &self.gateway
    }

    pub async fn signup(&self, body: &SignupRequest) -> Result<AuthResponse> {
        let request = ApiRequest::post("/register").json(body)?.without_refresh();
        self.gateway.json(request).await
    }

    pub async fn login(&self, body: &LoginRequest) -> Result<AuthResponse> {
        let request = ApiRequest::post("/login").json(body)?.without_refresh();
        self.gateway.json(request).await
    }

    /// Tell the server the session is over.
    ///
    /// An expired token here must not trigger a refresh and redirect, so the
    /// request opts out of recovery.
    pub async fn logout(&self) -> Result<()> {
        self.gateway
            .send(ApiRequest::post("/logout").without_refresh())
            .await?;
        Ok(())
    }

    pub async fn me(&self) -> Result<CurrentUser> {
        self.gateway.json(ApiRequest::get("/me")).await
    }

    pub async fn update_profile(&self, update: &ProfileUpdate) -> Result<ProfileResponse> {
        let request = ApiRequest::patch("/profile").json(update)?;
        self.gateway.json(request).await
    }

    /// Hand an authorization code to the server, which exchanges it with the
    /// identity provider and returns a session.
    pub async fn exchange_code(&self, code: &str) -> Result<CredentialPair> {
        let request = ApiRequest::get("/callback")
            .query("code", code)
            .without_refresh();
        let response: AuthResponse = self
            .gateway
            .json(request)
            .await
            .map_err(into_exchange_error)?;
        response.credentials()
    }

    /// Ask the server to create or update the profile of a first-time OAuth
    /// user before the tokens are used.
    pub async fn provision_oauth_signup(&self, pair: &CredentialPair) -> Result<()> {
        let request = ApiRequest::get("/callback")
            .query("access_token", &pair.access_token)
            .query("refresh_token", &pair.refresh_token)
            .without_refresh();
        self.gateway
            .send(request)
            .await
            .map_err(into_exchange_error)?;
        Ok(())
    }

    pub fn google_auth_url(&self) -> String {
        self.gateway.config().google_auth_url()
    }
}

fn into_exchange_error(err: AuthError) -> AuthError {
    match err {
        AuthError::Api { message, .. } => AuthError::Exchange(message),
        AuthError::CredentialExpired(message) => AuthError::Exchange(message),
        AuthError::Network(err) => AuthError::Exchange(err.to_string()),
        AuthError::Serialization(message) => {
            AuthError::Exchange(format!("Invalid callback response: {message}"))
        }
        other => other,
    }
}
