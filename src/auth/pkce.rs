//! PKCE authorization-code flow against the identity provider.

use std::fs;
use std::path::Path;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use super::store::write_private;
use super::token::CredentialPair;
use crate::error::{AuthError, Result};

const DEFAULT_SCOPES: &str = "openid email profile";

/// Identity-provider settings for the PKCE flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PkceConfig {
    pub authorize_url: String,
    pub token_url: String,
    pub client_id: String,
    pub redirect_uri: String,
    pub scopes: String,
}

impl PkceConfig {
    pub fn new(
        authorize_url: impl Into<String>,
        token_url: impl Into<String>,
        client_id: impl Into<String>,
        redirect_uri: impl Into<String>,
    ) -> Self {
        Self {
            authorize_url: authorize_url.into(),
            token_url: token_url.into(),
            client_id: client_id.into(),
            redirect_uri: redirect_uri.into(),
            scopes: DEFAULT_SCOPES.to_string(),
        }
    }
}

/// Secret material generated when a PKCE flow starts.
///
/// The caller sends the user to `authorize_url` and keeps the session until
/// the provider redirects back; it can be persisted with [`PkceSession::save`]
/// across process restarts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PkceSession {
    pub authorize_url: String,
    pub state: String,
    pub code_verifier: String,
}

impl PkceSession {
    /// Persist with owner-only permissions; the verifier is a secret.
    pub fn save(&self, path: &Path) -> Result<()> {
        write_private(path, &serde_json::to_vec(self)?, "PKCE session")
    }

    pub fn load(path: &Path) -> Result<Option<Self>> {
        match fs::read(path) {
            Ok(raw) => Ok(Some(serde_json::from_slice(&raw)?)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(AuthError::Io(err)),
        }
    }
}

/// Client for the provider side of the PKCE flow.
#[derive(Debug, Clone)]
pub struct PkceFlow {
    client: reqwest::Client,
    config: PkceConfig,
}

impl PkceFlow {
    pub fn new(config: PkceConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    pub fn config(&self) -> &PkceConfig {
        &self.config
    }

    /// Generate `state`, a code verifier and its S256 challenge, and build
    /// the authorize URL.
    pub fn start(&self) -> Result<PkceSession> {
        let state = random_hex();
        let code_verifier = generate_code_verifier();
        let code_challenge = compute_code_challenge(&code_verifier);

        let authorize_url = reqwest::Url::parse_with_params(
            &self.config.authorize_url,
            &[
                ("client_id", self.config.client_id.as_str()),
                ("redirect_uri", self.config.redirect_uri.as_str()),
                ("response_type", "code"),
                ("scope", self.config.scopes.as_str()),
                ("state", state.as_str()),
                ("code_challenge", code_challenge.as_str()),
                ("code_challenge_method", "S256"),
            ],
        )?;

        Ok(PkceSession {
            authorize_url: authorize_url.into(),
            state,
            code_verifier,
        })
    }

    /// Exchange an authorization code for a credential pair.
    ///
    /// When the redirect carried a `state`, it must match the session.
    pub async fn exchange(
        &self,
        session: &PkceSession,
        code: &str,
        returned_state: Option<&str>,
    ) -> Result<CredentialPair> {
        if let Some(returned_state) = returned_state {
            if returned_state != session.state {
                return Err(AuthError::Exchange(
                    "OAuth state mismatch between redirect and PKCE session".to_string(),
                ));
            }
        }

        debug!(token_url = %self.config.token_url, "Exchanging authorization code");
        let resp = self
            .client
            .post(&self.config.token_url)
            .form(&[
                ("grant_type", "authorization_code"),
                ("client_id", self.config.client_id.as_str()),
                ("code", code),
                ("redirect_uri", self.config.redirect_uri.as_str()),
                ("code_verifier", session.code_verifier.as_str()),
            ])
            .send()
            .await
            .map_err(|err| AuthError::Exchange(err.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            warn!(%status, "Provider rejected authorization code");
            return Err(AuthError::Exchange(format!(
                "Token exchange failed with status {status}"
            )));
        }

        let payload: TokenExchangeResponse = resp
            .json()
            .await
            .map_err(|err| AuthError::Exchange(format!("Invalid token response: {err}")))?;
        payload.into_pair()
    }
}

#[derive(Debug, Deserialize)]
struct TokenExchangeResponse {
    access_token: Option<String>,
    refresh_token: Option<String>,
}

impl TokenExchangeResponse {
    fn into_pair(self) -> Result<CredentialPair> {
        match (self.access_token, self.refresh_token) {
            (Some(access), Some(refresh)) => {
                let pair = CredentialPair::new(access, refresh);
                if pair.is_complete() {
                    Ok(pair)
                } else {
                    Err(incomplete_session())
                }
            }
            _ => Err(incomplete_session()),
        }
    }
}

fn incomplete_session() -> AuthError {
    AuthError::Exchange("Provider returned an incomplete session".to_string())
}

fn random_bytes<const N: usize>() -> [u8; N] {
    let mut buf = [0u8; N];
    for chunk in buf.chunks_mut(16) {
        let id = uuid::Uuid::new_v4();
        let len = chunk.len();
        chunk.copy_from_slice(&id.as_bytes()[..len]);
    }
    buf
}

fn random_hex() -> String {
    random_bytes::<32>()
        .iter()
        .map(|byte| format!("{byte:02x}"))
        .collect()
}

fn generate_code_verifier() -> String {
    URL_SAFE_NO_PAD.encode(random_bytes::<32>())
}

pub(crate) fn compute_code_challenge(verifier: &str) -> String {
    let digest = Sha256::digest(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(digest)
}
