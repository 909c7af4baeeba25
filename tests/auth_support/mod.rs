#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use authkeep::auth::{CredentialPair, CredentialStore, MemoryCredentialStore};
use authkeep::config::ClientConfig;
use authkeep::gateway::{Gateway, RecordingNavigator};
use authkeep::session::Session;
use serde_json::{json, Value};
use wiremock::MockServer;

pub const PREFIX: &str = "/api/core";

/// Full path of an endpoint under the default prefix.
pub fn api_path(endpoint: &str) -> String {
    format!("{PREFIX}{endpoint}")
}

/// A gateway wired to a mock server, with inspectable store and navigator.
pub struct Harness {
    pub config: ClientConfig,
    pub store: Arc<MemoryCredentialStore>,
    pub navigator: Arc<RecordingNavigator>,
    pub gateway: Arc<Gateway>,
}

impl Harness {
    pub fn new(base_url: &str, pair: Option<CredentialPair>) -> Self {
        let config = ClientConfig::new(base_url).with_redirect_delay(Duration::ZERO);
        Self::with_config(config, pair)
    }

    pub fn with_config(config: ClientConfig, pair: Option<CredentialPair>) -> Self {
        let store = Arc::new(match pair {
            Some(pair) => MemoryCredentialStore::with_pair(pair),
            None => MemoryCredentialStore::new(),
        });
        let navigator = Arc::new(RecordingNavigator::new());
        let gateway = Arc::new(
            Gateway::new(config.clone(), store.clone(), navigator.clone())
                .expect("gateway should build"),
        );
        Self {
            config,
            store,
            navigator,
            gateway,
        }
    }

    pub async fn serve(pair: Option<CredentialPair>) -> (MockServer, Self) {
        let server = MockServer::start().await;
        let harness = Self::new(&server.uri(), pair);
        (server, harness)
    }

    pub fn session(&self) -> Arc<Session> {
        Arc::new(Session::new(self.gateway.clone()))
    }

    pub fn stored(&self) -> Option<CredentialPair> {
        self.store.get().expect("memory store read")
    }
}

pub fn pair(access: &str, refresh: &str) -> CredentialPair {
    CredentialPair::new(access, refresh)
}

pub fn profile_json(id: &str, email: &str) -> Value {
    json!({
        "id": id,
        "email": email,
        "full_name": "Ada Lovelace",
        "auth_provider": "email",
        "tier": "free",
        "is_admin": false,
        "monthly_budget_usd": 10.0,
        "current_month_spent_usd": 0.0,
        "rag_search_enabled": true
    })
}

pub fn me_json(id: &str, email: &str) -> Value {
    json!({ "user": profile_json(id, email) })
}

pub fn auth_response_json(access: &str, refresh: &str, id: &str, email: &str) -> Value {
    json!({
        "access_token": access,
        "refresh_token": refresh,
        "token_type": "bearer",
        "expires_in": 3600,
        "user": { "id": id, "email": email, "profile": profile_json(id, email) }
    })
}
