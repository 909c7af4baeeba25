//! Authkeep: client-side session and token lifecycle.
//!
//! Keeps a user signed in against an application server: persists the
//! access/refresh credential pair, reconciles identity-provider redirects,
//! attaches credentials to outgoing calls with one silent
//! refresh-and-retry on expiry, and exposes the session as an observable
//! state machine.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use authkeep::prelude::*;
//!
//! # async fn example() -> authkeep::error::Result<()> {
//! let config = ClientConfig::from_env()?;
//! let store = Arc::new(FileCredentialStore::new(&config.credentials_dir));
//! let gateway = Arc::new(Gateway::new(config, store, Arc::new(TracingNavigator))?);
//! let session = Session::new(gateway);
//!
//! if !session.bootstrap().await.is_authenticated() {
//!     session.login("ada@example.com", "correct horse").await?;
//! }
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod gateway;
pub mod prelude;
pub mod session;

#[cfg(feature = "cli")]
pub mod cli;
