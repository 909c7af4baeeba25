//! Credential storage and provider callback handling.

pub mod callback;
pub mod pkce;
pub mod store;
pub mod token;

pub use callback::{
    classify, CallbackFailure, CallbackHandler, CallbackOutcome, CallbackParams,
    CallbackReconciler, CallbackReport, CodeExchange, FailureKind, PkceCodeExchange,
    ServerCodeExchange,
};
pub use pkce::{PkceConfig, PkceFlow, PkceSession};
pub use store::{CredentialStore, FileCredentialStore, MemoryCredentialStore};
pub use token::CredentialPair;
