//! Convenience re-exports for common use.

pub use crate::api::{AuthApi, ProfileUpdate, User, UserProfile};
pub use crate::auth::{
    CallbackHandler, CallbackOutcome, CallbackReconciler, CredentialPair, CredentialStore,
    FileCredentialStore, MemoryCredentialStore,
};
pub use crate::config::{CallbackMode, ClientConfig};
pub use crate::error::{AuthError, Result};
pub use crate::gateway::{ApiRequest, Gateway, Navigator, TracingNavigator};
pub use crate::session::{Phase, Session, SessionState};
