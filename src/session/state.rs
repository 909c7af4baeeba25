use strum::Display;

use crate::api::{User, UserProfile};

/// Lifecycle position of the session.
///
/// `Uninitialized → Loading → {Authenticated, Anonymous}`, then only
/// `Authenticated ⇄ Anonymous`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum Phase {
    Uninitialized,
    Loading,
    Authenticated,
    Anonymous,
}

/// Application-visible authentication state.
///
/// `is_authenticated()` is derived from `user`, so the two can never
/// disagree.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionState {
    phase: Phase,
    user: Option<User>,
    profile: Option<UserProfile>,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            phase: Phase::Uninitialized,
            user: None,
            profile: None,
        }
    }
}

impl SessionState {
    pub(crate) fn loading() -> Self {
        Self {
            phase: Phase::Loading,
            ..Self::default()
        }
    }

    pub(crate) fn anonymous() -> Self {
        Self {
            phase: Phase::Anonymous,
            user: None,
            profile: None,
        }
    }

    pub(crate) fn authenticated(user: User, profile: Option<UserProfile>) -> Self {
        Self {
            phase: Phase::Authenticated,
            user: Some(user),
            profile,
        }
    }

    pub(crate) fn replace_profile(&mut self, profile: UserProfile) {
        self.profile = Some(profile);
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    pub fn profile(&self) -> Option<&UserProfile> {
        self.profile.as_ref()
    }

    /// True only until the initial bootstrap has resolved.
    pub fn is_loading(&self) -> bool {
        matches!(self.phase, Phase::Uninitialized | Phase::Loading)
    }

    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    pub fn is_admin(&self) -> bool {
        self.profile.as_ref().is_some_and(|profile| profile.is_admin)
    }
}
