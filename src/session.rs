//! Signed-in user and the two-state outcome surfaced to callers.
use serde::Serialize;

use crate::refresh_token::RefreshToken;

/// A provider linked to the signed-in account, e.g. `apple.com`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProviderInfo {
    pub provider_id: String,
}

/// A user signed in on the identity backend.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct User {
    pub(crate) uid: String,
    pub(crate) display_name: Option<String>,
    pub(crate) email: Option<String>,
    pub(crate) is_anonymous: bool,
    pub(crate) provider_data: Vec<ProviderInfo>,
    #[serde(skip)]
    pub(crate) id_token: String,
    #[serde(skip)]
    pub(crate) refresh_token: RefreshToken,
}

impl User {
    pub fn uid(&self) -> &str {
        &self.uid
    }

    pub fn display_name(&self) -> Option<&str> {
        self.display_name.as_deref()
    }

    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    pub fn is_anonymous(&self) -> bool {
        self.is_anonymous
    }

    pub fn provider_data(&self) -> &[ProviderInfo] {
        &self.provider_data
    }

    /// Backend ID token authorising calls made on behalf of this user.
    pub fn id_token(&self) -> &str {
        &self.id_token
    }

    /// Token to persist for restoring this session later.
    pub fn refresh_token(&self) -> &RefreshToken {
        &self.refresh_token
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(tag = "state", content = "user", rename_all = "snake_case")]
pub enum AuthState {
    SignedIn(User),
    #[default]
    SignedOut,
}

impl AuthState {
    pub fn is_signed_in(&self) -> bool {
        matches!(self, Self::SignedIn(_))
    }

    pub fn user(&self) -> Option<&User> {
        match self {
            Self::SignedIn(user) => Some(user),
            Self::SignedOut => None,
        }
    }
}
