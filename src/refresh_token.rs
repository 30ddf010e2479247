//! provides functionality for restoring a persisted session with its refresh token.
//!
//! This module includes:
//! - RefreshToken: The long-lived token of a signed-in user, safe to persist.
//! - SecureTokenRequest: A form request to the secure token endpoint.
//! - SecureTokenResponse: The fresh tokens returned by the secure token endpoint.

use serde::{Deserialize, Serialize};

use crate::config::Config;

/// Represents the refresh token of a backend session.
///
/// Hosts persist it after sign-in and hand it back to
/// [`AuthService::restore_previous_sign_in`](crate::service::AuthService::restore_previous_sign_in)
/// after a restart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RefreshToken(pub(crate) String);

impl RefreshToken {
    /// Creates a new refresh token from a string.
    pub fn new(value: &str) -> Self {
        Self(value.to_string())
    }
    /// Returns the refresh token as a String.
    pub fn value(&self) -> String {
        self.0.to_owned()
    }
    /// Returns the refresh token as a str.
    pub fn value_as_str(&self) -> &str {
        &self.0
    }
}

/// Represents a request to exchange a refresh token for a new ID token.
#[derive(Debug, Clone, Serialize)]
pub struct SecureTokenRequest {
    #[serde(skip)]
    endpoint: String,
    #[serde(skip)]
    api_key: String,
    grant_type: String,
    refresh_token: RefreshToken,
}

impl SecureTokenRequest {
    pub fn new(config: &Config, refresh_token: &RefreshToken) -> Self {
        Self {
            endpoint: config.token_endpoint.0.to_owned(),
            api_key: config.api_key.0.to_owned(),
            refresh_token: refresh_token.to_owned(),
            grant_type: "refresh_token".to_string(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }
}

/// Represents the response of the secure token endpoint.
///
/// The refresh token may be rotated; the returned one replaces the persisted one.
#[derive(Debug, Clone, Deserialize)]
pub struct SecureTokenResponse {
    id_token: String,
    refresh_token: RefreshToken,
    user_id: String,
}

impl SecureTokenResponse {
    /// Retrieves the newly issued ID token.
    pub fn id_token(&self) -> &str {
        &self.id_token
    }
    pub fn refresh_token(&self) -> &RefreshToken {
        &self.refresh_token
    }
    pub fn user_id(&self) -> &str {
        &self.user_id
    }
}
