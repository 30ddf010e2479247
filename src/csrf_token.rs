//! State tokens that tie Apple's `form_post` callback to the browser session that started it.
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use tracing::error;

use crate::{
    error::Error,
    random::{OsRandom, SecureRandomSource},
};

const TOKEN_BYTES: usize = 32;

/// A random state value, base64url encoded, sent as the `state` parameter of a web
/// authorization request.
///
/// # Example
/// ```rust,no_run
/// use tiny_apple_signin::csrf_token::CSRFToken;
///
/// let state = CSRFToken::new().expect("Failed to generate CSRF token");
/// println!("state={}", state.value());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct CSRFToken(pub(crate) String);

impl CSRFToken {
    /// Generates a new token from the OS generator.
    pub fn new() -> Result<Self, Error> {
        Self::generate(&mut OsRandom)
    }

    /// Generates a new token from `rng`.
    /// Returns `Error::GenToken` if the source fails.
    pub fn generate<R>(rng: &mut R) -> Result<Self, Error>
    where
        R: SecureRandomSource + ?Sized,
    {
        let mut key = [0u8; TOKEN_BYTES];
        rng.fill_bytes(&mut key).map_err(|e| {
            error!("Failed to generate CSRF token: {}", e);
            Error::GenToken
        })?;
        Ok(Self(URL_SAFE_NO_PAD.encode(key)))
    }

    /// Returns the token as a string reference.
    pub fn value(&self) -> &str {
        &self.0
    }

    /// Compares against a state value received back from Apple.
    pub fn verify(&self, received: &UnCheckedCSRFToken) -> Result<(), Error> {
        if self.0 == received.0 {
            Ok(())
        } else {
            Err(Error::CSRFNotMatch)
        }
    }
}

/// A state value received in Apple's callback.
///
/// It **has not been verified yet** and must be checked against the stored `CSRFToken`.
#[derive(Debug, Clone, PartialEq)]
pub struct UnCheckedCSRFToken(pub(crate) String);

impl From<String> for UnCheckedCSRFToken {
    fn from(value: String) -> Self {
        Self(value)
    }
}
