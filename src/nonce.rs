//! Represents the single-use nonce bound to a Sign in with Apple request.
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::{
    error::Error,
    random::{OsRandom, SecureRandomSource},
};

/// Symbols a nonce is drawn from.
pub const CHARSET: &[u8; 65] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz-._";

/// Nonce length used when none is configured.
pub const DEFAULT_NONCE_LENGTH: usize = 32;

const BLOCK_LEN: usize = 16;

/// A `Nonce` is a **unique, random value** used to prevent replay attacks.
/// Only its SHA-256 digest is sent to Apple; the raw value is handed to the
/// identity backend together with the returned identity token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Nonce(pub(crate) String);

/// # **Overview**
/// A nonce lives for exactly one authorization attempt: it is created right
/// before the request is sent and consumed when the response is processed.
///
/// # **Implementation Details**
///
/// - Bytes are requested from a [`SecureRandomSource`] in blocks of 16.
/// - A byte is kept only when it indexes into [`CHARSET`]; all other bytes are
///   dropped, so every symbol is equally likely.
///
/// # **Example**
///
/// ```rust,no_run
/// use tiny_apple_signin::{nonce::Nonce, random::OsRandom};
///
/// let nonce = Nonce::generate(&mut OsRandom, 32).unwrap();
/// assert_eq!(nonce.value().len(), 32);
/// ```
impl Nonce {
    /// Generates a nonce of [`DEFAULT_NONCE_LENGTH`] from the OS generator.
    pub fn new() -> Result<Self, Error> {
        Self::generate(&mut OsRandom, DEFAULT_NONCE_LENGTH)
    }

    /// Generates a nonce of `length` symbols from `rng`.
    ///
    /// Returns `Error::GenNonce` if the random source fails.
    ///
    /// # Panics
    /// Panics if `length` is zero.
    pub fn generate<R>(rng: &mut R, length: usize) -> Result<Self, Error>
    where
        R: SecureRandomSource + ?Sized,
    {
        assert!(length > 0, "nonce length must be greater than zero");

        let mut result = String::with_capacity(length);
        let mut block = [0u8; BLOCK_LEN];
        while result.len() < length {
            rng.fill_bytes(&mut block).map_err(|e| {
                error!("Unable to generate nonce: {}", e);
                Error::GenNonce
            })?;
            for symbol in block.iter().filter_map(|b| CHARSET.get(usize::from(*b))) {
                if result.len() == length {
                    break;
                }
                result.push(char::from(*symbol));
            }
        }
        Ok(Self(result))
    }

    /// Returns the raw nonce.
    pub fn value(&self) -> &str {
        &self.0
    }
}

impl From<String> for Nonce {
    fn from(value: String) -> Self {
        Self(value)
    }
}

// ==========Test==========
#[cfg(test)]
mod test {
    use crate::{
        error::Error,
        random::fake::{FailingRandom, SequenceRandom},
    };

    use super::{CHARSET, DEFAULT_NONCE_LENGTH, Nonce};

    #[test]
    fn test_charset() {
        assert_eq!(CHARSET.len(), 65);
        assert!(CHARSET.iter().all(|c| c.is_ascii_alphanumeric() || b"-._".contains(c)));
    }

    #[test]
    fn test_nonce_new() {
        let nonce = Nonce::new().unwrap();
        assert_eq!(nonce.0.len(), DEFAULT_NONCE_LENGTH);
        assert!(nonce.0.bytes().all(|c| CHARSET.contains(&c)));
    }

    #[test]
    fn test_nonce_lengths() {
        let mut rng = crate::random::OsRandom;
        for length in [1, 2, 15, 16, 17, 32, 64, 100] {
            let nonce = Nonce::generate(&mut rng, length).unwrap();
            assert_eq!(nonce.value().len(), length);
            assert!(nonce.value().bytes().all(|c| CHARSET.contains(&c)));
        }
    }

    #[test]
    fn test_nonce_rejects_out_of_range_bytes() {
        // 65 and above are rejected, only 0, 10 and 64 map to symbols
        let mut rng = SequenceRandom::new(vec![0, 65, 200, 10, 255, 64]);
        let nonce = Nonce::generate(&mut rng, 6).unwrap();
        assert_eq!(nonce.value(), "0A_0A_");
    }

    #[test]
    fn test_nonce_requests_more_blocks() {
        // one accepted byte per block of 16
        let mut bytes = vec![255u8; 15];
        bytes.push(1);
        let mut rng = SequenceRandom::new(bytes);
        let nonce = Nonce::generate(&mut rng, 3).unwrap();
        assert_eq!(nonce.value(), "111");
        assert_eq!(rng.calls, 3);
    }

    #[test]
    fn test_nonce_rng_failure() {
        let nonce = Nonce::generate(&mut FailingRandom, 32);
        assert!(matches!(nonce, Err(Error::GenNonce)));
    }

    #[test]
    #[should_panic(expected = "nonce length must be greater than zero")]
    fn test_nonce_zero_length() {
        let _ = Nonce::generate(&mut SequenceRandom::new(vec![1]), 0);
    }
}
