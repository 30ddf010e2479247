//! Secure random byte sources.
//!
//! Nonce generation only ever asks for bytes through [`SecureRandomSource`], so the
//! platform generator can be swapped for a deterministic one in tests.
use rand::{TryRngCore, rngs::OsRng};
use thiserror::Error;

/// Reported when the random source cannot produce bytes.
#[derive(Debug, Clone, Error)]
#[error("secure random source failed: {0}")]
pub struct RandomSourceError(pub String);

/// A source of cryptographically secure random bytes.
///
/// Implementations must either fill the whole buffer or report an error.
/// They must never fall back to a weaker generator.
pub trait SecureRandomSource {
    fn fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), RandomSourceError>;
}

/// The operating system's CSPRNG.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsRandom;

impl SecureRandomSource for OsRandom {
    fn fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), RandomSourceError> {
        OsRng
            .try_fill_bytes(dest)
            .map_err(|e| RandomSourceError(e.to_string()))
    }
}
