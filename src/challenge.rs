//! Hashes a nonce into the challenge sent with the authorization request.
//!
//! Apple only ever sees `SHA-256(nonce)` rendered as lowercase hex. The raw nonce
//! stays with the pending sign-in and is later presented to the identity backend,
//! which recomputes the digest and compares it with the `nonce` claim of the
//! identity token.
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::nonce::Nonce;

/// A one-way digest over bytes.
pub trait DigestFunction {
    fn digest(&self, input: &[u8]) -> Vec<u8>;
}

/// SHA-256, the digest Apple expects for the `nonce` parameter.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sha256Digest;

impl DigestFunction for Sha256Digest {
    fn digest(&self, input: &[u8]) -> Vec<u8> {
        Sha256::digest(input).to_vec()
    }
}

/// SHA-256 over the UTF-8 bytes of `input`, as 64 lowercase hex characters.
pub fn sha256_hex(input: &str) -> String {
    hex::encode(Sha256::digest(input.as_bytes()))
}

/// The hashed nonce attached to an authorization request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HashedNonce(pub(crate) String);

impl HashedNonce {
    /// Hashes `nonce` with SHA-256.
    pub fn from_nonce(nonce: &Nonce) -> Self {
        Self(sha256_hex(nonce.value()))
    }

    /// Hashes `nonce` with an arbitrary digest function.
    pub fn with_digest<D>(digest: &D, nonce: &Nonce) -> Self
    where
        D: DigestFunction + ?Sized,
    {
        Self(hex::encode(digest.digest(nonce.value().as_bytes())))
    }

    /// Returns the hex digest.
    pub fn value(&self) -> &str {
        &self.0
    }

    /// Returns true if `claim` is this digest.
    pub fn matches(&self, claim: &str) -> bool {
        self.0 == claim
    }
}

// ==========Tests==========
#[cfg(test)]
mod tests {
    use crate::nonce::Nonce;

    use super::{DigestFunction, HashedNonce, Sha256Digest, sha256_hex};

    struct ReverseDigest;

    impl DigestFunction for ReverseDigest {
        fn digest(&self, input: &[u8]) -> Vec<u8> {
            input.iter().rev().copied().collect()
        }
    }

    fn is_lower_hex_64(value: &str) -> bool {
        value.len() == 64
            && value
                .bytes()
                .all(|c| c.is_ascii_digit() || (b'a'..=b'f').contains(&c))
    }

    #[test]
    fn test_sha256_known_vectors() {
        assert_eq!(
            sha256_hex("abc123"),
            "6ca13d52ca70c883e0f0bb101e425a89e8624de51db2d2392593af6a84118090"
        );
        assert_eq!(
            sha256_hex("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(
            sha256_hex(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_hashed_nonce_deterministic() {
        let nonce = Nonce::new().unwrap();
        let first = HashedNonce::from_nonce(&nonce);
        let second = HashedNonce::from_nonce(&nonce);
        assert_eq!(first, second);
        assert!(is_lower_hex_64(first.value()));
        assert_ne!(first.value(), nonce.value());
    }

    #[test]
    fn test_hashed_nonce_digest_matches() {
        let nonce = Nonce::from("abc123".to_string());
        let via_trait = HashedNonce::with_digest(&Sha256Digest, &nonce);
        assert_eq!(via_trait, HashedNonce::from_nonce(&nonce));
        assert!(via_trait.matches("6ca13d52ca70c883e0f0bb101e425a89e8624de51db2d2392593af6a84118090"));
        assert!(!via_trait.matches("abc123"));
    }

    #[test]
    fn test_hashed_nonce_zero_padded() {
        let nonce = Nonce::from("\u{1}\u{a}".to_string());
        let hashed = HashedNonce::with_digest(&ReverseDigest, &nonce);
        assert_eq!(hashed.value(), "0a01");
    }
}
