use thiserror::Error;

use crate::executer::ExecuteError;

#[derive(Debug, Clone, Error)]
pub enum Error {
    #[error("Failed to decode identity token")]
    Decode,
    #[error("Failed to deserialize identity token")]
    Deserialize,
    #[error("Failed to generate nonce")]
    GenNonce,
    #[error("Failed to generate CSRF token")]
    GenToken,
    #[error("CSRF token not matched")]
    CSRFNotMatch,
    #[error("Failed to parse url")]
    URL,
    #[error("Invalid state: a sign-in callback was received, but no sign-in request was sent")]
    MissingNonce,
    #[error("Identity token is missing from the credential")]
    MissingIdentityToken,
    #[error("Identity token is not valid UTF-8")]
    TokenEncoding,
    #[error("Unexpected credential type")]
    UnrecognizedCredential,
    #[error("Identity token nonce does not match the request challenge")]
    NonceMismatch,
    #[error("Identity backend call failed: {0}")]
    Backend(#[from] ExecuteError),
}
