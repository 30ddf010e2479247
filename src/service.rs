//! Sign-in orchestration on top of an [`IdentityBackend`].
//!
//! Every flow ends in an [`AuthState`]: recoverable failures are logged here and
//! turned into `SignedOut`, so callers never see an error from a sign-in attempt.
//!
//! # Sign in with Apple
//! ```rust,ignore
//! let mut service = AuthService::new(&config, FirebaseBackend::new(&config));
//!
//! let mut request = AppleIdRequest::new();
//! let pending = service.configure_apple_request(&mut request)?;
//! // present `request` to Apple, wait for the result ...
//! let outcome = service.sign_in_with_apple(Some(pending), result).await;
//! ```
use serde::Serialize;
use tracing::{debug, error};

use crate::{
    authorization::{AppleIdRequest, Authorization, AuthorizationError, GoogleUser, Scope},
    backend::IdentityBackend,
    challenge::HashedNonce,
    config::Config,
    credential::ProviderCredential,
    error::Error,
    identity::IdentityTokenClaims,
    nonce::Nonce,
    random::{OsRandom, SecureRandomSource},
    refresh_token::RefreshToken,
    session::{AuthState, ProviderInfo, User},
};

/// Scopes requested with every Sign in with Apple request.
pub const APPLE_SCOPES: [Scope; 2] = [Scope::FullName, Scope::Email];

/// A Sign in with Apple request that has been configured but not yet answered.
///
/// It owns the raw nonce whose hash went out with the request. Pass it back to
/// [`AuthService::sign_in_with_apple`] together with the provider's answer;
/// dropping it abandons the attempt.
#[derive(Debug)]
pub struct PendingAppleSignIn {
    nonce: Nonce,
}

impl PendingAppleSignIn {
    pub fn nonce(&self) -> &Nonce {
        &self.nonce
    }

    /// The challenge that was attached to the request.
    pub fn hashed_nonce(&self) -> HashedNonce {
        HashedNonce::from_nonce(&self.nonce)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AppleSignInOutcome {
    pub state: AuthState,
    /// Apple authorization code, when one was returned and is valid UTF-8.
    pub authorization_code: Option<String>,
}

impl AppleSignInOutcome {
    fn signed_out() -> Self {
        Self {
            state: AuthState::SignedOut,
            authorization_code: None,
        }
    }
}

/// Runs sign-in flows against an identity backend and tracks the current user.
///
/// State-changing operations take `&mut self`, so one service runs one flow at a time.
pub struct AuthService<B, R = OsRandom> {
    config: Config,
    backend: B,
    rng: R,
    current_user: Option<User>,
}

impl<B> AuthService<B>
where
    B: IdentityBackend,
{
    pub fn new(config: &Config, backend: B) -> Self {
        Self::with_random_source(config, backend, OsRandom)
    }
}

impl<B, R> AuthService<B, R>
where
    B: IdentityBackend,
    R: SecureRandomSource,
{
    pub fn with_random_source(config: &Config, backend: B, rng: R) -> Self {
        Self {
            config: config.to_owned(),
            backend,
            rng,
            current_user: None,
        }
    }

    pub fn current_user(&self) -> Option<&User> {
        self.current_user.as_ref()
    }

    /// Restores the session of a previous sign-in.
    ///
    /// A persisted refresh token is checked with the backend: a valid one makes its
    /// user current, an expired or revoked one signs out. Without a token the
    /// current user, if any, is returned.
    pub async fn restore_previous_sign_in(
        &mut self,
        refresh_token: Option<&RefreshToken>,
    ) -> AuthState {
        let Some(refresh_token) = refresh_token else {
            return match &self.current_user {
                Some(user) => {
                    debug!("Restoring previous sign in");
                    AuthState::SignedIn(user.to_owned())
                }
                None => {
                    debug!("Could not restore previous sign in");
                    AuthState::SignedOut
                }
            };
        };

        let res = self.backend.refresh_session(refresh_token).await;
        match res.map_err(Error::from) {
            Ok(user) => {
                debug!(uid = %user.uid, "Restored previous sign in");
                self.current_user = Some(user.to_owned());
                AuthState::SignedIn(user)
            }
            Err(e) => {
                error!("Could not restore previous sign in: {}", e);
                self.current_user = None;
                AuthState::SignedOut
            }
        }
    }

    /// Signs in on the backend with the result of the Google sign-in prompt.
    pub async fn sign_in_with_google(
        &mut self,
        result: Result<GoogleUser, AuthorizationError>,
    ) -> AuthState {
        let google_user = match result {
            Ok(user) => user,
            Err(e) => {
                error!("Unexpectedly got error while signing in with Google: {}", e);
                return AuthState::SignedOut;
            }
        };
        let Some(id_token) = google_user.id_token.as_deref() else {
            error!("Google sign-in returned no ID token");
            return AuthState::SignedOut;
        };
        let credential = ProviderCredential::google(id_token, &google_user.access_token);
        self.sign_in_on_backend(&credential).await
    }

    /// Prepares `request` for Sign in with Apple.
    ///
    /// Generates a fresh nonce, requests the full name and email scopes, and
    /// attaches `SHA-256(nonce)`. The returned value must be handed to
    /// [`sign_in_with_apple`](Self::sign_in_with_apple) with the response.
    ///
    /// Fails with `Error::GenNonce` when the random source fails; the request is
    /// left untouched in that case.
    pub fn configure_apple_request(
        &mut self,
        request: &mut AppleIdRequest,
    ) -> Result<PendingAppleSignIn, Error> {
        let nonce = Nonce::generate(&mut self.rng, self.config.nonce_length())?;
        request.set_requested_scopes(&APPLE_SCOPES);
        request.set_nonce(HashedNonce::from_nonce(&nonce));
        Ok(PendingAppleSignIn { nonce })
    }

    /// Exchanges Apple's answer for a backend session.
    ///
    /// Nothing is sent to the backend unless a pending request exists and the
    /// identity token is present and valid UTF-8. A display name, when Apple
    /// shared one, is written to the profile on a best-effort basis.
    pub async fn sign_in_with_apple(
        &mut self,
        pending: Option<PendingAppleSignIn>,
        result: Result<Authorization, AuthorizationError>,
    ) -> AppleSignInOutcome {
        let authorization = match result {
            Ok(authorization) => authorization,
            Err(e) => {
                error!("Unexpectedly got error while signing in with Apple: {}", e);
                return AppleSignInOutcome::signed_out();
            }
        };

        let prepared = match prepare_apple_credential(
            pending,
            authorization,
            self.config.verify_nonce_claim(),
        ) {
            Ok(prepared) => prepared,
            Err(e) => {
                error!("Unable to sign in with Apple: {}", e);
                return AppleSignInOutcome::signed_out();
            }
        };

        let mut state = self.sign_in_on_backend(&prepared.credential).await;
        if let (AuthState::SignedIn(user), Some(name)) =
            (&mut state, prepared.display_name.as_deref())
        {
            let res = self.backend.update_profile(user, name).await;
            match res {
                Ok(()) => {
                    user.display_name = Some(name.to_string());
                    self.current_user = Some(user.to_owned());
                }
                Err(e) => error!("Failed to update display name: {}", e),
            }
        }

        AppleSignInOutcome {
            state,
            authorization_code: prepared.authorization_code,
        }
    }

    pub async fn sign_in_anonymously(&mut self) -> AuthState {
        let res = self.backend.sign_in_anonymously().await;
        match res {
            Ok(user) => {
                debug!(uid = %user.uid, "Signed in anonymously");
                self.current_user = Some(user.to_owned());
                AuthState::SignedIn(user)
            }
            Err(e) => {
                error!("Unexpectedly got error while signing in anonymously: {}", e);
                AuthState::SignedOut
            }
        }
    }

    pub fn sign_out(&mut self) {
        if self.current_user.take().is_some() {
            debug!("Signed out");
        }
    }

    /// Deletes the current user's account. Returns false if there is no current
    /// user or the backend refused.
    pub async fn delete_account(&mut self) -> bool {
        let Some(user) = self.current_user.as_ref() else {
            error!("Unsuccessful in deleting user account since there is no current user");
            return false;
        };
        let res = self.backend.delete_account(user).await;
        match res {
            Ok(()) => {
                debug!("Successfully deleted user");
                self.current_user = None;
                true
            }
            Err(e) => {
                error!("Unsuccessful in deleting user account: {}", e);
                false
            }
        }
    }

    /// Providers linked to the current user.
    pub fn connected_providers(&self) -> Vec<ProviderInfo> {
        self.current_user
            .as_ref()
            .map(|user| user.provider_data.to_owned())
            .unwrap_or_default()
    }

    async fn sign_in_on_backend(&mut self, credential: &ProviderCredential) -> AuthState {
        let res = self.exchange_credential(credential).await;
        match res {
            Ok(user) => {
                debug!(uid = %user.uid, provider = credential.provider_id(), "Signed in on identity backend");
                self.current_user = Some(user.to_owned());
                AuthState::SignedIn(user)
            }
            Err(e) => {
                error!("Unexpectedly got error while signing in on identity backend: {}", e);
                AuthState::SignedOut
            }
        }
    }

    async fn exchange_credential(&self, credential: &ProviderCredential) -> Result<User, Error> {
        let user = self.backend.sign_in_with_credential(credential).await?;
        Ok(user)
    }
}

struct PreparedAppleSignIn {
    credential: ProviderCredential,
    display_name: Option<String>,
    authorization_code: Option<String>,
}

fn prepare_apple_credential(
    pending: Option<PendingAppleSignIn>,
    authorization: Authorization,
    verify_nonce_claim: bool,
) -> Result<PreparedAppleSignIn, Error> {
    let Authorization::AppleId(credential) = authorization else {
        return Err(Error::UnrecognizedCredential);
    };

    let display_name = credential.display_name();
    debug!(
        user = %credential.user,
        display_name = ?display_name,
        email = ?credential.email,
        "Signed in with Apple"
    );

    let pending = pending.ok_or(Error::MissingNonce)?;
    let identity_token = credential
        .identity_token
        .as_deref()
        .ok_or(Error::MissingIdentityToken)?;
    let id_token = std::str::from_utf8(identity_token).map_err(|_| Error::TokenEncoding)?;

    if verify_nonce_claim {
        let claims = IdentityTokenClaims::decode_from_raw(id_token)?;
        let expected = pending.hashed_nonce();
        if !claims.nonce.as_deref().is_some_and(|claim| expected.matches(claim)) {
            return Err(Error::NonceMismatch);
        }
    }

    let authorization_code = credential
        .authorization_code
        .as_deref()
        .and_then(|code| std::str::from_utf8(code).ok())
        .map(str::to_string);

    Ok(PreparedAppleSignIn {
        credential: ProviderCredential::apple(id_token, &pending.nonce, display_name.as_deref()),
        display_name,
        authorization_code,
    })
}
