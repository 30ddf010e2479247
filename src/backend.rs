//! The identity backend seam used by [`AuthService`](crate::service::AuthService).
//!
//! `FirebaseBackend` talks to the Identity Toolkit REST API through the executers.
//! Tests and other hosts can provide their own implementation.
use std::pin::Pin;

use crate::{
    config::Config,
    credential::ProviderCredential,
    executer::{
        AnonymousSignUpExe, DeleteAccountExe, ExecuteError, Executer, LookupAccountExe,
        RefreshSessionExe, SignInWithIdpExe, UpdateProfileExe,
    },
    identity::{
        AccountLookupRequest, DeleteAccountRequest, SignInWithIdpRequest, SignUpRequest,
        UpdateProfileRequest,
    },
    refresh_token::{RefreshToken, SecureTokenRequest},
    session::User,
};
use tracing::error;

pub type BackendFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, ExecuteError>> + Send + 'a>>;

/// Session operations delegated to the identity backend.
pub trait IdentityBackend {
    /// Exchanges a provider credential for a signed-in user.
    fn sign_in_with_credential<'a>(
        &'a self,
        credential: &'a ProviderCredential,
    ) -> BackendFuture<'a, User>;

    fn sign_in_anonymously(&self) -> BackendFuture<'_, User>;

    /// Resumes a persisted session. Fails when the refresh token is expired or revoked.
    fn refresh_session<'a>(&'a self, refresh_token: &'a RefreshToken) -> BackendFuture<'a, User>;

    fn update_profile<'a>(&'a self, user: &'a User, display_name: &'a str)
    -> BackendFuture<'a, ()>;

    fn delete_account<'a>(&'a self, user: &'a User) -> BackendFuture<'a, ()>;
}

/// Identity Toolkit REST backend.
#[derive(Debug, Clone)]
pub struct FirebaseBackend {
    config: Config,
}

impl FirebaseBackend {
    pub fn new(config: &Config) -> Self {
        Self {
            config: config.to_owned(),
        }
    }
}

impl IdentityBackend for FirebaseBackend {
    fn sign_in_with_credential<'a>(
        &'a self,
        credential: &'a ProviderCredential,
    ) -> BackendFuture<'a, User> {
        Box::pin(async move {
            let req = SignInWithIdpRequest::new(&self.config, credential);
            let res = SignInWithIdpExe.execute(&req).await?;
            Ok(User::from(res))
        })
    }

    fn sign_in_anonymously(&self) -> BackendFuture<'_, User> {
        Box::pin(async move {
            let req = SignUpRequest::new(&self.config);
            let res = AnonymousSignUpExe.execute(&req).await?;
            Ok(User::from(res))
        })
    }

    fn refresh_session<'a>(&'a self, refresh_token: &'a RefreshToken) -> BackendFuture<'a, User> {
        Box::pin(async move {
            let req = SecureTokenRequest::new(&self.config, refresh_token);
            let tokens = RefreshSessionExe.execute(&req).await?;

            let req = AccountLookupRequest::new(&self.config, tokens.id_token());
            let account = LookupAccountExe
                .execute(&req)
                .await?
                .into_account()
                .ok_or_else(|| {
                    error!("Account lookup returned no user for {}", tokens.user_id());
                    ExecuteError::Parse
                })?;
            Ok(account.into_user(tokens))
        })
    }

    fn update_profile<'a>(
        &'a self,
        user: &'a User,
        display_name: &'a str,
    ) -> BackendFuture<'a, ()> {
        Box::pin(async move {
            let req = UpdateProfileRequest::new(&self.config, user, display_name);
            UpdateProfileExe.execute(&req).await?;
            Ok(())
        })
    }

    fn delete_account<'a>(&'a self, user: &'a User) -> BackendFuture<'a, ()> {
        Box::pin(async move {
            let req = DeleteAccountRequest::new(&self.config, user);
            let status = DeleteAccountExe.execute(&req).await?;
            if status.is_success() {
                Ok(())
            } else {
                Err(ExecuteError::Rejected(status.to_string()))
            }
        })
    }
}
