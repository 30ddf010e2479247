//! This module models the Sign in with Apple authorization request and the
//! assertion that comes back from it.
//!
//! It provides the following key functionalities:
//! - Building the request that carries the hashed nonce (`AppleIdRequest`).
//! - Parsing Apple's `form_post` callback for the web flow (`UnCheckedAuthorizationResponse`).
//! - The assertion shapes a provider may return (`Authorization`).
//!
//! # Flow
//! 1. `AuthService::configure_apple_request` fills an `AppleIdRequest` with the
//!    requested scopes and `SHA-256(nonce)`, and hands back the pending sign-in.
//! 2. On the web, `AppleIdRequest::into_url` renders the redirect to Apple.
//! 3. Apple posts back to the redirect URI. `UnCheckedAuthorizationResponse::from_form`
//!    parses the body and `verify` checks the state token.
//! 4. The resulting `Authorization` is passed to `AuthService::sign_in_with_apple`.
//!
//! # Notes
//! - Apple sends the user's name and email only on the first authorization.
//! - The identity token is not trusted here; only its `sub` claim is read.
use std::collections::HashMap;

use itertools::Itertools;
use serde::Deserialize;
use thiserror::Error;
use tracing::error;
use url::{Url, form_urlencoded};

use crate::{
    challenge::HashedNonce,
    config::Config,
    csrf_token::{CSRFToken, UnCheckedCSRFToken},
    error::Error,
    identity::IdentityTokenClaims,
};

/// Profile information requested from Apple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Scope {
    FullName,
    Email,
}

impl Scope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::FullName => "name",
            Scope::Email => "email",
        }
    }
}

/// An authorization request waiting to be sent to Apple.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AppleIdRequest {
    requested_scopes: Vec<Scope>,
    nonce: Option<HashedNonce>,
    state: Option<CSRFToken>,
}

impl AppleIdRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_requested_scopes(&mut self, scopes: &[Scope]) {
        self.requested_scopes = scopes.to_vec();
    }

    pub fn set_nonce(&mut self, nonce: HashedNonce) {
        self.nonce = Some(nonce);
    }

    /// Sets the `state` value echoed back in the web callback.
    pub fn set_state(&mut self, state: &CSRFToken) {
        self.state = Some(state.to_owned());
    }

    pub fn requested_scopes(&self) -> &[Scope] {
        &self.requested_scopes
    }

    pub fn nonce(&self) -> Option<&HashedNonce> {
        self.nonce.as_ref()
    }

    pub fn state(&self) -> Option<&CSRFToken> {
        self.state.as_ref()
    }

    /// Renders the web authorization URL.
    ///
    /// Returns `Error::MissingNonce` if the request was never configured.
    pub fn into_url(&self, config: &Config) -> Result<String, Error> {
        let nonce = self.nonce.as_ref().ok_or(Error::MissingNonce)?;

        let scope = self
            .requested_scopes
            .iter()
            .unique()
            .sorted()
            .map(Scope::as_str)
            .join(" ");

        let mut params = vec![
            ("response_type", "code id_token"),
            ("response_mode", "form_post"),
            ("client_id", config.client_id.0.as_str()),
            ("redirect_uri", config.redirect_uri.0.as_str()),
            ("nonce", nonce.value()),
        ];
        if !scope.is_empty() {
            params.push(("scope", scope.as_str()));
        }
        if let Some(state) = &self.state {
            params.push(("state", state.value()));
        }

        let url = Url::parse_with_params(&config.auth_endpoint.0, &params).map_err(|e| {
            error!("Failed to build authorization url: {}", e);
            Error::URL
        })?;
        Ok(url.into())
    }
}

/// A person's name as shared by the provider.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PersonName {
    pub given_name: Option<String>,
    pub family_name: Option<String>,
}

impl PersonName {
    /// First non-empty of "given family", given alone and family alone.
    pub fn display_name(&self) -> Option<String> {
        let given = self.given_name.as_deref().filter(|v| !v.is_empty());
        let family = self.family_name.as_deref().filter(|v| !v.is_empty());
        match (given, family) {
            (Some(given), Some(family)) => Some(format!("{given} {family}")),
            (Some(given), None) => Some(given.to_string()),
            (None, Some(family)) => Some(family.to_string()),
            (None, None) => None,
        }
    }
}

/// The assertion Apple returns for a successful Sign in with Apple.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AppleIdCredential {
    pub user: String,
    pub full_name: Option<PersonName>,
    pub email: Option<String>,
    /// Signed JWT, as raw bytes.
    pub identity_token: Option<Vec<u8>>,
    /// Short-lived code for Apple's token endpoint, as raw bytes.
    pub authorization_code: Option<Vec<u8>>,
}

impl AppleIdCredential {
    pub fn display_name(&self) -> Option<String> {
        self.full_name.as_ref().and_then(PersonName::display_name)
    }
}

/// A saved password picked from the keychain instead of an Apple ID.
#[derive(Clone, PartialEq)]
pub struct PasswordCredential {
    pub user: String,
    pub password: String,
}

impl std::fmt::Debug for PasswordCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PasswordCredential")
            .field("user", &self.user)
            .field("password", &"***")
            .finish()
    }
}

/// A successful authorization, by credential shape.
#[derive(Debug, Clone, PartialEq)]
pub enum Authorization {
    AppleId(AppleIdCredential),
    Password(PasswordCredential),
}

/// Why an authorization did not produce a credential.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AuthorizationError {
    #[error("The user canceled the authorization")]
    Canceled,
    #[error("Authorization failed: {0}")]
    Failed(String),
    #[error("State token not matched")]
    StateMismatch,
    #[error("Invalid authorization response: {0}")]
    InvalidResponse(String),
}

/// Result of the Google sign-in prompt.
#[derive(Debug, Clone, PartialEq)]
pub struct GoogleUser {
    pub id_token: Option<String>,
    pub access_token: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AppleUserName {
    first_name: Option<String>,
    last_name: Option<String>,
}

/// `user` field Apple posts on first authorization.
#[derive(Debug, Deserialize)]
struct AppleUser {
    name: Option<AppleUserName>,
    email: Option<String>,
}

/// Apple's `form_post` callback, before its state token is checked.
///
/// # Example
/// ```rust,ignore
/// let response = UnCheckedAuthorizationResponse::from_form(&body)?;
/// // get stored CSRF token from the session store
/// let authorization = response.verify(&csrf_token);
/// ```
#[derive(Debug, Clone)]
pub struct UnCheckedAuthorizationResponse {
    state: UnCheckedCSRFToken,
    code: Option<String>,
    id_token: Option<String>,
    user: Option<String>,
    error: Option<String>,
}

impl UnCheckedAuthorizationResponse {
    /// Parses an `application/x-www-form-urlencoded` body.
    pub fn from_form(body: &str) -> Result<Self, Error> {
        let mut params: HashMap<String, String> =
            form_urlencoded::parse(body.as_bytes()).into_owned().collect();
        let state = params.remove("state").ok_or_else(|| {
            error!("Authorization response without state");
            Error::CSRFNotMatch
        })?;
        Ok(Self {
            state: state.into(),
            code: params.remove("code"),
            id_token: params.remove("id_token"),
            user: params.remove("user"),
            error: params.remove("error"),
        })
    }

    /// Checks the state token and converts the response into an `Authorization`.
    pub fn verify(self, csrf_token: &CSRFToken) -> Result<Authorization, AuthorizationError> {
        csrf_token
            .verify(&self.state)
            .map_err(|_| AuthorizationError::StateMismatch)?;

        if let Some(error) = self.error {
            return Err(match error.as_str() {
                "user_cancelled_authorize" => AuthorizationError::Canceled,
                _ => AuthorizationError::Failed(error),
            });
        }

        let id_token = self
            .id_token
            .ok_or_else(|| AuthorizationError::InvalidResponse("missing id_token".to_string()))?;
        let claims = IdentityTokenClaims::decode_from_raw(&id_token)
            .map_err(|e| AuthorizationError::InvalidResponse(e.to_string()))?;

        let user = match self.user {
            Some(raw) => Some(serde_json::from_str::<AppleUser>(&raw).map_err(|e| {
                error!("Failed to deserialize user: {}", e);
                AuthorizationError::InvalidResponse("malformed user".to_string())
            })?),
            None => None,
        };
        let (full_name, email) = match user {
            Some(user) => (
                user.name.map(|name| PersonName {
                    given_name: name.first_name,
                    family_name: name.last_name,
                }),
                user.email,
            ),
            None => (None, None),
        };

        Ok(Authorization::AppleId(AppleIdCredential {
            user: claims.sub,
            full_name,
            email: email.or(claims.email),
            identity_token: Some(id_token.into_bytes()),
            authorization_code: self.code.map(String::into_bytes),
        }))
    }
}

// ==========Tests==========
#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use base64::{Engine, prelude::BASE64_URL_SAFE_NO_PAD};
    use url::{Url, form_urlencoded};

    use crate::{
        challenge::HashedNonce, config::ConfigBuilder, csrf_token::CSRFToken, error::Error,
        nonce::Nonce,
    };

    use super::{
        AppleIdCredential, AppleIdRequest, Authorization, AuthorizationError, PersonName, Scope,
        UnCheckedAuthorizationResponse,
    };

    fn name(given: Option<&str>, family: Option<&str>) -> PersonName {
        PersonName {
            given_name: given.map(str::to_string),
            family_name: family.map(str::to_string),
        }
    }

    fn id_token() -> String {
        let payload = r#"{"iss":"https://appleid.apple.com","aud":"com.example.web","sub":"001234.abcdef","email":"claim@example.com","iat":1,"exp":2}"#;
        format!("h.{}.s", BASE64_URL_SAFE_NO_PAD.encode(payload))
    }

    fn query(url: &str) -> HashMap<String, String> {
        Url::parse(url).unwrap().query_pairs().into_owned().collect()
    }

    fn form(pairs: &[(&str, &str)]) -> String {
        form_urlencoded::Serializer::new(String::new())
            .extend_pairs(pairs)
            .finish()
    }

    #[test]
    fn test_display_name() {
        assert_eq!(
            name(Some("Jane"), Some("Doe")).display_name().as_deref(),
            Some("Jane Doe")
        );
        assert_eq!(name(Some("Jane"), None).display_name().as_deref(), Some("Jane"));
        assert_eq!(name(None, Some("Doe")).display_name().as_deref(), Some("Doe"));
        assert_eq!(name(Some(""), Some("Doe")).display_name().as_deref(), Some("Doe"));
        assert_eq!(name(None, None).display_name(), None);
        assert_eq!(name(Some(""), Some("")).display_name(), None);

        let credential = AppleIdCredential::default();
        assert_eq!(credential.display_name(), None);
    }

    #[test]
    fn test_request_into_url() {
        let config = ConfigBuilder::new()
            .client_id("com.example.web")
            .redirect_uri("https://app.example.com/callback")
            .build();
        let nonce = Nonce::from("abc123".to_string());
        let state = CSRFToken::new().unwrap();

        let mut request = AppleIdRequest::new();
        request.set_requested_scopes(&[Scope::Email, Scope::FullName, Scope::Email]);
        request.set_nonce(HashedNonce::from_nonce(&nonce));
        request.set_state(&state);

        let url = request.into_url(&config).unwrap();
        assert!(url.starts_with("https://appleid.apple.com/auth/authorize?"));

        let params = query(&url);
        assert_eq!(params["response_type"], "code id_token");
        assert_eq!(params["response_mode"], "form_post");
        assert_eq!(params["client_id"], "com.example.web");
        assert_eq!(params["redirect_uri"], "https://app.example.com/callback");
        assert_eq!(params["scope"], "name email");
        assert_eq!(params["state"], state.value());
        assert_eq!(
            params["nonce"],
            "6ca13d52ca70c883e0f0bb101e425a89e8624de51db2d2392593af6a84118090"
        );
    }

    #[test]
    fn test_request_into_url_without_scope_or_state() {
        let mut request = AppleIdRequest::new();
        request.set_nonce(HashedNonce::from_nonce(&Nonce::from("n".to_string())));

        let params = query(&request.into_url(&ConfigBuilder::new().build()).unwrap());
        assert!(!params.contains_key("scope"));
        assert!(!params.contains_key("state"));
    }

    #[test]
    fn test_request_into_url_requires_nonce() {
        let request = AppleIdRequest::new();
        assert!(matches!(
            request.into_url(&ConfigBuilder::new().build()),
            Err(Error::MissingNonce)
        ));
    }

    #[test]
    fn test_response_first_authorization() {
        let state = CSRFToken::new().unwrap();
        let token = id_token();
        let body = form(&[
            ("state", state.value()),
            ("code", "c123.0.abc"),
            ("id_token", token.as_str()),
            (
                "user",
                r#"{"name":{"firstName":"Jane","lastName":"Doe"},"email":"jane@example.com"}"#,
            ),
        ]);

        let res = UnCheckedAuthorizationResponse::from_form(&body).unwrap();
        let Authorization::AppleId(credential) = res.verify(&state).unwrap() else {
            panic!("expected an Apple ID credential");
        };
        assert_eq!(credential.user, "001234.abcdef");
        assert_eq!(credential.display_name().as_deref(), Some("Jane Doe"));
        assert_eq!(credential.email.as_deref(), Some("jane@example.com"));
        assert_eq!(credential.identity_token, Some(token.into_bytes()));
        assert_eq!(credential.authorization_code, Some(b"c123.0.abc".to_vec()));
    }

    #[test]
    fn test_response_returning_user() {
        let state = CSRFToken::new().unwrap();
        let body = form(&[("state", state.value()), ("id_token", id_token().as_str())]);

        let res = UnCheckedAuthorizationResponse::from_form(&body).unwrap();
        let Authorization::AppleId(credential) = res.verify(&state).unwrap() else {
            panic!("expected an Apple ID credential");
        };
        assert!(credential.full_name.is_none());
        assert_eq!(credential.email.as_deref(), Some("claim@example.com"));
        assert!(credential.authorization_code.is_none());
    }

    #[test]
    fn test_response_state_mismatch() {
        let state = CSRFToken::new().unwrap();
        let other = CSRFToken::new().unwrap();
        let body = form(&[("state", other.value()), ("id_token", id_token().as_str())]);

        let res = UnCheckedAuthorizationResponse::from_form(&body).unwrap();
        assert_eq!(res.verify(&state), Err(AuthorizationError::StateMismatch));
    }

    #[test]
    fn test_response_without_state() {
        assert!(matches!(
            UnCheckedAuthorizationResponse::from_form("code=abc"),
            Err(Error::CSRFNotMatch)
        ));
    }

    #[test]
    fn test_response_errors() {
        let state = CSRFToken::new().unwrap();

        let canceled = form(&[("state", state.value()), ("error", "user_cancelled_authorize")]);
        let res = UnCheckedAuthorizationResponse::from_form(&canceled).unwrap();
        assert_eq!(res.verify(&state), Err(AuthorizationError::Canceled));

        let failed = form(&[("state", state.value()), ("error", "invalid_request")]);
        let res = UnCheckedAuthorizationResponse::from_form(&failed).unwrap();
        assert_eq!(
            res.verify(&state),
            Err(AuthorizationError::Failed("invalid_request".to_string()))
        );

        let no_token = form(&[("state", state.value())]);
        let res = UnCheckedAuthorizationResponse::from_form(&no_token).unwrap();
        assert!(matches!(
            res.verify(&state),
            Err(AuthorizationError::InvalidResponse(_))
        ));

        let bad_user = form(&[
            ("state", state.value()),
            ("id_token", id_token().as_str()),
            ("user", "{not json"),
        ]);
        let res = UnCheckedAuthorizationResponse::from_form(&bad_user).unwrap();
        assert!(matches!(
            res.verify(&state),
            Err(AuthorizationError::InvalidResponse(_))
        ));
    }
}
