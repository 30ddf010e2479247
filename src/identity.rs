//! Provides the request and response bodies of the identity backend REST API,
//! and decoding of identity token claims.
//!
//! This module:
//! SignInWithIdpRequest: Exchanges a provider credential for a backend session.
//! SignUpRequest: Creates an anonymous account.
//! UpdateProfileRequest: Sets the display name of the signed-in user.
//! DeleteAccountRequest: Deletes the signed-in user.
//! AccountLookupRequest: Reads the account behind an ID token.
//! SignInResponse: The session returned by sign-in and sign-up.
//! AccountLookupResponse: The accounts returned by a lookup.
//! IdentityTokenClaims: The decoded payload of an identity token.

use base64::{Engine, prelude::BASE64_URL_SAFE_NO_PAD};
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::{
    config::Config,
    credential::ProviderCredential,
    error::Error,
    refresh_token::{RefreshToken, SecureTokenResponse},
    session::{ProviderInfo, User},
};

/// Decoded payload of an identity token.
///
/// The signature is **not** verified here; the identity backend does that when
/// the token is exchanged.
#[derive(Debug, Clone, Deserialize)]
pub struct IdentityTokenClaims {
    pub iss: String,           // Issuer ("https://appleid.apple.com")
    pub aud: String,           // Client ID
    pub sub: String,           // Stable user identifier
    pub email: Option<String>, // Relay or real email
    pub nonce: Option<String>, // Hashed nonce sent with the request
    pub iat: u64,              // Issued-at timestamp (UNIX time)
    pub exp: u64,              // Expiration timestamp (UNIX time)
}

impl IdentityTokenClaims {
    /// Decodes the payload segment of a compact JWT.
    pub fn decode_from_raw(id_token: &str) -> Result<Self, Error> {
        let mut segments = id_token.split('.');
        let (Some(_), Some(payload), Some(_), None) = (
            segments.next(),
            segments.next(),
            segments.next(),
            segments.next(),
        ) else {
            return Err(Error::Decode);
        };
        let bytes = BASE64_URL_SAFE_NO_PAD.decode(payload).map_err(|e| {
            error!("Failed to decode identity token: {}", e);
            Error::Decode
        })?;
        let claims = serde_json::from_slice::<IdentityTokenClaims>(&bytes).map_err(|e| {
            error!("Failed to deserialize identity token: {}", e);
            Error::Deserialize
        })?;
        Ok(claims)
    }
}

fn endpoint(config: &Config, method: &str) -> String {
    format!("{}/accounts:{}", config.identity_endpoint.0, method)
}

/// Exchanges a provider credential for a backend session.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignInWithIdpRequest {
    #[serde(skip)]
    endpoint: String,
    #[serde(skip)]
    api_key: String,
    post_body: String,
    request_uri: String,
    return_idp_credential: bool,
    return_secure_token: bool,
}

impl SignInWithIdpRequest {
    pub fn new(config: &Config, credential: &ProviderCredential) -> Self {
        Self {
            endpoint: endpoint(config, "signInWithIdp"),
            api_key: config.api_key.0.to_owned(),
            post_body: credential.post_body(),
            request_uri: config.request_uri.0.to_owned(),
            return_idp_credential: true,
            return_secure_token: true,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }
}

/// Creates an anonymous account.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignUpRequest {
    #[serde(skip)]
    endpoint: String,
    #[serde(skip)]
    api_key: String,
    return_secure_token: bool,
}

impl SignUpRequest {
    pub fn new(config: &Config) -> Self {
        Self {
            endpoint: endpoint(config, "signUp"),
            api_key: config.api_key.0.to_owned(),
            return_secure_token: true,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }
}

/// Sets the display name of a signed-in user.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    #[serde(skip)]
    endpoint: String,
    #[serde(skip)]
    api_key: String,
    id_token: String,
    display_name: String,
    return_secure_token: bool,
}

impl UpdateProfileRequest {
    pub fn new(config: &Config, user: &User, display_name: &str) -> Self {
        Self {
            endpoint: endpoint(config, "update"),
            api_key: config.api_key.0.to_owned(),
            id_token: user.id_token.to_owned(),
            display_name: display_name.to_string(),
            return_secure_token: false,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }
}

/// Deletes a signed-in user.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteAccountRequest {
    #[serde(skip)]
    endpoint: String,
    #[serde(skip)]
    api_key: String,
    id_token: String,
}

impl DeleteAccountRequest {
    pub fn new(config: &Config, user: &User) -> Self {
        Self {
            endpoint: endpoint(config, "delete"),
            api_key: config.api_key.0.to_owned(),
            id_token: user.id_token.to_owned(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }
}

/// Reads the account of the user an ID token was issued to.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountLookupRequest {
    #[serde(skip)]
    endpoint: String,
    #[serde(skip)]
    api_key: String,
    id_token: String,
}

impl AccountLookupRequest {
    pub fn new(config: &Config, id_token: &str) -> Self {
        Self {
            endpoint: endpoint(config, "lookup"),
            api_key: config.api_key.0.to_owned(),
            id_token: id_token.to_string(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }
}

/// Session returned by `signInWithIdp` and `signUp`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignInResponse {
    local_id: String,
    id_token: String,
    refresh_token: RefreshToken,
    provider_id: Option<String>,
    email: Option<String>,
    display_name: Option<String>,
}

impl SignInResponse {
    pub fn local_id(&self) -> &str {
        &self.local_id
    }
}

impl From<SignInResponse> for User {
    fn from(res: SignInResponse) -> Self {
        let is_anonymous = res.provider_id.is_none();
        User {
            uid: res.local_id,
            display_name: res.display_name.filter(|v| !v.is_empty()),
            email: res.email.filter(|v| !v.is_empty()),
            is_anonymous,
            provider_data: res
                .provider_id
                .into_iter()
                .map(|provider_id| ProviderInfo { provider_id })
                .collect(),
            id_token: res.id_token,
            refresh_token: res.refresh_token,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountLookupResponse {
    #[serde(default)]
    users: Vec<AccountInfo>,
}

impl AccountLookupResponse {
    /// Takes the single account a lookup by ID token returns.
    pub fn into_account(self) -> Option<AccountInfo> {
        self.users.into_iter().next()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountInfo {
    local_id: String,
    email: Option<String>,
    display_name: Option<String>,
    #[serde(default)]
    provider_user_info: Vec<ProviderUserInfo>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProviderUserInfo {
    provider_id: String,
}

impl AccountInfo {
    pub fn local_id(&self) -> &str {
        &self.local_id
    }

    /// Combines the account with freshly issued tokens into a signed-in user.
    pub fn into_user(self, tokens: SecureTokenResponse) -> User {
        User {
            uid: self.local_id,
            display_name: self.display_name.filter(|v| !v.is_empty()),
            email: self.email.filter(|v| !v.is_empty()),
            is_anonymous: self.provider_user_info.is_empty(),
            provider_data: self
                .provider_user_info
                .into_iter()
                .map(|info| ProviderInfo {
                    provider_id: info.provider_id,
                })
                .collect(),
            id_token: tokens.id_token().to_string(),
            refresh_token: tokens.refresh_token().to_owned(),
        }
    }
}

// ==========Tests==========
#[cfg(test)]
mod tests {
    use base64::{Engine, prelude::BASE64_URL_SAFE_NO_PAD};
    use serde_json::json;

    use crate::{
        config::ConfigBuilder, credential::ProviderCredential, error::Error, nonce::Nonce,
        refresh_token::SecureTokenResponse, session::User,
    };

    use super::{
        AccountLookupRequest, AccountLookupResponse, DeleteAccountRequest, IdentityTokenClaims,
        SignInResponse, SignInWithIdpRequest, SignUpRequest, UpdateProfileRequest,
    };

    fn config() -> crate::config::Config {
        ConfigBuilder::new()
            .api_key("my_api_key")
            .identity_endpoint("https://identity.example.com/v1")
            .request_uri("https://app.example.com")
            .build()
    }

    fn signed_in_user() -> User {
        let res: SignInResponse = serde_json::from_value(json!({
            "localId": "uid_1",
            "idToken": "backend_id_token",
            "refreshToken": "backend_refresh_token",
            "expiresIn": "3600",
            "providerId": "apple.com"
        }))
        .unwrap();
        User::from(res)
    }

    #[test]
    fn test_claims_decode_success() {
        let payload = r#"{
            "iss": "https://appleid.apple.com",
            "aud": "com.example.web",
            "sub": "001234.abcdef.1234",
            "email": "relay@privaterelay.appleid.com",
            "nonce": "6ca13d52ca70c883e0f0bb101e425a89e8624de51db2d2392593af6a84118090",
            "nonce_supported": true,
            "iat": 1742189616,
            "exp": 1742193216
        }"#;
        let raw = format!("header.{}.signature", BASE64_URL_SAFE_NO_PAD.encode(payload));

        let claims = IdentityTokenClaims::decode_from_raw(&raw).unwrap();
        assert_eq!(claims.sub, "001234.abcdef.1234");
        assert_eq!(claims.aud, "com.example.web");
        assert_eq!(
            claims.nonce.as_deref(),
            Some("6ca13d52ca70c883e0f0bb101e425a89e8624de51db2d2392593af6a84118090")
        );
    }

    #[test]
    fn test_claims_decode_not_a_jwt() {
        assert!(matches!(
            IdentityTokenClaims::decode_from_raw("invalid_token"),
            Err(Error::Decode)
        ));
        assert!(matches!(
            IdentityTokenClaims::decode_from_raw("a.b.c.d"),
            Err(Error::Decode)
        ));
    }

    #[test]
    fn test_claims_decode_invalid_json() {
        let raw = format!("h.{}.s", BASE64_URL_SAFE_NO_PAD.encode("not a valid json"));
        assert!(matches!(
            IdentityTokenClaims::decode_from_raw(&raw),
            Err(Error::Deserialize)
        ));
    }

    #[test]
    fn test_sign_in_with_idp_request() {
        let nonce = Nonce::from("raw_nonce".to_string());
        let credential = ProviderCredential::apple("apple_id_token", &nonce, None);
        let req = SignInWithIdpRequest::new(&config(), &credential);

        assert_eq!(
            req.endpoint(),
            "https://identity.example.com/v1/accounts:signInWithIdp"
        );
        assert_eq!(req.api_key(), "my_api_key");
        assert_eq!(
            serde_json::to_value(&req).unwrap(),
            json!({
                "postBody": "id_token=apple_id_token&nonce=raw_nonce&providerId=apple.com",
                "requestUri": "https://app.example.com",
                "returnIdpCredential": true,
                "returnSecureToken": true
            })
        );
    }

    #[test]
    fn test_sign_up_request() {
        let req = SignUpRequest::new(&config());
        assert_eq!(req.endpoint(), "https://identity.example.com/v1/accounts:signUp");
        assert_eq!(
            serde_json::to_value(&req).unwrap(),
            json!({ "returnSecureToken": true })
        );
    }

    #[test]
    fn test_update_profile_and_delete_requests() {
        let user = signed_in_user();

        let update = UpdateProfileRequest::new(&config(), &user, "Jane Doe");
        assert_eq!(update.endpoint(), "https://identity.example.com/v1/accounts:update");
        assert_eq!(
            serde_json::to_value(&update).unwrap(),
            json!({
                "idToken": "backend_id_token",
                "displayName": "Jane Doe",
                "returnSecureToken": false
            })
        );

        let delete = DeleteAccountRequest::new(&config(), &user);
        assert_eq!(delete.endpoint(), "https://identity.example.com/v1/accounts:delete");
        assert_eq!(
            serde_json::to_value(&delete).unwrap(),
            json!({ "idToken": "backend_id_token" })
        );
    }

    #[test]
    fn test_sign_in_response_into_user() {
        let res: SignInResponse = serde_json::from_value(json!({
            "federatedId": "https://appleid.apple.com/001234",
            "providerId": "apple.com",
            "localId": "uid_1",
            "email": "relay@privaterelay.appleid.com",
            "displayName": "",
            "idToken": "backend_id_token",
            "refreshToken": "backend_refresh_token",
            "expiresIn": "3600"
        }))
        .unwrap();
        assert_eq!(res.local_id(), "uid_1");

        let user = User::from(res);
        assert_eq!(user.uid(), "uid_1");
        assert_eq!(user.email(), Some("relay@privaterelay.appleid.com"));
        assert_eq!(user.display_name(), None);
        assert!(!user.is_anonymous());
        assert_eq!(user.provider_data()[0].provider_id, "apple.com");
        assert_eq!(user.id_token(), "backend_id_token");
        assert_eq!(user.refresh_token().value_as_str(), "backend_refresh_token");
    }

    #[test]
    fn test_sign_up_response_is_anonymous() {
        let res: SignInResponse = serde_json::from_value(json!({
            "kind": "identitytoolkit#SignupNewUserResponse",
            "localId": "anon_uid",
            "idToken": "anon_id_token",
            "refreshToken": "anon_refresh_token",
            "expiresIn": "3600"
        }))
        .unwrap();
        let user = User::from(res);
        assert!(user.is_anonymous());
        assert!(user.provider_data().is_empty());
    }

    #[test]
    fn test_account_lookup_into_user() {
        let req = AccountLookupRequest::new(&config(), "fresh_id_token");
        assert_eq!(req.endpoint(), "https://identity.example.com/v1/accounts:lookup");
        assert_eq!(
            serde_json::to_value(&req).unwrap(),
            json!({ "idToken": "fresh_id_token" })
        );

        let res: AccountLookupResponse = serde_json::from_value(json!({
            "kind": "identitytoolkit#GetAccountInfoResponse",
            "users": [{
                "localId": "uid_1",
                "email": "relay@privaterelay.appleid.com",
                "displayName": "Jane Doe",
                "providerUserInfo": [{
                    "providerId": "apple.com",
                    "federatedId": "001234.abcdef"
                }]
            }]
        }))
        .unwrap();
        let tokens: SecureTokenResponse = serde_json::from_value(json!({
            "id_token": "fresh_id_token",
            "refresh_token": "rotated_refresh_token",
            "user_id": "uid_1"
        }))
        .unwrap();

        let account = res.into_account().unwrap();
        assert_eq!(account.local_id(), "uid_1");
        let user = account.into_user(tokens);
        assert_eq!(user.uid(), "uid_1");
        assert_eq!(user.display_name(), Some("Jane Doe"));
        assert!(!user.is_anonymous());
        assert_eq!(user.provider_data()[0].provider_id, "apple.com");
        assert_eq!(user.id_token(), "fresh_id_token");
        assert_eq!(user.refresh_token().value_as_str(), "rotated_refresh_token");
    }

    #[test]
    fn test_account_lookup_without_users() {
        let res: AccountLookupResponse =
            serde_json::from_value(json!({ "kind": "identitytoolkit#GetAccountInfoResponse" }))
                .unwrap();
        assert!(res.into_account().is_none());
    }
}
