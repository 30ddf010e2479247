//! Defines structures and builders related to sign-in configuration.
//!
//! Holds the identity backend credentials and the Apple web endpoints required to
//! build authorization requests and exchange identity tokens.
//!
//! ## Structures
//! - `Config`: Stores all the necessary sign-in information.
//! - `ConfigBuilder`: A builder for constructing a `Config` instance.
//!
//! # Example
//! ```rust,no_run
//! use tiny_apple_signin::config::Config;
//!
//! let config = Config::builder()
//!     .api_key("your-web-api-key")
//!     .client_id("com.example.web")
//!     .redirect_uri("https://your-app.com/auth/callback")
//!     .build();
//! ```
use crate::nonce::DEFAULT_NONCE_LENGTH;

const IDENTITY_ENDPOINT: &str = "https://identitytoolkit.googleapis.com/v1";
const TOKEN_ENDPOINT: &str = "https://securetoken.googleapis.com/v1/token";
const APPLE_AUTH_ENDPOINT: &str = "https://appleid.apple.com/auth/authorize";
const REQUEST_URI: &str = "http://localhost";

#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct ApiKey(pub String);

#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct IdentityEndPoint(pub String);

#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct TokenEndPoint(pub String);

#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct RequestURI(pub String);

#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct ClientID(pub String);

#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct AuthEndPoint(pub String);

#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct RedirectURI(pub String);

/// Holds everything the sign-in flow needs to talk to Apple and the identity backend.
///
/// It is immutable once constructed.
///
/// # Fields
/// - `api_key`: Web API key of the identity backend project.
/// - `identity_endpoint`: Base URL of the identity backend REST API.
/// - `request_uri`: URI reported to the backend as the origin of the IdP response.
/// - `client_id`: Apple Services ID used for the web flow.
/// - `auth_endpoint`: Apple authorization endpoint.
/// - `redirect_uri`: Redirect URI registered with Apple.
/// - `nonce_length`: Length of generated nonces.
/// - `verify_nonce_claim`: Check the identity token's `nonce` claim locally before exchanging it.
#[derive(Debug, Clone)]
pub struct Config {
    pub(crate) api_key: ApiKey,
    pub(crate) identity_endpoint: IdentityEndPoint,
    pub(crate) token_endpoint: TokenEndPoint,
    pub(crate) request_uri: RequestURI,
    pub(crate) client_id: ClientID,
    pub(crate) auth_endpoint: AuthEndPoint,
    pub(crate) redirect_uri: RedirectURI,
    pub(crate) nonce_length: usize,
    pub(crate) verify_nonce_claim: bool,
}

// ==========impl Config==========
impl Config {
    /// Returns a new `ConfigBuilder` instance to create a `Config` object.
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    pub fn nonce_length(&self) -> usize {
        self.nonce_length
    }

    pub fn verify_nonce_claim(&self) -> bool {
        self.verify_nonce_claim
    }
}

impl Default for Config {
    fn default() -> Self {
        ConfigBuilder::default().build()
    }
}

/// Provides a convenient way to create a `Config` instance step by step.
///
/// Endpoints start out pointing at the public Apple and identity backend URLs;
/// only the project specific values need to be set.
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    api_key: ApiKey,
    identity_endpoint: IdentityEndPoint,
    token_endpoint: TokenEndPoint,
    request_uri: RequestURI,
    client_id: ClientID,
    auth_endpoint: AuthEndPoint,
    redirect_uri: RedirectURI,
    nonce_length: usize,
    verify_nonce_claim: bool,
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self {
            api_key: ApiKey::default(),
            identity_endpoint: IdentityEndPoint(IDENTITY_ENDPOINT.to_string()),
            token_endpoint: TokenEndPoint(TOKEN_ENDPOINT.to_string()),
            request_uri: RequestURI(REQUEST_URI.to_string()),
            client_id: ClientID::default(),
            auth_endpoint: AuthEndPoint(APPLE_AUTH_ENDPOINT.to_string()),
            redirect_uri: RedirectURI::default(),
            nonce_length: DEFAULT_NONCE_LENGTH,
            verify_nonce_claim: false,
        }
    }
}

// ==========impl ConfigBuilder==========
impl ConfigBuilder {
    /// Creates a new `ConfigBuilder` instance with default values.
    pub fn new() -> Self {
        ConfigBuilder::default()
    }

    /// Sets the identity backend web API key.
    pub fn api_key(mut self, api_key: &str) -> Self {
        self.api_key = ApiKey(api_key.to_string());
        self
    }

    /// Sets the identity backend base URL. A trailing slash is dropped.
    pub fn identity_endpoint(mut self, identity_endpoint: &str) -> Self {
        self.identity_endpoint = IdentityEndPoint(identity_endpoint.trim_end_matches('/').to_string());
        self
    }

    /// Sets the secure token endpoint used to refresh sessions.
    pub fn token_endpoint(mut self, token_endpoint: &str) -> Self {
        self.token_endpoint = TokenEndPoint(token_endpoint.to_string());
        self
    }

    /// Sets the request URI reported with IdP sign-ins.
    pub fn request_uri(mut self, request_uri: &str) -> Self {
        self.request_uri = RequestURI(request_uri.to_string());
        self
    }

    /// Sets the Apple Services ID.
    pub fn client_id(mut self, client_id: &str) -> Self {
        self.client_id = ClientID(client_id.to_string());
        self
    }

    /// Sets the Apple authorization endpoint URL.
    pub fn auth_endpoint(mut self, auth_endpoint: &str) -> Self {
        self.auth_endpoint = AuthEndPoint(auth_endpoint.to_string());
        self
    }

    /// Sets the redirect URI registered with Apple.
    pub fn redirect_uri(mut self, redirect_uri: &str) -> Self {
        self.redirect_uri = RedirectURI(redirect_uri.to_string());
        self
    }

    /// Sets the nonce length. Must be greater than zero.
    pub fn nonce_length(mut self, nonce_length: usize) -> Self {
        self.nonce_length = nonce_length;
        self
    }

    /// Enables the local `nonce` claim check on identity tokens.
    pub fn verify_nonce_claim(mut self, verify: bool) -> Self {
        self.verify_nonce_claim = verify;
        self
    }

    /// Constructs a `Config` instance with the provided values.
    ///
    /// # Panics
    /// Panics if the nonce length is zero.
    pub fn build(self) -> Config {
        assert!(self.nonce_length > 0, "nonce length must be greater than zero");
        Config {
            api_key: self.api_key,
            identity_endpoint: self.identity_endpoint,
            token_endpoint: self.token_endpoint,
            request_uri: self.request_uri,
            client_id: self.client_id,
            auth_endpoint: self.auth_endpoint,
            redirect_uri: self.redirect_uri,
            nonce_length: self.nonce_length,
            verify_nonce_claim: self.verify_nonce_claim,
        }
    }
}
