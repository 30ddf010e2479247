//! Credentials handed to the identity backend once a provider has authenticated the user.
use url::form_urlencoded;

use crate::nonce::Nonce;

pub const APPLE_PROVIDER_ID: &str = "apple.com";
pub const GOOGLE_PROVIDER_ID: &str = "google.com";

/// An Apple identity token bound to the raw nonce it was requested with.
#[derive(Debug, Clone, PartialEq)]
pub struct AppleCredential {
    pub(crate) id_token: String,
    pub(crate) raw_nonce: Nonce,
    pub(crate) full_name: Option<String>,
}

/// A Google ID token plus the access token returned alongside it.
#[derive(Debug, Clone, PartialEq)]
pub struct GoogleCredential {
    pub(crate) id_token: String,
    pub(crate) access_token: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProviderCredential {
    Apple(AppleCredential),
    Google(GoogleCredential),
}

impl ProviderCredential {
    /// The raw nonce is required; the backend hashes it and compares the
    /// result with the identity token's `nonce` claim.
    pub fn apple(id_token: &str, raw_nonce: &Nonce, full_name: Option<&str>) -> Self {
        Self::Apple(AppleCredential {
            id_token: id_token.to_string(),
            raw_nonce: raw_nonce.to_owned(),
            full_name: full_name.map(str::to_string),
        })
    }

    pub fn google(id_token: &str, access_token: &str) -> Self {
        Self::Google(GoogleCredential {
            id_token: id_token.to_string(),
            access_token: access_token.to_string(),
        })
    }

    pub fn provider_id(&self) -> &'static str {
        match self {
            Self::Apple(_) => APPLE_PROVIDER_ID,
            Self::Google(_) => GOOGLE_PROVIDER_ID,
        }
    }

    pub fn id_token(&self) -> &str {
        match self {
            Self::Apple(v) => &v.id_token,
            Self::Google(v) => &v.id_token,
        }
    }

    /// The raw nonce, for Apple credentials.
    pub fn raw_nonce(&self) -> Option<&Nonce> {
        match self {
            Self::Apple(v) => Some(&v.raw_nonce),
            Self::Google(_) => None,
        }
    }

    pub fn full_name(&self) -> Option<&str> {
        match self {
            Self::Apple(v) => v.full_name.as_deref(),
            Self::Google(_) => None,
        }
    }

    /// Form-encoded IdP response forwarded to the backend as `postBody`.
    pub fn post_body(&self) -> String {
        let mut body = form_urlencoded::Serializer::new(String::new());
        body.append_pair("id_token", self.id_token());
        match self {
            Self::Apple(v) => {
                body.append_pair("nonce", v.raw_nonce.value());
            }
            Self::Google(v) => {
                body.append_pair("access_token", &v.access_token);
            }
        }
        body.append_pair("providerId", self.provider_id());
        body.finish()
    }
}
