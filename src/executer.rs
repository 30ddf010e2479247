//! Provides an asynchronous execution framework for sending requests to the identity backend.
//!
//! This module:
//! - Defines the Executer trait, which provides a unified interface for making HTTP requests.
//! - Implements executers for IdP sign-in, anonymous sign-up, profile update, account lookup,
//!   session refresh and account deletion.

use std::{error::Error, pin::Pin};

use crate::{
    identity::{
        AccountLookupRequest, AccountLookupResponse, DeleteAccountRequest, SignInResponse,
        SignInWithIdpRequest, SignUpRequest, UpdateProfileRequest,
    },
    refresh_token::{SecureTokenRequest, SecureTokenResponse},
};
use http::StatusCode;
use reqwest::{Client, Response, Url};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use thiserror::Error;
use tracing::error;

/// generic asynchronous execution interface for sending HTTP requests.
/// Key Components:
/// - Req: The request type that the executer will handle.
/// - Response: The expected response type.
/// - Error: The error type that will be returned on failure.
/// - Future: The asynchronous execution result, returning either Response or Error
pub trait Executer<'a, Req>
where
    Req: Send,
{
    type Response;
    type Error: Error;
    type Future: Future<Output = Result<Self::Response, Self::Error>> + Send + 'a;

    fn execute(&'a self, req: &'a Req) -> Self::Future;
}

/// Defines possible errors that can occur during request execution.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExecuteError {
    #[error("Failed to parse data")]
    Parse,
    #[error("Failed to send request")]
    Send,
    #[error("Failed to parse url")]
    URL,
    #[error("Rejected by identity backend: {0}")]
    Rejected(String),
}

type ExecuteFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, ExecuteError>> + Send + 'a>>;

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
}

fn endpoint_url(endpoint: &str, api_key: &str) -> Result<Url, ExecuteError> {
    Url::parse_with_params(endpoint, &[("key", api_key)]).map_err(|e| {
        error!("Failed to parse url: {:?}", e);
        ExecuteError::URL
    })
}

/// Request Workflow
/// 1. Build the endpoint URL with the API key.
/// 2. Send the body as JSON in an HTTP POST request.
/// 3. Map a non-success status to `ExecuteError::Rejected` with the backend's message.
/// 4. Parse and return the response body.
async fn post_json<B, R>(endpoint: &str, api_key: &str, body: &B) -> Result<R, ExecuteError>
where
    B: Serialize + ?Sized,
    R: DeserializeOwned,
{
    let url = endpoint_url(endpoint, api_key)?;
    let client = Client::new();
    let res = client.post(url).json(body).send().await.map_err(|e| {
        error!("Failed to send request: {:?}", e);
        ExecuteError::Send
    })?;
    read_response(res).await
}

async fn read_response<R>(res: Response) -> Result<R, ExecuteError>
where
    R: DeserializeOwned,
{
    let status = res.status();
    if !status.is_success() {
        let message = match res.json::<ErrorBody>().await {
            Ok(body) => body.error.message,
            Err(_) => status.to_string(),
        };
        error!("Identity backend rejected request: {}", message);
        return Err(ExecuteError::Rejected(message));
    }

    res.json::<R>().await.map_err(|e| {
        error!("Failed to parse JSON: {:?}", e);
        ExecuteError::Parse
    })
}

/// Exchanges a provider credential for a session.
pub struct SignInWithIdpExe;

impl<'a> Executer<'a, SignInWithIdpRequest> for SignInWithIdpExe {
    type Response = SignInResponse;
    type Error = ExecuteError;
    type Future = ExecuteFuture<'a, Self::Response>;

    fn execute(&'a self, req: &'a SignInWithIdpRequest) -> Self::Future {
        Box::pin(post_json(req.endpoint(), req.api_key(), req))
    }
}

/// Creates an anonymous account.
pub struct AnonymousSignUpExe;

impl<'a> Executer<'a, SignUpRequest> for AnonymousSignUpExe {
    type Response = SignInResponse;
    type Error = ExecuteError;
    type Future = ExecuteFuture<'a, Self::Response>;

    fn execute(&'a self, req: &'a SignUpRequest) -> Self::Future {
        Box::pin(post_json(req.endpoint(), req.api_key(), req))
    }
}

/// Updates the display name of a signed-in user.
pub struct UpdateProfileExe;

impl<'a> Executer<'a, UpdateProfileRequest> for UpdateProfileExe {
    type Response = ();
    type Error = ExecuteError;
    type Future = ExecuteFuture<'a, Self::Response>;

    fn execute(&'a self, req: &'a UpdateProfileRequest) -> Self::Future {
        Box::pin(async move {
            post_json::<_, serde::de::IgnoredAny>(req.endpoint(), req.api_key(), req).await?;
            Ok(())
        })
    }
}

/// Reads the account behind an ID token.
pub struct LookupAccountExe;

impl<'a> Executer<'a, AccountLookupRequest> for LookupAccountExe {
    type Response = AccountLookupResponse;
    type Error = ExecuteError;
    type Future = ExecuteFuture<'a, Self::Response>;

    fn execute(&'a self, req: &'a AccountLookupRequest) -> Self::Future {
        Box::pin(post_json(req.endpoint(), req.api_key(), req))
    }
}

/// Exchanges a refresh token for a fresh ID token.
pub struct RefreshSessionExe;

/// Request Workflow
/// 1. Build the secure token endpoint URL with the API key.
/// 2. Send `grant_type` and `refresh_token` form-encoded.
/// 3. Parse the fresh tokens, or map the backend's message to `ExecuteError::Rejected`.
impl<'a> Executer<'a, SecureTokenRequest> for RefreshSessionExe {
    type Response = SecureTokenResponse;
    type Error = ExecuteError;
    type Future = ExecuteFuture<'a, Self::Response>;

    fn execute(&'a self, req: &'a SecureTokenRequest) -> Self::Future {
        Box::pin(async move {
            let url = endpoint_url(req.endpoint(), req.api_key())?;
            let client = Client::new();
            let res = client
                .post(url)
                .header("Content-Type", "application/x-www-form-urlencoded")
                .form(req)
                .send()
                .await
                .map_err(|e| {
                    error!("Failed to send request: {:?}", e);
                    ExecuteError::Send
                })?;
            read_response(res).await
        })
    }
}

/// Deletes a signed-in user.
pub struct DeleteAccountExe;

/// Request Workflow
/// 1. Build the endpoint URL with the API key.
/// 2. Send the user's ID token.
/// 3. Return the HTTP status code indicating success or failure.
impl<'a> Executer<'a, DeleteAccountRequest> for DeleteAccountExe {
    type Response = StatusCode;
    type Error = ExecuteError;
    type Future = ExecuteFuture<'a, Self::Response>;

    fn execute(&'a self, req: &'a DeleteAccountRequest) -> Self::Future {
        Box::pin(async move {
            let url = endpoint_url(req.endpoint(), req.api_key())?;
            let client = Client::new();
            let status_code = client
                .post(url)
                .json(req)
                .send()
                .await
                .map_err(|e| {
                    error!("Failed to send request: {:?}", e);
                    ExecuteError::Send
                })?
                .status();
            Ok(status_code)
        })
    }
}
