//! Tiny library for nonce-bound Sign in with Apple.
//!
//! This library provides the pieces needed to bind a Sign in with Apple request to a
//! single-use nonce and to exchange the returned identity token for a session on an
//! identity backend (Firebase Authentication's Identity Toolkit REST API).
//! [Apple document](https://developer.apple.com/documentation/sign_in_with_apple)
//! # Feature
//! - Generate a nonce from a secure random source (rejection sampled, no modulo bias)
//! - Hash the nonce with SHA-256 and attach it to the authorization request
//! - Build the web authorization URL and parse Apple's `form_post` callback
//! - Exchange the identity token and raw nonce for a session (using reqwest)
//! - Best-effort display name update after the first sign-in
//! - Restore a persisted session from its refresh token
//! - Google and anonymous sign-in, sign-out and account deletion on the same backend
//! # Caution
//! - The identity token is **not** verified locally; the backend checks its signature
//!   and compares `SHA-256(raw nonce)` with its `nonce` claim.
//! - One `AuthService` runs one sign-in at a time. Each attempt carries its own
//!   `PendingAppleSignIn`; answers must be paired with the attempt that produced them.
//! # Examples
//! For a web server using this library, see `demos/axum_server.rs`.
pub mod authorization;
pub mod backend;
pub mod challenge;
pub mod config;
pub mod credential;
pub mod csrf_token;
pub mod error;
pub mod executer;
pub mod identity;
pub mod nonce;
pub mod random;
pub mod refresh_token;
pub mod service;
pub mod session;
