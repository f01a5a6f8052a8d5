//! # Core Authentication
//!
//! Credential acquisition and persistence for the Google Drive conversion
//! pipeline.
//!
//! ## Overview
//!
//! Two ways to obtain an authenticated session:
//! - **Interactive consent flow**: OAuth 2.0 authorization code flow with
//!   PKCE, a localhost loopback redirect listener, and an on-disk token
//!   file that is silently refreshed on later runs.
//! - **Service account**: a Google service-account JSON key is turned into
//!   an RS256-signed JWT assertion and exchanged for short-lived access
//!   tokens.
//!
//! The [`CredentialProvider`] orchestrates both and hands out valid bearer
//! tokens on demand, refreshing transparently near expiry.
//!
//! ## Security
//!
//! - Token values never appear in logs or `Debug` output
//! - The token file is written with mode 0o600 on Unix
//! - PKCE and CSRF state protect the interactive flow

pub mod error;
pub mod manager;
pub mod oauth;
pub mod redirect;
pub mod service_account;
pub mod token_store;
pub mod types;

pub use error::{AuthError, Result};
pub use manager::CredentialProvider;
pub use oauth::{OAuthConfig, OAuthFlowManager, PkceVerifier};
pub use redirect::{AuthCallback, RedirectListener};
pub use service_account::{ServiceAccountFlow, ServiceAccountKey};
pub use token_store::TokenStore;
pub use types::{ClientCredentials, OAuthTokens};
