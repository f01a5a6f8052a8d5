//! # HTTP Bridge
//!
//! HTTP client abstraction used by every remote-facing crate in the
//! workspace, plus the reqwest-backed implementation used in production.
//!
//! ## Overview
//!
//! The `HttpClient` trait keeps the Drive connector and the OAuth flow
//! testable: unit tests substitute a mock, production wires in
//! [`ReqwestHttpClient`]. The trait-level `execute_with_retry` handles
//! transport-level retries (connection failures, 429, 5xx) so callers only
//! reason about application-level status codes.

pub mod client;
pub mod error;
pub mod types;

pub use client::ReqwestHttpClient;
pub use error::{HttpError, Result};
pub use types::{HttpClient, HttpMethod, HttpRequest, HttpResponse, RetryPolicy};
