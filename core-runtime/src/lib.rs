//! # Core Runtime Module
//!
//! Foundational runtime infrastructure for drive2pdf:
//! - Logging and tracing infrastructure
//! - Conversion run configuration
//!
//! ## Overview
//!
//! This crate contains the runtime utilities every other crate depends on.
//! It establishes the logging conventions and the validated configuration
//! object the batch runner and the CLI share.

pub mod config;
pub mod error;
pub mod logging;

pub use config::ConvertConfig;
pub use error::{Error, Result};
