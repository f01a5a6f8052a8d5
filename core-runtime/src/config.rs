//! # Conversion Run Configuration
//!
//! Configuration for a batch conversion run, built with a fail-fast
//! validating builder.
//!
//! ## Usage
//!
//! ```
//! use core_runtime::config::ConvertConfig;
//!
//! let config = ConvertConfig::builder()
//!     .input_dir("input")
//!     .output_dir("output")
//!     .token_path("token.json")
//!     .build()
//!     .expect("Failed to build config");
//!
//! assert_eq!(config.max_concurrent, 4);
//! ```
//!
//! ## Error Handling
//!
//! The builder validates every field and returns actionable error
//! messages for invalid values (zero concurrency, chunk sizes that are
//! not a multiple of 256 KiB, and so on).

use crate::error::{Error, Result};
use std::path::PathBuf;
use std::time::Duration;

/// Resumable uploads kick in above this source file size.
pub const DEFAULT_RESUMABLE_THRESHOLD_BYTES: u64 = 5 * 1024 * 1024;

/// Chunk size for resumable uploads. Must stay a multiple of 256 KiB per
/// the Drive API contract.
pub const DEFAULT_UPLOAD_CHUNK_BYTES: u64 = 8 * 1024 * 1024;

const UPLOAD_CHUNK_ALIGNMENT: u64 = 256 * 1024;

/// Configuration for a batch conversion run.
///
/// Use [`ConvertConfig::builder`] to construct instances.
#[derive(Debug, Clone)]
pub struct ConvertConfig {
    /// Directory scanned for source office documents
    pub input_dir: PathBuf,

    /// Directory receiving exported PDFs
    pub output_dir: PathBuf,

    /// Path of the persisted OAuth token file
    pub token_path: PathBuf,

    /// Maximum number of files converted concurrently
    pub max_concurrent: usize,

    /// Attempt budget per file (upload, export, delete sequence)
    pub max_attempts: u32,

    /// Base backoff delay between per-file attempts
    pub retry_base_delay: Duration,

    /// Source size above which the resumable upload path is used
    pub resumable_threshold_bytes: u64,

    /// Chunk size for resumable uploads
    pub upload_chunk_bytes: u64,
}

impl ConvertConfig {
    /// Creates a new builder for constructing a `ConvertConfig`.
    pub fn builder() -> ConvertConfigBuilder {
        ConvertConfigBuilder::default()
    }

    /// Validates the configuration and returns an error if invalid.
    ///
    /// This checks:
    /// - Directories and token path are not empty
    /// - Concurrency is within 1..=32
    /// - The attempt budget is within 1..=10
    /// - The upload chunk size is a non-zero multiple of 256 KiB
    pub fn validate(&self) -> Result<()> {
        if self.input_dir.as_os_str().is_empty() {
            return Err(Error::Config("Input directory cannot be empty".to_string()));
        }

        if self.output_dir.as_os_str().is_empty() {
            return Err(Error::Config(
                "Output directory cannot be empty".to_string(),
            ));
        }

        if self.token_path.as_os_str().is_empty() {
            return Err(Error::Config("Token path cannot be empty".to_string()));
        }

        if self.max_concurrent == 0 {
            return Err(Error::Config(
                "Concurrency must be greater than 0".to_string(),
            ));
        }

        if self.max_concurrent > 32 {
            return Err(Error::Config(
                "Concurrency exceeds maximum of 32 workers".to_string(),
            ));
        }

        if self.max_attempts == 0 {
            return Err(Error::Config(
                "Attempt budget must be greater than 0".to_string(),
            ));
        }

        if self.max_attempts > 10 {
            return Err(Error::Config(
                "Attempt budget exceeds maximum of 10".to_string(),
            ));
        }

        if self.upload_chunk_bytes == 0 || self.upload_chunk_bytes % UPLOAD_CHUNK_ALIGNMENT != 0 {
            return Err(Error::Config(
                "Upload chunk size must be a non-zero multiple of 256 KiB".to_string(),
            ));
        }

        Ok(())
    }
}

/// Builder for constructing [`ConvertConfig`] instances.
#[derive(Default)]
pub struct ConvertConfigBuilder {
    input_dir: Option<PathBuf>,
    output_dir: Option<PathBuf>,
    token_path: Option<PathBuf>,
    max_concurrent: Option<usize>,
    max_attempts: Option<u32>,
    retry_base_delay: Option<Duration>,
    resumable_threshold_bytes: Option<u64>,
    upload_chunk_bytes: Option<u64>,
}

impl ConvertConfigBuilder {
    /// Sets the input directory.
    pub fn input_dir<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.input_dir = Some(path.into());
        self
    }

    /// Sets the output directory.
    pub fn output_dir<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.output_dir = Some(path.into());
        self
    }

    /// Sets the token file path.
    pub fn token_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.token_path = Some(path.into());
        self
    }

    /// Sets the number of concurrent conversions.
    ///
    /// Default: 4
    pub fn max_concurrent(mut self, workers: usize) -> Self {
        self.max_concurrent = Some(workers);
        self
    }

    /// Sets the per-file attempt budget.
    ///
    /// Default: 3
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = Some(attempts);
        self
    }

    /// Sets the base backoff delay between per-file attempts.
    ///
    /// Default: 1 second
    pub fn retry_base_delay(mut self, delay: Duration) -> Self {
        self.retry_base_delay = Some(delay);
        self
    }

    /// Sets the resumable upload threshold in bytes.
    ///
    /// Default: 5 MiB
    pub fn resumable_threshold_bytes(mut self, bytes: u64) -> Self {
        self.resumable_threshold_bytes = Some(bytes);
        self
    }

    /// Sets the resumable upload chunk size in bytes.
    ///
    /// Default: 8 MiB
    pub fn upload_chunk_bytes(mut self, bytes: u64) -> Self {
        self.upload_chunk_bytes = Some(bytes);
        self
    }

    /// Builds the final `ConvertConfig` instance.
    ///
    /// Returns an error with an actionable message if a required field is
    /// missing or a value is out of range.
    pub fn build(self) -> Result<ConvertConfig> {
        let input_dir = self.input_dir.ok_or_else(|| {
            Error::Config("Input directory is required. Use .input_dir() to set it.".to_string())
        })?;

        let output_dir = self.output_dir.ok_or_else(|| {
            Error::Config("Output directory is required. Use .output_dir() to set it.".to_string())
        })?;

        let token_path = self.token_path.ok_or_else(|| {
            Error::Config("Token path is required. Use .token_path() to set it.".to_string())
        })?;

        let config = ConvertConfig {
            input_dir,
            output_dir,
            token_path,
            max_concurrent: self.max_concurrent.unwrap_or(4),
            max_attempts: self.max_attempts.unwrap_or(3),
            retry_base_delay: self.retry_base_delay.unwrap_or(Duration::from_secs(1)),
            resumable_threshold_bytes: self
                .resumable_threshold_bytes
                .unwrap_or(DEFAULT_RESUMABLE_THRESHOLD_BYTES),
            upload_chunk_bytes: self.upload_chunk_bytes.unwrap_or(DEFAULT_UPLOAD_CHUNK_BYTES),
        };

        config.validate()?;

        Ok(config)
    }
}
