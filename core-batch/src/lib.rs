//! # Batch Conversion Runner
//!
//! Lists eligible office documents, dispatches each through a bounded
//! worker pool running the upload → export → delete sequence, and
//! aggregates success/failure/skip counts.
//!
//! ## Overview
//!
//! - [`discovery`] finds supported source files and applies the
//!   up-to-date skip rule so re-runs are idempotent
//! - [`runner`] owns the worker pool, the per-file attempt budget with
//!   jittered exponential backoff, and the batch summary

pub mod discovery;
pub mod error;
pub mod runner;

pub use discovery::{discover_files, format_size, DiscoveredFile};
pub use error::{BatchError, Result};
pub use runner::{BatchRunner, BatchSummary, FileOutcome};
