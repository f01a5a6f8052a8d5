//! # Google Drive Provider
//!
//! Drive API v3 client for the conversion pipeline.
//!
//! ## Overview
//!
//! This crate provides:
//! - Office format → Google import MIME mapping
//! - Create-with-upload (multipart for small files, resumable chunked
//!   upload above the threshold)
//! - Export of the converted document as PDF, streamed to disk
//! - Deletion of the temporary cloud copy

pub mod connector;
pub mod error;
pub mod mime;
pub mod types;

pub use connector::{DriveConnector, PDF_EXPORT_MIME};
pub use error::{DriveError, Result};
pub use mime::{DocumentKind, SourceFormat};
