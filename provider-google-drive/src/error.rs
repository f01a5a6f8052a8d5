//! Error types for the Google Drive provider

use thiserror::Error;

/// Google Drive provider errors
#[derive(Error, Debug)]
pub enum DriveError {
    /// API request returned an error status
    #[error("Google Drive API error (status {status_code}): {message}")]
    ApiError { status_code: u16, message: String },

    /// Resumable upload session could not be established
    #[error("Failed to open resumable upload session: {0}")]
    UploadSessionFailed(String),

    /// Resumable upload ended without a completed file resource
    #[error("Resumable upload ended prematurely at byte {offset} of {total}")]
    UploadIncomplete { offset: u64, total: u64 },

    /// Failed to parse an API response
    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    /// Network or transport error
    #[error("Network error: {0}")]
    NetworkError(#[from] bridge_http::HttpError),

    /// Local file I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl DriveError {
    /// Whether the error can never succeed on retry.
    ///
    /// HTTP 400 means the service rejected the document itself (corrupt or
    /// unconvertible input), so retrying the same bytes is pointless.
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            DriveError::ApiError {
                status_code: 400,
                ..
            }
        )
    }
}

/// Result type for Google Drive operations
pub type Result<T> = std::result::Result<T, DriveError>;
