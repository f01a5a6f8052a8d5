//! Google Drive API request/response types
//!
//! Data structures for Drive API v3 payloads.

use serde::{Deserialize, Serialize};

/// File metadata sent with an upload.
///
/// Setting `mime_type` to a Google-native type makes Drive convert the
/// uploaded bytes on ingest.
///
/// See: https://developers.google.com/drive/api/v3/reference/files/create
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileMetadata {
    /// Display name of the created file
    pub name: String,

    /// Target MIME type (the import conversion target)
    pub mime_type: String,
}

/// Minimal file resource returned from create calls requesting
/// `fields=id`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedFile {
    /// Drive file ID of the created document
    pub id: String,
}

/// Error payload Drive wraps failures in.
///
/// See: https://developers.google.com/drive/api/guides/handle-errors
#[derive(Debug, Deserialize)]
pub struct ApiErrorResponse {
    pub error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub message: String,
}

/// Extract a human-readable message from an error response body, falling
/// back to the raw body when it is not the documented JSON shape.
pub fn error_message(body: &[u8]) -> String {
    match serde_json::from_slice::<ApiErrorResponse>(body) {
        Ok(parsed) => parsed.error.message,
        Err(_) => String::from_utf8_lossy(body).into_owned(),
    }
}
