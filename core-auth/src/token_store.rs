//! On-disk token persistence.
//!
//! Stores the OAuth token set as a JSON file (the `token.json` contract of
//! the conversion tool) so later runs can skip the browser entirely.
//!
//! ## Security
//!
//! - The file is written with mode 0o600 on Unix
//! - Writes go to a temporary sibling and are renamed into place, so a
//!   crash never leaves a half-written token file
//! - Corrupted files are deleted and reported; the caller falls back to
//!   the interactive flow
//! - Token values are never logged

use crate::error::{AuthError, Result};
use crate::types::OAuthTokens;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// File-backed storage for the OAuth token set.
#[derive(Debug, Clone)]
pub struct TokenStore {
    path: PathBuf,
}

/// Serializable wrapper for the persisted token set.
#[derive(Debug, Serialize, Deserialize)]
struct StoredTokens {
    access_token: String,
    refresh_token: Option<String>,
    expires_at: i64,
}

impl TokenStore {
    /// Create a token store backed by the given file path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        debug!(path = %path.display(), "Initializing TokenStore");
        Self { path }
    }

    /// The path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Persist a token set, overwriting any previous one.
    pub async fn store_tokens(&self, tokens: &OAuthTokens) -> Result<()> {
        let stored = StoredTokens {
            access_token: tokens.access_token().to_string(),
            refresh_token: tokens.refresh_token().map(|s| s.to_string()),
            expires_at: tokens.expires_at(),
        };

        let json = serde_json::to_vec_pretty(&stored).map_err(|e| {
            warn!(error = %e, "Failed to serialize tokens");
            AuthError::TokenStorage(format!("Token serialization failed: {}", e))
        })?;

        // Write to a sibling temp file and rename so a crash mid-write
        // cannot corrupt the stored tokens.
        let tmp_path = self.path.with_extension("json.tmp");

        tokio::fs::write(&tmp_path, &json).await.map_err(|e| {
            warn!(error = %e, "Failed to write token file");
            AuthError::TokenStorage(format!("Failed to write token file: {}", e))
        })?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Err(e) =
                tokio::fs::set_permissions(&tmp_path, std::fs::Permissions::from_mode(0o600)).await
            {
                warn!(error = %e, "Failed to restrict token file permissions");
            }
        }

        tokio::fs::rename(&tmp_path, &self.path).await.map_err(|e| {
            warn!(error = %e, "Failed to move token file into place");
            AuthError::TokenStorage(format!("Failed to move token file into place: {}", e))
        })?;

        info!(
            has_refresh_token = stored.refresh_token.is_some(),
            "Tokens stored"
        );

        Ok(())
    }

    /// Load the persisted token set.
    ///
    /// Returns `Ok(None)` when no token file exists. A file that fails to
    /// parse is deleted and reported as [`AuthError::TokenCorrupted`].
    pub async fn retrieve_tokens(&self) -> Result<Option<OAuthTokens>> {
        let data = match tokio::fs::read(&self.path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No token file found");
                return Ok(None);
            }
            Err(e) => {
                warn!(error = %e, "Failed to read token file");
                return Err(AuthError::TokenStorage(format!(
                    "Failed to read token file: {}",
                    e
                )));
            }
        };

        let stored: StoredTokens = match serde_json::from_slice(&data) {
            Ok(tokens) => tokens,
            Err(e) => {
                warn!(error = %e, "Token file is corrupted, deleting it");

                if let Err(delete_err) = tokio::fs::remove_file(&self.path).await {
                    warn!(error = %delete_err, "Failed to delete corrupted token file");
                }

                return Err(AuthError::TokenCorrupted(e.to_string()));
            }
        };

        let tokens = OAuthTokens::from_parts(
            stored.access_token,
            stored.refresh_token,
            stored.expires_at,
        );

        info!(
            has_refresh_token = tokens.refresh_token().is_some(),
            expires_at = tokens.expires_at(),
            "Tokens loaded"
        );

        Ok(Some(tokens))
    }

    /// Delete the persisted token set.
    ///
    /// Idempotent: succeeds when no token file exists.
    pub async fn delete_tokens(&self) -> Result<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => {
                info!("Tokens deleted");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => {
                warn!(error = %e, "Failed to delete token file");
                Err(AuthError::TokenStorage(format!(
                    "Failed to delete token file: {}",
                    e
                )))
            }
        }
    }

    /// Check whether a token file exists without parsing it.
    pub async fn has_tokens(&self) -> bool {
        tokio::fs::try_exists(&self.path).await.unwrap_or(false)
    }
}
