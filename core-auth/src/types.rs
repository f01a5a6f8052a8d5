use crate::error::{AuthError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// OAuth 2.0 token set.
///
/// Contains the access token, optional refresh token, and expiration time
/// for an authenticated session.
///
/// # Security
///
/// Tokens should be stored securely and never logged. The `Debug`
/// implementation redacts sensitive information.
///
/// # Examples
///
/// ```
/// use core_auth::OAuthTokens;
///
/// let tokens = OAuthTokens::new(
///     "access".to_string(),
///     Some("refresh".to_string()),
///     3600,
/// );
///
/// assert!(!tokens.is_expired());
/// ```
#[derive(Clone, Serialize, Deserialize)]
pub struct OAuthTokens {
    access_token: String,
    refresh_token: Option<String>,
    expires_at: chrono::DateTime<chrono::Utc>,
}

impl OAuthTokens {
    /// Create a new token set from an `expires_in` lifetime in seconds.
    pub fn new(access_token: String, refresh_token: Option<String>, expires_in: i64) -> Self {
        Self {
            access_token,
            refresh_token,
            expires_at: chrono::Utc::now() + chrono::Duration::seconds(expires_in),
        }
    }

    /// Reconstruct a token set from persisted parts.
    ///
    /// `expires_at` is a Unix timestamp in seconds.
    pub fn from_parts(
        access_token: String,
        refresh_token: Option<String>,
        expires_at: i64,
    ) -> Self {
        Self {
            access_token,
            refresh_token,
            expires_at: chrono::DateTime::from_timestamp(expires_at, 0)
                .unwrap_or_else(chrono::Utc::now),
        }
    }

    /// The access token used for API requests.
    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    /// The refresh token, if the grant produced one.
    pub fn refresh_token(&self) -> Option<&str> {
        self.refresh_token.as_deref()
    }

    /// Token expiration as a Unix timestamp in seconds.
    pub fn expires_at(&self) -> i64 {
        self.expires_at.timestamp()
    }

    /// Check if the access token is expired or expires within the default
    /// five-minute buffer.
    pub fn is_expired(&self) -> bool {
        self.is_expired_with_buffer(300)
    }

    /// Check if the access token is expired with a custom buffer.
    pub fn is_expired_with_buffer(&self, buffer_seconds: i64) -> bool {
        let now = chrono::Utc::now();
        let buffer = chrono::Duration::seconds(buffer_seconds);
        now >= self.expires_at - buffer
    }

    /// Get the time remaining until token expiration.
    ///
    /// Returns `None` if the token is already expired.
    pub fn time_until_expiry(&self) -> Option<chrono::Duration> {
        let now = chrono::Utc::now();
        if now >= self.expires_at {
            None
        } else {
            Some(self.expires_at - now)
        }
    }
}

// Custom Debug implementation to avoid logging tokens
impl fmt::Debug for OAuthTokens {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuthTokens")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// OAuth client credentials for the installed-app flow.
///
/// Loaded from the environment (`GOOGLE_CLIENT_ID` / `GOOGLE_CLIENT_SECRET`,
/// typically via a `.env` file). Placeholder values are rejected up front so
/// a misconfigured run fails before opening a browser.
#[derive(Clone)]
pub struct ClientCredentials {
    pub client_id: String,
    pub client_secret: String,
}

impl ClientCredentials {
    /// Environment variable holding the OAuth client ID.
    pub const CLIENT_ID_VAR: &'static str = "GOOGLE_CLIENT_ID";

    /// Environment variable holding the OAuth client secret.
    pub const CLIENT_SECRET_VAR: &'static str = "GOOGLE_CLIENT_SECRET";

    /// Load client credentials from the environment.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::MissingCredentials`] when either variable is
    /// unset, empty, or still carries a `REPLACE_ME_` placeholder.
    pub fn from_env() -> Result<Self> {
        let client_id = std::env::var(Self::CLIENT_ID_VAR).unwrap_or_default();
        let client_secret = std::env::var(Self::CLIENT_SECRET_VAR).unwrap_or_default();

        Self::validate(client_id, client_secret)
    }

    /// Build credentials from explicit values, applying the same
    /// placeholder validation as [`ClientCredentials::from_env`].
    pub fn validate(client_id: String, client_secret: String) -> Result<Self> {
        if client_id.is_empty() || client_id.starts_with("REPLACE_ME_") {
            return Err(AuthError::MissingCredentials(format!(
                "{} is unset or a placeholder; set a valid OAuth 2.0 desktop client ID",
                Self::CLIENT_ID_VAR
            )));
        }

        if client_secret.is_empty() || client_secret.starts_with("REPLACE_ME_") {
            return Err(AuthError::MissingCredentials(format!(
                "{} is unset or a placeholder; set a valid OAuth 2.0 desktop client secret",
                Self::CLIENT_SECRET_VAR
            )));
        }

        Ok(Self {
            client_id,
            client_secret,
        })
    }
}

impl fmt::Debug for ClientCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientCredentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    #[test]
    fn test_oauth_tokens_new() {
        let tokens = OAuthTokens::new("access".to_string(), Some("refresh".to_string()), 3600);
        assert_eq!(tokens.access_token(), "access");
        assert_eq!(tokens.refresh_token(), Some("refresh"));
        assert!(tokens.time_until_expiry().is_some());
    }

    #[test]
    fn test_oauth_tokens_from_parts_roundtrip() {
        let expires_at = Utc::now().timestamp() + 3600;
        let tokens = OAuthTokens::from_parts("access".to_string(), None, expires_at);

        assert_eq!(tokens.expires_at(), expires_at);
        assert!(tokens.refresh_token().is_none());
    }

    #[test]
    fn test_oauth_tokens_is_expired_fresh() {
        let tokens = OAuthTokens::new("access".to_string(), None, 3600);
        assert!(!tokens.is_expired());
    }

    #[test]
    fn test_oauth_tokens_is_expired_within_buffer() {
        // Less than the default 300s buffer
        let tokens = OAuthTokens::new("access".to_string(), None, 200);
        assert!(tokens.is_expired());
    }

    #[test]
    fn test_oauth_tokens_is_expired_past() {
        let tokens = OAuthTokens::new("access".to_string(), None, -3600);
        assert!(tokens.is_expired());
        assert!(tokens.time_until_expiry().is_none());
    }

    #[test]
    fn test_oauth_tokens_is_expired_with_buffer() {
        let tokens = OAuthTokens::new("access".to_string(), None, 600);
        assert!(!tokens.is_expired_with_buffer(60));
        assert!(tokens.is_expired_with_buffer(900));
    }

    #[test]
    fn test_oauth_tokens_debug_redacts() {
        let tokens = OAuthTokens::new(
            "secret_access_token".to_string(),
            Some("secret_refresh_token".to_string()),
            3600,
        );
        let debug_str = format!("{:?}", tokens);
        assert!(debug_str.contains("[REDACTED]"));
        assert!(!debug_str.contains("secret_access_token"));
        assert!(!debug_str.contains("secret_refresh_token"));
    }

    #[test]
    fn test_client_credentials_rejects_placeholder() {
        let result = ClientCredentials::validate(
            "REPLACE_ME_CLIENT_ID".to_string(),
            "real-secret".to_string(),
        );
        assert!(matches!(result, Err(AuthError::MissingCredentials(_))));
    }

    #[test]
    fn test_client_credentials_rejects_empty_secret() {
        let result = ClientCredentials::validate("client-id".to_string(), String::new());
        assert!(matches!(result, Err(AuthError::MissingCredentials(_))));
    }

    #[test]
    fn test_client_credentials_accepts_valid_values() {
        let creds =
            ClientCredentials::validate("client-id".to_string(), "client-secret".to_string())
                .unwrap();
        assert_eq!(creds.client_id, "client-id");
    }

    #[test]
    fn test_client_credentials_debug_redacts_secret() {
        let creds =
            ClientCredentials::validate("client-id".to_string(), "client-secret".to_string())
                .unwrap();
        let debug_str = format!("{:?}", creds);
        assert!(debug_str.contains("client-id"));
        assert!(!debug_str.contains("client-secret"));
    }
}
