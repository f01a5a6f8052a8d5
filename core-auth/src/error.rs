use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Token refresh failed: {0}")]
    TokenRefreshFailed(String),

    #[error("Invalid authorization code: {0}")]
    InvalidAuthCode(String),

    #[error("OAuth state mismatch: expected '{expected}', got '{actual}'")]
    StateMismatch { expected: String, actual: String },

    #[error("Missing client credentials: {0}")]
    MissingCredentials(String),

    #[error("Token storage failed: {0}")]
    TokenStorage(String),

    #[error("Stored tokens are corrupted: {0}")]
    TokenCorrupted(String),

    #[error("Service account key rejected: {0}")]
    ServiceAccountKey(String),

    #[error("Redirect listener failed: {0}")]
    RedirectListener(String),

    #[error("Authorization timed out waiting for browser consent")]
    AuthorizationTimeout,

    #[error("Consent was denied: {0}")]
    ConsentDenied(String),

    #[error("Not authenticated")]
    NotAuthenticated,

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, AuthError>;
