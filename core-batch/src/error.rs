use thiserror::Error;

#[derive(Error, Debug)]
pub enum BatchError {
    #[error(transparent)]
    Auth(#[from] core_auth::AuthError),

    #[error(transparent)]
    Drive(#[from] provider_google_drive::DriveError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BatchError {
    /// Whether retrying the same file can never succeed.
    pub fn is_permanent(&self) -> bool {
        matches!(self, BatchError::Drive(e) if e.is_permanent())
    }
}

pub type Result<T> = std::result::Result<T, BatchError>;

#[cfg(test)]
mod tests {
    use super::*;
    use provider_google_drive::DriveError;

    #[test]
    fn test_permanent_classification_follows_drive_error() {
        let permanent: BatchError = DriveError::ApiError {
            status_code: 400,
            message: "Invalid media".to_string(),
        }
        .into();
        assert!(permanent.is_permanent());

        let transient: BatchError = DriveError::ApiError {
            status_code: 503,
            message: "Backend unavailable".to_string(),
        }
        .into();
        assert!(!transient.is_permanent());

        let io: BatchError = std::io::Error::other("pipe closed").into();
        assert!(!io.is_permanent());
    }
}
