use thiserror::Error;

/// Error taxonomy of the progress core. Services return this; handlers
/// translate variants onto HTTP statuses.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Conflict(String),

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

impl CoreError {
    pub fn not_found(message: impl Into<String>) -> Self {
        CoreError::NotFound(message.into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        CoreError::Validation(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        CoreError::Conflict(message.into())
    }

    /// Maps a driver error onto the taxonomy: unique-index violations are
    /// validation failures (duplicate unique-key insert), everything else
    /// is a storage fault.
    pub fn from_mongo(err: mongodb::error::Error, what: &str) -> Self {
        if is_duplicate_key(&err) {
            CoreError::Validation(format!("{} already exists", what))
        } else {
            CoreError::Storage(anyhow::Error::new(err).context(format!("{} write failed", what)))
        }
    }
}

pub fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    match err.kind.as_ref() {
        mongodb::error::ErrorKind::Write(mongodb::error::WriteFailure::WriteError(write_err)) => {
            write_err.code == 11000
        }
        mongodb::error::ErrorKind::BulkWrite(bulk) => bulk
            .write_errors
            .values()
            .any(|write_err| write_err.code == 11000),
        _ => false,
    }
}

pub type CoreResult<T> = Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructors_carry_message() {
        let err = CoreError::not_found("lesson missing");
        assert!(matches!(err, CoreError::NotFound(_)));
        assert_eq!(err.to_string(), "lesson missing");

        let err = CoreError::validation("percentage out of range");
        assert_eq!(err.to_string(), "percentage out of range");
    }

    #[test]
    fn storage_wraps_anyhow_context() {
        let err = CoreError::Storage(anyhow::anyhow!("connection reset"));
        assert!(err.to_string().contains("connection reset"));
    }
}
