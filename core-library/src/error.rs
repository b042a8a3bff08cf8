use bridge_traits::error::BridgeError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LibraryError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Bridge error: {0}")]
    Bridge(#[from] BridgeError),

    #[error("Invalid input: {field} - {message}")]
    InvalidInput { field: String, message: String },

    #[error("Migration failed: {0}")]
    Migration(String),
}

pub type Result<T> = std::result::Result<T, LibraryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = LibraryError::InvalidInput {
            field: "locator".to_string(),
            message: "missing remote id".to_string(),
        };
        assert_eq!(error.to_string(), "Invalid input: locator - missing remote id");

        let error = LibraryError::from(BridgeError::NotAvailable("database".to_string()));
        assert!(matches!(error, LibraryError::Bridge(_)));
    }
}
