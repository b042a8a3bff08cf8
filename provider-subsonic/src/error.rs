//! Error types for the Subsonic provider

use bridge_traits::error::BridgeError;
use thiserror::Error;

/// Subsonic provider errors
#[derive(Error, Debug)]
pub enum SubsonicError {
    /// Server answered with `status="failed"`
    #[error("Subsonic API error (code {code}): {message}")]
    ApiError { code: i64, message: String },

    /// Response did not have the expected shape
    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    /// Envelope was fine but the operation's payload key was absent
    #[error("Response is missing the '{0}' payload")]
    MissingPayload(&'static str),

    /// License expiry could not be parsed
    #[error("Invalid license date '{value}': {message}")]
    InvalidDate { value: String, message: String },

    /// Transport failure reported by the fetch port
    #[error(transparent)]
    BridgeError(#[from] BridgeError),
}

/// Result type for Subsonic operations
pub type Result<T> = std::result::Result<T, SubsonicError>;

impl SubsonicError {
    /// True when the server was never reached or never answered.
    pub fn is_transport(&self) -> bool {
        matches!(self, SubsonicError::BridgeError(_))
    }
}

impl From<serde_json::Error> for SubsonicError {
    fn from(error: serde_json::Error) -> Self {
        SubsonicError::ParseError(error.to_string())
    }
}

impl From<SubsonicError> for BridgeError {
    fn from(error: SubsonicError) -> Self {
        match error {
            SubsonicError::BridgeError(e) => e,
            SubsonicError::ApiError { code, message } => {
                BridgeError::OperationFailed(format!("API error (code {}): {}", code, message))
            }
            SubsonicError::ParseError(msg) => BridgeError::Decode(msg),
            SubsonicError::MissingPayload(key) => {
                BridgeError::Decode(format!("missing '{}' payload", key))
            }
            SubsonicError::InvalidDate { value, message } => {
                BridgeError::Decode(format!("invalid date '{}': {}", value, message))
            }
        }
    }
}
