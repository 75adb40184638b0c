//! Error types for form orchestration.
//!
//! Only platform-state failures and malformed form definitions are errors.
//! A rejected submission or an elapsed collection window is ordinary control
//! flow and is reported through outcome values instead.

use thiserror::Error;

/// Errors that can occur while assembling or running a form.
#[derive(Error, Debug)]
pub enum FormError {
    /// The shared display message was deleted or can no longer be edited.
    #[error("Message unavailable: {0}")]
    MessageUnavailable(String),

    /// Any other failure reported by the messaging platform.
    #[error("Platform error: {0}")]
    Platform(String),

    /// The platform's event source shut down while a collector was waiting.
    #[error("Event stream closed")]
    EventStreamClosed,

    /// The form definition is inconsistent (duplicate keys, empty lists, ...).
    #[error("Invalid form: {0}")]
    InvalidForm(String),

    /// Configuration could not be parsed.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl FormError {
    /// Whether this error means the shared display surface is gone.
    pub fn is_message_unavailable(&self) -> bool {
        matches!(self, FormError::MessageUnavailable(_))
    }
}

impl From<toml::de::Error> for FormError {
    fn from(err: toml::de::Error) -> Self {
        FormError::Config(err.to_string())
    }
}

/// Result type for form operations.
pub type FormResult<T> = std::result::Result<T, FormError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = FormError::MessageUnavailable("deleted".to_string());
        assert_eq!(err.to_string(), "Message unavailable: deleted");
        assert!(err.is_message_unavailable());

        let err = FormError::InvalidForm("duplicate key `name`".to_string());
        assert_eq!(err.to_string(), "Invalid form: duplicate key `name`");
        assert!(!err.is_message_unavailable());
    }

    #[test]
    fn test_toml_error_conversion() {
        let parse: Result<toml::Value, _> = toml::from_str("= broken");
        let err: FormError = parse.unwrap_err().into();
        assert!(matches!(err, FormError::Config(_)));
    }
}
