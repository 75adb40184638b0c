//! Error types for the Slack platform.
//!
//! Slack reports most failures as `{"ok": false, "error": "<code>"}`. The
//! codes that mean "this message can no longer be touched" are classified
//! separately so the form engine can tell them apart from other failures.

use chatforms_core::FormError;
use thiserror::Error;

/// Errors that can occur during Slack operations.
#[derive(Error, Debug)]
pub enum SlackError {
    /// Configuration error (missing or invalid config).
    #[error("Configuration error: {0}")]
    Config(String),

    /// Authentication error (invalid token, expired, etc.).
    #[error("Authentication error: {0}")]
    Auth(String),

    /// API request failed.
    #[error("Slack API error: {0}")]
    Api(String),

    /// API rate limited.
    #[error("Rate limited: retry after {retry_after_secs} seconds")]
    RateLimited {
        /// Seconds to wait before retrying.
        retry_after_secs: u64,
    },

    /// The target message was deleted or can no longer be edited.
    #[error("Message unavailable: {0}")]
    MessageUnavailable(String),

    /// Network/HTTP error.
    #[error("Network error: {0}")]
    Network(String),

    /// WebSocket connection error.
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(String),

    /// Operation timed out.
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// Channel not found or bot not in channel.
    #[error("Channel error: {0}")]
    Channel(String),

    /// Invalid payload received from Slack.
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<reqwest::Error> for SlackError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            SlackError::Timeout(err.to_string())
        } else if err.is_connect() {
            SlackError::Network(format!("Connection failed: {}", err))
        } else {
            SlackError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for SlackError {
    fn from(err: serde_json::Error) -> Self {
        SlackError::Json(err.to_string())
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for SlackError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        SlackError::WebSocket(err.to_string())
    }
}

impl From<SlackError> for FormError {
    fn from(err: SlackError) -> Self {
        match err {
            SlackError::MessageUnavailable(message) => FormError::MessageUnavailable(message),
            SlackError::Config(message) => FormError::Config(message),
            other => FormError::Platform(other.to_string()),
        }
    }
}

/// Result type for Slack operations.
pub type SlackResult<T> = std::result::Result<T, SlackError>;

/// Represents a Slack API response error.
#[derive(Debug, Clone)]
pub struct SlackApiError {
    /// Error code from Slack (e.g., "message_not_found").
    pub code: String,
    /// Name of the API method that failed.
    pub method: String,
}

impl SlackApiError {
    /// Create a new API error.
    pub fn new(code: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            method: method.into(),
        }
    }

    /// Check if an error code means the message is gone or frozen.
    fn is_unavailable_code(code: &str) -> bool {
        matches!(
            code,
            "message_not_found"
                | "cant_update_message"
                | "edit_window_closed"
                | "cant_delete_message"
        )
    }
}

impl From<SlackApiError> for SlackError {
    fn from(err: SlackApiError) -> Self {
        let detail = format!("{}: {}", err.method, err.code);
        match err.code.as_str() {
            "rate_limited" => SlackError::RateLimited {
                retry_after_secs: 30,
            },
            "invalid_auth" | "account_inactive" | "not_authed" => SlackError::Auth(detail),
            "channel_not_found" | "not_in_channel" => SlackError::Channel(detail),
            code if SlackApiError::is_unavailable_code(code) => {
                SlackError::MessageUnavailable(detail)
            }
            _ => SlackError::Api(detail),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SlackError::Config("missing token".to_string());
        assert_eq!(err.to_string(), "Configuration error: missing token");

        let err = SlackError::RateLimited {
            retry_after_secs: 60,
        };
        assert_eq!(err.to_string(), "Rate limited: retry after 60 seconds");
    }

    #[test]
    fn test_api_error_conversion() {
        let err: SlackError = SlackApiError::new("invalid_auth", "auth.test").into();
        assert!(matches!(err, SlackError::Auth(_)));

        for code in ["message_not_found", "cant_update_message", "edit_window_closed"] {
            let err: SlackError = SlackApiError::new(code, "chat.update").into();
            assert!(matches!(err, SlackError::MessageUnavailable(_)), "{}", code);
        }

        let err: SlackError = SlackApiError::new("msg_too_long", "chat.postMessage").into();
        assert_eq!(err.to_string(), "Slack API error: chat.postMessage: msg_too_long");
    }

    #[test]
    fn test_form_error_conversion() {
        let err: FormError = SlackError::MessageUnavailable("chat.update: x".to_string()).into();
        assert!(err.is_message_unavailable());

        let err: FormError = SlackError::Network("down".to_string()).into();
        assert!(matches!(err, FormError::Platform(_)));
    }
}
