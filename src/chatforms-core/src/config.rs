//! Runtime options for a form session.
//!
//! Options can be built in code or loaded from TOML:
//!
//! ```toml
//! field_timeout_ms = 120000
//! feedback_ttl_ms = 2500
//!
//! [labels]
//! back = "⬅"
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::error::FormResult;
use crate::timeouts::{
    DEFAULT_BACK_TIMEOUT_MS, DEFAULT_BUTTON_TIMEOUT_MS, DEFAULT_CONCLUDE_TIMEOUT_MS,
    DEFAULT_FEEDBACK_TTL_MS, DEFAULT_FIELD_TIMEOUT_MS,
};

/// Labels shown on the engine's own controls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlLabels {
    /// Confirms a single field.
    pub confirm: String,
    /// Concludes a completed form.
    pub conclude: String,
    /// Clears a completed form and starts over.
    pub redo: String,
    /// Leaves a child page and returns to its parent.
    pub back: String,
}

impl Default for ControlLabels {
    fn default() -> Self {
        Self {
            confirm: "✅".to_string(),
            conclude: "✅".to_string(),
            redo: "🔄".to_string(),
            back: "◀".to_string(),
        }
    }
}

/// Options applied to every page of a form session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SetupOptions {
    /// Window for each field's collection loop.
    pub field_timeout_ms: u64,
    /// Window for the conclude/redo choice.
    pub conclude_timeout_ms: u64,
    /// Window for a button trigger.
    pub button_timeout_ms: u64,
    /// Window during which back is accepted on a child page.
    pub back_timeout_ms: u64,
    /// Lifetime of validation failure notices.
    pub feedback_ttl_ms: u64,
    /// Control labels.
    pub labels: ControlLabels,
    /// Cancels the whole session when triggered.
    #[serde(skip)]
    pub cancel: CancellationToken,
}

impl Default for SetupOptions {
    fn default() -> Self {
        Self {
            field_timeout_ms: DEFAULT_FIELD_TIMEOUT_MS,
            conclude_timeout_ms: DEFAULT_CONCLUDE_TIMEOUT_MS,
            button_timeout_ms: DEFAULT_BUTTON_TIMEOUT_MS,
            back_timeout_ms: DEFAULT_BACK_TIMEOUT_MS,
            feedback_ttl_ms: DEFAULT_FEEDBACK_TTL_MS,
            labels: ControlLabels::default(),
            cancel: CancellationToken::new(),
        }
    }
}

impl SetupOptions {
    /// Create options with the default windows.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse options from a TOML document. Missing keys keep their defaults.
    pub fn from_toml_str(source: &str) -> FormResult<Self> {
        Ok(toml::from_str(source)?)
    }

    /// Set the window for every field.
    pub fn with_field_timeout(mut self, timeout: Duration) -> Self {
        self.field_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Set the window for the conclude/redo choice.
    pub fn with_conclude_timeout(mut self, timeout: Duration) -> Self {
        self.conclude_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Set the window for button triggers.
    pub fn with_button_timeout(mut self, timeout: Duration) -> Self {
        self.button_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Set the window during which back is accepted.
    pub fn with_back_timeout(mut self, timeout: Duration) -> Self {
        self.back_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Set the lifetime of validation failure notices.
    pub fn with_feedback_ttl(mut self, ttl: Duration) -> Self {
        self.feedback_ttl_ms = ttl.as_millis() as u64;
        self
    }

    /// Use an externally owned cancellation token for the session.
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn field_timeout(&self) -> Duration {
        Duration::from_millis(self.field_timeout_ms)
    }

    pub fn conclude_timeout(&self) -> Duration {
        Duration::from_millis(self.conclude_timeout_ms)
    }

    pub fn button_timeout(&self) -> Duration {
        Duration::from_millis(self.button_timeout_ms)
    }

    pub fn back_timeout(&self) -> Duration {
        Duration::from_millis(self.back_timeout_ms)
    }

    pub fn feedback_ttl(&self) -> Duration {
        Duration::from_millis(self.feedback_ttl_ms)
    }
}
