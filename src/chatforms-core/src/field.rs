//! The activation/completion protocol shared by every input field.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::collector::EndReason;
use crate::config::SetupOptions;
use crate::error::{FormError, FormResult};
use crate::platform::{MessageHandle, Platform, Session};

/// How a field's collection loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldOutcome {
    /// The user explicitly confirmed before the deadline.
    Confirmed,
    /// The collection window elapsed.
    TimedOut,
    /// The field was stopped from outside.
    Cancelled,
}

impl FieldOutcome {
    pub fn is_confirmed(&self) -> bool {
        matches!(self, FieldOutcome::Confirmed)
    }

    /// Map a collector end into an outcome; a closed event source is an error.
    pub(crate) fn from_end(reason: EndReason) -> FormResult<Self> {
        match reason {
            EndReason::Time | EndReason::Limit => Ok(FieldOutcome::TimedOut),
            EndReason::Cancelled => Ok(FieldOutcome::Cancelled),
            EndReason::Closed => Err(FormError::EventStreamClosed),
        }
    }
}

/// The stored result of a field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// Value of a content field.
    Text(String),
    /// Chosen option keys of a list field.
    Choices(Vec<String>),
}

impl FieldValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(text) => Some(text),
            FieldValue::Choices(_) => None,
        }
    }

    pub fn as_choices(&self) -> Option<&[String]> {
        match self {
            FieldValue::Choices(choices) => Some(choices),
            FieldValue::Text(_) => None,
        }
    }
}

/// Everything a field needs to run its collection loop.
pub struct FieldContext<'a> {
    pub platform: &'a Arc<dyn Platform>,
    pub session: &'a Session,
    pub options: &'a SetupOptions,
    /// Window for the whole loop.
    pub timeout: Duration,
    /// Stop signal. Cancelling it ends the loop with [`FieldOutcome::Cancelled`].
    pub stop: CancellationToken,
}

/// A unit of input collection inside a form.
///
/// Invariant: a required field never reports `is_completed()` while
/// `value()` is `None`.
#[async_trait::async_trait]
pub trait Field: Send + Sync {
    /// Stable identifier used in [`FieldResults`](crate::form::FieldResults).
    fn key(&self) -> &str;

    fn name(&self) -> &str;

    fn description(&self) -> &str;

    fn is_required(&self) -> bool;

    /// Whether the field currently accepts raw input.
    fn is_activated(&self) -> bool;

    /// Whether the acceptance criteria are currently met.
    fn is_completed(&self) -> bool;

    fn activate(&mut self);

    fn deactivate(&mut self);

    /// Reset to the pre-collection state: not activated, no value, and
    /// completed only when the field is optional.
    fn clear(&mut self);

    fn value(&self) -> Option<FieldValue>;

    /// What the form shows for this field.
    fn display_content(&self) -> String;

    /// Run the collection loop until the user confirms, the window elapses or
    /// the stop token fires.
    async fn setup(&mut self, ctx: FieldContext<'_>) -> FormResult<FieldOutcome>;
}

/// Delete a message, logging instead of failing.
pub(crate) async fn delete_quietly(platform: &Arc<dyn Platform>, handle: &MessageHandle) {
    if let Err(e) = platform.delete_message(handle).await {
        debug!("Could not delete message {}: {}", handle.id, e);
    }
}
