//! Form wizards over chat messages.
//!
//! This crate drives multi-step input collection inside a single, repeatedly
//! edited chat message:
//! - Content fields collect free text, filtered and optionally masked
//! - List fields collect a bounded selection from fixed options
//! - Buttons open child pages, with optional back navigation
//! - Completed forms offer conclude or redo
//!
//! # Architecture
//!
//! The engine only talks to a chat service through the [`Platform`] trait.
//! Every wait goes through a [`Collector`] bounded by a deadline and a
//! cancellation token, so no listener outlives the step that opened it.
//! The [`Navigator`] owns the page stack and re-enters pages through a loop.
//!
//! # Example
//!
//! ```rust,ignore
//! use chatforms_core::{ContentField, Form, Session, SetupOptions};
//!
//! let mut form = Form::new(vec![
//!     ContentField::new("username", "Username", "Pick a username").into(),
//! ])?;
//! let done = form.subscribe_done();
//! let report = form
//!     .setup(platform, Session::new(user, channel), SetupOptions::default())
//!     .await?;
//! ```

pub mod button;
pub mod collector;
pub mod config;
pub mod content_field;
pub mod error;
pub mod field;
pub mod form;
pub mod list_field;
pub mod memory;
pub mod navigator;
pub mod platform;
pub mod render;
pub mod timeouts;

// Re-export main types
pub use button::{Button, ButtonAction, ButtonContext, OpenForm};
pub use collector::{Collected, Collector, EndReason};
pub use config::{ControlLabels, SetupOptions};
pub use content_field::{AnswerRemoval, ContentField};
pub use error::{FormError, FormResult};
pub use field::{Field, FieldContext, FieldOutcome, FieldValue};
pub use form::{Component, FieldResults, Form, SetupOutcome, SetupReport};
pub use list_field::{Amount, ListField, ListOption};
pub use memory::MemoryPlatform;
pub use navigator::Navigator;
pub use platform::{
    ChannelId, ComponentEvent, MessageHandle, MessageId, Platform, PlatformEvent, Reply, Session,
    UserId,
};
pub use render::{Control, ControlAction, ControlStyle, Section, Surface};
