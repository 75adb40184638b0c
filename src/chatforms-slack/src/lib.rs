//! Slack platform for chatforms.
//!
//! Forms render as Block Kit messages and user input arrives over Socket
//! Mode:
//! - Direct messages become text replies
//! - Button clicks become component events
//! - Deleted or frozen messages surface as `FormError::MessageUnavailable`
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use chatforms_slack::{SlackConfig, SlackPlatform};
//!
//! let platform = Arc::new(SlackPlatform::new(SlackConfig::from_env()?)?);
//! let runner = Arc::clone(&platform);
//! tokio::spawn(async move { runner.start().await });
//! ```
//!
//! # Configuration
//!
//! Required environment variables:
//! - `SLACK_BOT_TOKEN` - Bot OAuth token (xoxb-...)
//! - `SLACK_APP_TOKEN` - App-level token for Socket Mode (xapp-...)
//!
//! Optional:
//! - `SLACK_API_BASE` - Web API base URL

pub mod config;
pub mod error;
pub mod events;
pub mod messages;
pub mod platform;

// Re-export main types
pub use config::{SlackConfig, SocketOptions};
pub use error::{SlackApiError, SlackError, SlackResult};
pub use events::{MessageEvent, SocketModeAck, SocketModeEnvelope, translate};
pub use messages::{SlackMessageContent, markdown_to_mrkdwn, render_surface};
pub use platform::SlackPlatform;
