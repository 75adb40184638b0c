//! Capabilities consumed from the messaging platform.
//!
//! The engine never talks to a chat service directly. It sends, edits and
//! deletes [`Surface`]s through [`Platform`] and observes user input through a
//! broadcast subscription of [`PlatformEvent`]s.

use std::fmt;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::error::FormResult;
use crate::render::Surface;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_string())
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }
    };
}

string_id!(
    /// Identity of a platform user.
    UserId
);
string_id!(
    /// Identity of a channel (or direct conversation).
    ChannelId
);
string_id!(
    /// Identity of a message within its channel.
    MessageId
);

/// Reference to a message sent through the platform.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageHandle {
    pub channel: ChannelId,
    pub id: MessageId,
}

impl MessageHandle {
    pub fn new(channel: impl Into<ChannelId>, id: impl Into<MessageId>) -> Self {
        Self {
            channel: channel.into(),
            id: id.into(),
        }
    }
}

/// The user a form is collecting from, and where.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user: UserId,
    pub channel: ChannelId,
}

impl Session {
    pub fn new(user: impl Into<UserId>, channel: impl Into<ChannelId>) -> Self {
        Self {
            user: user.into(),
            channel: channel.into(),
        }
    }

    /// Whether `user` is the target of this session.
    pub fn is_target(&self, user: &UserId) -> bool {
        &self.user == user
    }
}

/// A raw text submission posted in a channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// The submission itself, so it can be deleted later.
    pub message: MessageHandle,
    pub user: UserId,
    pub text: String,
}

/// Activation of a control attached to a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentEvent {
    /// The message carrying the control.
    pub message: MessageHandle,
    pub user: UserId,
    /// Wire id of the control (see [`ControlAction`](crate::render::ControlAction)).
    pub action_id: String,
    /// Selected values for multi-select controls; empty for plain buttons.
    pub values: Vec<String>,
}

/// Input observed on the platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlatformEvent {
    Reply(Reply),
    Component(ComponentEvent),
}

impl PlatformEvent {
    /// The user who produced the event.
    pub fn user(&self) -> &UserId {
        match self {
            PlatformEvent::Reply(reply) => &reply.user,
            PlatformEvent::Component(event) => &event.user,
        }
    }
}

/// Messaging operations the engine depends on.
#[async_trait::async_trait]
pub trait Platform: Send + Sync {
    /// Post a new message rendering `surface`.
    async fn send_message(&self, channel: &ChannelId, surface: &Surface)
    -> FormResult<MessageHandle>;

    /// Replace the contents of an existing message.
    ///
    /// Fails with [`FormError::MessageUnavailable`](crate::FormError::MessageUnavailable)
    /// when the message was deleted or can no longer be edited.
    async fn edit_message(&self, handle: &MessageHandle, surface: &Surface)
    -> FormResult<MessageHandle>;

    /// Delete a message. Callers treat failures as best-effort.
    async fn delete_message(&self, handle: &MessageHandle) -> FormResult<()>;

    /// Subscribe to every input event from this point on.
    fn subscribe(&self) -> broadcast::Receiver<PlatformEvent>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_target() {
        let session = Session::new("U1", "C1");
        assert!(session.is_target(&UserId::new("U1")));
        assert!(!session.is_target(&UserId::new("U2")));
    }

    #[test]
    fn test_event_user() {
        let event = PlatformEvent::Component(ComponentEvent {
            message: MessageHandle::new("C1", "M1"),
            user: UserId::new("U9"),
            action_id: "confirm".to_string(),
            values: Vec::new(),
        });
        assert_eq!(event.user().as_str(), "U9");
    }

    #[test]
    fn test_ids_serialize_transparently() {
        let handle = MessageHandle::new("C1", "1700000000.000100");
        let json = serde_json::to_value(&handle).unwrap();
        assert_eq!(json["channel"], "C1");
        assert_eq!(json["id"], "1700000000.000100");
    }
}
