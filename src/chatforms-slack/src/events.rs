//! Translating Socket Mode traffic into platform events.
//!
//! Two kinds of envelopes carry user input:
//! - `events_api` with a `message` event becomes a [`Reply`]
//! - `interactive` with a `block_actions` payload becomes one
//!   [`ComponentEvent`] per action
//!
//! Everything else is acknowledged and dropped.

use chatforms_core::{ComponentEvent, MessageHandle, PlatformEvent, Reply, UserId};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{SlackError, SlackResult};

/// Event payload for messages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageEvent {
    /// User who sent the message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    /// Text of the message.
    #[serde(default)]
    pub text: String,
    /// Channel where the message was sent.
    pub channel: String,
    /// Channel type (im, channel, group, mpim).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel_type: Option<String>,
    /// Timestamp of the message.
    pub ts: String,
    /// Subtype of message (e.g., "bot_message").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtype: Option<String>,
    /// Bot ID (if message is from a bot).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bot_id: Option<String>,
}

impl MessageEvent {
    /// Check if this is a bot message (should be ignored).
    pub fn is_bot_message(&self) -> bool {
        self.bot_id.is_some() || self.subtype.as_deref() == Some("bot_message")
    }

    /// Edits, deletions and joins arrive as subtyped messages.
    pub fn is_plain(&self) -> bool {
        self.subtype.is_none()
    }
}

/// Socket Mode envelope wrapping events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SocketModeEnvelope {
    /// Envelope ID for acknowledgment. `hello` and `disconnect` carry none.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub envelope_id: Option<String>,
    /// Type of payload.
    #[serde(rename = "type")]
    pub envelope_type: String,
    /// Actual payload; its shape depends on the envelope type.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
}

/// Socket Mode acknowledgment response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SocketModeAck {
    /// Envelope ID being acknowledged.
    pub envelope_id: String,
}

impl SocketModeAck {
    /// Create a simple acknowledgment.
    pub fn new(envelope_id: impl Into<String>) -> Self {
        Self {
            envelope_id: envelope_id.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct IdRef {
    id: String,
}

#[derive(Debug, Deserialize)]
struct ActionContainer {
    #[serde(default)]
    message_ts: Option<String>,
    #[serde(default)]
    channel_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SelectedOption {
    value: String,
}

#[derive(Debug, Deserialize)]
struct BlockAction {
    action_id: String,
    #[serde(default)]
    selected_options: Vec<SelectedOption>,
}

/// `block_actions` interaction payload.
#[derive(Debug, Deserialize)]
struct BlockActionsPayload {
    user: IdRef,
    #[serde(default)]
    channel: Option<IdRef>,
    container: ActionContainer,
    #[serde(default)]
    actions: Vec<BlockAction>,
}

impl BlockActionsPayload {
    fn into_events(self) -> SlackResult<Vec<PlatformEvent>> {
        let channel = self
            .container
            .channel_id
            .or(self.channel.map(|c| c.id))
            .ok_or_else(|| SlackError::InvalidPayload("block_actions without channel".to_string()))?;
        let ts = self.container.message_ts.ok_or_else(|| {
            SlackError::InvalidPayload("block_actions outside a message".to_string())
        })?;

        let message = MessageHandle::new(channel, ts);
        let user = UserId::new(self.user.id);
        Ok(self
            .actions
            .into_iter()
            .map(|action| {
                PlatformEvent::Component(ComponentEvent {
                    message: message.clone(),
                    user: user.clone(),
                    action_id: action.action_id,
                    values: action
                        .selected_options
                        .into_iter()
                        .map(|option| option.value)
                        .collect(),
                })
            })
            .collect())
    }
}

fn translate_events_api(payload: &serde_json::Value) -> SlackResult<Vec<PlatformEvent>> {
    let event = payload
        .get("event")
        .ok_or_else(|| SlackError::InvalidPayload("Missing event field".to_string()))?;

    let event_type = event
        .get("type")
        .and_then(|t| t.as_str())
        .unwrap_or("unknown");
    if event_type != "message" {
        debug!("Ignoring event type: {}", event_type);
        return Ok(Vec::new());
    }

    let message: MessageEvent = serde_json::from_value(event.clone())?;
    if message.is_bot_message() || !message.is_plain() {
        return Ok(Vec::new());
    }
    let Some(user) = message.user else {
        return Ok(Vec::new());
    };

    Ok(vec![PlatformEvent::Reply(Reply {
        message: MessageHandle::new(message.channel, message.ts),
        user: UserId::new(user),
        text: message.text,
    })])
}

fn translate_interactive(payload: &serde_json::Value) -> SlackResult<Vec<PlatformEvent>> {
    let kind = payload
        .get("type")
        .and_then(|t| t.as_str())
        .unwrap_or("unknown");
    if kind != "block_actions" {
        debug!("Ignoring interaction type: {}", kind);
        return Ok(Vec::new());
    }

    let actions: BlockActionsPayload = serde_json::from_value(payload.clone())?;
    actions.into_events()
}

/// Turn an envelope into the platform events it carries.
pub fn translate(envelope: &SocketModeEnvelope) -> SlackResult<Vec<PlatformEvent>> {
    let Some(payload) = &envelope.payload else {
        return Ok(Vec::new());
    };
    match envelope.envelope_type.as_str() {
        "events_api" => translate_events_api(payload),
        "interactive" => translate_interactive(payload),
        _ => Ok(Vec::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn envelope(json: serde_json::Value) -> SocketModeEnvelope {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn test_message_becomes_reply() {
        let env = envelope(serde_json::json!({
            "envelope_id": "env-1",
            "type": "events_api",
            "payload": {
                "team_id": "T1",
                "event": {
                    "type": "message",
                    "user": "U1",
                    "text": "longenough",
                    "channel": "D1",
                    "channel_type": "im",
                    "ts": "1700000000.000100"
                }
            }
        }));

        let events = translate(&env).unwrap();
        assert_eq!(
            events,
            vec![PlatformEvent::Reply(Reply {
                message: MessageHandle::new("D1", "1700000000.000100"),
                user: UserId::new("U1"),
                text: "longenough".to_string(),
            })]
        );
    }

    #[test]
    fn test_bot_and_edited_messages_are_dropped() {
        let bot = envelope(serde_json::json!({
            "envelope_id": "env-2",
            "type": "events_api",
            "payload": {"event": {
                "type": "message", "bot_id": "B1", "text": "form",
                "channel": "D1", "ts": "1.1"
            }}
        }));
        assert!(translate(&bot).unwrap().is_empty());

        let edited = envelope(serde_json::json!({
            "envelope_id": "env-3",
            "type": "events_api",
            "payload": {"event": {
                "type": "message", "subtype": "message_changed", "user": "U1",
                "channel": "D1", "ts": "1.2"
            }}
        }));
        assert!(translate(&edited).unwrap().is_empty());
    }

    #[test]
    fn test_block_actions_become_components() {
        let env = envelope(serde_json::json!({
            "envelope_id": "env-4",
            "type": "interactive",
            "payload": {
                "type": "block_actions",
                "user": {"id": "U1", "username": "someone"},
                "container": {"type": "message", "message_ts": "1.5", "channel_id": "D1"},
                "actions": [
                    {"type": "button", "action_id": "option:🤓", "value": "option:🤓"},
                    {"type": "multi_static_select", "action_id": "option:",
                     "selected_options": [{"value": "A"}, {"value": "B"}]}
                ]
            }
        }));

        let events = translate(&env).unwrap();
        assert_eq!(events.len(), 2);
        match &events[1] {
            PlatformEvent::Component(event) => {
                assert_eq!(event.message, MessageHandle::new("D1", "1.5"));
                assert_eq!(event.action_id, "option:");
                assert_eq!(event.values, vec!["A".to_string(), "B".to_string()]);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_hello_has_no_envelope_id() {
        let env = envelope(serde_json::json!({"type": "hello", "num_connections": 1}));
        assert!(env.envelope_id.is_none());
        assert!(translate(&env).unwrap().is_empty());
    }

    #[test]
    fn test_block_actions_without_message() {
        let env = envelope(serde_json::json!({
            "envelope_id": "env-5",
            "type": "interactive",
            "payload": {
                "type": "block_actions",
                "user": {"id": "U1"},
                "container": {"type": "view"},
                "actions": []
            }
        }));
        assert!(matches!(translate(&env), Err(SlackError::InvalidPayload(_))));
    }

    #[test]
    fn test_message_event_kinds() {
        let event = MessageEvent {
            user: Some("U12345".to_string()),
            text: "hello".to_string(),
            channel: "D12345".to_string(),
            channel_type: Some("im".to_string()),
            ts: "1234567890.123456".to_string(),
            subtype: None,
            bot_id: None,
        };
        assert!(event.is_plain());
        assert!(!event.is_bot_message());

        let edited = MessageEvent {
            subtype: Some("message_changed".to_string()),
            ..event.clone()
        };
        assert!(!edited.is_plain());

        let from_bot = MessageEvent {
            bot_id: Some("B1".to_string()),
            ..event
        };
        assert!(from_bot.is_bot_message());
    }

    #[test]
    fn test_socket_mode_ack() {
        let ack = SocketModeAck::new("env-123");
        assert_eq!(
            serde_json::to_value(&ack).unwrap(),
            serde_json::json!({"envelope_id": "env-123"})
        );
    }
}
