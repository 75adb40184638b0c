//! In-process platform for tests and local experiments.
//!
//! [`MemoryPlatform`] keeps every message in memory and lets a caller play
//! the user's role: post replies, click controls, select options, or delete
//! and lock messages behind the engine's back. Observers can wait for the
//! message log to reach a given state.

use std::collections::BTreeMap;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{broadcast, watch};
use tracing::debug;

use crate::error::{FormError, FormResult};
use crate::platform::{
    ChannelId, ComponentEvent, MessageHandle, MessageId, Platform, PlatformEvent, Reply, UserId,
};
use crate::render::{ControlAction, Surface};

const EVENT_CAPACITY: usize = 256;

/// Author recorded for messages the engine sends.
pub const ENGINE_USER: &str = "engine";

/// A message as the platform currently holds it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredMessage {
    pub handle: MessageHandle,
    pub author: UserId,
    pub surface: Surface,
    pub deleted: bool,
    pub editable: bool,
    /// Position in the send order.
    pub seq: u64,
}

#[derive(Default)]
struct State {
    messages: BTreeMap<MessageId, StoredMessage>,
    next_seq: u64,
    refuse_sends: bool,
}

/// A [`Platform`] backed by process memory.
pub struct MemoryPlatform {
    state: Mutex<State>,
    events: broadcast::Sender<PlatformEvent>,
    changes: watch::Sender<u64>,
}

impl Default for MemoryPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryPlatform {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let (changes, _) = watch::channel(0);
        Self {
            state: Mutex::new(State::default()),
            events,
            changes,
        }
    }

    fn store(&self, channel: &ChannelId, author: UserId, surface: Surface) -> MessageHandle {
        let handle = MessageHandle::new(channel.clone(), uuid::Uuid::new_v4().to_string());
        {
            let mut state = self.state.lock();
            let seq = state.next_seq;
            state.next_seq += 1;
            state.messages.insert(
                handle.id.clone(),
                StoredMessage {
                    handle: handle.clone(),
                    author,
                    surface,
                    deleted: false,
                    editable: true,
                    seq,
                },
            );
        }
        self.touch();
        handle
    }

    fn touch(&self) {
        self.changes.send_modify(|version| *version += 1);
    }

    fn publish(&self, event: PlatformEvent) {
        // No subscribers is fine: nobody is collecting yet.
        let _ = self.events.send(event);
    }

    /// Post a text reply as `user` and publish it.
    pub fn reply(
        &self,
        user: impl Into<UserId>,
        channel: impl Into<ChannelId>,
        text: &str,
    ) -> MessageHandle {
        let user = user.into();
        let handle = self.store(&channel.into(), user.clone(), Surface::text(text));
        self.publish(PlatformEvent::Reply(Reply {
            message: handle.clone(),
            user,
            text: text.to_string(),
        }));
        handle
    }

    /// Activate `action` on `message` as `user`.
    pub fn click(&self, user: impl Into<UserId>, message: &MessageHandle, action: ControlAction) {
        self.component(user.into(), message, action.id(), Vec::new());
    }

    /// Replace a list selection on `message` in one event.
    pub fn select(&self, user: impl Into<UserId>, message: &MessageHandle, ids: &[&str]) {
        let values = ids.iter().map(|id| id.to_string()).collect();
        self.component(
            user.into(),
            message,
            ControlAction::Option(String::new()).id(),
            values,
        );
    }

    fn component(
        &self,
        user: UserId,
        message: &MessageHandle,
        action_id: String,
        values: Vec<String>,
    ) {
        debug!("{} activates {} on {}", user, action_id, message.id);
        self.publish(PlatformEvent::Component(ComponentEvent {
            message: message.clone(),
            user,
            action_id,
            values,
        }));
    }

    /// Delete a message without going through the engine.
    pub fn delete_externally(&self, message: &MessageHandle) {
        if let Some(stored) = self.state.lock().messages.get_mut(&message.id) {
            stored.deleted = true;
        }
        self.touch();
    }

    /// Make a message uneditable (e.g. an expired edit window).
    pub fn lock(&self, message: &MessageHandle) {
        if let Some(stored) = self.state.lock().messages.get_mut(&message.id) {
            stored.editable = false;
        }
    }

    /// Make every engine send fail until called again with `false`.
    pub fn refuse_sends(&self, refuse: bool) {
        self.state.lock().refuse_sends = refuse;
    }

    pub fn message(&self, handle: &MessageHandle) -> Option<StoredMessage> {
        self.state.lock().messages.get(&handle.id).cloned()
    }

    /// Every message ever stored, in send order.
    pub fn messages(&self) -> Vec<StoredMessage> {
        let mut messages: Vec<StoredMessage> =
            self.state.lock().messages.values().cloned().collect();
        messages.sort_by_key(|m| m.seq);
        messages
    }

    /// Messages not deleted yet, in send order.
    pub fn live_messages(&self) -> Vec<StoredMessage> {
        self.messages().into_iter().filter(|m| !m.deleted).collect()
    }

    /// Wait until some live message satisfies `predicate` and return it.
    pub async fn wait_for<P>(&self, timeout: Duration, predicate: P) -> Option<StoredMessage>
    where
        P: Fn(&StoredMessage) -> bool,
    {
        let mut found = None;
        self.wait_until(timeout, |messages| {
            found = messages.iter().rev().find(|m| predicate(m)).cloned();
            found.is_some()
        })
        .await;
        found
    }

    /// Wait until the live message log satisfies `predicate`.
    pub async fn wait_until<P>(&self, timeout: Duration, mut predicate: P) -> bool
    where
        P: FnMut(&[StoredMessage]) -> bool,
    {
        let mut changes = self.changes.subscribe();
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if predicate(&self.live_messages()) {
                return true;
            }
            tokio::select! {
                changed = changes.changed() => {
                    if changed.is_err() {
                        return false;
                    }
                }
                _ = tokio::time::sleep_until(deadline) => return predicate(&self.live_messages()),
            }
        }
    }
}

#[async_trait::async_trait]
impl Platform for MemoryPlatform {
    async fn send_message(
        &self,
        channel: &ChannelId,
        surface: &Surface,
    ) -> FormResult<MessageHandle> {
        if self.state.lock().refuse_sends {
            return Err(FormError::Platform(format!("sending to {} refused", channel)));
        }
        Ok(self.store(channel, UserId::new(ENGINE_USER), surface.clone()))
    }

    async fn edit_message(
        &self,
        handle: &MessageHandle,
        surface: &Surface,
    ) -> FormResult<MessageHandle> {
        {
            let mut state = self.state.lock();
            let stored = state
                .messages
                .get_mut(&handle.id)
                .filter(|m| !m.deleted)
                .ok_or_else(|| FormError::MessageUnavailable(format!("{} is gone", handle.id)))?;
            if !stored.editable {
                return Err(FormError::MessageUnavailable(format!(
                    "{} can no longer be edited",
                    handle.id
                )));
            }
            stored.surface = surface.clone();
        }
        self.touch();
        Ok(handle.clone())
    }

    async fn delete_message(&self, handle: &MessageHandle) -> FormResult<()> {
        {
            let mut state = self.state.lock();
            match state.messages.get_mut(&handle.id) {
                Some(stored) if !stored.deleted => stored.deleted = true,
                _ => {
                    return Err(FormError::MessageUnavailable(format!(
                        "{} is already gone",
                        handle.id
                    )));
                }
            }
        }
        self.touch();
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<PlatformEvent> {
        self.events.subscribe()
    }
}
