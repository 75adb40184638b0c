//! Free-text input field.
//!
//! A content field posts its description as a prompt with a confirm control,
//! then listens for text replies from the target user. Each reply runs
//! through the field's filter: rejected replies produce a short-lived notice,
//! accepted ones update the value and unlock the confirm control. The loop
//! ends on confirm, on timeout or when the stop token fires.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::collector::{Collected, Collector, controls_from, replies_from};
use crate::config::ControlLabels;
use crate::error::FormResult;
use crate::field::{Field, FieldContext, FieldOutcome, FieldValue, delete_quietly};
use crate::platform::{ChannelId, MessageHandle, Platform, PlatformEvent, Reply};
use crate::render::{Control, ControlAction, Surface};

/// Placeholder shown until a value is accepted.
pub const DEFAULT_PLACEHOLDER: &str = "...";

/// Decides whether a submission is acceptable; `Err` carries the reason shown
/// to the user.
pub type ContentFilter = Arc<dyn Fn(&Reply) -> Result<(), String> + Send + Sync>;

/// Maps a submission to a string (display content or stored value).
pub type ContentResolver = Arc<dyn Fn(&Reply) -> String + Send + Sync>;

/// Which user submissions are deleted from the channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerRemoval {
    /// Leave every submission in place.
    #[default]
    Keep,
    /// Delete accepted submissions when the field finishes.
    Correct,
    /// Delete rejected submissions right away.
    Incorrect,
    /// Both of the above.
    All,
}

impl AnswerRemoval {
    pub fn removes_correct(&self) -> bool {
        matches!(self, AnswerRemoval::Correct | AnswerRemoval::All)
    }

    pub fn removes_incorrect(&self) -> bool {
        matches!(self, AnswerRemoval::Incorrect | AnswerRemoval::All)
    }
}

/// A field collecting one textual answer.
pub struct ContentField {
    key: String,
    name: String,
    description: String,
    placeholder: Option<String>,
    required: bool,
    filter: ContentFilter,
    content_resolver: ContentResolver,
    value_resolver: Option<ContentResolver>,
    removal: AnswerRemoval,

    value: Option<String>,
    content: String,
    activated: bool,
    completed: bool,
}

impl fmt::Debug for ContentField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContentField")
            .field("key", &self.key)
            .field("name", &self.name)
            .field("required", &self.required)
            .field("removal", &self.removal)
            .field("content", &self.content)
            .field("activated", &self.activated)
            .field("completed", &self.completed)
            .finish_non_exhaustive()
    }
}

impl ContentField {
    /// Create a required field accepting any text.
    pub fn new(
        key: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            key: key.into(),
            name: name.into(),
            description: description.into(),
            placeholder: None,
            required: true,
            filter: Arc::new(|_| Ok(())),
            content_resolver: Arc::new(|reply| reply.text.clone()),
            value_resolver: None,
            removal: AnswerRemoval::Keep,
            value: None,
            content: DEFAULT_PLACEHOLDER.to_string(),
            activated: false,
            completed: false,
        }
    }

    /// Mark the field optional (or required again).
    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self.completed = !required || self.value.is_some();
        self
    }

    /// Text shown until a value is accepted.
    pub fn placeholder(mut self, placeholder: impl Into<String>) -> Self {
        let placeholder = placeholder.into();
        if self.value.is_none() {
            self.content = placeholder.clone();
        }
        self.placeholder = Some(placeholder);
        self
    }

    pub fn filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(&Reply) -> Result<(), String> + Send + Sync + 'static,
    {
        self.filter = Arc::new(filter);
        self
    }

    /// How an accepted submission is displayed (e.g. masked).
    pub fn content_resolver<F>(mut self, resolver: F) -> Self
    where
        F: Fn(&Reply) -> String + Send + Sync + 'static,
    {
        self.content_resolver = Arc::new(resolver);
        self
    }

    /// How an accepted submission is stored. Defaults to the display content.
    pub fn value_resolver<F>(mut self, resolver: F) -> Self
    where
        F: Fn(&Reply) -> String + Send + Sync + 'static,
    {
        self.value_resolver = Some(Arc::new(resolver));
        self
    }

    pub fn remove_answers(mut self, removal: AnswerRemoval) -> Self {
        self.removal = removal;
        self
    }

    pub fn text(&self) -> Option<&str> {
        self.value.as_deref()
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    fn placeholder_text(&self) -> String {
        self.placeholder
            .clone()
            .unwrap_or_else(|| DEFAULT_PLACEHOLDER.to_string())
    }

    fn resolve(&mut self, reply: &Reply) {
        let content = (self.content_resolver)(reply);
        let value = match &self.value_resolver {
            Some(resolver) => resolver(reply),
            None => content.clone(),
        };
        self.value = Some(value);
        self.content = content;
        self.completed = true;
    }

    fn prompt(&self, confirmable: bool, labels: &ControlLabels) -> Surface {
        Surface::text(&self.description)
            .control(Control::new(ControlAction::Confirm, &labels.confirm).enabled(confirmable))
    }

    async fn collect(
        &mut self,
        ctx: &FieldContext<'_>,
        artifacts: &mut Artifacts,
    ) -> FormResult<FieldOutcome> {
        let platform = ctx.platform;
        let labels = &ctx.options.labels;

        // One subscription for replies and confirms keeps them in platform
        // order. Subscribe before the prompt exists so no early input is missed.
        let is_reply = replies_from(ctx.session);
        let is_confirm = controls_from(ctx.session, |a| *a == ControlAction::Confirm);
        let mut events = Collector::new(platform.subscribe(), ctx.timeout, ctx.stop.clone())
            .filter(move |event| is_reply(event) || is_confirm(event));

        let mut confirmable = !self.required || self.completed;
        let prompt = platform
            .send_message(&ctx.session.channel, &self.prompt(confirmable, labels))
            .await?;
        artifacts.prompt = Some(prompt.clone());

        loop {
            match events.next().await {
                Collected::Event(PlatformEvent::Reply(reply)) => {
                    if !self.activated {
                        debug!("Field {} is not active, ignoring reply", self.key);
                        continue;
                    }
                    match (self.filter)(&reply) {
                        Err(reason) => {
                            debug!("Field {} rejected a submission: {}", self.key, reason);
                            if confirmable {
                                confirmable = false;
                                platform.edit_message(&prompt, &self.prompt(false, labels)).await?;
                            }
                            if self.removal.removes_incorrect() {
                                delete_quietly(platform, &reply.message).await;
                            }
                            artifacts
                                .notify(platform, &ctx.session.channel, reason, ctx.options.feedback_ttl())
                                .await;
                        }
                        Ok(()) => {
                            self.resolve(&reply);
                            artifacts.accepted.push(reply.message);
                            if !confirmable {
                                confirmable = true;
                                platform.edit_message(&prompt, &self.prompt(true, labels)).await?;
                            }
                        }
                    }
                }
                Collected::Event(PlatformEvent::Component(click)) => {
                    if click.message != prompt {
                        continue;
                    }
                    if confirmable && self.activated {
                        return Ok(FieldOutcome::Confirmed);
                    }
                    debug!("Field {} is not confirmable yet, ignoring confirm", self.key);
                }
                Collected::Ended(reason) => return FieldOutcome::from_end(reason),
            }
        }
    }
}

/// Messages a single collection loop leaves behind.
#[derive(Default)]
struct Artifacts {
    prompt: Option<MessageHandle>,
    notices: Vec<MessageHandle>,
    accepted: Vec<MessageHandle>,
    expiring: JoinSet<()>,
}

impl Artifacts {
    /// Post a notice that deletes itself after `ttl`. Best-effort.
    async fn notify(
        &mut self,
        platform: &Arc<dyn Platform>,
        channel: &ChannelId,
        reason: String,
        ttl: Duration,
    ) {
        let notice = match platform.send_message(channel, &Surface::text(reason)).await {
            Ok(notice) => notice,
            Err(e) => {
                warn!("Failed to post notice: {}", e);
                return;
            }
        };
        self.notices.push(notice.clone());

        let platform = Arc::clone(platform);
        self.expiring.spawn(async move {
            tokio::time::sleep(ttl).await;
            delete_quietly(&platform, &notice).await;
        });
    }

    /// Remove everything this loop rendered, honoring the removal policy.
    async fn cleanup(mut self, platform: &Arc<dyn Platform>, removal: AnswerRemoval) {
        self.expiring.abort_all();
        for notice in &self.notices {
            delete_quietly(platform, notice).await;
        }
        if removal.removes_correct() {
            for answer in &self.accepted {
                delete_quietly(platform, answer).await;
            }
        }
        if let Some(prompt) = &self.prompt {
            delete_quietly(platform, prompt).await;
        }
    }
}

#[async_trait::async_trait]
impl Field for ContentField {
    fn key(&self) -> &str {
        &self.key
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn is_required(&self) -> bool {
        self.required
    }

    fn is_activated(&self) -> bool {
        self.activated
    }

    fn is_completed(&self) -> bool {
        self.completed
    }

    fn activate(&mut self) {
        self.activated = true;
    }

    fn deactivate(&mut self) {
        self.activated = false;
    }

    fn clear(&mut self) {
        self.activated = false;
        self.value = None;
        self.content = self.placeholder_text();
        self.completed = !self.required;
    }

    fn value(&self) -> Option<FieldValue> {
        self.value.clone().map(FieldValue::Text)
    }

    fn display_content(&self) -> String {
        self.content.clone()
    }

    async fn setup(&mut self, ctx: FieldContext<'_>) -> FormResult<FieldOutcome> {
        let mut artifacts = Artifacts::default();
        let outcome = self.collect(&ctx, &mut artifacts).await;

        self.deactivate();
        artifacts.cleanup(ctx.platform, self.removal).await;

        if let Ok(outcome) = &outcome {
            info!("Field {} finished: {:?}", self.key, outcome);
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::{MessageHandle, UserId};

    fn reply(text: &str) -> Reply {
        Reply {
            message: MessageHandle::new("C1", "R1"),
            user: UserId::new("U1"),
            text: text.to_string(),
        }
    }

    #[test]
    fn test_new_field_is_pending() {
        let field = ContentField::new("username", "Username", "Pick a username");
        assert!(field.is_required());
        assert!(!field.is_completed());
        assert!(!field.is_activated());
        assert_eq!(field.value(), None);
        assert_eq!(field.display_content(), "...");
    }

    #[test]
    fn test_optional_field_starts_completed() {
        let field = ContentField::new("nick", "Nick", "Nickname?").required(false);
        assert!(field.is_completed());
        assert_eq!(field.value(), None);
    }

    #[test]
    fn test_resolvers() {
        let mut field = ContentField::new("password", "Password", "Password?")
            .content_resolver(|r| "*".repeat(r.text.len()))
            .value_resolver(|r| r.text.clone());

        field.resolve(&reply("hunter22"));

        assert!(field.is_completed());
        assert_eq!(field.display_content(), "********");
        assert_eq!(field.text(), Some("hunter22"));
    }

    #[test]
    fn test_value_defaults_to_content() {
        let mut field = ContentField::new("email", "Email", "Email?")
            .content_resolver(|r| r.text.to_lowercase());
        field.resolve(&reply("Me@Example.COM"));
        assert_eq!(field.text(), Some("me@example.com"));
    }

    #[test]
    fn test_clear_restores_placeholder() {
        let mut field = ContentField::new("city", "City", "City?").placeholder("unknown");
        assert_eq!(field.display_content(), "unknown");

        field.activate();
        field.resolve(&reply("Recife"));
        field.clear();

        assert!(!field.is_activated());
        assert!(!field.is_completed());
        assert_eq!(field.value(), None);
        assert_eq!(field.display_content(), "unknown");
    }

    #[test]
    fn test_removal_policy() {
        assert!(!AnswerRemoval::Keep.removes_correct());
        assert!(!AnswerRemoval::Keep.removes_incorrect());
        assert!(AnswerRemoval::Correct.removes_correct());
        assert!(!AnswerRemoval::Correct.removes_incorrect());
        assert!(AnswerRemoval::Incorrect.removes_incorrect());
        assert!(AnswerRemoval::All.removes_correct());
        assert!(AnswerRemoval::All.removes_incorrect());
    }
}
