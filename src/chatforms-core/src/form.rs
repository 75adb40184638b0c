//! Form assembly and the per-page state machine.
//!
//! A [`Form`] owns an ordered list of [`Component`]s rendered into one shared
//! message. [`Form::run_page`] drives a single visit of the page:
//!
//! 1. render (send the message, or edit it in place on re-entry)
//! 2. sequence every incomplete field in declaration order, one live at a time
//! 3. with no buttons, offer conclude/redo; redo clears and loops back to 1
//! 4. with buttons, wait for one trigger and hand it to the navigator
//!
//! Moving between pages (child forms, back) is the
//! [`Navigator`](crate::navigator::Navigator)'s job.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::button::Button;
use crate::collector::{Collected, Collector, EndReason, controls_on};
use crate::config::SetupOptions;
use crate::content_field::ContentField;
use crate::error::{FormError, FormResult};
use crate::field::{Field, FieldContext, FieldOutcome, FieldValue};
use crate::list_field::ListField;
use crate::navigator::Navigator;
use crate::platform::{MessageHandle, Platform, PlatformEvent, Session};
use crate::render::{Control, ControlAction, ControlStyle, Surface, button_line, field_line};

/// One entry of a form.
#[derive(Debug)]
pub enum Component {
    Button(Button),
    Content(ContentField),
    List(ListField),
}

impl Component {
    pub fn as_field(&self) -> Option<&dyn Field> {
        match self {
            Component::Content(field) => Some(field),
            Component::List(field) => Some(field),
            Component::Button(_) => None,
        }
    }

    pub fn as_field_mut(&mut self) -> Option<&mut dyn Field> {
        match self {
            Component::Content(field) => Some(field),
            Component::List(field) => Some(field),
            Component::Button(_) => None,
        }
    }

    pub fn as_button(&self) -> Option<&Button> {
        match self {
            Component::Button(button) => Some(button),
            _ => None,
        }
    }

    fn as_button_mut(&mut self) -> Option<&mut Button> {
        match self {
            Component::Button(button) => Some(button),
            _ => None,
        }
    }

    fn line(&self) -> String {
        match self {
            Component::Button(button) => {
                button_line(&button.icon, &button.name, &button.description)
            }
            Component::Content(field) => field_line(
                field.name(),
                field.is_activated(),
                field.is_required(),
                &field.display_content(),
            ),
            Component::List(field) => field_line(
                field.name(),
                field.is_activated(),
                field.is_required(),
                &field.display_content(),
            ),
        }
    }
}

impl From<Button> for Component {
    fn from(button: Button) -> Self {
        Component::Button(button)
    }
}

impl From<ContentField> for Component {
    fn from(field: ContentField) -> Self {
        Component::Content(field)
    }
}

impl From<ListField> for Component {
    fn from(field: ListField) -> Self {
        Component::List(field)
    }
}

/// Values of every field that has one, by key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldResults(BTreeMap<String, FieldValue>);

impl FieldResults {
    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.0.get(key)
    }

    pub fn text(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(FieldValue::as_text)
    }

    pub fn choices(&self, key: &str) -> Option<&[String]> {
        self.get(key).and_then(FieldValue::as_choices)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.0.iter().map(|(key, value)| (key.as_str(), value))
    }
}

impl FromIterator<(String, FieldValue)> for FieldResults {
    fn from_iter<I: IntoIterator<Item = (String, FieldValue)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// How a whole setup session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SetupOutcome {
    /// The user concluded the last page; results are that page's.
    Concluded(FieldResults),
    /// A button handled its trigger without opening a page.
    Handled { button: usize },
    /// A window elapsed or the session was cancelled.
    Abandoned,
}

/// Result of [`Form::setup`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetupReport {
    /// The message every page rendered into.
    pub message: MessageHandle,
    pub outcome: SetupOutcome,
}

impl SetupReport {
    pub fn is_concluded(&self) -> bool {
        matches!(self.outcome, SetupOutcome::Concluded(_))
    }
}

/// Where a single page visit left off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PageStep {
    Concluded,
    Abandoned,
    Cancelled,
    /// The button at this index of the form's button list was triggered.
    Triggered(usize),
    /// The user pressed back (only produced by the navigator).
    Back,
}

/// Per-visit inputs of [`Form::run_page`].
pub(crate) struct PageContext<'a> {
    pub platform: &'a Arc<dyn Platform>,
    pub session: &'a Session,
    pub options: &'a SetupOptions,
    /// Cancelled when the visit must stop (back, session cancel).
    pub cancel: CancellationToken,
    /// Whether the page shows a back control. Cleared when its window ends.
    pub back: AtomicBool,
    /// Last surface rendered by this visit.
    pub shown: Mutex<Option<Surface>>,
}

impl PageContext<'_> {
    /// Stop rendering the back control. Returns the last rendered surface
    /// without it, if the page showed anything yet.
    pub fn retire_back(&self) -> Option<Surface> {
        self.back.store(false, Ordering::Release);
        let mut shown = self.shown.lock();
        let surface = shown.take()?.without_control(&ControlAction::Back);
        *shown = Some(surface.clone());
        Some(surface)
    }
}

/// An ordered group of fields and buttons rendered into one message.
#[derive(Debug)]
pub struct Form {
    title: Option<String>,
    components: Vec<Component>,
    content_fields: Vec<usize>,
    list_fields: Vec<usize>,
    buttons: Vec<usize>,
    can_back: bool,
    done: Vec<oneshot::Sender<MessageHandle>>,
}

impl Form {
    /// Build a form, rejecting duplicate field keys and unusable list fields.
    pub fn new(components: Vec<Component>) -> FormResult<Self> {
        let mut keys = BTreeSet::new();
        let mut content_fields = Vec::new();
        let mut list_fields = Vec::new();
        let mut buttons = Vec::new();
        for (index, component) in components.iter().enumerate() {
            match component {
                Component::Button(_) => buttons.push(index),
                Component::Content(field) => {
                    content_fields.push(index);
                    if !keys.insert(field.key()) {
                        return Err(duplicate_key(field.key()));
                    }
                }
                Component::List(field) => {
                    field.validate()?;
                    list_fields.push(index);
                    if !keys.insert(field.key()) {
                        return Err(duplicate_key(field.key()));
                    }
                }
            }
        }

        Ok(Self {
            title: None,
            components,
            content_fields,
            list_fields,
            buttons,
            can_back: false,
            done: Vec::new(),
        })
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Offer a back control on pages opened from this form's buttons.
    pub fn with_back(mut self, can_back: bool) -> Self {
        self.can_back = can_back;
        self
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn can_back(&self) -> bool {
        self.can_back
    }

    pub fn components(&self) -> &[Component] {
        &self.components
    }

    pub fn content_fields(&self) -> impl Iterator<Item = &ContentField> {
        self.content_fields
            .iter()
            .filter_map(|&i| match &self.components[i] {
                Component::Content(field) => Some(field),
                _ => None,
            })
    }

    pub fn list_fields(&self) -> impl Iterator<Item = &ListField> {
        self.list_fields
            .iter()
            .filter_map(|&i| match &self.components[i] {
                Component::List(field) => Some(field),
                _ => None,
            })
    }

    pub fn buttons(&self) -> impl Iterator<Item = &Button> {
        self.buttons
            .iter()
            .filter_map(|&i| self.components[i].as_button())
    }

    /// The button at `index` of [`Form::buttons`].
    pub fn button(&self, index: usize) -> Option<&Button> {
        self.buttons
            .get(index)
            .and_then(|&i| self.components[i].as_button())
    }

    pub(crate) fn button_mut(&mut self, index: usize) -> Option<&mut Button> {
        let i = *self.buttons.get(index)?;
        self.components[i].as_button_mut()
    }

    pub(crate) fn activate_buttons(&mut self) {
        for &i in &self.buttons {
            if let Some(button) = self.components[i].as_button_mut() {
                button.activate();
            }
        }
    }

    fn fields(&self) -> impl Iterator<Item = &dyn Field> {
        self.components.iter().filter_map(Component::as_field)
    }

    /// True iff every field is completed.
    pub fn is_completed(&self) -> bool {
        self.fields().all(|field| field.is_completed())
    }

    /// Values of every field that has one.
    pub fn field_results(&self) -> FieldResults {
        self.fields()
            .filter_map(|field| field.value().map(|value| (field.key().to_string(), value)))
            .collect()
    }

    /// Receive the message handle once this form concludes.
    pub fn subscribe_done(&mut self) -> oneshot::Receiver<MessageHandle> {
        let (tx, rx) = oneshot::channel();
        self.done.push(tx);
        rx
    }

    /// Reset every field for another pass.
    pub fn clear(&mut self) {
        for field in self.components.iter_mut().filter_map(Component::as_field_mut) {
            field.clear();
        }
    }

    /// Summarize every component followed by `controls`.
    pub fn render(&self, controls: Vec<Control>) -> Surface {
        let mut surface = Surface::new();
        if let Some(title) = &self.title {
            surface = surface.title(title);
        }
        for component in &self.components {
            surface = surface.section(component.line());
        }
        controls
            .into_iter()
            .fold(surface, |surface, control| surface.control(control))
    }

    /// Run the whole session starting at this form and return how it ended.
    pub async fn setup(
        &mut self,
        platform: Arc<dyn Platform>,
        session: Session,
        options: SetupOptions,
    ) -> FormResult<SetupReport> {
        Navigator::new(platform, session, options).run(self).await
    }

    fn conclude(&mut self, message: &MessageHandle) {
        for tx in self.done.drain(..) {
            let _ = tx.send(message.clone());
        }
    }

    async fn present(
        &self,
        page: &PageContext<'_>,
        message: &mut Option<MessageHandle>,
        mut controls: Vec<Control>,
    ) -> FormResult<MessageHandle> {
        if page.back.load(Ordering::Acquire) {
            controls.push(Control::new(ControlAction::Back, &page.options.labels.back));
        }
        let surface = self.render(controls);

        let handle = match message.as_ref() {
            Some(handle) => page.platform.edit_message(handle, &surface).await?,
            None => {
                page.platform
                    .send_message(&page.session.channel, &surface)
                    .await?
            }
        };
        *message = Some(handle.clone());
        *page.shown.lock() = Some(surface);
        Ok(handle)
    }

    fn set_live(&mut self, live: usize) {
        for (index, component) in self.components.iter_mut().enumerate() {
            if let Some(field) = component.as_field_mut() {
                if index == live {
                    field.activate();
                } else {
                    field.deactivate();
                }
            }
        }
    }

    /// Sequence every incomplete field. `None` when all are completed.
    async fn sequence_fields(
        &mut self,
        page: &PageContext<'_>,
        message: &mut Option<MessageHandle>,
    ) -> FormResult<Option<PageStep>> {
        for index in 0..self.components.len() {
            if page.cancel.is_cancelled() {
                return Ok(Some(PageStep::Cancelled));
            }
            let pending = self.components[index]
                .as_field()
                .is_some_and(|field| !field.is_completed());
            if !pending {
                continue;
            }

            self.set_live(index);
            self.present(page, message, Vec::new()).await?;

            let ctx = FieldContext {
                platform: page.platform,
                session: page.session,
                options: page.options,
                timeout: page.options.field_timeout(),
                stop: page.cancel.child_token(),
            };
            let outcome = match self.components[index].as_field_mut() {
                Some(field) => field.setup(ctx).await?,
                None => continue,
            };

            match outcome {
                FieldOutcome::Confirmed => {
                    self.present(page, message, Vec::new()).await?;
                }
                FieldOutcome::TimedOut => return Ok(Some(PageStep::Abandoned)),
                FieldOutcome::Cancelled => return Ok(Some(PageStep::Cancelled)),
            }
        }
        Ok(None)
    }

    /// One visit of this page.
    pub(crate) async fn run_page(
        &mut self,
        page: &PageContext<'_>,
        message: &mut Option<MessageHandle>,
    ) -> FormResult<PageStep> {
        loop {
            self.present(page, message, Vec::new()).await?;

            if let Some(step) = self.sequence_fields(page, message).await? {
                return Ok(step);
            }

            if self.buttons.is_empty() {
                match self.conclude_or_redo(page, message).await? {
                    Some(step) => return Ok(step),
                    None => {
                        info!("Redoing form");
                        self.clear();
                    }
                }
            } else {
                return self.dispatch_button(page, message).await;
            }
        }
    }

    /// `None` means redo.
    async fn conclude_or_redo(
        &mut self,
        page: &PageContext<'_>,
        message: &mut Option<MessageHandle>,
    ) -> FormResult<Option<PageStep>> {
        let labels = &page.options.labels;
        let events = page.platform.subscribe();
        let controls = vec![
            Control::new(ControlAction::Conclude, &labels.conclude)
                .enabled(self.is_completed())
                .styled(ControlStyle::Primary),
            Control::new(ControlAction::Redo, &labels.redo),
        ];
        let handle = self.present(page, message, controls).await?;

        let mut choice = Collector::new(events, page.options.conclude_timeout(), page.cancel.clone())
            .filter(controls_on(page.session, &handle, |a| {
                matches!(a, ControlAction::Conclude | ControlAction::Redo)
            }))
            .max(1);

        match choice.next().await {
            Collected::Event(PlatformEvent::Component(event)) => {
                match ControlAction::parse(&event.action_id) {
                    Some(ControlAction::Redo) => Ok(None),
                    _ => {
                        self.present(page, message, Vec::new()).await?;
                        self.conclude(&handle);
                        info!("Form concluded on message {}", handle.id);
                        Ok(Some(PageStep::Concluded))
                    }
                }
            }
            Collected::Event(_) => Ok(Some(PageStep::Abandoned)),
            Collected::Ended(reason) => end_step(reason).map(Some),
        }
    }

    async fn dispatch_button(
        &mut self,
        page: &PageContext<'_>,
        message: &mut Option<MessageHandle>,
    ) -> FormResult<PageStep> {
        let events = page.platform.subscribe();
        let active: Vec<bool> = self.buttons().map(Button::is_activated).collect();
        let controls = self
            .buttons()
            .enumerate()
            .filter(|(_, button)| button.is_activated())
            .map(|(index, button)| Control::new(ControlAction::Button(index), &button.icon))
            .collect();
        let handle = self.present(page, message, controls).await?;

        let mut triggers = Collector::new(events, page.options.button_timeout(), page.cancel.clone())
            .filter(controls_on(page.session, &handle, move |a| match a {
                ControlAction::Button(index) => active.get(*index).copied().unwrap_or(false),
                _ => false,
            }))
            .max(1);

        match triggers.next().await {
            Collected::Event(PlatformEvent::Component(event)) => {
                match ControlAction::parse(&event.action_id) {
                    Some(ControlAction::Button(index)) => {
                        debug!("Button {} triggered", index);
                        Ok(PageStep::Triggered(index))
                    }
                    _ => Ok(PageStep::Abandoned),
                }
            }
            Collected::Event(_) => Ok(PageStep::Abandoned),
            Collected::Ended(reason) => end_step(reason),
        }
    }
}

fn duplicate_key(key: &str) -> FormError {
    FormError::InvalidForm(format!("duplicate field key `{}`", key))
}

fn end_step(reason: EndReason) -> FormResult<PageStep> {
    Ok(match FieldOutcome::from_end(reason)? {
        FieldOutcome::Cancelled => PageStep::Cancelled,
        _ => PageStep::Abandoned,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::button::{ButtonAction, ButtonContext};
    use crate::list_field::{Amount, ListOption};
    use pretty_assertions::assert_eq;

    struct Noop;

    #[async_trait::async_trait]
    impl ButtonAction for Noop {
        async fn interact(&self, _ctx: ButtonContext<'_>) -> FormResult<Option<Form>> {
            Ok(None)
        }
    }

    fn sample() -> Form {
        Form::new(vec![
            ContentField::new("user", "Username", "Pick a name").into(),
            ContentField::new("nick", "Nickname", "Optional")
                .required(false)
                .into(),
            ListField::new("gender", "Gender", "Pick one", Amount::Exactly(1))
                .option(ListOption::new("A", "Alpha"))
                .option(ListOption::new("B", "Beta"))
                .into(),
            Button::new("➡", "Next", "Continue", Noop).into(),
        ])
        .unwrap()
    }

    #[test]
    fn test_partitions() {
        let form = sample();
        assert_eq!(form.content_fields().count(), 2);
        assert_eq!(form.list_fields().count(), 1);
        assert_eq!(form.buttons().count(), 1);
        assert_eq!(form.button(0).map(|b| b.name.as_str()), Some("Next"));
        assert!(form.button(1).is_none());
    }

    #[test]
    fn test_completion_tracks_fields() {
        let form = sample();
        assert!(!form.is_completed());
        assert!(form.field_results().is_empty());

        let optional_only = Form::new(vec![ContentField::new("nick", "Nick", "Optional")
            .required(false)
            .into()])
        .unwrap();
        assert!(optional_only.is_completed());
    }

    #[test]
    fn test_rejects_duplicate_keys() {
        let result = Form::new(vec![
            ContentField::new("user", "Username", "A").into(),
            ContentField::new("user", "Again", "B").into(),
        ]);
        assert!(matches!(result, Err(FormError::InvalidForm(_))));
    }

    #[test]
    fn test_rejects_invalid_list() {
        let result = Form::new(vec![ListField::new("x", "X", "X", Amount::Exactly(1)).into()]);
        assert!(matches!(result, Err(FormError::InvalidForm(_))));
    }

    #[test]
    fn test_render_lines() {
        let form = sample().with_title("Register");
        let surface = form.render(vec![Control::new(ControlAction::Redo, "🔄")]);

        assert_eq!(surface.title.as_deref(), Some("Register"));
        assert_eq!(surface.sections.len(), 4);
        assert_eq!(surface.sections[0].text, "Username ⭐\n```\n...\n```");
        assert_eq!(surface.sections[1].text, "Nickname\n```\n...\n```");
        assert_eq!(surface.sections[3].text, "➡ - Next | Continue");
        assert!(surface.is_enabled(&ControlAction::Redo));
    }

    #[test]
    fn test_set_live_activates_one_field() {
        let mut form = sample();
        form.set_live(2);
        let active: Vec<bool> = form
            .components()
            .iter()
            .filter_map(Component::as_field)
            .map(|f| f.is_activated())
            .collect();
        assert_eq!(active, vec![false, false, true]);
        assert!(form.render(Vec::new()).sections[2].text.starts_with("**Gender**"));
    }

    #[tokio::test]
    async fn test_done_fires_on_conclude() {
        let mut form = sample();
        let rx = form.subscribe_done();
        let handle = MessageHandle::new("C1", "M1");
        form.conclude(&handle);
        assert_eq!(rx.await.unwrap(), handle);
    }

    #[test]
    fn test_button_activation() {
        let mut form = sample();
        form.button_mut(0).unwrap().deactivate();
        assert!(!form.button(0).unwrap().is_activated());
        form.activate_buttons();
        assert!(form.button(0).unwrap().is_activated());
    }
}
