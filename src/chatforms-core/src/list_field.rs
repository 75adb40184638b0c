//! Choice input field.
//!
//! A list field renders one control per option plus a confirm control.
//! Selection accepts two input styles that converge on the same set:
//! toggle events flip a single option, and whole-set events (action
//! `option:` with `values`) replace the selection in one go. Confirmability is
//! recomputed and re-rendered after every change.
//!
//! The stored value lists option keys in declaration order, regardless of the
//! order in which the user picked them.

use std::collections::BTreeSet;

use tracing::{debug, info};

use crate::collector::{Collected, Collector, controls_on};
use crate::config::ControlLabels;
use crate::error::{FormError, FormResult};
use crate::field::{Field, FieldContext, FieldOutcome, FieldValue, delete_quietly};
use crate::platform::{MessageHandle, PlatformEvent};
use crate::render::{Control, ControlAction, ControlStyle, Surface};

/// One selectable option.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListOption {
    /// Identifier the user selects (an emoji, a short code).
    pub id: String,
    /// Display name.
    pub name: String,
    /// Key stored in the field's value.
    pub key: String,
    pub description: Option<String>,
}

impl ListOption {
    /// Create an option whose key equals its display name.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            id: id.into(),
            key: name.clone(),
            name,
            description: None,
        }
    }

    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// How many options must be chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Amount {
    /// Exactly this many.
    Exactly(usize),
    /// At least this many.
    AtLeast(usize),
}

impl Amount {
    pub fn accepts(&self, count: usize) -> bool {
        match *self {
            Amount::Exactly(n) => count == n,
            Amount::AtLeast(n) => count >= n,
        }
    }
}

/// A field collecting a selection from a fixed option list.
#[derive(Debug)]
pub struct ListField {
    key: String,
    name: String,
    description: String,
    options: Vec<ListOption>,
    amount: Amount,
    required: bool,

    value: Option<Vec<String>>,
    content: Vec<String>,
    activated: bool,
    completed: bool,
}

impl ListField {
    /// Create a required list field.
    pub fn new(
        key: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
        amount: Amount,
    ) -> Self {
        Self {
            key: key.into(),
            name: name.into(),
            description: description.into(),
            options: Vec::new(),
            amount,
            required: true,
            value: None,
            content: Vec::new(),
            activated: false,
            completed: false,
        }
    }

    pub fn option(mut self, option: ListOption) -> Self {
        self.options.push(option);
        self
    }

    pub fn options(mut self, options: impl IntoIterator<Item = ListOption>) -> Self {
        self.options.extend(options);
        self
    }

    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self.completed = !required || self.value.is_some();
        self
    }

    pub fn list(&self) -> &[ListOption] {
        &self.options
    }

    pub fn amount(&self) -> Amount {
        self.amount
    }

    pub fn choices(&self) -> Option<&[String]> {
        self.value.as_deref()
    }

    /// Whether a selection of `count` options may be confirmed.
    pub fn accepts_selection(&self, count: usize) -> bool {
        (!self.required && count == 0) || self.amount.accepts(count)
    }

    /// Reject option lists the amount can never be satisfied with.
    pub fn validate(&self) -> FormResult<()> {
        if self.options.is_empty() {
            return Err(FormError::InvalidForm(format!(
                "list field `{}` has no options",
                self.key
            )));
        }

        let mut ids = BTreeSet::new();
        for option in &self.options {
            if !ids.insert(option.id.as_str()) {
                return Err(FormError::InvalidForm(format!(
                    "list field `{}` repeats option `{}`",
                    self.key, option.id
                )));
            }
        }

        let needed = match self.amount {
            Amount::Exactly(n) | Amount::AtLeast(n) => n,
        };
        if needed > self.options.len() {
            return Err(FormError::InvalidForm(format!(
                "list field `{}` needs {} choices but offers {}",
                self.key,
                needed,
                self.options.len()
            )));
        }
        Ok(())
    }

    fn index_of(&self, id: &str) -> Option<usize> {
        self.options.iter().position(|option| option.id == id)
    }

    fn prompt(&self, selected: &BTreeSet<usize>, labels: &ControlLabels) -> Surface {
        let listing = self
            .options
            .iter()
            .map(|option| match &option.description {
                Some(description) => format!("{} {} - {}", option.id, option.name, description),
                None => format!("{} {}", option.id, option.name),
            })
            .collect::<Vec<_>>()
            .join("\n");

        let mut surface = Surface::text(&self.description).section(listing);
        for (index, option) in self.options.iter().enumerate() {
            let style = if selected.contains(&index) {
                ControlStyle::Primary
            } else {
                ControlStyle::Default
            };
            surface = surface.control(
                Control::new(
                    ControlAction::Option(option.id.clone()),
                    format!("{} {}", option.id, option.name),
                )
                .styled(style),
            );
        }
        surface.control(
            Control::new(ControlAction::Confirm, &labels.confirm)
                .enabled(self.accepts_selection(selected.len())),
        )
    }

    /// Apply one selection event. Returns whether the selection changed.
    fn apply(&self, selected: &mut BTreeSet<usize>, id: &str, values: &[String]) -> bool {
        if id.is_empty() {
            let replacement: BTreeSet<usize> =
                values.iter().filter_map(|v| self.index_of(v)).collect();
            let changed = replacement != *selected;
            *selected = replacement;
            return changed;
        }

        match self.index_of(id) {
            Some(index) => {
                if !selected.remove(&index) {
                    selected.insert(index);
                }
                true
            }
            None => {
                debug!("Field {} has no option `{}`", self.key, id);
                false
            }
        }
    }

    fn freeze(&mut self, selected: &BTreeSet<usize>) {
        let chosen: Vec<&ListOption> = selected.iter().map(|&i| &self.options[i]).collect();
        self.value = Some(chosen.iter().map(|o| o.key.clone()).collect());
        self.content = chosen.iter().map(|o| o.name.clone()).collect();
        self.completed = true;
    }

    async fn collect(
        &mut self,
        ctx: &FieldContext<'_>,
        prompt_slot: &mut Option<MessageHandle>,
    ) -> FormResult<FieldOutcome> {
        let platform = ctx.platform;
        let labels = &ctx.options.labels;
        let events = platform.subscribe();

        let mut selected = BTreeSet::new();
        let prompt = platform
            .send_message(&ctx.session.channel, &self.prompt(&selected, labels))
            .await?;
        *prompt_slot = Some(prompt.clone());

        let mut selections = Collector::new(events, ctx.timeout, ctx.stop.clone()).filter(
            controls_on(ctx.session, &prompt, |a| {
                matches!(a, ControlAction::Confirm | ControlAction::Option(_))
            }),
        );

        loop {
            let event = match selections.next().await {
                Collected::Event(PlatformEvent::Component(event)) => event,
                Collected::Event(_) => continue,
                Collected::Ended(reason) => return FieldOutcome::from_end(reason),
            };
            if !self.activated {
                debug!("Field {} is not active, ignoring selection", self.key);
                continue;
            }

            match ControlAction::parse(&event.action_id) {
                Some(ControlAction::Option(id)) => {
                    if self.apply(&mut selected, &id, &event.values) {
                        platform
                            .edit_message(&prompt, &self.prompt(&selected, labels))
                            .await?;
                    }
                }
                Some(ControlAction::Confirm) => {
                    if self.accepts_selection(selected.len()) {
                        self.freeze(&selected);
                        return Ok(FieldOutcome::Confirmed);
                    }
                    debug!(
                        "Field {} cannot confirm {} choices",
                        self.key,
                        selected.len()
                    );
                }
                _ => {}
            }
        }
    }
}

#[async_trait::async_trait]
impl Field for ListField {
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
        self.content.clear();
        self.completed = !self.required;
    }

    fn value(&self) -> Option<FieldValue> {
        self.value.clone().map(FieldValue::Choices)
    }

    fn display_content(&self) -> String {
        if self.content.is_empty() {
            "...".to_string()
        } else {
            self.content.join(" | ")
        }
    }

    async fn setup(&mut self, ctx: FieldContext<'_>) -> FormResult<FieldOutcome> {
        let mut prompt = None;
        let outcome = self.collect(&ctx, &mut prompt).await;

        self.deactivate();
        if let Some(prompt) = &prompt {
            delete_quietly(ctx.platform, prompt).await;
        }

        if let Ok(outcome) = &outcome {
            info!("Field {} finished: {:?}", self.key, outcome);
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gender() -> ListField {
        ListField::new("gender", "Gender", "Pick one", Amount::Exactly(1))
            .option(ListOption::new("🤓", "Nerd").key("nerd"))
            .option(ListOption::new("🐒", "Monkey").key("monkey"))
    }

    #[test]
    fn test_exact_amount() {
        let field = gender();
        assert!(!field.accepts_selection(0));
        assert!(field.accepts_selection(1));
        assert!(!field.accepts_selection(2));
    }

    #[test]
    fn test_at_least_amount() {
        let field = ListField::new("tags", "Tags", "Pick some", Amount::AtLeast(2))
            .options(["a", "b", "c"].map(|id| ListOption::new(id, id.to_uppercase())));
        assert!(!field.accepts_selection(1));
        assert!(field.accepts_selection(2));
        assert!(field.accepts_selection(3));
    }

    #[test]
    fn test_optional_accepts_empty() {
        let field = gender().required(false);
        assert!(field.accepts_selection(0));
        assert!(field.accepts_selection(1));
        assert!(!field.accepts_selection(2));
        assert!(field.is_completed());
    }

    #[test]
    fn test_toggle_and_replace() {
        let field = gender();
        let mut selected = BTreeSet::new();

        assert!(field.apply(&mut selected, "🐒", &[]));
        assert!(field.apply(&mut selected, "🤓", &[]));
        assert!(field.apply(&mut selected, "🐒", &[]));
        assert_eq!(selected.iter().copied().collect::<Vec<_>>(), vec![0]);

        assert!(!field.apply(&mut selected, "🦊", &[]));

        let values = vec!["🐒".to_string(), "nope".to_string()];
        assert!(field.apply(&mut selected, "", &values));
        assert_eq!(selected.iter().copied().collect::<Vec<_>>(), vec![1]);
    }

    #[test]
    fn test_freeze_uses_declaration_order() {
        let mut field = ListField::new("prefs", "Preferences", "Pick", Amount::AtLeast(1))
            .options([
                ListOption::new("1", "One"),
                ListOption::new("2", "Two"),
                ListOption::new("3", "Three"),
            ]);
        let mut selected = BTreeSet::new();
        field.apply(&mut selected, "3", &[]);
        field.apply(&mut selected, "1", &[]);

        field.freeze(&selected);

        assert_eq!(
            field.value(),
            Some(FieldValue::Choices(vec!["One".to_string(), "Three".to_string()]))
        );
        assert_eq!(field.display_content(), "One | Three");
        assert!(field.is_completed());
    }

    #[test]
    fn test_clear() {
        let mut field = gender();
        let selected = BTreeSet::from([1]);
        field.activate();
        field.freeze(&selected);
        field.clear();

        assert!(!field.is_activated());
        assert!(!field.is_completed());
        assert_eq!(field.value(), None);
        assert_eq!(field.display_content(), "...");
    }

    #[test]
    fn test_validate() {
        assert!(gender().validate().is_ok());

        let empty = ListField::new("x", "X", "X", Amount::Exactly(1));
        assert!(empty.validate().is_err());

        let duplicated = gender().option(ListOption::new("🤓", "Again"));
        assert!(duplicated.validate().is_err());

        let greedy = ListField::new("x", "X", "X", Amount::AtLeast(3))
            .option(ListOption::new("a", "A"));
        assert!(greedy.validate().is_err());
    }

    #[test]
    fn test_prompt_reflects_confirmability() {
        let field = gender();
        let labels = ControlLabels::default();

        let empty = field.prompt(&BTreeSet::new(), &labels);
        assert!(!empty.is_enabled(&ControlAction::Confirm));

        let one = field.prompt(&BTreeSet::from([0]), &labels);
        assert!(one.is_enabled(&ControlAction::Confirm));
        let selected = one
            .find_control(&ControlAction::Option("🤓".to_string()))
            .unwrap();
        assert_eq!(selected.style, ControlStyle::Primary);
    }
}
