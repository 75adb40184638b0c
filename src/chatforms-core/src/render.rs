//! Platform-neutral display model.
//!
//! A [`Surface`] is what the engine asks a platform to show: a few text
//! sections followed by a row of controls. Platforms decide how to draw it
//! (Block Kit, embeds, plain text); the engine only relies on controls being
//! addressable by their [`ControlAction`] wire id.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Something the user can activate on a rendered message.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ControlAction {
    /// Confirm the field currently collecting input.
    Confirm,
    /// Conclude a completed form.
    Conclude,
    /// Clear a completed form and start over.
    Redo,
    /// Leave a child page.
    Back,
    /// Trigger the button at this index of the form's button list.
    Button(usize),
    /// Toggle the list option with this id. An empty id carries the whole
    /// selection in the event's `values` instead.
    Option(String),
}

impl ControlAction {
    /// Wire id used by platforms to route activations back.
    pub fn id(&self) -> String {
        self.to_string()
    }

    /// Parse a wire id; `None` for ids the engine did not emit.
    pub fn parse(id: &str) -> Option<Self> {
        id.parse().ok()
    }
}

impl fmt::Display for ControlAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControlAction::Confirm => f.write_str("confirm"),
            ControlAction::Conclude => f.write_str("conclude"),
            ControlAction::Redo => f.write_str("redo"),
            ControlAction::Back => f.write_str("back"),
            ControlAction::Button(index) => write!(f, "button:{}", index),
            ControlAction::Option(id) => write!(f, "option:{}", id),
        }
    }
}

impl FromStr for ControlAction {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "confirm" => Ok(ControlAction::Confirm),
            "conclude" => Ok(ControlAction::Conclude),
            "redo" => Ok(ControlAction::Redo),
            "back" => Ok(ControlAction::Back),
            _ => {
                if let Some(index) = s.strip_prefix("button:") {
                    index.parse().map(ControlAction::Button).map_err(|_| ())
                } else if let Some(id) = s.strip_prefix("option:") {
                    Ok(ControlAction::Option(id.to_string()))
                } else {
                    Err(())
                }
            }
        }
    }
}

/// Visual emphasis of a control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlStyle {
    #[default]
    Default,
    /// Selected option or primary action.
    Primary,
    Danger,
}

/// A control rendered under a surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Control {
    pub action: ControlAction,
    pub label: String,
    pub enabled: bool,
    pub style: ControlStyle,
}

impl Control {
    pub fn new(action: ControlAction, label: impl Into<String>) -> Self {
        Self {
            action,
            label: label.into(),
            enabled: true,
            style: ControlStyle::Default,
        }
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn styled(mut self, style: ControlStyle) -> Self {
        self.style = style;
        self
    }
}

/// One block of text on a surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    /// Markdown text.
    pub text: String,
}

impl Section {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

/// Everything shown in one message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Surface {
    pub title: Option<String>,
    pub sections: Vec<Section>,
    pub controls: Vec<Control>,
}

impl Surface {
    pub fn new() -> Self {
        Self::default()
    }

    /// A surface holding a single line of text.
    pub fn text(text: impl Into<String>) -> Self {
        Self::new().section(text)
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn section(mut self, text: impl Into<String>) -> Self {
        self.sections.push(Section::new(text));
        self
    }

    pub fn control(mut self, control: Control) -> Self {
        self.controls.push(control);
        self
    }

    /// Find a control by action.
    pub fn find_control(&self, action: &ControlAction) -> Option<&Control> {
        self.controls.iter().find(|c| &c.action == action)
    }

    /// The same surface with `action`'s control removed.
    pub fn without_control(mut self, action: &ControlAction) -> Self {
        self.controls.retain(|c| &c.action != action);
        self
    }

    /// Whether `action` is present and enabled.
    pub fn is_enabled(&self, action: &ControlAction) -> bool {
        self.find_control(action).is_some_and(|c| c.enabled)
    }

    /// All section text joined by newlines, as a plain-text fallback.
    pub fn plain_text(&self) -> String {
        let mut out = String::new();
        if let Some(title) = &self.title {
            out.push_str(title);
            out.push('\n');
        }
        for section in &self.sections {
            out.push_str(&section.text);
            out.push('\n');
        }
        out.trim_end().to_string()
    }
}

/// Format a field line: bold name while active, a star when required, and the
/// current content in a code block.
pub fn field_line(name: &str, activated: bool, required: bool, content: &str) -> String {
    let name = if activated {
        format!("**{}**", name)
    } else {
        name.to_string()
    };
    let marker = if required { " ⭐" } else { "" };
    format!("{}{}\n```\n{}\n```", name, marker, content)
}

/// Format a button line.
pub fn button_line(icon: &str, name: &str, description: &str) -> String {
    format!("{} - {} | {}", icon, name, description)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_control_action_wire_ids() {
        let actions = [
            ControlAction::Confirm,
            ControlAction::Conclude,
            ControlAction::Redo,
            ControlAction::Back,
            ControlAction::Button(3),
            ControlAction::Option("🐒".to_string()),
        ];
        for action in actions {
            assert_eq!(ControlAction::parse(&action.id()), Some(action));
        }
    }

    #[test]
    fn test_control_action_unknown() {
        assert_eq!(ControlAction::parse("approve"), None);
        assert_eq!(ControlAction::parse("button:abc"), None);
        assert_eq!(
            ControlAction::parse("option:a:b"),
            Some(ControlAction::Option("a:b".to_string()))
        );
    }

    #[test]
    fn test_field_line() {
        assert_eq!(
            field_line("Password", true, true, "******"),
            "**Password** ⭐\n```\n******\n```"
        );
        assert_eq!(field_line("Nick", false, false, "..."), "Nick\n```\n...\n```");
    }

    #[test]
    fn test_surface_controls() {
        let surface = Surface::text("hello")
            .control(Control::new(ControlAction::Confirm, "ok").enabled(false))
            .control(Control::new(ControlAction::Redo, "again"));

        assert!(!surface.is_enabled(&ControlAction::Confirm));
        assert!(surface.is_enabled(&ControlAction::Redo));
        assert!(!surface.is_enabled(&ControlAction::Back));
        assert_eq!(surface.plain_text(), "hello");

        let surface = surface
            .control(Control::new(ControlAction::Back, "<"))
            .without_control(&ControlAction::Back);
        assert!(surface.find_control(&ControlAction::Back).is_none());
        assert_eq!(surface.controls.len(), 2);
    }
}
