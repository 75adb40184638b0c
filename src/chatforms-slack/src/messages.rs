//! Rendering surfaces as Slack messages.
//!
//! A [`Surface`] becomes Block Kit:
//! - the title becomes a header block
//! - each section becomes a mrkdwn section block
//! - enabled controls become buttons in one actions block
//!
//! Disabled controls are left out, since Slack buttons cannot be greyed out.

use chatforms_core::{ControlStyle, Surface};
use serde::{Deserialize, Serialize};

/// Convert Markdown to Slack mrkdwn format.
///
/// - Bold: `**text**` → `*text*`
/// - Strikethrough: `~~text~~` → `~text~`
/// - Links: `[text](url)` → `<url|text>`
/// - Code (inline and fenced) is copied untouched
///
/// # Example
///
/// ```rust
/// use chatforms_slack::markdown_to_mrkdwn;
///
/// let mrkdwn = markdown_to_mrkdwn("**Password** ⭐");
/// assert_eq!(mrkdwn, "*Password* ⭐");
/// ```
pub fn markdown_to_mrkdwn(md: &str) -> String {
    let mut in_code_block = false;
    let mut processed = String::with_capacity(md.len());
    let mut i = 0;

    while i < md.len() {
        let remaining = &md[i..];

        if remaining.starts_with("```") {
            in_code_block = !in_code_block;
            processed.push_str("```");
            i += 3;
            continue;
        }

        if !in_code_block {
            // Inline code is copied as is
            if remaining.starts_with('`')
                && let Some(end) = remaining[1..].find('`')
            {
                processed.push_str(&remaining[..end + 2]);
                i += end + 2;
                continue;
            }

            if remaining.starts_with("**")
                && let Some(end) = remaining[2..].find("**")
            {
                processed.push('*');
                processed.push_str(&remaining[2..end + 2]);
                processed.push('*');
                i += end + 4;
                continue;
            }

            if remaining.starts_with("~~")
                && let Some(end) = remaining[2..].find("~~")
            {
                processed.push('~');
                processed.push_str(&remaining[2..end + 2]);
                processed.push('~');
                i += end + 4;
                continue;
            }

            if remaining.starts_with('[')
                && let Some(bracket_end) = remaining.find("](")
                && let Some(url_end) = remaining[bracket_end + 2..].find(')')
            {
                let text = &remaining[1..bracket_end];
                let url = &remaining[bracket_end + 2..bracket_end + 2 + url_end];
                processed.push_str(&format!("<{}|{}>", url, text));
                i += bracket_end + 2 + url_end + 1;
                continue;
            }
        }

        // Copy one whole character
        if let Some(c) = remaining.chars().next() {
            processed.push(c);
            i += c.len_utf8();
        } else {
            break;
        }
    }

    processed
}

/// Slack Block Kit block types.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SlackBlock {
    /// Header block.
    Header { text: SlackTextObject },
    /// Section block (main content).
    Section { text: SlackTextObject },
    /// Actions block (buttons).
    Actions { elements: Vec<SlackBlockElement> },
}

/// Slack text object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlackTextObject {
    #[serde(rename = "type")]
    pub text_type: String,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emoji: Option<bool>,
}

impl SlackTextObject {
    /// Create a plain text object.
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text_type: "plain_text".to_string(),
            text: text.into(),
            emoji: Some(true),
        }
    }

    /// Create a mrkdwn text object.
    pub fn mrkdwn(text: impl Into<String>) -> Self {
        Self {
            text_type: "mrkdwn".to_string(),
            text: text.into(),
            emoji: None,
        }
    }
}

/// Slack block element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SlackBlockElement {
    /// Button element.
    Button {
        text: SlackTextObject,
        action_id: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        value: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        style: Option<String>,
    },
}

/// Slack message content with blocks.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SlackMessageContent {
    /// Fallback text for notifications.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Block Kit blocks.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blocks: Option<Vec<SlackBlock>>,
}

impl SlackMessageContent {
    /// Create a new message content.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set fallback text.
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Set blocks.
    pub fn with_blocks(mut self, blocks: Vec<SlackBlock>) -> Self {
        self.blocks = Some(blocks);
        self
    }

    /// Merge into a Web API payload.
    pub fn apply_to(&self, payload: &mut serde_json::Value) {
        if let Some(text) = &self.text {
            payload["text"] = serde_json::json!(text);
        }
        // chat.update keeps old blocks unless they are replaced explicitly
        payload["blocks"] = serde_json::json!(self.blocks.as_deref().unwrap_or(&[]));
    }
}

fn button_style(style: ControlStyle) -> Option<String> {
    match style {
        ControlStyle::Default => None,
        ControlStyle::Primary => Some("primary".to_string()),
        ControlStyle::Danger => Some("danger".to_string()),
    }
}

/// Render a surface as Block Kit.
pub fn render_surface(surface: &Surface) -> SlackMessageContent {
    let mut blocks = Vec::new();

    if let Some(title) = &surface.title {
        blocks.push(SlackBlock::Header {
            text: SlackTextObject::plain(title),
        });
    }
    for section in &surface.sections {
        blocks.push(SlackBlock::Section {
            text: SlackTextObject::mrkdwn(markdown_to_mrkdwn(&section.text)),
        });
    }

    let elements: Vec<SlackBlockElement> = surface
        .controls
        .iter()
        .filter(|control| control.enabled)
        .map(|control| SlackBlockElement::Button {
            text: SlackTextObject::plain(&control.label),
            action_id: control.action.id(),
            value: Some(control.action.id()),
            style: button_style(control.style),
        })
        .collect();
    if !elements.is_empty() {
        blocks.push(SlackBlock::Actions { elements });
    }

    SlackMessageContent::new()
        .with_text(surface.plain_text())
        .with_blocks(blocks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatforms_core::{Control, ControlAction};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_markdown_to_mrkdwn_bold() {
        assert_eq!(markdown_to_mrkdwn("**bold**"), "*bold*");
        assert_eq!(markdown_to_mrkdwn("some **bold** text"), "some *bold* text");
    }

    #[test]
    fn test_markdown_to_mrkdwn_strikethrough() {
        assert_eq!(markdown_to_mrkdwn("~~strike~~"), "~strike~");
    }

    #[test]
    fn test_markdown_to_mrkdwn_links() {
        assert_eq!(
            markdown_to_mrkdwn("[click here](https://example.com)"),
            "<https://example.com|click here>"
        );
    }

    #[test]
    fn test_markdown_to_mrkdwn_code_preserved() {
        assert_eq!(
            markdown_to_mrkdwn("Name\n```\n**not bold**\n```"),
            "Name\n```\n**not bold**\n```"
        );
        assert_eq!(markdown_to_mrkdwn("use `**x**` here"), "use `**x**` here");
    }

    #[test]
    fn test_markdown_to_mrkdwn_multibyte() {
        assert_eq!(
            markdown_to_mrkdwn("🤓 - **Nerd** | ⭐ ça va"),
            "🤓 - *Nerd* | ⭐ ça va"
        );
    }

    #[test]
    fn test_render_surface() {
        let surface = Surface::new()
            .title("Register")
            .section("**Username** ⭐\n```\n...\n```")
            .control(Control::new(ControlAction::Conclude, "✅").styled(ControlStyle::Primary))
            .control(Control::new(ControlAction::Confirm, "✅").enabled(false))
            .control(Control::new(ControlAction::Redo, "🔄"));

        let content = render_surface(&surface);
        let blocks = content.blocks.unwrap();

        assert_eq!(blocks.len(), 3);
        assert_eq!(
            blocks[1],
            SlackBlock::Section {
                text: SlackTextObject::mrkdwn("*Username* ⭐\n```\n...\n```"),
            }
        );
        match &blocks[2] {
            SlackBlock::Actions { elements } => {
                assert_eq!(elements.len(), 2);
                let SlackBlockElement::Button {
                    action_id, style, ..
                } = &elements[0];
                assert_eq!(action_id, "conclude");
                assert_eq!(style.as_deref(), Some("primary"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_block_serialization() {
        let block = SlackBlock::Actions {
            elements: vec![SlackBlockElement::Button {
                text: SlackTextObject::plain("◀"),
                action_id: "back".to_string(),
                value: None,
                style: None,
            }],
        };
        let json = serde_json::to_value(&block).unwrap();
        assert_eq!(json["type"], "actions");
        assert_eq!(json["elements"][0]["type"], "button");
        assert_eq!(json["elements"][0]["action_id"], "back");
    }

    #[test]
    fn test_apply_to_clears_blocks() {
        let mut payload = serde_json::json!({"channel": "C1"});
        SlackMessageContent::new()
            .with_text("done")
            .apply_to(&mut payload);
        assert_eq!(payload["text"], "done");
        assert_eq!(payload["blocks"], serde_json::json!([]));
    }
}
