//! The demo wizards.
//!
//! - `register`: account details plus gender and preference lists
//! - `login`: username and password, answers removed from the channel
//! - `auth`: Login and Register buttons, each opening a child page with back

use std::sync::Arc;

use chatforms_core::{
    Amount, AnswerRemoval, Button, Component, ContentField, Form, FormResult, ListField,
    ListOption, Reply,
};
use parking_lot::Mutex;

/// Names of the commands users can send.
pub const COMMANDS: [&str; 3] = ["register", "login", "auth"];

fn length_filter(
    min: usize,
    max: usize,
) -> impl Fn(&Reply) -> Result<(), String> + Send + Sync + 'static {
    move |reply: &Reply| {
        let len = reply.text.chars().count();
        if len < min {
            Err(format!("Must be at least {} characters", min))
        } else if len > max {
            Err(format!("Must be at most {} characters", max))
        } else {
            Ok(())
        }
    }
}

fn mask(reply: &Reply) -> String {
    "*".repeat(reply.text.chars().count())
}

fn raw(reply: &Reply) -> String {
    reply.text.clone()
}

/// Password field and a confirmation field that must repeat it.
fn password_pair() -> (ContentField, ContentField) {
    let entered: Arc<Mutex<Option<String>>> = Arc::new(Mutex::new(None));

    let store = Arc::clone(&entered);
    let password = ContentField::new("password", "Password", "What is your password?")
        .filter(length_filter(6, 64))
        .content_resolver(mask)
        .value_resolver(move |reply| {
            *store.lock() = Some(reply.text.clone());
            reply.text.clone()
        });

    let confirm = ContentField::new(
        "confirmPassword",
        "Confirm Password",
        "Enter your password again",
    )
    .filter(move |reply| {
        if entered.lock().as_deref() == Some(reply.text.as_str()) {
            Ok(())
        } else {
            Err("Passwords must match".to_string())
        }
    })
    .content_resolver(mask)
    .value_resolver(raw);

    (password, confirm)
}

fn gender_list() -> ListField {
    ListField::new("gender", "Gender", "What is your gender? (pick 1)", Amount::Exactly(1))
        .required(false)
        .options([
            ListOption::new("🤓", "Nerd")
                .key("nerd")
                .description("glasses wearers"),
            ListOption::new("🐒", "Monkey")
                .key("monkey")
                .description("banana fans"),
        ])
}

fn preferences_list() -> ListField {
    ListField::new(
        "preferences",
        "Preferences",
        "What are your preferences?",
        Amount::AtLeast(1),
    )
    .options([
        ListOption::new("🤓", "nerd"),
        ListOption::new("🐒", "Non-albino monkeys").key("monkey"),
    ])
}

fn account_fields() -> Vec<Component> {
    let username = ContentField::new("username", "Username", "What is your username?")
        .filter(length_filter(6, 64));
    let email = ContentField::new("email", "Email", "What is your email? (not checked)")
        .filter(length_filter(6, 64));
    let (password, confirm) = password_pair();

    vec![
        username.into(),
        email.into(),
        password.into(),
        confirm.into(),
    ]
}

/// Full registration: account details, then the two lists.
pub fn register() -> FormResult<Form> {
    let mut components = account_fields();
    components.push(gender_list().into());
    components.push(preferences_list().into());
    Ok(Form::new(components)?.with_title("Register"))
}

pub fn login() -> FormResult<Form> {
    let username = ContentField::new("username", "Username", "Enter your username")
        .filter(length_filter(3, 64))
        .remove_answers(AnswerRemoval::Incorrect);
    let password = ContentField::new("password", "Password", "Enter your password")
        .filter(length_filter(3, 64))
        .content_resolver(mask)
        .value_resolver(raw)
        .remove_answers(AnswerRemoval::All);

    Ok(Form::new(vec![username.into(), password.into()])?.with_title("Login"))
}

/// Account registration page opened from `auth`.
fn register_account() -> FormResult<Form> {
    Ok(Form::new(account_fields())?.with_title("Register"))
}

/// A menu whose buttons open the login or registration page.
pub fn auth() -> FormResult<Form> {
    let login_button = Button::opening("🎨", "Login", "Log into your account", |_ctx| login());
    let register_button = Button::opening("😀", "Register", "Register your account", |_ctx| {
        register_account()
    });

    Ok(Form::new(vec![login_button.into(), register_button.into()])?
        .with_title("Auth")
        .with_back(true))
}

/// Build the wizard for `command`, if it names one.
pub fn build(command: &str) -> Option<FormResult<Form>> {
    match command.trim().to_lowercase().as_str() {
        "register" => Some(register()),
        "login" => Some(login()),
        "auth" => Some(auth()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatforms_core::{MessageHandle, UserId};
    use pretty_assertions::assert_eq;

    fn reply(text: &str) -> Reply {
        Reply {
            message: MessageHandle::new("D1", "1.1"),
            user: UserId::new("U1"),
            text: text.to_string(),
        }
    }

    #[test]
    fn test_every_command_builds() {
        for command in COMMANDS {
            let form = build(command).unwrap().unwrap();
            assert!(!form.components().is_empty(), "{}", command);
        }
        assert!(build(" AUTH ").is_some());
        assert!(build("hello").is_none());
    }

    #[test]
    fn test_register_layout() {
        let form = register().unwrap();
        assert_eq!(form.content_fields().count(), 4);
        assert_eq!(form.list_fields().count(), 2);
        assert_eq!(form.title(), Some("Register"));
    }

    #[test]
    fn test_auth_opens_children_with_back() {
        let form = auth().unwrap();
        assert!(form.can_back());
        let names: Vec<&str> = form.buttons().map(|b| b.name.as_str()).collect();
        assert_eq!(names, vec!["Login", "Register"]);
    }

    #[test]
    fn test_length_filter() {
        let filter = length_filter(6, 64);
        assert!(filter(&reply("short")).is_err());
        assert!(filter(&reply("longenough")).is_ok());
        assert_eq!(
            filter(&reply(&"x".repeat(65))),
            Err("Must be at most 64 characters".to_string())
        );
    }

    #[test]
    fn test_mask_counts_characters() {
        assert_eq!(mask(&reply("pässwörd")), "********");
    }
}
