//! Triggerable actions that open the next page of a wizard.

use std::fmt;
use std::sync::Arc;

use crate::error::FormResult;
use crate::form::Form;
use crate::platform::{MessageHandle, Platform, Session};

/// What a button sees when it is triggered.
pub struct ButtonContext<'a> {
    /// The triggered button, including its `extra` payload.
    pub button: &'a Button,
    /// The form rendering the button.
    pub parent: &'a Form,
    /// The message shared by every page of the session.
    pub message: &'a MessageHandle,
    pub session: &'a Session,
    pub platform: &'a Arc<dyn Platform>,
}

/// Behavior attached to a [`Button`].
#[async_trait::async_trait]
pub trait ButtonAction: Send + Sync {
    /// Handle a trigger. Returning a form pushes it as a child page on the
    /// same message; `None` means the action was handled inline and the
    /// session ends.
    async fn interact(&self, ctx: ButtonContext<'_>) -> FormResult<Option<Form>>;
}

/// A [`ButtonAction`] that opens the form built by a factory.
pub struct OpenForm<F> {
    factory: F,
}

impl<F> OpenForm<F>
where
    F: Fn(&ButtonContext<'_>) -> FormResult<Form> + Send + Sync,
{
    pub fn new(factory: F) -> Self {
        Self { factory }
    }
}

#[async_trait::async_trait]
impl<F> ButtonAction for OpenForm<F>
where
    F: Fn(&ButtonContext<'_>) -> FormResult<Form> + Send + Sync,
{
    async fn interact(&self, ctx: ButtonContext<'_>) -> FormResult<Option<Form>> {
        (self.factory)(&ctx).map(Some)
    }
}

/// A form component the user triggers instead of filling in.
#[derive(Clone)]
pub struct Button {
    pub icon: String,
    pub name: String,
    pub description: String,
    /// Opaque payload for the action's own use.
    pub extra: Option<serde_json::Value>,
    activated: bool,
    action: Arc<dyn ButtonAction>,
}

impl fmt::Debug for Button {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Button")
            .field("icon", &self.icon)
            .field("name", &self.name)
            .field("activated", &self.activated)
            .field("extra", &self.extra)
            .finish_non_exhaustive()
    }
}

impl Button {
    pub fn new(
        icon: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
        action: impl ButtonAction + 'static,
    ) -> Self {
        Self {
            icon: icon.into(),
            name: name.into(),
            description: description.into(),
            extra: None,
            activated: true,
            action: Arc::new(action),
        }
    }

    /// Button opening the form returned by `factory`.
    pub fn opening<F>(
        icon: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
        factory: F,
    ) -> Self
    where
        F: Fn(&ButtonContext<'_>) -> FormResult<Form> + Send + Sync + 'static,
    {
        Self::new(icon, name, description, OpenForm::new(factory))
    }

    pub fn with_extra(mut self, extra: serde_json::Value) -> Self {
        self.extra = Some(extra);
        self
    }

    pub fn is_activated(&self) -> bool {
        self.activated
    }

    pub fn activate(&mut self) {
        self.activated = true;
    }

    pub fn deactivate(&mut self) {
        self.activated = false;
    }

    pub(crate) fn action(&self) -> Arc<dyn ButtonAction> {
        Arc::clone(&self.action)
    }
}
