//! Drives a session across pages.
//!
//! The navigator owns the page stack: the root form borrowed from the caller
//! plus every child form a button opened. Each iteration of [`Navigator::run`]
//! visits the top page once and acts on how the visit ended. Redo happens
//! inside the visit; back pops the stack and visits the parent again. Nothing
//! recurses, so many redo or back rounds never accumulate listeners.

use std::pin::pin;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::button::ButtonContext;
use crate::collector::{Collected, Collector, controls_on};
use crate::config::SetupOptions;
use crate::error::{FormError, FormResult};
use crate::form::{Form, PageContext, PageStep, SetupOutcome, SetupReport};
use crate::platform::{MessageHandle, Platform, Session};
use crate::render::ControlAction;

/// A page opened by a button of the page below it.
struct ChildPage {
    form: Form,
    /// Index of the parent's button that opened this page.
    via: usize,
    cancel: CancellationToken,
}

/// Runs a form session for one user in one channel.
pub struct Navigator {
    platform: Arc<dyn Platform>,
    session: Session,
    options: SetupOptions,
}

impl Navigator {
    pub fn new(platform: Arc<dyn Platform>, session: Session, options: SetupOptions) -> Self {
        Self {
            platform,
            session,
            options,
        }
    }

    fn page(&self, cancel: CancellationToken, back: bool) -> PageContext<'_> {
        PageContext {
            platform: &self.platform,
            session: &self.session,
            options: &self.options,
            cancel,
            back: AtomicBool::new(back),
            shown: Mutex::new(None),
        }
    }

    /// Run the session rooted at `root` until it concludes, is handled by a
    /// button or is abandoned.
    pub async fn run(&self, root: &mut Form) -> FormResult<SetupReport> {
        let root_cancel = self.options.cancel.child_token();
        let mut children: Vec<ChildPage> = Vec::new();
        let mut message: Option<MessageHandle> = None;

        loop {
            let depth = children.len();
            let step = match depth {
                0 => {
                    root.run_page(&self.page(root_cancel.clone(), false), &mut message)
                        .await?
                }
                _ => {
                    let back = match depth {
                        1 => root.can_back(),
                        _ => children[depth - 2].form.can_back(),
                    };
                    let child = &mut children[depth - 1];
                    self.run_child(&mut child.form, child.cancel.clone(), back, &mut message)
                        .await?
                }
            };

            let current = children.last_mut().map_or(&mut *root, |page| &mut page.form);
            match step {
                PageStep::Concluded => {
                    return Ok(SetupReport {
                        message: shown(&message)?,
                        outcome: SetupOutcome::Concluded(current.field_results()),
                    });
                }
                PageStep::Abandoned | PageStep::Cancelled => {
                    info!("Form session abandoned at depth {}", depth);
                    return Ok(SetupReport {
                        message: shown(&message)?,
                        outcome: SetupOutcome::Abandoned,
                    });
                }
                PageStep::Back => {
                    let Some(left) = children.pop() else {
                        continue;
                    };
                    info!("Back to depth {}", children.len());
                    let parent = children.last_mut().map_or(&mut *root, |page| &mut page.form);
                    if let Some(button) = parent.button_mut(left.via) {
                        button.deactivate();
                    }
                    parent.activate_buttons();
                }
                PageStep::Triggered(index) => {
                    let handle = shown(&message)?;
                    let parent: &Form = current;
                    let Some(button) = parent.button(index) else {
                        debug!("Ignoring trigger of unknown button {}", index);
                        continue;
                    };
                    let ctx = ButtonContext {
                        button,
                        parent,
                        message: &handle,
                        session: &self.session,
                        platform: &self.platform,
                    };

                    match button.action().interact(ctx).await? {
                        Some(form) => {
                            info!("Opening page {} via button {}", depth + 1, index);
                            children.push(ChildPage {
                                form,
                                via: index,
                                cancel: self.options.cancel.child_token(),
                            });
                        }
                        None => {
                            return Ok(SetupReport {
                                message: handle,
                                outcome: SetupOutcome::Handled { button: index },
                            });
                        }
                    }
                }
            }
        }
    }

    /// Visit a child page while its parent's back control is armed.
    ///
    /// On back the child's token is cancelled and the visit is awaited, so
    /// every collector of the child has retired before this returns. A child
    /// abandoned by timeout keeps back armed until the back window ends.
    async fn run_child(
        &self,
        form: &mut Form,
        cancel: CancellationToken,
        back: bool,
        message: &mut Option<MessageHandle>,
    ) -> FormResult<PageStep> {
        let Some(handle) = message.clone() else {
            return Err(FormError::MessageUnavailable(
                "child page opened before any message was shown".to_string(),
            ));
        };

        let mut back_requests = back.then(|| {
            Collector::new(
                self.platform.subscribe(),
                self.options.back_timeout(),
                self.options.cancel.clone(),
            )
            .filter(controls_on(&self.session, &handle, |a| *a == ControlAction::Back))
            .max(1)
        });

        let page = self.page(cancel.clone(), back);
        let mut visit = pin!(form.run_page(&page, message));

        loop {
            let Some(requests) = back_requests.as_mut() else {
                return visit.await;
            };

            tokio::select! {
                biased;
                step = &mut visit => {
                    let step = step?;
                    if step != PageStep::Abandoned {
                        return Ok(step);
                    }
                    debug!("Child page abandoned, back stays armed");
                    return match requests.next().await {
                        Collected::Event(_) => Ok(PageStep::Back),
                        Collected::Ended(reason) => {
                            debug!("Back control retired: {:?}", reason);
                            self.retire_back(&page, &handle).await;
                            Ok(PageStep::Abandoned)
                        }
                    };
                }
                collected = requests.next() => match collected {
                    Collected::Event(_) => {
                        debug!("Back pressed, stopping child page");
                        cancel.cancel();
                        visit.await?;
                        return Ok(PageStep::Back);
                    }
                    Collected::Ended(reason) => {
                        debug!("Back control retired: {:?}", reason);
                        self.retire_back(&page, &handle).await;
                        back_requests = None;
                    }
                },
            }
        }
    }

    /// Drop the back control from the page and from the message showing it.
    async fn retire_back(&self, page: &PageContext<'_>, handle: &MessageHandle) {
        let Some(surface) = page.retire_back() else {
            return;
        };
        if let Err(e) = self.platform.edit_message(handle, &surface).await {
            warn!("Failed to remove back control: {}", e);
        }
    }
}

fn shown(message: &Option<MessageHandle>) -> FormResult<MessageHandle> {
    message
        .clone()
        .ok_or_else(|| FormError::MessageUnavailable("form was never shown".to_string()))
}
