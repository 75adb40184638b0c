//! Starts a wizard whenever a user sends one of the demo commands.

use std::collections::HashSet;
use std::sync::Arc;

use chatforms_core::{
    ChannelId, FieldResults, Platform, PlatformEvent, Reply, Session, SetupOptions, SetupOutcome,
    Surface, UserId,
};
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::wizards;

type SessionKey = (UserId, ChannelId);

/// Listens for commands and runs one wizard per user and channel.
pub struct Dispatcher {
    launcher: Launcher,
    events: broadcast::Receiver<PlatformEvent>,
}

struct Launcher {
    platform: Arc<dyn Platform>,
    options: SetupOptions,
    active: Arc<Mutex<HashSet<SessionKey>>>,
}

impl Dispatcher {
    /// Subscribes right away, so commands sent after this call are seen.
    pub fn new(platform: Arc<dyn Platform>, options: SetupOptions) -> Self {
        let events = platform.subscribe();
        Self {
            launcher: Launcher {
                platform,
                options,
                active: Arc::new(Mutex::new(HashSet::new())),
            },
            events,
        }
    }

    /// Serve commands until `shutdown` fires or the event stream closes.
    ///
    /// Running wizards are cancelled and awaited before this returns.
    pub async fn run(self, shutdown: CancellationToken) {
        let Self {
            launcher,
            mut events,
        } = self;
        let mut sessions = JoinSet::new();
        let live = shutdown.child_token();

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Dispatcher shutting down");
                    break;
                }
                Some(_) = sessions.join_next(), if !sessions.is_empty() => {}
                event = events.recv() => match event {
                    Ok(PlatformEvent::Reply(reply)) => {
                        launcher.start(reply, &live, &mut sessions);
                    }
                    Ok(PlatformEvent::Component(_)) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("Dispatcher lagged, {} events skipped", skipped);
                    }
                    Err(RecvError::Closed) => {
                        info!("Event stream closed");
                        break;
                    }
                },
            }
        }

        live.cancel();
        while sessions.join_next().await.is_some() {}
    }
}

impl Launcher {
    fn start(&self, reply: Reply, live: &CancellationToken, sessions: &mut JoinSet<()>) {
        let command = reply.text.trim().to_lowercase();
        let Some(form) = wizards::build(&command) else {
            return;
        };

        let key = (reply.user.clone(), reply.message.channel.clone());
        if !self.active.lock().insert(key.clone()) {
            debug!("{} already has a wizard in {}", key.0, key.1);
            return;
        }

        let mut form = match form {
            Ok(form) => form,
            Err(e) => {
                error!("Failed to build `{}` wizard: {}", command, e);
                self.active.lock().remove(&key);
                return;
            }
        };

        info!("Starting `{}` for {} in {}", command, key.0, key.1);
        let platform = Arc::clone(&self.platform);
        let options = self.options.clone().with_cancel(live.child_token());
        let active = Arc::clone(&self.active);

        sessions.spawn(async move {
            let session = Session::new(key.0.clone(), key.1.clone());
            match form.setup(Arc::clone(&platform), session, options).await {
                Ok(report) => match report.outcome {
                    SetupOutcome::Concluded(results) => {
                        if let Err(e) = platform.delete_message(&report.message).await {
                            warn!("Failed to delete finished form: {}", e);
                        }
                        let text = farewell(&command, &results);
                        if let Err(e) = platform.send_message(&key.1, &Surface::text(text)).await {
                            warn!("Failed to send farewell: {}", e);
                        }
                    }
                    SetupOutcome::Handled { button } => {
                        info!("`{}` ended by button {}", command, button);
                    }
                    SetupOutcome::Abandoned => info!("`{}` abandoned by {}", command, key.0),
                },
                Err(e) => warn!("`{}` failed: {}", command, e),
            }
            active.lock().remove(&key);
        });
    }
}

/// Closing message for a concluded wizard.
pub fn farewell(command: &str, results: &FieldResults) -> String {
    match serde_json::to_string(results) {
        Ok(json) => info!("`{}` results: {}", command, json),
        Err(e) => warn!("Failed to encode results: {}", e),
    }

    let username = results.text("username").unwrap_or("unknown");
    match command {
        "register" => "You finished your registration!".to_string(),
        "auth" if results.get("email").is_some() => {
            format!("You finished registering your account **{}**!", username)
        }
        _ => format!(
            "You finished the authentication form and logged in as **{}**!",
            username
        ),
    }
}
