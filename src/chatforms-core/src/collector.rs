//! Time-and-predicate-bounded subscriptions to platform input.
//!
//! Every wait the engine opens goes through a [`Collector`]: it owns its own
//! broadcast receiver, applies a predicate, and ends deterministically when
//! its deadline passes, its token is cancelled, it reaches `max` items or the
//! event source shuts down. Dropping a collector detaches it.

use std::time::Duration;

use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::platform::{ComponentEvent, MessageHandle, PlatformEvent, Reply, Session};
use crate::render::ControlAction;

/// Why a collector stopped yielding events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
    /// The deadline elapsed.
    Time,
    /// The cancellation token fired or [`Collector::stop`] was called.
    Cancelled,
    /// `max` events were collected.
    Limit,
    /// The platform dropped its event source.
    Closed,
}

/// Result of waiting on a collector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Collected {
    Event(PlatformEvent),
    Ended(EndReason),
}

type EventFilter = Box<dyn Fn(&PlatformEvent) -> bool + Send + Sync>;

/// A bounded subscription to platform events.
pub struct Collector {
    events: broadcast::Receiver<PlatformEvent>,
    filter: EventFilter,
    deadline: Instant,
    cancel: CancellationToken,
    max: Option<usize>,
    collected: usize,
    ended: Option<EndReason>,
}

impl Collector {
    /// Create a collector accepting every event until `timeout` elapses or
    /// `cancel` fires.
    pub fn new(
        events: broadcast::Receiver<PlatformEvent>,
        timeout: Duration,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            events,
            filter: Box::new(|_| true),
            deadline: Instant::now() + timeout,
            cancel,
            max: None,
            collected: 0,
            ended: None,
        }
    }

    /// Only yield events matching `filter`.
    pub fn filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(&PlatformEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Box::new(filter);
        self
    }

    /// End with [`EndReason::Limit`] after `max` events.
    pub fn max(mut self, max: usize) -> Self {
        self.max = Some(max);
        self
    }

    /// Whether the collector has ended.
    pub fn is_ended(&self) -> bool {
        self.ended.is_some()
    }

    /// Why the collector ended, if it has.
    pub fn end_reason(&self) -> Option<EndReason> {
        self.ended
    }

    /// Retire the collector. Idempotent.
    pub fn stop(&mut self) {
        if self.ended.is_none() {
            self.ended = Some(EndReason::Cancelled);
        }
    }

    /// Wait for the next matching event.
    ///
    /// Cancel-safe: dropping the returned future never loses an event that
    /// was not yet yielded.
    pub async fn next(&mut self) -> Collected {
        if let Some(reason) = self.ended {
            return Collected::Ended(reason);
        }
        if let Some(max) = self.max
            && self.collected >= max
        {
            return self.end(EndReason::Limit);
        }

        loop {
            let received = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return self.end(EndReason::Cancelled),
                _ = tokio::time::sleep_until(self.deadline) => return self.end(EndReason::Time),
                received = self.events.recv() => received,
            };

            match received {
                Ok(event) if (self.filter)(&event) => {
                    self.collected += 1;
                    return Collected::Event(event);
                }
                Ok(_) => continue,
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Collector lagged behind, skipped {} events", skipped);
                    continue;
                }
                Err(RecvError::Closed) => return self.end(EndReason::Closed),
            }
        }
    }

    fn end(&mut self, reason: EndReason) -> Collected {
        debug!("Collector ended: {:?}", reason);
        self.ended = Some(reason);
        Collected::Ended(reason)
    }
}

/// Predicate for text replies by the session's user in the session's channel.
pub fn replies_from(session: &Session) -> impl Fn(&PlatformEvent) -> bool + Send + Sync + 'static {
    let session = session.clone();
    move |event| match event {
        PlatformEvent::Reply(Reply { message, user, .. }) => {
            message.channel == session.channel && session.is_target(user)
        }
        PlatformEvent::Component(_) => false,
    }
}

/// Predicate for control activations by the session's user on any message,
/// restricted to actions accepted by `accepts`.
pub fn controls_from<A>(
    session: &Session,
    accepts: A,
) -> impl Fn(&PlatformEvent) -> bool + Send + Sync + 'static
where
    A: Fn(&ControlAction) -> bool + Send + Sync + 'static,
{
    let user = session.user.clone();
    move |event| match event {
        PlatformEvent::Component(ComponentEvent {
            user: actor,
            action_id,
            ..
        }) => actor == &user && ControlAction::parse(action_id).is_some_and(|a| accepts(&a)),
        PlatformEvent::Reply(_) => false,
    }
}

/// Like [`controls_from`], limited to activations on `message`.
pub fn controls_on<A>(
    session: &Session,
    message: &MessageHandle,
    accepts: A,
) -> impl Fn(&PlatformEvent) -> bool + Send + Sync + 'static
where
    A: Fn(&ControlAction) -> bool + Send + Sync + 'static,
{
    let message = message.clone();
    let from_user = controls_from(session, accepts);
    move |event| match event {
        PlatformEvent::Component(ComponentEvent { message: target, .. }) => {
            target == &message && from_user(event)
        }
        PlatformEvent::Reply(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::UserId;

    fn reply(user: &str, channel: &str, text: &str) -> PlatformEvent {
        PlatformEvent::Reply(Reply {
            message: MessageHandle::new(channel, "R1"),
            user: UserId::new(user),
            text: text.to_string(),
        })
    }

    fn click(user: &str, message: &MessageHandle, action: ControlAction) -> PlatformEvent {
        PlatformEvent::Component(ComponentEvent {
            message: message.clone(),
            user: UserId::new(user),
            action_id: action.id(),
            values: Vec::new(),
        })
    }

    #[tokio::test]
    async fn test_collects_matching_events() {
        let (tx, rx) = broadcast::channel(16);
        let session = Session::new("U1", "C1");
        let mut collector = Collector::new(rx, Duration::from_secs(5), CancellationToken::new())
            .filter(replies_from(&session));

        tx.send(reply("U2", "C1", "not me")).unwrap();
        tx.send(reply("U1", "C2", "wrong channel")).unwrap();
        tx.send(reply("U1", "C1", "hello")).unwrap();

        match collector.next().await {
            Collected::Event(PlatformEvent::Reply(reply)) => assert_eq!(reply.text, "hello"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_times_out() {
        let (_tx, rx) = broadcast::channel::<PlatformEvent>(16);
        let mut collector = Collector::new(rx, Duration::from_millis(100), CancellationToken::new());

        assert_eq!(collector.next().await, Collected::Ended(EndReason::Time));
        assert!(collector.is_ended());
        // Ended collectors stay ended
        assert_eq!(collector.next().await, Collected::Ended(EndReason::Time));
    }

    #[tokio::test]
    async fn test_cancelled() {
        let (_tx, rx) = broadcast::channel::<PlatformEvent>(16);
        let cancel = CancellationToken::new();
        let mut collector = Collector::new(rx, Duration::from_secs(60), cancel.clone());

        cancel.cancel();
        assert_eq!(collector.next().await, Collected::Ended(EndReason::Cancelled));
    }

    #[tokio::test]
    async fn test_limit() {
        let (tx, rx) = broadcast::channel(16);
        let message = MessageHandle::new("C1", "M1");
        let session = Session::new("U1", "C1");
        let mut collector = Collector::new(rx, Duration::from_secs(5), CancellationToken::new())
            .filter(controls_on(&session, &message, |a| *a == ControlAction::Confirm))
            .max(1);

        tx.send(click("U1", &message, ControlAction::Redo)).unwrap();
        tx.send(click("U1", &message, ControlAction::Confirm)).unwrap();
        tx.send(click("U1", &message, ControlAction::Confirm)).unwrap();

        assert!(matches!(collector.next().await, Collected::Event(_)));
        assert_eq!(collector.next().await, Collected::Ended(EndReason::Limit));
    }

    #[tokio::test]
    async fn test_mixed_stream_keeps_arrival_order() {
        let (tx, rx) = broadcast::channel(16);
        let session = Session::new("U1", "C1");
        let message = MessageHandle::new("C1", "M1");
        let is_reply = replies_from(&session);
        let is_confirm = controls_from(&session, |a| *a == ControlAction::Confirm);
        let mut collector = Collector::new(rx, Duration::from_secs(5), CancellationToken::new())
            .filter(move |e| is_reply(e) || is_confirm(e));

        tx.send(click("U1", &message, ControlAction::Confirm)).unwrap();
        tx.send(click("U2", &message, ControlAction::Confirm)).unwrap();
        tx.send(reply("U1", "C1", "after")).unwrap();

        assert!(matches!(
            collector.next().await,
            Collected::Event(PlatformEvent::Component(_))
        ));
        assert!(matches!(
            collector.next().await,
            Collected::Event(PlatformEvent::Reply(_))
        ));
    }

    #[tokio::test]
    async fn test_closed_source() {
        let (tx, rx) = broadcast::channel::<PlatformEvent>(16);
        let mut collector = Collector::new(rx, Duration::from_secs(5), CancellationToken::new());
        drop(tx);
        assert_eq!(collector.next().await, Collected::Ended(EndReason::Closed));
    }

    #[test]
    fn test_stop_is_idempotent() {
        tokio_test::block_on(async {
            let (_tx, rx) = broadcast::channel::<PlatformEvent>(1);
            let mut collector =
                Collector::new(rx, Duration::from_secs(5), CancellationToken::new());
            collector.stop();
            collector.stop();
            assert_eq!(collector.end_reason(), Some(EndReason::Cancelled));
        });
    }
}
