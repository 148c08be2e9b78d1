// Event waiter - lets a command suspend until a matching gateway event arrives
//
// The gateway handler offers every reaction and message to `dispatch`; the
// earliest registered waiter whose predicate matches consumes it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use poise::serenity_prelude as serenity;
use tokio::sync::oneshot;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    ReactionAdd,
    MessageCreate,
}

/// A reaction added to a message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReactionEvent {
    pub guild_id: Option<serenity::GuildId>,
    pub channel_id: serenity::ChannelId,
    pub message_id: serenity::MessageId,
    pub user_id: serenity::UserId,
    pub symbol: String,
}

impl ReactionEvent {
    /// Custom emojis render as `<:name:id>`, unicode ones as themselves
    pub fn from_reaction(reaction: &serenity::Reaction) -> Option<Self> {
        Some(Self {
            guild_id: reaction.guild_id,
            channel_id: reaction.channel_id,
            message_id: reaction.message_id,
            user_id: reaction.user_id?,
            symbol: reaction.emoji.to_string(),
        })
    }
}

/// A newly created message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageEvent {
    pub guild_id: Option<serenity::GuildId>,
    pub channel_id: serenity::ChannelId,
    pub message_id: serenity::MessageId,
    pub author_id: serenity::UserId,
    pub content: String,
}

impl MessageEvent {
    pub fn from_message(msg: &serenity::Message) -> Self {
        Self {
            guild_id: msg.guild_id,
            channel_id: msg.channel_id,
            message_id: msg.id,
            author_id: msg.author.id,
            content: msg.content.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayEvent {
    Reaction(ReactionEvent),
    Message(MessageEvent),
}

impl GatewayEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            GatewayEvent::Reaction(_) => EventKind::ReactionAdd,
            GatewayEvent::Message(_) => EventKind::MessageCreate,
        }
    }
}

/// Result of a wait; timing out is an ordinary outcome
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitOutcome<T> {
    Matched(T),
    TimedOut,
}

type Predicate = Box<dyn Fn(&GatewayEvent) -> bool + Send + Sync>;

struct Pending {
    id: u64,
    kind: EventKind,
    predicate: Predicate,
    tx: oneshot::Sender<GatewayEvent>,
}

/// Shared registry of suspended waits
#[derive(Default)]
pub struct EventWaiter {
    pending: Mutex<Vec<Pending>>,
    next_id: AtomicU64,
}

/// Deregisters the wait when dropped (timeout or cancelled task)
struct WaitGuard<'a> {
    waiter: &'a EventWaiter,
    id: u64,
}

impl Drop for WaitGuard<'_> {
    fn drop(&mut self) {
        self.waiter.lock().retain(|p| p.id != self.id);
    }
}

impl EventWaiter {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Pending>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of waits currently suspended
    pub fn pending(&self) -> usize {
        self.lock().len()
    }

    /// Offer an event to the waiting sessions. Returns true if one consumed it.
    pub fn dispatch(&self, event: &GatewayEvent) -> bool {
        let kind = event.kind();
        let mut pending = self.lock();

        loop {
            let Some(index) = pending
                .iter()
                .position(|p| p.kind == kind && (p.predicate)(event))
            else {
                return false;
            };

            let matched = pending.remove(index);
            // A closed receiver means the wait was abandoned; offer to the next one
            if matched.tx.send(event.clone()).is_ok() {
                return true;
            }
        }
    }

    /// Wait for the next event of `kind` satisfying `predicate`
    pub async fn wait_for<P>(
        &self,
        kind: EventKind,
        predicate: P,
        timeout: Duration,
    ) -> WaitOutcome<GatewayEvent>
    where
        P: Fn(&GatewayEvent) -> bool + Send + Sync + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.lock().push(Pending {
            id,
            kind,
            predicate: Box::new(predicate),
            tx,
        });
        let _guard = WaitGuard { waiter: self, id };

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(event)) => WaitOutcome::Matched(event),
            Ok(Err(_)) | Err(_) => WaitOutcome::TimedOut,
        }
    }

    pub async fn wait_for_reaction<P>(&self, predicate: P, timeout: Duration) -> WaitOutcome<ReactionEvent>
    where
        P: Fn(&ReactionEvent) -> bool + Send + Sync + 'static,
    {
        let outcome = self
            .wait_for(
                EventKind::ReactionAdd,
                move |event| matches!(event, GatewayEvent::Reaction(r) if predicate(r)),
                timeout,
            )
            .await;
        match outcome {
            WaitOutcome::Matched(GatewayEvent::Reaction(r)) => WaitOutcome::Matched(r),
            _ => WaitOutcome::TimedOut,
        }
    }

    pub async fn wait_for_message<P>(&self, predicate: P, timeout: Duration) -> WaitOutcome<MessageEvent>
    where
        P: Fn(&MessageEvent) -> bool + Send + Sync + 'static,
    {
        let outcome = self
            .wait_for(
                EventKind::MessageCreate,
                move |event| matches!(event, GatewayEvent::Message(m) if predicate(m)),
                timeout,
            )
            .await;
        match outcome {
            WaitOutcome::Matched(GatewayEvent::Message(m)) => WaitOutcome::Matched(m),
            _ => WaitOutcome::TimedOut,
        }
    }

    /// Like `wait_for_message` but bounded by an absolute deadline
    pub async fn wait_for_message_until<P>(
        &self,
        predicate: P,
        deadline: Instant,
    ) -> WaitOutcome<MessageEvent>
    where
        P: Fn(&MessageEvent) -> bool + Send + Sync + 'static,
    {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return WaitOutcome::TimedOut;
        }
        self.wait_for_message(predicate, remaining).await
    }
}
