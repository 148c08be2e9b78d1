// Shared fixtures for session and event tests

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use poise::serenity_prelude as serenity;

use crate::api::discord::{Card, ChannelInfo, ChatSurface, SurfaceError};
use crate::features::config_session::SessionDeps;
use crate::features::event_waiter::{EventWaiter, GatewayEvent, MessageEvent, ReactionEvent};
use crate::models::guild::GuildSettings;
use crate::store::{self, MemoryStore, SettingsStore};
use crate::utils::symbols::SymbolPool;

pub const GUILD: serenity::GuildId = serenity::GuildId::new(1);
pub const CHANNEL: serenity::ChannelId = serenity::ChannelId::new(2);
pub const USER: serenity::UserId = serenity::UserId::new(10);
pub const OTHER_USER: serenity::UserId = serenity::UserId::new(11);

static NEXT_INCOMING_ID: AtomicU64 = AtomicU64::new(1_000_000);

fn incoming_id() -> serenity::MessageId {
    serenity::MessageId::new(NEXT_INCOMING_ID.fetch_add(1, Ordering::Relaxed))
}

pub fn reaction_on(
    user: serenity::UserId,
    message_id: serenity::MessageId,
    symbol: &str,
) -> GatewayEvent {
    GatewayEvent::Reaction(ReactionEvent {
        guild_id: Some(GUILD),
        channel_id: CHANNEL,
        message_id,
        user_id: user,
        symbol: symbol.to_string(),
    })
}

pub fn reaction(user: u64, message_id: u64, symbol: &str) -> GatewayEvent {
    reaction_on(
        serenity::UserId::new(user),
        serenity::MessageId::new(message_id),
        symbol,
    )
}

pub fn message_in(
    user: serenity::UserId,
    channel_id: serenity::ChannelId,
    content: &str,
) -> GatewayEvent {
    GatewayEvent::Message(MessageEvent {
        guild_id: Some(GUILD),
        channel_id,
        message_id: incoming_id(),
        author_id: user,
        content: content.to_string(),
    })
}

pub fn message(user: u64, content: &str) -> GatewayEvent {
    message_in(serenity::UserId::new(user), CHANNEL, content)
}

/// Wait until someone is suspended on the waiter, then offer the event.
/// The event is built only then so it can target the current anchor.
pub async fn feed<F>(waiter: &EventWaiter, make: F) -> bool
where
    F: FnOnce() -> GatewayEvent,
{
    while waiter.pending() == 0 {
        tokio::task::yield_now().await;
    }
    waiter.dispatch(&make())
}

#[derive(Debug, Clone)]
pub struct SentMessage {
    pub channel_id: serenity::ChannelId,
    pub card: Option<Card>,
    pub text: Option<String>,
    pub reactions: Vec<String>,
    pub deleted: bool,
}

#[derive(Default)]
struct Recorded {
    next_id: u64,
    messages: BTreeMap<serenity::MessageId, SentMessage>,
    deleted_replies: Vec<serenity::MessageId>,
    removed_reactions: Vec<(serenity::UserId, String)>,
    channels: Vec<ChannelInfo>,
    forbid_clear: bool,
    forbid_reactions: bool,
}

/// In-memory chat surface that records what the bot did
#[derive(Default)]
pub struct RecordingSurface {
    state: Mutex<Recorded>,
}

impl RecordingSurface {
    pub fn with_channels(channels: &[(u64, &str)]) -> Self {
        let surface = Self::default();
        surface.lock().channels = channels
            .iter()
            .map(|(id, name)| ChannelInfo {
                id: serenity::ChannelId::new(*id),
                name: name.to_string(),
            })
            .collect();
        surface
    }

    fn lock(&self) -> MutexGuard<'_, Recorded> {
        self.state.lock().unwrap()
    }

    pub fn forbid_clearing_reactions(&self) {
        self.lock().forbid_clear = true;
    }

    pub fn forbid_adding_reactions(&self) {
        self.lock().forbid_reactions = true;
    }

    pub fn remove_channel(&self, id: u64) {
        self.lock().channels.retain(|c| c.id.get() != id);
    }

    /// Newest card message that still exists
    pub fn anchor(&self) -> serenity::MessageId {
        *self.live_cards().last().expect("no live card")
    }

    pub fn live_cards(&self) -> Vec<serenity::MessageId> {
        self.lock()
            .messages
            .iter()
            .filter(|(_, m)| m.card.is_some() && !m.deleted)
            .map(|(id, _)| *id)
            .collect()
    }

    pub fn sent(&self, id: serenity::MessageId) -> SentMessage {
        self.lock().messages.get(&id).cloned().expect("unknown message")
    }

    pub fn card(&self, id: serenity::MessageId) -> Card {
        self.sent(id).card.expect("not a card")
    }

    pub fn reactions(&self, id: serenity::MessageId) -> Vec<String> {
        self.sent(id).reactions
    }

    pub fn is_deleted(&self, id: serenity::MessageId) -> bool {
        self.sent(id).deleted
    }

    /// Symbols shown in front of each main-menu field
    pub fn menu_symbols(&self, id: serenity::MessageId) -> Vec<String> {
        self.card(id)
            .fields
            .iter()
            .filter_map(|f| f.name.split_whitespace().next().map(str::to_string))
            .collect()
    }

    pub fn menu_symbol(&self, id: serenity::MessageId, slot: usize) -> String {
        self.menu_symbols(id)[slot].clone()
    }

    pub fn removed_reactions(&self) -> Vec<(serenity::UserId, String)> {
        self.lock().removed_reactions.clone()
    }

    /// Messages the bot deleted that it did not send itself
    pub fn deleted_replies(&self) -> Vec<serenity::MessageId> {
        self.lock().deleted_replies.clone()
    }

    /// Everything posted into a channel, oldest first
    pub fn posted_in(&self, channel_id: serenity::ChannelId) -> Vec<SentMessage> {
        self.lock()
            .messages
            .values()
            .filter(|m| m.channel_id == channel_id)
            .cloned()
            .collect()
    }

    fn push(&self, message: SentMessage) -> serenity::MessageId {
        let mut state = self.lock();
        state.next_id += 1;
        let id = serenity::MessageId::new(1000 + state.next_id);
        state.messages.insert(id, message);
        id
    }
}

#[async_trait]
impl ChatSurface for RecordingSurface {
    async fn send_card(
        &self,
        channel_id: serenity::ChannelId,
        card: &Card,
    ) -> Result<serenity::MessageId, SurfaceError> {
        Ok(self.push(SentMessage {
            channel_id,
            card: Some(card.clone()),
            text: None,
            reactions: Vec::new(),
            deleted: false,
        }))
    }

    async fn edit_card(
        &self,
        _channel_id: serenity::ChannelId,
        message_id: serenity::MessageId,
        card: &Card,
    ) -> Result<(), SurfaceError> {
        let mut state = self.lock();
        match state.messages.get_mut(&message_id) {
            Some(m) if !m.deleted => {
                m.card = Some(card.clone());
                Ok(())
            }
            _ => Err(SurfaceError::NotFound),
        }
    }

    async fn send_text(
        &self,
        channel_id: serenity::ChannelId,
        content: &str,
    ) -> Result<serenity::MessageId, SurfaceError> {
        Ok(self.push(SentMessage {
            channel_id,
            card: None,
            text: Some(content.to_string()),
            reactions: Vec::new(),
            deleted: false,
        }))
    }

    async fn delete_message(
        &self,
        _channel_id: serenity::ChannelId,
        message_id: serenity::MessageId,
    ) -> Result<(), SurfaceError> {
        let mut state = self.lock();
        match state.messages.get_mut(&message_id) {
            Some(m) if m.deleted => Err(SurfaceError::NotFound),
            Some(m) => {
                m.deleted = true;
                Ok(())
            }
            None => {
                state.deleted_replies.push(message_id);
                Ok(())
            }
        }
    }

    async fn add_reaction(
        &self,
        _channel_id: serenity::ChannelId,
        message_id: serenity::MessageId,
        symbol: &str,
    ) -> Result<(), SurfaceError> {
        let mut state = self.lock();
        if state.forbid_reactions {
            return Err(SurfaceError::Forbidden);
        }
        match state.messages.get_mut(&message_id) {
            Some(m) if !m.deleted => {
                if !m.reactions.iter().any(|r| r == symbol) {
                    m.reactions.push(symbol.to_string());
                }
                Ok(())
            }
            _ => Err(SurfaceError::NotFound),
        }
    }

    async fn clear_reactions(
        &self,
        _channel_id: serenity::ChannelId,
        message_id: serenity::MessageId,
    ) -> Result<(), SurfaceError> {
        let mut state = self.lock();
        if state.forbid_clear {
            return Err(SurfaceError::Forbidden);
        }
        match state.messages.get_mut(&message_id) {
            Some(m) if !m.deleted => {
                m.reactions.clear();
                Ok(())
            }
            _ => Err(SurfaceError::NotFound),
        }
    }

    async fn remove_reaction(
        &self,
        _channel_id: serenity::ChannelId,
        _message_id: serenity::MessageId,
        user_id: serenity::UserId,
        symbol: &str,
    ) -> Result<(), SurfaceError> {
        self.lock()
            .removed_reactions
            .push((user_id, symbol.to_string()));
        Ok(())
    }

    async fn text_channels(
        &self,
        _guild_id: serenity::GuildId,
    ) -> Result<Vec<ChannelInfo>, SurfaceError> {
        Ok(self.lock().channels.clone())
    }
}

/// Everything a session needs, in memory
pub struct Harness {
    pub store: MemoryStore,
    pub waiter: EventWaiter,
    pub surface: RecordingSurface,
    pub symbols: SymbolPool,
}

impl Harness {
    pub fn new() -> Self {
        Self {
            store: MemoryStore::new(),
            waiter: EventWaiter::new(),
            surface: RecordingSurface::with_channels(&[(100, "general"), (200, "logs")]),
            symbols: SymbolPool::new(["🍎", "🍌", "🍇", "🍉", "🍒", "🍑", "🥝", "🍋"]).unwrap(),
        }
    }

    pub fn deps(&self, timeout: Duration) -> SessionDeps<'_> {
        SessionDeps {
            store: &self.store,
            waiter: &self.waiter,
            surface: &self.surface,
            symbols: &self.symbols,
            timeout,
        }
    }

    /// Wait until the session is suspended, then report its anchor
    pub async fn ready(&self) -> serenity::MessageId {
        while self.waiter.pending() == 0 {
            tokio::task::yield_now().await;
        }
        self.surface.anchor()
    }

    pub async fn stored(&self) -> Option<GuildSettings> {
        self.store.get(GUILD).await.unwrap()
    }

    pub async fn seed<F>(&self, change: F)
    where
        F: FnOnce(&mut GuildSettings) + Send,
    {
        store::update(&self.store, GUILD, change).await.unwrap();
    }
}
