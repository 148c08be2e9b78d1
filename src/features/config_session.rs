// Configuration session - the reaction driven settings menu
//
// One session owns one anchor message. It renders the main menu, waits for
// the invoking user's reaction, hands off to a sub-editor or toggles a flag,
// and loops until the user cancels or a wait times out.

use std::time::Duration;

use poise::serenity_prelude as serenity;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::api::discord::{Card, ChatSurface, SurfaceError};
use crate::features::editors::{self, EditOutcome};
use crate::features::event_waiter::{EventWaiter, MessageEvent, WaitOutcome};
use crate::features::menu::{choice_for, main_menu_markers, render_main_menu, MenuAction, MenuChoice};
use crate::models::guild::GuildSettings;
use crate::store::{fetch_or_init, prune_missing_channels, SettingsStore, StoreError};
use crate::utils::config::{CANCEL_SYMBOL, CONFIRM_SYMBOL, UNSET_SYMBOL};
use crate::utils::symbols::{MenuSymbols, SymbolPool};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Surface(#[from] SurfaceError),
}

/// What the session needs from the application, and nothing more
#[derive(Clone, Copy)]
pub struct SessionDeps<'a> {
    pub store: &'a dyn SettingsStore,
    pub waiter: &'a EventWaiter,
    pub surface: &'a dyn ChatSurface,
    pub symbols: &'a SymbolPool,
    /// Applied to every wait of the session
    pub timeout: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    Cancelled,
    TimedOut,
}

/// Choice offered by a sub-editor menu
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubChoice {
    Confirm,
    Unset,
    Cancel,
}

impl SubChoice {
    fn from_symbol(symbol: &str) -> Option<Self> {
        match symbol {
            CONFIRM_SYMBOL => Some(SubChoice::Confirm),
            UNSET_SYMBOL => Some(SubChoice::Unset),
            CANCEL_SYMBOL => Some(SubChoice::Cancel),
            _ => None,
        }
    }
}

pub struct ConfigSession<'a> {
    deps: SessionDeps<'a>,
    guild_id: serenity::GuildId,
    channel_id: serenity::ChannelId,
    user_id: serenity::UserId,
    anchor: serenity::MessageId,
    symbols: MenuSymbols,
}

impl<'a> ConfigSession<'a> {
    /// Send the first rendering of the main menu
    pub async fn open(
        deps: SessionDeps<'a>,
        guild_id: serenity::GuildId,
        channel_id: serenity::ChannelId,
        user_id: serenity::UserId,
    ) -> Result<ConfigSession<'a>, SessionError> {
        let symbols = deps.symbols.shuffle(&mut rand::rng());
        let settings = load_snapshot(deps, guild_id).await?;
        let anchor = deps
            .surface
            .send_card(channel_id, &render_main_menu(&settings, &symbols))
            .await?;

        info!(
            "Opened configuration session for user {} in guild {}",
            user_id, guild_id
        );

        Ok(Self {
            deps,
            guild_id,
            channel_id,
            user_id,
            anchor,
            symbols,
        })
    }

    pub(crate) fn deps(&self) -> SessionDeps<'a> {
        self.deps
    }

    pub(crate) fn guild_id(&self) -> serenity::GuildId {
        self.guild_id
    }

    /// Run until cancelled or timed out; the anchor is removed either way
    pub async fn run(mut self) -> Result<CloseReason, SessionError> {
        let result = self.drive().await;
        self.close().await;

        match &result {
            Ok(reason) => info!(
                "Closed configuration session for guild {} ({:?})",
                self.guild_id, reason
            ),
            Err(e) => warn!(
                "Configuration session for guild {} failed: {}",
                self.guild_id, e
            ),
        }
        result
    }

    async fn drive(&mut self) -> Result<CloseReason, SessionError> {
        let mut needs_markers = true;

        loop {
            if needs_markers {
                let markers = main_menu_markers(&self.symbols);
                self.attach_markers(&markers).await?;
            }

            let (choice, symbol) = match self.wait_for_main_choice().await {
                WaitOutcome::Matched(found) => found,
                WaitOutcome::TimedOut => return Ok(CloseReason::TimedOut),
            };

            let action = match choice {
                MenuChoice::Cancel => return Ok(CloseReason::Cancelled),
                MenuChoice::Action(action) => action,
            };
            debug!("Guild {}: selected {:?}", self.guild_id, action);

            let outcome = match action {
                MenuAction::EditChannel(field) => editors::edit_channel(self, field).await?,
                MenuAction::EditMessage(field) => editors::edit_message(self, field).await?,
                MenuAction::Toggle(field) => {
                    let outcome = editors::toggle_flag(self, field).await?;
                    // Let the user pick the same reaction again
                    if let Err(e) = self
                        .deps
                        .surface
                        .remove_reaction(self.channel_id, self.anchor, self.user_id, &symbol)
                        .await
                    {
                        debug!("Could not remove toggle reaction: {}", e);
                    }
                    outcome
                }
            };

            if outcome == EditOutcome::TimedOut {
                return Ok(CloseReason::TimedOut);
            }

            let settings = self.snapshot().await?;
            if outcome == EditOutcome::Toggled {
                let card = render_main_menu(&settings, &self.symbols);
                needs_markers = self.redraw(&card).await?;
            } else {
                self.symbols = self.deps.symbols.shuffle(&mut rand::rng());
                let card = render_main_menu(&settings, &self.symbols);
                self.present(&card).await?;
                needs_markers = true;
            }
        }
    }

    /// Best-effort removal of the anchor
    async fn close(&self) {
        if let Err(e) = self
            .deps
            .surface
            .delete_message(self.channel_id, self.anchor)
            .await
        {
            debug!("Could not delete configuration menu: {}", e);
        }
    }

    /// Current settings with stale channels already cleared
    pub(crate) async fn snapshot(&self) -> Result<GuildSettings, SessionError> {
        load_snapshot(self.deps, self.guild_id).await
    }

    /// Replace the anchor content and drop its reactions.
    /// Falls back to deleting and resending when the bot may not do that.
    pub(crate) async fn present(&mut self, card: &Card) -> Result<(), SessionError> {
        let surface = self.deps.surface;
        let result = match surface.clear_reactions(self.channel_id, self.anchor).await {
            Ok(()) => surface.edit_card(self.channel_id, self.anchor, card).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(()) => Ok(()),
            Err(SurfaceError::Forbidden) | Err(SurfaceError::NotFound) => {
                warn!(
                    "Cannot update configuration menu in channel {}, sending a new one",
                    self.channel_id
                );
                self.resend(card).await
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Edit the anchor without touching reactions.
    /// Returns true when the anchor had to be replaced and needs its markers again.
    async fn redraw(&mut self, card: &Card) -> Result<bool, SessionError> {
        match self
            .deps
            .surface
            .edit_card(self.channel_id, self.anchor, card)
            .await
        {
            Ok(()) => Ok(false),
            Err(SurfaceError::Forbidden) | Err(SurfaceError::NotFound) => {
                self.resend(card).await?;
                Ok(true)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn resend(&mut self, card: &Card) -> Result<(), SessionError> {
        let surface = self.deps.surface;
        if let Err(e) = surface.delete_message(self.channel_id, self.anchor).await {
            debug!("Could not delete old configuration menu: {}", e);
        }
        self.anchor = surface.send_card(self.channel_id, card).await?;
        Ok(())
    }

    pub(crate) async fn attach_markers<S: AsRef<str>>(
        &self,
        markers: &[S],
    ) -> Result<(), SessionError> {
        for marker in markers {
            match self
                .deps
                .surface
                .add_reaction(self.channel_id, self.anchor, marker.as_ref())
                .await
            {
                Ok(()) => {}
                Err(SurfaceError::Forbidden) => {
                    warn!(
                        "Missing permission to add reactions in channel {}",
                        self.channel_id
                    );
                    return Ok(());
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    async fn wait_for_main_choice(&self) -> WaitOutcome<(MenuChoice, String)> {
        let user_id = self.user_id;
        let anchor = self.anchor;
        let symbols = self.symbols.clone();

        let outcome = self
            .deps
            .waiter
            .wait_for_reaction(
                move |r| {
                    r.user_id == user_id
                        && r.message_id == anchor
                        && choice_for(&symbols, &r.symbol).is_some()
                },
                self.deps.timeout,
            )
            .await;

        match outcome {
            WaitOutcome::Matched(r) => match choice_for(&self.symbols, &r.symbol) {
                Some(choice) => WaitOutcome::Matched((choice, r.symbol)),
                None => WaitOutcome::TimedOut,
            },
            WaitOutcome::TimedOut => WaitOutcome::TimedOut,
        }
    }

    pub(crate) async fn wait_for_sub_choice(&self) -> WaitOutcome<SubChoice> {
        let user_id = self.user_id;
        let anchor = self.anchor;

        let outcome = self
            .deps
            .waiter
            .wait_for_reaction(
                move |r| {
                    r.user_id == user_id
                        && r.message_id == anchor
                        && SubChoice::from_symbol(&r.symbol).is_some()
                },
                self.deps.timeout,
            )
            .await;

        match outcome {
            WaitOutcome::Matched(r) => match SubChoice::from_symbol(&r.symbol) {
                Some(choice) => WaitOutcome::Matched(choice),
                None => WaitOutcome::TimedOut,
            },
            WaitOutcome::TimedOut => WaitOutcome::TimedOut,
        }
    }

    /// Next text message from the invoking user in the session channel
    pub(crate) async fn wait_for_reply(&self, deadline: Instant) -> WaitOutcome<MessageEvent> {
        let user_id = self.user_id;
        let channel_id = self.channel_id;

        self.deps
            .waiter
            .wait_for_message_until(
                move |m| m.author_id == user_id && m.channel_id == channel_id,
                deadline,
            )
            .await
    }

    /// Best-effort removal of a reply the user typed into the menu
    pub(crate) async fn discard_reply(&self, reply: &MessageEvent) {
        if let Err(e) = self
            .deps
            .surface
            .delete_message(reply.channel_id, reply.message_id)
            .await
        {
            debug!("Could not delete configuration reply: {}", e);
        }
    }
}

async fn load_snapshot(
    deps: SessionDeps<'_>,
    guild_id: serenity::GuildId,
) -> Result<GuildSettings, SessionError> {
    let settings = fetch_or_init(deps.store, guild_id).await?;
    if settings.greet_channel.is_none() && settings.log_channel.is_none() {
        return Ok(settings);
    }

    let live: Vec<serenity::ChannelId> = match deps.surface.text_channels(guild_id).await {
        Ok(channels) => channels.into_iter().map(|c| c.id).collect(),
        Err(e) => {
            warn!("Could not list channels of guild {}: {}", guild_id, e);
            return Ok(settings);
        }
    };

    Ok(prune_missing_channels(deps.store, guild_id, settings, &live).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::guild::TemplateString;
    use crate::test_support::{
        feed, message_in, reaction_on, Harness, CHANNEL, GUILD, OTHER_USER, USER,
    };
    use std::collections::HashSet;

    const TIMEOUT: Duration = Duration::from_secs(60);

    async fn run_session(h: &Harness) -> Result<CloseReason, SessionError> {
        ConfigSession::open(h.deps(TIMEOUT), GUILD, CHANNEL, USER)
            .await?
            .run()
            .await
    }

    /// React on the current anchor with the symbol bound to a main-menu slot
    async fn pick_slot(h: &Harness, slot: usize) {
        let consumed = feed(&h.waiter, || {
            let anchor = h.surface.anchor();
            let symbol = h.surface.menu_symbol(anchor, slot);
            reaction_on(USER, anchor, &symbol)
        })
        .await;
        assert!(consumed, "slot {} was not accepted", slot);
    }

    async fn react(h: &Harness, user: serenity::UserId, symbol: &str) -> bool {
        feed(&h.waiter, || reaction_on(user, h.surface.anchor(), symbol)).await
    }

    async fn reply(h: &Harness, user: serenity::UserId, content: &str) -> bool {
        feed(&h.waiter, || message_in(user, CHANNEL, content)).await
    }

    #[tokio::test]
    async fn test_cancel_closes_and_initializes_defaults() {
        let h = Harness::new();
        let (outcome, _) = tokio::join!(run_session(&h), async {
            let anchor = h.ready().await;
            assert_eq!(h.surface.reactions(anchor).len(), 7);
            assert!(react(&h, USER, CANCEL_SYMBOL).await);
        });

        assert_eq!(outcome.unwrap(), CloseReason::Cancelled);
        assert_eq!(h.stored().await, Some(GuildSettings::default()));
        assert!(h.surface.live_cards().is_empty());
    }

    #[tokio::test]
    async fn test_menu_offers_six_distinct_pool_symbols() {
        let h = Harness::new();
        let (outcome, _) = tokio::join!(run_session(&h), async {
            let anchor = h.ready().await;
            let reactions = h.surface.reactions(anchor);
            let (last, shuffled) = reactions.split_last().unwrap();
            assert_eq!(last, CANCEL_SYMBOL);
            let distinct: HashSet<&String> = shuffled.iter().collect();
            assert_eq!(distinct.len(), 6);
            assert!(shuffled.iter().all(|s| h.symbols.contains(s)));
            assert!(react(&h, USER, CANCEL_SYMBOL).await);
        });
        outcome.unwrap();
    }

    #[tokio::test]
    async fn test_other_users_are_ignored() {
        let h = Harness::new();
        let (outcome, _) = tokio::join!(run_session(&h), async {
            h.ready().await;
            assert!(!react(&h, OTHER_USER, CANCEL_SYMBOL).await);
            assert!(react(&h, USER, CANCEL_SYMBOL).await);
        });
        assert_eq!(outcome.unwrap(), CloseReason::Cancelled);
    }

    #[tokio::test]
    async fn test_toggle_twice_restores_value() {
        let h = Harness::new();
        let (outcome, _) = tokio::join!(run_session(&h), async {
            let anchor = h.ready().await;
            let before = h.surface.menu_symbols(anchor);

            pick_slot(&h, 4).await;
            // Dispatching waits for the next wait, so the first toggle is persisted by now
            assert!(!react(&h, USER, "not-a-menu-symbol").await);
            assert!(!h.stored().await.unwrap().log_join);
            // Toggling keeps the same symbol mapping and the same anchor
            assert_eq!(h.surface.anchor(), anchor);
            assert_eq!(h.surface.menu_symbols(anchor), before);
            assert_eq!(h.surface.removed_reactions().len(), 1);

            pick_slot(&h, 4).await;
            assert!(react(&h, USER, CANCEL_SYMBOL).await);
        });

        assert_eq!(outcome.unwrap(), CloseReason::Cancelled);
        assert!(h.stored().await.unwrap().log_join);
    }

    #[tokio::test]
    async fn test_set_channel_retries_until_valid() {
        let h = Harness::new();
        let (outcome, _) = tokio::join!(run_session(&h), async {
            h.ready().await;
            pick_slot(&h, 1).await;
            assert!(react(&h, USER, CONFIRM_SYMBOL).await);

            // Replies from someone else never reach the editor
            assert!(!reply(&h, OTHER_USER, "<#200>").await);
            assert!(reply(&h, USER, "#does-not-exist").await);
            assert!(reply(&h, USER, "<#200>").await);

            assert!(react(&h, USER, CANCEL_SYMBOL).await);
        });

        assert_eq!(outcome.unwrap(), CloseReason::Cancelled);
        assert_eq!(
            h.stored().await.unwrap().log_channel,
            Some(serenity::ChannelId::new(200))
        );
        // Only the accepted reply is cleaned up
        assert_eq!(h.surface.deleted_replies().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reply_timeout_keeps_stored_channel() {
        let h = Harness::new();
        let original = serenity::ChannelId::new(100);
        h.seed(|s| s.greet_channel = Some(original)).await;

        let (outcome, _) = tokio::join!(run_session(&h), async {
            h.ready().await;
            pick_slot(&h, 0).await;
            assert!(react(&h, USER, CONFIRM_SYMBOL).await);
            // No reply: the editor's wait runs out
        });

        assert_eq!(outcome.unwrap(), CloseReason::TimedOut);
        assert_eq!(h.stored().await.unwrap().greet_channel, Some(original));
        assert!(h.surface.live_cards().is_empty());
    }

    #[tokio::test]
    async fn test_unset_on_empty_message_is_harmless() {
        let h = Harness::new();
        let (outcome, _) = tokio::join!(run_session(&h), async {
            h.ready().await;
            pick_slot(&h, 3).await;
            assert!(react(&h, USER, UNSET_SYMBOL).await);
            assert!(react(&h, USER, CANCEL_SYMBOL).await);
        });

        assert_eq!(outcome.unwrap(), CloseReason::Cancelled);
        assert_eq!(h.stored().await.unwrap().farewell_message, None);
    }

    #[tokio::test]
    async fn test_greeting_message_round_trip() {
        let h = Harness::new();
        let (outcome, _) = tokio::join!(run_session(&h), async {
            h.ready().await;
            pick_slot(&h, 2).await;
            assert!(react(&h, USER, CONFIRM_SYMBOL).await);
            assert!(reply(&h, USER, "Welcome {username}!").await);
            assert!(react(&h, USER, CANCEL_SYMBOL).await);
        });

        assert_eq!(outcome.unwrap(), CloseReason::Cancelled);
        let stored = h.stored().await.unwrap().greet_message.unwrap();
        assert_eq!(stored, TemplateString::new("Welcome {username}!"));
        assert_eq!(stored.render("<@42>"), "Welcome <@42>!");
        assert_eq!(h.surface.deleted_replies().len(), 1);
    }

    #[tokio::test]
    async fn test_forbidden_clear_replaces_anchor() {
        let h = Harness::new();
        h.surface.forbid_clearing_reactions();

        let (outcome, _) = tokio::join!(run_session(&h), async {
            let first = h.ready().await;
            pick_slot(&h, 0).await;

            // The sub-menu now lives on a fresh message
            let replacement = h.ready().await;
            assert_ne!(replacement, first);
            assert!(h.surface.is_deleted(first));
            assert_eq!(h.surface.card(replacement).title, "Updating the greetings channel");

            assert!(react(&h, USER, CANCEL_SYMBOL).await);
            assert!(react(&h, USER, CANCEL_SYMBOL).await);
        });

        assert_eq!(outcome.unwrap(), CloseReason::Cancelled);
        assert!(h.surface.live_cards().is_empty());
    }

    #[tokio::test]
    async fn test_session_runs_without_reaction_permission() {
        let h = Harness::new();
        h.surface.forbid_adding_reactions();

        let (outcome, _) = tokio::join!(run_session(&h), async {
            let anchor = h.ready().await;
            assert!(h.surface.reactions(anchor).is_empty());
            assert!(react(&h, USER, CANCEL_SYMBOL).await);
        });
        assert_eq!(outcome.unwrap(), CloseReason::Cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_main_menu_times_out() {
        let h = Harness::new();
        let (outcome, _) = tokio::join!(run_session(&h), async {
            h.ready().await;
        });

        assert_eq!(outcome.unwrap(), CloseReason::TimedOut);
        assert!(h.surface.live_cards().is_empty());
    }

    #[tokio::test]
    async fn test_structural_edit_reattaches_fresh_markers() {
        let h = Harness::new();
        let (outcome, _) = tokio::join!(run_session(&h), async {
            h.ready().await;
            pick_slot(&h, 0).await;
            assert!(react(&h, USER, CANCEL_SYMBOL).await);

            // Back on the main menu: old sub-menu reactions are gone
            let anchor = h.ready().await;
            let mut expected = h.surface.menu_symbols(anchor);
            expected.push(CANCEL_SYMBOL.to_string());
            assert_eq!(h.surface.reactions(anchor), expected);

            assert!(react(&h, USER, CANCEL_SYMBOL).await);
        });
        assert_eq!(outcome.unwrap(), CloseReason::Cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn test_message_reply_timeout_keeps_stored_message() {
        let h = Harness::new();
        let original = TemplateString::new("Hi {username}");
        let seeded = original.clone();
        h.seed(move |s| s.greet_message = Some(seeded)).await;

        let (outcome, _) = tokio::join!(run_session(&h), async {
            h.ready().await;
            pick_slot(&h, 2).await;
            assert!(react(&h, USER, CONFIRM_SYMBOL).await);
        });

        assert_eq!(outcome.unwrap(), CloseReason::TimedOut);
        assert_eq!(h.stored().await.unwrap().greet_message, Some(original));
        assert!(h.surface.live_cards().is_empty());
    }

    #[tokio::test]
    async fn test_channel_deleted_mid_session_is_cleared_on_redraw() {
        let h = Harness::new();
        h.seed(|s| s.log_channel = Some(serenity::ChannelId::new(200))).await;

        let (outcome, _) = tokio::join!(run_session(&h), async {
            let anchor = h.ready().await;
            assert_eq!(h.surface.card(anchor).fields[1].value, "<#200>");

            h.surface.remove_channel(200);
            pick_slot(&h, 5).await;
            // Wait for the redraw to finish
            assert!(!react(&h, USER, "not-a-menu-symbol").await);
            assert_eq!(h.surface.card(anchor).fields[1].value, "None");

            assert!(react(&h, USER, CANCEL_SYMBOL).await);
        });

        outcome.unwrap();
        let stored = h.stored().await.unwrap();
        assert_eq!(stored.log_channel, None);
        assert!(!stored.log_leave);
    }

    #[tokio::test]
    async fn test_stale_channel_is_cleared_on_open() {
        let h = Harness::new();
        h.seed(|s| s.log_channel = Some(serenity::ChannelId::new(999))).await;

        let (outcome, _) = tokio::join!(run_session(&h), async {
            let anchor = h.ready().await;
            assert_eq!(h.surface.card(anchor).fields[1].value, "None");
            assert!(react(&h, USER, CANCEL_SYMBOL).await);
        });

        outcome.unwrap();
        assert_eq!(h.stored().await.unwrap().log_channel, None);
    }
}
