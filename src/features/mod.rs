pub mod config_session;
pub mod editors;
pub mod event_waiter;
pub mod membership;
pub mod menu;

use chrono::Utc;
use poise::serenity_prelude as serenity;
use tracing::{debug, error, info};

use crate::api::discord::{ChatSurface, SerenitySurface};
use crate::store::{fetch_or_init, SettingsStore, StoreError};
use crate::{Data, Error};
use event_waiter::{EventWaiter, GatewayEvent, MessageEvent, ReactionEvent};
use membership::{MemberChange, MemberInfo};

/// Gateway event handler registered with the framework
pub async fn handle_event(
    ctx: &serenity::Context,
    event: &serenity::FullEvent,
    data: &Data,
) -> Result<(), Error> {
    match event {
        serenity::FullEvent::Ready { data_about_bot } => {
            info!(
                "Logged in as {} ({} guilds)",
                data_about_bot.user.tag(),
                data_about_bot.guilds.len()
            );
            let ids: Vec<serenity::GuildId> =
                data_about_bot.guilds.iter().map(|g| g.id).collect();
            debug!("Guilds: {:?}", ids);
        }
        serenity::FullEvent::GuildCreate { guild, is_new } => {
            if guild_joined(data.store.as_ref(), guild.id, *is_new).await? {
                info!("Joined guild {} ({})", guild.name, guild.id);
            }
        }
        serenity::FullEvent::GuildDelete { incomplete, .. } => {
            if guild_removed(data.store.as_ref(), incomplete.id, incomplete.unavailable).await? {
                info!("Removed from guild {}, deleted its settings", incomplete.id);
            }
        }
        serenity::FullEvent::GuildMemberAddition { new_member } => {
            let member = MemberInfo::from_user(&new_member.user);
            member_changed(ctx, data, new_member.guild_id, MemberChange::Joined, &member).await;
        }
        serenity::FullEvent::GuildMemberRemoval { guild_id, user, .. } => {
            let member = MemberInfo::from_user(user);
            member_changed(ctx, data, *guild_id, MemberChange::Left, &member).await;
        }
        serenity::FullEvent::ReactionAdd { add_reaction } => {
            if let Some(reaction) = ReactionEvent::from_reaction(add_reaction) {
                data.waiter.dispatch(&GatewayEvent::Reaction(reaction));
            }
        }
        serenity::FullEvent::Message { new_message } => {
            forward_message(
                &data.waiter,
                new_message.author.bot,
                MessageEvent::from_message(new_message),
            );
        }
        _ => {}
    }
    Ok(())
}

/// Initialise settings when the bot is added to a guild.
/// `is_new` is unset or false for guilds that only came back online.
pub async fn guild_joined(
    store: &dyn SettingsStore,
    guild_id: serenity::GuildId,
    is_new: Option<bool>,
) -> Result<bool, StoreError> {
    if is_new != Some(true) {
        return Ok(false);
    }
    fetch_or_init(store, guild_id).await?;
    Ok(true)
}

/// Forget a guild the bot left. An unavailable guild is an outage, not a removal.
pub async fn guild_removed(
    store: &dyn SettingsStore,
    guild_id: serenity::GuildId,
    unavailable: bool,
) -> Result<bool, StoreError> {
    if unavailable {
        return Ok(false);
    }
    store.delete(guild_id).await?;
    Ok(true)
}

/// Offer a user's message to waiting sessions; bot messages are never offered
pub fn forward_message(waiter: &EventWaiter, from_bot: bool, message: MessageEvent) -> bool {
    !from_bot && waiter.dispatch(&GatewayEvent::Message(message))
}

async fn member_changed(
    ctx: &serenity::Context,
    data: &Data,
    guild_id: serenity::GuildId,
    change: MemberChange,
    member: &MemberInfo,
) {
    let surface = SerenitySurface::new(ctx.http.clone());

    let cached: Option<Vec<serenity::ChannelId>> = ctx
        .cache
        .guild(guild_id)
        .map(|guild| guild.channels.keys().copied().collect());
    let live = match cached {
        Some(channels) => channels,
        None => match surface.text_channels(guild_id).await {
            Ok(channels) => channels.into_iter().map(|c| c.id).collect(),
            Err(e) => {
                error!("Could not list channels of guild {}: {}", guild_id, e);
                return;
            }
        },
    };

    if let Err(e) = membership::announce(
        data.store.as_ref(),
        &surface,
        guild_id,
        change,
        member,
        &live,
        Utc::now(),
    )
    .await
    {
        error!("Failed to handle {:?} in guild {}: {:?}", change, guild_id, e);
    }
}
