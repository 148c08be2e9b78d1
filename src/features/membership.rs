// Member join/leave handler - greetings, farewells and log embeds

use chrono::{DateTime, Utc};
use poise::serenity_prelude as serenity;
use tracing::{debug, warn};

use crate::api::discord::{Card, ChatSurface};
use crate::models::guild::{FlagField, MessageField};
use crate::store::{fetch_or_init, prune_missing_channels, SettingsStore};
use crate::utils::formatters::format_log_time;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberChange {
    Joined,
    Left,
}

impl MemberChange {
    fn log_title(self) -> &'static str {
        match self {
            MemberChange::Joined => "User joined",
            MemberChange::Left => "User left",
        }
    }

    fn message(self) -> MessageField {
        match self {
            MemberChange::Joined => MessageField::Greeting,
            MemberChange::Left => MessageField::Farewell,
        }
    }

    fn log_flag(self) -> FlagField {
        match self {
            MemberChange::Joined => FlagField::LogJoin,
            MemberChange::Left => FlagField::LogLeave,
        }
    }
}

/// The parts of a member the announcements show
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberInfo {
    pub mention: String,
    pub tag: String,
    pub avatar_url: String,
}

impl MemberInfo {
    pub fn from_user(user: &serenity::User) -> Self {
        Self {
            mention: format!("<@{}>", user.id),
            tag: user.tag(),
            avatar_url: user.face(),
        }
    }
}

pub fn log_card(change: MemberChange, member: &MemberInfo, at: DateTime<Utc>) -> Card {
    Card::new(change.log_title())
        .field("Username", member.tag.clone(), true)
        .field("Time", format_log_time(at), true)
        .image(member.avatar_url.clone())
}

/// Post the greeting/farewell and the log entry configured for the guild
pub async fn announce(
    store: &dyn SettingsStore,
    surface: &dyn ChatSurface,
    guild_id: serenity::GuildId,
    change: MemberChange,
    member: &MemberInfo,
    live_channels: &[serenity::ChannelId],
    at: DateTime<Utc>,
) -> Result<(), anyhow::Error> {
    let settings = fetch_or_init(store, guild_id).await?;
    let settings = prune_missing_channels(store, guild_id, settings, live_channels).await?;

    if let (Some(channel_id), Some(template)) =
        (settings.greet_channel, change.message().get(&settings))
    {
        if let Err(e) = surface
            .send_text(channel_id, &template.render(&member.mention))
            .await
        {
            warn!("Failed to post {:?} message in {}: {}", change, channel_id, e);
        }
    }

    match settings.log_channel {
        Some(channel_id) if change.log_flag().get(&settings) => {
            if let Err(e) = surface
                .send_card(channel_id, &log_card(change, member, at))
                .await
            {
                warn!("Failed to post log entry in {}: {}", channel_id, e);
            }
        }
        Some(_) => debug!("Guild {}: {:?} logging disabled", guild_id, change),
        None => {}
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::guild::TemplateString;
    use crate::test_support::{Harness, GUILD};
    use chrono::TimeZone;

    fn member() -> MemberInfo {
        MemberInfo {
            mention: "<@42>".to_string(),
            tag: "mika#0001".to_string(),
            avatar_url: "https://cdn.example/42.png".to_string(),
        }
    }

    fn live() -> Vec<serenity::ChannelId> {
        vec![serenity::ChannelId::new(100), serenity::ChannelId::new(200)]
    }

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 5, 14, 7, 0).unwrap()
    }

    #[tokio::test]
    async fn test_join_posts_greeting_and_log() {
        let h = Harness::new();
        h.seed(|s| {
            s.greet_channel = Some(serenity::ChannelId::new(100));
            s.log_channel = Some(serenity::ChannelId::new(200));
            s.greet_message = Some(TemplateString::new("Welcome {username}!"));
        })
        .await;

        announce(&h.store, &h.surface, GUILD, MemberChange::Joined, &member(), &live(), at())
            .await
            .unwrap();

        let greetings = h.surface.posted_in(serenity::ChannelId::new(100));
        assert_eq!(greetings.len(), 1);
        assert_eq!(greetings[0].text.as_deref(), Some("Welcome <@42>!"));

        let logs = h.surface.posted_in(serenity::ChannelId::new(200));
        let card = logs[0].card.clone().unwrap();
        assert_eq!(card.title, "User joined");
        assert_eq!(card.fields[0].value, "mika#0001");
        assert_eq!(card.fields[1].value, "05 Mar 2024 at 14:07 UTC");
        assert_eq!(card.image_url.as_deref(), Some("https://cdn.example/42.png"));
    }

    #[tokio::test]
    async fn test_leave_respects_flag_and_missing_message() {
        let h = Harness::new();
        h.seed(|s| {
            s.greet_channel = Some(serenity::ChannelId::new(100));
            s.log_channel = Some(serenity::ChannelId::new(200));
            s.log_leave = false;
        })
        .await;

        announce(&h.store, &h.surface, GUILD, MemberChange::Left, &member(), &live(), at())
            .await
            .unwrap();

        assert!(h.surface.posted_in(serenity::ChannelId::new(100)).is_empty());
        assert!(h.surface.posted_in(serenity::ChannelId::new(200)).is_empty());
    }

    #[tokio::test]
    async fn test_deleted_log_channel_is_cleared() {
        let h = Harness::new();
        h.seed(|s| {
            s.greet_channel = Some(serenity::ChannelId::new(100));
            s.log_channel = Some(serenity::ChannelId::new(300));
        })
        .await;

        announce(&h.store, &h.surface, GUILD, MemberChange::Joined, &member(), &live(), at())
            .await
            .unwrap();

        let stored = h.stored().await.unwrap();
        assert_eq!(stored.log_channel, None);
        assert_eq!(stored.greet_channel, Some(serenity::ChannelId::new(100)));
        assert!(h.surface.posted_in(serenity::ChannelId::new(300)).is_empty());
    }
}
