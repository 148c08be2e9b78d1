// Outbound Discord actions used by the configuration session and member events

use std::sync::Arc;

use async_trait::async_trait;
use poise::serenity_prelude as serenity;
use thiserror::Error;

use crate::utils::config::colors;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SurfaceError {
    /// The bot lacks the permission for this action
    #[error("missing permissions")]
    Forbidden,
    #[error("target no longer exists")]
    NotFound,
    #[error("discord request failed: {0}")]
    Other(String),
}

impl From<::serenity::Error> for SurfaceError {
    fn from(e: ::serenity::Error) -> Self {
        if let ::serenity::Error::Http(http_err) = &e {
            match http_err.status_code().map(|s| s.as_u16()) {
                Some(403) => return SurfaceError::Forbidden,
                Some(404) => return SurfaceError::NotFound,
                _ => {}
            }
        }
        SurfaceError::Other(e.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardField {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

/// Embed content independent of the serenity builders
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Card {
    pub title: String,
    pub description: Option<String>,
    pub fields: Vec<CardField>,
    pub image_url: Option<String>,
}

impl Card {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn field(mut self, name: impl Into<String>, value: impl Into<String>, inline: bool) -> Self {
        self.fields.push(CardField {
            name: name.into(),
            value: value.into(),
            inline,
        });
        self
    }

    pub fn image(mut self, url: impl Into<String>) -> Self {
        self.image_url = Some(url.into());
        self
    }

    pub fn to_embed(&self) -> serenity::CreateEmbed {
        let mut embed = serenity::CreateEmbed::new()
            .title(&self.title)
            .color(colors::ACCENT);
        if let Some(description) = &self.description {
            embed = embed.description(description);
        }
        for field in &self.fields {
            embed = embed.field(&field.name, &field.value, field.inline);
        }
        if let Some(url) = &self.image_url {
            embed = embed.image(url);
        }
        embed
    }
}

/// A text channel of a guild, as needed for resolving user input
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelInfo {
    pub id: serenity::ChannelId,
    pub name: String,
}

/// Resolve a channel id, `<#id>` mention or name against the guild's text channels
pub fn resolve_channel(channels: &[ChannelInfo], input: &str) -> Option<serenity::ChannelId> {
    let input = input.trim();

    let by_id = input
        .strip_prefix("<#")
        .and_then(|rest| rest.strip_suffix('>'))
        .unwrap_or(input)
        .parse::<u64>()
        .ok()
        .filter(|id| *id != 0);

    if let Some(id) = by_id {
        return channels
            .iter()
            .find(|c| c.id.get() == id)
            .map(|c| c.id);
    }

    let name = input.strip_prefix('#').unwrap_or(input);
    channels.iter().find(|c| c.name == name).map(|c| c.id)
}

/// Chat actions the bot performs on the gateway
#[async_trait]
pub trait ChatSurface: Send + Sync {
    async fn send_card(
        &self,
        channel_id: serenity::ChannelId,
        card: &Card,
    ) -> Result<serenity::MessageId, SurfaceError>;

    async fn edit_card(
        &self,
        channel_id: serenity::ChannelId,
        message_id: serenity::MessageId,
        card: &Card,
    ) -> Result<(), SurfaceError>;

    async fn send_text(
        &self,
        channel_id: serenity::ChannelId,
        content: &str,
    ) -> Result<serenity::MessageId, SurfaceError>;

    async fn delete_message(
        &self,
        channel_id: serenity::ChannelId,
        message_id: serenity::MessageId,
    ) -> Result<(), SurfaceError>;

    async fn add_reaction(
        &self,
        channel_id: serenity::ChannelId,
        message_id: serenity::MessageId,
        symbol: &str,
    ) -> Result<(), SurfaceError>;

    /// Remove every reaction from a message
    async fn clear_reactions(
        &self,
        channel_id: serenity::ChannelId,
        message_id: serenity::MessageId,
    ) -> Result<(), SurfaceError>;

    /// Remove one user's reaction
    async fn remove_reaction(
        &self,
        channel_id: serenity::ChannelId,
        message_id: serenity::MessageId,
        user_id: serenity::UserId,
        symbol: &str,
    ) -> Result<(), SurfaceError>;

    async fn text_channels(
        &self,
        guild_id: serenity::GuildId,
    ) -> Result<Vec<ChannelInfo>, SurfaceError>;
}

/// ChatSurface over the serenity HTTP client
#[derive(Clone)]
pub struct SerenitySurface {
    http: Arc<serenity::Http>,
}

impl SerenitySurface {
    pub fn new(http: Arc<serenity::Http>) -> Self {
        Self { http }
    }
}

fn reaction_type(symbol: &str) -> Result<serenity::ReactionType, SurfaceError> {
    serenity::ReactionType::try_from(symbol)
        .map_err(|e| SurfaceError::Other(format!("invalid reaction `{}`: {}", symbol, e)))
}

#[async_trait]
impl ChatSurface for SerenitySurface {
    async fn send_card(
        &self,
        channel_id: serenity::ChannelId,
        card: &Card,
    ) -> Result<serenity::MessageId, SurfaceError> {
        let msg = channel_id
            .send_message(&self.http, serenity::CreateMessage::new().embed(card.to_embed()))
            .await?;
        Ok(msg.id)
    }

    async fn edit_card(
        &self,
        channel_id: serenity::ChannelId,
        message_id: serenity::MessageId,
        card: &Card,
    ) -> Result<(), SurfaceError> {
        channel_id
            .edit_message(
                &self.http,
                message_id,
                serenity::EditMessage::new().embed(card.to_embed()),
            )
            .await?;
        Ok(())
    }

    async fn send_text(
        &self,
        channel_id: serenity::ChannelId,
        content: &str,
    ) -> Result<serenity::MessageId, SurfaceError> {
        let msg = channel_id.say(&self.http, content).await?;
        Ok(msg.id)
    }

    async fn delete_message(
        &self,
        channel_id: serenity::ChannelId,
        message_id: serenity::MessageId,
    ) -> Result<(), SurfaceError> {
        channel_id.delete_message(&self.http, message_id).await?;
        Ok(())
    }

    async fn add_reaction(
        &self,
        channel_id: serenity::ChannelId,
        message_id: serenity::MessageId,
        symbol: &str,
    ) -> Result<(), SurfaceError> {
        let reaction = reaction_type(symbol)?;
        self.http
            .create_reaction(channel_id, message_id, &reaction)
            .await?;
        Ok(())
    }

    async fn clear_reactions(
        &self,
        channel_id: serenity::ChannelId,
        message_id: serenity::MessageId,
    ) -> Result<(), SurfaceError> {
        self.http
            .delete_message_reactions(channel_id, message_id)
            .await?;
        Ok(())
    }

    async fn remove_reaction(
        &self,
        channel_id: serenity::ChannelId,
        message_id: serenity::MessageId,
        user_id: serenity::UserId,
        symbol: &str,
    ) -> Result<(), SurfaceError> {
        let reaction = reaction_type(symbol)?;
        self.http
            .delete_reaction(channel_id, message_id, user_id, &reaction)
            .await?;
        Ok(())
    }

    async fn text_channels(
        &self,
        guild_id: serenity::GuildId,
    ) -> Result<Vec<ChannelInfo>, SurfaceError> {
        let channels = guild_id.channels(&self.http).await?;
        Ok(channels
            .into_values()
            .filter(|c| matches!(c.kind, serenity::ChannelType::Text | serenity::ChannelType::News))
            .map(|c| ChannelInfo {
                id: c.id,
                name: c.name,
            })
            .collect())
    }
}
