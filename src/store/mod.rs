// Guild settings persistence
//
// Callers only ever read a full snapshot, mutate it and write it back whole.

pub mod firestore;
pub mod json_file;
pub mod memory;

use async_trait::async_trait;
use poise::serenity_prelude as serenity;
use thiserror::Error;
use tracing::{debug, info};

use crate::models::guild::{ChannelField, GuildSettings};

pub use firestore::FirestoreStore;
pub use json_file::JsonFileStore;
pub use memory::MemoryStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("settings storage i/o failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed settings document: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("settings backend failed: {0}")]
    Backend(#[from] anyhow::Error),
}

/// Key/value mapping from guild id to its settings record
#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn get(&self, guild_id: serenity::GuildId) -> Result<Option<GuildSettings>, StoreError>;

    /// Create or replace the whole record
    async fn put(
        &self,
        guild_id: serenity::GuildId,
        settings: &GuildSettings,
    ) -> Result<(), StoreError>;

    async fn delete(&self, guild_id: serenity::GuildId) -> Result<(), StoreError>;
}

/// Read the record, writing the default first if the guild has none
pub async fn fetch_or_init(
    store: &dyn SettingsStore,
    guild_id: serenity::GuildId,
) -> Result<GuildSettings, StoreError> {
    if let Some(settings) = store.get(guild_id).await? {
        return Ok(settings);
    }

    debug!("Initializing default settings for guild {}", guild_id);
    let settings = GuildSettings::default();
    store.put(guild_id, &settings).await?;
    Ok(settings)
}

/// Re-read the snapshot, apply `change`, and persist the result
pub async fn update<F>(
    store: &dyn SettingsStore,
    guild_id: serenity::GuildId,
    change: F,
) -> Result<GuildSettings, StoreError>
where
    F: FnOnce(&mut GuildSettings) + Send,
{
    let mut settings = fetch_or_init(store, guild_id).await?;
    change(&mut settings);
    store.put(guild_id, &settings).await?;
    Ok(settings)
}

/// Clear channel fields whose channel no longer exists, persisting only if one was stale
pub async fn prune_missing_channels(
    store: &dyn SettingsStore,
    guild_id: serenity::GuildId,
    settings: GuildSettings,
    live_channels: &[serenity::ChannelId],
) -> Result<GuildSettings, StoreError> {
    let stale: Vec<ChannelField> = [ChannelField::Greet, ChannelField::Log]
        .into_iter()
        .filter(|field| {
            field
                .get(&settings)
                .is_some_and(|id| !live_channels.contains(&id))
        })
        .collect();

    if stale.is_empty() {
        return Ok(settings);
    }

    info!(
        "Clearing {} stale channel setting(s) for guild {}",
        stale.len(),
        guild_id
    );
    update(store, guild_id, move |s| {
        for field in stale {
            // Only clear if nobody re-pointed it meanwhile
            if field.get(s).is_some_and(|id| !live_channels.contains(&id)) {
                field.set(s, None);
            }
        }
    })
    .await
}
