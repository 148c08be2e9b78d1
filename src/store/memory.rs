use async_trait::async_trait;
use dashmap::DashMap;
use poise::serenity_prelude as serenity;

use super::{SettingsStore, StoreError};
use crate::models::guild::GuildSettings;

/// Process-local store, lost on restart
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: DashMap<serenity::GuildId, GuildSettings>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SettingsStore for MemoryStore {
    async fn get(&self, guild_id: serenity::GuildId) -> Result<Option<GuildSettings>, StoreError> {
        Ok(self.records.get(&guild_id).map(|entry| entry.clone()))
    }

    async fn put(
        &self,
        guild_id: serenity::GuildId,
        settings: &GuildSettings,
    ) -> Result<(), StoreError> {
        self.records.insert(guild_id, settings.clone());
        Ok(())
    }

    async fn delete(&self, guild_id: serenity::GuildId) -> Result<(), StoreError> {
        self.records.remove(&guild_id);
        Ok(())
    }
}
