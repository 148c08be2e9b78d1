use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use poise::serenity_prelude as serenity;
use tracing::debug;

use super::{SettingsStore, StoreError};
use crate::api::firebase::FirebaseClient;
use crate::models::guild::GuildSettings;

const COLLECTION: &str = "guild_settings";

/// Firestore-backed store with a read-through cache
pub struct FirestoreStore {
    firebase: Arc<FirebaseClient>,
    cache: DashMap<serenity::GuildId, GuildSettings>,
}

impl FirestoreStore {
    pub fn new(firebase: Arc<FirebaseClient>) -> Self {
        Self {
            firebase,
            cache: DashMap::new(),
        }
    }
}

#[async_trait]
impl SettingsStore for FirestoreStore {
    async fn get(&self, guild_id: serenity::GuildId) -> Result<Option<GuildSettings>, StoreError> {
        if let Some(cached) = self.cache.get(&guild_id) {
            return Ok(Some(cached.clone()));
        }

        let doc = self
            .firebase
            .get_document(COLLECTION, &guild_id.to_string())
            .await?;

        match doc {
            Some(doc) => {
                let settings: GuildSettings = serde_json::from_value(doc)?;
                self.cache.insert(guild_id, settings.clone());
                Ok(Some(settings))
            }
            None => Ok(None),
        }
    }

    async fn put(
        &self,
        guild_id: serenity::GuildId,
        settings: &GuildSettings,
    ) -> Result<(), StoreError> {
        let json_val = serde_json::to_value(settings)?;
        self.firebase
            .replace_document(COLLECTION, &guild_id.to_string(), &json_val)
            .await?;
        self.cache.insert(guild_id, settings.clone());
        debug!("Saved settings for guild {} to Firestore", guild_id);
        Ok(())
    }

    async fn delete(&self, guild_id: serenity::GuildId) -> Result<(), StoreError> {
        self.firebase
            .delete_document(COLLECTION, &guild_id.to_string())
            .await?;
        self.cache.remove(&guild_id);
        Ok(())
    }
}
