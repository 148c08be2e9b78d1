// Local JSON document store, one file per guild

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use poise::serenity_prelude as serenity;
use tokio::fs;
use tracing::debug;

use super::{SettingsStore, StoreError};
use crate::models::guild::GuildSettings;

pub struct JsonFileStore {
    dir: PathBuf,
    write_seq: AtomicU64,
}

impl JsonFileStore {
    /// Open the store, creating the directory if needed
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).await?;
        Ok(Self {
            dir,
            write_seq: AtomicU64::new(0),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, guild_id: serenity::GuildId) -> PathBuf {
        self.dir.join(format!("{}.json", guild_id))
    }
}

#[async_trait]
impl SettingsStore for JsonFileStore {
    async fn get(&self, guild_id: serenity::GuildId) -> Result<Option<GuildSettings>, StoreError> {
        match fs::read_to_string(self.path_for(guild_id)).await {
            Ok(content) => Ok(Some(serde_json::from_str(&content)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn put(
        &self,
        guild_id: serenity::GuildId,
        settings: &GuildSettings,
    ) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(settings)?;
        let seq = self.write_seq.fetch_add(1, Ordering::Relaxed);
        let tmp = self.dir.join(format!("{}.json.{}.tmp", guild_id, seq));

        // Readers only ever see a complete record
        fs::write(&tmp, json).await?;
        if let Err(e) = fs::rename(&tmp, self.path_for(guild_id)).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(e.into());
        }

        debug!("Saved settings for guild {}", guild_id);
        Ok(())
    }

    async fn delete(&self, guild_id: serenity::GuildId) -> Result<(), StoreError> {
        match fs::remove_file(self.path_for(guild_id)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
