// Centralized configuration for Usher Bot

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Reaction that cancels the current menu
pub const CANCEL_SYMBOL: &str = "\u{274C}";
/// Reaction that unsets the current field
pub const UNSET_SYMBOL: &str = "\u{1F47B}";
/// Reaction that confirms editing the current field
pub const CONFIRM_SYMBOL: &str = "\u{2705}";

/// Symbols the menu reserves for its own controls
pub const CONTROL_SYMBOLS: [&str; 3] = [CANCEL_SYMBOL, UNSET_SYMBOL, CONFIRM_SYMBOL];

const DEFAULT_PREFIX: &str = "u!";
const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Discord embed colors
pub mod colors {
    pub const ACCENT: u32 = 0x698a9e;
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
    #[error("failed to read symbol pool {path}: {source}")]
    SymbolFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("symbol pool needs at least {needed} usable symbols, found {found}")]
    SymbolPoolTooSmall { needed: usize, found: usize },
}

/// Which persistence backend holds guild settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageBackend {
    /// One JSON document per guild under a local directory
    JsonFiles { dir: PathBuf },
    /// Firestore collection, authenticated with a service account key
    Firestore { key_file: PathBuf },
    /// Process memory only, lost on restart
    Memory,
}

/// Process configuration read once at startup
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub token: String,
    pub prefixes: Vec<String>,
    pub symbol_pool_file: PathBuf,
    pub session_timeout: Duration,
    pub storage: StorageBackend,
}

impl AppConfig {
    /// Load from the process environment (call `dotenvy::dotenv()` first)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let token = lookup("DISCORD_TOKEN")
            .filter(|t| !t.trim().is_empty())
            .ok_or(ConfigError::Missing("DISCORD_TOKEN"))?;

        let prefixes = parse_prefixes(
            lookup("BOT_PREFIXES").unwrap_or_else(|| DEFAULT_PREFIX.to_string()).as_str(),
        )?;

        let session_timeout = match lookup("CONFIG_TIMEOUT_SECS") {
            Some(raw) => {
                let secs: u64 = raw.trim().parse().map_err(|_| ConfigError::Invalid {
                    key: "CONFIG_TIMEOUT_SECS",
                    reason: format!("`{}` is not a whole number of seconds", raw),
                })?;
                if secs == 0 {
                    return Err(ConfigError::Invalid {
                        key: "CONFIG_TIMEOUT_SECS",
                        reason: "must be greater than zero".to_string(),
                    });
                }
                Duration::from_secs(secs)
            }
            None => Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        };

        let storage = match lookup("SETTINGS_BACKEND").as_deref().map(str::trim) {
            None | Some("json") => StorageBackend::JsonFiles {
                dir: lookup("SETTINGS_DIR")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from("data/guilds")),
            },
            Some("firestore") => StorageBackend::Firestore {
                key_file: lookup("FIREBASE_KEY_FILE")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from("firebase-key.json")),
            },
            Some("memory") => StorageBackend::Memory,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    key: "SETTINGS_BACKEND",
                    reason: format!(
                        "unknown backend `{}` (expected json, firestore or memory)",
                        other
                    ),
                })
            }
        };

        Ok(Self {
            token,
            prefixes,
            symbol_pool_file: lookup("SYMBOL_POOL_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("emojis.txt")),
            session_timeout,
            storage,
        })
    }

    /// Prefix shown in help text and presence
    pub fn primary_prefix(&self) -> &str {
        self.prefixes.first().map(String::as_str).unwrap_or(DEFAULT_PREFIX)
    }
}

fn parse_prefixes(raw: &str) -> Result<Vec<String>, ConfigError> {
    let mut prefixes: Vec<String> = Vec::new();
    for prefix in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        if !prefixes.iter().any(|p| p == prefix) {
            prefixes.push(prefix.to_string());
        }
    }
    if prefixes.is_empty() {
        return Err(ConfigError::Invalid {
            key: "BOT_PREFIXES",
            reason: "at least one prefix is required".to_string(),
        });
    }
    Ok(prefixes)
}

/// Split a message into (prefix, rest) on the longest configured prefix it starts with
pub fn split_prefix<'a>(prefixes: &[String], content: &'a str) -> Option<(&'a str, &'a str)> {
    let len = prefixes
        .iter()
        .filter(|prefix| {
            content.len() >= prefix.len()
                && content.is_char_boundary(prefix.len())
                && content[..prefix.len()].eq_ignore_ascii_case(prefix)
        })
        .map(String::len)
        .max()?;

    let (matched, rest) = content.split_at(len);
    Some((matched, rest.trim_start()))
}
