// Reaction symbol pool used by the configuration menu

use std::path::Path;

use rand::seq::SliceRandom;
use rand::Rng;

use super::config::{ConfigError, CONTROL_SYMBOLS};

/// Number of menu actions bound to shuffled symbols
pub const MENU_SLOTS: usize = 6;

/// Validated pool of interactive symbols
#[derive(Debug, Clone)]
pub struct SymbolPool {
    symbols: Vec<String>,
}

impl SymbolPool {
    /// Build from raw entries, dropping blanks, duplicates and control symbols
    pub fn new<I, S>(entries: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut symbols: Vec<String> = Vec::new();
        for entry in entries {
            let symbol = entry.as_ref().trim();
            if symbol.is_empty() || CONTROL_SYMBOLS.contains(&symbol) {
                continue;
            }
            if !symbols.iter().any(|s| s == symbol) {
                symbols.push(symbol.to_string());
            }
        }

        if symbols.len() < MENU_SLOTS {
            return Err(ConfigError::SymbolPoolTooSmall {
                needed: MENU_SLOTS,
                found: symbols.len(),
            });
        }

        Ok(Self { symbols })
    }

    /// Read a newline-separated pool file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::SymbolFile {
            path: path.to_path_buf(),
            source,
        })?;
        Self::new(content.lines())
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.symbols.iter().any(|s| s == symbol)
    }

    /// Draw a fresh assignment of distinct symbols to the menu slots
    pub fn shuffle<R: Rng + ?Sized>(&self, rng: &mut R) -> MenuSymbols {
        let mut drawn = self.symbols.clone();
        drawn.shuffle(rng);
        drawn.truncate(MENU_SLOTS);
        MenuSymbols(drawn)
    }
}

/// Symbols currently bound to the menu slots, in slot order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuSymbols(Vec<String>);

impl MenuSymbols {
    pub fn get(&self, slot: usize) -> &str {
        &self.0[slot]
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn position(&self, symbol: &str) -> Option<usize> {
        self.0.iter().position(|s| s == symbol)
    }
}
