//! System configuration.
//!
//! Holds the keyword and label tables the rest of the crate consults:
//! which tag values switch on weapon flags, how saves and roll types are
//! labelled on chat cards. Defaults match the core rulebook; a host can
//! override any subset from JSON.

use crate::actor::SaveKind;
use crate::dice::RollType;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Json(#[from] serde_json::Error),
}

/// Tag values that derive item capability flags.
///
/// Matching is exact and case-sensitive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TagKeywords {
    pub melee: String,
    pub missile: String,
    pub slow: String,
}

impl Default for TagKeywords {
    fn default() -> Self {
        Self {
            melee: "Melee".to_string(),
            missile: "Missile".to_string(),
            slow: "Slow".to_string(),
        }
    }
}

/// Long display names for each saving throw.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SaveNames {
    pub death: String,
    pub wand: String,
    pub paralysis: String,
    pub breath: String,
    pub spell: String,
}

impl Default for SaveNames {
    fn default() -> Self {
        Self {
            death: "Death Ray or Poison".to_string(),
            wand: "Magic Wands".to_string(),
            paralysis: "Paralysis or Petrification".to_string(),
            breath: "Breath Attacks".to_string(),
            spell: "Spells, Rods or Staves".to_string(),
        }
    }
}

impl SaveNames {
    pub fn get(&self, kind: SaveKind) -> &str {
        match kind {
            SaveKind::Death => &self.death,
            SaveKind::Wand => &self.wand,
            SaveKind::Paralysis => &self.paralysis,
            SaveKind::Breath => &self.breath,
            SaveKind::Spell => &self.spell,
        }
    }
}

/// Symbols shown next to a roll target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RollTypeSymbols {
    pub result: String,
    pub above: String,
    pub below: String,
}

impl Default for RollTypeSymbols {
    fn default() -> Self {
        Self {
            result: "=".to_string(),
            above: "≥".to_string(),
            below: "≤".to_string(),
        }
    }
}

impl RollTypeSymbols {
    pub fn get(&self, roll_type: RollType) -> &str {
        match roll_type {
            RollType::Result => &self.result,
            RollType::Above => &self.above,
            RollType::Below => &self.below,
        }
    }
}

/// Configuration shared by the codec, resolver and dispatcher.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemConfig {
    pub tags: TagKeywords,
    pub saves: SaveNames,
    pub roll_types: RollTypeSymbols,
}

impl SystemConfig {
    /// Create a config with the rulebook defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a config from JSON. Missing keys keep their defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Replace the tag keywords.
    pub fn with_tag_keywords(mut self, tags: TagKeywords) -> Self {
        self.tags = tags;
        self
    }

    /// Replace the save display names.
    pub fn with_save_names(mut self, saves: SaveNames) -> Self {
        self.saves = saves;
        self
    }

    /// Replace the roll type symbols.
    pub fn with_roll_type_symbols(mut self, roll_types: RollTypeSymbols) -> Self {
        self.roll_types = roll_types;
        self
    }
}
