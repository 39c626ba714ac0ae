//! Actors, scenes and tokens as seen by the roll pipeline.

use crate::ids::{ActorId, ItemId, SceneId, TokenId};
use crate::item::Item;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Player characters get the melee/missile choice; everything else is
/// resolved automatically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActorKind {
    #[default]
    Character,
    Monster,
}

/// The five saving throw categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SaveKind {
    Death,
    Wand,
    Paralysis,
    Breath,
    Spell,
}

impl SaveKind {
    pub const ALL: [SaveKind; 5] = [
        SaveKind::Death,
        SaveKind::Wand,
        SaveKind::Paralysis,
        SaveKind::Breath,
        SaveKind::Spell,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            SaveKind::Death => "death",
            SaveKind::Wand => "wand",
            SaveKind::Paralysis => "paralysis",
            SaveKind::Breath => "breath",
            SaveKind::Spell => "spell",
        }
    }
}

#[derive(Debug, Error)]
#[error("Unknown save: {0}")]
pub struct UnknownSave(pub String);

impl FromStr for SaveKind {
    type Err = UnknownSave;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SaveKind::ALL
            .into_iter()
            .find(|k| k.key() == s.trim())
            .ok_or_else(|| UnknownSave(s.to_string()))
    }
}

impl fmt::Display for SaveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}

/// Save targets; a d20 at or above the value succeeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Saves {
    pub death: i32,
    pub wand: i32,
    pub paralysis: i32,
    pub breath: i32,
    pub spell: i32,
}

impl Saves {
    pub fn get(&self, kind: SaveKind) -> i32 {
        match kind {
            SaveKind::Death => self.death,
            SaveKind::Wand => self.wand,
            SaveKind::Paralysis => self.paralysis,
            SaveKind::Breath => self.breath,
            SaveKind::Spell => self.spell,
        }
    }
}

impl Default for Saves {
    /// Level 1 fighter.
    fn default() -> Self {
        Self {
            death: 12,
            wand: 13,
            paralysis: 14,
            breath: 15,
            spell: 16,
        }
    }
}

/// Attack roll modifiers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttackMods {
    pub melee: i32,
    pub missile: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Actor {
    pub id: ActorId,
    pub name: String,
    #[serde(default)]
    pub kind: ActorKind,
    #[serde(default)]
    pub saves: Saves,
    #[serde(default)]
    pub attack_mods: AttackMods,
    #[serde(default)]
    pub items: Vec<Item>,
    /// Set when this actor was synthesized from a token.
    #[serde(default)]
    pub token: Option<TokenAddress>,
}

impl Actor {
    pub fn new(name: impl Into<String>, kind: ActorKind) -> Self {
        Self {
            id: ActorId::new(),
            name: name.into(),
            kind,
            saves: Saves::default(),
            attack_mods: AttackMods::default(),
            items: Vec::new(),
            token: None,
        }
    }

    pub fn with_item(mut self, item: Item) -> Self {
        self.items.push(item);
        self
    }

    pub fn with_saves(mut self, saves: Saves) -> Self {
        self.saves = saves;
        self
    }

    pub fn with_attack_mods(mut self, attack_mods: AttackMods) -> Self {
        self.attack_mods = attack_mods;
        self
    }

    pub fn is_character(&self) -> bool {
        self.kind == ActorKind::Character
    }

    pub fn owned_item(&self, id: ItemId) -> Option<&Item> {
        self.items.iter().find(|i| i.id == id)
    }

    pub fn owned_item_mut(&mut self, id: ItemId) -> Option<&mut Item> {
        self.items.iter_mut().find(|i| i.id == id)
    }
}

// ============================================================================
// Scenes and tokens
// ============================================================================

/// Locates a token: scene first, then the token inside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TokenAddress {
    pub scene_id: SceneId,
    pub token_id: TokenId,
}

impl TokenAddress {
    pub fn new(scene_id: SceneId, token_id: TokenId) -> Self {
        Self { scene_id, token_id }
    }

    /// Parse the `"<sceneId>.<tokenId>"` key used in card markup.
    pub fn parse_key(key: &str) -> Option<Self> {
        let (scene, token) = key.trim().split_once('.')?;
        Some(Self {
            scene_id: scene.parse().ok()?,
            token_id: token.parse().ok()?,
        })
    }

    pub fn key(&self) -> String {
        format!("{}.{}", self.scene_id, self.token_id)
    }
}

/// Per-token overrides applied over the base actor of an unlinked token.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActorDelta {
    pub name: Option<String>,
    pub saves: Option<Saves>,
    /// Replaces the base actor's items when present.
    pub items: Option<Vec<Item>>,
}

/// A token placed on a scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenData {
    pub id: TokenId,
    pub name: String,
    pub actor_id: Option<ActorId>,
    /// Linked tokens share the base actor's data verbatim.
    #[serde(default)]
    pub actor_link: bool,
    #[serde(default)]
    pub delta: ActorDelta,
}

impl TokenData {
    pub fn linked(name: impl Into<String>, actor_id: ActorId) -> Self {
        Self {
            id: TokenId::new(),
            name: name.into(),
            actor_id: Some(actor_id),
            actor_link: true,
            delta: ActorDelta::default(),
        }
    }

    pub fn unlinked(name: impl Into<String>, actor_id: ActorId, delta: ActorDelta) -> Self {
        Self {
            id: TokenId::new(),
            name: name.into(),
            actor_id: Some(actor_id),
            actor_link: false,
            delta,
        }
    }

    /// The actor this token acts as, given its base actor.
    pub fn synthesize_actor(&self, base: Actor, scene_id: SceneId) -> Actor {
        if self.actor_link {
            return base;
        }
        let mut actor = base;
        if let Some(name) = &self.delta.name {
            actor.name = name.clone();
        }
        if let Some(saves) = self.delta.saves {
            actor.saves = saves;
        }
        if let Some(items) = &self.delta.items {
            actor.items = items.clone();
        }
        actor.token = Some(TokenAddress::new(scene_id, self.id));
        actor
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    pub id: SceneId,
    pub name: String,
    #[serde(default)]
    pub tokens: Vec<TokenData>,
}

impl Scene {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: SceneId::new(),
            name: name.into(),
            tokens: Vec::new(),
        }
    }

    pub fn token(&self, id: TokenId) -> Option<&TokenData> {
        self.tokens.iter().find(|t| t.id == id)
    }
}
