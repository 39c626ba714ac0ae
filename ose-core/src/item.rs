//! Owned items and their per-kind data.
//!
//! Each item kind carries exactly the fields its rolls need, so dispatch
//! on kind is a total match rather than a string switch.

use crate::actor::SaveKind;
use crate::config::SystemConfig;
use crate::dice::RollType;
use crate::ids::ItemId;
use crate::tags::{DerivedFlags, Tag};
use serde::{Deserialize, Serialize};

/// An item owned by an actor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub kind: ItemKind,
}

/// Per-kind item data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum ItemKind {
    Weapon(WeaponData),
    Spell(SpellData),
    Ability(AbilityData),
    Armor(ArmorData),
    Gear(GearData),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeaponData {
    pub damage: String,
    pub bonus: i32,
    pub melee: bool,
    pub missile: bool,
    pub slow: bool,
    pub qualities: String,
    pub tags: Vec<Tag>,
    pub equipped: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpellData {
    pub class: String,
    pub lvl: u32,
    pub range: String,
    pub duration: String,
    pub save: Option<SaveKind>,
    pub roll: Option<String>,
    pub roll_type: RollType,
    pub roll_target: Option<i32>,
    pub blind: bool,
    /// Casts remaining today.
    pub cast: i32,
    pub memorized: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AbilityData {
    pub requirements: String,
    pub roll: Option<String>,
    pub roll_type: RollType,
    pub roll_target: Option<i32>,
    pub blind: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArmorType {
    #[default]
    Unarmored,
    Light,
    Heavy,
    Shield,
}

impl ArmorType {
    pub fn name(&self) -> &'static str {
        match self {
            ArmorType::Unarmored => "Unarmored",
            ArmorType::Light => "Light",
            ArmorType::Heavy => "Heavy",
            ArmorType::Shield => "Shield",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArmorData {
    pub armor_type: ArmorType,
    pub ac: i32,
    pub equipped: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GearData {
    pub quantity: u32,
}

/// A stored formula an item can roll directly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFormula<'a> {
    pub roll: &'a str,
    pub roll_type: RollType,
    pub target: Option<i32>,
    pub blind: bool,
}

/// Partial update written back through persistence.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cast: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<Tag>>,
    #[serde(flatten)]
    pub flags: DerivedFlags,
}

impl ItemPatch {
    pub fn cast(count: i32) -> Self {
        Self {
            cast: Some(count),
            ..Self::default()
        }
    }
}

impl Item {
    pub fn new(name: impl Into<String>, kind: ItemKind) -> Self {
        Self {
            id: ItemId::new(),
            name: name.into(),
            description: String::new(),
            kind,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn is_spell(&self) -> bool {
        matches!(self.kind, ItemKind::Spell(_))
    }

    /// The formula `roll_formula` would use, if any.
    pub fn stored_formula(&self) -> Option<StoredFormula<'_>> {
        let (roll, roll_type, target, blind) = match &self.kind {
            ItemKind::Spell(s) => (&s.roll, s.roll_type, s.roll_target, s.blind),
            ItemKind::Ability(a) => (&a.roll, a.roll_type, a.roll_target, a.blind),
            ItemKind::Weapon(_) | ItemKind::Armor(_) | ItemKind::Gear(_) => return None,
        };
        let roll = roll.as_deref().map(str::trim).filter(|r| !r.is_empty())?;
        Some(StoredFormula {
            roll,
            roll_type,
            target,
            blind,
        })
    }

    /// Damage formula offered by the card, if any.
    pub fn damage(&self) -> Option<&str> {
        match &self.kind {
            ItemKind::Weapon(w) if !w.damage.trim().is_empty() => Some(w.damage.trim()),
            _ => None,
        }
    }

    pub fn save(&self) -> Option<SaveKind> {
        match &self.kind {
            ItemKind::Spell(s) => s.save,
            _ => None,
        }
    }

    /// Short labels shown under the item name.
    pub fn display_tags(&self, config: &SystemConfig) -> Vec<String> {
        let labels = match &self.kind {
            ItemKind::Weapon(w) => std::iter::once(w.damage.clone())
                .chain(w.tags.iter().map(|t| t.value.clone()))
                .collect(),
            ItemKind::Armor(a) => vec![a.armor_type.name().to_string()],
            ItemKind::Gear(_) => Vec::new(),
            ItemKind::Spell(s) => vec![
                s.class.clone(),
                s.range.clone(),
                s.duration.clone(),
                s.save
                    .map(|k| config.saves.get(k).to_string())
                    .unwrap_or_default(),
                s.roll.clone().unwrap_or_default(),
            ],
            ItemKind::Ability(a) => {
                let mut roll = a.roll.clone().unwrap_or_default();
                if !roll.is_empty() {
                    roll.push_str(config.roll_types.get(a.roll_type));
                }
                if let Some(target) = a.roll_target {
                    roll.push_str(&target.to_string());
                }
                vec![a.requirements.clone(), roll]
            }
        };
        labels.into_iter().filter(|l| !l.is_empty()).collect()
    }

    /// Properties listed in the chat card footer.
    pub fn chat_properties(&self) -> Vec<String> {
        let props = match &self.kind {
            ItemKind::Weapon(w) => vec![w.qualities.clone(), equipped_label(w.equipped)],
            ItemKind::Spell(s) => vec![
                format!("{} {}", s.class, s.lvl).trim().to_string(),
                s.range.clone(),
                s.duration.clone(),
            ],
            ItemKind::Armor(a) => vec![equipped_label(a.equipped)],
            ItemKind::Ability(_) | ItemKind::Gear(_) => Vec::new(),
        };
        props.into_iter().filter(|p| !p.is_empty()).collect()
    }

    /// Apply a persisted patch. Fields a kind does not have are ignored.
    pub fn apply_patch(&mut self, patch: &ItemPatch) {
        match &mut self.kind {
            ItemKind::Spell(s) => {
                if let Some(cast) = patch.cast {
                    s.cast = cast;
                }
            }
            ItemKind::Weapon(w) => {
                if let Some(tags) = &patch.tags {
                    w.tags = tags.clone();
                }
                if let Some(melee) = patch.flags.melee {
                    w.melee = melee;
                }
                if let Some(missile) = patch.flags.missile {
                    w.missile = missile;
                }
                if let Some(slow) = patch.flags.slow {
                    w.slow = slow;
                }
            }
            ItemKind::Ability(_) | ItemKind::Armor(_) | ItemKind::Gear(_) => {}
        }
    }
}

fn equipped_label(equipped: bool) -> String {
    if equipped { "Equipped" } else { "Not Equipped" }.to_string()
}
