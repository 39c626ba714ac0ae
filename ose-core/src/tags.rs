//! Item tag parsing and capability flag derivation.
//!
//! Tags are short free-text descriptors ("Melee", "Slow", "R30") attached
//! to an item, optionally annotated with a parenthetical note:
//! `"Melee (close range)"` stores value `Melee` and title `close range`.
//!
//! Certain tag values switch on boolean capability flags on the item.
//! The derivation is one-way: adding a keyword tag sets its flag, but
//! removing the tag leaves the flag as it was. Flags stay editable on
//! their own, so a removal does not second-guess a manual setting.

use crate::config::TagKeywords;
use serde::{Deserialize, Serialize};

/// A descriptor attached to an item.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tag {
    /// Annotation shown on hover; equals `value` when none was given.
    pub title: String,
    /// Canonical descriptor.
    pub value: String,
}

impl Tag {
    /// A tag whose title is its value.
    pub fn new(value: impl Into<String>) -> Self {
        let value = value.into();
        Self {
            title: value.clone(),
            value,
        }
    }

    /// A tag with a separate annotation.
    pub fn with_title(value: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            value: value.into(),
        }
    }
}

/// Flags switched on by keyword tags. `None` means "leave unchanged".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DerivedFlags {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub melee: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub missile: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slow: Option<bool>,
}

impl DerivedFlags {
    pub fn is_empty(&self) -> bool {
        self.melee.is_none() && self.missile.is_none() && self.slow.is_none()
    }
}

/// Result of appending tags: the merged list and the flags to merge into
/// the item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagUpdate {
    pub tags: Vec<Tag>,
    pub flags: DerivedFlags,
}

/// Parse a raw tag string.
///
/// The first non-empty `(...)` group becomes the title and everything
/// before it the value. Any input is accepted.
pub fn parse_tag_input(raw: &str) -> Tag {
    match find_annotation(raw) {
        Some((start, note)) => Tag::with_title(raw[..start].trim(), note.trim()),
        None => Tag::new(raw.trim()),
    }
}

fn find_annotation(raw: &str) -> Option<(usize, &str)> {
    raw.match_indices('(').find_map(|(start, _)| {
        let rest = &raw[start + 1..];
        match rest.find(')') {
            Some(end) if end > 0 => Some((start, &rest[..end])),
            _ => None,
        }
    })
}

/// Tag operations bound to a keyword table.
#[derive(Debug, Clone, Default)]
pub struct TagCodec {
    keywords: TagKeywords,
}

impl TagCodec {
    pub fn new(keywords: TagKeywords) -> Self {
        Self { keywords }
    }

    pub fn keywords(&self) -> &TagKeywords {
        &self.keywords
    }

    /// Derive flags from tag values. Unrecognized values contribute nothing.
    pub fn derive_flags<I, S>(&self, values: I) -> DerivedFlags
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut flags = DerivedFlags::default();
        for value in values {
            let value = value.as_ref();
            if value == self.keywords.melee {
                flags.melee = Some(true);
            }
            if value == self.keywords.missile {
                flags.missile = Some(true);
            }
            if value == self.keywords.slow {
                flags.slow = Some(true);
            }
        }
        flags
    }

    /// Append parsed tags to `existing`. Duplicates are kept.
    pub fn add_tags<S: AsRef<str>>(&self, existing: &[Tag], raw_values: &[S]) -> TagUpdate {
        let added: Vec<Tag> = raw_values
            .iter()
            .map(|raw| parse_tag_input(raw.as_ref()))
            .collect();
        let flags = self.derive_flags(added.iter().map(|t| t.value.as_str()));

        let mut tags = existing.to_vec();
        tags.extend(added);
        TagUpdate { tags, flags }
    }

    /// Drop every tag whose value equals `value`. Flags are untouched.
    pub fn remove_tag(&self, existing: &[Tag], value: &str) -> Vec<Tag> {
        existing
            .iter()
            .filter(|t| t.value != value)
            .cloned()
            .collect()
    }
}
