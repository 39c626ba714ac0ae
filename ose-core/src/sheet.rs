//! Tag edits from the item sheet, written back through persistence.

use crate::actor::Actor;
use crate::item::{Item, ItemKind, ItemPatch};
use crate::ports::{Persistence, PersistenceError};
use crate::tags::TagCodec;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum SheetError {
    #[error("{0} does not carry tags")]
    NotTaggable(String),

    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),
}

/// Tag editing for items owned by an actor.
pub struct ItemSheet {
    codec: TagCodec,
    persistence: Arc<dyn Persistence>,
}

impl ItemSheet {
    pub fn new(codec: TagCodec, persistence: Arc<dyn Persistence>) -> Self {
        Self { codec, persistence }
    }

    /// Append tags and switch on any flags they imply.
    pub async fn push_tags<S: AsRef<str> + Sync>(
        &self,
        owner: &Actor,
        item: &Item,
        raw_values: &[S],
    ) -> Result<Item, SheetError> {
        let ItemKind::Weapon(weapon) = &item.kind else {
            return Err(SheetError::NotTaggable(item.name.clone()));
        };

        let update = self.codec.add_tags(&weapon.tags, raw_values);
        debug!(item = %item.name, added = raw_values.len(), flags = ?update.flags, "tags pushed");
        let patch = ItemPatch {
            tags: Some(update.tags),
            flags: update.flags,
            ..ItemPatch::default()
        };
        Ok(self.persistence.update_item(owner, item.id, &patch).await?)
    }

    /// Remove every tag with `value`. Flags set earlier stay set.
    pub async fn pop_tag(&self, owner: &Actor, item: &Item, value: &str) -> Result<Item, SheetError> {
        let ItemKind::Weapon(weapon) = &item.kind else {
            return Err(SheetError::NotTaggable(item.name.clone()));
        };

        let patch = ItemPatch {
            tags: Some(self.codec.remove_tag(&weapon.tags, value)),
            ..ItemPatch::default()
        };
        Ok(self.persistence.update_item(owner, item.id, &patch).await?)
    }
}
