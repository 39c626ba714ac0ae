//! Resolves card addresses back to live documents.
//!
//! Every lookup answers `None` on failure. Host errors are logged and
//! treated like a missing document so a stale card can never crash the
//! caller.

use crate::actor::{Actor, TokenAddress};
use crate::chat::{ChatCardAddress, ChatMessage};
use crate::ids::{ActorId, ItemId, MessageId};
use crate::item::Item;
use crate::ports::{ChatTransport, Persistence};
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Clone)]
pub struct ChatCardRegistry {
    persistence: Arc<dyn Persistence>,
    chat: Arc<dyn ChatTransport>,
}

impl ChatCardRegistry {
    pub fn new(persistence: Arc<dyn Persistence>, chat: Arc<dyn ChatTransport>) -> Self {
        Self { persistence, chat }
    }

    /// The persisted message behind a card.
    pub async fn message(&self, id: MessageId) -> Option<ChatMessage> {
        match self.chat.get_message(id).await {
            Ok(message) => message,
            Err(e) => {
                warn!(message = %id, error = %e, "chat lookup failed");
                None
            }
        }
    }

    /// The address embedded in a card message.
    pub async fn address(&self, id: MessageId) -> Option<ChatCardAddress> {
        self.message(id).await?.card_address()
    }

    /// Resolve the acting actor, preferring the token when the card has one.
    pub async fn resolve_actor(&self, address: &ChatCardAddress) -> Option<Actor> {
        if let Some(token) = address.token {
            if let Some(actor) = self.resolve_token_actor(token).await {
                return Some(actor);
            }
            debug!(token = %token.key(), "token unresolved, falling back to actor id");
        }

        self.actor(address.actor_id).await
    }

    /// Direct actor lookup by id.
    pub async fn actor(&self, id: ActorId) -> Option<Actor> {
        match self.persistence.get_actor(id).await {
            Ok(actor) => actor,
            Err(e) => {
                warn!(actor = %id, error = %e, "actor lookup failed");
                None
            }
        }
    }

    /// Scene, then token, then the token's (possibly synthetic) actor.
    pub async fn resolve_token_actor(&self, address: TokenAddress) -> Option<Actor> {
        let scene = match self.persistence.get_scene(address.scene_id).await {
            Ok(Some(scene)) => scene,
            Ok(None) => return None,
            Err(e) => {
                warn!(scene = %address.scene_id, error = %e, "scene lookup failed");
                return None;
            }
        };

        let token = match self
            .persistence
            .get_token_in_scene(&scene, address.token_id)
            .await
        {
            Ok(Some(token)) => token,
            Ok(None) => return None,
            Err(e) => {
                warn!(token = %address.token_id, error = %e, "token lookup failed");
                return None;
            }
        };

        let base = match self.persistence.get_actor(token.actor_id?).await {
            Ok(actor) => actor?,
            Err(e) => {
                warn!(token = %address.token_id, error = %e, "token actor lookup failed");
                return None;
            }
        };
        Some(token.synthesize_actor(base, scene.id))
    }

    /// An item owned by the resolved actor.
    pub async fn resolve_item(&self, actor: &Actor, item_id: ItemId) -> Option<Item> {
        match self.persistence.get_owned_item(actor, item_id).await {
            Ok(item) => item,
            Err(e) => {
                warn!(actor = %actor.id, item = %item_id, error = %e, "item lookup failed");
                None
            }
        }
    }
}
