//! Boundaries to the host: document storage, dice, chat and notifications.
//!
//! Lookups return `Ok(None)` for missing documents; `Err` is reserved for
//! the host failing to answer at all.

use crate::actor::{Actor, Scene, TokenData};
use crate::chat::{ChatMessage, MessageRequest};
use crate::dice::{DiceError, RollOutcome, RollRequest};
use crate::ids::{ActorId, ItemId, MessageId, SceneId, TokenId};
use crate::item::{Item, ItemPatch};
use async_trait::async_trait;
use thiserror::Error;

/// Errors from the host document layer.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("Document not found: {0}")]
    Missing(String),

    #[error("Update rejected: {0}")]
    Rejected(String),

    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait Persistence: Send + Sync {
    async fn get_actor(&self, id: ActorId) -> Result<Option<Actor>, PersistenceError>;

    async fn get_scene(&self, id: SceneId) -> Result<Option<Scene>, PersistenceError>;

    async fn get_token_in_scene(
        &self,
        scene: &Scene,
        id: TokenId,
    ) -> Result<Option<TokenData>, PersistenceError> {
        Ok(scene.token(id).cloned())
    }

    async fn get_owned_item(
        &self,
        actor: &Actor,
        id: ItemId,
    ) -> Result<Option<Item>, PersistenceError> {
        Ok(actor.owned_item(id).cloned())
    }

    /// Write a patch to an owned item and return the updated item.
    async fn update_item(
        &self,
        owner: &Actor,
        item: ItemId,
        patch: &ItemPatch,
    ) -> Result<Item, PersistenceError>;
}

#[async_trait]
pub trait DiceEvaluator: Send + Sync {
    async fn roll(&self, request: RollRequest) -> Result<RollOutcome, DiceError>;
}

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("Message rejected: {0}")]
    Rejected(String),

    #[error("Chat unavailable: {0}")]
    Unavailable(String),
}

/// The chat log: posting and reading persisted messages.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn create_message(&self, request: MessageRequest) -> Result<MessageId, ChatError>;

    async fn get_message(&self, id: MessageId) -> Result<Option<ChatMessage>, ChatError>;
}

/// User-facing notifications.
pub trait Notifier: Send + Sync {
    fn error(&self, message: &str);
    fn warn(&self, message: &str);
}
