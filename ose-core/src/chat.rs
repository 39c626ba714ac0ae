//! Chat cards, message requests and roll-mode visibility.

use crate::actor::{SaveKind, TokenAddress};
use crate::dice::RollOutcome;
use crate::ids::{ActorId, ItemId, MessageId, UserId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Who receives a roll's chat output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RollMode {
    #[default]
    Public,
    GmRoll,
    BlindRoll,
    SelfRoll,
}

#[derive(Debug, Error)]
#[error("Unknown roll mode: {0}")]
pub struct UnknownRollMode(pub String);

impl FromStr for RollMode {
    type Err = UnknownRollMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "public" | "roll" => Ok(RollMode::Public),
            "gmroll" => Ok(RollMode::GmRoll),
            "blindroll" => Ok(RollMode::BlindRoll),
            "selfroll" => Ok(RollMode::SelfRoll),
            other => Err(UnknownRollMode(other.to_string())),
        }
    }
}

impl fmt::Display for RollMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let key = match self {
            RollMode::Public => "public",
            RollMode::GmRoll => "gmroll",
            RollMode::BlindRoll => "blindroll",
            RollMode::SelfRoll => "selfroll",
        };
        write!(f, "{key}")
    }
}

/// Recipients of a message. An empty whisper list means everyone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Visibility {
    pub whisper: Vec<UserId>,
    /// Hidden from the roller as well.
    pub blind: bool,
}

impl Visibility {
    /// Apply a roll mode for `user`. GM modes whisper to `gms`.
    pub fn for_roll_mode(mode: RollMode, user: UserId, gms: &[UserId]) -> Self {
        match mode {
            RollMode::Public => Self::default(),
            RollMode::GmRoll => Self {
                whisper: gms.to_vec(),
                blind: false,
            },
            RollMode::BlindRoll => Self {
                whisper: gms.to_vec(),
                blind: true,
            },
            RollMode::SelfRoll => Self {
                whisper: vec![user],
                blind: false,
            },
        }
    }

    pub fn is_public(&self) -> bool {
        self.whisper.is_empty() && !self.blind
    }
}

/// The actor a message speaks as.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Speaker {
    pub actor: Option<ActorId>,
    pub token: Option<TokenAddress>,
    pub alias: String,
}

/// Addressing embedded in a card when it is created. Never mutated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatCardAddress {
    pub actor_id: ActorId,
    pub token: Option<TokenAddress>,
    pub item_id: ItemId,
}

impl ChatCardAddress {
    pub fn new(actor_id: ActorId, token: Option<TokenAddress>, item_id: ItemId) -> Self {
        Self {
            actor_id,
            token,
            item_id,
        }
    }

    /// Build from card data attributes. A malformed token key is treated
    /// as absent; malformed actor or item ids give `None`.
    pub fn from_dataset(actor_id: &str, token_key: Option<&str>, item_id: &str) -> Option<Self> {
        Some(Self {
            actor_id: actor_id.parse().ok()?,
            token: token_key.and_then(TokenAddress::parse_key),
            item_id: item_id.parse().ok()?,
        })
    }
}

/// Data for an item card. Rendering to markup is the host's job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatCard {
    pub address: ChatCardAddress,
    pub actor_name: String,
    pub item_name: String,
    pub description: String,
    pub properties: Vec<String>,
    pub tags: Vec<String>,
    pub has_damage: bool,
    pub save: Option<SaveKind>,
    pub is_spell: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MessageContent {
    Card(ChatCard),
    Roll(Box<RollOutcome>),
}

/// A request to post a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRequest {
    pub author: UserId,
    pub speaker: Speaker,
    pub content: MessageContent,
    pub visibility: Visibility,
}

/// A posted message as the chat log stores it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: MessageId,
    pub author: UserId,
    pub speaker: Speaker,
    pub content: MessageContent,
    pub visibility: Visibility,
}

impl ChatMessage {
    pub fn from_request(id: MessageId, request: MessageRequest) -> Self {
        Self {
            id,
            author: request.author,
            speaker: request.speaker,
            content: request.content,
            visibility: request.visibility,
        }
    }

    /// The card address, when this message is an item card.
    pub fn card_address(&self) -> Option<ChatCardAddress> {
        match &self.content {
            MessageContent::Card(card) => Some(card.address),
            MessageContent::Roll(_) => None,
        }
    }

    pub fn is_author(&self, user: UserId) -> bool {
        self.author == user
    }
}
