//! Item rolls and chat-card actions for an old-school fantasy RPG system.
//!
//! This crate provides:
//! - Tag parsing with derived weapon flags (melee, missile, slow)
//! - Roll resolution for weapons, spells and abilities, including the
//!   melee/missile choice for player characters
//! - Chat-card addressing back to actors, tokens and items
//! - Dispatch of card button clicks (damage, formula, save) with
//!   permission checks and per-button re-entrancy protection
//!
//! The host's storage, dice, chat log and notifications are reached
//! through the traits in [`ports`].
//!
//! # Quick Start
//!
//! ```ignore
//! use ose_core::testing::TestHarness;
//! use ose_core::{CardButton, CardClick};
//! use std::sync::Arc;
//!
//! let harness = TestHarness::new();
//! let message = harness.post_card(&actor, &item, harness.player);
//! let click = CardClick::new(message, Arc::new(CardButton::new("formula")));
//!
//! let outcome = harness
//!     .dispatcher()
//!     .handle_click(&click, &harness.player_context())
//!     .await?;
//! ```

pub mod actor;
pub mod chat;
pub mod config;
pub mod dice;
pub mod dispatch;
pub mod ids;
pub mod item;
pub mod ports;
pub mod registry;
pub mod resolver;
pub mod sheet;
pub mod tags;
pub mod testing;

// Primary public API
pub use actor::{Actor, ActorKind, SaveKind, TokenAddress};
pub use chat::{ChatCardAddress, RollMode};
pub use config::SystemConfig;
pub use dice::{RollOutcome, RollRequest, StandardDice};
pub use dispatch::{
    ActionKind, CardActionDispatcher, CardButton, CardClick, DispatchError, DispatchOutcome,
    UserContext,
};
pub use item::{Item, ItemKind};
pub use registry::ChatCardRegistry;
pub use resolver::{ActionResolver, AttackPlan, PendingChoice, RangeChoice, ResolveError, RollContext};
pub use tags::{parse_tag_input, Tag, TagCodec};
