//! Follow-up actions clicked on a posted item card.
//!
//! A click moves through validation (action, address, permission),
//! resolution (actor, item, targets) and execution (one roll, or one save
//! per target in order). The button is disabled for the whole run and
//! re-enabled on every exit path, including panics. That flag is the only
//! re-entrancy guard: it is per button, so separate cards run
//! independently.
//!
//! Missing documents raise an error notification and empty save targets a
//! warning. Unauthorized clicks are dropped without a word.

use crate::actor::{Actor, SaveKind, TokenAddress};
use crate::chat::ChatCardAddress;
use crate::dice::RollOutcome;
use crate::ids::{ActorId, ItemId, MessageId, UserId};
use crate::ports::Notifier;
use crate::registry::ChatCardRegistry;
use crate::resolver::{ActionResolver, ResolveError, RollContext};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// A document a card pointed at that could not be found.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NotFound {
    #[error("The chat message {0} is not an item card")]
    Card(MessageId),

    #[error("The requested actor {0} no longer exists")]
    Actor(ActorId),

    #[error("The requested item {item} no longer exists on Actor {actor}")]
    Item { item: ItemId, actor: String },
}

/// Why a click did not produce rolls.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    NotFound(#[from] NotFound),

    #[error("User {user} may not perform {action} on this card")]
    Permission { user: UserId, action: ActionKind },

    #[error("You must have one or more controlled Tokens in order to use this option.")]
    EmptyTargets,

    #[error("Unknown card action: {0}")]
    UnknownAction(String),

    #[error("Save button has no save kind")]
    MissingSaveKind,

    #[error("Unknown save kind: {0}")]
    UnknownSave(String),

    #[error(transparent)]
    Resolve(#[from] ResolveError),
}

/// What a card button does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Damage,
    Formula,
    Save,
}

impl FromStr for ActionKind {
    type Err = DispatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "damage" => Ok(ActionKind::Damage),
            "formula" => Ok(ActionKind::Formula),
            "save" => Ok(ActionKind::Save),
            other => Err(DispatchError::UnknownAction(other.to_string())),
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let key = match self {
            ActionKind::Damage => "damage",
            ActionKind::Formula => "formula",
            ActionKind::Save => "save",
        };
        write!(f, "{key}")
    }
}

/// A button on a posted card, with its `data-action` / `data-save` values.
#[derive(Debug)]
pub struct CardButton {
    action: String,
    save: Option<String>,
    disabled: AtomicBool,
}

impl CardButton {
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            save: None,
            disabled: AtomicBool::new(false),
        }
    }

    pub fn with_save(mut self, save: impl Into<String>) -> Self {
        self.save = Some(save.into());
        self
    }

    pub fn action(&self) -> &str {
        &self.action
    }

    pub fn save(&self) -> Option<&str> {
        self.save.as_deref()
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled.load(Ordering::Acquire)
    }

    /// Disable the button, or `None` if it already is.
    pub fn try_disable(&self) -> Option<ButtonGuard<'_>> {
        self.disabled
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| ButtonGuard { button: self })
    }
}

/// Re-enables its button when dropped.
#[derive(Debug)]
pub struct ButtonGuard<'a> {
    button: &'a CardButton,
}

impl Drop for ButtonGuard<'_> {
    fn drop(&mut self) {
        self.button.disabled.store(false, Ordering::Release);
    }
}

/// A click on a button inside a persisted card message.
#[derive(Debug, Clone)]
pub struct CardClick {
    pub message: MessageId,
    pub button: Arc<CardButton>,
}

impl CardClick {
    pub fn new(message: MessageId, button: Arc<CardButton>) -> Self {
        Self { message, button }
    }
}

/// The clicking user and their view of the table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserContext {
    pub roll: RollContext,
    pub is_gm: bool,
    /// Assigned default character.
    pub character: Option<ActorId>,
    /// Tokens currently selected on screen, in selection order.
    pub controlled: Vec<TokenAddress>,
}

impl UserContext {
    /// A non-GM user with no default character and nothing selected.
    pub fn new(roll: RollContext) -> Self {
        Self {
            roll,
            is_gm: false,
            character: None,
            controlled: Vec::new(),
        }
    }

    /// Mark the user as a GM.
    pub fn gm(mut self) -> Self {
        self.is_gm = true;
        self
    }

    /// Set the default character used when nothing is selected.
    pub fn with_character(mut self, character: ActorId) -> Self {
        self.character = Some(character);
        self
    }

    /// Set the selected tokens, in selection order.
    pub fn controlling(mut self, tokens: Vec<TokenAddress>) -> Self {
        self.controlled = tokens;
        self
    }

    /// The clicking user.
    pub fn user(&self) -> UserId {
        self.roll.user
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    /// The button was already running; the click did nothing.
    Busy,
    /// Rolls made, in order.
    Rolled(Vec<RollOutcome>),
}

/// Validated click, ready to resolve.
struct Authorized {
    action: ActionKind,
    save: Option<SaveKind>,
    address: ChatCardAddress,
}

/// Runs card button clicks from validation through to the rolls.
pub struct CardActionDispatcher {
    registry: ChatCardRegistry,
    resolver: ActionResolver,
    notifier: Arc<dyn Notifier>,
}

impl CardActionDispatcher {
    pub fn new(
        registry: ChatCardRegistry,
        resolver: ActionResolver,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            registry,
            resolver,
            notifier,
        }
    }

    /// Handle one click. Notifications are raised here; the error is still
    /// returned so callers can log it.
    pub async fn handle_click(
        &self,
        click: &CardClick,
        user: &UserContext,
    ) -> Result<DispatchOutcome, DispatchError> {
        let Some(guard) = click.button.try_disable() else {
            debug!(message = %click.message, "button busy, click ignored");
            return Ok(DispatchOutcome::Busy);
        };

        let result = self.run(click, user).await;
        drop(guard);

        if let Err(e) = &result {
            self.report(e);
        }
        result
    }

    async fn run(
        &self,
        click: &CardClick,
        user: &UserContext,
    ) -> Result<DispatchOutcome, DispatchError> {
        let request = self.validate(click, user).await?;
        debug!(action = %request.action, user = %user.user(), "click authorized");

        let actor = self
            .registry
            .resolve_actor(&request.address)
            .await
            .ok_or(NotFound::Actor(request.address.actor_id))?;
        let item = self
            .registry
            .resolve_item(&actor, request.address.item_id)
            .await
            .ok_or_else(|| NotFound::Item {
                item: request.address.item_id,
                actor: actor.name.clone(),
            })?;

        let ctx = &user.roll;
        let outcomes = match (request.action, request.save) {
            (ActionKind::Damage, _) => vec![self.resolver.roll_damage(&actor, &item, ctx).await?],
            (ActionKind::Formula, _) => {
                vec![self.resolver.roll_formula(&actor, &item, ctx).await?]
            }
            (ActionKind::Save, save) => {
                let save = save.ok_or(DispatchError::MissingSaveKind)?;
                let targets = self.resolve_targets(user).await;
                if targets.is_empty() {
                    return Err(DispatchError::EmptyTargets);
                }

                // One at a time, in selection order
                let mut outcomes = Vec::with_capacity(targets.len());
                for target in &targets {
                    outcomes.push(self.resolver.roll_save(target, save, ctx).await?);
                }
                outcomes
            }
        };

        info!(
            action = %request.action,
            item = %item.name,
            rolls = outcomes.len(),
            "card action complete"
        );
        Ok(DispatchOutcome::Rolled(outcomes))
    }

    async fn validate(
        &self,
        click: &CardClick,
        user: &UserContext,
    ) -> Result<Authorized, DispatchError> {
        let action: ActionKind = click.button.action().parse()?;
        let save = match (action, click.button.save()) {
            (ActionKind::Save, None) => return Err(DispatchError::MissingSaveKind),
            (ActionKind::Save, Some(raw)) => Some(
                raw.parse::<SaveKind>()
                    .map_err(|_| DispatchError::UnknownSave(raw.to_string()))?,
            ),
            _ => None,
        };

        let message = self
            .registry
            .message(click.message)
            .await
            .ok_or(NotFound::Card(click.message))?;

        // Anyone may save; everything else is for the GM or the card's author
        let authorized =
            action == ActionKind::Save || user.is_gm || message.is_author(user.user());
        if !authorized {
            return Err(DispatchError::Permission {
                user: user.user(),
                action,
            });
        }

        let address = message
            .card_address()
            .ok_or(NotFound::Card(click.message))?;
        Ok(Authorized {
            action,
            save,
            address,
        })
    }

    /// Selected tokens with an actor; the default character only when
    /// nothing is selected.
    pub async fn resolve_targets(&self, user: &UserContext) -> Vec<Actor> {
        if user.controlled.is_empty() {
            return match user.character {
                Some(id) => self.registry.actor(id).await.into_iter().collect(),
                None => Vec::new(),
            };
        }

        let mut targets = Vec::with_capacity(user.controlled.len());
        for token in &user.controlled {
            if let Some(actor) = self.registry.resolve_token_actor(*token).await {
                targets.push(actor);
            }
        }
        targets
    }

    fn report(&self, error: &DispatchError) {
        match error {
            DispatchError::NotFound(e) => {
                warn!(error = %e, "card action aborted");
                self.notifier.error(&e.to_string());
            }
            DispatchError::EmptyTargets => {
                self.notifier.warn(&error.to_string());
            }
            DispatchError::Permission { user, action } => {
                debug!(%user, %action, "card action rejected");
            }
            other => {
                warn!(error = %other, "card action failed");
            }
        }
    }
}
