//! Turns an item into a roll.
//!
//! Request builders are pure: they look only at the actor, the item and
//! the caller's [`RollContext`]. The async operations on
//! [`ActionResolver`] hand those requests to the dice evaluator and post
//! the results.
//!
//! A player character swinging a weapon usable both in melee and at range
//! has to pick one. That pick is returned as a [`PendingChoice`] and the
//! caller completes it with [`PendingChoice::choose`] followed by
//! [`ActionResolver::complete_roll`].

use crate::actor::{Actor, SaveKind};
use crate::chat::{
    ChatCard, ChatCardAddress, MessageContent, MessageRequest, RollMode, Speaker, Visibility,
};
use crate::config::SystemConfig;
use crate::dice::{DiceError, RollData, RollOutcome, RollRequest, RollType};
use crate::ids::{MessageId, UserId};
use crate::item::{Item, ItemKind, ItemPatch, WeaponData};
use crate::ports::{ChatError, ChatTransport, DiceEvaluator, Persistence, PersistenceError};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("{item} does not have a formula to roll")]
    MissingFormula { item: String },

    #[error("{item} has no casts remaining")]
    NoCastsRemaining { item: String },

    #[error("{item} is not a {expected}")]
    WrongKind { item: String, expected: &'static str },

    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    #[error("Dice error: {0}")]
    Dice(#[from] DiceError),

    #[error("Chat error: {0}")]
    Chat(#[from] ChatError),
}

/// Which attack profile a weapon roll uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttackKind {
    Melee,
    Missile,
    /// Neither flag set.
    Raw,
}

/// The two answers to a melee/missile prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RangeChoice {
    #[default]
    Melee,
    Missile,
}

impl From<RangeChoice> for AttackKind {
    fn from(choice: RangeChoice) -> Self {
        match choice {
            RangeChoice::Melee => AttackKind::Melee,
            RangeChoice::Missile => AttackKind::Missile,
        }
    }
}

/// Per-call state that would otherwise come from host globals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RollContext {
    pub user: UserId,
    pub gm_users: Vec<UserId>,
    pub roll_mode: RollMode,
    pub skip_dialog: bool,
}

impl RollContext {
    pub fn new(user: UserId) -> Self {
        Self {
            user,
            gm_users: Vec::new(),
            roll_mode: RollMode::Public,
            skip_dialog: false,
        }
    }

    pub fn with_gm_users(mut self, gm_users: Vec<UserId>) -> Self {
        self.gm_users = gm_users;
        self
    }

    pub fn with_roll_mode(mut self, roll_mode: RollMode) -> Self {
        self.roll_mode = roll_mode;
        self
    }

    pub fn skipping_dialog(mut self) -> Self {
        self.skip_dialog = true;
        self
    }

    pub fn visibility(&self) -> Visibility {
        Visibility::for_roll_mode(self.roll_mode, self.user, &self.gm_users)
    }
}

/// A weapon attack waiting on a melee/missile decision.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingChoice {
    actor: Actor,
    item: Item,
    weapon: WeaponData,
    ctx: RollContext,
}

impl PendingChoice {
    pub fn options(&self) -> [RangeChoice; 2] {
        [RangeChoice::Melee, RangeChoice::Missile]
    }

    pub fn default_option(&self) -> RangeChoice {
        RangeChoice::Melee
    }

    pub fn item(&self) -> &Item {
        &self.item
    }

    pub fn actor(&self) -> &Actor {
        &self.actor
    }

    pub fn context(&self) -> &RollContext {
        &self.ctx
    }

    /// Settle the choice and build the attack.
    pub fn choose(self, choice: RangeChoice) -> RollRequest {
        attack_request(&self.actor, &self.item, &self.weapon, choice.into(), &self.ctx)
    }
}

/// Outcome of planning a weapon attack.
#[derive(Debug, Clone, PartialEq)]
pub enum AttackPlan {
    Ready(RollRequest),
    Choose(PendingChoice),
}

/// Outcome of rolling an item from a sheet.
#[derive(Debug, Clone, PartialEq)]
pub enum ItemRoll {
    Rolled(Box<RollOutcome>),
    Pending(PendingChoice),
    Card(MessageId),
}

fn speaker(actor: &Actor) -> Speaker {
    Speaker {
        actor: Some(actor.id),
        token: actor.token,
        alias: actor.name.clone(),
    }
}

/// Pick the attack profile for a weapon.
pub fn attack_kind(actor: &Actor, weapon: &WeaponData) -> Option<AttackKind> {
    if actor.is_character() && weapon.melee && weapon.missile {
        return None;
    }
    Some(if weapon.melee {
        AttackKind::Melee
    } else if weapon.missile {
        AttackKind::Missile
    } else {
        AttackKind::Raw
    })
}

/// Decide the attack for a weapon, deferring to the caller when ambiguous.
pub fn plan_attack(actor: &Actor, item: &Item, ctx: &RollContext) -> Result<AttackPlan, ResolveError> {
    let ItemKind::Weapon(weapon) = &item.kind else {
        return Err(ResolveError::WrongKind {
            item: item.name.clone(),
            expected: "weapon",
        });
    };

    match attack_kind(actor, weapon) {
        Some(kind) => {
            debug!(item = %item.name, ?kind, "attack resolved");
            Ok(AttackPlan::Ready(attack_request(actor, item, weapon, kind, ctx)))
        }
        None => {
            debug!(item = %item.name, "attack needs melee/missile choice");
            Ok(AttackPlan::Choose(PendingChoice {
                actor: actor.clone(),
                item: item.clone(),
                weapon: weapon.clone(),
                ctx: ctx.clone(),
            }))
        }
    }
}

fn attack_request(
    actor: &Actor,
    item: &Item,
    weapon: &WeaponData,
    kind: AttackKind,
    ctx: &RollContext,
) -> RollRequest {
    let mut parts = vec!["1d20".to_string()];
    // Missile attacks never add the weapon bonus
    let mods = match kind {
        AttackKind::Melee => vec![actor.attack_mods.melee, weapon.bonus],
        AttackKind::Missile => vec![actor.attack_mods.missile],
        AttackKind::Raw => vec![weapon.bonus],
    };
    parts.extend(mods.into_iter().filter(|m| *m != 0).map(|m| m.to_string()));

    RollRequest {
        parts,
        data: RollData {
            roll_type: RollType::Result,
            target: None,
            attack: Some(kind),
            damage: Some(weapon.damage.clone()),
            save: None,
        },
        speaker: speaker(actor),
        flavor: format!("{} attacks with {}", actor.name, item.name),
        title: format!("{} Attack", item.name),
        skip_dialog: ctx.skip_dialog,
        visibility: ctx.visibility(),
    }
}

/// Roll an item's stored formula without prompting.
pub fn formula_request(actor: &Actor, item: &Item, ctx: &RollContext) -> Result<RollRequest, ResolveError> {
    let formula = item
        .stored_formula()
        .ok_or_else(|| ResolveError::MissingFormula {
            item: item.name.clone(),
        })?;

    let mut visibility = ctx.visibility();
    if formula.blind {
        visibility.blind = true;
        if visibility.whisper.is_empty() {
            visibility.whisper = ctx.gm_users.clone();
        }
    }

    let label = format!("{} formula", item.name);
    Ok(RollRequest {
        parts: vec![formula.roll.to_string()],
        data: RollData {
            roll_type: formula.roll_type,
            target: formula.target,
            ..RollData::default()
        },
        speaker: speaker(actor),
        flavor: label.clone(),
        title: label,
        skip_dialog: true,
        visibility,
    })
}

/// Roll an item's damage.
pub fn damage_request(actor: &Actor, item: &Item, ctx: &RollContext) -> Result<RollRequest, ResolveError> {
    let damage = item.damage().ok_or_else(|| ResolveError::MissingFormula {
        item: item.name.clone(),
    })?;

    Ok(RollRequest {
        parts: vec![damage.to_string()],
        data: RollData {
            damage: Some(damage.to_string()),
            ..RollData::default()
        },
        speaker: speaker(actor),
        flavor: format!("{} damage", item.name),
        title: format!("{} Damage", item.name),
        skip_dialog: ctx.skip_dialog,
        visibility: ctx.visibility(),
    })
}

/// Roll a saving throw: d20 at or above the actor's target.
pub fn save_request(
    actor: &Actor,
    save: SaveKind,
    config: &SystemConfig,
    ctx: &RollContext,
) -> RollRequest {
    let label = config.saves.get(save);
    RollRequest {
        parts: vec!["1d20".to_string()],
        data: RollData {
            roll_type: RollType::Above,
            target: Some(actor.saves.get(save)),
            save: Some(save),
            ..RollData::default()
        },
        speaker: speaker(actor),
        flavor: format!("{} saves versus {}", actor.name, label),
        title: format!("Save: {label}"),
        skip_dialog: true,
        visibility: ctx.visibility(),
    }
}

/// Card data for an item.
pub fn chat_card(actor: &Actor, item: &Item, config: &SystemConfig) -> ChatCard {
    ChatCard {
        address: ChatCardAddress::new(actor.id, actor.token, item.id),
        actor_name: actor.name.clone(),
        item_name: item.name.clone(),
        description: item.description.clone(),
        properties: item.chat_properties(),
        tags: item.display_tags(config),
        has_damage: item.damage().is_some(),
        save: item.save(),
        is_spell: item.is_spell(),
    }
}

/// Runs item rolls against the host.
#[derive(Clone)]
pub struct ActionResolver {
    config: SystemConfig,
    persistence: Arc<dyn Persistence>,
    dice: Arc<dyn DiceEvaluator>,
    chat: Arc<dyn ChatTransport>,
}

impl ActionResolver {
    pub fn new(
        config: SystemConfig,
        persistence: Arc<dyn Persistence>,
        dice: Arc<dyn DiceEvaluator>,
        chat: Arc<dyn ChatTransport>,
    ) -> Self {
        Self {
            config,
            persistence,
            dice,
            chat,
        }
    }

    pub fn config(&self) -> &SystemConfig {
        &self.config
    }

    /// Roll an item from a sheet. Weapons attack; everything else posts
    /// its card.
    pub async fn roll_item(
        &self,
        actor: &Actor,
        item: &Item,
        ctx: &RollContext,
    ) -> Result<ItemRoll, ResolveError> {
        if let ItemKind::Weapon(_) = item.kind {
            return match plan_attack(actor, item, ctx)? {
                AttackPlan::Ready(request) => {
                    let outcome = self.complete_roll(request, ctx).await?;
                    Ok(ItemRoll::Rolled(Box::new(outcome)))
                }
                AttackPlan::Choose(pending) => Ok(ItemRoll::Pending(pending)),
            };
        }
        let id = self.post_card(actor, item, ctx).await?;
        Ok(ItemRoll::Card(id))
    }

    /// Evaluate a request and post the result.
    pub async fn complete_roll(
        &self,
        request: RollRequest,
        ctx: &RollContext,
    ) -> Result<RollOutcome, ResolveError> {
        debug!(formula = %request.formula(), title = %request.title, "rolling");
        let outcome = self.dice.roll(request).await?;

        self.chat
            .create_message(MessageRequest {
                author: ctx.user,
                speaker: outcome.request.speaker.clone(),
                content: MessageContent::Roll(Box::new(outcome.clone())),
                visibility: outcome.request.visibility.clone(),
            })
            .await?;
        Ok(outcome)
    }

    /// Roll the item's stored formula and post the result.
    pub async fn roll_formula(
        &self,
        actor: &Actor,
        item: &Item,
        ctx: &RollContext,
    ) -> Result<RollOutcome, ResolveError> {
        let request = formula_request(actor, item, ctx)?;
        self.complete_roll(request, ctx).await
    }

    /// Roll the item's damage and post the result.
    pub async fn roll_damage(
        &self,
        actor: &Actor,
        item: &Item,
        ctx: &RollContext,
    ) -> Result<RollOutcome, ResolveError> {
        let request = damage_request(actor, item, ctx)?;
        self.complete_roll(request, ctx).await
    }

    /// Roll a saving throw for `actor` and post the result.
    pub async fn roll_save(
        &self,
        actor: &Actor,
        save: SaveKind,
        ctx: &RollContext,
    ) -> Result<RollOutcome, ResolveError> {
        let request = save_request(actor, save, &self.config, ctx);
        self.complete_roll(request, ctx).await
    }

    /// Post an item card.
    pub async fn post_card(
        &self,
        actor: &Actor,
        item: &Item,
        ctx: &RollContext,
    ) -> Result<MessageId, ResolveError> {
        let card = chat_card(actor, item, &self.config);
        let id = self
            .chat
            .create_message(MessageRequest {
                author: ctx.user,
                speaker: speaker(actor),
                content: MessageContent::Card(card),
                visibility: ctx.visibility(),
            })
            .await?;
        debug!(item = %item.name, message = %id, "card posted");
        Ok(id)
    }

    /// Spend one cast of a spell, then post its card.
    ///
    /// The decrement must be persisted before anything is rolled; if the
    /// write fails nothing is posted.
    pub async fn cast_spell(
        &self,
        actor: &Actor,
        item: &Item,
        ctx: &RollContext,
    ) -> Result<MessageId, ResolveError> {
        let ItemKind::Spell(spell) = &item.kind else {
            return Err(ResolveError::WrongKind {
                item: item.name.clone(),
                expected: "spell",
            });
        };
        if spell.cast <= 0 {
            return Err(ResolveError::NoCastsRemaining {
                item: item.name.clone(),
            });
        }

        let updated = self
            .persistence
            .update_item(actor, item.id, &ItemPatch::cast(spell.cast - 1))
            .await?;
        info!(actor = %actor.name, spell = %item.name, remaining = spell.cast - 1, "spell cast");

        self.post_card(actor, &updated, &ctx.clone().skipping_dialog())
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::{ActorKind, AttackMods};
    use crate::item::{AbilityData, SpellData};

    fn sword(melee: bool, missile: bool) -> Item {
        Item::new(
            "Spear",
            ItemKind::Weapon(WeaponData {
                damage: "1d6".to_string(),
                bonus: 1,
                melee,
                missile,
                ..WeaponData::default()
            }),
        )
    }

    fn fighter() -> Actor {
        Actor::new("Aldric", ActorKind::Character).with_attack_mods(AttackMods {
            melee: 2,
            missile: -1,
        })
    }

    fn ctx() -> RollContext {
        RollContext::new(UserId::new())
    }

    #[test]
    fn test_melee_only_resolves_without_choice() {
        let plan = plan_attack(&fighter(), &sword(true, false), &ctx()).unwrap();
        let AttackPlan::Ready(request) = plan else {
            panic!("expected ready attack");
        };
        assert_eq!(request.data.attack, Some(AttackKind::Melee));
        assert_eq!(request.parts, vec!["1d20", "2", "1"]);
        assert_eq!(request.data.damage.as_deref(), Some("1d6"));
    }

    #[test]
    fn test_both_flags_on_character_needs_choice() {
        let plan = plan_attack(&fighter(), &sword(true, true), &ctx()).unwrap();
        let AttackPlan::Choose(pending) = plan else {
            panic!("expected pending choice");
        };
        assert_eq!(pending.options(), [RangeChoice::Melee, RangeChoice::Missile]);
        assert_eq!(pending.default_option(), RangeChoice::Melee);

        // Missile drops the weapon bonus
        let request = pending.choose(RangeChoice::Missile);
        assert_eq!(request.data.attack, Some(AttackKind::Missile));
        assert_eq!(request.parts, vec!["1d20", "-1"]);
        assert_eq!(request.data.damage.as_deref(), Some("1d6"));
    }

    #[test]
    fn test_monster_never_gets_choice() {
        let goblin = Actor::new("Goblin", ActorKind::Monster);
        let plan = plan_attack(&goblin, &sword(true, true), &ctx()).unwrap();
        assert!(matches!(
            plan,
            AttackPlan::Ready(RollRequest { data: RollData { attack: Some(AttackKind::Melee), .. }, .. })
        ));

        let plan = plan_attack(&goblin, &sword(false, true), &ctx()).unwrap();
        let AttackPlan::Ready(request) = plan else {
            panic!("expected ready attack");
        };
        assert_eq!(request.data.attack, Some(AttackKind::Missile));
    }

    #[test]
    fn test_no_flags_is_raw() {
        assert_eq!(
            attack_kind(&fighter(), &WeaponData::default()),
            Some(AttackKind::Raw)
        );
    }

    #[test]
    fn test_plan_attack_rejects_non_weapon() {
        let item = Item::new("Torch", ItemKind::Ability(AbilityData::default()));
        assert!(matches!(
            plan_attack(&fighter(), &item, &ctx()),
            Err(ResolveError::WrongKind { expected: "weapon", .. })
        ));
    }

    #[test]
    fn test_formula_request() {
        let item = Item::new(
            "Open Doors",
            ItemKind::Ability(AbilityData {
                roll: Some("1d6".to_string()),
                roll_type: RollType::Below,
                roll_target: Some(2),
                ..AbilityData::default()
            }),
        );
        let request = formula_request(&fighter(), &item, &ctx()).unwrap();
        assert_eq!(request.parts, vec!["1d6"]);
        assert_eq!(request.data.roll_type, RollType::Below);
        assert_eq!(request.data.target, Some(2));
        assert!(request.skip_dialog);
        assert_eq!(request.flavor, "Open Doors formula");
    }

    #[test]
    fn test_formula_request_missing() {
        let item = Item::new("Light", ItemKind::Spell(SpellData::default()));
        assert!(matches!(
            formula_request(&fighter(), &item, &ctx()),
            Err(ResolveError::MissingFormula { .. })
        ));
    }

    #[test]
    fn test_blind_formula_whispers_gms() {
        let gm = UserId::new();
        let item = Item::new(
            "Hear Noise",
            ItemKind::Ability(AbilityData {
                roll: Some("1d6".to_string()),
                blind: true,
                ..AbilityData::default()
            }),
        );
        let ctx = ctx().with_gm_users(vec![gm]);
        let request = formula_request(&fighter(), &item, &ctx).unwrap();
        assert!(request.visibility.blind);
        assert_eq!(request.visibility.whisper, vec![gm]);
    }

    #[test]
    fn test_save_request_targets_actor_save() {
        let actor = fighter();
        let request = save_request(&actor, SaveKind::Wand, &SystemConfig::default(), &ctx());
        assert_eq!(request.parts, vec!["1d20"]);
        assert_eq!(request.data.roll_type, RollType::Above);
        assert_eq!(request.data.target, Some(13));
        assert_eq!(request.title, "Save: Magic Wands");
    }

    #[test]
    fn test_roll_mode_reaches_request() {
        let user = UserId::new();
        let ctx = RollContext::new(user).with_roll_mode(RollMode::SelfRoll);
        let request = damage_request(&fighter(), &sword(true, false), &ctx).unwrap();
        assert_eq!(request.visibility.whisper, vec![user]);
    }

    #[test]
    fn test_chat_card() {
        let actor = fighter();
        let item = sword(true, false);
        let card = chat_card(&actor, &item, &SystemConfig::default());
        assert_eq!(card.address, ChatCardAddress::new(actor.id, None, item.id));
        assert!(card.has_damage);
        assert!(!card.is_spell);
    }
}
