//! Rolling items from a sheet, casting spells and editing tags.

use ose_core::actor::{Scene, TokenData};
use ose_core::chat::{MessageContent, RollMode};
use ose_core::item::{GearData, ItemKind, SpellData, WeaponData};
use ose_core::resolver::{AttackKind, ItemRoll, RollContext};
use ose_core::tags::Tag;
use ose_core::testing::TestHarness;
use ose_core::{Actor, ActorKind, ChatCardAddress, Item, RangeChoice, ResolveError};

fn spear() -> Item {
    Item::new(
        "Spear",
        ItemKind::Weapon(WeaponData {
            damage: "1d6".to_string(),
            bonus: 1,
            melee: true,
            missile: true,
            ..WeaponData::default()
        }),
    )
}

fn sleep_spell(cast: i32) -> Item {
    Item::new(
        "Sleep",
        ItemKind::Spell(SpellData {
            class: "Elf".to_string(),
            lvl: 1,
            cast,
            memorized: 1,
            ..SpellData::default()
        }),
    )
}

fn remaining_casts(item: &Item) -> i32 {
    match &item.kind {
        ItemKind::Spell(s) => s.cast,
        _ => panic!("expected spell"),
    }
}

#[tokio::test]
async fn test_character_weapon_waits_for_choice() {
    let h = TestHarness::new();
    let actor = Actor::new("Aldric", ActorKind::Character).with_item(spear());
    let item = actor.items[0].clone();
    let ctx = h.roll_context(h.player);
    let resolver = h.resolver();

    let ItemRoll::Pending(pending) = resolver.roll_item(&actor, &item, &ctx).await.unwrap() else {
        panic!("expected a pending choice");
    };
    // Nothing rolls until the choice is made
    assert_eq!(h.dice.roll_count(), 0);
    assert!(h.world.messages().is_empty());

    let request = pending.choose(RangeChoice::Melee);
    let outcome = resolver.complete_roll(request, &ctx).await.unwrap();
    assert_eq!(outcome.request.data.attack, Some(AttackKind::Melee));
    assert_eq!(outcome.request.parts, vec!["1d20", "1"]);
    assert_eq!(h.world.roll_messages().len(), 1);
}

#[tokio::test]
async fn test_monster_weapon_rolls_immediately() {
    let h = TestHarness::new();
    let actor = Actor::new("Orc", ActorKind::Monster).with_item(spear());
    let item = actor.items[0].clone();

    let roll = h
        .resolver()
        .roll_item(&actor, &item, &h.roll_context(h.gm))
        .await
        .unwrap();

    let ItemRoll::Rolled(outcome) = roll else {
        panic!("expected an immediate roll");
    };
    assert_eq!(outcome.request.data.attack, Some(AttackKind::Melee));
    assert_eq!(h.dice.roll_count(), 1);
}

#[tokio::test]
async fn test_gear_posts_card_with_roll_mode() {
    let h = TestHarness::new();
    let rope = Item::new("Rope", ItemKind::Gear(GearData { quantity: 1 }));
    let actor = Actor::new("Wren", ActorKind::Character).with_item(rope.clone());
    let ctx = h.roll_context(h.player).with_roll_mode(RollMode::BlindRoll);

    let ItemRoll::Card(id) = h.resolver().roll_item(&actor, &rope, &ctx).await.unwrap() else {
        panic!("expected a card");
    };

    let messages = h.world.messages();
    assert_eq!(messages.len(), 1);
    let message = &messages[0];
    assert_eq!(message.id, id);
    assert_eq!(message.author, h.player);
    assert_eq!(message.visibility.whisper, vec![h.gm]);
    assert!(message.visibility.blind);
    assert_eq!(
        message.card_address(),
        Some(ChatCardAddress::new(actor.id, None, rope.id))
    );
    assert_eq!(h.dice.roll_count(), 0);
}

#[tokio::test]
async fn test_cast_spell_decrements_then_posts() {
    let h = TestHarness::new();
    let actor = Actor::new("Ilsa", ActorKind::Character).with_item(sleep_spell(2));
    let spell = actor.items[0].clone();
    h.world.add_actor(actor.clone());

    h.resolver()
        .cast_spell(&actor, &spell, &h.roll_context(h.player))
        .await
        .unwrap();

    let stored = h.world.item(actor.id, spell.id).unwrap();
    assert_eq!(remaining_casts(&stored), 1);
    assert_eq!(h.world.update_count(), 1);

    let messages = h.world.messages();
    assert_eq!(messages.len(), 1);
    let MessageContent::Card(card) = &messages[0].content else {
        panic!("expected a card");
    };
    assert!(card.is_spell);
    assert_eq!(card.item_name, "Sleep");
}

#[tokio::test]
async fn test_failed_decrement_rolls_nothing() {
    let h = TestHarness::new();
    let actor = Actor::new("Ilsa", ActorKind::Character).with_item(sleep_spell(1));
    let spell = actor.items[0].clone();
    h.world.add_actor(actor.clone());
    h.world.reject_updates();

    let result = h
        .resolver()
        .cast_spell(&actor, &spell, &h.roll_context(h.player))
        .await;

    assert!(matches!(result, Err(ResolveError::Persistence(_))));
    assert!(h.world.messages().is_empty());
    assert_eq!(h.dice.roll_count(), 0);
    assert_eq!(remaining_casts(&h.world.item(actor.id, spell.id).unwrap()), 1);
}

#[tokio::test]
async fn test_no_casts_left() {
    let h = TestHarness::new();
    let actor = Actor::new("Ilsa", ActorKind::Character).with_item(sleep_spell(0));
    let spell = actor.items[0].clone();
    h.world.add_actor(actor.clone());

    let result = h
        .resolver()
        .cast_spell(&actor, &spell, &h.roll_context(h.player))
        .await;

    assert!(matches!(result, Err(ResolveError::NoCastsRemaining { .. })));
    assert_eq!(h.world.update_count(), 0);
    assert!(h.world.messages().is_empty());
}

#[tokio::test]
async fn test_missing_formula_posts_nothing() {
    let h = TestHarness::new();
    let actor = Actor::new("Ilsa", ActorKind::Character).with_item(sleep_spell(1));
    let spell = actor.items[0].clone();

    let result = h
        .resolver()
        .roll_formula(&actor, &spell, &RollContext::new(h.player))
        .await;

    assert!(matches!(result, Err(ResolveError::MissingFormula { .. })));
    assert!(h.world.messages().is_empty());
    assert_eq!(h.dice.roll_count(), 0);
}

#[tokio::test]
async fn test_push_and_pop_tags() {
    let h = TestHarness::new();
    let club = Item::new("Club", ItemKind::Weapon(WeaponData::default()));
    let actor = Actor::new("Bors", ActorKind::Character).with_item(club.clone());
    h.world.add_actor(actor.clone());
    let sheet = h.sheet();

    let updated = sheet
        .push_tags(&actor, &club, &["Melee (close)", "Slow", "Blunt"])
        .await
        .unwrap();
    let ItemKind::Weapon(weapon) = &updated.kind else {
        panic!("expected weapon");
    };
    assert_eq!(
        weapon.tags,
        vec![
            Tag::with_title("Melee", "close"),
            Tag::new("Slow"),
            Tag::new("Blunt")
        ]
    );
    assert!(weapon.melee && weapon.slow && !weapon.missile);

    // Removing a keyword tag leaves its flag alone
    let updated = sheet.pop_tag(&actor, &updated, "Slow").await.unwrap();
    let ItemKind::Weapon(weapon) = &updated.kind else {
        panic!("expected weapon");
    };
    assert_eq!(weapon.tags.len(), 2);
    assert!(weapon.slow);
}

#[tokio::test]
async fn test_registry_falls_back_to_actor_id() {
    let h = TestHarness::new();
    let actor = Actor::new("Wren", ActorKind::Character);
    h.world.add_actor(actor.clone());
    let scene = h.world.add_scene(Scene::new("Road"));
    let token = h
        .world
        .place_token(scene, TokenData::linked("Wren", actor.id))
        .unwrap();
    let registry = h.registry();

    // Token gone from the scene: the actor id still resolves
    let stale = ose_core::TokenAddress::new(scene, ose_core::ids::TokenId::new());
    let address = ChatCardAddress::new(actor.id, Some(stale), ose_core::ids::ItemId::new());
    assert_eq!(registry.resolve_actor(&address).await.unwrap().name, "Wren");

    let address = ChatCardAddress::new(actor.id, Some(token), ose_core::ids::ItemId::new());
    assert_eq!(registry.resolve_actor(&address).await.unwrap().name, "Wren");

    h.world.remove_actor(actor.id);
    assert!(registry.resolve_actor(&address).await.is_none());
}

#[tokio::test]
async fn test_registry_reads_card_address() {
    let h = TestHarness::new();
    let actor = Actor::new("Ilsa", ActorKind::Character).with_item(sleep_spell(1));
    let spell = actor.items[0].clone();
    let registry = h.registry();

    let card = h.post_card(&actor, &spell, h.player);
    assert_eq!(
        registry.address(card).await,
        Some(ChatCardAddress::new(actor.id, None, spell.id))
    );

    // Roll results carry no address
    let roll = h
        .resolver()
        .roll_save(&actor, ose_core::SaveKind::Spell, &h.roll_context(h.player))
        .await
        .unwrap();
    assert_eq!(roll.request.data.save, Some(ose_core::SaveKind::Spell));
    let roll_message = h.world.messages().last().unwrap().id;
    assert_eq!(registry.address(roll_message).await, None);

    assert_eq!(registry.address(ose_core::ids::MessageId::new()).await, None);
}

#[tokio::test]
async fn test_out_of_range_formula_is_an_error() {
    let h = TestHarness::new();
    let resolver = ose_core::ActionResolver::new(
        h.config.clone(),
        h.world.clone(),
        std::sync::Arc::new(ose_core::StandardDice::seeded(1)),
        h.world.clone(),
    );
    let ctx = h.roll_context(h.player);

    for roll in ["1d20+2147483647", "4294967295d6"] {
        let ability = Item::new(
            "Strange Luck",
            ItemKind::Ability(ose_core::item::AbilityData {
                roll: Some(roll.to_string()),
                ..Default::default()
            }),
        );
        let actor = Actor::new("Ilsa", ActorKind::Character).with_item(ability.clone());

        let result = resolver.roll_formula(&actor, &ability, &ctx).await;
        assert!(matches!(result, Err(ResolveError::Dice(_))), "{roll}");
    }
    assert!(h.world.messages().is_empty());
}
