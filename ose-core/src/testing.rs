//! Testing utilities.
//!
//! In-memory stand-ins for the host so the roll pipeline can be exercised
//! without a running table:
//! - `InMemoryWorld` stores actors, scenes and the chat log
//! - `ScriptedDice` returns fixed totals and records every request
//! - `RecordingNotifier` captures user-facing notifications and the button
//!   state at the moment each one is raised
//! - `TestHarness` wires them into a resolver and dispatcher

use crate::actor::{Actor, Scene, TokenAddress, TokenData};
use crate::chat::{ChatCard, ChatMessage, MessageContent, MessageRequest, Speaker, Visibility};
use crate::config::SystemConfig;
use crate::dice::{DiceError, RollOutcome, RollRequest, RollResult};
use crate::dispatch::{CardActionDispatcher, CardButton, UserContext};
use crate::ids::{ActorId, ItemId, MessageId, SceneId, UserId};
use crate::item::{Item, ItemPatch};
use crate::ports::{
    ChatError, ChatTransport, DiceEvaluator, Notifier, Persistence, PersistenceError,
};
use crate::registry::ChatCardRegistry;
use crate::resolver::{chat_card, ActionResolver, RollContext};
use crate::sheet::ItemSheet;
use crate::tags::TagCodec;
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::Notify;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ============================================================================
// World
// ============================================================================

/// Actors, scenes and chat messages held in memory.
#[derive(Default)]
pub struct InMemoryWorld {
    actors: Mutex<HashMap<ActorId, Actor>>,
    scenes: Mutex<HashMap<SceneId, Scene>>,
    messages: Mutex<Vec<ChatMessage>>,
    reject_updates: AtomicBool,
    updates: AtomicUsize,
}

impl InMemoryWorld {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_actor(&self, actor: Actor) -> ActorId {
        let id = actor.id;
        lock(&self.actors).insert(id, actor);
        id
    }

    pub fn remove_actor(&self, id: ActorId) {
        lock(&self.actors).remove(&id);
    }

    pub fn actor(&self, id: ActorId) -> Option<Actor> {
        lock(&self.actors).get(&id).cloned()
    }

    pub fn item(&self, actor: ActorId, item: ItemId) -> Option<Item> {
        lock(&self.actors)
            .get(&actor)
            .and_then(|a| a.owned_item(item).cloned())
    }

    pub fn add_scene(&self, scene: Scene) -> SceneId {
        let id = scene.id;
        lock(&self.scenes).insert(id, scene);
        id
    }

    /// Place a token on an existing scene.
    pub fn place_token(&self, scene: SceneId, token: TokenData) -> Option<TokenAddress> {
        let mut scenes = lock(&self.scenes);
        let scene = scenes.get_mut(&scene)?;
        let address = TokenAddress::new(scene.id, token.id);
        scene.tokens.push(token);
        Some(address)
    }

    /// Make every following `update_item` fail.
    pub fn reject_updates(&self) {
        self.reject_updates.store(true, Ordering::SeqCst);
    }

    pub fn update_count(&self) -> usize {
        self.updates.load(Ordering::SeqCst)
    }

    pub fn messages(&self) -> Vec<ChatMessage> {
        lock(&self.messages).clone()
    }

    /// Messages carrying roll results, in posting order.
    pub fn roll_messages(&self) -> Vec<RollOutcome> {
        lock(&self.messages)
            .iter()
            .filter_map(|m| match &m.content {
                MessageContent::Roll(outcome) => Some((**outcome).clone()),
                MessageContent::Card(_) => None,
            })
            .collect()
    }
}

#[async_trait]
impl Persistence for InMemoryWorld {
    async fn get_actor(&self, id: ActorId) -> Result<Option<Actor>, PersistenceError> {
        Ok(self.actor(id))
    }

    async fn get_scene(&self, id: SceneId) -> Result<Option<Scene>, PersistenceError> {
        Ok(lock(&self.scenes).get(&id).cloned())
    }

    async fn update_item(
        &self,
        owner: &Actor,
        item: ItemId,
        patch: &ItemPatch,
    ) -> Result<Item, PersistenceError> {
        if self.reject_updates.load(Ordering::SeqCst) {
            return Err(PersistenceError::Rejected(format!("item {item}")));
        }

        let mut actors = lock(&self.actors);
        let stored = actors
            .get_mut(&owner.id)
            .and_then(|a| a.owned_item_mut(item))
            .ok_or_else(|| PersistenceError::Missing(format!("item {item}")))?;
        stored.apply_patch(patch);
        self.updates.fetch_add(1, Ordering::SeqCst);
        Ok(stored.clone())
    }
}

#[async_trait]
impl ChatTransport for InMemoryWorld {
    async fn create_message(&self, request: MessageRequest) -> Result<MessageId, ChatError> {
        let id = MessageId::new();
        lock(&self.messages).push(ChatMessage::from_request(id, request));
        Ok(id)
    }

    async fn get_message(&self, id: MessageId) -> Result<Option<ChatMessage>, ChatError> {
        Ok(lock(&self.messages).iter().find(|m| m.id == id).cloned())
    }
}

// ============================================================================
// Dice
// ============================================================================

/// Lets a test hold a roll open until it chooses to release it.
#[derive(Default)]
pub struct Gate {
    started: Notify,
    release: Notify,
}

impl Gate {
    /// Wait until a roll has reached the evaluator.
    pub async fn wait_until_rolling(&self) {
        self.started.notified().await;
    }

    /// Let the held roll finish.
    pub fn release(&self) {
        self.release.notify_one();
    }
}

/// Dice evaluator returning scripted totals.
#[derive(Default)]
pub struct ScriptedDice {
    totals: Mutex<VecDeque<i32>>,
    requests: Mutex<Vec<RollRequest>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    fail: AtomicBool,
    gate: Option<Arc<Gate>>,
}

impl ScriptedDice {
    /// Every roll totals 10 unless scripted otherwise.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_totals(totals: impl IntoIterator<Item = i32>) -> Self {
        Self {
            totals: Mutex::new(totals.into_iter().collect()),
            ..Self::default()
        }
    }

    /// Each roll waits on the returned gate.
    pub fn gated() -> (Self, Arc<Gate>) {
        let gate = Arc::new(Gate::default());
        let dice = Self {
            gate: Some(gate.clone()),
            ..Self::default()
        };
        (dice, gate)
    }

    /// Make every following roll fail.
    pub fn fail(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }

    pub fn requests(&self) -> Vec<RollRequest> {
        lock(&self.requests).clone()
    }

    pub fn roll_count(&self) -> usize {
        lock(&self.requests).len()
    }

    /// Most rolls ever running at the same time.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DiceEvaluator for ScriptedDice {
    async fn roll(&self, request: RollRequest) -> Result<RollOutcome, DiceError> {
        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(running, Ordering::SeqCst);
        lock(&self.requests).push(request.clone());

        if let Some(gate) = &self.gate {
            gate.started.notify_one();
            gate.release.notified().await;
        }

        let result = if self.fail.load(Ordering::SeqCst) {
            Err(DiceError::Evaluator("scripted failure".to_string()))
        } else {
            let total = lock(&self.totals).pop_front().unwrap_or(10);
            let success = request.data.roll_type.succeeds(total, request.data.target);
            Ok(RollOutcome {
                result: RollResult {
                    formula: request.formula(),
                    rolls: Vec::new(),
                    modifier: 0,
                    total,
                },
                request,
                success,
            })
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

// ============================================================================
// Notifications
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Error(String),
    Warn(String),
}

/// Captures notifications, optionally noting a button's state as each
/// one is raised.
#[derive(Default)]
pub struct RecordingNotifier {
    notices: Mutex<Vec<Notice>>,
    watched: Mutex<Option<Arc<CardButton>>>,
    disabled_at_notice: Mutex<Vec<bool>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notices(&self) -> Vec<Notice> {
        lock(&self.notices).clone()
    }

    /// Record whether `button` is disabled each time a notice is raised.
    pub fn watch(&self, button: Arc<CardButton>) {
        *lock(&self.watched) = Some(button);
    }

    /// Button state at each notice, in order. Empty unless watching.
    pub fn disabled_at_notice(&self) -> Vec<bool> {
        lock(&self.disabled_at_notice).clone()
    }

    fn record(&self, notice: Notice) {
        if let Some(button) = lock(&self.watched).as_ref() {
            lock(&self.disabled_at_notice).push(button.is_disabled());
        }
        lock(&self.notices).push(notice);
    }
}

impl Notifier for RecordingNotifier {
    fn error(&self, message: &str) {
        self.record(Notice::Error(message.to_string()));
    }

    fn warn(&self, message: &str) {
        self.record(Notice::Warn(message.to_string()));
    }
}

// ============================================================================
// Harness
// ============================================================================

/// A table with one GM and one player, backed by in-memory fakes.
pub struct TestHarness {
    pub config: SystemConfig,
    pub world: Arc<InMemoryWorld>,
    pub dice: Arc<ScriptedDice>,
    pub notifier: Arc<RecordingNotifier>,
    pub gm: UserId,
    pub player: UserId,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_dice(ScriptedDice::new())
    }

    pub fn with_dice(dice: ScriptedDice) -> Self {
        Self {
            config: SystemConfig::default(),
            world: Arc::new(InMemoryWorld::new()),
            dice: Arc::new(dice),
            notifier: Arc::new(RecordingNotifier::new()),
            gm: UserId::new(),
            player: UserId::new(),
        }
    }

    pub fn registry(&self) -> ChatCardRegistry {
        ChatCardRegistry::new(self.world.clone(), self.world.clone())
    }

    pub fn resolver(&self) -> ActionResolver {
        ActionResolver::new(
            self.config.clone(),
            self.world.clone(),
            self.dice.clone(),
            self.world.clone(),
        )
    }

    pub fn dispatcher(&self) -> CardActionDispatcher {
        CardActionDispatcher::new(self.registry(), self.resolver(), self.notifier.clone())
    }

    pub fn sheet(&self) -> ItemSheet {
        ItemSheet::new(TagCodec::new(self.config.tags.clone()), self.world.clone())
    }

    /// Roll context for `user` with the harness GM as GM recipient.
    pub fn roll_context(&self, user: UserId) -> RollContext {
        RollContext::new(user).with_gm_users(vec![self.gm])
    }

    pub fn gm_context(&self) -> UserContext {
        UserContext::new(self.roll_context(self.gm)).gm()
    }

    pub fn player_context(&self) -> UserContext {
        UserContext::new(self.roll_context(self.player))
    }

    /// Post a card for `item` on `actor`, authored by `author`.
    pub fn post_card(&self, actor: &Actor, item: &Item, author: UserId) -> MessageId {
        self.post_raw_card(author, chat_card(actor, item, &self.config))
    }

    /// Post a card with arbitrary content, e.g. one addressing a missing item.
    pub fn post_raw_card(&self, author: UserId, card: ChatCard) -> MessageId {
        let id = MessageId::new();
        lock(&self.world.messages).push(ChatMessage {
            id,
            author,
            speaker: Speaker::default(),
            content: MessageContent::Card(card),
            visibility: Visibility::default(),
        });
        id
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Assertion Helpers
// ============================================================================

/// Assert exactly these notices were raised.
#[track_caller]
pub fn assert_notices(harness: &TestHarness, expected: &[Notice]) {
    assert_eq!(
        harness.notifier.notices(),
        expected,
        "Unexpected notifications"
    );
}

/// Assert the dice were never asked to roll.
#[track_caller]
pub fn assert_no_rolls(harness: &TestHarness) {
    assert_eq!(
        harness.dice.roll_count(),
        0,
        "Expected no rolls, got {:?}",
        harness.dice.requests()
    );
}
