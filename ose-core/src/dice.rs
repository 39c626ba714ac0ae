//! Dice formulas and the default evaluator.
//!
//! Supports sums of dice and constants: `1d20`, `1d8+1`, `2d6+1d4-2`.
//! Roll requests carry their formula as separate parts which are summed.

use crate::actor::SaveKind;
use crate::chat::{Speaker, Visibility};
use crate::ports::DiceEvaluator;
use crate::resolver::AttackKind;
use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Mutex;
use thiserror::Error;

/// Error type for dice parsing and rolling.
#[derive(Debug, Error)]
pub enum DiceError {
    #[error("Invalid dice notation: {0}")]
    InvalidNotation(String),
    #[error("Invalid die size: {0}")]
    InvalidDieSize(u32),
    #[error("No dice specified")]
    NoDice,
    #[error("Too many dice: {0}")]
    TooManyDice(u64),
    #[error("Formula total out of range: {0}")]
    Overflow(String),
    #[error("Dice evaluator failed: {0}")]
    Evaluator(String),
}

/// Most dice one formula may roll.
pub const MAX_DICE: u32 = 1000;
/// Largest die a formula may name.
pub const MAX_SIDES: u32 = 1000;

/// How a roll total is judged against its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RollType {
    /// Plain total, no success check.
    #[default]
    Result,
    /// Succeeds when the total meets or beats the target.
    Above,
    /// Succeeds when the total is at or under the target.
    Below,
}

impl RollType {
    /// Judge a total. `None` when there is nothing to judge.
    pub fn succeeds(self, total: i32, target: Option<i32>) -> Option<bool> {
        let target = target?;
        match self {
            RollType::Result => None,
            RollType::Above => Some(total >= target),
            RollType::Below => Some(total <= target),
        }
    }
}

/// A group of identical dice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiceTerm {
    pub count: u32,
    pub sides: u32,
    /// -1 when the group is subtracted.
    pub sign: i32,
}

/// A parsed dice formula.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiceExpression {
    pub terms: Vec<DiceTerm>,
    pub modifier: i32,
    pub original: String,
}

impl DiceExpression {
    /// Parse a dice formula.
    pub fn parse(notation: &str) -> Result<Self, DiceError> {
        let notation = notation.trim().to_lowercase();
        if notation.is_empty() {
            return Err(DiceError::NoDice);
        }

        let mut expr = DiceExpression {
            terms: Vec::new(),
            modifier: 0,
            original: notation.clone(),
        };
        let mut current = String::new();
        let mut sign: i32 = 1;

        for ch in notation.chars() {
            match ch {
                '+' | '-' => {
                    if !current.is_empty() {
                        expr.push_term(&current, sign)?;
                        current.clear();
                        sign = 1;
                    }
                    if ch == '-' {
                        sign = -sign;
                    }
                }
                ' ' => continue,
                _ => current.push(ch),
            }
        }

        if !current.is_empty() {
            expr.push_term(&current, sign)?;
        }

        if expr.terms.is_empty() && expr.modifier == 0 {
            return Err(DiceError::NoDice);
        }
        Ok(expr)
    }

    /// Parse formula parts as one sum.
    pub fn from_parts<S: AsRef<str>>(parts: &[S]) -> Result<Self, DiceError> {
        let joined = parts
            .iter()
            .map(|p| p.as_ref().trim())
            .filter(|p| !p.is_empty())
            .collect::<Vec<_>>()
            .join("+");
        Self::parse(&joined)
    }

    fn push_term(&mut self, s: &str, sign: i32) -> Result<(), DiceError> {
        let invalid = || DiceError::InvalidNotation(s.to_string());

        match s.split_once('d') {
            Some((count, sides)) => {
                let count: u32 = if count.is_empty() {
                    1
                } else {
                    count.parse().map_err(|_| invalid())?
                };
                let sides: u32 = sides.parse().map_err(|_| invalid())?;
                if sides == 0 || sides > MAX_SIDES {
                    return Err(DiceError::InvalidDieSize(sides));
                }
                let total = self.dice_count() + u64::from(count);
                if total > u64::from(MAX_DICE) {
                    return Err(DiceError::TooManyDice(total));
                }
                self.terms.push(DiceTerm { count, sides, sign });
            }
            None => {
                let value: i32 = s.parse().map_err(|_| invalid())?;
                self.modifier = value
                    .checked_mul(sign)
                    .and_then(|v| self.modifier.checked_add(v))
                    .ok_or_else(|| DiceError::Overflow(self.original.clone()))?;
            }
        }
        Ok(())
    }

    fn dice_count(&self) -> u64 {
        self.terms.iter().map(|t| u64::from(t.count)).sum()
    }

    /// Roll with a specific RNG (useful for testing).
    pub fn roll_with_rng<R: Rng>(&self, rng: &mut R) -> Result<RollResult, DiceError> {
        let mut rolls = Vec::new();
        let mut dice_total: i64 = 0;

        for term in &self.terms {
            for _ in 0..term.count {
                let face = rng.gen_range(1..=term.sides);
                rolls.push(face);
                dice_total += i64::from(term.sign) * i64::from(face);
            }
        }

        let total = i32::try_from(dice_total + i64::from(self.modifier))
            .map_err(|_| DiceError::Overflow(self.original.clone()))?;
        Ok(RollResult {
            formula: self.original.clone(),
            rolls,
            modifier: self.modifier,
            total,
        })
    }

    pub fn roll(&self) -> Result<RollResult, DiceError> {
        self.roll_with_rng(&mut rand::thread_rng())
    }
}

impl FromStr for DiceExpression {
    type Err = DiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DiceExpression::parse(s)
    }
}

impl fmt::Display for DiceExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.original)
    }
}

/// Faces rolled and the resulting total.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollResult {
    pub formula: String,
    pub rolls: Vec<u32>,
    pub modifier: i32,
    pub total: i32,
}

impl fmt::Display for RollResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let faces = self
            .rolls
            .iter()
            .map(|r| r.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        write!(f, "{} [{}] = {}", self.formula, faces, self.total)
    }
}

// ============================================================================
// Roll requests
// ============================================================================

/// Context carried alongside the formula.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollData {
    pub roll_type: RollType,
    pub target: Option<i32>,
    /// Set for weapon attacks.
    pub attack: Option<AttackKind>,
    /// Damage formula offered as a follow-up on attack cards.
    pub damage: Option<String>,
    /// Set for saving throws.
    pub save: Option<SaveKind>,
}

/// Everything the dice evaluator needs to perform one roll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollRequest {
    pub parts: Vec<String>,
    pub data: RollData,
    pub speaker: Speaker,
    pub flavor: String,
    pub title: String,
    /// Roll immediately without a modifier prompt.
    pub skip_dialog: bool,
    pub visibility: Visibility,
}

impl RollRequest {
    pub fn formula(&self) -> String {
        self.parts.join(" + ")
    }
}

/// A completed roll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollOutcome {
    pub request: RollRequest,
    pub result: RollResult,
    pub success: Option<bool>,
}

/// Default evaluator: parses the parts and rolls them locally.
pub struct StandardDice {
    rng: Mutex<StdRng>,
}

impl StandardDice {
    pub fn new() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Deterministic evaluator for replays and tests.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    pub fn evaluate(&self, request: RollRequest) -> Result<RollOutcome, DiceError> {
        let expr = DiceExpression::from_parts(&request.parts[..])?;
        let result = {
            let mut rng = self
                .rng
                .lock()
                .map_err(|_| DiceError::Evaluator("rng lock poisoned".to_string()))?;
            expr.roll_with_rng(&mut *rng)?
        };
        let success = request
            .data
            .roll_type
            .succeeds(result.total, request.data.target);

        Ok(RollOutcome {
            request,
            result,
            success,
        })
    }
}

impl Default for StandardDice {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DiceEvaluator for StandardDice {
    async fn roll(&self, request: RollRequest) -> Result<RollOutcome, DiceError> {
        self.evaluate(request)
    }
}
