//! Token usage and cost tracking.
//!
//! [`ChatCost`] keeps monetary cost as an exact integer count of
//! **pico-units** of the billing currency (1 unit = [`CURRENCY_UNIT`]
//! micro-units, 1 micro-unit = [`PICOS_PER_MICRO`] pico-units). Rates are
//! quoted in micro-units per million tokens, so `tokens * rate` is already
//! a whole number of pico-units and no call is ever rounded. Sums across
//! many calls are therefore exact; scaling down happens only when a cost is
//! reported.
//!
//! Rates live in [`CostStructure`], one per model, grouped into a
//! [`CostTable`]. [`calc_cost`] is the pure function that turns token counts
//! into a [`ChatCost`]:
//!
//! ```rust
//! use llm_relay_core::usage::{CostStructure, TokenRate, calc_cost};
//!
//! let rate = CostStructure {
//!     base_rate: TokenRate::new(1_250_000, 10_000_000),
//!     input_threshold: 200_000,
//!     high_volume_rate: TokenRate::new(2_500_000, 15_000_000),
//!     thought_rate: TokenRate::new(0, 3_500_000),
//! };
//!
//! let cost = calc_cost(&rate, 1_000, 500, 0);
//! assert_eq!(cost.input_micros(), 1_250);
//! assert_eq!(cost.output_micros(), 5_000);
//!
//! // a single token at 1.25 per million is 1.25 micro-units, kept exactly
//! let one = calc_cost(&rate, 1, 0, 0);
//! assert_eq!(one.input_picos(), 1_250_000);
//! ```

use std::collections::HashMap;
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign};

use serde::{Deserialize, Serialize};

use crate::error::LlmError;

/// Micro-units per currency unit.
pub const CURRENCY_UNIT: u64 = 1_000_000;

/// Pico-units per micro-unit.
pub const PICOS_PER_MICRO: u128 = 1_000_000;

const PICOS_PER_UNIT: u128 = 1_000_000_000_000;

/// Monetary cost of one or more provider calls, in pico-units.
///
/// `total == input + output` always holds; the total is derived rather
/// than stored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChatCost {
    input_picos: u128,
    output_picos: u128,
}

impl ChatCost {
    /// The additive identity.
    pub const ZERO: Self = Self {
        input_picos: 0,
        output_picos: 0,
    };

    /// Creates a cost from whole input and output micro-units.
    pub fn new(input_micros: u64, output_micros: u64) -> Self {
        Self {
            input_picos: u128::from(input_micros) * PICOS_PER_MICRO,
            output_picos: u128::from(output_micros) * PICOS_PER_MICRO,
        }
    }

    /// Creates a cost from exact pico-unit amounts.
    pub const fn from_picos(input_picos: u128, output_picos: u128) -> Self {
        Self {
            input_picos,
            output_picos,
        }
    }

    /// Exact cost of the prompt side.
    pub fn input_picos(&self) -> u128 {
        self.input_picos
    }

    /// Exact cost of the completion side, thought tokens included.
    pub fn output_picos(&self) -> u128 {
        self.output_picos
    }

    /// Exact `input + output`, saturating at `u128::MAX`.
    pub fn total_picos(&self) -> u128 {
        self.input_picos.saturating_add(self.output_picos)
    }

    /// Prompt side in whole micro-units, rounded down.
    pub fn input_micros(&self) -> u64 {
        picos_to_micros(self.input_picos)
    }

    /// Completion side in whole micro-units, rounded down.
    pub fn output_micros(&self) -> u64 {
        picos_to_micros(self.output_picos)
    }

    /// Total in whole micro-units, rounded down.
    pub fn total_micros(&self) -> u64 {
        picos_to_micros(self.total_picos())
    }

    /// Returns `true` if nothing was charged.
    pub fn is_zero(&self) -> bool {
        self.input_picos == 0 && self.output_picos == 0
    }

    /// Returns the sum of two costs, or `None` on overflow.
    pub fn checked_add(&self, rhs: &Self) -> Option<Self> {
        let input_picos = self.input_picos.checked_add(rhs.input_picos)?;
        let output_picos = self.output_picos.checked_add(rhs.output_picos)?;
        input_picos.checked_add(output_picos)?;
        Some(Self {
            input_picos,
            output_picos,
        })
    }

    /// Total in whole currency units, for display only.
    #[allow(clippy::cast_precision_loss)]
    pub fn total_units(&self) -> f64 {
        self.total_picos() as f64 / PICOS_PER_UNIT as f64
    }
}

fn picos_to_micros(picos: u128) -> u64 {
    u64::try_from(picos / PICOS_PER_MICRO).unwrap_or(u64::MAX)
}

impl fmt::Display for ChatCost {
    /// Formats the exact total in currency units with at least six
    /// decimals, e.g. `0.004500` or `0.00000125`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let total = self.total_picos();
        let fraction = format!("{:012}", total % PICOS_PER_UNIT);
        let significant = fraction.trim_end_matches('0').len().max(6);
        write!(f, "{}.{}", total / PICOS_PER_UNIT, &fraction[..significant])
    }
}

impl Add for ChatCost {
    type Output = Self;

    /// Adds two costs with saturating arithmetic.
    ///
    /// Use [`checked_add`](Self::checked_add) when overflow must be detected.
    fn add(self, rhs: Self) -> Self {
        Self {
            input_picos: self.input_picos.saturating_add(rhs.input_picos),
            output_picos: self.output_picos.saturating_add(rhs.output_picos),
        }
    }
}

impl AddAssign for ChatCost {
    fn add_assign(&mut self, rhs: Self) {
        *self += &rhs;
    }
}

impl AddAssign<&ChatCost> for ChatCost {
    fn add_assign(&mut self, rhs: &Self) {
        self.input_picos = self.input_picos.saturating_add(rhs.input_picos);
        self.output_picos = self.output_picos.saturating_add(rhs.output_picos);
    }
}

/// Saturates like [`Add`]. Addition is associative only below the
/// saturation point; fold with [`ChatCost::checked_add`] where overflow
/// must surface as `None`.
impl Sum for ChatCost {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Add::add)
    }
}

/// Saturates like [`Add`]; see the owned `Sum` impl.
impl<'a> Sum<&'a ChatCost> for ChatCost {
    fn sum<I: Iterator<Item = &'a Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, |mut acc, c| {
            acc += c;
            acc
        })
    }
}

/// Input and output price, in micro-units per million tokens.
///
/// A price of 3.00 per million input tokens is `input: 3_000_000`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRate {
    /// Price of a million prompt tokens.
    pub input: u64,
    /// Price of a million completion tokens.
    pub output: u64,
}

impl TokenRate {
    /// Creates a rate.
    pub const fn new(input: u64, output: u64) -> Self {
        Self { input, output }
    }
}

/// Rate table entry for one model.
///
/// `high_volume_rate` replaces `base_rate` once a token count reaches
/// `input_threshold`; input and output are tested independently against the
/// same threshold. `thought_rate.output` bills reasoning tokens and is always
/// added to the output side.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostStructure {
    /// Standard pricing.
    pub base_rate: TokenRate,
    /// Token count at which `high_volume_rate` applies.
    pub input_threshold: u64,
    /// Pricing for large requests.
    pub high_volume_rate: TokenRate,
    /// Pricing for reasoning tokens.
    pub thought_rate: TokenRate,
}

impl CostStructure {
    /// A flat structure with no volume tier and no thought surcharge.
    pub const fn flat(rate: TokenRate) -> Self {
        Self {
            base_rate: rate,
            input_threshold: u64::MAX,
            high_volume_rate: rate,
            thought_rate: TokenRate::new(0, 0),
        }
    }

    fn tier(&self, tokens: u64) -> &TokenRate {
        if tokens >= self.input_threshold {
            &self.high_volume_rate
        } else {
            &self.base_rate
        }
    }
}

/// Token counts reported for one provider call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Prompt tokens.
    pub input_tokens: u64,
    /// Visible completion tokens.
    pub output_tokens: u64,
    /// Reasoning tokens, billed at the thought rate.
    pub thought_tokens: u64,
}

impl Add for TokenUsage {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self {
            input_tokens: self.input_tokens.saturating_add(rhs.input_tokens),
            output_tokens: self.output_tokens.saturating_add(rhs.output_tokens),
            thought_tokens: self.thought_tokens.saturating_add(rhs.thought_tokens),
        }
    }
}

/// Computes the cost of one call.
///
/// Each component is `tokens * rate` in pico-units, computed exactly in
/// `u128` with no division, so the output side is always the tier component
/// plus the thought component and costs of split calls add up to the cost
/// of the combined call.
pub fn calc_cost(
    rate: &CostStructure,
    input_tokens: u64,
    output_tokens: u64,
    thought_tokens: u64,
) -> ChatCost {
    let input = token_cost(input_tokens, rate.tier(input_tokens).input);
    let tiered_output = token_cost(output_tokens, rate.tier(output_tokens).output);
    let thought = token_cost(thought_tokens, rate.thought_rate.output);
    ChatCost::from_picos(input, tiered_output.saturating_add(thought))
}

fn token_cost(tokens: u64, per_million: u64) -> u128 {
    u128::from(tokens) * u128::from(per_million)
}

/// Per-model rate table.
///
/// Deserializes from a plain JSON object keyed by model id:
///
/// ```rust
/// use llm_relay_core::usage::{CostTable, TokenUsage};
///
/// let table: CostTable = serde_json::from_str(r#"{
///     "fast-model": {
///         "base_rate": {"input": 100000, "output": 400000},
///         "input_threshold": 18446744073709551615,
///         "high_volume_rate": {"input": 100000, "output": 400000},
///         "thought_rate": {"input": 0, "output": 0}
///     }
/// }"#).unwrap();
///
/// let usage = TokenUsage { input_tokens: 10_000, output_tokens: 1_000, thought_tokens: 0 };
/// assert_eq!(table.cost_for("fast-model", &usage).unwrap().total_micros(), 1_400);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CostTable {
    rates: HashMap<String, CostStructure>,
}

impl CostTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces the rates for a model.
    pub fn insert(&mut self, model: impl Into<String>, rate: CostStructure) -> &mut Self {
        self.rates.insert(model.into(), rate);
        self
    }

    /// Returns the rates for a model.
    pub fn get(&self, model: &str) -> Option<&CostStructure> {
        self.rates.get(model)
    }

    /// Prices `usage` for `model`.
    pub fn cost_for(&self, model: &str, usage: &TokenUsage) -> Result<ChatCost, LlmError> {
        let rate = self
            .get(model)
            .ok_or_else(|| LlmError::NotFound(format!("no cost structure for model {model}")))?;
        Ok(calc_cost(
            rate,
            usage.input_tokens,
            usage.output_tokens,
            usage.thought_tokens,
        ))
    }

    /// Number of models in the table.
    pub fn len(&self) -> usize {
        self.rates.len()
    }

    /// Returns `true` if the table is empty.
    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn tiered() -> CostStructure {
        CostStructure {
            base_rate: TokenRate::new(1_000_000, 4_000_000),
            input_threshold: 100_000,
            high_volume_rate: TokenRate::new(2_000_000, 8_000_000),
            thought_rate: TokenRate::new(0, 3_000_000),
        }
    }

    #[test]
    fn test_cost_total_is_sum() {
        let cost = ChatCost::new(300_000, 150_000);
        assert_eq!(cost.total_micros(), 450_000);
        assert!(!cost.is_zero());
        assert!(ChatCost::ZERO.is_zero());
    }

    #[test]
    fn test_cost_zero_is_identity() {
        let cost = ChatCost::new(7, 11);
        assert_eq!(cost.clone() + ChatCost::ZERO, cost);
        assert_eq!(ChatCost::ZERO + cost.clone(), cost);
        assert_eq!(ChatCost::default(), ChatCost::ZERO);
    }

    #[test]
    fn test_cost_add_is_associative_and_commutative() {
        let a = ChatCost::new(1, 2);
        let b = ChatCost::new(30, 40);
        let c = ChatCost::new(500, 600);
        assert_eq!(a.clone() + b.clone(), b.clone() + a.clone());
        assert_eq!(
            (a.clone() + b.clone()) + c.clone(),
            a.clone() + (b.clone() + c.clone())
        );
    }

    #[test]
    fn test_cost_add_assign_and_sum() {
        let mut total = ChatCost::ZERO;
        total += ChatCost::new(1, 1);
        total += &ChatCost::new(2, 3);
        assert_eq!(total, ChatCost::new(3, 4));

        let costs = [ChatCost::new(1, 0), ChatCost::new(0, 1)];
        let summed: ChatCost = costs.iter().sum();
        assert_eq!(summed.total_micros(), 2);
    }

    #[test]
    fn test_cost_add_saturates() {
        let big = ChatCost::from_picos(u128::MAX, 0);
        let sum = big.clone() + ChatCost::from_picos(1, 0);
        assert_eq!(sum.input_picos(), u128::MAX);
        assert_eq!(sum.input_micros(), u64::MAX);
        assert!(big.checked_add(&ChatCost::from_picos(1, 0)).is_none());
        assert!(
            ChatCost::from_picos(u128::MAX - 1, 0)
                .checked_add(&ChatCost::from_picos(0, 1))
                .is_some()
        );
    }

    #[test]
    fn test_cost_display() {
        assert_eq!(format!("{}", ChatCost::new(1_500_000, 0)), "1.500000");
        assert_eq!(format!("{}", ChatCost::new(0, 4_500)), "0.004500");
        assert_eq!(format!("{}", ChatCost::ZERO), "0.000000");
        assert_eq!(
            format!("{}", ChatCost::from_picos(1_250_000, 100_000)),
            "0.00000135"
        );
    }

    #[test]
    fn test_cost_serde_roundtrip() {
        let cost = ChatCost::new(12, 34);
        let json = serde_json::to_string(&cost).unwrap();
        let back: ChatCost = serde_json::from_str(&json).unwrap();
        assert_eq!(back, cost);
    }

    #[test]
    fn test_calc_cost_base_tier() {
        let cost = calc_cost(&tiered(), 50_000, 10_000, 0);
        assert_eq!(cost.input_micros(), 50_000);
        assert_eq!(cost.output_micros(), 40_000);
    }

    #[test]
    fn test_calc_cost_threshold_is_inclusive() {
        let cost = calc_cost(&tiered(), 100_000, 0, 0);
        assert_eq!(cost.input_micros(), 200_000);
        let cost = calc_cost(&tiered(), 99_999, 0, 0);
        assert_eq!(cost.input_micros(), 99_999);
    }

    #[test]
    fn test_calc_cost_output_tier_tests_output_tokens() {
        // small prompt, large completion: only the output side moves tier
        let cost = calc_cost(&tiered(), 10, 100_000, 0);
        assert_eq!(cost.input_micros(), 10);
        assert_eq!(cost.output_micros(), 800_000);
    }

    #[test]
    fn test_calc_cost_thought_is_additive() {
        let rate = tiered();
        for (output, thought) in [(0, 0), (1_000, 2_000), (150_000, 7), (3, 999_999)] {
            let with = calc_cost(&rate, 0, output, thought);
            let tier_only = calc_cost(&rate, 0, output, 0);
            let thought_only = calc_cost(&rate, 0, 0, thought);
            assert_eq!(
                with.output_picos(),
                tier_only.output_picos() + thought_only.output_picos()
            );
        }
    }

    #[test]
    fn test_calc_cost_no_overflow_in_intermediate() {
        let rate = CostStructure::flat(TokenRate::new(u64::MAX, 0));
        let cost = calc_cost(&rate, 1_000_000, 0, 0);
        assert_eq!(cost.input_picos(), u128::from(u64::MAX) * 1_000_000);
        assert_eq!(cost.input_micros(), u64::MAX);
    }

    #[test]
    fn test_calc_cost_keeps_sub_micro_precision() {
        let rate = CostStructure::flat(TokenRate::new(1_250_000, 100_000));
        let one = calc_cost(&rate, 1, 1, 0);
        assert_eq!(one.input_picos(), 1_250_000);
        assert_eq!(one.output_picos(), 100_000);
        assert!(!one.is_zero());
    }

    #[test]
    fn test_split_calls_cost_the_same_as_one_call() {
        let rate = CostStructure::flat(TokenRate::new(1_250_000, 100_000));
        let summed: ChatCost = (0..1_000).map(|_| calc_cost(&rate, 1, 1, 0)).sum();
        let batched = calc_cost(&rate, 1_000, 1_000, 0);
        assert_eq!(summed, batched);
        assert_eq!(batched.input_micros(), 1_250);
        assert_eq!(batched.output_micros(), 100);
    }

    #[test]
    fn test_flat_structure_never_tiers() {
        let rate = CostStructure::flat(TokenRate::new(2_000_000, 2_000_000));
        let cost = calc_cost(&rate, 1_000_000, 1_000_000, 1_000_000);
        assert_eq!(cost, ChatCost::new(2_000_000, 2_000_000));
    }

    #[test]
    fn test_cost_table_lookup() {
        let mut table = CostTable::new();
        table.insert("m", tiered());
        assert_eq!(table.len(), 1);

        let usage = TokenUsage {
            input_tokens: 1_000,
            output_tokens: 1_000,
            thought_tokens: 1_000,
        };
        let cost = table.cost_for("m", &usage).unwrap();
        assert_eq!(cost, ChatCost::new(1_000, 7_000));

        let err = table.cost_for("missing", &usage).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_token_usage_add() {
        let a = TokenUsage {
            input_tokens: 1,
            output_tokens: 2,
            thought_tokens: 3,
        };
        let sum = a + a;
        assert_eq!(sum.input_tokens, 2);
        assert_eq!(sum.thought_tokens, 6);
    }
}
