// ✍️ Manual Overrides
// Operator-supplied values that replace a computed quote until cleared.
//
// Presence is explicit: an entry in the map IS the override. A zero override
// is a real override, not "absent".

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// ============================================================================
// CATEGORY + TARGET
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RateCategory {
    Buy,
    Sell,
    Interest,
}

impl RateCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            RateCategory::Buy => "buy",
            RateCategory::Sell => "sell",
            RateCategory::Interest => "interest",
        }
    }

    /// Word used in operator notifications
    pub fn title(&self) -> &'static str {
        match self {
            RateCategory::Buy => "Buying",
            RateCategory::Sell => "Selling",
            RateCategory::Interest => "Interest",
        }
    }
}

/// One overridable cell on the board
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum OverrideTarget {
    /// Buying quote for a currency code
    Buy(String),
    /// Selling quote for a currency code
    Sell(String),
    /// Interest rate for a term label
    Interest(String),
}

impl OverrideTarget {
    pub fn buy(code: &str) -> Self {
        OverrideTarget::Buy(code.to_string())
    }

    pub fn sell(code: &str) -> Self {
        OverrideTarget::Sell(code.to_string())
    }

    pub fn interest(label: &str) -> Self {
        OverrideTarget::Interest(label.to_string())
    }

    pub fn category(&self) -> RateCategory {
        match self {
            OverrideTarget::Buy(_) => RateCategory::Buy,
            OverrideTarget::Sell(_) => RateCategory::Sell,
            OverrideTarget::Interest(_) => RateCategory::Interest,
        }
    }

    /// Currency code or term label
    pub fn key(&self) -> &str {
        match self {
            OverrideTarget::Buy(k) | OverrideTarget::Sell(k) | OverrideTarget::Interest(k) => k,
        }
    }
}

impl fmt::Display for OverrideTarget {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} {}", self.category().as_str(), self.key())
    }
}

// ============================================================================
// INPUT PARSING
// ============================================================================

/// What a raw operator input means
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OverrideInput {
    Set(f64),
    Clear,
}

/// Blank, non-numeric, non-finite or negative input is a clear request.
pub fn parse_override_input(raw: &str) -> OverrideInput {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return OverrideInput::Clear;
    }

    match trimmed.parse::<f64>() {
        Ok(value) if value.is_finite() && value >= 0.0 => OverrideInput::Set(value),
        _ => OverrideInput::Clear,
    }
}

/// Result of applying an input to the set
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OverrideChange {
    Set(f64),
    Cleared,
}

// ============================================================================
// OVERRIDE SET
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OverrideSet {
    #[serde(default)]
    pub forex_buy: BTreeMap<String, f64>,

    #[serde(default)]
    pub forex_sell: BTreeMap<String, f64>,

    #[serde(default)]
    pub interest: BTreeMap<String, f64>,
}

impl OverrideSet {
    pub fn new() -> Self {
        Self::default()
    }

    fn map(&self, category: RateCategory) -> &BTreeMap<String, f64> {
        match category {
            RateCategory::Buy => &self.forex_buy,
            RateCategory::Sell => &self.forex_sell,
            RateCategory::Interest => &self.interest,
        }
    }

    fn map_mut(&mut self, category: RateCategory) -> &mut BTreeMap<String, f64> {
        match category {
            RateCategory::Buy => &mut self.forex_buy,
            RateCategory::Sell => &mut self.forex_sell,
            RateCategory::Interest => &mut self.interest,
        }
    }

    pub fn get(&self, target: &OverrideTarget) -> Option<f64> {
        self.map(target.category()).get(target.key()).copied()
    }

    pub fn contains(&self, target: &OverrideTarget) -> bool {
        self.map(target.category()).contains_key(target.key())
    }

    pub fn set(&mut self, target: &OverrideTarget, value: f64) {
        self.map_mut(target.category())
            .insert(target.key().to_string(), value);
    }

    /// Returns the removed value, if any
    pub fn clear(&mut self, target: &OverrideTarget) -> Option<f64> {
        self.map_mut(target.category()).remove(target.key())
    }

    /// Parse raw input and set or clear accordingly
    pub fn apply(&mut self, target: &OverrideTarget, raw: &str) -> OverrideChange {
        match parse_override_input(raw) {
            OverrideInput::Set(value) => {
                self.set(target, value);
                OverrideChange::Set(value)
            }
            OverrideInput::Clear => {
                self.clear(target);
                OverrideChange::Cleared
            }
        }
    }

    pub fn clear_all(&mut self) {
        self.forex_buy.clear();
        self.forex_sell.clear();
        self.interest.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.forex_buy.is_empty() && self.forex_sell.is_empty() && self.interest.is_empty()
    }

    pub fn len(&self) -> usize {
        self.forex_buy.len() + self.forex_sell.len() + self.interest.len()
    }
}
