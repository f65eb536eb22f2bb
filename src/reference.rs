// 📋 Reference Data - Mid rates + interest schedule
// Constructed once at startup, never mutated afterwards.
//
// Buy/sell quotes are derived from the mid rate by linear spread scaling.
// Everything else (overrides, snapshots) is layered on top in other modules.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::{BoardError, Result};

/// Buy quote sits 0.5% below mid
pub const SPREAD_FACTOR_BUY: f64 = 0.995;

/// Sell quote sits 0.5% above mid
pub const SPREAD_FACTOR_SELL: f64 = 1.005;

/// Default display precision for FX quotes
pub const DEFAULT_DECIMALS: usize = 2;

/// Interest percentages always display with two decimals
pub const INTEREST_DECIMALS: usize = 2;

// ============================================================================
// CURRENCY
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Currency {
    /// ISO-like code, unique across the board (e.g. "USD")
    pub code: String,

    /// Human readable name (e.g. "US Dollar")
    pub name: String,

    /// Two-letter country code, used by renderers for flags
    #[serde(default)]
    pub flag: String,

    /// Mid-market rate against the board's base currency
    pub mid_rate: f64,

    /// Display precision (3 for low-denomination currencies)
    #[serde(default = "default_decimals")]
    pub decimals: usize,
}

fn default_decimals() -> usize {
    DEFAULT_DECIMALS
}

impl Currency {
    pub fn new(code: &str, name: &str, flag: &str, mid_rate: f64) -> Self {
        Currency {
            code: code.to_string(),
            name: name.to_string(),
            flag: flag.to_string(),
            mid_rate,
            decimals: DEFAULT_DECIMALS,
        }
    }

    /// Builder-style precision override
    pub fn with_decimals(mut self, decimals: usize) -> Self {
        self.decimals = decimals;
        self
    }

    /// "US Dollar (USD)"
    pub fn label(&self) -> String {
        format!("{} ({})", self.name, self.code)
    }
}

// ============================================================================
// INTEREST TERM
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterestTerm {
    /// Unique label (e.g. "30 Days Fixed")
    pub label: String,

    /// Default rate in percent
    pub rate: f64,

    /// Policy rate rows get emphasised by renderers
    #[serde(default)]
    pub is_policy: bool,
}

impl InterestTerm {
    pub fn new(label: &str, rate: f64) -> Self {
        InterestTerm {
            label: label.to_string(),
            rate,
            is_policy: false,
        }
    }

    pub fn policy(label: &str, rate: f64) -> Self {
        InterestTerm {
            is_policy: true,
            ..InterestTerm::new(label, rate)
        }
    }
}

// ============================================================================
// REFERENCE DATA
// ============================================================================

/// Immutable board tables. Order is display order.
#[derive(Debug, Clone)]
pub struct ReferenceData {
    currencies: Vec<Currency>,
    terms: Vec<InterestTerm>,
}

impl ReferenceData {
    /// Validate and build. Codes/labels must be unique, rates positive.
    pub fn new(currencies: Vec<Currency>, terms: Vec<InterestTerm>) -> Result<Self> {
        if currencies.is_empty() {
            return Err(BoardError::ReferenceData("no currencies defined".to_string()));
        }

        let mut seen = HashSet::new();
        for c in &currencies {
            if c.code.trim().is_empty() {
                return Err(BoardError::ReferenceData("empty currency code".to_string()));
            }
            if !seen.insert(c.code.as_str()) {
                return Err(BoardError::ReferenceData(format!(
                    "duplicate currency code '{}'",
                    c.code
                )));
            }
            if !(c.mid_rate.is_finite() && c.mid_rate > 0.0) {
                return Err(BoardError::ReferenceData(format!(
                    "mid rate for '{}' must be positive, got {}",
                    c.code, c.mid_rate
                )));
            }
        }

        let mut seen = HashSet::new();
        for t in &terms {
            if !seen.insert(t.label.as_str()) {
                return Err(BoardError::ReferenceData(format!(
                    "duplicate interest term '{}'",
                    t.label
                )));
            }
            if !(t.rate.is_finite() && t.rate > 0.0) {
                return Err(BoardError::ReferenceData(format!(
                    "rate for '{}' must be positive, got {}",
                    t.label, t.rate
                )));
            }
        }

        Ok(ReferenceData { currencies, terms })
    }

    /// Built-in kwacha board
    pub fn zambian_kwacha() -> Self {
        ReferenceData {
            currencies: default_currencies(),
            terms: default_interest_terms(),
        }
    }

    pub fn currencies(&self) -> &[Currency] {
        &self.currencies
    }

    pub fn terms(&self) -> &[InterestTerm] {
        &self.terms
    }

    pub fn currency(&self, code: &str) -> Option<&Currency> {
        self.currencies.iter().find(|c| c.code == code)
    }

    pub fn term(&self, label: &str) -> Option<&InterestTerm> {
        self.terms.iter().find(|t| t.label == label)
    }

    pub fn mid_rate(&self, code: &str) -> Option<f64> {
        self.currency(code).map(|c| c.mid_rate)
    }

    /// Display precision for a currency, falling back to the default
    pub fn decimals(&self, code: &str) -> usize {
        self.currency(code).map_or(DEFAULT_DECIMALS, |c| c.decimals)
    }
}

impl Default for ReferenceData {
    fn default() -> Self {
        Self::zambian_kwacha()
    }
}

pub fn default_currencies() -> Vec<Currency> {
    vec![
        Currency::new("USD", "US Dollar", "us", 23.05),
        Currency::new("GBP", "British Pound", "gb", 31.03),
        Currency::new("EUR", "Euro", "eu", 27.24),
        Currency::new("CAD", "Canadian Dollar", "ca", 16.62),
        Currency::new("SEK", "Swedish Krona", "se", 2.43),
        Currency::new("DKK", "Danish Krone", "dk", 3.65),
        Currency::new("JPY", "Japanese Yen", "jp", 0.156).with_decimals(3),
        Currency::new("CHF", "Swiss Franc", "ch", 28.61),
        Currency::new("AUD", "Australian Dollar", "au", 14.92),
        Currency::new("ZAR", "South African Rand", "za", 1.32),
        Currency::new("BWP", "Botswana Pula", "bw", 1.60),
        Currency::new("KES", "Kenyan Shilling", "ke", 0.178),
    ]
}

pub fn default_interest_terms() -> Vec<InterestTerm> {
    vec![
        InterestTerm::new("30 Days Fixed", 4.55),
        InterestTerm::new("45 Days Fixed", 5.32),
        InterestTerm::new("60 Days Fixed", 5.97),
        InterestTerm::new("90 Days Fixed", 6.45),
        InterestTerm::new("6 Months Fixed", 7.06),
        InterestTerm::new("12 Months Fixed", 7.83),
        InterestTerm::new("18 Months Fixed", 8.15),
        InterestTerm::new("24 Months Fixed", 8.27),
        InterestTerm::policy("BOZ Policy Rate", 14.50),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_board_tables() {
        let reference = ReferenceData::zambian_kwacha();

        assert_eq!(reference.currencies().len(), 12);
        assert_eq!(reference.terms().len(), 9);
        assert_eq!(reference.mid_rate("USD"), Some(23.05));
        assert_eq!(reference.decimals("JPY"), 3);
        assert_eq!(reference.decimals("USD"), 2);

        let policy: Vec<&InterestTerm> = reference.terms().iter().filter(|t| t.is_policy).collect();
        assert_eq!(policy.len(), 1);
        assert_eq!(policy[0].label, "BOZ Policy Rate");
    }

    #[test]
    fn test_default_tables_pass_validation() {
        let result = ReferenceData::new(default_currencies(), default_interest_terms());
        assert!(result.is_ok());
    }

    #[test]
    fn test_duplicate_currency_rejected() {
        let currencies = vec![
            Currency::new("USD", "US Dollar", "us", 23.05),
            Currency::new("USD", "Other Dollar", "us", 20.0),
        ];

        let err = ReferenceData::new(currencies, vec![]).unwrap_err();
        assert!(err.to_string().contains("duplicate currency code"));
    }

    #[test]
    fn test_non_positive_rates_rejected() {
        let zero_mid = vec![Currency::new("USD", "US Dollar", "us", 0.0)];
        assert!(ReferenceData::new(zero_mid, vec![]).is_err());

        let currencies = vec![Currency::new("USD", "US Dollar", "us", 23.05)];
        let terms = vec![InterestTerm::new("30 Days Fixed", -1.0)];
        assert!(ReferenceData::new(currencies, terms).is_err());
    }

    #[test]
    fn test_unknown_lookups() {
        let reference = ReferenceData::default();
        assert!(reference.currency("XXX").is_none());
        assert!(reference.term("1 Day Fixed").is_none());
        assert_eq!(reference.decimals("XXX"), DEFAULT_DECIMALS);
    }

    #[test]
    fn test_currency_label() {
        let usd = Currency::new("USD", "US Dollar", "us", 23.05);
        assert_eq!(usd.label(), "US Dollar (USD)");
    }
}
