// 🧮 Rate Resolver
// Pure: (ReferenceData, OverrideSet) → effective rates.
// Full precision is kept here; rounding belongs to presentation.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::overrides::{OverrideSet, OverrideTarget, RateCategory};
use crate::reference::{Currency, InterestTerm, ReferenceData, SPREAD_FACTOR_BUY, SPREAD_FACTOR_SELL};

/// Every currency and term on the board, resolved
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResolvedRates {
    pub buying: BTreeMap<String, f64>,
    pub selling: BTreeMap<String, f64>,
    pub interest: BTreeMap<String, f64>,
}

impl ResolvedRates {
    pub fn get(&self, target: &OverrideTarget) -> Option<f64> {
        let map = match target.category() {
            RateCategory::Buy => &self.buying,
            RateCategory::Sell => &self.selling,
            RateCategory::Interest => &self.interest,
        };
        map.get(target.key()).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.buying.is_empty() && self.selling.is_empty() && self.interest.is_empty()
    }

    /// Every resolved cell as (target, value)
    pub fn iter(&self) -> impl Iterator<Item = (OverrideTarget, f64)> + '_ {
        let buying = self
            .buying
            .iter()
            .map(|(k, v)| (OverrideTarget::Buy(k.clone()), *v));
        let selling = self
            .selling
            .iter()
            .map(|(k, v)| (OverrideTarget::Sell(k.clone()), *v));
        let interest = self
            .interest
            .iter()
            .map(|(k, v)| (OverrideTarget::Interest(k.clone()), *v));
        buying.chain(selling).chain(interest)
    }
}

pub fn resolve_buy(currency: &Currency, overrides: &OverrideSet) -> f64 {
    overrides
        .forex_buy
        .get(&currency.code)
        .copied()
        .unwrap_or(currency.mid_rate * SPREAD_FACTOR_BUY)
}

pub fn resolve_sell(currency: &Currency, overrides: &OverrideSet) -> f64 {
    overrides
        .forex_sell
        .get(&currency.code)
        .copied()
        .unwrap_or(currency.mid_rate * SPREAD_FACTOR_SELL)
}

pub fn resolve_interest(term: &InterestTerm, overrides: &OverrideSet) -> f64 {
    overrides
        .interest
        .get(&term.label)
        .copied()
        .unwrap_or(term.rate)
}

/// Resolve every currency and term in the reference tables
pub fn resolve_all(reference: &ReferenceData, overrides: &OverrideSet) -> ResolvedRates {
    let mut rates = ResolvedRates::default();

    for currency in reference.currencies() {
        rates
            .buying
            .insert(currency.code.clone(), resolve_buy(currency, overrides));
        rates
            .selling
            .insert(currency.code.clone(), resolve_sell(currency, overrides));
    }

    for term in reference.terms() {
        rates
            .interest
            .insert(term.label.clone(), resolve_interest(term, overrides));
    }

    rates
}
