// 🖼️ Presentation model
// The only place rates get rounded. Terminal UI, `show` and the CSV export
// all read from `BoardView`, never from raw floats.

use chrono::{DateTime, FixedOffset, Utc};
use serde::Serialize;

use crate::board::ChangeFlags;
use crate::overrides::{OverrideSet, OverrideTarget};
use crate::reference::{ReferenceData, INTEREST_DECIMALS};
use crate::resolver::ResolvedRates;

/// Shown while a cell has no resolved value yet
pub const PLACEHOLDER: &str = "...";

pub fn format_rate(value: f64, decimals: usize) -> String {
    format!("{:.*}", decimals, value)
}

pub fn format_percent(value: f64) -> String {
    format!("{:.*}%", INTEREST_DECIMALS, value)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForexRow {
    pub code: String,
    pub label: String,
    pub flag: String,
    pub buying: String,
    pub selling: String,
    pub buy_manual: bool,
    pub sell_manual: bool,
    pub buy_changed: bool,
    pub sell_changed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InterestRow {
    pub label: String,
    pub rate: String,
    pub is_policy: bool,
    pub manual: bool,
    pub changed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoardView {
    pub forex: Vec<ForexRow>,
    pub interest: Vec<InterestRow>,
}

/// Rows in reference-table order
pub fn build_view(
    reference: &ReferenceData,
    rates: &ResolvedRates,
    overrides: &OverrideSet,
    changes: &ChangeFlags,
) -> BoardView {
    let forex = reference
        .currencies()
        .iter()
        .map(|c| {
            let buy = OverrideTarget::buy(&c.code);
            let sell = OverrideTarget::sell(&c.code);
            ForexRow {
                code: c.code.clone(),
                label: c.label(),
                flag: c.flag.clone(),
                buying: cell(rates.get(&buy), |v| format_rate(v, c.decimals)),
                selling: cell(rates.get(&sell), |v| format_rate(v, c.decimals)),
                buy_manual: overrides.contains(&buy),
                sell_manual: overrides.contains(&sell),
                buy_changed: changes.is_changed(&buy),
                sell_changed: changes.is_changed(&sell),
            }
        })
        .collect();

    let interest = reference
        .terms()
        .iter()
        .map(|t| {
            let target = OverrideTarget::interest(&t.label);
            InterestRow {
                label: t.label.clone(),
                rate: cell(rates.get(&target), format_percent),
                is_policy: t.is_policy,
                manual: overrides.contains(&target),
                changed: changes.is_changed(&target),
            }
        })
        .collect();

    BoardView { forex, interest }
}

fn cell(value: Option<f64>, fmt: impl Fn(f64) -> String) -> String {
    value.map(fmt).unwrap_or_else(|| PLACEHOLDER.to_string())
}

/// ("Sunday, 18 October 2026", "14:03:09") in the board's local offset
pub fn format_clock(now: DateTime<Utc>, offset: FixedOffset) -> (String, String) {
    let local = now.with_timezone(&offset);
    (
        local.format("%A, %-d %B %Y").to_string(),
        local.format("%H:%M:%S").to_string(),
    )
}

/// "Updated 14:03:09", or the placeholder before the first pass
pub fn format_last_updated(resolved_at: Option<DateTime<Utc>>, offset: FixedOffset) -> String {
    match resolved_at {
        Some(at) => format!("Updated {}", format_clock(at, offset).1),
        None => format!("Updated {}", PLACEHOLDER),
    }
}

/// Plain-text board for non-interactive output
pub fn render_plain(view: &BoardView) -> String {
    let mut out = String::new();

    out.push_str(&format!("{:<30} {:>12} {:>12}\n", "Currency", "Buying", "Selling"));
    for row in &view.forex {
        out.push_str(&format!(
            "{:<30} {:>12} {:>12}\n",
            row.label,
            mark(&row.buying, row.buy_manual),
            mark(&row.selling, row.sell_manual),
        ));
    }

    out.push('\n');
    out.push_str(&format!("{:<30} {:>12}\n", "Interest", "Rate"));
    for row in &view.interest {
        out.push_str(&format!("{:<30} {:>12}\n", row.label, mark(&row.rate, row.manual)));
    }

    out
}

// Manual overrides get an asterisk
fn mark(text: &str, manual: bool) -> String {
    if manual {
        format!("{}*", text)
    } else {
        text.to_string()
    }
}
