// 📤 CSV Export - the board exactly as displayed
// Values are the rounded display strings, not the full-precision resolved
// rates, so the file matches what customers saw on screen.

use serde::Serialize;
use std::io::Write;

use crate::display::BoardView;
use crate::error::Result;

#[derive(Debug, Serialize)]
struct ExportRecord<'a> {
    kind: &'static str,
    key: &'a str,
    name: &'a str,
    buying: Option<&'a str>,
    selling: Option<&'a str>,
    rate: Option<&'a str>,
    manual_buy: Option<bool>,
    manual_sell: Option<bool>,
    manual_rate: Option<bool>,
}

/// Write one row per currency then one per interest term. Returns rows written.
pub fn export_board<W: Write>(view: &BoardView, writer: W) -> Result<usize> {
    let mut wtr = csv::Writer::from_writer(writer);
    let mut rows = 0;

    for row in &view.forex {
        wtr.serialize(ExportRecord {
            kind: "forex",
            key: &row.code,
            name: &row.label,
            buying: Some(&row.buying),
            selling: Some(&row.selling),
            rate: None,
            manual_buy: Some(row.buy_manual),
            manual_sell: Some(row.sell_manual),
            manual_rate: None,
        })?;
        rows += 1;
    }

    for row in &view.interest {
        wtr.serialize(ExportRecord {
            kind: "interest",
            key: &row.label,
            name: &row.label,
            buying: None,
            selling: None,
            rate: Some(&row.rate),
            manual_buy: None,
            manual_sell: None,
            manual_rate: Some(row.manual),
        })?;
        rows += 1;
    }

    wtr.flush()?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::ChangeFlags;
    use crate::display::build_view;
    use crate::overrides::{OverrideSet, OverrideTarget};
    use crate::reference::ReferenceData;
    use crate::resolver::resolve_all;

    fn exported(overrides: &OverrideSet) -> (usize, String) {
        let reference = ReferenceData::zambian_kwacha();
        let rates = resolve_all(&reference, overrides);
        let view = build_view(&reference, &rates, overrides, &ChangeFlags::default());

        let mut buf = Vec::new();
        let rows = export_board(&view, &mut buf).unwrap();
        (rows, String::from_utf8(buf).unwrap())
    }

    #[test]
    fn test_export_header_and_row_count() {
        let (rows, text) = exported(&OverrideSet::new());

        assert_eq!(rows, 21);
        let mut lines = text.lines();
        assert_eq!(
            lines.next(),
            Some("kind,key,name,buying,selling,rate,manual_buy,manual_sell,manual_rate")
        );
        assert_eq!(lines.count(), 21);
    }

    #[test]
    fn test_export_uses_display_rounding() {
        let (_, text) = exported(&OverrideSet::new());

        assert!(text.contains("forex,USD,US Dollar (USD),22.93,23.17,,false,false,"));
        assert!(text.contains("interest,30 Days Fixed,30 Days Fixed,,,4.55%,,,false"));
    }

    #[test]
    fn test_export_flags_overrides() {
        let mut overrides = OverrideSet::new();
        overrides.set(&OverrideTarget::sell("GBP"), 31.5);

        let (_, text) = exported(&overrides);

        let gbp = text.lines().find(|l| l.starts_with("forex,GBP,")).unwrap();
        assert!(gbp.ends_with(",31.50,,false,true,"));
    }
}
