use crate::schema::{
    LineEncoding, LineItem, OperationRecord, Session, SessionClass, WeightMode,
};
use crate::session::classify_session;
use crate::utils::finite_or_zero;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PalletTotals {
    pub pallet_count: u64,
    pub net_weight: f64,
}

impl PalletTotals {
    pub fn is_zero(&self) -> bool {
        self.pallet_count == 0 && self.net_weight == 0.0
    }
}

impl LineItem {
    /// Recorded net weight, or `gross - tara_pallet - tara_box * quantity_per_pallet`.
    pub fn effective_net_weight(&self) -> f64 {
        let weight = match self.net_weight {
            Some(recorded) => recorded,
            None => self.gross_weight - self.tara_pallet - self.tara_box * self.quantity_per_pallet,
        };
        finite_or_zero(weight)
    }

    pub fn is_summary_row(&self) -> bool {
        self.pallet_id == 0
    }

    pub fn session_class(&self) -> SessionClass {
        classify_session(&self.temperature)
    }
}

impl OperationRecord {
    /// All line items, with per-destination / per-plate groups flattened in order.
    pub fn items(&self) -> impl Iterator<Item = &LineItem> {
        self.line_items
            .iter()
            .chain(self.item_groups.iter().flat_map(|g| g.items.iter()))
    }

    /// Explicit encoding when tagged, otherwise summary-form iff any line has pallet id 0.
    pub fn line_encoding(&self) -> LineEncoding {
        if let Some(encoding) = self.encoding {
            return encoding;
        }
        if self.items().any(LineItem::is_summary_row) {
            LineEncoding::Summary
        } else {
            LineEncoding::Detailed
        }
    }
}

pub fn normalize(record: &OperationRecord) -> PalletTotals {
    totals_where(record, |_| true)
}

/// Counts only the lines (or summary rows) whose temperature classifies as `session`.
/// Unclassifiable lines never match.
pub fn normalize_for_session(record: &OperationRecord, session: Session) -> PalletTotals {
    totals_where(record, |item| {
        item.session_class() == SessionClass::Classified(session)
    })
}

fn totals_where<F>(record: &OperationRecord, include: F) -> PalletTotals
where
    F: Fn(&LineItem) -> bool,
{
    match record.weight_mode {
        WeightMode::Fixed => fixed_totals(record, &include),
        WeightMode::Variable => match record.line_encoding() {
            LineEncoding::Summary => summary_totals(record, &include),
            LineEncoding::Detailed => detailed_totals(record, &include),
        },
    }
}

fn fixed_totals<F>(record: &OperationRecord, include: &F) -> PalletTotals
where
    F: Fn(&LineItem) -> bool,
{
    record
        .items()
        .filter(|item| include(item))
        .fold(PalletTotals::default(), |acc, item| PalletTotals {
            pallet_count: acc.pallet_count.saturating_add(item.pallets),
            net_weight: acc.net_weight + item.effective_net_weight(),
        })
}

fn summary_totals<F>(record: &OperationRecord, include: &F) -> PalletTotals
where
    F: Fn(&LineItem) -> bool,
{
    // An explicit tag makes every line a summary row; otherwise only the sentinel rows are.
    let explicit = record.encoding == Some(LineEncoding::Summary);

    record
        .items()
        .filter(|item| explicit || item.is_summary_row())
        .filter(|item| include(item))
        .fold(PalletTotals::default(), |acc, item| PalletTotals {
            pallet_count: acc.pallet_count.saturating_add(item.total_pallets),
            net_weight: acc.net_weight + finite_or_zero(item.total_net_weight),
        })
}

fn detailed_totals<F>(record: &OperationRecord, include: &F) -> PalletTotals
where
    F: Fn(&LineItem) -> bool,
{
    let explicit = record.encoding == Some(LineEncoding::Detailed);
    let mut pallets: BTreeSet<u64> = BTreeSet::new();
    let mut net_weight = 0.0;

    for item in record.items().filter(|item| include(item)) {
        if explicit || item.pallet_id > 0 {
            pallets.insert(item.pallet_id);
        }
        net_weight += item.effective_net_weight();
    }

    PalletTotals {
        pallet_count: pallets.len() as u64,
        net_weight,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ItemGroup, OperationKind, TemperatureReading};
    use chrono::NaiveDate;

    fn record(weight_mode: WeightMode, line_items: Vec<LineItem>) -> OperationRecord {
        OperationRecord {
            id: "op-1".to_string(),
            client_name: "ACME".to_string(),
            operation_kind: OperationKind::Reception,
            weight_mode,
            date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            line_items,
            item_groups: vec![],
            encoding: None,
        }
    }

    fn pallet(id: u64, gross: f64, temperature: f64) -> LineItem {
        LineItem {
            pallet_id: id,
            description: "Chicken breast".to_string(),
            quantity_per_pallet: 40.0,
            gross_weight: gross,
            tara_pallet: 20.0,
            tara_box: 0.5,
            temperature: TemperatureReading::Number(temperature),
            ..Default::default()
        }
    }

    fn summary_row(total_pallets: u64, total_net_weight: f64, temperature: f64) -> LineItem {
        LineItem {
            pallet_id: 0,
            description: "Chicken breast".to_string(),
            temperature: TemperatureReading::Number(temperature),
            total_pallets,
            total_net_weight,
            ..Default::default()
        }
    }

    #[test]
    fn test_empty_record_is_zero() {
        let totals = normalize(&record(WeightMode::Variable, vec![]));
        assert!(totals.is_zero());

        let totals = normalize(&record(WeightMode::Fixed, vec![]));
        assert!(totals.is_zero());
    }

    #[test]
    fn test_repeated_pallet_counts_once() {
        let rec = record(
            WeightMode::Variable,
            vec![pallet(5, 1000.0, -18.0), pallet(5, 1000.0, -18.0), pallet(6, 900.0, -18.0)],
        );
        let totals = normalize(&rec);
        assert_eq!(totals.pallet_count, 2);
        // 1000 - 20 - 0.5 * 40 = 960; 900 - 20 - 20 = 860
        assert!((totals.net_weight - (960.0 * 2.0 + 860.0)).abs() < 1e-9);
    }

    #[test]
    fn test_summary_and_detailed_encodings_agree() {
        let detailed = record(
            WeightMode::Variable,
            vec![pallet(1, 1000.0, -18.0), pallet(2, 1100.0, -18.0), pallet(3, 1200.0, -18.0)],
        );
        let summary = record(
            WeightMode::Variable,
            vec![summary_row(3, 960.0 + 1060.0 + 1160.0, -18.0)],
        );

        let a = normalize(&detailed);
        let b = normalize(&summary);
        assert_eq!(a.pallet_count, b.pallet_count);
        assert!((a.net_weight - b.net_weight).abs() < 1e-6);
    }

    #[test]
    fn test_summary_rows_are_not_deduplicated() {
        let rec = record(
            WeightMode::Variable,
            vec![summary_row(4, 400.0, -18.0), summary_row(4, 400.0, -18.0)],
        );
        assert_eq!(normalize(&rec).pallet_count, 8);
    }

    #[test]
    fn test_mixed_record_counts_only_summary_rows() {
        let rec = record(
            WeightMode::Variable,
            vec![summary_row(2, 200.0, -18.0), pallet(9, 1000.0, -18.0)],
        );
        let totals = normalize(&rec);
        assert_eq!(totals.pallet_count, 2);
        assert!((totals.net_weight - 200.0).abs() < 1e-9);
    }

    #[test]
    fn test_grouped_items_are_flattened() {
        let mut rec = record(WeightMode::Variable, vec![pallet(1, 1000.0, -18.0)]);
        rec.item_groups = vec![
            ItemGroup {
                label: "Destination North".to_string(),
                items: vec![pallet(2, 1000.0, -18.0), pallet(1, 1000.0, -18.0)],
            },
            ItemGroup {
                label: "Plate XYZ-123".to_string(),
                items: vec![pallet(3, 1000.0, -18.0)],
            },
        ];
        assert_eq!(normalize(&rec).pallet_count, 3);
    }

    #[test]
    fn test_fixed_weight_uses_line_counts() {
        let lines = vec![
            LineItem {
                pallets: 3,
                net_weight: Some(1500.0),
                ..Default::default()
            },
            LineItem {
                pallets: 2,
                net_weight: Some(800.0),
                ..Default::default()
            },
        ];
        let totals = normalize(&record(WeightMode::Fixed, lines));
        assert_eq!(totals.pallet_count, 5);
        assert!((totals.net_weight - 2300.0).abs() < 1e-9);
    }

    #[test]
    fn test_session_filter_changes_denominator() {
        let rec = record(
            WeightMode::Variable,
            vec![
                pallet(1, 1000.0, -18.0),
                pallet(2, 1000.0, 4.0),
                pallet(3, 1000.0, 4.0),
                LineItem {
                    pallet_id: 4,
                    temperature: TemperatureReading::Text("n/a".to_string()),
                    ..Default::default()
                },
            ],
        );

        assert_eq!(normalize_for_session(&rec, Session::Frozen).pallet_count, 1);
        assert_eq!(
            normalize_for_session(&rec, Session::Refrigerated).pallet_count,
            2
        );
        assert_eq!(normalize_for_session(&rec, Session::Dry).pallet_count, 0);
        assert_eq!(normalize(&rec).pallet_count, 4);
    }

    #[test]
    fn test_session_filter_on_summary_rows() {
        let rec = record(
            WeightMode::Variable,
            vec![summary_row(5, 500.0, -20.0), summary_row(3, 300.0, 15.0)],
        );
        assert_eq!(normalize_for_session(&rec, Session::Frozen).pallet_count, 5);
        assert_eq!(normalize_for_session(&rec, Session::Dry).pallet_count, 3);
    }

    #[test]
    fn test_explicit_detailed_tag_keeps_pallet_zero() {
        let mut rec = record(
            WeightMode::Variable,
            vec![pallet(0, 1000.0, -18.0), pallet(1, 1000.0, -18.0)],
        );
        assert_eq!(rec.line_encoding(), LineEncoding::Summary);

        rec.encoding = Some(LineEncoding::Detailed);
        assert_eq!(normalize(&rec).pallet_count, 2);
    }
}
