use crate::schema::{DateRange, InventorySnapshot, Session, SnapshotRow};
use crate::utils::signed_count;
use chrono::NaiveDate;
use log::debug;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct PivotRow {
    pub date: NaiveDate,
    /// Distinct pallets per client header.
    pub counts: BTreeMap<String, u64>,
    pub total: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Default)]
pub struct PivotTable {
    pub client_headers: Vec<String>,
    pub rows: Vec<PivotRow>,
}

impl SnapshotRow {
    pub fn pallet_key(&self) -> Option<String> {
        self.pallet_id.as_ref().and_then(|p| p.normalized())
    }

    pub fn owner_name(&self) -> &str {
        self.owner.trim()
    }

    fn in_session(&self, session: Option<Session>) -> bool {
        match session {
            Some(session) => session.matches_label(&self.session),
            None => true,
        }
    }
}

impl InventorySnapshot {
    /// Upsert of a re-uploaded file for the same day: incoming rows replace
    /// stored rows with the same pallet id, everything else is appended.
    pub fn merge(&mut self, incoming: InventorySnapshot) {
        let replaced: HashSet<String> = incoming
            .rows
            .iter()
            .filter_map(SnapshotRow::pallet_key)
            .collect();

        self.rows
            .retain(|row| row.pallet_key().map_or(true, |key| !replaced.contains(&key)));
        self.rows.extend(incoming.rows);
    }

    /// Distinct pallet ids per owner in this snapshot.
    fn pallets_by_owner(&self, session: Option<Session>) -> BTreeMap<String, BTreeSet<String>> {
        let mut owners: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();

        for row in &self.rows {
            if !row.in_session(session) {
                continue;
            }
            let owner = row.owner_name();
            if owner.is_empty() {
                continue;
            }
            let pallets = owners.entry(owner.to_string()).or_default();
            if let Some(key) = row.pallet_key() {
                pallets.insert(key);
            }
        }

        owners
    }
}

pub fn reduce_snapshot(
    snapshot: &InventorySnapshot,
    client: &str,
    session: Option<Session>,
) -> u64 {
    let client = client.trim();
    let pallets: HashSet<String> = snapshot
        .rows
        .iter()
        .filter(|row| row.owner_name() == client && row.in_session(session))
        .filter_map(SnapshotRow::pallet_key)
        .collect();

    pallets.len() as u64
}

/// Dates become rows and owners become columns. Without an explicit client list
/// every owner observed is a column; with one, unlisted owners are dropped.
pub fn reduce_snapshot_pivot(
    snapshots: &[InventorySnapshot],
    clients: Option<&[String]>,
    session: Option<Session>,
) -> PivotTable {
    let mut by_date: BTreeMap<NaiveDate, BTreeMap<String, BTreeSet<String>>> = BTreeMap::new();

    for snapshot in snapshots {
        let day = by_date.entry(snapshot.date).or_default();
        for (owner, pallets) in snapshot.pallets_by_owner(session) {
            day.entry(owner).or_default().extend(pallets);
        }
    }

    let client_headers: Vec<String> = match clients {
        Some(list) => {
            let mut seen = HashSet::new();
            list.iter()
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty() && seen.insert(c.clone()))
                .collect()
        }
        None => {
            let owners: BTreeSet<String> = by_date
                .values()
                .flat_map(|day| day.keys().cloned())
                .collect();
            owners.into_iter().collect()
        }
    };

    let rows: Vec<PivotRow> = by_date
        .into_iter()
        .map(|(date, owners)| {
            let counts: BTreeMap<String, u64> = client_headers
                .iter()
                .map(|client| {
                    let count = owners.get(client).map_or(0, |p| p.len() as u64);
                    (client.clone(), count)
                })
                .collect();
            let total = counts.values().sum();
            PivotRow {
                date,
                counts,
                total,
            }
        })
        .collect();

    debug!(
        "Pivoted {} snapshots into {} rows x {} clients",
        snapshots.len(),
        rows.len(),
        client_headers.len()
    );

    PivotTable {
        client_headers,
        rows,
    }
}

/// Distinct pallet count per snapshot day for one client.
pub fn daily_counts(
    snapshots: &[InventorySnapshot],
    client: &str,
    session: Option<Session>,
) -> BTreeMap<NaiveDate, u64> {
    let clients = [client.trim().to_string()];
    reduce_snapshot_pivot(snapshots, Some(&clients), session)
        .rows
        .into_iter()
        .map(|row| (row.date, row.total))
        .collect()
}

pub fn latest_snapshot_before(
    snapshots: &[InventorySnapshot],
    date: NaiveDate,
) -> Option<&InventorySnapshot> {
    snapshots
        .iter()
        .filter(|s| s.date < date)
        .max_by_key(|s| s.date)
}

/// Stock on hand before the first day of the range, or 0 without a prior snapshot.
pub fn opening_balance(
    snapshots: &[InventorySnapshot],
    range: DateRange,
    client: &str,
    session: Option<Session>,
) -> i64 {
    latest_snapshot_before(snapshots, range.start)
        .map(|s| signed_count(reduce_snapshot(s, client, session)))
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::PalletRef;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    fn row(owner: &str, pallet: PalletRef, session: &str) -> SnapshotRow {
        SnapshotRow {
            owner: owner.to_string(),
            pallet_id: Some(pallet),
            session: session.to_string(),
            ..Default::default()
        }
    }

    fn num(n: f64) -> PalletRef {
        PalletRef::Number(n)
    }

    fn text(s: &str) -> PalletRef {
        PalletRef::Text(s.to_string())
    }

    fn snapshot(date: NaiveDate, rows: Vec<SnapshotRow>) -> InventorySnapshot {
        InventorySnapshot { date, rows }
    }

    #[test]
    fn test_numeric_and_text_ids_collapse() {
        let snap = snapshot(
            day(1),
            vec![
                row("ACME", num(100.0), "CO"),
                row("ACME", text("100"), "CO"),
                row("ACME", text(" 101 "), "CO"),
                row("Globex", num(100.0), "CO"),
            ],
        );
        assert_eq!(reduce_snapshot(&snap, "ACME", None), 2);
        assert_eq!(reduce_snapshot(&snap, "Globex", None), 1);
        assert_eq!(reduce_snapshot(&snap, "Initech", None), 0);
    }

    #[test]
    fn test_session_filter_is_trimmed_and_case_insensitive() {
        let snap = snapshot(
            day(1),
            vec![
                row("ACME", num(1.0), " co "),
                row("ACME", num(2.0), "Co"),
                row("ACME", num(3.0), "RE"),
                row("ACME", num(4.0), ""),
            ],
        );
        assert_eq!(reduce_snapshot(&snap, "ACME", Some(Session::Frozen)), 2);
        assert_eq!(reduce_snapshot(&snap, "ACME", Some(Session::Refrigerated)), 1);
        assert_eq!(reduce_snapshot(&snap, "ACME", None), 4);
    }

    #[test]
    fn test_rows_without_owner_or_pallet_are_ignored() {
        let mut snap = snapshot(day(1), vec![row("", num(1.0), "CO")]);
        snap.rows.push(SnapshotRow {
            owner: "ACME".to_string(),
            pallet_id: None,
            ..Default::default()
        });
        snap.rows.push(row("ACME", text("  "), "CO"));

        let pivot = reduce_snapshot_pivot(&[snap], None, None);
        assert_eq!(pivot.client_headers, vec!["ACME"]);
        assert_eq!(pivot.rows[0].total, 0);
    }

    #[test]
    fn test_pivot_discovers_all_owners() {
        let snapshots = vec![
            snapshot(day(2), vec![row("Globex", num(1.0), "CO")]),
            snapshot(
                day(1),
                vec![row("ACME", num(1.0), "CO"), row("ACME", num(2.0), "CO")],
            ),
        ];

        let pivot = reduce_snapshot_pivot(&snapshots, None, None);
        assert_eq!(pivot.client_headers, vec!["ACME", "Globex"]);
        assert_eq!(pivot.rows.len(), 2);
        assert_eq!(pivot.rows[0].date, day(1));
        assert_eq!(pivot.rows[0].counts["ACME"], 2);
        assert_eq!(pivot.rows[0].counts["Globex"], 0);
        assert_eq!(pivot.rows[1].counts["Globex"], 1);
    }

    #[test]
    fn test_pivot_with_client_list_drops_others() {
        let snapshots = vec![snapshot(
            day(1),
            vec![row("ACME", num(1.0), "CO"), row("Globex", num(2.0), "CO")],
        )];
        let clients = vec!["ACME".to_string()];

        let pivot = reduce_snapshot_pivot(&snapshots, Some(&clients), None);
        assert_eq!(pivot.client_headers, vec!["ACME"]);
        assert_eq!(pivot.rows[0].counts.len(), 1);
        assert!(!pivot.rows[0].counts.contains_key("Globex"));
        assert_eq!(pivot.rows[0].total, 1);
    }

    #[test]
    fn test_opening_balance_uses_latest_prior_snapshot() {
        let snapshots = vec![
            snapshot(day(1), vec![row("ACME", num(1.0), "CO")]),
            snapshot(
                day(3),
                vec![row("ACME", num(1.0), "CO"), row("ACME", num(2.0), "CO")],
            ),
            snapshot(day(5), vec![]),
        ];

        let range = DateRange::new(day(5), day(10));
        assert_eq!(opening_balance(&snapshots, range, "ACME", None), 2);

        let range = DateRange::new(day(3), day(10));
        assert_eq!(opening_balance(&snapshots, range, "ACME", None), 1);

        let range = DateRange::new(day(1), day(10));
        assert_eq!(opening_balance(&snapshots, range, "ACME", None), 0);
    }

    #[test]
    fn test_merge_replaces_same_pallet() {
        let mut stored = snapshot(
            day(1),
            vec![row("ACME", num(1.0), "CO"), row("ACME", num(2.0), "CO")],
        );
        stored.merge(snapshot(
            day(1),
            vec![row("Globex", text("2"), "RE"), row("ACME", num(3.0), "CO")],
        ));

        assert_eq!(stored.rows.len(), 3);
        assert_eq!(reduce_snapshot(&stored, "ACME", None), 2);
        assert_eq!(reduce_snapshot(&stored, "Globex", None), 1);
    }

    #[test]
    fn test_daily_counts() {
        let snapshots = vec![
            snapshot(day(1), vec![row("ACME", num(1.0), "CO")]),
            snapshot(day(2), vec![row("Globex", num(1.0), "CO")]),
        ];
        let counts = daily_counts(&snapshots, "ACME", None);
        assert_eq!(counts.get(&day(1)), Some(&1));
        assert_eq!(counts.get(&day(2)), Some(&0));
    }
}
