use crate::aggregator::{aggregate, clients_in, movements_for_client, MovementMap};
use crate::balancer::{compute_balances, verify_continuity, RunningBalance};
use crate::config::ReportRequest;
use crate::error::Result;
use crate::inventory::{latest_snapshot_before, reduce_snapshot, reduce_snapshot_pivot, PivotTable};
use crate::schema::{DateRange, InventorySnapshot, OperationKind, OperationRecord, Session};
use crate::sources::{OperationSource, SnapshotSource};
use crate::utils::signed_count;
use chrono::NaiveDate;
use log::{debug, info, warn};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct BillingRow {
    pub client_name: String,
    pub session: Option<Session>,
    #[serde(flatten)]
    pub balance: RunningBalance,
    pub net_weight_received: f64,
    pub net_weight_dispatched: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct BillingReport {
    pub range: DateRange,
    pub rows: Vec<BillingRow>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ConsolidatedRow {
    pub date: NaiveDate,
    pub client_name: String,
    pub pallets_received: u64,
    pub pallets_dispatched: u64,
    /// Distinct pallets counted in that day's inventory upload.
    pub inventory_pallets: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ConsolidatedReport {
    pub range: DateRange,
    pub rows: Vec<ConsolidatedRow>,
}

impl BillingReport {
    pub fn empty(range: DateRange) -> Self {
        Self {
            range,
            rows: Vec::new(),
        }
    }

    /// Rows of one client (and session), in the report's presentation order.
    pub fn rows_for(&self, client: &str, session: Option<Session>) -> Vec<&BillingRow> {
        self.rows
            .iter()
            .filter(|r| r.client_name == client && r.session == session)
            .collect()
    }

    /// Re-checks balance continuity per client and session, whatever the row order.
    pub fn verify(&self) -> Result<()> {
        let mut series: BTreeMap<(&str, Option<Session>), Vec<RunningBalance>> = BTreeMap::new();
        for row in &self.rows {
            series
                .entry((row.client_name.as_str(), row.session))
                .or_default()
                .push(row.balance.clone());
        }

        for balances in series.values_mut() {
            balances.sort_by_key(|b| b.date);
            verify_continuity(balances)?;
        }

        Ok(())
    }

    pub fn to_json(&self) -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

impl ConsolidatedReport {
    pub fn to_json(&self) -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

fn relevant_records(records: &[OperationRecord], request: &ReportRequest) -> Vec<OperationRecord> {
    for record in records
        .iter()
        .filter(|r| r.operation_kind == OperationKind::Unrecognized)
    {
        warn!(
            "Ignoring operation {} for {}: unrecognized operation kind",
            record.id, record.client_name
        );
    }

    records
        .iter()
        .filter(|r| request.includes_client(&r.client_name))
        .cloned()
        .collect()
}

/// Billing report: daily movements folded into running balances, one series per client.
///
/// The opening balance of each client comes from the latest snapshot strictly
/// before the first day of the range (0 without one).
pub fn compose_billing(
    records: &[OperationRecord],
    snapshots: &[InventorySnapshot],
    request: &ReportRequest,
) -> BillingReport {
    let range = request.date_range();
    if range.is_empty() {
        return BillingReport::empty(range);
    }

    let records = relevant_records(records, request);
    let movements = aggregate(&records, range, request.session);
    let opening_snapshot = latest_snapshot_before(snapshots, range.start);

    let clients = billing_clients(&movements, opening_snapshot, request);

    let mut rows = Vec::new();
    for client in &clients {
        let opening = opening_snapshot
            .map(|s| signed_count(reduce_snapshot(s, client, request.session)))
            .unwrap_or(0);
        let series = movements_for_client(&movements, client, request.session);

        for balance in compute_balances(opening, &series, range) {
            let (net_weight_received, net_weight_dispatched) = series
                .get(&balance.date)
                .map(|m| (m.net_weight_received, m.net_weight_dispatched))
                .unwrap_or((0.0, 0.0));

            rows.push(BillingRow {
                client_name: client.clone(),
                session: request.session,
                balance,
                net_weight_received,
                net_weight_dispatched,
            });
        }
    }

    order_rows(&mut rows, request.descending, |r| (r.balance.date, r.client_name.clone()));

    info!(
        "Billing report {}..={}: {} clients, {} rows",
        range.start,
        range.end,
        clients.len(),
        rows.len()
    );

    BillingReport { range, rows }
}

fn billing_clients(
    movements: &MovementMap,
    opening_snapshot: Option<&InventorySnapshot>,
    request: &ReportRequest,
) -> Vec<String> {
    if let Some(list) = &request.clients {
        let mut seen = BTreeSet::new();
        return list
            .iter()
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty() && seen.insert(c.clone()))
            .collect();
    }

    // Clients with stock carried into the range but no movement still get a series.
    let mut clients: BTreeSet<String> = clients_in(movements).into_iter().collect();
    if let Some(snapshot) = opening_snapshot {
        let owners: BTreeSet<&str> = snapshot
            .rows
            .iter()
            .map(|r| r.owner_name())
            .filter(|o| !o.is_empty())
            .collect();
        for owner in owners {
            if reduce_snapshot(snapshot, owner, request.session) > 0 {
                clients.insert(owner.to_string());
            }
        }
    }
    clients.into_iter().collect()
}

/// Consolidated report: movements and inventory counts outer-joined on (date, client).
/// A side with no data for a key contributes zeros.
pub fn compose_consolidated(
    records: &[OperationRecord],
    snapshots: &[InventorySnapshot],
    request: &ReportRequest,
) -> ConsolidatedReport {
    let range = request.date_range();
    if range.is_empty() {
        return ConsolidatedReport {
            range,
            rows: Vec::new(),
        };
    }

    let records = relevant_records(records, request);
    let movements = aggregate(&records, range, request.session);

    let mut joined: BTreeMap<(NaiveDate, String), ConsolidatedRow> = BTreeMap::new();

    for movement in movements.values() {
        let row = joined
            .entry((movement.date, movement.client_name.clone()))
            .or_insert_with(|| ConsolidatedRow::zero(movement.date, &movement.client_name));
        row.pallets_received += movement.pallets_received;
        row.pallets_dispatched += movement.pallets_dispatched;
    }

    let mut inventory_days = 0usize;
    for snapshot in snapshots.iter().filter(|s| range.contains(s.date)) {
        inventory_days += 1;
        let owners: BTreeSet<&str> = snapshot
            .rows
            .iter()
            .map(|r| r.owner_name())
            .filter(|o| !o.is_empty() && request.includes_client(o))
            .collect();

        for owner in owners {
            let count = reduce_snapshot(snapshot, owner, request.session);
            let row = joined
                .entry((snapshot.date, owner.to_string()))
                .or_insert_with(|| ConsolidatedRow::zero(snapshot.date, owner));
            row.inventory_pallets += count;
        }
    }

    let mut rows: Vec<ConsolidatedRow> = joined.into_values().collect();
    order_rows(&mut rows, request.descending, |r| (r.date, r.client_name.clone()));

    debug!(
        "Consolidated {} movements with {} inventory days",
        movements.len(),
        inventory_days
    );
    info!(
        "Consolidated report {}..={}: {} rows",
        range.start,
        range.end,
        rows.len()
    );

    ConsolidatedReport { range, rows }
}

impl ConsolidatedRow {
    fn zero(date: NaiveDate, client_name: &str) -> Self {
        Self {
            date,
            client_name: client_name.to_string(),
            pallets_received: 0,
            pallets_dispatched: 0,
            inventory_pallets: 0,
        }
    }
}

/// Inventory pivot: snapshot days as rows, clients as columns.
pub fn compose_pivot(snapshots: &[InventorySnapshot], request: &ReportRequest) -> PivotTable {
    let range = request.date_range();
    let in_range: Vec<InventorySnapshot> = snapshots
        .iter()
        .filter(|s| range.contains(s.date))
        .cloned()
        .collect();

    let mut pivot = reduce_snapshot_pivot(&in_range, request.clients.as_deref(), request.session);
    if request.descending {
        pivot.rows.reverse();
    }

    info!(
        "Pivot report {}..={}: {} rows x {} clients",
        range.start,
        range.end,
        pivot.rows.len(),
        pivot.client_headers.len()
    );

    pivot
}

fn order_rows<T, K, F>(rows: &mut [T], descending: bool, key: F)
where
    K: Ord,
    F: Fn(&T) -> K,
{
    rows.sort_by_key(|r| key(r));
    if descending {
        rows.reverse();
    }
}

/// Composes reports from injected data sources.
pub struct ReportBuilder<O, S> {
    operations: O,
    snapshots: S,
}

impl<O, S> ReportBuilder<O, S>
where
    O: OperationSource,
    S: SnapshotSource,
{
    pub fn new(operations: O, snapshots: S) -> Self {
        Self {
            operations,
            snapshots,
        }
    }

    pub fn billing_report(&self, request: &ReportRequest) -> Result<BillingReport> {
        let range = request.date_range();
        if range.is_empty() {
            return Ok(BillingReport::empty(range));
        }

        let records = self.fetch_operations(request)?;
        let opening: Vec<InventorySnapshot> =
            self.snapshots.latest_before(range.start)?.into_iter().collect();

        Ok(compose_billing(&records, &opening, request))
    }

    /// Like [`Self::billing_report`], then re-checks balance continuity.
    pub fn billing_report_with_verification(&self, request: &ReportRequest) -> Result<BillingReport> {
        let report = self.billing_report(request)?;
        report.verify()?;
        Ok(report)
    }

    pub fn consolidated_report(&self, request: &ReportRequest) -> Result<ConsolidatedReport> {
        let range = request.date_range();
        if range.is_empty() {
            return Ok(ConsolidatedReport {
                range,
                rows: Vec::new(),
            });
        }

        let records = self.fetch_operations(request)?;
        let snapshots = self.snapshots.snapshots(range)?;

        Ok(compose_consolidated(&records, &snapshots, request))
    }

    pub fn pivot_report(&self, request: &ReportRequest) -> Result<PivotTable> {
        let range = request.date_range();
        if range.is_empty() {
            return Ok(PivotTable::default());
        }

        let snapshots = self.snapshots.snapshots(range)?;
        Ok(compose_pivot(&snapshots, request))
    }

    fn fetch_operations(&self, request: &ReportRequest) -> Result<Vec<OperationRecord>> {
        let range = request.date_range();
        match request.clients.as_deref() {
            Some([single]) => self.operations.operations(range, Some(single.trim())),
            _ => self.operations.operations(range, None),
        }
    }
}
