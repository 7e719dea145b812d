use crate::normalizer::{normalize, normalize_for_session, PalletTotals};
use crate::schema::{DateRange, OperationKind, OperationRecord, Session};
use crate::utils::signed_count;
use chrono::NaiveDate;
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MovementKey {
    pub date: NaiveDate,
    pub client: String,
    pub session: Option<Session>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyMovement {
    pub date: NaiveDate,
    pub client_name: String,
    pub session: Option<Session>,
    pub pallets_received: u64,
    pub pallets_dispatched: u64,
    pub net_weight_received: f64,
    pub net_weight_dispatched: f64,
}

impl DailyMovement {
    pub fn empty(date: NaiveDate, client_name: &str, session: Option<Session>) -> Self {
        Self {
            date,
            client_name: client_name.to_string(),
            session,
            pallets_received: 0,
            pallets_dispatched: 0,
            net_weight_received: 0.0,
            net_weight_dispatched: 0.0,
        }
    }

    pub fn net_pallets(&self) -> i64 {
        signed_count(self.pallets_received).saturating_sub(signed_count(self.pallets_dispatched))
    }

    fn add(&mut self, kind: OperationKind, totals: PalletTotals) {
        match kind {
            OperationKind::Reception => {
                self.pallets_received = self.pallets_received.saturating_add(totals.pallet_count);
                self.net_weight_received += totals.net_weight;
            }
            OperationKind::Dispatch => {
                self.pallets_dispatched = self.pallets_dispatched.saturating_add(totals.pallet_count);
                self.net_weight_dispatched += totals.net_weight;
            }
            OperationKind::Unrecognized => {}
        }
    }
}

pub type MovementMap = BTreeMap<MovementKey, DailyMovement>;

/// Buckets operation records into per-day, per-client movement totals.
///
/// Only days with at least one contributing record appear in the output;
/// filling the gaps belongs to the balance calculator.
pub struct DailyAggregator {
    range: DateRange,
    session: Option<Session>,
}

impl DailyAggregator {
    pub fn new(range: DateRange, session: Option<Session>) -> Self {
        Self { range, session }
    }

    pub fn aggregate(&self, records: &[OperationRecord]) -> MovementMap {
        let mut movements = MovementMap::new();
        self.accumulate(records, &mut movements);
        movements
    }

    fn accumulate(&self, records: &[OperationRecord], movements: &mut MovementMap) {
        if self.range.is_empty() {
            return;
        }

        let mut skipped = 0usize;

        for record in records {
            if record.operation_kind == OperationKind::Unrecognized
                || !self.range.contains(record.date)
            {
                skipped += 1;
                continue;
            }

            let totals = match self.session {
                Some(session) => {
                    let totals = normalize_for_session(record, session);
                    // No line of this session: the record does not contribute.
                    if totals.is_zero() {
                        continue;
                    }
                    totals
                }
                None => normalize(record),
            };

            let key = MovementKey {
                date: record.date,
                client: record.client_name.clone(),
                session: self.session,
            };

            movements
                .entry(key)
                .or_insert_with(|| {
                    DailyMovement::empty(record.date, &record.client_name, self.session)
                })
                .add(record.operation_kind, totals);
        }

        debug!(
            "Aggregated {} records into {} daily movements ({} skipped, session {:?})",
            records.len(),
            movements.len(),
            skipped,
            self.session
        );
    }
}

pub fn aggregate(
    records: &[OperationRecord],
    range: DateRange,
    session: Option<Session>,
) -> MovementMap {
    DailyAggregator::new(range, session).aggregate(records)
}

/// One pass per session; a single record may feed several sessions.
pub fn aggregate_by_session(records: &[OperationRecord], range: DateRange) -> MovementMap {
    let mut movements = MovementMap::new();
    for session in Session::ALL {
        DailyAggregator::new(range, Some(session)).accumulate(records, &mut movements);
    }
    movements
}

/// Distinct clients present in a movement map, sorted.
pub fn clients_in(movements: &MovementMap) -> Vec<String> {
    let mut clients: Vec<String> = movements.keys().map(|k| k.client.clone()).collect();
    clients.sort();
    clients.dedup();
    clients
}

/// The per-day series of one client (and session), as consumed by the balance calculator.
pub fn movements_for_client(
    movements: &MovementMap,
    client: &str,
    session: Option<Session>,
) -> BTreeMap<NaiveDate, DailyMovement> {
    movements
        .iter()
        .filter(|(key, _)| key.client == client && key.session == session)
        .map(|(key, movement)| (key.date, movement.clone()))
        .collect()
}
