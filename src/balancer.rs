use crate::aggregator::DailyMovement;
use crate::error::{Result, WarehouseError};
use crate::schema::DateRange;
use crate::utils::signed_count;
use chrono::NaiveDate;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct RunningBalance {
    pub date: NaiveDate,
    pub opening_balance: i64,
    pub pallets_received: u64,
    pub pallets_dispatched: u64,
    pub closing_balance: i64,
}

pub struct BalanceCalculator {
    range: DateRange,
}

impl BalanceCalculator {
    pub fn new(range: DateRange) -> Self {
        Self { range }
    }

    /// Left fold over every day of the range. Days without movement carry the
    /// previous closing balance unchanged; balances are never clamped.
    pub fn compute(
        &self,
        opening: i64,
        movements: &BTreeMap<NaiveDate, DailyMovement>,
    ) -> Vec<RunningBalance> {
        let mut rows = Vec::with_capacity(self.range.len_days());
        let mut carry = opening;

        for date in self.range.days() {
            let (received, dispatched) = movements
                .get(&date)
                .map(|m| (m.pallets_received, m.pallets_dispatched))
                .unwrap_or((0, 0));

            let closing = apply_movement(carry, received, dispatched);

            rows.push(RunningBalance {
                date,
                opening_balance: carry,
                pallets_received: received,
                pallets_dispatched: dispatched,
                closing_balance: closing,
            });

            carry = closing;
        }

        rows
    }

    pub fn verify_continuity(&self, rows: &[RunningBalance]) -> Result<()> {
        for row in rows {
            if !self.range.contains(row.date) {
                return Err(WarehouseError::InvalidDate(format!(
                    "Balance row {} lies outside {}..={}",
                    row.date, self.range.start, self.range.end
                )));
            }
        }
        verify_continuity(rows)
    }
}

/// `opening + received - dispatched`, saturating at the bounds of `i64`.
fn apply_movement(opening: i64, received: u64, dispatched: u64) -> i64 {
    opening
        .saturating_add(signed_count(received))
        .saturating_sub(signed_count(dispatched))
}

pub fn compute_balances(
    opening: i64,
    movements: &BTreeMap<NaiveDate, DailyMovement>,
    range: DateRange,
) -> Vec<RunningBalance> {
    BalanceCalculator::new(range).compute(opening, movements)
}

/// Checks that each row's closing balance is its own arithmetic and is the
/// next day's opening balance.
pub fn verify_continuity(rows: &[RunningBalance]) -> Result<()> {
    for row in rows {
        let expected =
            apply_movement(row.opening_balance, row.pallets_received, row.pallets_dispatched);
        if expected != row.closing_balance {
            return Err(WarehouseError::ContinuityViolation {
                date: row.date,
                expected,
                found: row.closing_balance,
            });
        }
    }

    for pair in rows.windows(2) {
        let (prev, next) = (&pair[0], &pair[1]);

        if next.date.signed_duration_since(prev.date).num_days() != 1 {
            return Err(WarehouseError::InvalidDate(format!(
                "Balance rows jump from {} to {}",
                prev.date, next.date
            )));
        }

        if prev.closing_balance != next.opening_balance {
            return Err(WarehouseError::ContinuityViolation {
                date: next.date,
                expected: prev.closing_balance,
                found: next.opening_balance,
            });
        }
    }

    Ok(())
}
