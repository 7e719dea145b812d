use crate::error::{Result, WarehouseError};
use crate::schema::{DateRange, PalletRef};
use chrono::{Days, NaiveDate};
use log::warn;
use serde_json::Value;

/// Largest pallet count a single line may carry. Anything above is a data-entry error.
pub const MAX_LINE_PALLETS: u64 = 1_000_000;

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    /// A range whose start lies after its end covers no days.
    pub fn is_empty(&self) -> bool {
        self.start > self.end
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    /// Every calendar day in the range, ascending.
    pub fn days(&self) -> Vec<NaiveDate> {
        get_days_in_period(self.start, self.end)
    }

    pub fn len_days(&self) -> usize {
        if self.is_empty() {
            0
        } else {
            (self.end - self.start).num_days() as usize + 1
        }
    }
}

pub fn get_days_in_period(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    let mut dates = Vec::new();

    let mut current = start;
    while current <= end {
        dates.push(current);
        match current.checked_add_days(Days::new(1)) {
            Some(next) => current = next,
            None => break,
        }
    }

    dates
}

pub fn previous_day(date: NaiveDate) -> Option<NaiveDate> {
    date.checked_sub_days(Days::new(1))
}

/// Parses "YYYY-MM-DD", tolerating a trailing time component ("2024-01-05T08:00:00").
pub fn parse_day(value: &str) -> Result<NaiveDate> {
    let trimmed = value.trim();
    let day_part = trimmed.get(..10).unwrap_or(trimmed);

    NaiveDate::parse_from_str(day_part, "%Y-%m-%d").map_err(|_| {
        WarehouseError::InvalidDate(format!("Invalid date: {}. Expected YYYY-MM-DD", value))
    })
}

/// Lenient numeric coercion: anything that is not a finite number becomes 0.
pub fn coerce_number(value: &Value) -> f64 {
    let parsed = match value {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => s.trim().replace(',', ".").parse::<f64>().unwrap_or(0.0),
        Value::Bool(b) => {
            if *b {
                1.0
            } else {
                0.0
            }
        }
        _ => 0.0,
    };

    finite_or_zero(parsed)
}

/// Non-negative whole count. Values above [`MAX_LINE_PALLETS`] are treated as malformed and become 0.
pub fn coerce_count(value: &Value) -> u64 {
    let number = coerce_number(value);
    if number <= 0.0 {
        return 0;
    }

    let count = number.round();
    if count > MAX_LINE_PALLETS as f64 {
        warn!("Ignoring out-of-range count {}", value);
        return 0;
    }
    count as u64
}

/// Signed view of a count for balance arithmetic, saturating at `i64::MAX`.
pub fn signed_count(count: u64) -> i64 {
    i64::try_from(count).unwrap_or(i64::MAX)
}

pub fn coerce_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => String::new(),
    }
}

pub fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

impl PalletRef {
    /// Canonical string key, so that `42`, `42.0` and `"42"` collapse to one pallet.
    /// Returns `None` for blank identifiers.
    pub fn normalized(&self) -> Option<String> {
        match self {
            PalletRef::Number(n) => canonical_number(*n),
            PalletRef::Text(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    return None;
                }
                match trimmed.parse::<f64>() {
                    Ok(n) if n.is_finite() => canonical_number(n),
                    _ => Some(trimmed.to_string()),
                }
            }
        }
    }
}

fn canonical_number(n: f64) -> Option<String> {
    if !n.is_finite() {
        return None;
    }
    if n.fract() == 0.0 && n.abs() < 1e15 {
        Some(format!("{}", n as i64))
    } else {
        Some(format!("{}", n))
    }
}
