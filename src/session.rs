use crate::error::{Result, WarehouseError};
use crate::schema::{Session, SessionClass, TemperatureReading};

pub const FROZEN_MAX_TEMPERATURE: f64 = 0.0;
pub const REFRIGERATED_MAX_TEMPERATURE: f64 = 10.0;

/// Blank readings count as 0 degrees; readings that do not parse as a finite
/// number are `Unclassifiable`.
pub fn classify_session(reading: &TemperatureReading) -> SessionClass {
    let temperature = match reading {
        TemperatureReading::Blank => 0.0,
        TemperatureReading::Number(n) => *n,
        TemperatureReading::Text(text) => {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                0.0
            } else {
                match trimmed.replace(',', ".").parse::<f64>() {
                    Ok(n) => n,
                    Err(_) => return SessionClass::Unclassifiable,
                }
            }
        }
    };

    classify_temperature(temperature)
}

pub fn classify_temperature(temperature: f64) -> SessionClass {
    if !temperature.is_finite() {
        return SessionClass::Unclassifiable;
    }

    let session = if temperature <= FROZEN_MAX_TEMPERATURE {
        Session::Frozen
    } else if temperature <= REFRIGERATED_MAX_TEMPERATURE {
        Session::Refrigerated
    } else {
        Session::Dry
    };

    SessionClass::Classified(session)
}

impl Session {
    pub const ALL: [Session; 3] = [Session::Frozen, Session::Refrigerated, Session::Dry];

    /// Short code used in uploaded inventory files.
    pub fn code(self) -> &'static str {
        match self {
            Session::Frozen => "CO",
            Session::Refrigerated => "RE",
            Session::Dry => "SE",
        }
    }

    fn labels(self) -> &'static [&'static str] {
        match self {
            Session::Frozen => &["co", "frozen", "congelado", "congelados"],
            Session::Refrigerated => &["re", "refrigerated", "refrigerado", "refrigerados"],
            Session::Dry => &["se", "dry", "seco", "secos"],
        }
    }

    /// Compares a free-text session field, trimmed and case-insensitively.
    pub fn matches_label(self, label: &str) -> bool {
        let label = label.trim().to_lowercase();
        !label.is_empty() && self.labels().iter().any(|l| *l == label)
    }

    pub fn from_label(label: &str) -> Result<Session> {
        Session::ALL
            .into_iter()
            .find(|s| s.matches_label(label))
            .ok_or_else(|| WarehouseError::InvalidSession(label.to_string()))
    }
}
