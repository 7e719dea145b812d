//! Adapter from raw stored documents to the record shapes the report engine works on.
//!
//! Submissions were written by several generations of forms, so the same fact
//! appears under different field names (`cliente`, `nombreCliente`, `clientName`)
//! and operation kinds are spelled in Spanish or English. All of that is resolved
//! here; nothing downstream knows about the variants.

use crate::config::IngestionConfig;
use crate::error::{Result, WarehouseError};
use crate::schema::{
    InventorySnapshot, ItemGroup, LineEncoding, LineItem, OperationKind, OperationRecord,
    PalletRef, SnapshotRow, TemperatureReading, WeightMode,
};
use crate::utils::{coerce_count, coerce_number, coerce_text, parse_day};
use log::{debug, warn};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

const CLIENT_FIELDS: &[&str] = &["clientName", "client_name", "nombreCliente", "cliente", "client"];
const KIND_FIELDS: &[&str] = &["operationKind", "operation_kind", "formType", "tipo", "type", "kind"];
const WEIGHT_MODE_FIELDS: &[&str] = &["weightMode", "weight_mode", "tipoPeso", "tipo_peso"];
const DATE_FIELDS: &[&str] = &["date", "fecha", "operationDate", "fechaOperacion"];
const CREATED_FIELDS: &[&str] = &["createdAt", "created_at", "fechaCreacion"];
const ID_FIELDS: &[&str] = &["id", "_id", "docId"];
const ITEM_FIELDS: &[&str] = &["items", "lineItems", "line_items", "productos"];
const GROUP_FIELDS: &[&str] = &["item_groups", "groups", "destinos", "placas"];
const GROUP_LABEL_FIELDS: &[&str] = &["label", "nombreDestino", "destino", "placa", "name"];
const ENCODING_FIELDS: &[&str] = &["encoding", "summaryMode", "isSummary"];

const SNAPSHOT_ROW_FIELDS: &[&str] = &["rows", "data", "items"];
const OWNER_COLUMNS: &[&str] = &["owner", "propietario", "cliente"];
const PALLET_COLUMNS: &[&str] = &["palletid", "pallet_id", "paleta", "pallet"];
const SESSION_COLUMNS: &[&str] = &["session", "sesion", "se"];

/// Looks a field up on the document, then inside its `formData` payload.
/// Null values count as missing.
fn field<'a>(doc: &'a Value, names: &[&str]) -> Option<&'a Value> {
    let lookup = |object: &'a Value| {
        names
            .iter()
            .filter_map(|name| object.get(*name))
            .find(|v| !v.is_null())
    };

    lookup(doc).or_else(|| doc.get("formData").and_then(lookup))
}

fn text_field(doc: &Value, names: &[&str]) -> String {
    field(doc, names).map(coerce_text).unwrap_or_default()
}

fn number_field(doc: &Value, names: &[&str]) -> f64 {
    field(doc, names).map(coerce_number).unwrap_or(0.0)
}

const RECEPTION_TOKENS: &[&str] = &["recepcion", "reception", "receipt", "entrada", "ingreso"];
const DISPATCH_TOKENS: &[&str] = &["despacho", "dispatch", "salida", "egreso"];

/// Splits the label into words ("fixed-weight-recepcion" -> fixed, weight, recepcion)
/// and matches whole words only. A label naming both kinds is not recognized.
pub fn parse_operation_kind(label: &str) -> OperationKind {
    let label = label.to_lowercase().replace('ó', "o");
    let tokens: Vec<&str> = label
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .collect();

    let reception = tokens.iter().any(|t| RECEPTION_TOKENS.contains(t));
    let dispatch = tokens.iter().any(|t| DISPATCH_TOKENS.contains(t));

    match (reception, dispatch) {
        (true, false) => OperationKind::Reception,
        (false, true) => OperationKind::Dispatch,
        _ => OperationKind::Unrecognized,
    }
}

/// Explicit field first; otherwise the form type ("fixed-weight-recepcion") decides.
fn parse_weight_mode(doc: &Value, kind_label: &str) -> WeightMode {
    let label = field(doc, WEIGHT_MODE_FIELDS)
        .map(coerce_text)
        .unwrap_or_else(|| kind_label.to_string())
        .to_lowercase();

    if label.contains("fixed") || label.contains("fijo") {
        WeightMode::Fixed
    } else {
        WeightMode::Variable
    }
}

fn parse_encoding(doc: &Value) -> Option<LineEncoding> {
    match field(doc, ENCODING_FIELDS)? {
        Value::Bool(true) => Some(LineEncoding::Summary),
        Value::Bool(false) => Some(LineEncoding::Detailed),
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "summary" | "resumen" => Some(LineEncoding::Summary),
            "detailed" | "detallado" => Some(LineEncoding::Detailed),
            _ => None,
        },
        _ => None,
    }
}

fn parse_temperature(value: Option<&Value>) -> TemperatureReading {
    match value {
        Some(Value::Number(n)) => n
            .as_f64()
            .map(TemperatureReading::Number)
            .unwrap_or(TemperatureReading::Blank),
        Some(Value::String(s)) => TemperatureReading::Text(s.clone()),
        _ => TemperatureReading::Blank,
    }
}

/// Largest pallet id that survives a round trip through `f64`.
const MAX_PALLET_ID: f64 = 9_007_199_254_740_991.0;

/// A missing or blank id is the summary-row sentinel 0. Any other value must be a
/// non-negative whole number; text ids and fractions are rejected.
fn parse_pallet_id(value: Option<&Value>) -> Result<u64> {
    let whole = |n: f64| {
        if n.is_finite() && n >= 0.0 && n.fract() == 0.0 && n <= MAX_PALLET_ID {
            Some(n as u64)
        } else {
            None
        }
    };

    let parsed = match value {
        None => Some(0),
        Some(Value::Number(n)) => n.as_u64().or_else(|| n.as_f64().and_then(whole)),
        Some(Value::String(s)) if s.trim().is_empty() => Some(0),
        Some(Value::String(s)) => {
            let trimmed = s.trim();
            trimmed
                .parse::<u64>()
                .ok()
                .or_else(|| trimmed.parse::<f64>().ok().and_then(whole))
        }
        Some(_) => None,
    };

    parsed.ok_or_else(|| {
        WarehouseError::MalformedDocument(format!(
            "Unusable pallet id {}",
            value.map(Value::to_string).unwrap_or_default()
        ))
    })
}

pub fn parse_line_item(item: &Value) -> Result<LineItem> {
    let net_weight = ["netWeight", "net_weight", "pesoNeto"]
        .iter()
        .filter_map(|name| item.get(*name))
        .find(|v| !v.is_null())
        .map(coerce_number);

    Ok(LineItem {
        pallet_id: parse_pallet_id(field(item, &["palletId", "pallet_id", "paleta"]))?,
        description: text_field(item, &["description", "descripcion"]),
        lot: text_field(item, &["lot", "lote"]),
        presentation: text_field(item, &["presentation", "presentacion"]),
        quantity_per_pallet: number_field(
            item,
            &["quantityPerPallet", "quantity_per_pallet", "cantidadPorPaleta"],
        ),
        gross_weight: number_field(item, &["grossWeight", "gross_weight", "pesoBruto"]),
        tara_pallet: number_field(item, &["taraPallet", "tara_pallet", "taraEstiba"]),
        tara_box: number_field(item, &["taraBox", "tara_box", "taraCaja"]),
        temperature: parse_temperature(field(item, &["temperature", "temperatura"])),
        pallets: field(item, &["pallets", "paletas"]).map(coerce_count).unwrap_or(0),
        net_weight,
        total_pallets: field(item, &["totalPallets", "total_pallets", "totalPaletas"])
            .map(coerce_count)
            .unwrap_or(0),
        total_net_weight: number_field(
            item,
            &["totalNetWeight", "total_net_weight", "totalPesoNeto"],
        ),
    })
}

/// Lines that cannot be parsed are dropped with a warning; the rest of the record stands.
fn parse_items(value: Option<&Value>) -> Vec<LineItem> {
    let items = match value {
        Some(Value::Array(items)) => items,
        _ => return Vec::new(),
    };

    items
        .iter()
        .filter(|item| item.is_object())
        .filter_map(|item| match parse_line_item(item) {
            Ok(line) => Some(line),
            Err(e) => {
                warn!("Skipping line item: {}", e);
                None
            }
        })
        .collect()
}

fn parse_groups(doc: &Value) -> Vec<ItemGroup> {
    match field(doc, GROUP_FIELDS) {
        Some(Value::Array(groups)) => groups
            .iter()
            .filter(|g| g.is_object())
            .map(|group| ItemGroup {
                label: text_field(group, GROUP_LABEL_FIELDS),
                items: parse_items(field(group, ITEM_FIELDS)),
            })
            .collect(),
        _ => Vec::new(),
    }
}

/// Maps one stored submission into an [`OperationRecord`].
///
/// Missing numbers become 0 and missing text becomes empty. The operation date is
/// taken as written, truncated to the day; only the creation timestamp fallback is
/// shifted into local time. A document with neither is rejected.
pub fn parse_operation(doc: &Value, config: &IngestionConfig) -> Result<OperationRecord> {
    if !doc.is_object() {
        return Err(WarehouseError::MalformedDocument(
            "Operation document is not an object".to_string(),
        ));
    }

    let id = text_field(doc, ID_FIELDS);
    let kind_label = text_field(doc, KIND_FIELDS);
    let operation_kind = parse_operation_kind(&kind_label);

    let date = match field(doc, DATE_FIELDS).map(coerce_text) {
        Some(day) if !day.is_empty() => parse_day(&day)?,
        _ => match field(doc, CREATED_FIELDS).map(coerce_text) {
            Some(created) if !created.is_empty() => config.time_policy.day_of(&created)?,
            _ => {
                return Err(WarehouseError::MalformedDocument(format!(
                    "Operation {} has no operation or creation date",
                    id
                )))
            }
        },
    };

    Ok(OperationRecord {
        client_name: text_field(doc, CLIENT_FIELDS),
        operation_kind,
        weight_mode: parse_weight_mode(doc, &kind_label),
        date,
        line_items: parse_items(field(doc, ITEM_FIELDS)),
        item_groups: parse_groups(doc),
        encoding: parse_encoding(doc),
        id,
    })
}

/// Parses every document, skipping (and logging) the ones that cannot be used.
pub fn parse_operations(docs: &[Value], config: &IngestionConfig) -> Vec<OperationRecord> {
    let mut records = Vec::with_capacity(docs.len());

    for (idx, doc) in docs.iter().enumerate() {
        match parse_operation(doc, config) {
            Ok(record) => {
                if record.operation_kind == OperationKind::Unrecognized {
                    warn!(
                        "Operation {} has an unrecognized kind; it will not be aggregated",
                        record.id
                    );
                }
                records.push(record);
            }
            Err(e) => warn!("Skipping operation document #{}: {}", idx, e),
        }
    }

    debug!("Parsed {} of {} operation documents", records.len(), docs.len());
    records
}

/// Case-insensitive column lookup, since spreadsheet headers vary in case.
fn column<'a>(row: &'a Map<String, Value>, names: &[&str]) -> Option<(&'a String, &'a Value)> {
    row.iter()
        .find(|(key, value)| {
            let key = key.trim().to_lowercase();
            !value.is_null() && names.iter().any(|n| *n == key)
        })
}

fn parse_pallet_ref(value: &Value) -> Option<PalletRef> {
    match value {
        Value::Number(n) => n.as_f64().map(PalletRef::Number),
        Value::String(s) if !s.trim().is_empty() => Some(PalletRef::Text(s.clone())),
        _ => None,
    }
}

pub fn parse_snapshot_row(row: &Map<String, Value>) -> SnapshotRow {
    let owner = column(row, OWNER_COLUMNS);
    let pallet = column(row, PALLET_COLUMNS);
    let session = column(row, SESSION_COLUMNS);

    let known: Vec<&String> = [owner, pallet, session]
        .iter()
        .flatten()
        .map(|(key, _)| *key)
        .collect();

    let extra: BTreeMap<String, Value> = row
        .iter()
        .filter(|(key, _)| !known.contains(key))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();

    SnapshotRow {
        owner: owner.map(|(_, v)| coerce_text(v)).unwrap_or_default(),
        pallet_id: pallet.and_then(|(_, v)| parse_pallet_ref(v)),
        session: session.map(|(_, v)| coerce_text(v)).unwrap_or_default(),
        extra,
    }
}

/// Builds a snapshot from an uploaded inventory document stored under `key`
/// (the inventory day, "YYYY-MM-DD").
pub fn parse_snapshot(key: &str, doc: &Value) -> Result<InventorySnapshot> {
    let date = match doc.get("date").map(coerce_text) {
        Some(day) if !day.is_empty() => parse_day(&day)?,
        _ => parse_day(key)?,
    };

    let rows = SNAPSHOT_ROW_FIELDS
        .iter()
        .find_map(|name| doc.get(*name).and_then(Value::as_array))
        .ok_or_else(|| {
            WarehouseError::MalformedDocument(format!("Inventory {} has no row array", key))
        })?;

    let mut parsed = Vec::with_capacity(rows.len());
    let mut skipped = 0usize;
    for row in rows {
        match row.as_object() {
            Some(object) => parsed.push(parse_snapshot_row(object)),
            None => skipped += 1,
        }
    }

    if skipped > 0 {
        warn!("Inventory {}: skipped {} rows that are not objects", key, skipped);
    }

    Ok(InventorySnapshot { date, rows: parsed })
}

pub fn parse_snapshots(docs: &[(String, Value)]) -> Vec<InventorySnapshot> {
    docs.iter()
        .filter_map(|(key, doc)| match parse_snapshot(key, doc) {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                warn!("Skipping inventory document {}: {}", key, e);
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LocalTimePolicy;
    use chrono::NaiveDate;
    use serde_json::json;

    fn config() -> IngestionConfig {
        IngestionConfig {
            time_policy: LocalTimePolicy::default(),
        }
    }

    #[test]
    fn test_client_field_variants() {
        let docs = [
            json!({"cliente": "ACME", "tipo": "recepcion", "fecha": "2024-01-02"}),
            json!({"nombreCliente": " ACME ", "tipo": "despacho", "fecha": "2024-01-02"}),
            json!({"formData": {"clientName": "ACME", "fecha": "2024-01-02"}, "formType": "variable-weight-reception"}),
        ];

        let records = parse_operations(&docs, &config());
        assert_eq!(records.len(), 3);
        assert!(records.iter().all(|r| r.client_name == "ACME"));
        assert_eq!(records[0].operation_kind, OperationKind::Reception);
        assert_eq!(records[1].operation_kind, OperationKind::Dispatch);
        assert_eq!(records[2].operation_kind, OperationKind::Reception);
    }

    #[test]
    fn test_weight_mode_from_form_type() {
        let doc = json!({"formType": "fixed-weight-despacho", "cliente": "ACME", "fecha": "2024-01-02"});
        let record = parse_operation(&doc, &config()).unwrap();
        assert_eq!(record.weight_mode, WeightMode::Fixed);
        assert_eq!(record.operation_kind, OperationKind::Dispatch);

        let doc = json!({"formType": "transfer", "cliente": "ACME", "fecha": "2024-01-02"});
        let record = parse_operation(&doc, &config()).unwrap();
        assert_eq!(record.weight_mode, WeightMode::Variable);
        assert_eq!(record.operation_kind, OperationKind::Unrecognized);
    }

    #[test]
    fn test_creation_timestamp_uses_local_policy() {
        let doc = json!({"cliente": "ACME", "tipo": "recepcion", "createdAt": "2024-01-02T02:00:00Z"});
        let record = parse_operation(&doc, &config()).unwrap();
        assert_eq!(record.date, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
    }

    #[test]
    fn test_documents_without_dates_are_skipped() {
        let docs = [
            json!({"cliente": "ACME", "tipo": "recepcion"}),
            json!("not an object"),
            json!({"cliente": "ACME", "tipo": "recepcion", "fecha": "2024-01-02"}),
        ];
        assert_eq!(parse_operations(&docs, &config()).len(), 1);
    }

    #[test]
    fn test_line_items_and_groups() {
        let doc = json!({
            "cliente": "ACME",
            "tipo": "despacho",
            "fecha": "2024-01-03",
            "productos": [
                {"paleta": "12", "descripcion": "Beef", "pesoBruto": "1000", "taraEstiba": 20,
                 "taraCaja": 0.5, "cantidadPorPaleta": 40, "temperatura": -18},
                {"paleta": null, "temperatura": "", "totalPaletas": 3, "totalPesoNeto": "900,5"}
            ],
            "destinos": [
                {"nombreDestino": "North", "items": [{"paleta": 13, "pesoNeto": 400}]}
            ]
        });

        let record = parse_operation(&doc, &config()).unwrap();
        assert_eq!(record.line_items.len(), 2);

        let first = &record.line_items[0];
        assert_eq!(first.pallet_id, 12);
        assert_eq!(first.description, "Beef");
        assert_eq!(first.temperature, TemperatureReading::Number(-18.0));
        assert!((first.effective_net_weight() - 960.0).abs() < 1e-9);

        let second = &record.line_items[1];
        assert_eq!(second.pallet_id, 0);
        assert_eq!(second.total_pallets, 3);
        assert!((second.total_net_weight - 900.5).abs() < 1e-9);
        assert_eq!(second.temperature, TemperatureReading::Text(String::new()));

        assert_eq!(record.item_groups.len(), 1);
        assert_eq!(record.item_groups[0].label, "North");
        assert_eq!(record.item_groups[0].items[0].net_weight, Some(400.0));
    }

    #[test]
    fn test_operation_kind_matches_whole_words() {
        assert_eq!(parse_operation_kind("fixed-weight-recepcion"), OperationKind::Reception);
        assert_eq!(parse_operation_kind("Recepción"), OperationKind::Reception);
        assert_eq!(parse_operation_kind("DESPACHO"), OperationKind::Dispatch);
        assert_eq!(parse_operation_kind("variable_weight_salida"), OperationKind::Dispatch);
        assert_eq!(parse_operation_kind("recepcion-despacho"), OperationKind::Unrecognized);
        assert_eq!(parse_operation_kind("preceptor"), OperationKind::Unrecognized);
        assert_eq!(parse_operation_kind("salidas-temporales"), OperationKind::Unrecognized);
    }

    #[test]
    fn test_explicit_operation_date_is_not_shifted() {
        let doc = json!({"cliente": "ACME", "tipo": "recepcion", "fecha": "2024-01-02T03:00:00Z",
                         "createdAt": "2024-01-02T03:00:00Z"});
        let record = parse_operation(&doc, &config()).unwrap();
        assert_eq!(record.date, NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
    }

    #[test]
    fn test_unusable_pallet_ids_skip_the_line() {
        let doc = json!({
            "cliente": "ACME",
            "tipo": "recepcion",
            "fecha": "2024-01-02",
            "items": [
                {"paleta": "P-1", "pesoNeto": 100},
                {"paleta": "P-2", "pesoNeto": 100},
                {"paleta": "12.4", "pesoNeto": 100},
                {"paleta": "12.3", "pesoNeto": 100},
                {"paleta": true, "pesoNeto": 100},
                {"paleta": "7.0", "pesoNeto": 100},
                {"paleta": 8, "pesoNeto": 100}
            ]
        });

        let record = parse_operation(&doc, &config()).unwrap();
        let ids: Vec<u64> = record.line_items.iter().map(|i| i.pallet_id).collect();
        assert_eq!(ids, vec![7, 8]);
        assert_eq!(record.line_encoding(), LineEncoding::Detailed);

        let totals = crate::normalizer::normalize(&record);
        assert_eq!(totals.pallet_count, 2);
        assert!((totals.net_weight - 200.0).abs() < 1e-9);
    }

    #[test]
    fn test_explicit_encoding_flag() {
        let doc = json!({"cliente": "ACME", "tipo": "recepcion", "fecha": "2024-01-02", "isSummary": false});
        let record = parse_operation(&doc, &config()).unwrap();
        assert_eq!(record.encoding, Some(LineEncoding::Detailed));
    }

    #[test]
    fn test_snapshot_columns_are_case_insensitive() {
        let doc = json!({
            "rows": [
                {"PROPIETARIO": "ACME", "PALETA": 77, "SE": "CO", "UBICACION": "A-1"},
                {"owner": "ACME", "palletId": "78", "session": "re"},
                "garbage"
            ]
        });

        let snapshot = parse_snapshot("2024-01-05", &doc).unwrap();
        assert_eq!(snapshot.date, NaiveDate::from_ymd_opt(2024, 1, 5).unwrap());
        assert_eq!(snapshot.rows.len(), 2);
        assert_eq!(snapshot.rows[0].owner, "ACME");
        assert_eq!(snapshot.rows[0].pallet_id, Some(PalletRef::Number(77.0)));
        assert_eq!(snapshot.rows[0].session, "CO");
        assert!(snapshot.rows[0].extra.contains_key("UBICACION"));
        assert_eq!(snapshot.rows[1].pallet_id, Some(PalletRef::Text("78".to_string())));
    }

    #[test]
    fn test_malformed_snapshots_are_skipped() {
        let docs = vec![
            ("2024-01-05".to_string(), json!({"rows": "oops"})),
            ("not-a-date".to_string(), json!({"rows": []})),
            ("2024-01-06".to_string(), json!({"data": [{"owner": "ACME", "paleta": 1}]})),
        ];

        let snapshots = parse_snapshots(&docs);
        assert_eq!(snapshots.len(), 1);
        assert_eq!(snapshots[0].date, NaiveDate::from_ymd_opt(2024, 1, 6).unwrap());
    }
}
