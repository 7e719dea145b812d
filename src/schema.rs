use chrono::NaiveDate;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord, JsonSchema)]
#[serde(rename_all = "PascalCase")]
pub enum Session {
    #[schemars(description = "Frozen storage: temperature at or below 0 degrees (code CO)")]
    Frozen,

    #[schemars(description = "Refrigerated storage: above 0 and up to 10 degrees (code RE)")]
    Refrigerated,

    #[schemars(description = "Dry storage: above 10 degrees (code SE)")]
    Dry,
}

/// Outcome of classifying a temperature reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionClass {
    Classified(Session),
    Unclassifiable,
}

impl SessionClass {
    pub fn session(self) -> Option<Session> {
        match self {
            SessionClass::Classified(session) => Some(session),
            SessionClass::Unclassifiable => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, Default)]
#[serde(untagged)]
pub enum TemperatureReading {
    Number(f64),
    Text(String),
    #[default]
    Blank,
}

/// Pallet identifier as it appears in uploaded files: sometimes a number, sometimes text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum PalletRef {
    Number(f64),
    Text(String),
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, JsonSchema)]
#[serde(rename_all = "PascalCase")]
pub enum OperationKind {
    #[schemars(description = "Goods entering the warehouse")]
    Reception,

    #[schemars(description = "Goods leaving the warehouse")]
    Dispatch,

    #[serde(other)]
    #[schemars(description = "Any kind this library does not understand; ignored by aggregation")]
    Unrecognized,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, JsonSchema)]
#[serde(rename_all = "PascalCase")]
pub enum WeightMode {
    #[schemars(description = "Fixed-weight products: each line already carries its pallet count")]
    Fixed,

    #[schemars(description = "Variable-weight products: pallets are tracked individually or summarized per description")]
    Variable,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, JsonSchema)]
#[serde(rename_all = "PascalCase")]
pub enum LineEncoding {
    #[schemars(description = "One line per physical pallet, identified by a non-zero pallet id")]
    Detailed,

    #[schemars(description = "One line per product description with pre-aggregated totals")]
    Summary,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, Default)]
pub struct LineItem {
    #[serde(default)]
    #[schemars(description = "Physical pallet number. 0 marks a summary row when the record carries no explicit encoding.")]
    pub pallet_id: u64,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub lot: String,

    #[serde(default)]
    pub presentation: String,

    #[serde(default)]
    pub quantity_per_pallet: f64,

    #[serde(default)]
    pub gross_weight: f64,

    #[serde(default)]
    pub tara_pallet: f64,

    #[serde(default)]
    pub tara_box: f64,

    #[serde(default)]
    pub temperature: TemperatureReading,

    #[serde(default)]
    #[schemars(description = "Pre-counted pallets on this line (fixed-weight records only)")]
    pub pallets: u64,

    #[serde(default)]
    #[schemars(description = "Net weight as recorded on the form. When absent it is derived from gross weight and taras.")]
    pub net_weight: Option<f64>,

    #[serde(default)]
    #[schemars(description = "Pallets represented by a summary row")]
    pub total_pallets: u64,

    #[serde(default)]
    #[schemars(description = "Net weight represented by a summary row")]
    pub total_net_weight: f64,
}

/// Nested per-destination or per-plate grouping of line items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, Default)]
pub struct ItemGroup {
    #[serde(default)]
    pub label: String,

    #[serde(default)]
    pub items: Vec<LineItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct OperationRecord {
    pub id: String,

    #[schemars(description = "Client that owns the goods, already normalized from any field-name variant")]
    pub client_name: String,

    pub operation_kind: OperationKind,

    pub weight_mode: WeightMode,

    #[schemars(description = "Operation calendar day (YYYY-MM-DD), distinct from the creation timestamp")]
    pub date: NaiveDate,

    #[serde(default)]
    pub line_items: Vec<LineItem>,

    #[serde(default)]
    pub item_groups: Vec<ItemGroup>,

    #[serde(default)]
    #[schemars(description = "Explicit line encoding. When absent, any line with pallet_id 0 makes the record summary-form.")]
    pub encoding: Option<LineEncoding>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, Default)]
pub struct SnapshotRow {
    #[serde(default)]
    pub owner: String,

    #[serde(default)]
    pub pallet_id: Option<PalletRef>,

    #[serde(default)]
    pub session: String,

    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct InventorySnapshot {
    #[schemars(description = "Inventory day; also the storage key of the uploaded file")]
    pub date: NaiveDate,

    #[serde(default)]
    pub rows: Vec<SnapshotRow>,
}

/// Inclusive calendar range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl OperationRecord {
    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(OperationRecord)
    }

    pub fn schema_as_json() -> Result<String, serde_json::Error> {
        let schema = Self::generate_json_schema();
        serde_json::to_string_pretty(&schema)
    }
}

impl InventorySnapshot {
    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(InventorySnapshot)
    }

    pub fn schema_as_json() -> Result<String, serde_json::Error> {
        let schema = Self::generate_json_schema();
        serde_json::to_string_pretty(&schema)
    }
}
