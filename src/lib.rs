//! # Warehouse Movement Reports
//!
//! A library for turning warehouse reception/dispatch submissions and daily
//! inventory uploads into daily movement reports with running-balance integrity.
//!
//! ## Core Concepts
//!
//! - **Operation Records**: Receptions and dispatches, fixed or variable weight, with
//!   pallets either listed one by one (detailed) or pre-aggregated per product (summary)
//! - **Sessions**: Temperature categories (Frozen, Refrigerated, Dry) used to segment billing
//! - **Daily Movements**: Pallets received and dispatched per client per calendar day
//! - **Running Balances**: Opening/closing stock for every day of a range; each closing
//!   balance is the next day's opening balance
//! - **Inventory Snapshots**: Uploaded daily stock files, reduced to distinct pallet counts
//!
//! ## Example
//!
//! ```rust,ignore
//! use warehouse_movement_reports::*;
//! use chrono::NaiveDate;
//!
//! let request = ReportRequest::new(
//!     NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
//!     NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
//! );
//!
//! let builder = ReportBuilder::new(
//!     InMemoryOperations::new(parse_operations(&operation_docs, &IngestionConfig::default())),
//!     parse_snapshots(&inventory_docs).into_iter().collect::<InMemorySnapshots>(),
//! );
//!
//! let billing = builder.billing_report_with_verification(&request).unwrap();
//! ```

pub mod aggregator;
pub mod balancer;
pub mod config;
pub mod error;
pub mod ingestion;
pub mod inventory;
pub mod normalizer;
pub mod reports;
pub mod schema;
pub mod session;
pub mod sources;
pub mod utils;

pub use aggregator::{
    aggregate, aggregate_by_session, clients_in, movements_for_client, DailyAggregator,
    DailyMovement, MovementKey, MovementMap,
};
pub use balancer::{
    compute_balances, verify_continuity, BalanceCalculator, RunningBalance,
};
pub use config::{IngestionConfig, LocalTimePolicy, ReportRequest};
pub use error::{Result, WarehouseError};
pub use ingestion::{parse_operation, parse_operations, parse_snapshot, parse_snapshots};
pub use inventory::{
    daily_counts, latest_snapshot_before, opening_balance, reduce_snapshot,
    reduce_snapshot_pivot, PivotRow, PivotTable,
};
pub use normalizer::{normalize, normalize_for_session, PalletTotals};
pub use reports::{
    compose_billing, compose_consolidated, compose_pivot, BillingReport, BillingRow,
    ConsolidatedReport, ConsolidatedRow, ReportBuilder,
};
pub use schema::*;
pub use session::{classify_session, classify_temperature};
pub use sources::{InMemoryOperations, InMemorySnapshots, OperationSource, SnapshotSource};

use log::{debug, info};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The three report shapes for one request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WarehouseReports {
    pub billing: BillingReport,
    pub consolidated: ConsolidatedReport,
    pub pivot: PivotTable,
}

pub struct WarehouseReportProcessor;

impl WarehouseReportProcessor {
    /// Ingests raw stored documents and composes every report for `request`.
    pub fn process(
        operation_docs: &[Value],
        inventory_docs: &[(String, Value)],
        config: &IngestionConfig,
        request: &ReportRequest,
    ) -> Result<WarehouseReports> {
        info!(
            "Processing warehouse reports for {}..={}",
            request.start, request.end
        );

        let records = parse_operations(operation_docs, config);
        let snapshots: InMemorySnapshots = parse_snapshots(inventory_docs).into_iter().collect();

        debug!(
            "Ingested {} operations and {} inventory days",
            records.len(),
            snapshots.len()
        );

        let builder = ReportBuilder::new(InMemoryOperations::new(records), snapshots);

        Ok(WarehouseReports {
            billing: builder.billing_report(request)?,
            consolidated: builder.consolidated_report(request)?,
            pivot: builder.pivot_report(request)?,
        })
    }

    pub fn process_with_verification(
        operation_docs: &[Value],
        inventory_docs: &[(String, Value)],
        config: &IngestionConfig,
        request: &ReportRequest,
    ) -> Result<WarehouseReports> {
        let reports = Self::process(operation_docs, inventory_docs, config, request)?;

        reports.billing.verify()?;

        Ok(reports)
    }
}

pub fn process_documents(
    operation_docs: &[Value],
    inventory_docs: &[(String, Value)],
    config: &IngestionConfig,
    request: &ReportRequest,
) -> Result<WarehouseReports> {
    WarehouseReportProcessor::process(operation_docs, inventory_docs, config, request)
}

pub fn process_with_verification(
    operation_docs: &[Value],
    inventory_docs: &[(String, Value)],
    config: &IngestionConfig,
    request: &ReportRequest,
) -> Result<WarehouseReports> {
    WarehouseReportProcessor::process_with_verification(
        operation_docs,
        inventory_docs,
        config,
        request,
    )
}
