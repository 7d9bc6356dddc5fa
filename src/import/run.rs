//! Import run orchestration
//!
//! Drives one full import over the record sequence:
//! pre-run snapshot capture → per-row normalize/classify/apply →
//! run record persistence → summary.
//!
//! Rows are processed strictly in source order, one at a time; every
//! persistence call for a row completes before the next row begins. Per-row
//! failures are caught here and counted, never aborting the run. There is no
//! retry at any level.

use crate::db::{devices, updates, Store};
use crate::error::{Error, Result};
use crate::import::classify::{build_new_device, classify_existing};
use crate::import::lifecycle;
use crate::import::row::{normalize_row, CsvRecord, NormalizeOutcome, COL_ID};
use chrono::Utc;
use std::collections::BTreeMap;
use tracing::{debug, error, info, warn};

/// Aggregate result of one import run
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub update_number: i64,
    pub doc_id: String,
    /// Registry size after the run
    pub total_devices: i64,
    pub new_devices: u32,
    pub changed_devices: u32,
    /// Sum of rejected field-change entries across all rows
    pub attempted_invalid_changes: u32,
    pub skipped_rows: u32,
    pub error_count: u32,
    /// Ordered warning strings (skips and rejected changes)
    pub warnings: Vec<String>,
}

/// Per-row application result
#[derive(Debug, Default)]
struct RowOutcome {
    new: bool,
    changed: bool,
    invalid_changes: u32,
    skipped: bool,
    warnings: Vec<String>,
}

/// Execute one import run over the full record sequence
pub async fn run_import(store: &Store, records: &[CsvRecord]) -> Result<RunSummary> {
    info!(rows = records.len(), "Starting inventory import run");

    // Registry copy captured before any row is applied; persisted with the
    // run record after all rows are processed
    let pre_run_snapshot = capture_registry_snapshot(store).await?;

    let mut new_devices: u32 = 0;
    let mut changed_devices: u32 = 0;
    let mut attempted_invalid_changes: u32 = 0;
    let mut skipped_rows: u32 = 0;
    let mut error_count: u32 = 0;
    let mut warnings: Vec<String> = Vec::new();

    for (idx, record) in records.iter().enumerate() {
        let row_number = idx + 1;
        match apply_row(store, row_number, record).await {
            Ok(outcome) => {
                if outcome.new {
                    new_devices += 1;
                }
                // Counted once per row even when both the attribute update
                // and the retirement transition fired
                if outcome.changed {
                    changed_devices += 1;
                }
                if outcome.skipped {
                    skipped_rows += 1;
                }
                attempted_invalid_changes += outcome.invalid_changes;
                warnings.extend(outcome.warnings);
            }
            Err(e) => {
                // Row-level isolation: one bad row never blocks the rest
                error!(
                    row = row_number,
                    device_id = record.get(COL_ID).map(String::as_str).unwrap_or("?"),
                    error = %e,
                    "Row processing failed, continuing with remaining rows"
                );
                error_count += 1;
            }
        }
    }

    // Allocate the run number: max(existing) + 1, gapless within one client
    let update_number = updates::latest_update_number(store).await? + 1;
    let doc_id = updates::doc_id(update_number);
    let total_devices = devices::count_devices(store).await?;

    updates::insert_snapshot(
        store,
        &updates::RunSnapshot {
            update_number,
            doc_id: doc_id.clone(),
            update_date: Utc::now(),
            total_devices,
            new_devices: new_devices as i64,
            changed_devices: changed_devices as i64,
            snapshot: pre_run_snapshot,
        },
    )
    .await?;

    info!(
        update = %doc_id,
        total_devices = total_devices,
        new_devices = new_devices,
        changed_devices = changed_devices,
        attempted_invalid_changes = attempted_invalid_changes,
        skipped_rows = skipped_rows,
        error_count = error_count,
        "Import run complete"
    );
    if !warnings.is_empty() {
        info!(count = warnings.len(), "Warnings accumulated during this run");
        for warning in &warnings {
            warn!("{}", warning);
        }
    }

    Ok(RunSummary {
        update_number,
        doc_id,
        total_devices,
        new_devices,
        changed_devices,
        attempted_invalid_changes,
        skipped_rows,
        error_count,
        warnings,
    })
}

/// Serialize the registry keyed by device id; None marks an empty registry
async fn capture_registry_snapshot(store: &Store) -> Result<Option<String>> {
    let registry = devices::load_all(store).await?;
    if registry.is_empty() {
        return Ok(None);
    }

    let by_id: BTreeMap<&str, &devices::Device> = registry
        .iter()
        .map(|device| (device.device_id.as_str(), device))
        .collect();

    let json = serde_json::to_string(&by_id)
        .map_err(|e| Error::InvalidRecord(format!("Snapshot serialization failed: {}", e)))?;

    Ok(Some(json))
}

/// Normalize, classify and apply one record
async fn apply_row(store: &Store, row_number: usize, record: &CsvRecord) -> Result<RowOutcome> {
    let mut outcome = RowOutcome::default();

    let candidate = match normalize_row(record) {
        NormalizeOutcome::Candidate(candidate) => candidate,
        NormalizeOutcome::Skip { missing } => {
            let message = format!(
                "Row {}: skipped, missing required column(s): {}",
                row_number,
                missing.join(", ")
            );
            warn!("{}", message);
            outcome.skipped = true;
            outcome.warnings.push(message);
            return Ok(outcome);
        }
    };

    match devices::get_device(store, &candidate.device_id).await? {
        None => {
            // First CSV sighting: persist the built device verbatim
            let device = build_new_device(&candidate);
            devices::insert_device(store, &device).await?;
            info!(
                device_id = %device.device_id,
                device_name = %device.attributes.device_name,
                "New device registered"
            );
            if let Some(username) = device.current_user.clone() {
                lifecycle::create_checkout(store, &device, &username).await?;
            }
            outcome.new = true;
        }
        Some(existing) => {
            let (merged, rejected) = classify_existing(&candidate, &existing);

            for rejection in &rejected {
                warn!(
                    device_id = %existing.device_id,
                    field = rejection.field,
                    "{}",
                    rejection.message
                );
                outcome.warnings.push(rejection.message.clone());
            }
            outcome.invalid_changes = rejected.len() as u32;

            if let Some(merged) = &merged {
                devices::update_attributes(
                    store,
                    &merged.device_id,
                    &merged.attributes,
                    merged.is_retired,
                )
                .await?;
                info!(device_id = %merged.device_id, "Device attributes updated");
                outcome.changed = true;
            }

            // Retirement transition keys off the CSV flag and the persisted
            // user captured before this row's writes; it fires independently
            // of the attribute update and is a second, separate write
            if candidate.is_retired_csv {
                if let Some(username) = &existing.current_user {
                    lifecycle::handle_retirement(store, &existing.device_id, username).await?;
                    outcome.changed = true;
                }
            }

            if !outcome.changed && rejected.is_empty() {
                debug!(device_id = %existing.device_id, "Device unchanged");
            }
        }
    }

    Ok(outcome)
}
