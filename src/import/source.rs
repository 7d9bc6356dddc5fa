//! CSV input source
//!
//! Peripheral glue: reads the inventory export into header-keyed records for
//! the run orchestrator. A failure here is fatal to the run (no rows have
//! been processed yet, so no snapshot is written).

use crate::error::Result;
use crate::import::row::CsvRecord;
use std::path::Path;
use tracing::info;

/// Read the full record sequence from a CSV export
///
/// Values are whitespace-trimmed; rows surface in source-file order.
pub fn read_records(path: &Path) -> Result<Vec<CsvRecord>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)?;

    let headers = reader.headers()?.clone();

    let mut records = Vec::new();
    for result in reader.records() {
        let record = result?;
        let map: CsvRecord = headers
            .iter()
            .zip(record.iter())
            .map(|(header, value)| (header.to_string(), value.to_string()))
            .collect();
        records.push(map);
    }

    info!(
        path = %path.display(),
        rows = records.len(),
        "Inventory export loaded"
    );

    Ok(records)
}
