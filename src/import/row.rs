//! Row normalization: raw CSV record → device candidate
//!
//! Maps one header-keyed record into the canonical [`DeviceCandidate`] shape.
//! Pure; persistence and logging belong to the caller.

use std::collections::HashMap;

/// A parsed CSV record, keyed by header name
pub type CsvRecord = HashMap<String, String>;

/// Column names expected in the inventory export
pub const COL_ID: &str = "ID";
pub const COL_MODEL: &str = "Model";
pub const COL_DEVICE_TYPE: &str = "Device Type";
pub const COL_PUBLISHER: &str = "Publisher";
pub const COL_OS: &str = "OS";
pub const COL_OS_VERSION: &str = "OS Version";
pub const COL_INV_NR: &str = "Inventory Number";
pub const COL_STICKER: &str = "Sticker-Number (iOS)";
pub const COL_CHECKED_OUT_BY: &str = "Checked out by?";
pub const COL_RETIRED: &str = "Retired?";

/// Presence-aware column value
///
/// Distinguishes a column that is absent from the file, present but blank,
/// and present with a value. Change detection treats Missing and Empty the
/// same (fall back to the persisted value) but the states stay distinct so
/// no truthy coercion happens at the CSV boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Missing,
    Empty,
    Value(String),
}

impl FieldValue {
    /// Read a column from the record
    fn from_column(record: &CsvRecord, column: &str) -> Self {
        match record.get(column) {
            None => FieldValue::Missing,
            Some(raw) if raw.trim().is_empty() => FieldValue::Empty,
            Some(raw) => FieldValue::Value(raw.trim().to_string()),
        }
    }

    /// The value, if the column was present and non-empty
    pub fn present(&self) -> Option<&str> {
        match self {
            FieldValue::Value(v) => Some(v.as_str()),
            _ => None,
        }
    }

    /// Incoming value with fallback to the persisted one when blank
    pub fn or_existing(&self, existing: &Option<String>) -> Option<String> {
        match self.present() {
            Some(v) => Some(v.to_string()),
            None => existing.clone(),
        }
    }
}

/// Normalized, not-yet-persisted representation of one CSV row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceCandidate {
    pub device_id: String,
    pub device_name: String,
    pub device_type: String,
    pub publisher: FieldValue,
    pub os: FieldValue,
    pub os_version: FieldValue,
    pub inv_nr: FieldValue,
    pub sticker_number: FieldValue,
    /// The `Retired?` flag as asserted by the export
    pub is_retired_csv: bool,
    /// Trimmed `Checked out by?` value; blank means absent
    pub checked_out_by: Option<String>,
}

/// Outcome of normalizing one record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NormalizeOutcome {
    Candidate(DeviceCandidate),
    /// A required column was missing or blank; the row contributes to no
    /// counter except the skip tally
    Skip { missing: Vec<&'static str> },
}

/// Map a raw record to a device candidate, or a Skip for unusable rows
pub fn normalize_row(record: &CsvRecord) -> NormalizeOutcome {
    let device_id = FieldValue::from_column(record, COL_ID);
    let device_name = FieldValue::from_column(record, COL_MODEL);
    let device_type = FieldValue::from_column(record, COL_DEVICE_TYPE);

    let mut missing = Vec::new();
    if device_id.present().is_none() {
        missing.push(COL_ID);
    }
    if device_name.present().is_none() {
        missing.push(COL_MODEL);
    }
    if device_type.present().is_none() {
        missing.push(COL_DEVICE_TYPE);
    }
    if !missing.is_empty() {
        return NormalizeOutcome::Skip { missing };
    }

    let is_retired_csv = record
        .get(COL_RETIRED)
        .map(|raw| {
            let v = raw.trim();
            v.eq_ignore_ascii_case("yes") || v.eq_ignore_ascii_case("true")
        })
        .unwrap_or(false);

    let checked_out_by = record
        .get(COL_CHECKED_OUT_BY)
        .map(|raw| raw.trim())
        .filter(|v| !v.is_empty())
        .map(|v| v.to_string());

    NormalizeOutcome::Candidate(DeviceCandidate {
        device_id: device_id.present().unwrap_or_default().to_string(),
        device_name: device_name.present().unwrap_or_default().to_string(),
        device_type: device_type.present().unwrap_or_default().to_string(),
        publisher: FieldValue::from_column(record, COL_PUBLISHER),
        os: FieldValue::from_column(record, COL_OS),
        os_version: FieldValue::from_column(record, COL_OS_VERSION),
        inv_nr: FieldValue::from_column(record, COL_INV_NR),
        sticker_number: FieldValue::from_column(record, COL_STICKER),
        is_retired_csv,
        checked_out_by,
    })
}
