//! Change classification: device candidate vs. persisted registry entry
//!
//! Pure decision procedure. The caller (run orchestrator) owns the resulting
//! writes; nothing here touches the store.
//!
//! Field policy:
//! - `deviceName`, `deviceType`, `deviceID` are immutable after creation
//! - `currentUser` is owned by the checkout/return flow, never by the import
//! - `publisher`, `os`, `osVersion`, `invNr`, `stickerNumber` and the
//!   retirement flag are the whitelisted mutable group

use crate::db::devices::{Device, DeviceAttributes};
use crate::import::row::DeviceCandidate;

/// One attempted mutation of an immutable or access-controlled field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedChange {
    pub field: &'static str,
    pub message: String,
}

/// Classify a candidate against a known registry entry
///
/// An unseen device id has no classification step: the caller persists
/// [`build_new_device`]'s result verbatim.
///
/// Returns the merged device to persist (None when the row is unchanged) and
/// all rejected field changes, one entry per field.
pub fn classify_existing(
    candidate: &DeviceCandidate,
    existing: &Device,
) -> (Option<Device>, Vec<RejectedChange>) {
    let mut rejected = Vec::new();

    // Immutable identity fields: accumulate every mismatch, never abort
    if candidate.device_id != existing.device_id {
        rejected.push(immutable_rejection(
            existing,
            "deviceID",
            &existing.device_id,
            &candidate.device_id,
        ));
    }
    if candidate.device_name != existing.attributes.device_name {
        rejected.push(immutable_rejection(
            existing,
            "deviceName",
            &existing.attributes.device_name,
            &candidate.device_name,
        ));
    }
    if candidate.device_type != existing.attributes.device_type {
        rejected.push(immutable_rejection(
            existing,
            "deviceType",
            &existing.attributes.device_type,
            &candidate.device_type,
        ));
    }

    // Checkout state is access-controlled: a CSV-asserted user that differs
    // from the persisted one is rejected with workflow guidance
    if let Some(asserted) = &candidate.checked_out_by {
        if existing.current_user.as_deref() != Some(asserted.as_str()) {
            rejected.push(RejectedChange {
                field: "currentUser",
                message: format!(
                    "Device {}: CSV asserts checkout by {:?} but registry has {:?}; \
                     checkouts and returns must go through the checkout workflow, \
                     not the inventory import",
                    existing.device_id, asserted, existing.current_user
                ),
            });
        }
    }

    let (merged_attributes, attributes_changed) =
        merge_attributes(&existing.attributes, candidate);
    let retirement_changed = candidate.is_retired_csv != existing.is_retired;

    let merged = if attributes_changed || retirement_changed {
        Some(Device {
            device_id: existing.device_id.clone(),
            is_retired: candidate.is_retired_csv,
            // Checkout state carried over untouched
            current_user: existing.current_user.clone(),
            is_available: existing.is_available,
            attributes: merged_attributes,
        })
    } else {
        None
    };

    (merged, rejected)
}

/// Build the full device for a first CSV sighting
pub fn build_new_device(candidate: &DeviceCandidate) -> Device {
    let checked_out_by = candidate.checked_out_by.clone();
    Device {
        device_id: candidate.device_id.clone(),
        is_retired: candidate.is_retired_csv,
        is_available: checked_out_by.is_none(),
        current_user: checked_out_by,
        attributes: DeviceAttributes {
            device_name: candidate.device_name.clone(),
            device_type: candidate.device_type.clone(),
            inv_nr: candidate.inv_nr.present().map(str::to_string),
            publisher: candidate.publisher.present().map(str::to_string),
            os: candidate.os.present().map(str::to_string),
            os_version: candidate.os_version.present().map(str::to_string),
            sticker_number: candidate.sticker_number.present().map(str::to_string),
        },
    }
}

/// Merge the mutable attribute group, returning an explicit change flag
///
/// Incoming values fall back to the persisted value when the column was blank
/// or absent. Equality is field-wise structural comparison over the merged
/// group; one changed field flags the whole group for a single combined write.
pub fn merge_attributes(
    existing: &DeviceAttributes,
    candidate: &DeviceCandidate,
) -> (DeviceAttributes, bool) {
    let merged = DeviceAttributes {
        device_name: existing.device_name.clone(),
        device_type: existing.device_type.clone(),
        inv_nr: candidate.inv_nr.or_existing(&existing.inv_nr),
        publisher: candidate.publisher.or_existing(&existing.publisher),
        os: candidate.os.or_existing(&existing.os),
        os_version: candidate.os_version.or_existing(&existing.os_version),
        sticker_number: candidate
            .sticker_number
            .or_existing(&existing.sticker_number),
    };

    let changed = !merged.mutable_fields_eq(existing);
    (merged, changed)
}

fn immutable_rejection(
    device: &Device,
    field: &'static str,
    persisted: &str,
    incoming: &str,
) -> RejectedChange {
    RejectedChange {
        field,
        message: format!(
            "Device {}: attempted change of immutable field {} ({:?} -> {:?}) rejected",
            device.device_id, field, persisted, incoming
        ),
    }
}
