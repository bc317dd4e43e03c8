//! Envelope migration registry and executor.
//!
//! # Responsibility
//! - Register one pure upgrade step per schema version transition.
//! - Apply pending steps in order until the envelope is current.
//!
//! # Invariants
//! - `version` values must remain monotonic; step `N` upgrades `N-1` to `N`.
//! - Each step stamps its target version on the envelope it returns.

use super::{json_kind, RawEnvelope, SchemaError};
use crate::model::document::{new_node_id, DEFAULT_SECTION_TITLE, DEFAULT_SUBSECTION_TITLE};
use log::info;
use serde_json::{json, Value};

/// Cell field the original browser store used for inline image data URLs.
const LEGACY_ATTACHMENT_FIELD: &str = "file_base64";
/// Current cell field for encoded attachments.
pub(crate) const ENCODED_ATTACHMENT_FIELD: &str = "encodedAttachment";

#[derive(Debug, Clone, Copy)]
struct Migration {
    version: u32,
    apply: fn(RawEnvelope) -> Result<RawEnvelope, SchemaError>,
}

const MIGRATIONS: &[Migration] = &[Migration {
    version: 2,
    apply: migrate_v1_to_v2,
}];

/// Returns the latest envelope schema version known by this build.
pub fn latest_version() -> u32 {
    MIGRATIONS
        .last()
        .map_or(super::UNVERSIONED_ENVELOPE_VERSION, |migration| {
            migration.version
        })
}

/// Upgrades an envelope to the latest schema version.
///
/// Returns the envelope unchanged when it is already current.
///
/// # Errors
/// - `InvalidVersion` / `UnsupportedVersion` for unreadable or future versions.
/// - `MalformedEnvelope` when a step finds data it cannot carry forward.
pub fn migrate(envelope: RawEnvelope) -> Result<RawEnvelope, SchemaError> {
    let found = envelope.version()?;
    let latest = latest_version();

    if found > latest {
        return Err(SchemaError::UnsupportedVersion {
            found,
            latest_supported: latest,
        });
    }

    if found == latest {
        return Ok(envelope);
    }

    let mut current = envelope;
    for migration in MIGRATIONS {
        if migration.version <= found {
            continue;
        }

        current = (migration.apply)(current)?;
        current.set_version(migration.version);
        info!(
            "event=schema_migrate module=schema status=ok to_version={}",
            migration.version
        );
    }

    Ok(current)
}

/// Version 1 stored a flat cell list; version 2 nests it under one default
/// section and subsection. Cell order and ids are kept as-is.
fn migrate_v1_to_v2(mut envelope: RawEnvelope) -> Result<RawEnvelope, SchemaError> {
    let fields = envelope.fields_mut();

    let mut cells = match fields.remove("cells") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(cells)) => cells,
        Some(other) => {
            return Err(SchemaError::MalformedEnvelope(format!(
                "version 1 `cells` must be an array, got {}",
                json_kind(&other)
            )));
        }
    };

    for cell in &mut cells {
        adopt_legacy_attachment(cell);
    }

    fields.insert(
        "sections".to_string(),
        json!([{
            "id": new_node_id(),
            "title": DEFAULT_SECTION_TITLE,
            "subsections": [{
                "id": new_node_id(),
                "title": DEFAULT_SUBSECTION_TITLE,
                "cells": cells,
            }],
        }]),
    );

    Ok(envelope)
}

/// Moves `file_base64` values to `encodedAttachment` in every cell of a
/// current-version envelope.
///
/// The browser build wrote version 2 envelopes with the legacy field, so
/// the rename cannot live in the v1 step alone. Returns the number of cells
/// changed.
pub(crate) fn adopt_legacy_attachments(envelope: &mut RawEnvelope) -> usize {
    let Some(Value::Array(sections)) = envelope.fields_mut().get_mut("sections") else {
        return 0;
    };

    let mut adopted = 0;
    for section in sections {
        let Some(subsections) = section.get_mut("subsections").and_then(Value::as_array_mut)
        else {
            continue;
        };
        for subsection in subsections {
            let Some(cells) = subsection.get_mut("cells").and_then(Value::as_array_mut) else {
                continue;
            };
            for cell in cells {
                if adopt_legacy_attachment(cell) {
                    adopted += 1;
                }
            }
        }
    }
    adopted
}

/// Renames one cell's legacy field; an existing `encodedAttachment` wins.
fn adopt_legacy_attachment(cell: &mut Value) -> bool {
    let Value::Object(cell) = cell else {
        return false;
    };
    match cell.remove(LEGACY_ATTACHMENT_FIELD) {
        Some(legacy) => {
            cell.entry(ENCODED_ATTACHMENT_FIELD.to_string())
                .or_insert(legacy);
            true
        }
        None => false,
    }
}
