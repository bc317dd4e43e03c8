//! Normalization of untrusted foreign document structures.
//!
//! # Responsibility
//! - Coerce an untrusted JSON structure (imported templates) into valid
//!   document sections, filling defaults and generating identifiers.
//! - Reject shapes that cannot be coerced without guessing.
//!
//! # Invariants
//! - Output always satisfies `Document::validate()`.
//! - Imported cells never carry attachments.
//! - Identifiers are unique within each parent collection; missing, empty
//!   and duplicated ids are replaced by fresh ones.

use crate::model::document::{
    new_node_id, Cell, CellKind, CellType, Document, ImageMode, Section, Subsection,
};
use crate::schema::json_kind;
use log::debug;
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Title for imported sections without one.
pub const UNTITLED_SECTION: &str = "Untitled Section";
/// Title for imported subsections without one.
pub const UNTITLED_SUBSECTION: &str = "Untitled Subsection";

/// Foreign structure rejected as a whole.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StructureError {
    /// Top-level value is neither a section array nor an object with one.
    UnsupportedShape(String),
    /// Section sequence is empty.
    EmptySections,
    /// A nested node has a shape that cannot be coerced.
    InvalidNode { path: String, reason: String },
    /// A cell declares a type outside `text|code|image`.
    UnknownCellType { path: String, value: String },
    /// Template service response does not match the response contract.
    InvalidResponse(String),
    /// Template service answered with an explicit failure.
    Rejected(String),
}

impl Display for StructureError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnsupportedShape(kind) => write!(
                f,
                "unsupported structure: expected a section array or an object with `sections`, got {kind}"
            ),
            Self::EmptySections => write!(f, "structure has no sections"),
            Self::InvalidNode { path, reason } => write!(f, "invalid node at {path}: {reason}"),
            Self::UnknownCellType { path, value } => {
                write!(f, "unknown cell type `{value}` at {path}")
            }
            Self::InvalidResponse(message) => write!(f, "invalid template response: {message}"),
            Self::Rejected(message) => write!(f, "template lookup failed: {message}"),
        }
    }
}

impl Error for StructureError {}

/// Normalizes a foreign structure into a document with the given metadata.
pub fn normalize_document(
    value: &Value,
    title: impl Into<String>,
    author: impl Into<String>,
) -> Result<Document, StructureError> {
    let sections = normalize_sections(value)?;
    Ok(Document {
        title: title.into(),
        author: author.into(),
        sections,
    })
}

/// Normalizes a bare section array or an object exposing `sections`.
///
/// # Errors
/// - `UnsupportedShape` for any other top-level value.
/// - `EmptySections` when the section sequence is empty.
/// - `InvalidNode` / `UnknownCellType` for nested values that cannot be
///   coerced.
pub fn normalize_sections(value: &Value) -> Result<Vec<Section>, StructureError> {
    let raw_sections = match value {
        Value::Array(items) => items,
        Value::Object(fields) => match fields.get("sections") {
            Some(Value::Array(items)) => items,
            Some(other) => {
                return Err(StructureError::UnsupportedShape(format!(
                    "object with `sections` of type {}",
                    json_kind(other)
                )));
            }
            None => {
                return Err(StructureError::UnsupportedShape(
                    "object without `sections`".to_string(),
                ));
            }
        },
        other => return Err(StructureError::UnsupportedShape(json_kind(other).to_string())),
    };

    if raw_sections.is_empty() {
        return Err(StructureError::EmptySections);
    }

    let mut ids = IdScope::default();
    raw_sections
        .iter()
        .enumerate()
        .map(|(index, raw)| normalize_section(raw, &format!("sections[{index}]"), &mut ids))
        .collect()
}

fn normalize_section(raw: &Value, path: &str, ids: &mut IdScope) -> Result<Section, StructureError> {
    let fields = expect_object(raw, path)?;
    let raw_subsections = optional_array(fields, "subsections", path)?;

    let mut subsection_ids = IdScope::default();
    let subsections = raw_subsections
        .iter()
        .enumerate()
        .map(|(index, raw)| {
            normalize_subsection(raw, &format!("{path}.subsections[{index}]"), &mut subsection_ids)
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Section {
        id: ids.claim(fields.get("id"), path),
        title: text_or(fields.get("title"), UNTITLED_SECTION, path)?,
        subsections,
    })
}

fn normalize_subsection(
    raw: &Value,
    path: &str,
    ids: &mut IdScope,
) -> Result<Subsection, StructureError> {
    let fields = expect_object(raw, path)?;
    let raw_cells = optional_array(fields, "cells", path)?;

    let mut cell_ids = IdScope::default();
    let cells = raw_cells
        .iter()
        .enumerate()
        .map(|(index, raw)| normalize_cell(raw, &format!("{path}.cells[{index}]"), &mut cell_ids))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Subsection {
        id: ids.claim(fields.get("id"), path),
        title: text_or(fields.get("title"), UNTITLED_SUBSECTION, path)?,
        cells,
    })
}

fn normalize_cell(raw: &Value, path: &str, ids: &mut IdScope) -> Result<Cell, StructureError> {
    let fields = expect_object(raw, path)?;

    let cell_type = match fields.get("type") {
        None | Some(Value::Null) => CellType::Text,
        Some(Value::String(value)) => CellType::parse(value.trim().to_ascii_lowercase().as_str())
            .ok_or_else(|| StructureError::UnknownCellType {
                path: path.to_string(),
                value: value.clone(),
            })?,
        Some(other) => {
            return Err(StructureError::UnknownCellType {
                path: path.to_string(),
                value: other.to_string(),
            });
        }
    };

    let kind = match cell_type {
        CellType::Text => CellKind::Text,
        CellType::Code => CellKind::Code,
        CellType::Image => CellKind::Image {
            mode: fields
                .get("mode")
                .and_then(Value::as_str)
                .and_then(|mode| ImageMode::parse(mode.trim()))
                .unwrap_or(ImageMode::Placeholder),
            attachment: None,
        },
    };

    Ok(Cell {
        id: ids.claim(fields.get("id"), path),
        content: text_or(fields.get("content"), "", path)?,
        caption: text_or(fields.get("caption"), "", path)?,
        kind,
    })
}

/// Tracks ids claimed within one parent collection.
#[derive(Default)]
struct IdScope {
    seen: HashSet<String>,
}

impl IdScope {
    fn claim(&mut self, raw: Option<&Value>, path: &str) -> String {
        let candidate = match raw {
            Some(Value::String(value)) if !value.trim().is_empty() => Some(value.clone()),
            Some(Value::Number(number)) => Some(number.to_string()),
            _ => None,
        };

        if let Some(id) = candidate {
            if self.seen.insert(id.clone()) {
                return id;
            }
            debug!("event=normalize_id module=normalize status=regenerated reason=duplicate path={path}");
        }

        loop {
            let generated = new_node_id();
            if self.seen.insert(generated.clone()) {
                return generated;
            }
        }
    }
}

fn expect_object<'a>(raw: &'a Value, path: &str) -> Result<&'a Map<String, Value>, StructureError> {
    raw.as_object().ok_or_else(|| StructureError::InvalidNode {
        path: path.to_string(),
        reason: format!("expected an object, got {}", json_kind(raw)),
    })
}

fn optional_array<'a>(
    fields: &'a Map<String, Value>,
    key: &str,
    path: &str,
) -> Result<&'a [Value], StructureError> {
    match fields.get(key) {
        None | Some(Value::Null) => Ok(&[]),
        Some(Value::Array(items)) => Ok(items.as_slice()),
        Some(other) => Err(StructureError::InvalidNode {
            path: path.to_string(),
            reason: format!("`{key}` must be an array, got {}", json_kind(other)),
        }),
    }
}

fn text_or(raw: Option<&Value>, default: &str, path: &str) -> Result<String, StructureError> {
    match raw {
        None | Some(Value::Null) => Ok(default.to_string()),
        Some(Value::String(value)) => Ok(value.clone()),
        Some(Value::Number(number)) => Ok(number.to_string()),
        Some(Value::Bool(flag)) => Ok(flag.to_string()),
        Some(other) => Err(StructureError::InvalidNode {
            path: path.to_string(),
            reason: format!("expected text, got {}", json_kind(other)),
        }),
    }
}
