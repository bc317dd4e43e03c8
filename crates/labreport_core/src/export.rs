//! Export bundle preparation for the archive generator.
//!
//! The generator receives a JSON snapshot plus image files out of band.
//! Image cells reference their file through a collision-free name
//! `<cell id>_<original filename>`.

use crate::model::document::{Attachment, CellKind, Document};
use serde_json::{json, Map, Value};

/// One binary file shipped alongside the snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportFile {
    pub filename: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

/// Snapshot and files handed to the export collaborator.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportBundle {
    pub report: Value,
    pub files: Vec<ExportFile>,
}

/// Export filename for an image cell's attachment.
pub fn export_filename(cell_id: &str, attachment: &Attachment) -> String {
    format!("{cell_id}_{}", attachment.filename)
}

/// Builds the export snapshot of `document`.
///
/// Attachments never appear inline; image cells with a file get `content`
/// and `original_filename` set to the export filename instead.
pub fn build_export_bundle(document: &Document) -> ExportBundle {
    let mut files = Vec::new();

    let sections: Vec<Value> = document
        .sections
        .iter()
        .map(|section| {
            let subsections: Vec<Value> = section
                .subsections
                .iter()
                .map(|subsection| {
                    let cells: Vec<Value> = subsection
                        .cells
                        .iter()
                        .map(|cell| {
                            let mut fields = Map::new();
                            fields.insert("id".to_string(), json!(cell.id));
                            fields.insert("type".to_string(), json!(cell.cell_type().as_str()));
                            fields.insert("content".to_string(), json!(cell.content));
                            fields.insert("caption".to_string(), json!(cell.caption));

                            if let CellKind::Image { mode, attachment } = &cell.kind {
                                fields.insert("mode".to_string(), json!(mode.as_str()));
                                if let Some(attachment) = attachment {
                                    let filename = export_filename(&cell.id, attachment);
                                    fields.insert("content".to_string(), json!(filename));
                                    fields.insert("original_filename".to_string(), json!(filename));
                                    files.push(ExportFile {
                                        filename,
                                        mime_type: attachment.mime_type.clone(),
                                        bytes: attachment.bytes.clone(),
                                    });
                                }
                            }
                            Value::Object(fields)
                        })
                        .collect();
                    json!({ "id": subsection.id, "title": subsection.title, "cells": cells })
                })
                .collect();
            json!({ "id": section.id, "title": section.title, "subsections": subsections })
        })
        .collect();

    ExportBundle {
        report: json!({
            "title": document.title,
            "author": document.author,
            "sections": sections,
        }),
        files,
    }
}
