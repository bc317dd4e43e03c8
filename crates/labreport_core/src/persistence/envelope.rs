//! Current-version stored envelope and its document conversions.
//!
//! # Invariants
//! - Field names match the stored JSON: `type` for the cell type and
//!   `encodedAttachment` for the encoded image.
//! - `mode` and `encodedAttachment` are written only for image cells.
//! - Decode failures degrade one cell to "image without attachment" and are
//!   returned to the caller, never raised.

use crate::codec::{decode_attachment, encode_attachment, CodecError};
use crate::model::document::{
    new_node_id, Cell, CellKind, CellType, Document, ImageMode, Section, Subsection,
};
use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Filename given to restored images whose cell records no filename.
pub const RESTORED_IMAGE_FILENAME: &str = "restored_image.png";

/// Store-ready serialization of a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub version: u32,
    /// Save instant in Unix epoch milliseconds. Absent in version 1 stores.
    #[serde(default)]
    pub timestamp: i64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub sections: Vec<StoredSection>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredSection {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub subsections: Vec<StoredSubsection>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredSubsection {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub cells: Vec<StoredCell>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredCell {
    pub id: String,
    #[serde(rename = "type")]
    pub cell_type: CellType,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub caption: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<ImageMode>,
    #[serde(
        rename = "encodedAttachment",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub encoded_attachment: Option<String>,
}

/// One image that could not be restored during load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentFailure {
    pub cell_id: String,
    pub error: CodecError,
}

impl Envelope {
    /// Builds an envelope, encoding every in-memory attachment.
    pub fn from_document(document: &Document, version: u32, timestamp: i64) -> Self {
        let sections = document
            .sections
            .iter()
            .map(|section| StoredSection {
                id: section.id.clone(),
                title: section.title.clone(),
                subsections: section
                    .subsections
                    .iter()
                    .map(|subsection| StoredSubsection {
                        id: subsection.id.clone(),
                        title: subsection.title.clone(),
                        cells: subsection.cells.iter().map(StoredCell::from_cell).collect(),
                    })
                    .collect(),
            })
            .collect();

        Self {
            version,
            timestamp,
            title: document.title.clone(),
            author: document.author.clone(),
            sections,
        }
    }

    /// Rebuilds the in-memory document, decoding attachments.
    ///
    /// Sibling ids duplicated by older builds (timestamp-derived ids) are
    /// replaced so the result satisfies `Document::validate()`.
    pub fn into_document(self) -> (Document, Vec<AttachmentFailure>) {
        let mut failures = Vec::new();
        let mut section_ids = HashSet::new();

        let sections = self
            .sections
            .into_iter()
            .map(|section| {
                let mut subsection_ids = HashSet::new();
                let subsections = section
                    .subsections
                    .into_iter()
                    .map(|subsection| {
                        let mut cell_ids = HashSet::new();
                        let cells = subsection
                            .cells
                            .into_iter()
                            .map(|stored| {
                                let mut cell = stored.into_cell(&mut failures);
                                cell.id = unique_id(cell.id, &mut cell_ids);
                                cell
                            })
                            .collect();
                        Subsection {
                            id: unique_id(subsection.id, &mut subsection_ids),
                            title: subsection.title,
                            cells,
                        }
                    })
                    .collect();
                Section {
                    id: unique_id(section.id, &mut section_ids),
                    title: section.title,
                    subsections,
                }
            })
            .collect();

        let document = Document {
            title: self.title,
            author: self.author,
            sections,
        };
        (document, failures)
    }
}

impl StoredCell {
    fn from_cell(cell: &Cell) -> Self {
        let (mode, encoded_attachment) = match &cell.kind {
            CellKind::Image { mode, attachment } => {
                (Some(*mode), attachment.as_ref().map(encode_attachment))
            }
            CellKind::Text | CellKind::Code => (None, None),
        };

        Self {
            id: cell.id.clone(),
            cell_type: cell.cell_type(),
            content: cell.content.clone(),
            caption: cell.caption.clone(),
            mode,
            encoded_attachment,
        }
    }

    fn into_cell(self, failures: &mut Vec<AttachmentFailure>) -> Cell {
        let kind = match self.cell_type {
            CellType::Text | CellType::Code => {
                if self.mode.is_some() || self.encoded_attachment.is_some() {
                    warn!(
                        "event=envelope_cell module=persistence status=repaired cell_id={} reason=image_fields_on_{}_cell",
                        self.id,
                        self.cell_type.as_str()
                    );
                }
                if self.cell_type == CellType::Text {
                    CellKind::Text
                } else {
                    CellKind::Code
                }
            }
            CellType::Image => {
                let fallback = if self.content.is_empty() {
                    RESTORED_IMAGE_FILENAME
                } else {
                    self.content.as_str()
                };
                let attachment = match self.encoded_attachment.as_deref() {
                    Some(encoded) => match decode_attachment(encoded, fallback) {
                        Ok(attachment) => Some(attachment),
                        Err(error) => {
                            warn!(
                                "event=attachment_decode module=persistence status=error cell_id={} error={}",
                                self.id, error
                            );
                            failures.push(AttachmentFailure {
                                cell_id: self.id.clone(),
                                error,
                            });
                            None
                        }
                    },
                    None => None,
                };
                CellKind::Image {
                    mode: self.mode.unwrap_or(ImageMode::Placeholder),
                    attachment,
                }
            }
        };

        Cell {
            id: self.id,
            content: self.content,
            caption: self.caption,
            kind,
        }
    }
}

fn unique_id(id: String, seen: &mut HashSet<String>) -> String {
    if !id.trim().is_empty() && seen.insert(id.clone()) {
        return id;
    }
    warn!("event=envelope_id module=persistence status=repaired reason=empty_or_duplicate");
    loop {
        let generated = new_node_id();
        if seen.insert(generated.clone()) {
            return generated;
        }
    }
}
