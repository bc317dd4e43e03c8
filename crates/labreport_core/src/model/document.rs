//! Lab report document model.
//!
//! # Responsibility
//! - Define the canonical in-memory report tree: document, sections,
//!   subsections and content cells.
//! - Provide constructors mirroring the editor's add actions.
//! - Validate structural invariants before persistence.
//!
//! # Invariants
//! - Identifiers are unique within their immediate parent collection only.
//! - Collection order is significant and preserved by every transformation.
//! - Only image cells carry a mode or an attachment; the enum shape of
//!   `CellKind` makes the text/code case unrepresentable.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Title used for the seeded document.
pub const DEFAULT_REPORT_TITLE: &str = "My Lab Report";
/// Author used for the seeded document.
pub const DEFAULT_REPORT_AUTHOR: &str = "Student Name";
/// Title of the first section in seeded and migrated documents.
pub const DEFAULT_SECTION_TITLE: &str = "Section 1";
/// Title of the first subsection in seeded and migrated documents.
pub const DEFAULT_SUBSECTION_TITLE: &str = "Subsection 1";

/// Generates a fresh identifier for a section, subsection or cell.
///
/// Random v4 ids replace timestamp-derived ids, which collide when two
/// nodes are created within the same millisecond.
pub fn new_node_id() -> String {
    Uuid::new_v4().to_string()
}

/// Root entity: the full report being authored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub title: String,
    pub author: String,
    pub sections: Vec<Section>,
}

impl Document {
    /// Creates an empty document with the given metadata.
    pub fn new(title: impl Into<String>, author: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            author: author.into(),
            sections: Vec::new(),
        }
    }

    /// Returns the document seeded on first start when nothing is stored.
    pub fn default_report() -> Self {
        let mut section = Section::new(DEFAULT_SECTION_TITLE);
        section
            .subsections
            .push(Subsection::new(DEFAULT_SUBSECTION_TITLE));

        let mut document = Self::new(DEFAULT_REPORT_TITLE, DEFAULT_REPORT_AUTHOR);
        document.sections.push(section);
        document
    }

    /// Iterates all cells in document order.
    pub fn cells(&self) -> impl Iterator<Item = &Cell> {
        self.sections
            .iter()
            .flat_map(|section| section.subsections.iter())
            .flat_map(|subsection| subsection.cells.iter())
    }

    /// Returns the number of image cells currently holding an attachment.
    pub fn attachment_count(&self) -> usize {
        self.cells()
            .filter(|cell| cell.attachment().is_some())
            .count()
    }

    /// Validates structural invariants of the whole tree.
    ///
    /// # Errors
    /// - Returns an error for empty ids.
    /// - Returns an error for ids duplicated within the same parent.
    pub fn validate(&self) -> Result<(), DocumentValidationError> {
        let mut section_ids = HashSet::new();
        for section in &self.sections {
            check_id(&section.id, NodeKind::Section, &mut section_ids)?;

            let mut subsection_ids = HashSet::new();
            for subsection in &section.subsections {
                check_id(&subsection.id, NodeKind::Subsection, &mut subsection_ids)?;

                let mut cell_ids = HashSet::new();
                for cell in &subsection.cells {
                    check_id(&cell.id, NodeKind::Cell, &mut cell_ids)?;
                }
            }
        }
        Ok(())
    }
}

fn check_id<'a>(
    id: &'a str,
    kind: NodeKind,
    seen: &mut HashSet<&'a str>,
) -> Result<(), DocumentValidationError> {
    if id.trim().is_empty() {
        return Err(DocumentValidationError::EmptyId(kind));
    }
    if !seen.insert(id) {
        return Err(DocumentValidationError::DuplicateId {
            kind,
            id: id.to_string(),
        });
    }
    Ok(())
}

/// Top-level grouping inside a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub id: String,
    pub title: String,
    pub subsections: Vec<Subsection>,
}

impl Section {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            id: new_node_id(),
            title: title.into(),
            subsections: Vec::new(),
        }
    }
}

/// Second-level grouping owning the cells.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subsection {
    pub id: String,
    pub title: String,
    pub cells: Vec<Cell>,
}

impl Subsection {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            id: new_node_id(),
            title: title.into(),
            cells: Vec::new(),
        }
    }
}

/// Smallest content unit of a report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cell {
    pub id: String,
    /// Text body, code body, or the source filename for image cells.
    pub content: String,
    pub caption: String,
    pub kind: CellKind,
}

impl Cell {
    /// Creates an empty text cell.
    pub fn text() -> Self {
        Self::with_kind(CellKind::Text)
    }

    /// Creates an empty code cell.
    pub fn code() -> Self {
        Self::with_kind(CellKind::Code)
    }

    /// Creates an image cell in `placeholder` mode with no attachment.
    pub fn image() -> Self {
        Self::with_kind(CellKind::Image {
            mode: ImageMode::Placeholder,
            attachment: None,
        })
    }

    fn with_kind(kind: CellKind) -> Self {
        Self {
            id: new_node_id(),
            content: String::new(),
            caption: String::new(),
            kind,
        }
    }

    /// Returns the wire-level cell type.
    pub fn cell_type(&self) -> CellType {
        self.kind.cell_type()
    }

    /// Returns the image mode, `None` for text and code cells.
    pub fn mode(&self) -> Option<ImageMode> {
        match &self.kind {
            CellKind::Image { mode, .. } => Some(*mode),
            CellKind::Text | CellKind::Code => None,
        }
    }

    /// Returns the attached image, if any.
    pub fn attachment(&self) -> Option<&Attachment> {
        match &self.kind {
            CellKind::Image { attachment, .. } => attachment.as_ref(),
            CellKind::Text | CellKind::Code => None,
        }
    }

    /// Switches an image cell to another mode.
    ///
    /// Changing mode discards the current attachment and its filename, the
    /// same reset the editor performs when the source picker changes.
    /// Has no effect on text and code cells.
    pub fn set_mode(&mut self, new_mode: ImageMode) {
        if let CellKind::Image { mode, attachment } = &mut self.kind {
            *mode = new_mode;
            *attachment = None;
            self.content.clear();
        }
    }

    /// Attaches an image file to an image cell.
    ///
    /// `content` takes the attachment filename. Returns the attachment back
    /// when the cell is not an image cell.
    pub fn attach(&mut self, file: Attachment) -> Result<(), Attachment> {
        match &mut self.kind {
            CellKind::Image { attachment, .. } => {
                self.content = file.filename.clone();
                *attachment = Some(file);
                Ok(())
            }
            CellKind::Text | CellKind::Code => Err(file),
        }
    }
}

/// Cell variant with image-only state carried inline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CellKind {
    Text,
    Code,
    Image {
        mode: ImageMode,
        attachment: Option<Attachment>,
    },
}

impl CellKind {
    pub fn cell_type(&self) -> CellType {
        match self {
            Self::Text => CellType::Text,
            Self::Code => CellType::Code,
            Self::Image { .. } => CellType::Image,
        }
    }
}

/// Wire-level discriminator of a cell, serialized as `type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CellType {
    Text,
    Code,
    Image,
}

impl CellType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Code => "code",
            Self::Image => "image",
        }
    }

    /// Parses the lowercase wire name.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "text" => Some(Self::Text),
            "code" => Some(Self::Code),
            "image" => Some(Self::Image),
            _ => None,
        }
    }
}

/// Source an image cell expects its file from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageMode {
    Camera,
    Gallery,
    Placeholder,
}

impl ImageMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Camera => "camera",
            Self::Gallery => "gallery",
            Self::Placeholder => "placeholder",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "camera" => Some(Self::Camera),
            "gallery" => Some(Self::Gallery),
            "placeholder" => Some(Self::Placeholder),
            _ => None,
        }
    }
}

/// Binary image payload held in memory.
///
/// Not serializable on its own; crosses the store boundary only through
/// `codec::encode_attachment`.
#[derive(Clone, PartialEq, Eq)]
pub struct Attachment {
    pub bytes: Vec<u8>,
    pub mime_type: String,
    /// Original filename, used to derive collision-free export names.
    pub filename: String,
}

impl Attachment {
    pub fn new(
        bytes: impl Into<Vec<u8>>,
        mime_type: impl Into<String>,
        filename: impl Into<String>,
    ) -> Self {
        Self {
            bytes: bytes.into(),
            mime_type: mime_type.into(),
            filename: filename.into(),
        }
    }
}

impl std::fmt::Debug for Attachment {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Attachment")
            .field("bytes_len", &self.bytes.len())
            .field("mime_type", &self.mime_type)
            .field("filename", &self.filename)
            .finish()
    }
}

/// Tree level used in validation errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Section,
    Subsection,
    Cell,
}

impl Display for NodeKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Section => "section",
            Self::Subsection => "subsection",
            Self::Cell => "cell",
        };
        f.write_str(label)
    }
}

/// Structural invariant violations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentValidationError {
    EmptyId(NodeKind),
    DuplicateId { kind: NodeKind, id: String },
}

impl Display for DocumentValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyId(kind) => write!(f, "{kind} id must not be empty"),
            Self::DuplicateId { kind, id } => {
                write!(f, "duplicate {kind} id `{id}` within the same parent")
            }
        }
    }
}

impl Error for DocumentValidationError {}

#[cfg(test)]
mod tests {
    use super::{
        Attachment, Cell, CellType, Document, DocumentValidationError, ImageMode, NodeKind,
        Section, Subsection,
    };

    #[test]
    fn default_report_has_one_empty_subsection() {
        let document = Document::default_report();
        assert_eq!(document.sections.len(), 1);
        assert_eq!(document.sections[0].subsections.len(), 1);
        assert!(document.sections[0].subsections[0].cells.is_empty());
        assert!(document.validate().is_ok());
    }

    #[test]
    fn image_cell_starts_as_placeholder_without_attachment() {
        let cell = Cell::image();
        assert_eq!(cell.cell_type(), CellType::Image);
        assert_eq!(cell.mode(), Some(ImageMode::Placeholder));
        assert!(cell.attachment().is_none());
        assert_eq!(Cell::text().mode(), None);
    }

    #[test]
    fn attach_sets_content_and_mode_change_clears_it() {
        let mut cell = Cell::image();
        cell.attach(Attachment::new(vec![1, 2, 3], "image/png", "plot.png"))
            .expect("image cell should accept attachment");
        assert_eq!(cell.content, "plot.png");

        cell.set_mode(ImageMode::Camera);
        assert_eq!(cell.mode(), Some(ImageMode::Camera));
        assert!(cell.attachment().is_none());
        assert!(cell.content.is_empty());
    }

    #[test]
    fn attach_rejects_code_cell() {
        let mut cell = Cell::code();
        let returned = cell
            .attach(Attachment::new(vec![0], "image/png", "x.png"))
            .expect_err("code cell must not take attachment");
        assert_eq!(returned.filename, "x.png");
    }

    #[test]
    fn validate_rejects_duplicate_ids_within_parent_only() {
        let mut first = Subsection::new("A");
        let mut second = Subsection::new("B");
        let mut cell = Cell::text();
        cell.id = "same".to_string();
        first.cells.push(cell.clone());
        second.cells.push(cell.clone());

        let mut section = Section::new("S");
        section.subsections.push(first);
        section.subsections.push(second);
        let mut document = Document::new("t", "a");
        document.sections.push(section);
        assert!(document.validate().is_ok());

        document.sections[0].subsections[0].cells.push(cell);
        let err = document.validate().expect_err("duplicate must be rejected");
        assert_eq!(
            err,
            DocumentValidationError::DuplicateId {
                kind: NodeKind::Cell,
                id: "same".to_string(),
            }
        );
    }
}
