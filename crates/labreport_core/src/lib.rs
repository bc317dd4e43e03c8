//! Persistence and migration engine for lab report documents.
//! This crate is the single source of truth for document invariants.

pub mod autosave;
pub mod codec;
pub mod config;
pub mod db;
pub mod export;
pub mod logging;
pub mod model;
pub mod normalize;
pub mod persistence;
pub mod schema;
pub mod service;
pub mod store;
pub mod template;

pub use autosave::{AutosaveError, AutosaveScheduler, AutosaveStatus, ScheduleOutcome};
pub use codec::{decode_attachment, encode_attachment, CodecError};
pub use config::{ConfigError, EngineConfig};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::document::{
    Attachment, Cell, CellKind, CellType, Document, DocumentValidationError, ImageMode, Section,
    Subsection,
};
pub use normalize::{normalize_document, normalize_sections, StructureError};
pub use persistence::{
    AttachmentFailure, LoadedDocument, PersistError, PersistResult, PersistenceEngine, SaveReceipt,
};
pub use schema::{RawEnvelope, SchemaError};
pub use service::report_session::{ImportError, ReportSession, SessionStart};
pub use store::{DocumentStore, MemoryStore, SqliteStore, StoreError};
pub use template::{parse_template_response, ImportedTemplate, TemplateCode, TemplateSource};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
