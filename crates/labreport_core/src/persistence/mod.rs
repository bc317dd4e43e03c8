//! Versioned persistence of report documents.
//!
//! # Responsibility
//! - Own the stored envelope format.
//! - Orchestrate save (document -> encoded attachments -> envelope -> store)
//!   and load (store -> envelope -> migration -> decoded attachments).
//!
//! # Invariants
//! - Saves always write the latest schema version under one fixed key.
//! - A failed save leaves the previously stored envelope untouched.
//! - Per-attachment decode failures never fail a load.

use crate::model::document::DocumentValidationError;
use crate::schema::SchemaError;
use crate::store::StoreError;
use std::error::Error;
use std::fmt::{Display, Formatter};

mod engine;
pub mod envelope;

pub use engine::{LoadedDocument, PersistenceEngine, SaveReceipt};
pub use envelope::{AttachmentFailure, Envelope};

pub type PersistResult<T> = Result<T, PersistError>;

/// Save/load failure surfaced to the caller.
#[derive(Debug)]
pub enum PersistError {
    /// Stored envelope version is unreadable or newer than supported.
    Schema(SchemaError),
    /// Encoded envelope does not fit in the store.
    StoreCapacity { required: usize, capacity: usize },
    /// Any other store failure.
    Store(StoreError),
    /// In-memory document breaks structural invariants; nothing was written.
    InvalidDocument(DocumentValidationError),
    /// Stored text is not a parseable envelope.
    CorruptEnvelope(serde_json::Error),
    /// Envelope could not be serialized.
    Serialize(serde_json::Error),
}

impl PersistError {
    /// Whether this is the store-capacity failure users should be warned about.
    pub fn is_capacity_exceeded(&self) -> bool {
        matches!(self, Self::StoreCapacity { .. })
    }
}

impl Display for PersistError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Schema(err) => write!(f, "{err}"),
            Self::StoreCapacity { required, capacity } => write!(
                f,
                "report does not fit in local storage: {required} bytes required, {capacity} available"
            ),
            Self::Store(err) => write!(f, "{err}"),
            Self::InvalidDocument(err) => write!(f, "invalid document: {err}"),
            Self::CorruptEnvelope(err) => write!(f, "stored report is not readable: {err}"),
            Self::Serialize(err) => write!(f, "failed to serialize report: {err}"),
        }
    }
}

impl Error for PersistError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Schema(err) => Some(err),
            Self::Store(err) => Some(err),
            Self::InvalidDocument(err) => Some(err),
            Self::CorruptEnvelope(err) | Self::Serialize(err) => Some(err),
            Self::StoreCapacity { .. } => None,
        }
    }
}

impl From<SchemaError> for PersistError {
    fn from(value: SchemaError) -> Self {
        Self::Schema(value)
    }
}

impl From<StoreError> for PersistError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::CapacityExceeded { required, capacity } => {
                Self::StoreCapacity { required, capacity }
            }
            other => Self::Store(other),
        }
    }
}

impl From<DocumentValidationError> for PersistError {
    fn from(value: DocumentValidationError) -> Self {
        Self::InvalidDocument(value)
    }
}
