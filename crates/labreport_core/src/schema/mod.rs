//! Stored envelope schema versions and the migration chain.
//!
//! # Responsibility
//! - Read the schema version of a raw stored envelope.
//! - Upgrade envelopes of any known older version to the current one by
//!   chaining single-step migrations.
//!
//! # Invariants
//! - Migration steps are registered in strictly increasing order, one per
//!   version transition.
//! - Migrating a current-version envelope is a no-op.
//! - Envelopes newer than the latest known version are rejected, never
//!   guessed at.

use serde_json::{Map, Value};
use std::error::Error;
use std::fmt::{Display, Formatter};

mod migrations;

pub use migrations::{latest_version, migrate};
pub(crate) use migrations::adopt_legacy_attachments;

/// Version assumed for envelopes that carry no `version` field.
pub const UNVERSIONED_ENVELOPE_VERSION: u32 = 1;

/// Envelope schema failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    /// `version` is present but not a positive integer.
    InvalidVersion(String),
    /// Envelope was written by a newer build.
    UnsupportedVersion { found: u32, latest_supported: u32 },
    /// Envelope body does not have the shape its version promises.
    MalformedEnvelope(String),
}

impl Display for SchemaError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidVersion(raw) => write!(f, "invalid envelope version `{raw}`"),
            Self::UnsupportedVersion {
                found,
                latest_supported,
            } => write!(
                f,
                "envelope schema version {found} is newer than supported {latest_supported}"
            ),
            Self::MalformedEnvelope(message) => write!(f, "malformed envelope: {message}"),
        }
    }
}

impl Error for SchemaError {}

/// Untyped stored envelope as read from the store.
///
/// Older versions have different shapes, so migration works on the JSON
/// object itself before the typed current-version envelope is parsed.
#[derive(Debug, Clone, PartialEq)]
pub struct RawEnvelope {
    fields: Map<String, Value>,
}

impl RawEnvelope {
    /// Wraps a parsed JSON value.
    ///
    /// # Errors
    /// - Returns `MalformedEnvelope` when the value is not a JSON object.
    pub fn from_value(value: Value) -> Result<Self, SchemaError> {
        match value {
            Value::Object(fields) => Ok(Self { fields }),
            other => Err(SchemaError::MalformedEnvelope(format!(
                "expected a JSON object, got {}",
                json_kind(&other)
            ))),
        }
    }

    /// Returns the schema version, defaulting unversioned envelopes to 1.
    pub fn version(&self) -> Result<u32, SchemaError> {
        match self.fields.get("version") {
            None | Some(Value::Null) => Ok(UNVERSIONED_ENVELOPE_VERSION),
            Some(Value::Number(number)) => number
                .as_u64()
                .and_then(|raw| u32::try_from(raw).ok())
                .filter(|version| *version > 0)
                .ok_or_else(|| SchemaError::InvalidVersion(number.to_string())),
            Some(other) => Err(SchemaError::InvalidVersion(other.to_string())),
        }
    }

    pub(crate) fn set_version(&mut self, version: u32) {
        self.fields
            .insert("version".to_string(), Value::from(version));
    }

    pub(crate) fn fields_mut(&mut self) -> &mut Map<String, Value> {
        &mut self.fields
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.fields)
    }
}

pub(crate) fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
