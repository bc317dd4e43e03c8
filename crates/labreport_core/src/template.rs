//! Template lookup boundary.
//!
//! # Responsibility
//! - Validate template codes before they reach the lookup service.
//! - Parse lookup responses and normalize the returned structure.
//!
//! # Invariants
//! - Any response outside `{success: true, name, structure}` or
//!   `{success: false, error}` is a `StructureError`.
//! - A rejected or malformed import never yields partial sections.

use crate::model::document::Section;
use crate::normalize::{normalize_sections, StructureError};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};

static TEMPLATE_CODE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9]{3,32}$").expect("valid template code regex"));

/// Short alphanumeric code identifying a shared template.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TemplateCode(String);

impl TemplateCode {
    /// Parses user input, trimming surrounding whitespace.
    pub fn parse(raw: &str) -> Result<Self, TemplateCodeError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(TemplateCodeError::Empty);
        }
        if !TEMPLATE_CODE_RE.is_match(trimmed) {
            return Err(TemplateCodeError::Invalid(trimmed.to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for TemplateCode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateCodeError {
    Empty,
    Invalid(String),
}

impl Display for TemplateCodeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => write!(f, "template code must not be empty"),
            Self::Invalid(value) => write!(
                f,
                "template code `{value}` must be 3-32 ASCII letters or digits"
            ),
        }
    }
}

impl Error for TemplateCodeError {}

/// Remote template lookup service.
///
/// Implementations return the raw response body; parsing stays here so
/// every source gets the same validation.
pub trait TemplateSource {
    fn fetch(&self, code: &TemplateCode) -> Result<Value, String>;
}

impl<F> TemplateSource for F
where
    F: Fn(&TemplateCode) -> Result<Value, String>,
{
    fn fetch(&self, code: &TemplateCode) -> Result<Value, String> {
        self(code)
    }
}

/// Template accepted by the lookup service and normalized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportedTemplate {
    pub name: String,
    pub sections: Vec<Section>,
}

#[derive(Deserialize)]
struct WireResponse {
    success: bool,
    name: Option<String>,
    structure: Option<Value>,
    error: Option<String>,
}

/// Parses a lookup response and normalizes its structure.
///
/// # Errors
/// - `Rejected` when the service reports failure.
/// - `InvalidResponse` when the response does not match the contract.
/// - Any normalization error for the returned structure.
pub fn parse_template_response(response: &Value) -> Result<ImportedTemplate, StructureError> {
    let wire = WireResponse::deserialize(response)
        .map_err(|err| StructureError::InvalidResponse(err.to_string()))?;

    if !wire.success {
        let message = wire
            .error
            .filter(|message| !message.trim().is_empty())
            .unwrap_or_else(|| "template lookup reported failure".to_string());
        return Err(StructureError::Rejected(message));
    }

    let name = wire
        .name
        .ok_or_else(|| StructureError::InvalidResponse("missing `name`".to_string()))?;
    let structure = wire
        .structure
        .ok_or_else(|| StructureError::InvalidResponse("missing `structure`".to_string()))?;

    Ok(ImportedTemplate {
        name,
        sections: normalize_sections(&structure)?,
    })
}
