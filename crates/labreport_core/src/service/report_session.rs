//! Report editing session.
//!
//! # Responsibility
//! - Hydrate the document on start (load, migrate, or seed a default).
//! - Route edits through debounced autosave and template imports through
//!   an immediate save.
//!
//! # Invariants
//! - The autosave gate opens only after hydration finished; a failed load
//!   never falls back to seeding, so stored data cannot be overwritten.
//! - A rejected import leaves the current document untouched.
//! - Imports keep the current title and author.

use crate::autosave::{AutosaveError, AutosaveScheduler, AutosaveStatus, ScheduleOutcome};
use crate::config::EngineConfig;
use crate::export::{build_export_bundle, ExportBundle};
use crate::model::document::Document;
use crate::normalize::StructureError;
use crate::persistence::{AttachmentFailure, PersistError, PersistenceEngine, SaveReceipt};
use crate::store::DocumentStore;
use crate::template::{parse_template_response, TemplateCode, TemplateCodeError, TemplateSource};
use log::{info, warn};
use serde_json::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};
use tokio::sync::watch;

/// How the session obtained its initial document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionStart {
    /// Nothing was stored; the default report was seeded.
    Seeded,
    Restored {
        /// Stored schema version when it was older than current.
        migrated_from: Option<u32>,
        attachment_failures: Vec<AttachmentFailure>,
    },
}

/// Template import failure.
#[derive(Debug)]
pub enum ImportError {
    Code(TemplateCodeError),
    /// Lookup service could not be reached.
    Fetch(String),
    Structure(StructureError),
    /// Template was applied in memory but the immediate save failed.
    Save(AutosaveError),
}

impl Display for ImportError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Code(err) => write!(f, "{err}"),
            Self::Fetch(message) => write!(f, "template lookup unavailable: {message}"),
            Self::Structure(err) => write!(f, "{err}"),
            Self::Save(err) => write!(f, "template applied but not saved: {err}"),
        }
    }
}

impl Error for ImportError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Code(err) => Some(err),
            Self::Fetch(_) => None,
            Self::Structure(err) => Some(err),
            Self::Save(err) => Some(err),
        }
    }
}

impl From<TemplateCodeError> for ImportError {
    fn from(value: TemplateCodeError) -> Self {
        Self::Code(value)
    }
}

impl From<StructureError> for ImportError {
    fn from(value: StructureError) -> Self {
        Self::Structure(value)
    }
}

/// One editing session over a persisted report.
pub struct ReportSession<S> {
    document: Document,
    autosave: AutosaveScheduler<S>,
}

impl<S> ReportSession<S>
where
    S: DocumentStore + Send + 'static,
{
    /// Loads the stored report (or seeds a default one) and opens autosave.
    ///
    /// # Errors
    /// - Any load failure (schema, corrupt envelope, store) is returned and
    ///   autosave stays closed.
    pub async fn open(
        store: S,
        config: &EngineConfig,
    ) -> Result<(Self, SessionStart), PersistError> {
        let engine = PersistenceEngine::from_config(store, config);
        let autosave = AutosaveScheduler::from_config(engine, config);

        let (document, start) = match autosave.load().await? {
            Some(loaded) => {
                let migrated_from = loaded.was_migrated().then_some(loaded.stored_version);
                if !loaded.attachment_failures.is_empty() {
                    warn!(
                        "event=session_open module=service status=degraded attachment_failures={}",
                        loaded.attachment_failures.len()
                    );
                }
                (
                    loaded.document,
                    SessionStart::Restored {
                        migrated_from,
                        attachment_failures: loaded.attachment_failures,
                    },
                )
            }
            None => (Document::default_report(), SessionStart::Seeded),
        };

        autosave.mark_ready();
        info!(
            "event=session_open module=service status=ok seeded={}",
            start == SessionStart::Seeded
        );
        Ok((Self { document, autosave }, start))
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    /// Applies an edit and schedules a debounced save of the result.
    pub fn edit(&mut self, apply: impl FnOnce(&mut Document)) -> ScheduleOutcome {
        apply(&mut self.document);
        self.autosave.schedule(self.document.clone())
    }

    /// Saves the current document immediately.
    pub async fn save_now(&self) -> Result<SaveReceipt, AutosaveError> {
        self.autosave.save_now(self.document.clone()).await
    }

    /// Writes any pending debounced edit now.
    pub async fn flush(&self) -> Result<Option<SaveReceipt>, AutosaveError> {
        self.autosave.flush().await
    }

    /// Looks up a template by code and replaces the document with it.
    pub async fn import_template(
        &mut self,
        source: &impl TemplateSource,
        raw_code: &str,
    ) -> Result<String, ImportError> {
        let code = TemplateCode::parse(raw_code)?;
        let response = source.fetch(&code).map_err(|message| {
            warn!("event=template_import module=service status=error error_code=fetch_failed code={code}");
            ImportError::Fetch(message)
        })?;
        self.import_template_response(&response).await
    }

    /// Replaces the document with a template response and saves immediately.
    ///
    /// The immediate save supersedes any pending debounced save of the
    /// pre-import document.
    pub async fn import_template_response(&mut self, response: &Value) -> Result<String, ImportError> {
        let imported = parse_template_response(response).map_err(|err| {
            warn!("event=template_import module=service status=error error={err}");
            err
        })?;

        self.document = Document {
            title: self.document.title.clone(),
            author: self.document.author.clone(),
            sections: imported.sections,
        };
        info!(
            "event=template_import module=service status=ok sections={}",
            self.document.sections.len()
        );

        self.autosave
            .save_now(self.document.clone())
            .await
            .map_err(ImportError::Save)?;
        Ok(imported.name)
    }

    pub fn export(&self) -> ExportBundle {
        build_export_bundle(&self.document)
    }

    pub fn autosave_status(&self) -> AutosaveStatus {
        self.autosave.status()
    }

    pub fn subscribe(&self) -> watch::Receiver<AutosaveStatus> {
        self.autosave.subscribe()
    }
}
