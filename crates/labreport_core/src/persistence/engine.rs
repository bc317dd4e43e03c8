//! Persistence engine over an injected `DocumentStore`.

use super::envelope::{AttachmentFailure, Envelope};
use super::{PersistError, PersistResult};
use crate::config::EngineConfig;
use crate::model::document::Document;
use crate::schema::{adopt_legacy_attachments, latest_version, migrate, RawEnvelope};
use crate::store::{now_epoch_ms, DocumentStore};
use log::{error, info, warn};
use std::time::Instant;

/// Result of a successful save.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaveReceipt {
    /// Envelope timestamp, Unix epoch milliseconds.
    pub timestamp_ms: i64,
    /// Serialized envelope size.
    pub bytes: usize,
}

/// Hydrated document returned by `load`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedDocument {
    pub document: Document,
    /// Timestamp of the save that produced the envelope (0 when unknown).
    pub saved_at_ms: i64,
    /// Schema version found in the store, before migration.
    pub stored_version: u32,
    /// Image cells whose attachment could not be restored.
    pub attachment_failures: Vec<AttachmentFailure>,
}

impl LoadedDocument {
    pub fn was_migrated(&self) -> bool {
        self.stored_version != latest_version()
    }
}

/// Single-slot document persistence.
pub struct PersistenceEngine<S> {
    store: S,
    storage_key: String,
}

impl<S: DocumentStore> PersistenceEngine<S> {
    pub fn new(store: S, storage_key: impl Into<String>) -> Self {
        Self {
            store,
            storage_key: storage_key.into(),
        }
    }

    pub fn from_config(store: S, config: &EngineConfig) -> Self {
        Self::new(store, config.storage_key.clone())
    }

    /// Writes `document` as a latest-version envelope, replacing any prior value.
    ///
    /// # Errors
    /// - `InvalidDocument` when structural invariants fail.
    /// - `StoreCapacity` when the envelope does not fit; the previous value
    ///   stays in place.
    /// - `Store` / `Serialize` for other failures. No retry is attempted.
    pub fn save(&self, document: &Document) -> PersistResult<SaveReceipt> {
        let started_at = Instant::now();
        match self.write_envelope(document) {
            Ok(receipt) => {
                info!(
                    "event=doc_save module=persistence status=ok duration_ms={} bytes={} capacity_bytes={} sections={} attachments={}",
                    started_at.elapsed().as_millis(),
                    receipt.bytes,
                    self.store.capacity_bytes(),
                    document.sections.len(),
                    document.attachment_count()
                );
                Ok(receipt)
            }
            Err(err) if err.is_capacity_exceeded() => {
                warn!(
                    "event=doc_save module=persistence status=error error_code=capacity_exceeded duration_ms={} error={}",
                    started_at.elapsed().as_millis(),
                    err
                );
                Err(err)
            }
            Err(err) => {
                error!(
                    "event=doc_save module=persistence status=error duration_ms={} error={}",
                    started_at.elapsed().as_millis(),
                    err
                );
                Err(err)
            }
        }
    }

    fn write_envelope(&self, document: &Document) -> PersistResult<SaveReceipt> {
        document.validate()?;

        let timestamp_ms = now_epoch_ms();
        let envelope = Envelope::from_document(document, latest_version(), timestamp_ms);
        let serialized = serde_json::to_string(&envelope).map_err(PersistError::Serialize)?;

        self.store.set(&self.storage_key, &serialized)?;
        Ok(SaveReceipt {
            timestamp_ms,
            bytes: serialized.len(),
        })
    }

    /// Reads, migrates and hydrates the stored document.
    ///
    /// Returns `Ok(None)` when nothing is stored; seeding a fresh document is
    /// the caller's decision.
    ///
    /// # Errors
    /// - `Schema` for unknown or future envelope versions.
    /// - `CorruptEnvelope` when the stored text is not a valid envelope.
    /// - `Store` when the store cannot be read.
    pub fn load(&self) -> PersistResult<Option<LoadedDocument>> {
        let started_at = Instant::now();
        let result = self.read_envelope();

        match &result {
            Ok(None) => info!(
                "event=doc_load module=persistence status=ok found=false duration_ms={}",
                started_at.elapsed().as_millis()
            ),
            Ok(Some(loaded)) => info!(
                "event=doc_load module=persistence status=ok found=true stored_version={} sections={} attachment_failures={} duration_ms={}",
                loaded.stored_version,
                loaded.document.sections.len(),
                loaded.attachment_failures.len(),
                started_at.elapsed().as_millis()
            ),
            Err(err) => error!(
                "event=doc_load module=persistence status=error duration_ms={} error={}",
                started_at.elapsed().as_millis(),
                err
            ),
        }
        result
    }

    fn read_envelope(&self) -> PersistResult<Option<LoadedDocument>> {
        let Some(serialized) = self.store.get(&self.storage_key)? else {
            return Ok(None);
        };

        let value: serde_json::Value =
            serde_json::from_str(&serialized).map_err(PersistError::CorruptEnvelope)?;
        let raw = RawEnvelope::from_value(value)?;
        let stored_version = raw.version()?;
        let mut current = migrate(raw)?;
        let adopted = adopt_legacy_attachments(&mut current);
        if adopted > 0 {
            warn!(
                "event=doc_load module=persistence status=repaired field=file_base64 cells={adopted}"
            );
        }
        let envelope: Envelope = serde_json::from_value(current.into_value())
            .map_err(PersistError::CorruptEnvelope)?;

        let saved_at_ms = envelope.timestamp;
        let (document, attachment_failures) = envelope.into_document();
        Ok(Some(LoadedDocument {
            document,
            saved_at_ms,
            stored_version,
            attachment_failures,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::PersistenceEngine;
    use crate::model::document::{Cell, Document};
    use crate::store::{DocumentStore, MemoryStore};

    const KEY: &str = "report";

    #[test]
    fn load_of_empty_store_is_none() {
        let engine = PersistenceEngine::new(MemoryStore::with_capacity(1024), KEY);
        assert!(engine.load().expect("load should succeed").is_none());
    }

    #[test]
    fn save_writes_latest_version_under_fixed_key() {
        let store = MemoryStore::with_capacity(64 * 1024);
        let engine = PersistenceEngine::new(store.clone(), KEY);
        let receipt = engine
            .save(&Document::default_report())
            .expect("save should succeed");

        let raw = store.get(KEY).expect("readable").expect("written");
        assert_eq!(raw.len(), receipt.bytes);
        let value: serde_json::Value = serde_json::from_str(&raw).expect("json");
        assert_eq!(value["version"], 2);
        assert_eq!(value["timestamp"], receipt.timestamp_ms);
    }

    #[test]
    fn invalid_document_is_not_written() {
        let store = MemoryStore::with_capacity(64 * 1024);
        let engine = PersistenceEngine::new(store.clone(), KEY);
        let mut document = Document::default_report();
        let mut cell = Cell::text();
        cell.id = String::new();
        document.sections[0].subsections[0].cells.push(cell);

        assert!(engine.save(&document).is_err());
        assert_eq!(store.get(KEY).expect("readable"), None);
    }

    #[test]
    fn corrupt_store_text_is_reported() {
        let store = MemoryStore::with_capacity(1024);
        store.set(KEY, "{not json").expect("fits");
        let engine = PersistenceEngine::new(store, KEY);
        let err = engine.load().unwrap_err();
        assert!(matches!(err, super::PersistError::CorruptEnvelope(_)));
    }
}
