//! Debounced autosave scheduling.
//!
//! # Responsibility
//! - Coalesce rapid edits into one save after a quiet period.
//! - Run immediate saves (template import, flush) that supersede any
//!   pending debounced save.
//! - Serialize every write through one single-writer lock.
//!
//! # Invariants
//! - At most one debounce timer is pending; every `schedule`, `save_now`
//!   and `flush` call cancels it first.
//! - A timer writes only if no newer call happened since it was armed
//!   (generation check under the writer lock), so last call wins.
//! - Nothing is written before `mark_ready()`: an autosave of the default
//!   startup state would overwrite the stored report.
//! - A started store write is never cancelled; it holds no await point.

use crate::config::EngineConfig;
use crate::model::document::Document;
use crate::persistence::{
    LoadedDocument, PersistError, PersistResult, PersistenceEngine, SaveReceipt,
};
use crate::store::DocumentStore;
use log::{debug, error, info};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Latest autosave state, published for UI status indicators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AutosaveStatus {
    Idle,
    /// A debounced save is armed.
    Pending,
    Saved { timestamp_ms: i64 },
    Failed {
        message: String,
        capacity_exceeded: bool,
    },
}

/// Outcome of `schedule`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleOutcome {
    Scheduled,
    /// Dropped because startup hydration has not finished.
    SkippedNotReady,
}

#[derive(Debug)]
pub enum AutosaveError {
    /// Immediate save requested before `mark_ready()`.
    NotReady,
    Persist(PersistError),
}

impl Display for AutosaveError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotReady => write!(f, "autosave is not ready: initial load has not completed"),
            Self::Persist(err) => write!(f, "{err}"),
        }
    }
}

impl Error for AutosaveError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::NotReady => None,
            Self::Persist(err) => Some(err),
        }
    }
}

impl From<PersistError> for AutosaveError {
    fn from(value: PersistError) -> Self {
        Self::Persist(value)
    }
}

#[derive(Default)]
struct SchedulerState {
    ready: bool,
    generation: u64,
    pending: Option<Document>,
    timer: Option<JoinHandle<()>>,
}

impl SchedulerState {
    /// Invalidates any armed timer and returns the document it would have saved.
    fn supersede(&mut self) -> Option<Document> {
        self.generation = self.generation.wrapping_add(1);
        if let Some(timer) = self.timer.take() {
            timer.abort();
            debug!(
                "event=autosave_cancel module=autosave status=ok generation={}",
                self.generation
            );
        }
        self.pending.take()
    }
}

struct Shared<S> {
    engine: tokio::sync::Mutex<PersistenceEngine<S>>,
    state: Mutex<SchedulerState>,
    delay: Duration,
    status: watch::Sender<AutosaveStatus>,
}

impl<S> Shared<S> {
    fn state(&self) -> MutexGuard<'_, SchedulerState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn publish(&self, result: &PersistResult<SaveReceipt>) {
        let status = match result {
            Ok(receipt) => AutosaveStatus::Saved {
                timestamp_ms: receipt.timestamp_ms,
            },
            Err(err) => AutosaveStatus::Failed {
                message: err.to_string(),
                capacity_exceeded: err.is_capacity_exceeded(),
            },
        };
        self.status.send_replace(status);
    }
}

/// Owner of the debounce timer and the single-writer persistence lock.
pub struct AutosaveScheduler<S> {
    shared: Arc<Shared<S>>,
}

impl<S> Clone for AutosaveScheduler<S> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<S> AutosaveScheduler<S>
where
    S: DocumentStore + Send + 'static,
{
    pub fn new(engine: PersistenceEngine<S>, delay: Duration) -> Self {
        let (status, _) = watch::channel(AutosaveStatus::Idle);
        Self {
            shared: Arc::new(Shared {
                engine: tokio::sync::Mutex::new(engine),
                state: Mutex::new(SchedulerState::default()),
                delay,
                status,
            }),
        }
    }

    pub fn from_config(engine: PersistenceEngine<S>, config: &EngineConfig) -> Self {
        Self::new(engine, config.autosave_delay)
    }

    /// Loads the stored document through the writer lock.
    pub async fn load(&self) -> PersistResult<Option<LoadedDocument>> {
        let engine = self.shared.engine.lock().await;
        engine.load()
    }

    /// Opens the write gate once the initial load and seeding are done.
    pub fn mark_ready(&self) {
        self.shared.state().ready = true;
        info!("event=autosave_ready module=autosave status=ok");
    }

    pub fn has_pending(&self) -> bool {
        self.shared.state().pending.is_some()
    }

    /// Subscribes to status changes.
    pub fn subscribe(&self) -> watch::Receiver<AutosaveStatus> {
        self.shared.status.subscribe()
    }

    /// Current status snapshot.
    pub fn status(&self) -> AutosaveStatus {
        self.shared.status.borrow().clone()
    }

    /// Arms (or re-arms) the debounce timer for `document`.
    ///
    /// The document saved is the one from the latest call when the timer
    /// fires. Must be called from within a tokio runtime.
    pub fn schedule(&self, document: Document) -> ScheduleOutcome {
        let mut state = self.shared.state();
        if !state.ready {
            debug!("event=autosave_schedule module=autosave status=skipped reason=not_ready");
            return ScheduleOutcome::SkippedNotReady;
        }

        state.supersede();
        state.pending = Some(document);
        let generation = state.generation;
        state.timer = Some(tokio::spawn(run_timer(
            Arc::clone(&self.shared),
            generation,
        )));
        drop(state);

        self.shared.status.send_replace(AutosaveStatus::Pending);
        debug!(
            "event=autosave_schedule module=autosave status=ok generation={} delay_ms={}",
            generation,
            self.shared.delay.as_millis()
        );
        ScheduleOutcome::Scheduled
    }

    /// Saves `document` immediately, cancelling any pending debounced save.
    pub async fn save_now(&self, document: Document) -> Result<SaveReceipt, AutosaveError> {
        {
            let mut state = self.shared.state();
            if !state.ready {
                return Err(AutosaveError::NotReady);
            }
            state.supersede();
        }
        self.write_exclusive(&document, "immediate").await
    }

    /// Saves the pending debounced document now, if there is one.
    pub async fn flush(&self) -> Result<Option<SaveReceipt>, AutosaveError> {
        let pending = self.shared.state().supersede();
        match pending {
            Some(document) => self.write_exclusive(&document, "flush").await.map(Some),
            None => Ok(None),
        }
    }

    /// Drops the pending debounced save without writing it.
    pub fn cancel_pending(&self) -> bool {
        let cancelled = self.shared.state().supersede().is_some();
        if cancelled {
            self.shared.status.send_replace(AutosaveStatus::Idle);
        }
        cancelled
    }

    async fn write_exclusive(
        &self,
        document: &Document,
        trigger: &'static str,
    ) -> Result<SaveReceipt, AutosaveError> {
        let engine = self.shared.engine.lock().await;
        let result = engine.save(document);
        drop(engine);

        self.shared.publish(&result);
        if result.is_ok() {
            info!("event=autosave_write module=autosave status=ok trigger={trigger}");
        }
        result.map_err(AutosaveError::from)
    }
}

async fn run_timer<S>(shared: Arc<Shared<S>>, generation: u64)
where
    S: DocumentStore + Send + 'static,
{
    tokio::time::sleep(shared.delay).await;

    let engine = shared.engine.lock().await;
    let document = {
        let mut state = shared.state();
        if state.generation != generation {
            return;
        }
        state.timer = None;
        state.pending.take()
    };
    let Some(document) = document else {
        return;
    };

    info!("event=autosave_fire module=autosave status=start generation={generation}");
    let result = engine.save(&document);
    drop(engine);

    if let Err(err) = &result {
        error!(
            "event=autosave_fire module=autosave status=error generation={} error={}",
            generation, err
        );
    }
    shared.publish(&result);
}
