use labreport_core::store::StoreResult;
use labreport_core::{
    AutosaveScheduler, AutosaveStatus, Cell, Document, DocumentStore, MemoryStore,
    PersistenceEngine,
};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const KEY: &str = "report";
const DELAY: Duration = Duration::from_millis(1000);

/// Memory store that counts writes.
#[derive(Clone)]
struct CountingStore {
    inner: MemoryStore,
    writes: Arc<AtomicUsize>,
}

impl CountingStore {
    fn new(capacity: usize) -> Self {
        Self {
            inner: MemoryStore::with_capacity(capacity),
            writes: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn stored_title(&self) -> Option<String> {
        PersistenceEngine::new(self.inner.clone(), KEY)
            .load()
            .unwrap()
            .map(|loaded| loaded.document.title)
    }
}

impl DocumentStore for CountingStore {
    fn get(&self, key: &str) -> StoreResult<Option<String>> {
        self.inner.get(key)
    }

    fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.set(key, value)
    }

    fn capacity_bytes(&self) -> usize {
        self.inner.capacity_bytes()
    }
}

/// Memory store recording written titles; the first write blocks its
/// thread, holding the writer lock.
#[derive(Clone)]
struct SlowFirstWriteStore {
    inner: MemoryStore,
    titles: Arc<Mutex<Vec<String>>>,
    slow_pending: Arc<AtomicBool>,
    slow_started: Arc<AtomicBool>,
}

impl SlowFirstWriteStore {
    fn new(capacity: usize) -> Self {
        Self {
            inner: MemoryStore::with_capacity(capacity),
            titles: Arc::new(Mutex::new(Vec::new())),
            slow_pending: Arc::new(AtomicBool::new(true)),
            slow_started: Arc::new(AtomicBool::new(false)),
        }
    }

    fn titles(&self) -> Vec<String> {
        self.titles.lock().unwrap().clone()
    }
}

impl DocumentStore for SlowFirstWriteStore {
    fn get(&self, key: &str) -> StoreResult<Option<String>> {
        self.inner.get(key)
    }

    fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        if self.slow_pending.swap(false, Ordering::SeqCst) {
            self.slow_started.store(true, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(200));
        }
        let envelope: serde_json::Value = serde_json::from_str(value).unwrap();
        let title = envelope["title"].as_str().unwrap_or_default().to_string();
        self.titles.lock().unwrap().push(title);
        self.inner.set(key, value)
    }

    fn capacity_bytes(&self) -> usize {
        self.inner.capacity_bytes()
    }
}

fn titled(title: &str) -> Document {
    let mut document = Document::default_report();
    document.title = title.to_string();
    document
}

fn ready_scheduler(store: &CountingStore) -> AutosaveScheduler<CountingStore> {
    let autosave = AutosaveScheduler::new(PersistenceEngine::new(store.clone(), KEY), DELAY);
    autosave.mark_ready();
    autosave
}

async fn advance(millis: u64) {
    tokio::time::sleep(Duration::from_millis(millis)).await;
}

#[tokio::test(start_paused = true)]
async fn rapid_edits_coalesce_into_one_write_of_the_latest_document() {
    let store = CountingStore::new(64 * 1024);
    let autosave = ready_scheduler(&store);

    for title in ["a", "ab", "abc", "abcd"] {
        autosave.schedule(titled(title));
        advance(200).await;
    }
    assert_eq!(store.writes(), 0);
    assert_eq!(autosave.status(), AutosaveStatus::Pending);

    advance(1000).await;
    assert_eq!(store.writes(), 1);
    assert_eq!(store.stored_title().as_deref(), Some("abcd"));
    assert!(matches!(autosave.status(), AutosaveStatus::Saved { .. }));
}

#[tokio::test(start_paused = true)]
async fn each_edit_restarts_the_quiet_period() {
    let store = CountingStore::new(64 * 1024);
    let autosave = ready_scheduler(&store);

    autosave.schedule(titled("first"));
    advance(900).await;
    autosave.schedule(titled("second"));
    advance(900).await;
    assert_eq!(store.writes(), 0, "timer must restart on every edit");

    advance(200).await;
    assert_eq!(store.writes(), 1);
    assert_eq!(store.stored_title().as_deref(), Some("second"));
}

#[tokio::test(start_paused = true)]
async fn immediate_save_supersedes_pending_debounced_save() {
    let store = CountingStore::new(64 * 1024);
    let autosave = ready_scheduler(&store);

    autosave.schedule(titled("before import"));
    advance(100).await;
    autosave.save_now(titled("imported")).await.unwrap();
    assert!(!autosave.has_pending());

    advance(3000).await;
    assert_eq!(store.writes(), 1);
    assert_eq!(store.stored_title().as_deref(), Some("imported"));
}

#[tokio::test(start_paused = true)]
async fn edit_after_immediate_save_is_still_debounced() {
    let store = CountingStore::new(64 * 1024);
    let autosave = ready_scheduler(&store);

    autosave.save_now(titled("imported")).await.unwrap();
    autosave.schedule(titled("edited"));
    advance(1500).await;

    assert_eq!(store.writes(), 2);
    assert_eq!(store.stored_title().as_deref(), Some("edited"));
}

#[tokio::test(start_paused = true)]
async fn flush_writes_pending_edit_once() {
    let store = CountingStore::new(64 * 1024);
    let autosave = ready_scheduler(&store);

    assert_eq!(autosave.flush().await.unwrap(), None);

    autosave.schedule(titled("closing"));
    let receipt = autosave.flush().await.unwrap();
    assert!(receipt.is_some());
    assert_eq!(store.writes(), 1);

    advance(3000).await;
    assert_eq!(store.writes(), 1);
    assert_eq!(store.stored_title().as_deref(), Some("closing"));
}

#[tokio::test(start_paused = true)]
async fn failed_autosave_reports_capacity_and_keeps_previous_save() {
    let store = CountingStore::new(2 * 1024);
    let autosave = ready_scheduler(&store);
    let mut status = autosave.subscribe();

    autosave.save_now(titled("fits")).await.unwrap();

    let mut too_big = titled("too big");
    let mut cell = Cell::text();
    cell.content = "x".repeat(8 * 1024);
    too_big.sections[0].subsections[0].cells.push(cell);
    autosave.schedule(too_big);
    advance(1100).await;

    match &*status.borrow_and_update() {
        AutosaveStatus::Failed {
            capacity_exceeded, ..
        } => assert!(*capacity_exceeded),
        other => panic!("unexpected status: {other:?}"),
    }
    assert_eq!(store.stored_title().as_deref(), Some("fits"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn woken_timer_never_writes_after_newer_immediate_save() {
    let store = SlowFirstWriteStore::new(64 * 1024);
    let autosave = AutosaveScheduler::new(
        PersistenceEngine::new(store.clone(), KEY),
        Duration::from_millis(20),
    );
    autosave.mark_ready();

    let blocker = {
        let autosave = autosave.clone();
        tokio::spawn(async move { autosave.save_now(titled("blocker")).await })
    };
    while !store.slow_started.load(Ordering::SeqCst) {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    // The timer wakes while the slow write still holds the writer lock.
    autosave.schedule(titled("stale"));
    tokio::time::sleep(Duration::from_millis(60)).await;
    autosave.save_now(titled("latest")).await.unwrap();
    blocker.await.unwrap().unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;

    assert_eq!(store.titles(), vec!["blocker".to_string(), "latest".to_string()]);
    assert!(matches!(autosave.status(), AutosaveStatus::Saved { .. }));
    assert!(!autosave.has_pending());
}
