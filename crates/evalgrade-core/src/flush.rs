//! Debounced persistence of entry-session snapshots.
//!
//! Scores live in the [`EntrySession`](crate::session::EntrySession) while
//! they are entered. Snapshots of a session are queued on a [`FlushQueue`],
//! which coalesces rapid edits into one write to a [`ScoreStore`]. Stores
//! apply snapshots idempotently, so replaying or reordering deliveries never
//! corrupts stored totals.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::StoreError;
use crate::model::Component;
use crate::record::ScoreRecord;

/// One component's flat records at a session revision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentSnapshot {
    pub session_id: Uuid,
    pub course_id: String,
    pub component: Component,
    pub academic_year: String,
    pub revision: u64,
    pub records: Vec<ScoreRecord>,
}

/// What a store did with a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    Applied,
    /// An equal-session snapshot with a newer revision was already stored.
    Stale,
}

// ---------------------------------------------------------------------------
// Score store trait
// ---------------------------------------------------------------------------

/// Persistence backend for component snapshots.
#[async_trait]
pub trait ScoreStore: Send + Sync {
    /// Human-readable store name (e.g. "memory").
    fn name(&self) -> &str;

    /// Store every record in the snapshot, replacing only data of the
    /// snapshot's component. Must be idempotent.
    async fn apply(&self, snapshot: &ComponentSnapshot) -> Result<ApplyOutcome, StoreError>;
}

type RecordKey = (String, String, String);

/// In-memory store used by the CLI and tests.
pub struct MemoryStore {
    records: Mutex<BTreeMap<RecordKey, ScoreRecord>>,
    revisions: Mutex<HashMap<(String, Component), (Uuid, u64)>>,
    entry_enabled: AtomicBool,
    failures_remaining: AtomicU32,
    writes: AtomicU32,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            records: Mutex::new(BTreeMap::new()),
            revisions: Mutex::new(HashMap::new()),
            entry_enabled: AtomicBool::new(true),
            failures_remaining: AtomicU32::new(0),
            writes: AtomicU32::new(0),
        }
    }

    /// Store records for a course as-is, bypassing revision checks.
    pub fn seed(&self, course_id: &str, records: impl IntoIterator<Item = ScoreRecord>) {
        if let Ok(mut stored) = self.records.lock() {
            for record in records {
                let key = (
                    course_id.to_string(),
                    record.academic_year.clone(),
                    record.student_id.clone(),
                );
                stored.insert(key, record);
            }
        }
    }

    /// Stored records of a course, ordered by academic year and student.
    pub fn records(&self, course_id: &str) -> Vec<ScoreRecord> {
        self.records
            .lock()
            .map(|stored| {
                stored
                    .iter()
                    .filter(|((course, _, _), _)| course == course_id)
                    .map(|(_, record)| record.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Refuse (or allow again) every write.
    pub fn set_entry_enabled(&self, enabled: bool) {
        self.entry_enabled.store(enabled, Ordering::SeqCst);
    }

    /// Make the next `count` writes fail with a backend error.
    pub fn fail_next_writes(&self, count: u32) {
        self.failures_remaining.store(count, Ordering::SeqCst);
    }

    /// Number of snapshots actually applied.
    pub fn write_count(&self) -> u32 {
        self.writes.load(Ordering::SeqCst)
    }

    /// Latest applied revision for a (course, component).
    pub fn stored_revision(&self, course_id: &str, component: Component) -> Option<u64> {
        self.revisions
            .lock()
            .ok()
            .and_then(|r| r.get(&(course_id.to_string(), component)).map(|(_, rev)| *rev))
    }
}

fn poisoned<T>(_: T) -> StoreError {
    StoreError::Backend("memory store lock poisoned".into())
}

#[async_trait]
impl ScoreStore for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn apply(&self, snapshot: &ComponentSnapshot) -> Result<ApplyOutcome, StoreError> {
        if !self.entry_enabled.load(Ordering::SeqCst) {
            return Err(StoreError::EntryDisabled {
                course_id: snapshot.course_id.clone(),
            });
        }
        let failing = self
            .failures_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(StoreError::Backend("simulated write failure".into()));
        }

        let mut revisions = self.revisions.lock().map_err(poisoned)?;
        let key = (snapshot.course_id.clone(), snapshot.component);
        if let Some((session, revision)) = revisions.get(&key) {
            if *session == snapshot.session_id && *revision > snapshot.revision {
                tracing::debug!(
                    course = %snapshot.course_id,
                    component = %snapshot.component,
                    stored = revision,
                    incoming = snapshot.revision,
                    "ignoring stale snapshot"
                );
                return Ok(ApplyOutcome::Stale);
            }
        }

        let mut stored = self.records.lock().map_err(poisoned)?;
        for slice in &snapshot.records {
            let record_key = (
                snapshot.course_id.clone(),
                slice.academic_year.clone(),
                slice.student_id.clone(),
            );
            stored
                .entry(record_key)
                .or_insert_with(|| ScoreRecord::new(&slice.student_id, &slice.academic_year))
                .replace_component(snapshot.component, slice);
        }
        revisions.insert(key, (snapshot.session_id, snapshot.revision));
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(ApplyOutcome::Applied)
    }
}

// ---------------------------------------------------------------------------
// Flush queue
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct QueueState {
    pending: Option<ComponentSnapshot>,
    /// Revision currently being applied by the store.
    in_flight: Option<u64>,
    generation: u64,
    last_written: Option<u64>,
    last_error: Option<StoreError>,
}

struct FlushInner {
    store: Arc<dyn ScoreStore>,
    debounce: Duration,
    state: tokio::sync::Mutex<QueueState>,
    /// Held for the whole of a store write so writes never overlap.
    write_guard: tokio::sync::Mutex<()>,
}

/// Coalescing write queue in front of a [`ScoreStore`].
///
/// Only the latest enqueued snapshot is kept. It is written once the
/// debounce window passes without another enqueue, or immediately on
/// [`FlushQueue::flush_now`]. A failed write stays pending until a retry
/// succeeds or a newer snapshot replaces it.
#[derive(Clone)]
pub struct FlushQueue {
    inner: Arc<FlushInner>,
}

impl FlushQueue {
    pub fn new(store: Arc<dyn ScoreStore>, debounce: Duration) -> Self {
        Self {
            inner: Arc::new(FlushInner {
                store,
                debounce,
                state: tokio::sync::Mutex::new(QueueState::default()),
                write_guard: tokio::sync::Mutex::new(()),
            }),
        }
    }

    pub fn debounce(&self) -> Duration {
        self.inner.debounce
    }

    /// Queue a snapshot, replacing any pending one, and restart the timer.
    pub async fn enqueue(&self, snapshot: ComponentSnapshot) {
        let generation = {
            let mut state = self.inner.state.lock().await;
            if let Some(previous) = &state.pending {
                tracing::debug!(
                    superseded = previous.revision,
                    revision = snapshot.revision,
                    "coalescing pending snapshot"
                );
            }
            state.pending = Some(snapshot);
            state.generation += 1;
            state.generation
        };

        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            tokio::time::sleep(inner.debounce).await;
            if inner.state.lock().await.generation != generation {
                return;
            }
            if let Err(e) = write_pending(&inner).await {
                tracing::warn!("debounced flush failed: {e}");
            }
        });
    }

    /// Write the pending snapshot now. Returns the revision written, if any.
    ///
    /// A debounced write already in progress is waited for. If it fails its
    /// snapshot is retried here, so the result always reflects the store.
    pub async fn flush_now(&self) -> Result<Option<u64>, StoreError> {
        let outstanding = {
            let state = self.inner.state.lock().await;
            state.pending.is_some() || state.in_flight.is_some()
        };
        match write_pending(&self.inner).await? {
            Some(revision) => Ok(Some(revision)),
            None if outstanding => Ok(self.inner.state.lock().await.last_written),
            None => Ok(None),
        }
    }

    /// Revision of the snapshot waiting to be written.
    pub async fn pending_revision(&self) -> Option<u64> {
        self.inner
            .state
            .lock()
            .await
            .pending
            .as_ref()
            .map(|s| s.revision)
    }

    /// Revision of the last snapshot the store accepted.
    pub async fn last_written(&self) -> Option<u64> {
        self.inner.state.lock().await.last_written
    }

    /// Error of the most recent failed write, cleared by a success.
    pub async fn last_error(&self) -> Option<StoreError> {
        self.inner.state.lock().await.last_error.clone()
    }
}

async fn write_pending(inner: &FlushInner) -> Result<Option<u64>, StoreError> {
    let _guard = inner.write_guard.lock().await;
    let snapshot = {
        let mut state = inner.state.lock().await;
        let Some(snapshot) = state.pending.take() else {
            return Ok(None);
        };
        state.in_flight = Some(snapshot.revision);
        snapshot
    };

    let result = inner.store.apply(&snapshot).await;

    let mut state = inner.state.lock().await;
    state.in_flight = None;
    match result {
        Ok(outcome) => {
            tracing::info!(
                store = inner.store.name(),
                course = %snapshot.course_id,
                component = %snapshot.component,
                revision = snapshot.revision,
                students = snapshot.records.len(),
                ?outcome,
                "flushed scores"
            );
            state.last_written = Some(snapshot.revision);
            state.last_error = None;
            Ok(Some(snapshot.revision))
        }
        Err(e) => {
            tracing::warn!(
                course = %snapshot.course_id,
                component = %snapshot.component,
                revision = snapshot.revision,
                "flush failed, keeping snapshot pending: {e}"
            );
            if state.pending.is_none() {
                state.pending = Some(snapshot);
            }
            state.last_error = Some(e.clone());
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CourseConfig;
    use crate::model::CourseType;
    use crate::session::EntrySession;

    fn assignment_session() -> EntrySession {
        let config = CourseConfig::new("CS101", CourseType::Ug).with_academic_year("2024-25");
        EntrySession::open(&config, Component::Assignment).unwrap()
    }

    fn queue(store: &Arc<MemoryStore>) -> FlushQueue {
        FlushQueue::new(store.clone(), Duration::from_millis(1500))
    }

    fn stored_assignment(store: &MemoryStore, student: &str) -> Option<f64> {
        store
            .records("CS101")
            .into_iter()
            .find(|r| r.student_id == student)
            .and_then(|r| {
                r.scores
                    .iter()
                    .find(|e| e.component_name == "ASSIGNMENT")
                    .map(|e| e.obtained_marks)
            })
    }

    #[tokio::test(start_paused = true)]
    async fn rapid_edits_coalesce_into_one_write() {
        let store = Arc::new(MemoryStore::new());
        let queue = queue(&store);
        let mut session = assignment_session();

        for marks in [5.0, 12.0, 18.0] {
            session.set_assignment("s-1", marks).unwrap();
            queue.enqueue(session.snapshot()).await;
            tokio::time::sleep(Duration::from_millis(200)).await;
        }
        assert_eq!(store.write_count(), 0);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(store.write_count(), 1);
        assert_eq!(stored_assignment(&store, "s-1"), Some(18.0));
        assert_eq!(queue.last_written().await, Some(session.revision()));
        assert_eq!(queue.pending_revision().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn flush_now_writes_immediately() {
        let store = Arc::new(MemoryStore::new());
        let queue = queue(&store);
        let mut session = assignment_session();
        session.set_assignment("s-1", 20.0).unwrap();
        queue.enqueue(session.snapshot()).await;

        let written = queue.flush_now().await.unwrap();
        assert_eq!(written, Some(session.revision()));
        assert_eq!(store.write_count(), 1);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(store.write_count(), 1);
        assert_eq!(queue.flush_now().await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_write_stays_pending_for_retry() {
        let store = Arc::new(MemoryStore::new());
        store.fail_next_writes(1);
        let queue = queue(&store);
        let mut session = assignment_session();
        session.set_assignment("s-1", 7.0).unwrap();
        let revision = session.revision();
        queue.enqueue(session.snapshot()).await;

        let err = queue.flush_now().await.unwrap_err();
        assert!(matches!(err, StoreError::Backend(_)));
        assert_eq!(queue.pending_revision().await, Some(revision));
        assert_eq!(queue.last_error().await, Some(err));
        assert_eq!(session.scaled("s-1"), Some(7.0));

        assert_eq!(queue.flush_now().await.unwrap(), Some(revision));
        assert_eq!(queue.last_error().await, None);
        assert_eq!(stored_assignment(&store, "s-1"), Some(7.0));
    }

    /// Delays every write so a debounced flush can be caught mid-write.
    struct SlowStore {
        inner: MemoryStore,
        delay: Duration,
    }

    #[async_trait]
    impl ScoreStore for SlowStore {
        fn name(&self) -> &str {
            "slow"
        }

        async fn apply(&self, snapshot: &ComponentSnapshot) -> Result<ApplyOutcome, StoreError> {
            tokio::time::sleep(self.delay).await;
            self.inner.apply(snapshot).await
        }
    }

    fn slow_queue(store: &Arc<SlowStore>) -> FlushQueue {
        FlushQueue::new(store.clone(), Duration::from_millis(10))
    }

    fn slow_store() -> Arc<SlowStore> {
        Arc::new(SlowStore {
            inner: MemoryStore::new(),
            delay: Duration::from_millis(500),
        })
    }

    #[tokio::test(start_paused = true)]
    async fn flush_now_waits_for_write_in_progress() {
        let store = slow_store();
        let queue = slow_queue(&store);
        let mut session = assignment_session();
        session.set_assignment("s-1", 14.0).unwrap();
        queue.enqueue(session.snapshot()).await;

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(queue.pending_revision().await, None);
        assert_eq!(store.inner.write_count(), 0);

        let written = queue.flush_now().await.unwrap();
        assert_eq!(written, Some(session.revision()));
        assert_eq!(store.inner.write_count(), 1);
        assert_eq!(stored_assignment(&store.inner, "s-1"), Some(14.0));
    }

    #[tokio::test(start_paused = true)]
    async fn flush_now_retries_a_failed_write_in_progress() {
        let store = slow_store();
        store.inner.fail_next_writes(1);
        let queue = slow_queue(&store);
        let mut session = assignment_session();
        session.set_assignment("s-1", 6.0).unwrap();
        queue.enqueue(session.snapshot()).await;

        tokio::time::sleep(Duration::from_millis(20)).await;
        let written = queue.flush_now().await.unwrap();
        assert_eq!(written, Some(session.revision()));
        assert_eq!(queue.last_error().await, None);
        assert_eq!(stored_assignment(&store.inner, "s-1"), Some(6.0));
    }

    #[tokio::test]
    async fn disabled_entry_is_surfaced() {
        let store = Arc::new(MemoryStore::new());
        store.set_entry_enabled(false);
        let queue = queue(&store);
        let mut session = assignment_session();
        session.set_assignment("s-1", 3.0).unwrap();
        queue.enqueue(session.snapshot()).await;

        let err = queue.flush_now().await.unwrap_err();
        assert!(err.is_entry_disabled());
        assert!(queue.pending_revision().await.is_some());
    }

    #[tokio::test]
    async fn replaying_a_snapshot_is_idempotent() {
        let store = MemoryStore::new();
        let mut session = assignment_session();
        session.set_assignment("s-1", 11.0).unwrap();
        session.set_assignment("s-2", 4.0).unwrap();
        let snapshot = session.snapshot();

        store.apply(&snapshot).await.unwrap();
        let once = store.records("CS101");
        store.apply(&snapshot).await.unwrap();
        assert_eq!(store.records("CS101"), once);
        assert_eq!(once.len(), 2);
    }

    #[tokio::test]
    async fn stale_revision_is_ignored() {
        let store = MemoryStore::new();
        let mut session = assignment_session();
        session.set_assignment("s-1", 9.0).unwrap();
        let older = session.snapshot();
        session.set_assignment("s-1", 15.0).unwrap();
        let newer = session.snapshot();

        assert_eq!(store.apply(&newer).await.unwrap(), ApplyOutcome::Applied);
        assert_eq!(store.apply(&older).await.unwrap(), ApplyOutcome::Stale);
        assert_eq!(stored_assignment(&store, "s-1"), Some(15.0));
        assert_eq!(store.stored_revision("CS101", Component::Assignment), Some(newer.revision));
    }

    #[tokio::test]
    async fn apply_keeps_other_components() {
        let config = CourseConfig::new("CS101", CourseType::Ug)
            .with_academic_year("2024-25")
            .with_weights(
                Component::Ca1,
                crate::weights::WeightConfig::configured(crate::weights::PartWeights::uniform()),
            );
        let store = MemoryStore::new();

        let mut ca1 = EntrySession::open(&config, Component::Ca1).unwrap();
        ca1.set_part("s-1", "Ia".parse().unwrap(), 2.5).unwrap();
        store.apply(&ca1.snapshot()).await.unwrap();

        let mut assignment = EntrySession::open(&config, Component::Assignment).unwrap();
        assignment.set_assignment("s-1", 10.0).unwrap();
        store.apply(&assignment.snapshot()).await.unwrap();

        let record = &store.records("CS101")[0];
        assert_eq!(record.scores.len(), 2);
        assert_eq!(record.questions.len(), 5);
    }
}
