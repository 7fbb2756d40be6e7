//! Durable request collection.
//!
//! The engine needs two durable things: the record collection and a
//! monotonic id counter tracked separately from the records, so ids are
//! never reused even if the visible record list is cleared. Both go
//! through the [`DurableBackend`] trait; the state-machine logic never
//! sees how persistence is implemented.
//!
//! Two backends ship with the crate:
//! - [`MemoryBackend`] for tests and ephemeral use
//! - [`JsonBackend`] -- the record array as JSON in `requests.json` and
//!   the counter in `next_id.json` under a data directory
//!
//! Writes are write-through with rollback: [`RequestStore::commit`]
//! replaces the in-memory copy and persists, and reverts the in-memory
//! replacement if the backend write fails, so memory and disk never
//! diverge silently.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use steward_types::{ActorId, RequestId, RequestStatus, WorkflowRole};
use thiserror::Error;
use tracing::{debug, warn};

use crate::request::{RequestDraft, RequestRecord};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Request not found: {0}")]
    NotFound(RequestId),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;

// ============================================================================
// DurableBackend
// ============================================================================

/// Persistence seam for the record collection and the id counter.
///
/// The counter is stored and loaded independently of the records:
/// clearing the record collection must not reset it.
pub trait DurableBackend {
    fn load_records(&self) -> Result<Vec<RequestRecord>>;
    fn save_records(&self, records: &[RequestRecord]) -> Result<()>;
    fn load_next_id(&self) -> Result<u64>;
    fn save_next_id(&self, next_id: u64) -> Result<()>;
}

// ============================================================================
// MemoryBackend
// ============================================================================

/// In-memory backend for tests and ephemeral engines.
///
/// Cloning shares the underlying state, so a store reopened from a
/// clone sees everything the first store persisted.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    state: Arc<Mutex<MemoryState>>,
}

#[derive(Debug)]
struct MemoryState {
    records: Vec<RequestRecord>,
    next_id: u64,
}

impl Default for MemoryState {
    fn default() -> Self {
        Self {
            records: Vec::new(),
            next_id: 1,
        }
    }
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        // A poisoned lock means a panic mid-write; the state is plain
        // data, so continuing with it is sound.
        self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl DurableBackend for MemoryBackend {
    fn load_records(&self) -> Result<Vec<RequestRecord>> {
        Ok(self.lock().records.clone())
    }

    fn save_records(&self, records: &[RequestRecord]) -> Result<()> {
        self.lock().records = records.to_vec();
        Ok(())
    }

    fn load_next_id(&self) -> Result<u64> {
        Ok(self.lock().next_id)
    }

    fn save_next_id(&self, next_id: u64) -> Result<()> {
        self.lock().next_id = next_id;
        Ok(())
    }
}

// ============================================================================
// JsonBackend
// ============================================================================

const RECORDS_FILE: &str = "requests.json";
const NEXT_ID_FILE: &str = "next_id.json";

/// File-backed backend: the record collection as a JSON array, the
/// counter in its own file (the reference persistence shape).
///
/// Writes go to a sibling temp file first and are renamed into place,
/// so a crash mid-write leaves the previous contents intact.
#[derive(Debug, Clone)]
pub struct JsonBackend {
    data_dir: PathBuf,
}

impl JsonBackend {
    /// Open a backend rooted at `data_dir`, creating the directory if
    /// needed.
    pub fn open(data_dir: impl Into<PathBuf>) -> Result<Self> {
        let data_dir = data_dir.into();
        fs::create_dir_all(&data_dir)?;
        Ok(Self { data_dir })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    fn write_atomically(&self, file: &str, contents: &str) -> Result<()> {
        let path = self.data_dir.join(file);
        let tmp = self.data_dir.join(format!("{file}.tmp"));
        fs::write(&tmp, contents)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }
}

impl DurableBackend for JsonBackend {
    fn load_records(&self) -> Result<Vec<RequestRecord>> {
        let path = self.data_dir.join(RECORDS_FILE);
        match fs::read_to_string(&path) {
            Ok(contents) => Ok(serde_json::from_str(&contents)?),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(err) => Err(err.into()),
        }
    }

    fn save_records(&self, records: &[RequestRecord]) -> Result<()> {
        self.write_atomically(RECORDS_FILE, &serde_json::to_string_pretty(records)?)
    }

    fn load_next_id(&self) -> Result<u64> {
        let path = self.data_dir.join(NEXT_ID_FILE);
        match fs::read_to_string(&path) {
            Ok(contents) => Ok(serde_json::from_str(&contents)?),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(1),
            Err(err) => Err(err.into()),
        }
    }

    fn save_next_id(&self, next_id: u64) -> Result<()> {
        self.write_atomically(NEXT_ID_FILE, &next_id.to_string())
    }
}

// ============================================================================
// RequestStore
// ============================================================================

/// The request collection: creation, lookup, queries, and durable
/// commit of engine mutations.
///
/// All reads are point-in-time snapshots (cloned records).
#[derive(Debug)]
pub struct RequestStore<B: DurableBackend> {
    backend: B,
    records: Vec<RequestRecord>,
    next_id: u64,
}

impl<B: DurableBackend> RequestStore<B> {
    /// Open a store over `backend`, loading the persisted collection
    /// and counter.
    pub fn open(backend: B) -> Result<Self> {
        let records = backend.load_records()?;
        let next_id = backend.load_next_id()?;
        debug!(records = records.len(), next_id, "request store opened");
        Ok(Self {
            backend,
            records,
            next_id,
        })
    }

    /// Create a new request in `Draft`, assigning the next id from the
    /// durable counter.
    ///
    /// The counter is persisted before the record: a failed record
    /// write burns the id rather than ever reusing one.
    pub fn create(&mut self, draft: RequestDraft, applicant: ActorId) -> Result<RequestRecord> {
        let id = RequestId::new(self.next_id);
        self.next_id += 1;
        self.backend.save_next_id(self.next_id)?;

        let record = RequestRecord::new(id, draft, applicant);
        self.records.push(record.clone());

        if let Err(err) = self.backend.save_records(&self.records) {
            self.records.pop();
            warn!(%id, "record write failed during create, rolled back");
            return Err(err);
        }

        // Post-condition: ids stay strictly increasing
        assert!(
            self.next_id > record.id.as_u64(),
            "counter must stay ahead of every issued id"
        );

        Ok(record)
    }

    /// Snapshot of a single record.
    pub fn get(&self, id: RequestId) -> Result<RequestRecord> {
        self.records
            .iter()
            .find(|r| r.id == id)
            .cloned()
            .ok_or(StoreError::NotFound(id))
    }

    /// Replace the stored copy of `record` and persist the collection.
    ///
    /// On a backend write failure the in-memory replacement is rolled
    /// back, so the caller sees the store exactly as before the call.
    pub fn commit(&mut self, record: RequestRecord) -> Result<()> {
        let index = self
            .records
            .iter()
            .position(|r| r.id == record.id)
            .ok_or(StoreError::NotFound(record.id))?;

        let previous = std::mem::replace(&mut self.records[index], record);

        if let Err(err) = self.backend.save_records(&self.records) {
            warn!(id = %previous.id, "record write failed during commit, rolled back");
            self.records[index] = previous;
            return Err(err);
        }

        Ok(())
    }

    /// All requests currently in `status`.
    pub fn list_by_status(&self, status: RequestStatus) -> Vec<RequestRecord> {
        self.records
            .iter()
            .filter(|r| r.status == status)
            .cloned()
            .collect()
    }

    /// The review queue for a workflow role.
    ///
    /// Administrators also see requests sitting in automated review so
    /// manual override is discoverable from their queue.
    pub fn list_for_reviewer_role(&self, role: WorkflowRole) -> Vec<RequestRecord> {
        let wanted = |status: RequestStatus| match role {
            WorkflowRole::Pi => status == RequestStatus::PendingPi,
            WorkflowRole::Ethics => status == RequestStatus::PendingEthics,
            WorkflowRole::Administrator => {
                status == RequestStatus::PendingAdmin || status == RequestStatus::AiReview
            }
        };
        self.records
            .iter()
            .filter(|r| wanted(r.status))
            .cloned()
            .collect()
    }

    /// All requests created by `applicant`.
    pub fn list_by_applicant(&self, applicant: &ActorId) -> Vec<RequestRecord> {
        self.records
            .iter()
            .filter(|r| &r.applicant == applicant)
            .cloned()
            .collect()
    }

    /// Clear the visible record collection. The id counter is durable
    /// state of its own and keeps counting.
    pub fn clear_records(&mut self) -> Result<()> {
        let previous = std::mem::take(&mut self.records);
        if let Err(err) = self.backend.save_records(&self.records) {
            self.records = previous;
            return Err(err);
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use steward_types::Sensitivity;

    fn draft() -> RequestDraft {
        RequestDraft::new("Sleep study", Sensitivity::Normal, "sleep-2024")
    }

    fn alice() -> ActorId {
        ActorId::new("alice")
    }

    #[test]
    fn test_create_assigns_increasing_ids() {
        let mut store = RequestStore::open(MemoryBackend::new()).unwrap();
        let a = store.create(draft(), alice()).unwrap();
        let b = store.create(draft(), alice()).unwrap();
        let c = store.create(draft(), ActorId::new("bob")).unwrap();

        assert_eq!(a.id, RequestId::new(1));
        assert_eq!(b.id, RequestId::new(2));
        assert_eq!(c.id, RequestId::new(3));
    }

    #[test]
    fn test_get_unknown_id_is_not_found() {
        let store = RequestStore::open(MemoryBackend::new()).unwrap();
        assert!(matches!(
            store.get(RequestId::new(404)),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn test_counter_survives_record_clearing() {
        let backend = MemoryBackend::new();
        let mut store = RequestStore::open(backend.clone()).unwrap();
        store.create(draft(), alice()).unwrap();
        store.create(draft(), alice()).unwrap();

        store.clear_records().unwrap();
        assert!(store.is_empty());

        // Ids keep counting after the clear, and after a reopen.
        let c = store.create(draft(), alice()).unwrap();
        assert_eq!(c.id, RequestId::new(3));

        let mut reopened = RequestStore::open(backend).unwrap();
        let d = reopened.create(draft(), alice()).unwrap();
        assert_eq!(d.id, RequestId::new(4));
    }

    #[test]
    fn test_commit_replaces_stored_copy() {
        let mut store = RequestStore::open(MemoryBackend::new()).unwrap();
        let mut record = store.create(draft(), alice()).unwrap();

        record.set_status(RequestStatus::PendingPi);
        store.commit(record.clone()).unwrap();

        let loaded = store.get(record.id).unwrap();
        assert_eq!(loaded.status, RequestStatus::PendingPi);
        assert_eq!(loaded.current_step, 2);
    }

    #[test]
    fn test_commit_unknown_record_is_not_found() {
        let mut store = RequestStore::open(MemoryBackend::new()).unwrap();
        let record = store.create(draft(), alice()).unwrap();
        store.clear_records().unwrap();
        assert!(matches!(
            store.commit(record),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn test_queries() {
        let mut store = RequestStore::open(MemoryBackend::new()).unwrap();
        let a = store.create(draft(), alice()).unwrap();
        let _b = store.create(draft(), alice()).unwrap();
        let c = store.create(draft(), ActorId::new("bob")).unwrap();

        let mut moved = store.get(a.id).unwrap();
        moved.set_status(RequestStatus::PendingPi);
        store.commit(moved).unwrap();

        let mut ai = store.get(c.id).unwrap();
        ai.set_status(RequestStatus::AiReview);
        store.commit(ai).unwrap();

        assert_eq!(store.list_by_status(RequestStatus::Draft).len(), 1);
        assert_eq!(store.list_by_status(RequestStatus::PendingPi).len(), 1);

        assert_eq!(store.list_for_reviewer_role(WorkflowRole::Pi).len(), 1);
        assert_eq!(store.list_for_reviewer_role(WorkflowRole::Ethics).len(), 0);
        // Administrator queue includes AI_REVIEW records.
        assert_eq!(
            store.list_for_reviewer_role(WorkflowRole::Administrator).len(),
            1
        );

        assert_eq!(store.list_by_applicant(&alice()).len(), 2);
        assert_eq!(store.list_by_applicant(&ActorId::new("bob")).len(), 1);
        assert_eq!(store.list_by_applicant(&ActorId::new("eve")).len(), 0);
    }

    #[test]
    fn test_reads_are_snapshots() {
        let mut store = RequestStore::open(MemoryBackend::new()).unwrap();
        let created = store.create(draft(), alice()).unwrap();

        let snapshot = store.get(created.id).unwrap();

        let mut moved = store.get(created.id).unwrap();
        moved.set_status(RequestStatus::PendingPi);
        store.commit(moved).unwrap();

        // The earlier snapshot is unaffected by the later commit.
        assert_eq!(snapshot.status, RequestStatus::Draft);
    }

    #[test]
    fn test_json_backend_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let backend = JsonBackend::open(dir.path()).unwrap();

        let mut store = RequestStore::open(backend.clone()).unwrap();
        let record = store.create(draft(), alice()).unwrap();
        let mut moved = store.get(record.id).unwrap();
        moved.set_status(RequestStatus::PendingPi);
        store.commit(moved).unwrap();
        drop(store);

        let reopened = RequestStore::open(backend).unwrap();
        assert_eq!(reopened.len(), 1);
        let loaded = reopened.get(record.id).unwrap();
        assert_eq!(loaded.status, RequestStatus::PendingPi);
        assert_eq!(loaded.audit_trail.len(), 1);
        assert_eq!(loaded.applicant, alice());
    }

    #[test]
    fn test_json_backend_missing_files_mean_empty_store() {
        let dir = tempfile::tempdir().unwrap();
        let backend = JsonBackend::open(dir.path().join("fresh")).unwrap();
        assert!(backend.load_records().unwrap().is_empty());
        assert_eq!(backend.load_next_id().unwrap(), 1);
    }

    #[test]
    fn test_json_backend_counter_file_is_separate() {
        let dir = tempfile::tempdir().unwrap();
        let backend = JsonBackend::open(dir.path()).unwrap();

        let mut store = RequestStore::open(backend.clone()).unwrap();
        store.create(draft(), alice()).unwrap();
        store.create(draft(), alice()).unwrap();
        drop(store);

        // Deleting the record file must not reset the counter.
        std::fs::remove_file(dir.path().join(RECORDS_FILE)).unwrap();

        let mut reopened = RequestStore::open(backend).unwrap();
        assert!(reopened.is_empty());
        let next = reopened.create(draft(), alice()).unwrap();
        assert_eq!(next.id, RequestId::new(3));
    }

    /// Backend whose record writes fail on demand.
    #[derive(Clone, Default)]
    struct FlakyBackend {
        inner: MemoryBackend,
        fail_record_writes: Arc<Mutex<bool>>,
    }

    impl FlakyBackend {
        fn fail_next_writes(&self, fail: bool) {
            *self.fail_record_writes.lock().unwrap() = fail;
        }
    }

    impl DurableBackend for FlakyBackend {
        fn load_records(&self) -> Result<Vec<RequestRecord>> {
            self.inner.load_records()
        }

        fn save_records(&self, records: &[RequestRecord]) -> Result<()> {
            if *self.fail_record_writes.lock().unwrap() {
                return Err(StoreError::Io(io::Error::other("disk full")));
            }
            self.inner.save_records(records)
        }

        fn load_next_id(&self) -> Result<u64> {
            self.inner.load_next_id()
        }

        fn save_next_id(&self, next_id: u64) -> Result<()> {
            self.inner.save_next_id(next_id)
        }
    }

    #[test]
    fn test_commit_rolls_back_on_write_failure() {
        let backend = FlakyBackend::default();
        let mut store = RequestStore::open(backend.clone()).unwrap();
        let record = store.create(draft(), alice()).unwrap();

        backend.fail_next_writes(true);
        let mut moved = store.get(record.id).unwrap();
        moved.set_status(RequestStatus::PendingPi);
        assert!(store.commit(moved).is_err());

        // The in-memory copy was rolled back along with the failed write.
        assert_eq!(store.get(record.id).unwrap().status, RequestStatus::Draft);

        backend.fail_next_writes(false);
        let mut moved = store.get(record.id).unwrap();
        moved.set_status(RequestStatus::PendingPi);
        store.commit(moved).unwrap();
        assert_eq!(
            store.get(record.id).unwrap().status,
            RequestStatus::PendingPi
        );
    }

    #[test]
    fn test_create_rolls_back_record_but_burns_the_id() {
        let backend = FlakyBackend::default();
        let mut store = RequestStore::open(backend.clone()).unwrap();
        store.create(draft(), alice()).unwrap();

        backend.fail_next_writes(true);
        assert!(store.create(draft(), alice()).is_err());
        assert_eq!(store.len(), 1);

        backend.fail_next_writes(false);
        // Id 2 was burned by the failed create; the next record gets 3.
        let next = store.create(draft(), alice()).unwrap();
        assert_eq!(next.id, RequestId::new(3));
    }
}
