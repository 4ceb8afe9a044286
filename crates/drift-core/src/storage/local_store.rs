//! Durable, single-blob persistence of the full note collection.

use std::future::Future;

use chrono::Utc;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{Note, NoteId};
use crate::mutation::OptimisticMutation;

use super::KeyValueStore;

const NOTES_KEY: &str = "notes";
const GUEST_ID_KEY: &str = "guest_id";
const PENDING_SYNC_KEY: &str = "pending_sync";

/// The device-resident note store.
///
/// The whole collection is one read-modify-write unit; every mutation is
/// serialized through a single mutex so two callers can never interleave
/// load and save over stale snapshots.
pub struct LocalStore {
    kv: Box<dyn KeyValueStore>,
    lock: Mutex<()>,
}

impl LocalStore {
    pub fn new(kv: impl KeyValueStore + 'static) -> Self {
        Self {
            kv: Box::new(kv),
            lock: Mutex::new(()),
        }
    }

    /// Load the full collection. Missing blob means an empty collection.
    pub async fn load(&self) -> Result<Vec<Note>> {
        let _guard = self.lock.lock().await;
        self.read_notes()
    }

    /// Persist the full collection as one unit.
    pub async fn save(&self, notes: &[Note]) -> Result<()> {
        let _guard = self.lock.lock().await;
        self.write_notes(notes)
    }

    /// Run one guarded load-modify-save cycle.
    ///
    /// The closure mutates a working copy; only a committed copy (closure
    /// succeeded and the write landed) becomes the authoritative collection.
    /// Any error leaves the persisted collection untouched and propagates.
    pub async fn mutate<T>(
        &self,
        f: impl FnOnce(&mut Vec<Note>) -> Result<T>,
    ) -> Result<T> {
        let _guard = self.lock.lock().await;
        let mut mutation = OptimisticMutation::begin(self.read_notes()?);

        let value = match f(mutation.working_mut()) {
            Ok(value) => value,
            Err(error) => {
                mutation.roll_back();
                return Err(error);
            }
        };

        match self.write_notes(mutation.working()) {
            Ok(()) => {
                mutation.commit();
                Ok(value)
            }
            Err(error) => {
                mutation.roll_back();
                Err(error)
            }
        }
    }

    /// Like [`Self::mutate`] but for multi-step callers that await between
    /// the load and the save (the sync engine pushes to the remote store
    /// mid-cycle). The mutex is held for the whole critical section.
    pub async fn with_collection<T, F, Fut>(&self, f: F) -> Result<T>
    where
        F: FnOnce(Vec<Note>) -> Fut,
        Fut: Future<Output = Result<(Vec<Note>, T)>>,
    {
        let _guard = self.lock.lock().await;
        let notes = self.read_notes()?;
        let (notes, value) = f(notes).await?;
        self.write_notes(&notes)?;
        Ok(value)
    }

    /// The per-device anonymous identifier, generated once and stable
    /// across restarts.
    pub async fn get_or_create_guest_id(&self) -> Result<String> {
        let _guard = self.lock.lock().await;
        if let Some(guest_id) = self.kv.get(GUEST_ID_KEY)? {
            return Ok(guest_id);
        }

        let guest_id = format!(
            "guest_{}_{}",
            Utc::now().timestamp_millis(),
            random_suffix()
        );
        self.kv.set(GUEST_ID_KEY, &guest_id)?;
        Ok(guest_id)
    }

    /// Record an id whose push was deferred or failed, for retry during the
    /// next reconciliation.
    pub async fn enqueue_pending(&self, id: &NoteId) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut queue = self.read_pending()?;
        if !queue.contains(id) {
            queue.push(id.clone());
            self.write_pending(&queue)?;
        }
        Ok(())
    }

    /// Drop an id from the pending-sync list.
    pub async fn dequeue_pending(&self, id: &NoteId) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut queue = self.read_pending()?;
        let before = queue.len();
        queue.retain(|queued| queued != id);
        if queue.len() != before {
            self.write_pending(&queue)?;
        }
        Ok(())
    }

    /// Ids queued for a retry push, in enqueue order.
    pub async fn pending_sync_ids(&self) -> Result<Vec<NoteId>> {
        let _guard = self.lock.lock().await;
        self.read_pending()
    }

    fn read_notes(&self) -> Result<Vec<Note>> {
        match self.kv.get(NOTES_KEY)? {
            Some(blob) => Ok(serde_json::from_str(&blob)?),
            None => Ok(Vec::new()),
        }
    }

    fn write_notes(&self, notes: &[Note]) -> Result<()> {
        let blob = serde_json::to_string(notes)?;
        self.kv.set(NOTES_KEY, &blob)
    }

    fn read_pending(&self) -> Result<Vec<NoteId>> {
        match self.kv.get(PENDING_SYNC_KEY)? {
            Some(blob) => Ok(serde_json::from_str(&blob)?),
            None => Ok(Vec::new()),
        }
    }

    fn write_pending(&self, queue: &[NoteId]) -> Result<()> {
        let blob = serde_json::to_string(queue)?;
        self.kv.set(PENDING_SYNC_KEY, &blob)
    }
}

fn random_suffix() -> String {
    Uuid::new_v4().simple().to_string().chars().take(9).collect()
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::super::{FileKeyValueStore, KeyValueStore, MemoryKeyValueStore};
    use super::*;
    use crate::error::Error;
    use crate::models::NoteOwner;

    fn note(title: &str) -> Note {
        Note::new(NoteOwner::Guest("guest_1_abc".into()), title, "body", None)
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn load_without_blob_is_empty() {
        let store = LocalStore::new(MemoryKeyValueStore::new());
        assert!(store.load().await.unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn save_then_load_roundtrips() {
        let store = LocalStore::new(MemoryKeyValueStore::new());
        let notes = vec![note("a"), note("b")];

        store.save(&notes).await.unwrap();
        assert_eq!(store.load().await.unwrap(), notes);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn save_of_loaded_collection_is_byte_identical() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::new(FileKeyValueStore::open(dir.path()).unwrap());

        store.save(&[note("a"), note("b")]).await.unwrap();
        let first = std::fs::read_to_string(dir.path().join("notes.json")).unwrap();

        let loaded = store.load().await.unwrap();
        store.save(&loaded).await.unwrap();
        let second = std::fs::read_to_string(dir.path().join("notes.json")).unwrap();

        assert_eq!(first, second);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn corrupt_blob_surfaces_a_typed_error() {
        let kv = MemoryKeyValueStore::new();
        kv.set("notes", "not json").unwrap();
        let store = LocalStore::new(kv);

        assert!(matches!(
            store.load().await.unwrap_err(),
            Error::Serialization(_)
        ));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn guest_id_is_generated_once_and_stable() {
        let store = LocalStore::new(MemoryKeyValueStore::new());

        let first = store.get_or_create_guest_id().await.unwrap();
        let second = store.get_or_create_guest_id().await.unwrap();

        assert!(first.starts_with("guest_"));
        assert_eq!(first, second);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn mutate_persists_the_committed_working_copy() {
        let store = LocalStore::new(MemoryKeyValueStore::new());

        let added = store
            .mutate(|notes| {
                notes.push(note("from mutate"));
                Ok(notes.len())
            })
            .await
            .unwrap();

        assert_eq!(added, 1);
        assert_eq!(store.load().await.unwrap()[0].title, "from mutate");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn failed_closure_leaves_the_collection_untouched() {
        let store = LocalStore::new(MemoryKeyValueStore::new());
        store.save(&[note("kept")]).await.unwrap();

        let result: Result<()> = store
            .mutate(|notes| {
                notes.clear();
                Err(Error::InvalidInput("abandon".into()))
            })
            .await;

        assert!(result.is_err());
        assert_eq!(store.load().await.unwrap().len(), 1);
    }

    /// Store whose writes fail after a toggle, for rollback tests.
    struct FailingWrites {
        inner: MemoryKeyValueStore,
        fail: std::sync::atomic::AtomicBool,
    }

    impl FailingWrites {
        fn new() -> Self {
            Self {
                inner: MemoryKeyValueStore::new(),
                fail: std::sync::atomic::AtomicBool::new(false),
            }
        }
    }

    impl KeyValueStore for FailingWrites {
        fn get(&self, key: &str) -> Result<Option<String>> {
            self.inner.get(key)
        }

        fn set(&self, key: &str, value: &str) -> Result<()> {
            if self.fail.load(std::sync::atomic::Ordering::SeqCst) {
                return Err(Error::StorageWrite("disk full".into()));
            }
            self.inner.set(key, value)
        }

        fn remove(&self, key: &str) -> Result<()> {
            self.inner.remove(key)
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn write_failure_propagates_as_storage_write() {
        let kv = FailingWrites::new();
        kv.inner
            .set("notes", &serde_json::to_string(&[note("kept")]).unwrap())
            .unwrap();
        kv.fail.store(true, std::sync::atomic::Ordering::SeqCst);
        let store = LocalStore::new(kv);

        let result = store
            .mutate(|notes| {
                notes.push(note("lost"));
                Ok(())
            })
            .await;

        assert!(matches!(result.unwrap_err(), Error::StorageWrite(_)));
        assert_eq!(store.load().await.unwrap().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn pending_queue_deduplicates_and_dequeues() {
        let store = LocalStore::new(MemoryKeyValueStore::new());
        let id_a = NoteId::from("local_1_a");
        let id_b = NoteId::from("local_2_b");

        store.enqueue_pending(&id_a).await.unwrap();
        store.enqueue_pending(&id_b).await.unwrap();
        store.enqueue_pending(&id_a).await.unwrap();
        assert_eq!(
            store.pending_sync_ids().await.unwrap(),
            vec![id_a.clone(), id_b.clone()]
        );

        store.dequeue_pending(&id_a).await.unwrap();
        assert_eq!(store.pending_sync_ids().await.unwrap(), vec![id_b]);
    }
}
