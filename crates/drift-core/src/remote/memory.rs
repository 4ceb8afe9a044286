//! In-memory remote store with the backend's conflict semantics.
//!
//! Mirrors the server-side `sync_note` procedure: an upsert only lands when
//! the incoming record is not older than the stored one. Failure injection
//! switches let tests exercise the absorbed-error paths.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use chrono::Utc;

use crate::error::{Error, Result};
use crate::identity::Identity;
use crate::models::{Note, NoteId, NoteOwner};

use super::RemoteStore;

#[derive(Default)]
pub struct MemoryRemoteStore {
    table: Mutex<HashMap<NoteId, Note>>,
    fail_upserts: AtomicBool,
    fail_deletes: AtomicBool,
    fail_queries: AtomicBool,
}

impl MemoryRemoteStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a note exactly as given (test setup).
    pub fn insert_note(&self, note: Note) {
        self.table
            .lock()
            .expect("remote table poisoned")
            .insert(note.id.clone(), note);
    }

    /// Snapshot of the stored table, unordered.
    #[must_use]
    pub fn notes(&self) -> Vec<Note> {
        self.table
            .lock()
            .expect("remote table poisoned")
            .values()
            .cloned()
            .collect()
    }

    #[must_use]
    pub fn get(&self, id: &NoteId) -> Option<Note> {
        self.table
            .lock()
            .expect("remote table poisoned")
            .get(id)
            .cloned()
    }

    pub fn fail_upserts(&self, fail: bool) {
        self.fail_upserts.store(fail, Ordering::SeqCst);
    }

    pub fn fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    pub fn fail_queries(&self, fail: bool) {
        self.fail_queries.store(fail, Ordering::SeqCst);
    }

    fn owned_by<'a>(note: &'a Note, owner: &Identity) -> Option<&'a Note> {
        (note.owner.user_id() == Some(owner.id.as_str())).then_some(note)
    }
}

impl RemoteStore for MemoryRemoteStore {
    async fn upsert(&self, note: &Note, owner: &Identity) -> Result<()> {
        if self.fail_upserts.load(Ordering::SeqCst) {
            return Err(Error::RemoteSync("injected upsert failure".into()));
        }

        let mut table = self.table.lock().expect("remote table poisoned");
        if let Some(existing) = table.get(&note.id) {
            // Server-side last-write-wins: an older push never clobbers.
            if existing.updated_at > note.updated_at {
                return Ok(());
            }
        }

        let mut stored = note.clone();
        stored.owner = NoteOwner::User(owner.id.clone());
        stored.synced_at = Some(Utc::now());
        stored.is_dirty = false;
        table.insert(stored.id.clone(), stored);
        Ok(())
    }

    async fn delete(&self, id: &NoteId, owner: &Identity) -> Result<()> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(Error::RemoteDelete("injected delete failure".into()));
        }

        let mut table = self.table.lock().expect("remote table poisoned");
        let owned = table
            .get(id)
            .is_some_and(|note| note.owner.user_id() == Some(owner.id.as_str()));
        if owned {
            table.remove(id);
        }
        Ok(())
    }

    async fn fetch_by_owner(&self, owner: &Identity) -> Result<Vec<Note>> {
        if self.fail_queries.load(Ordering::SeqCst) {
            return Err(Error::RemoteSync("injected query failure".into()));
        }

        let table = self.table.lock().expect("remote table poisoned");
        let mut notes: Vec<Note> = table
            .values()
            .filter_map(|note| Self::owned_by(note, owner))
            .cloned()
            .map(as_clean_row)
            .collect();
        notes.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(notes)
    }

    async fn search_full_text(&self, query: &str, owner: &Identity) -> Result<Vec<Note>> {
        if self.fail_queries.load(Ordering::SeqCst) {
            return Err(Error::RemoteSync("injected search failure".into()));
        }

        let query_lower = query.to_lowercase();
        let table = self.table.lock().expect("remote table poisoned");
        let mut notes: Vec<Note> = table
            .values()
            .filter_map(|note| Self::owned_by(note, owner))
            .filter(|note| note.matches(&query_lower))
            .cloned()
            .map(as_clean_row)
            .collect();
        notes.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(notes)
    }
}

/// Rows coming off the wire never carry the local-only dirty flag.
fn as_clean_row(mut note: Note) -> Note {
    note.is_dirty = false;
    note
}
