//! Note mutations: optimistic local writes with best-effort remote pushes.
//!
//! Every operation commits locally first. When an identity is present the
//! change is pushed immediately; a push failure never fails the mutation —
//! the note is marked dirty and queued so the next reconciliation retries.

// Collection indices fit i64.
#![allow(clippy::cast_possible_wrap)]

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;

use crate::error::{Error, Result};
use crate::identity::{Identity, IdentityProvider};
use crate::models::{Note, NoteId, NoteOwner};
use crate::remote::RemoteStore;
use crate::storage::LocalStore;

const UNTITLED_PLACEHOLDER: &str = "Untitled Note";

/// Fields to replace on an existing note. `None` keeps the current value;
/// for `color`, `Some(None)` clears it.
#[derive(Debug, Clone, Default)]
pub struct NotePatch {
    pub title: Option<String>,
    pub content: Option<String>,
    pub color: Option<Option<String>>,
}

impl NotePatch {
    #[must_use]
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    #[must_use]
    pub fn content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    #[must_use]
    pub fn color(mut self, color: Option<String>) -> Self {
        self.color = Some(color);
        self
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.title.is_none() && self.content.is_none() && self.color.is_none()
    }
}

/// What happened to the remote copy during a delete. The local deletion
/// stands in every case.
#[derive(Debug)]
pub enum DeleteOutcome {
    /// No identity; nothing was attempted remotely
    LocalOnly,
    /// The ownership-scoped remote delete succeeded
    RemoteDeleted,
    /// The remote delete failed; the note may resurface on a later pull
    RemoteFailed(Error),
}

/// Create/update/delete/reorder over the local collection.
pub struct NoteService<I, R> {
    store: Arc<LocalStore>,
    identity: I,
    remote: R,
}

impl<I: IdentityProvider, R: RemoteStore> NoteService<I, R> {
    pub const fn new(store: Arc<LocalStore>, identity: I, remote: R) -> Self {
        Self {
            store,
            identity,
            remote,
        }
    }

    /// Create a note at the end of the manual order.
    ///
    /// Signed in: the note starts clean and is pushed immediately.
    /// Signed out: the note is guest-owned and dirty until migration.
    pub async fn create(
        &self,
        title: &str,
        content: &str,
        color: Option<String>,
    ) -> Result<Note> {
        let identity = self.identity.current_identity();
        let owner = match &identity {
            Some(user) => NoteOwner::User(user.id.clone()),
            None => NoteOwner::Guest(self.store.get_or_create_guest_id().await?),
        };

        let title = if title.trim().is_empty() && content.trim().is_empty() {
            UNTITLED_PLACEHOLDER
        } else {
            title
        };

        let mut note = Note::new(owner, title, content, color);
        note.is_dirty = identity.is_none();

        let created = self
            .store
            .mutate(|notes| {
                let max_order = notes.iter().filter_map(|n| n.sort_order).max().unwrap_or(0);
                note.sort_order = Some(max_order + 1);
                notes.push(note.clone());
                Ok(note.clone())
            })
            .await?;

        if let Some(user) = identity {
            if let Err(error) = self.remote.upsert(&created, &user).await {
                tracing::warn!("push after create failed for {}: {error}", created.id);
                return self.mark_dirty_for_retry(created).await;
            }
        }

        Ok(created)
    }

    /// Replace the provided fields on an existing note. Unknown id is a
    /// hard error.
    pub async fn update(&self, id: &NoteId, patch: NotePatch) -> Result<Note> {
        let identity = self.identity.current_identity();
        let authenticated = identity.is_some();

        let updated = self
            .store
            .mutate(|notes| {
                let note = notes
                    .iter_mut()
                    .find(|note| &note.id == id)
                    .ok_or_else(|| Error::NotFound(id.to_string()))?;

                if let Some(title) = patch.title {
                    note.title = title;
                }
                if let Some(content) = patch.content {
                    note.content = content;
                }
                if let Some(color) = patch.color {
                    note.color = color;
                }
                note.updated_at = Utc::now();
                note.is_dirty = note.is_dirty || !authenticated;
                Ok(note.clone())
            })
            .await?;

        match identity {
            Some(user) => {
                if let Err(error) = self.remote.upsert(&updated, &user).await {
                    tracing::warn!("push after update failed for {}: {error}", updated.id);
                    return self.mark_dirty_for_retry(updated).await;
                }
            }
            None => self.store.enqueue_pending(id).await?,
        }

        Ok(updated)
    }

    /// Remove a note locally, then best-effort delete the remote copy.
    pub async fn delete(&self, id: &NoteId) -> Result<DeleteOutcome> {
        self.store
            .mutate(|notes| {
                notes.retain(|note| &note.id != id);
                Ok(())
            })
            .await?;

        let Some(user) = self.identity.current_identity() else {
            return Ok(DeleteOutcome::LocalOnly);
        };

        match self.remote.delete(id, &user).await {
            Ok(()) => Ok(DeleteOutcome::RemoteDeleted),
            Err(error) => {
                tracing::warn!("remote delete failed for {id}: {error}");
                Ok(DeleteOutcome::RemoteFailed(error))
            }
        }
    }

    /// Apply a manual order: the sequence must be a permutation of the
    /// stored collection; every note gets `sort_order = index` and a fresh
    /// `updated_at`. Pushes are per-note with no batch atomicity.
    pub async fn reorder(&self, ordered_ids: &[NoteId]) -> Result<Vec<Note>> {
        let reordered = self
            .store
            .mutate(|notes| {
                if ordered_ids.len() != notes.len() {
                    return Err(Error::InvalidInput(format!(
                        "reorder expects all {} notes, got {}",
                        notes.len(),
                        ordered_ids.len()
                    )));
                }

                let mut by_id: HashMap<NoteId, Note> = notes
                    .drain(..)
                    .map(|note| (note.id.clone(), note))
                    .collect();

                let now = Utc::now();
                let mut next = Vec::with_capacity(ordered_ids.len());
                for (index, id) in ordered_ids.iter().enumerate() {
                    let mut note = by_id
                        .remove(id)
                        .ok_or_else(|| Error::NotFound(id.to_string()))?;
                    note.sort_order = Some(index as i64);
                    note.updated_at = now;
                    next.push(note);
                }

                *notes = next.clone();
                Ok(next)
            })
            .await?;

        let Some(user) = self.identity.current_identity() else {
            return Ok(reordered);
        };

        let mut failed = Vec::new();
        for note in &reordered {
            if let Err(error) = self.remote.upsert(note, &user).await {
                tracing::warn!("push after reorder failed for {}: {error}", note.id);
                failed.push(note.id.clone());
            }
        }

        if failed.is_empty() {
            return Ok(reordered);
        }

        let final_state = self
            .store
            .mutate(|notes| {
                for note in notes.iter_mut() {
                    if failed.contains(&note.id) {
                        note.is_dirty = true;
                    }
                }
                Ok(notes.clone())
            })
            .await?;
        for id in &failed {
            self.store.enqueue_pending(id).await?;
        }
        Ok(final_state)
    }

    /// Absorb a push failure: keep the local write, flag the note for the
    /// next reconciliation pass.
    async fn mark_dirty_for_retry(&self, mut note: Note) -> Result<Note> {
        let id = note.id.clone();
        self.store
            .mutate(|notes| {
                if let Some(stored) = notes.iter_mut().find(|n| n.id == id) {
                    stored.is_dirty = true;
                }
                Ok(())
            })
            .await?;
        self.store.enqueue_pending(&id).await?;
        note.is_dirty = true;
        Ok(note)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::identity::StaticIdentityProvider;
    use crate::remote::MemoryRemoteStore;
    use crate::storage::MemoryKeyValueStore;

    type TestService = NoteService<StaticIdentityProvider, Arc<MemoryRemoteStore>>;

    fn signed_out() -> (Arc<LocalStore>, Arc<MemoryRemoteStore>, TestService) {
        build(None)
    }

    fn signed_in() -> (Arc<LocalStore>, Arc<MemoryRemoteStore>, TestService) {
        build(Some(Identity::new("u-1")))
    }

    fn build(
        identity: Option<Identity>,
    ) -> (Arc<LocalStore>, Arc<MemoryRemoteStore>, TestService) {
        let store = Arc::new(LocalStore::new(MemoryKeyValueStore::new()));
        let remote = Arc::new(MemoryRemoteStore::new());
        let service = NoteService::new(
            Arc::clone(&store),
            StaticIdentityProvider::new(identity),
            Arc::clone(&remote),
        );
        (store, remote, service)
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn guest_create_is_dirty_and_appends_to_the_order() {
        let (store, _remote, service) = signed_out();

        let first = service.create("Groceries", "milk", None).await.unwrap();
        let second = service.create("Ideas", "rust", None).await.unwrap();

        assert!(first.owner.is_guest());
        assert!(first.is_dirty);
        assert!(first.id.is_local());
        assert_eq!(first.sort_order, Some(1));
        assert_eq!(second.sort_order, Some(2));
        assert_eq!(store.load().await.unwrap().len(), 2);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn authenticated_create_pushes_and_stays_clean() {
        let (_store, remote, service) = signed_in();

        let note = service.create("Groceries", "milk", None).await.unwrap();

        assert!(!note.is_dirty);
        assert_eq!(note.owner, NoteOwner::User("u-1".to_string()));
        assert_eq!(remote.get(&note.id).unwrap().title, "Groceries");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn create_push_failure_marks_dirty_and_queues_but_succeeds() {
        let (store, remote, service) = signed_in();
        remote.fail_upserts(true);

        let note = service.create("Groceries", "milk", None).await.unwrap();

        assert!(note.is_dirty);
        assert!(store.load().await.unwrap()[0].is_dirty);
        assert_eq!(store.pending_sync_ids().await.unwrap(), vec![note.id]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn create_defaults_title_when_both_fields_empty() {
        let (_store, _remote, service) = signed_out();

        let placeholder = service.create("", "", None).await.unwrap();
        let titled_by_content = service.create("", "body", None).await.unwrap();

        assert_eq!(placeholder.title, "Untitled Note");
        assert_eq!(titled_by_content.title, "");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn update_replaces_only_provided_fields() {
        let (_store, _remote, service) = signed_out();
        let note = service
            .create("Groceries", "milk", Some("teal".into()))
            .await
            .unwrap();

        let updated = service
            .update(&note.id, NotePatch::default().content("milk, eggs"))
            .await
            .unwrap();

        assert_eq!(updated.title, "Groceries");
        assert_eq!(updated.content, "milk, eggs");
        assert_eq!(updated.color.as_deref(), Some("teal"));
        assert!(updated.updated_at > note.updated_at);

        let cleared = service
            .update(&note.id, NotePatch::default().color(None))
            .await
            .unwrap();
        assert_eq!(cleared.color, None);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn update_unknown_id_is_not_found() {
        let (_store, _remote, service) = signed_out();

        let error = service
            .update(&NoteId::from("missing"), NotePatch::default().title("x"))
            .await
            .unwrap_err();
        assert!(matches!(error, Error::NotFound(_)));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn unauthenticated_update_enqueues_for_later() {
        let (store, _remote, service) = signed_out();
        let note = service.create("Groceries", "milk", None).await.unwrap();

        service
            .update(&note.id, NotePatch::default().title("Groceries!"))
            .await
            .unwrap();

        assert_eq!(store.pending_sync_ids().await.unwrap(), vec![note.id]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn authenticated_clean_update_stays_clean() {
        let (_store, remote, service) = signed_in();
        let note = service.create("Groceries", "milk", None).await.unwrap();

        let updated = service
            .update(&note.id, NotePatch::default().content("milk, eggs"))
            .await
            .unwrap();

        assert!(!updated.is_dirty);
        assert_eq!(remote.get(&note.id).unwrap().content, "milk, eggs");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn delete_removes_locally_even_when_remote_fails() {
        let (store, remote, service) = signed_in();
        let note = service.create("Groceries", "milk", None).await.unwrap();
        remote.fail_deletes(true);

        let outcome = service.delete(&note.id).await.unwrap();

        assert!(matches!(outcome, DeleteOutcome::RemoteFailed(_)));
        assert!(store.load().await.unwrap().is_empty());
        assert!(remote.get(&note.id).is_some());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn delete_signed_out_is_local_only() {
        let (store, _remote, service) = signed_out();
        let note = service.create("Groceries", "milk", None).await.unwrap();

        let outcome = service.delete(&note.id).await.unwrap();

        assert!(matches!(outcome, DeleteOutcome::LocalOnly));
        assert!(store.load().await.unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn reorder_assigns_index_order_and_keeps_count() {
        let (_store, _remote, service) = signed_out();
        let a = service.create("a", "", None).await.unwrap();
        let b = service.create("b", "", None).await.unwrap();
        let c = service.create("c", "", None).await.unwrap();

        let reordered = service
            .reorder(&[c.id.clone(), a.id.clone(), b.id.clone()])
            .await
            .unwrap();

        assert_eq!(reordered.len(), 3);
        for (index, note) in reordered.iter().enumerate() {
            assert_eq!(note.sort_order, Some(index as i64));
        }
        assert_eq!(reordered[0].id, c.id);
        assert_eq!(reordered[1].id, a.id);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn reorder_rejects_a_non_permutation() {
        let (_store, _remote, service) = signed_out();
        let a = service.create("a", "", None).await.unwrap();
        service.create("b", "", None).await.unwrap();

        let error = service.reorder(&[a.id.clone()]).await.unwrap_err();
        assert!(matches!(error, Error::InvalidInput(_)));

        let error = service
            .reorder(&[a.id, NoteId::from("missing")])
            .await
            .unwrap_err();
        assert!(matches!(error, Error::NotFound(_)));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn reorder_push_failure_marks_that_note_dirty() {
        let (store, remote, service) = signed_in();
        let a = service.create("a", "", None).await.unwrap();
        let b = service.create("b", "", None).await.unwrap();
        remote.fail_upserts(true);

        let reordered = service.reorder(&[b.id.clone(), a.id]).await.unwrap();

        assert!(reordered.iter().all(|note| note.is_dirty));
        assert_eq!(store.pending_sync_ids().await.unwrap().len(), 2);
    }
}
