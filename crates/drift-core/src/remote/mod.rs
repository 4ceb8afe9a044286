//! Remote authoritative note store.
//!
//! The engine only needs four operations of whatever backend holds the
//! signed-in user's notes; the wire protocol behind them is an
//! implementation detail.

mod memory;
mod postgrest;

pub use memory::MemoryRemoteStore;
pub use postgrest::PostgrestRemoteStore;

use crate::error::{Error, Result};
use crate::identity::Identity;
use crate::models::{Note, NoteId};

/// Operations the engine requires of the remote store.
#[allow(async_fn_in_trait)]
pub trait RemoteStore: Send + Sync {
    /// Insert-or-update by id, preferring a server-side conflict-aware
    /// upsert that performs its own last-write-wins check.
    async fn upsert(&self, note: &Note, owner: &Identity) -> Result<()>;

    /// Delete only when both id and owner match.
    async fn delete(&self, id: &NoteId, owner: &Identity) -> Result<()>;

    /// All notes owned by `owner`, ordered by `updated_at` descending.
    async fn fetch_by_owner(&self, owner: &Identity) -> Result<Vec<Note>>;

    /// Ranked full-text search over the owner's notes.
    async fn search_full_text(&self, query: &str, owner: &Identity) -> Result<Vec<Note>>;
}

/// Shared handles delegate, so services and the sync engine can hold the
/// same backend.
impl<R: RemoteStore + ?Sized> RemoteStore for std::sync::Arc<R> {
    async fn upsert(&self, note: &Note, owner: &Identity) -> Result<()> {
        (**self).upsert(note, owner).await
    }

    async fn delete(&self, id: &NoteId, owner: &Identity) -> Result<()> {
        (**self).delete(id, owner).await
    }

    async fn fetch_by_owner(&self, owner: &Identity) -> Result<Vec<Note>> {
        (**self).fetch_by_owner(owner).await
    }

    async fn search_full_text(&self, query: &str, owner: &Identity) -> Result<Vec<Note>> {
        (**self).search_full_text(query, owner).await
    }
}

/// `None` reports every call as a remote failure, which the callers absorb
/// or surface per their usual policy. Lets a deployment without remote
/// configuration satisfy the type while the identity gate keeps these
/// paths unreached.
impl<R: RemoteStore> RemoteStore for Option<R> {
    async fn upsert(&self, note: &Note, owner: &Identity) -> Result<()> {
        match self {
            Some(remote) => remote.upsert(note, owner).await,
            None => Err(Error::RemoteSync("remote store not configured".into())),
        }
    }

    async fn delete(&self, id: &NoteId, owner: &Identity) -> Result<()> {
        match self {
            Some(remote) => remote.delete(id, owner).await,
            None => Err(Error::RemoteDelete("remote store not configured".into())),
        }
    }

    async fn fetch_by_owner(&self, owner: &Identity) -> Result<Vec<Note>> {
        match self {
            Some(remote) => remote.fetch_by_owner(owner).await,
            None => Err(Error::RemoteSync("remote store not configured".into())),
        }
    }

    async fn search_full_text(&self, query: &str, owner: &Identity) -> Result<Vec<Note>> {
        match self {
            Some(remote) => remote.search_full_text(query, owner).await,
            None => Err(Error::RemoteSync("remote store not configured".into())),
        }
    }
}
