//! Note search: local substring matching merged with remote full-text
//! results when signed in.

use std::collections::HashSet;
use std::sync::Arc;

use crate::error::Result;
use crate::identity::IdentityProvider;
use crate::models::{Note, NoteId};
use crate::remote::RemoteStore;
use crate::storage::LocalStore;

pub struct SearchService<I, R> {
    store: Arc<LocalStore>,
    identity: I,
    remote: R,
}

impl<I: IdentityProvider, R: RemoteStore> SearchService<I, R> {
    pub const fn new(store: Arc<LocalStore>, identity: I, remote: R) -> Self {
        Self {
            store,
            identity,
            remote,
        }
    }

    /// Search the collection.
    ///
    /// An empty query returns the full local collection in stored order.
    /// Otherwise local substring matches are computed, the remote full-text
    /// set is merged in when signed in (the remote version is authoritative
    /// for records it returns), and the result is ranked: title matches
    /// first, then content-only matches, newest first within each group.
    /// A remote search failure silently falls back to the local results.
    pub async fn search(&self, query: &str) -> Result<Vec<Note>> {
        let notes = self.store.load().await?;
        if query.trim().is_empty() {
            return Ok(notes);
        }

        let query_lower = query.to_lowercase();
        let mut results: Vec<Note> = notes
            .into_iter()
            .filter(|note| note.matches(&query_lower))
            .collect();

        if let Some(user) = self.identity.current_identity() {
            match self.remote.search_full_text(query, &user).await {
                Ok(remote_hits) => {
                    let remote_ids: HashSet<NoteId> =
                        remote_hits.iter().map(|note| note.id.clone()).collect();
                    let local_only: Vec<Note> = results
                        .into_iter()
                        .filter(|note| !remote_ids.contains(&note.id))
                        .collect();
                    results = remote_hits;
                    results.extend(local_only);
                }
                Err(error) => {
                    tracing::warn!("remote search failed, using local results: {error}");
                }
            }
        }

        results.sort_by(|a, b| {
            let a_title = a.title.to_lowercase().contains(&query_lower);
            let b_title = b.title.to_lowercase().contains(&query_lower);
            b_title
                .cmp(&a_title)
                .then_with(|| b.updated_at.cmp(&a.updated_at))
        });

        Ok(results)
    }
}
