//! Reconciliation between the local store and the remote store.
//!
//! One pass migrates guest-owned notes to the signed-in identity, pulls the
//! remote set, merges by `updated_at` (last write wins over whole records),
//! and drains the pending-sync retry list. Wall-clock timestamps are the
//! single ordering signal; clock skew across devices is an accepted
//! limitation of the policy.

// Collection indices fit i64.
#![allow(clippy::cast_possible_wrap)]

use std::sync::Arc;

use crate::error::Result;
use crate::identity::IdentityProvider;
use crate::models::{NoteId, NoteOwner};
use crate::remote::RemoteStore;
use crate::storage::LocalStore;

/// Counts of what one reconciliation pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Guest notes re-owned to the identity
    pub migrated: usize,
    /// Remote notes inserted locally
    pub pulled_new: usize,
    /// Local notes overwritten by a strictly newer remote copy
    pub overwritten: usize,
    /// Dirty local notes pushed because they were strictly newer
    pub pushed: usize,
    /// Local notes that only adopted remote `sort_order`/`synced_at`
    pub refreshed: usize,
    /// Pushes that failed and were left for the next pass
    pub push_failures: usize,
    /// Pending-sync entries resolved this pass
    pub drained_pending: usize,
}

/// Orchestrates full local/remote reconciliation.
pub struct SyncEngine<I, R> {
    store: Arc<LocalStore>,
    identity: I,
    remote: R,
}

impl<I: IdentityProvider, R: RemoteStore> SyncEngine<I, R> {
    pub const fn new(store: Arc<LocalStore>, identity: I, remote: R) -> Self {
        Self {
            store,
            identity,
            remote,
        }
    }

    /// Run one reconciliation pass. Without an identity this is an
    /// immediate no-op; a failed pull propagates as a remote-sync error.
    pub async fn reconcile(&self) -> Result<SyncReport> {
        let Some(user) = self.identity.current_identity() else {
            tracing::debug!("no identity present, skipping reconciliation");
            return Ok(SyncReport::default());
        };

        let mut report = SyncReport::default();
        let remote = &self.remote;
        let user_ref = &user;

        // Guest migration is persisted before the pull so a failed fetch
        // cannot lose the ownership transfer.
        let (migrated, migration_failed_ids) = self
            .store
            .with_collection(|mut notes| async move {
                let mut migrated = 0usize;
                let mut failed_ids: Vec<NoteId> = Vec::new();
                for note in notes.iter_mut() {
                    if !note.owner.is_guest() {
                        continue;
                    }
                    note.owner = NoteOwner::User(user_ref.id.clone());
                    note.is_dirty = true;
                    migrated += 1;
                    match remote.upsert(note, user_ref).await {
                        Ok(()) => note.is_dirty = false,
                        Err(error) => {
                            tracing::warn!("migration push failed for {}: {error}", note.id);
                            failed_ids.push(note.id.clone());
                        }
                    }
                }
                Ok((notes, (migrated, failed_ids)))
            })
            .await?;
        report.migrated = migrated;
        report.push_failures += migration_failed_ids.len();

        let remote_notes = self.remote.fetch_by_owner(&user).await?;
        let pending = self.store.pending_sync_ids().await?;

        let (merge_report, drained) = self
            .store
            .with_collection(|mut notes| async move {
                let mut report = SyncReport::default();

                for incoming in remote_notes {
                    let Some(index) = notes.iter().position(|note| note.id == incoming.id)
                    else {
                        let mut incoming = incoming;
                        if incoming.sort_order.is_none() {
                            incoming.sort_order = Some(notes.len() as i64);
                        }
                        incoming.is_dirty = false;
                        notes.push(incoming);
                        report.pulled_new += 1;
                        continue;
                    };

                    let local = &mut notes[index];
                    if incoming.updated_at > local.updated_at {
                        // Remote strictly newer: whole-record overwrite.
                        local.title = incoming.title;
                        local.content = incoming.content;
                        local.color = incoming.color;
                        local.sort_order = incoming.sort_order.or(local.sort_order);
                        local.updated_at = incoming.updated_at;
                        local.synced_at = incoming.synced_at;
                        local.is_dirty = false;
                        report.overwritten += 1;
                    } else if local.updated_at > incoming.updated_at && local.is_dirty {
                        // Local strictly newer and diverged: local wins.
                        match remote.upsert(local, user_ref).await {
                            Ok(()) => report.pushed += 1,
                            Err(error) => {
                                tracing::warn!(
                                    "conflict push failed for {}: {error}",
                                    local.id
                                );
                                report.push_failures += 1;
                            }
                        }
                    } else {
                        // Equal timestamps, or local newer but clean: keep
                        // local fields, adopt remote ordering metadata.
                        local.sort_order = incoming.sort_order.or(local.sort_order);
                        local.synced_at = incoming.synced_at;
                        local.is_dirty = false;
                        report.refreshed += 1;
                    }
                }

                // Fast-path retry set: queued notes the remote iteration
                // never visited (e.g. created while a push was failing).
                let mut drained: Vec<NoteId> = Vec::new();
                for id in &pending {
                    let Some(note) = notes.iter_mut().find(|note| &note.id == id) else {
                        drained.push(id.clone());
                        continue;
                    };
                    if !note.is_dirty {
                        drained.push(id.clone());
                        continue;
                    }
                    match remote.upsert(note, user_ref).await {
                        Ok(()) => {
                            note.is_dirty = false;
                            report.drained_pending += 1;
                            drained.push(id.clone());
                        }
                        Err(error) => {
                            tracing::warn!("pending retry failed for {}: {error}", note.id);
                            report.push_failures += 1;
                        }
                    }
                }

                Ok((notes, (report, drained)))
            })
            .await?;

        for id in &drained {
            self.store.dequeue_pending(id).await?;
        }
        // Queue failed migration pushes so the next pass's drain retries
        // them; the merge loop never revisits notes the remote lacks.
        for id in &migration_failed_ids {
            self.store.enqueue_pending(id).await?;
        }

        report.pulled_new = merge_report.pulled_new;
        report.overwritten = merge_report.overwritten;
        report.pushed = merge_report.pushed;
        report.refreshed = merge_report.refreshed;
        report.drained_pending = merge_report.drained_pending;
        report.push_failures += merge_report.push_failures;

        tracing::info!(
            migrated = report.migrated,
            pulled_new = report.pulled_new,
            overwritten = report.overwritten,
            pushed = report.pushed,
            refreshed = report.refreshed,
            push_failures = report.push_failures,
            drained_pending = report.drained_pending,
            "reconciliation complete"
        );
        Ok(report)
    }
}
