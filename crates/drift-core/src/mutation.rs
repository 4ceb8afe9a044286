//! Optimistic mutation lifecycle.
//!
//! Every local mutation runs through an explicit state machine:
//! `Pending -> Committed | RolledBack`. Only a committed working copy is
//! retained as the authoritative collection; a rollback reverts to the
//! baseline snapshot taken when the mutation began.

use crate::models::Note;

/// State of one optimistic mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationState {
    /// Applied to the working copy, not yet durably persisted
    Pending,
    /// Durably persisted; the working copy is authoritative
    Committed,
    /// Persistence failed or the change was abandoned; baseline stands
    RolledBack,
}

/// A working copy of the note collection with its pre-mutation baseline.
#[derive(Debug)]
pub struct OptimisticMutation {
    baseline: Vec<Note>,
    working: Vec<Note>,
    state: MutationState,
}

impl OptimisticMutation {
    /// Begin a mutation over the given collection snapshot.
    #[must_use]
    pub fn begin(collection: Vec<Note>) -> Self {
        Self {
            baseline: collection.clone(),
            working: collection,
            state: MutationState::Pending,
        }
    }

    /// The working copy. Mutate freely while `Pending`.
    pub fn working_mut(&mut self) -> &mut Vec<Note> {
        &mut self.working
    }

    #[must_use]
    pub fn working(&self) -> &[Note] {
        &self.working
    }

    #[must_use]
    pub const fn state(&self) -> MutationState {
        self.state
    }

    /// Mark the working copy as durably persisted.
    pub fn commit(&mut self) {
        if self.state == MutationState::Pending {
            self.state = MutationState::Committed;
        }
    }

    /// Abandon the working copy.
    pub fn roll_back(&mut self) {
        if self.state == MutationState::Pending {
            self.state = MutationState::RolledBack;
        }
    }

    /// Resolve to the collection a caller should keep: the working copy when
    /// committed, the baseline otherwise.
    #[must_use]
    pub fn into_collection(self) -> Vec<Note> {
        match self.state {
            MutationState::Committed => self.working,
            MutationState::Pending | MutationState::RolledBack => self.baseline,
        }
    }
}
