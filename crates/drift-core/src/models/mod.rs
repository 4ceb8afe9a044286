//! Data model

mod note;

pub use note::{Note, NoteId, NoteOwner};
