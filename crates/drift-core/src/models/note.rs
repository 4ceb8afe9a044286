//! Note model

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Prefix carried by ids generated on-device before a remote copy exists.
const LOCAL_ID_PREFIX: &str = "local_";

/// A unique identifier for a note.
///
/// Locally created notes get a `local_<unix-millis>_<random>` id; notes that
/// originate from the remote store keep the id the server assigned.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NoteId(String);

impl NoteId {
    /// Generate a new device-local note id
    #[must_use]
    pub fn new_local() -> Self {
        Self(format!(
            "{LOCAL_ID_PREFIX}{}_{}",
            Utc::now().timestamp_millis(),
            random_suffix()
        ))
    }

    /// Whether this id was generated on-device (never remote-confirmed)
    #[must_use]
    pub fn is_local(&self) -> bool {
        self.0.starts_with(LOCAL_ID_PREFIX)
    }

    /// Get the string representation of this id
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for NoteId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for NoteId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Who owns a note: a signed-in user or the device's anonymous guest id.
///
/// Exactly one owner exists at a time; the wire shape (`user_id`/`guest_id`
/// columns) is validated on deserialization so a record claiming both or
/// neither is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawOwner", into = "RawOwner")]
pub enum NoteOwner {
    User(String),
    Guest(String),
}

impl NoteOwner {
    #[must_use]
    pub fn user_id(&self) -> Option<&str> {
        match self {
            Self::User(id) => Some(id),
            Self::Guest(_) => None,
        }
    }

    #[must_use]
    pub fn guest_id(&self) -> Option<&str> {
        match self {
            Self::Guest(id) => Some(id),
            Self::User(_) => None,
        }
    }

    #[must_use]
    pub const fn is_guest(&self) -> bool {
        matches!(self, Self::Guest(_))
    }
}

#[derive(Serialize, Deserialize)]
struct RawOwner {
    #[serde(default)]
    user_id: Option<String>,
    #[serde(default)]
    guest_id: Option<String>,
}

impl TryFrom<RawOwner> for NoteOwner {
    type Error = String;

    fn try_from(raw: RawOwner) -> Result<Self, Self::Error> {
        match (raw.user_id, raw.guest_id) {
            (Some(user_id), None) => Ok(Self::User(user_id)),
            (None, Some(guest_id)) => Ok(Self::Guest(guest_id)),
            (Some(_), Some(_)) => Err("note claims both user_id and guest_id".to_string()),
            (None, None) => Err("note has neither user_id nor guest_id".to_string()),
        }
    }
}

impl From<NoteOwner> for RawOwner {
    fn from(owner: NoteOwner) -> Self {
        match owner {
            NoteOwner::User(user_id) => Self {
                user_id: Some(user_id),
                guest_id: None,
            },
            NoteOwner::Guest(guest_id) => Self {
                user_id: None,
                guest_id: Some(guest_id),
            },
        }
    }
}

/// A note in the collection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    /// Unique identifier
    pub id: NoteId,
    /// Owning identity (signed-in user or device guest)
    #[serde(flatten)]
    pub owner: NoteOwner,
    /// Display title; may be empty
    pub title: String,
    /// Free text body; may contain inline attachment markers (opaque here)
    pub content: String,
    /// Opaque display tag, carried through merges untouched
    #[serde(default)]
    pub color: Option<String>,
    /// Manual display order; `None` means unordered
    #[serde(default)]
    pub sort_order: Option<i64>,
    /// Set once at creation, never mutated
    pub created_at: DateTime<Utc>,
    /// Bumped on every local or remote mutation; sole conflict signal
    pub updated_at: DateTime<Utc>,
    /// Set by the sync engine when a remote copy is confirmed to match
    #[serde(default)]
    pub synced_at: Option<DateTime<Utc>>,
    /// Local-only: content has diverged from (or never reached) the remote
    #[serde(default)]
    pub is_dirty: bool,
}

impl Note {
    /// Create a new note owned by `owner` with a fresh local id.
    ///
    /// `created_at` and `updated_at` are set to now; the caller decides the
    /// dirty flag (local-only vs. about-to-push).
    #[must_use]
    pub fn new(
        owner: NoteOwner,
        title: impl Into<String>,
        content: impl Into<String>,
        color: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: NoteId::new_local(),
            owner,
            title: title.into(),
            content: content.into(),
            color,
            sort_order: None,
            created_at: now,
            updated_at: now,
            synced_at: None,
            is_dirty: true,
        }
    }

    /// Case-insensitive substring match against title or content
    #[must_use]
    pub fn matches(&self, query_lower: &str) -> bool {
        self.title.to_lowercase().contains(query_lower)
            || self.content.to_lowercase().contains(query_lower)
    }
}

fn random_suffix() -> String {
    Uuid::new_v4().simple().to_string().chars().take(9).collect()
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn local_ids_are_unique_and_flagged() {
        let a = NoteId::new_local();
        let b = NoteId::new_local();
        assert_ne!(a, b);
        assert!(a.is_local());
        assert!(!NoteId::from("8f14e45f-ceea-467f-ab9f-95a1d1372913").is_local());
    }

    #[test]
    fn new_note_has_equal_timestamps() {
        let note = Note::new(NoteOwner::Guest("guest_1".into()), "Title", "Body", None);
        assert_eq!(note.created_at, note.updated_at);
        assert!(note.synced_at.is_none());
        assert!(note.is_dirty);
    }

    #[test]
    fn owner_serializes_to_exclusive_columns() {
        let note = Note::new(NoteOwner::User("u-1".into()), "t", "c", None);
        let value = serde_json::to_value(&note).unwrap();
        assert_eq!(value["user_id"], "u-1");
        assert_eq!(value["guest_id"], serde_json::Value::Null);
    }

    #[test]
    fn owner_with_both_ids_is_rejected() {
        let raw = serde_json::json!({
            "id": "n1",
            "user_id": "u-1",
            "guest_id": "g-1",
            "title": "t",
            "content": "c",
            "created_at": "2026-01-01T00:00:00Z",
            "updated_at": "2026-01-01T00:00:00Z",
        });
        assert!(serde_json::from_value::<Note>(raw).is_err());
    }

    #[test]
    fn owner_with_neither_id_is_rejected() {
        let raw = serde_json::json!({
            "id": "n1",
            "title": "t",
            "content": "c",
            "created_at": "2026-01-01T00:00:00Z",
            "updated_at": "2026-01-01T00:00:00Z",
        });
        assert!(serde_json::from_value::<Note>(raw).is_err());
    }

    #[test]
    fn note_roundtrips_through_json() {
        let note = Note::new(
            NoteOwner::Guest("guest_17".into()),
            "Groceries",
            "milk, eggs",
            Some("teal".into()),
        );
        let json = serde_json::to_string(&note).unwrap();
        let parsed: Note = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, note);
    }

    #[test]
    fn matches_is_case_insensitive_on_both_fields() {
        let note = Note::new(NoteOwner::Guest("g".into()), "Groceries", "Buy MILK", None);
        assert!(note.matches("groc"));
        assert!(note.matches("milk"));
        assert!(!note.matches("xyzzy"));
    }
}
