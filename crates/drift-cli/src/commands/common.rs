//! Shared command plumbing: service wiring, id resolution, content capture,
//! and list formatting.

use std::env;
use std::io::{self, IsTerminal, Read};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{DateTime, Utc};
use drift_core::identity::StaticIdentityProvider;
use drift_core::remote::PostgrestRemoteStore;
use drift_core::search::SearchService;
use drift_core::service::NoteService;
use drift_core::storage::{FileKeyValueStore, LocalStore};
use drift_core::sync::SyncEngine;
use drift_core::{IdentityProvider, Note};
use serde::Serialize;

use crate::config::CliConfig;
use crate::error::CliError;

type CliRemote = Option<PostgrestRemoteStore>;

/// Wired-up handles shared by every command.
pub struct AppContext {
    pub store: Arc<LocalStore>,
    pub identity: StaticIdentityProvider,
    pub remote: CliRemote,
}

impl AppContext {
    /// Build the context from resolved configuration.
    ///
    /// An identity without remote configuration is rejected up front:
    /// every authenticated path would go remote and fail.
    pub fn from_config(config: &CliConfig) -> Result<Self, CliError> {
        let store = Arc::new(LocalStore::new(FileKeyValueStore::open(&config.data_dir)?));

        let remote = match &config.remote {
            Some(remote_config) => {
                let mut client = PostgrestRemoteStore::new(
                    remote_config.base_url.as_str(),
                    remote_config.api_key.as_str(),
                )?;
                if let Some(token) = &remote_config.access_token {
                    client = client.with_access_token(token.as_str());
                }
                Some(client)
            }
            None => {
                if config.identity.is_some() {
                    return Err(CliError::SyncNotConfigured);
                }
                tracing::info!("Running in local-only mode (no remote config)");
                None
            }
        };

        Ok(Self {
            store,
            identity: StaticIdentityProvider::new(config.identity.clone()),
            remote,
        })
    }

    pub fn note_service(&self) -> NoteService<StaticIdentityProvider, CliRemote> {
        NoteService::new(
            Arc::clone(&self.store),
            self.identity.clone(),
            self.remote.clone(),
        )
    }

    pub fn sync_engine(&self) -> SyncEngine<StaticIdentityProvider, CliRemote> {
        SyncEngine::new(
            Arc::clone(&self.store),
            self.identity.clone(),
            self.remote.clone(),
        )
    }

    pub fn search_service(&self) -> SearchService<StaticIdentityProvider, CliRemote> {
        SearchService::new(
            Arc::clone(&self.store),
            self.identity.clone(),
            self.remote.clone(),
        )
    }

    pub fn signed_in(&self) -> bool {
        self.identity.current_identity().is_some()
    }
}

/// Resolve a note by exact id or unique id prefix.
pub fn resolve_note<'a>(query: &str, notes: &'a [Note]) -> Result<&'a Note, CliError> {
    if let Some(note) = notes.iter().find(|note| note.id.as_str() == query) {
        return Ok(note);
    }

    let matches: Vec<&Note> = notes
        .iter()
        .filter(|note| note.id.as_str().starts_with(query))
        .collect();

    match matches.len() {
        0 => Err(CliError::NoteNotFound(query.to_string())),
        1 => Ok(matches[0]),
        _ => {
            let options = matches
                .iter()
                .take(3)
                .map(|note| short_id(note))
                .collect::<Vec<_>>()
                .join(", ");
            Err(CliError::AmbiguousNoteId(format!(
                "ID prefix '{query}' is ambiguous; matches: {options}"
            )))
        }
    }
}

/// Notes in display order: `sort_order` ascending, ties newest-first.
pub fn display_sorted(mut notes: Vec<Note>) -> Vec<Note> {
    notes.sort_by(|a, b| {
        let a_order = a.sort_order.unwrap_or(0);
        let b_order = b.sort_order.unwrap_or(0);
        a_order
            .cmp(&b_order)
            .then_with(|| b.updated_at.cmp(&a.updated_at))
    });
    notes
}

#[derive(Debug, Serialize)]
pub struct NoteListItem {
    pub id: String,
    pub title: String,
    pub preview: String,
    pub content: String,
    pub color: Option<String>,
    pub sort_order: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub synced_at: Option<DateTime<Utc>>,
    pub is_dirty: bool,
    pub relative_time: String,
}

pub fn note_to_list_item(note: &Note) -> NoteListItem {
    let now = Utc::now();
    NoteListItem {
        id: note.id.to_string(),
        title: note.title.clone(),
        preview: note_preview(note, 80),
        content: note.content.clone(),
        color: note.color.clone(),
        sort_order: note.sort_order,
        created_at: note.created_at,
        updated_at: note.updated_at,
        synced_at: note.synced_at,
        is_dirty: note.is_dirty,
        relative_time: format_relative_time(note.updated_at, now),
    }
}

pub fn format_note_lines(notes: &[Note]) -> Vec<String> {
    let now = Utc::now();
    notes
        .iter()
        .map(|note| {
            let id = short_id(note);
            let title = truncate_chars(&note.title, 24);
            let preview = note_preview(note, 36);
            let relative_time = format_relative_time(note.updated_at, now);
            let marker = if note.is_dirty { " *" } else { "" };
            format!("{id:<13}  {title:<24}  {preview:<36}  {relative_time}{marker}")
        })
        .collect()
}

pub fn short_id(note: &Note) -> String {
    note.id.as_str().chars().take(13).collect()
}

pub fn note_preview(note: &Note, max_chars: usize) -> String {
    let first_line = note.content.lines().next().unwrap_or("").trim();
    let collapsed = first_line.split_whitespace().collect::<Vec<_>>().join(" ");
    truncate_chars(&collapsed, max_chars)
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let take_len = max_chars.saturating_sub(3);
        let mut truncated = text.chars().take(take_len).collect::<String>();
        truncated.push_str("...");
        truncated
    }
}

pub fn format_relative_time(timestamp: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let diff = now
        .signed_duration_since(timestamp)
        .num_milliseconds()
        .max(0);
    let minute = 60_000;
    let hour = 60 * minute;
    let day = 24 * hour;
    let week = 7 * day;
    let month = 30 * day;
    let year = 365 * day;

    if diff < minute {
        "just now".to_string()
    } else if diff < hour {
        format!("{}m ago", diff / minute)
    } else if diff < day {
        format!("{}h ago", diff / hour)
    } else if diff < week {
        format!("{}d ago", diff / day)
    } else if diff < month {
        format!("{}w ago", diff / week)
    } else if diff < year {
        format!("{}mo ago", diff / month)
    } else {
        format!("{}y ago", diff / year)
    }
}

pub fn normalize_content(content: &str) -> Option<String> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

pub fn normalize_search_query(query: &str) -> Result<String, CliError> {
    let trimmed = query.trim();
    if trimmed.is_empty() {
        Err(CliError::EmptySearchQuery)
    } else {
        Ok(trimmed.to_string())
    }
}

pub fn normalize_note_identifier(id: &str) -> Result<String, CliError> {
    let trimmed = id.trim();
    if trimmed.is_empty() {
        Err(CliError::EmptyNoteId)
    } else {
        Ok(trimmed.to_string())
    }
}

/// Content from positional args or piped stdin, if either is present.
pub fn content_from_args_or_stdin(
    content_parts: &[String],
) -> Result<Option<String>, CliError> {
    if let Some(content) = normalize_content(&content_parts.join(" ")) {
        return Ok(Some(content));
    }
    read_piped_stdin()
}

fn read_piped_stdin() -> Result<Option<String>, CliError> {
    let stdin = io::stdin();
    if stdin.is_terminal() {
        return Ok(None);
    }

    let mut buffer = String::new();
    stdin.lock().read_to_string(&mut buffer)?;
    Ok(normalize_content(&buffer))
}

pub fn capture_editor_input() -> Result<Option<String>, CliError> {
    capture_editor_input_with_initial("")
}

pub fn capture_editor_input_with_initial(
    initial_content: &str,
) -> Result<Option<String>, CliError> {
    let editor = preferred_editor();
    let temp_file = create_temp_note_file_path();
    std::fs::write(&temp_file, initial_content)?;

    let launch_result = launch_editor(&editor, &temp_file);
    let note_content = std::fs::read_to_string(&temp_file)?;
    let _ = std::fs::remove_file(&temp_file);

    launch_result?;
    Ok(normalize_content(&note_content))
}

fn launch_editor(editor: &str, file_path: &Path) -> Result<(), CliError> {
    match Command::new(editor).arg(file_path).status() {
        Ok(status) => {
            if status.success() {
                Ok(())
            } else {
                Err(CliError::EditorFailed(format!(
                    "`{editor}` exited with status {status}"
                )))
            }
        }
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            // Fallback for editor commands with args, e.g. "code --wait"
            let mut parts = editor.split_whitespace();
            let Some(program) = parts.next() else {
                return Err(CliError::EditorFailed("empty EDITOR command".into()));
            };

            let mut command = Command::new(program);
            command.args(parts).arg(file_path);

            let status = command.status()?;
            if status.success() {
                Ok(())
            } else {
                Err(CliError::EditorFailed(format!(
                    "`{editor}` exited with status {status}"
                )))
            }
        }
        Err(err) => Err(CliError::Io(err)),
    }
}

fn preferred_editor() -> String {
    env::var("VISUAL")
        .or_else(|_| env::var("EDITOR"))
        .unwrap_or_else(|_| default_editor().to_string())
}

const fn default_editor() -> &'static str {
    if cfg!(windows) {
        "notepad"
    } else {
        "vi"
    }
}

fn create_temp_note_file_path() -> PathBuf {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |duration| duration.as_nanos());
    env::temp_dir().join(format!("drift-note-{}-{now}.md", std::process::id()))
}
