//! PostgREST-backed remote store client.
//!
//! Talks to a Supabase-style backend: a `notes` table plus two RPCs,
//! `sync_note` (conflict-aware upsert) and `search_notes` (ranked full-text
//! search). When `sync_note` is unavailable the client falls back to a raw
//! upsert-by-id.

use chrono::{DateTime, Utc};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde_json::json;

use crate::error::{Error, Result};
use crate::identity::Identity;
use crate::models::{Note, NoteId, NoteOwner};

use super::RemoteStore;

#[derive(Clone)]
pub struct PostgrestRemoteStore {
    base_url: String,
    api_key: String,
    access_token: Option<String>,
    client: Client,
}

impl std::fmt::Debug for PostgrestRemoteStore {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("PostgrestRemoteStore")
            .field("base_url", &self.base_url)
            .field("api_key", &"[REDACTED]")
            .field("access_token", &self.access_token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl PostgrestRemoteStore {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Result<Self> {
        let base_url = normalize_base_url(base_url.into())?;
        let api_key = api_key.into().trim().to_string();
        if api_key.is_empty() {
            return Err(Error::InvalidInput(
                "remote API key must not be empty".to_string(),
            ));
        }

        Ok(Self {
            base_url,
            api_key,
            access_token: None,
            client: Client::builder().build()?,
        })
    }

    /// Attach the signed-in user's access token; requests fall back to the
    /// API key alone when absent.
    #[must_use]
    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        let bearer = self.access_token.as_deref().unwrap_or(&self.api_key);
        builder
            .header("apikey", &self.api_key)
            .bearer_auth(bearer)
            .header("Accept", "application/json")
    }

    fn table_url(&self, query: &str) -> String {
        format!("{}/rest/v1/notes?{query}", self.base_url)
    }

    fn rpc_url(&self, procedure: &str) -> String {
        format!("{}/rest/v1/rpc/{procedure}", self.base_url)
    }

    async fn upsert_via_rpc(&self, note: &Note, owner: &Identity) -> Result<()> {
        let response = self
            .authorized(self.client.post(self.rpc_url("sync_note")))
            .json(&json!({
                "note_id": note.id.as_str(),
                "note_user_id": owner.id,
                "note_title": note.title,
                "note_content": note.content,
                "note_color": note.color,
                "note_sort_order": note.sort_order,
                "note_updated_at": note.updated_at,
            }))
            .send()
            .await?;

        if response.status().is_success() {
            Ok(())
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(Error::RemoteSync(parse_api_error(status, &body)))
        }
    }

    async fn upsert_raw(&self, note: &Note, owner: &Identity) -> Result<()> {
        let response = self
            .authorized(self.client.post(self.table_url("on_conflict=id")))
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(&json!({
                "id": note.id.as_str(),
                "user_id": owner.id,
                "title": note.title,
                "content": note.content,
                "color": note.color,
                "sort_order": note.sort_order,
                "updated_at": note.updated_at,
                "synced_at": Utc::now(),
            }))
            .send()
            .await?;

        if response.status().is_success() {
            Ok(())
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(Error::RemoteSync(parse_api_error(status, &body)))
        }
    }
}

impl RemoteStore for PostgrestRemoteStore {
    async fn upsert(&self, note: &Note, owner: &Identity) -> Result<()> {
        match self.upsert_via_rpc(note, owner).await {
            Ok(()) => Ok(()),
            Err(rpc_error) => {
                tracing::debug!(
                    "sync_note RPC failed ({rpc_error}), falling back to raw upsert"
                );
                self.upsert_raw(note, owner).await
            }
        }
    }

    async fn delete(&self, id: &NoteId, owner: &Identity) -> Result<()> {
        let query = format!(
            "id=eq.{}&user_id=eq.{}",
            urlencoding::encode(id.as_str()),
            urlencoding::encode(&owner.id)
        );
        let response = self
            .authorized(self.client.delete(self.table_url(&query)))
            .send()
            .await?;

        if response.status().is_success() {
            Ok(())
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(Error::RemoteDelete(parse_api_error(status, &body)))
        }
    }

    async fn fetch_by_owner(&self, owner: &Identity) -> Result<Vec<Note>> {
        let query = format!(
            "select=*&user_id=eq.{}&order=updated_at.desc",
            urlencoding::encode(&owner.id)
        );
        let response = self
            .authorized(self.client.get(self.table_url(&query)))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::RemoteSync(parse_api_error(status, &body)));
        }

        let rows = response.json::<Vec<RemoteNoteRow>>().await?;
        Ok(rows.into_iter().map(|row| row.into_note(owner)).collect())
    }

    async fn search_full_text(&self, query: &str, owner: &Identity) -> Result<Vec<Note>> {
        let response = self
            .authorized(self.client.post(self.rpc_url("search_notes")))
            .json(&json!({
                "search_query": query,
                "user_uuid": owner.id,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::RemoteSync(parse_api_error(status, &body)));
        }

        let rows = response.json::<Vec<RemoteNoteRow>>().await?;
        Ok(rows.into_iter().map(|row| row.into_note(owner)).collect())
    }
}

/// One row of the remote `notes` table.
#[derive(Debug, Deserialize)]
struct RemoteNoteRow {
    id: String,
    #[serde(default)]
    user_id: Option<String>,
    title: String,
    content: String,
    #[serde(default)]
    color: Option<String>,
    #[serde(default)]
    sort_order: Option<i64>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    #[serde(default)]
    synced_at: Option<DateTime<Utc>>,
}

impl RemoteNoteRow {
    fn into_note(self, owner: &Identity) -> Note {
        Note {
            id: NoteId::from(self.id),
            owner: NoteOwner::User(self.user_id.unwrap_or_else(|| owner.id.clone())),
            title: self.title,
            content: self.content,
            color: self.color,
            sort_order: self.sort_order,
            created_at: self.created_at,
            updated_at: self.updated_at,
            synced_at: self.synced_at,
            is_dirty: false,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: Option<String>,
    message: Option<String>,
}

fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<ApiErrorBody>(body) {
        if let Some(message) = payload.message.or(payload.error) {
            return format!("{} ({})", message.trim(), status.as_u16());
        }
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("{} ({})", trimmed, status.as_u16())
    }
}

fn normalize_base_url(raw: String) -> Result<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidInput(
            "remote base URL must not be empty".to_string(),
        ));
    }
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        Ok(trimmed.trim_end_matches('/').to_string())
    } else {
        Err(Error::InvalidInput(
            "remote base URL must include http:// or https://".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn normalize_base_url_rejects_invalid_values() {
        assert!(normalize_base_url(String::new()).is_err());
        assert!(normalize_base_url("example.supabase.co".to_string()).is_err());
        assert_eq!(
            normalize_base_url("https://example.supabase.co/".to_string()).unwrap(),
            "https://example.supabase.co"
        );
    }

    #[test]
    fn debug_redacts_credentials() {
        let store = PostgrestRemoteStore::new("https://example.supabase.co", "anon-secret")
            .unwrap()
            .with_access_token("user-secret");
        let debug = format!("{store:?}");
        assert!(!debug.contains("anon-secret"));
        assert!(!debug.contains("user-secret"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn parse_api_error_prefers_structured_message() {
        let status = StatusCode::CONFLICT;
        assert_eq!(
            parse_api_error(status, r#"{"message": "duplicate key"}"#),
            "duplicate key (409)"
        );
        assert_eq!(parse_api_error(status, "plain text"), "plain text (409)");
        assert_eq!(parse_api_error(status, "  "), "HTTP 409");
    }

    #[test]
    fn remote_row_converts_to_a_clean_user_note() {
        let row = RemoteNoteRow {
            id: "n-1".to_string(),
            user_id: None,
            title: "t".to_string(),
            content: "c".to_string(),
            color: None,
            sort_order: Some(3),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            synced_at: None,
        };

        let note = row.into_note(&Identity::new("u-9"));
        assert_eq!(note.owner, NoteOwner::User("u-9".to_string()));
        assert!(!note.is_dirty);
        assert_eq!(note.sort_order, Some(3));
    }
}
