use drift_core::service::NotePatch;

use crate::commands::common::{
    capture_editor_input_with_initial, normalize_note_identifier, resolve_note, AppContext,
};
use crate::error::CliError;

pub async fn run_edit(
    context: &AppContext,
    id: &str,
    title: Option<&str>,
    color: Option<&str>,
    clear_color: bool,
) -> Result<(), CliError> {
    let normalized_id = normalize_note_identifier(id)?;
    let notes = context.store.load().await?;
    let note = resolve_note(&normalized_id, &notes)?.clone();

    let mut patch = NotePatch::default();
    if let Some(title) = title {
        patch = patch.title(title);
    }
    if clear_color {
        patch = patch.color(None);
    } else if let Some(color) = color {
        patch = patch.color(Some(color.to_string()));
    }

    // Flag-only edits skip the editor; otherwise round-trip the body.
    if patch.is_empty() {
        let Some(edited) = capture_editor_input_with_initial(&note.content)? else {
            return Err(CliError::EmptyEditedContent);
        };
        if edited == note.content {
            println!("{}", note.id);
            return Ok(());
        }
        patch = patch.content(edited);
    }

    let updated = context.note_service().update(&note.id, patch).await?;
    println!("{}", updated.id);
    Ok(())
}
