use drift_core::NoteId;

use crate::commands::common::{
    format_note_lines, normalize_note_identifier, resolve_note, AppContext,
};
use crate::error::CliError;

pub async fn run_reorder(context: &AppContext, id_queries: &[String]) -> Result<(), CliError> {
    if id_queries.is_empty() {
        return Err(CliError::EmptyReorder);
    }

    let notes = context.store.load().await?;
    let mut ordered_ids: Vec<NoteId> = Vec::with_capacity(id_queries.len());
    for query in id_queries {
        let normalized = normalize_note_identifier(query)?;
        ordered_ids.push(resolve_note(&normalized, &notes)?.id.clone());
    }

    let reordered = context.note_service().reorder(&ordered_ids).await?;
    for line in format_note_lines(&reordered) {
        println!("{line}");
    }
    Ok(())
}
