use drift_core::service::DeleteOutcome;

use crate::commands::common::{normalize_note_identifier, resolve_note, AppContext};
use crate::error::CliError;

pub async fn run_delete(context: &AppContext, id: &str) -> Result<(), CliError> {
    let normalized_id = normalize_note_identifier(id)?;
    let notes = context.store.load().await?;
    let note_id = resolve_note(&normalized_id, &notes)?.id.clone();

    match context.note_service().delete(&note_id).await? {
        DeleteOutcome::LocalOnly | DeleteOutcome::RemoteDeleted => {}
        DeleteOutcome::RemoteFailed(error) => {
            eprintln!(
                "Warning: remote copy could not be deleted ({error}); it may reappear after a future sync."
            );
        }
    }

    println!("{note_id}");
    Ok(())
}
