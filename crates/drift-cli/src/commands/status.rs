use drift_core::IdentityProvider;

use crate::commands::common::AppContext;
use crate::error::CliError;

pub async fn run_status(context: &AppContext) -> Result<(), CliError> {
    match context.identity.current_identity() {
        Some(identity) => {
            let label = identity.email.unwrap_or_else(|| identity.id.clone());
            println!("Signed in as {label}");
        }
        None => {
            let guest_id = context.store.get_or_create_guest_id().await?;
            println!("Signed out (guest id {guest_id})");
        }
    }

    println!(
        "Remote store: {}",
        if context.remote.is_some() {
            "configured"
        } else {
            "not configured"
        }
    );

    let notes = context.store.load().await?;
    let dirty = notes.iter().filter(|note| note.is_dirty).count();
    let pending = context.store.pending_sync_ids().await?.len();
    println!("{} note(s), {dirty} awaiting sync, {pending} queued for retry", notes.len());

    Ok(())
}
