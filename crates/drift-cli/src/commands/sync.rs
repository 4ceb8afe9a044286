use crate::commands::common::AppContext;
use crate::error::CliError;

pub async fn run_sync(context: &AppContext) -> Result<(), CliError> {
    if !context.signed_in() {
        println!("Not signed in; notes stay local until an identity is configured.");
        return Ok(());
    }

    let report = context.sync_engine().reconcile().await?;
    println!(
        "Sync completed: {} migrated, {} pulled, {} overwritten, {} pushed, {} refreshed",
        report.migrated, report.pulled_new, report.overwritten, report.pushed, report.refreshed
    );
    if report.drained_pending > 0 {
        println!("Retried {} queued note(s).", report.drained_pending);
    }
    if report.push_failures > 0 {
        println!(
            "{} push(es) failed and will be retried on the next sync.",
            report.push_failures
        );
    }
    Ok(())
}
