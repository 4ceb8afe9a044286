//! Drift CLI - offline-first notes from the terminal
//!
//! Notes live on this device and reconcile with the remote store when an
//! identity is configured.

mod cli;
mod commands;
mod config;
mod error;

use clap::{CommandFactory, Parser};

use crate::cli::{Cli, Commands};
use crate::commands::common::AppContext;
use crate::config::CliConfig;
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("drift=info".parse().expect("valid directive")),
        )
        .init();

    let cli = Cli::parse();

    // Completions need no storage or configuration.
    if let Some(Commands::Completions { shell, output }) = &cli.command {
        return commands::completions::run_completions(*shell, output.as_deref());
    }

    let config = CliConfig::from_env(cli.data_dir);
    let context = AppContext::from_config(&config)?;

    match cli.command {
        Some(Commands::Add {
            content,
            title,
            color,
        }) => {
            commands::add::run_add(&context, &content, title.as_deref(), color.as_deref())
                .await?;
        }
        Some(Commands::List { limit, json }) => {
            commands::list::run_list(&context, limit, json).await?;
        }
        Some(Commands::Search { query, limit, json }) => {
            commands::search::run_search(&context, &query, limit, json).await?;
        }
        Some(Commands::Edit {
            id,
            title,
            color,
            clear_color,
        }) => {
            commands::edit::run_edit(
                &context,
                &id,
                title.as_deref(),
                color.as_deref(),
                clear_color,
            )
            .await?;
        }
        Some(Commands::Delete { id }) => {
            commands::delete::run_delete(&context, &id).await?;
        }
        Some(Commands::Reorder { ids }) => {
            commands::reorder::run_reorder(&context, &ids).await?;
        }
        Some(Commands::Sync) => {
            commands::sync::run_sync(&context).await?;
        }
        Some(Commands::Status) => {
            commands::status::run_status(&context).await?;
        }
        Some(Commands::Completions { .. }) => unreachable!("handled above"),
        None => {
            // Quick capture mode: drift "my note"
            if cli.note.is_empty() {
                Cli::command().print_help().map_err(CliError::Io)?;
                println!();
            } else {
                commands::add::run_add(&context, &cli.note, None, None).await?;
            }
        }
    }

    Ok(())
}
