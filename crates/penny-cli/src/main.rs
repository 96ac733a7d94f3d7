//! Penny CLI - track spending from the command line
//!
//! Quick capture from the terminal with minimal friction; `penny sync`
//! reconciles the local database with the penny API.

mod cli;
mod commands;
mod error;

use clap::{CommandFactory, Parser};

use cli::{CategoryCommands, Cli, Commands, SyncCommands};
use error::CliError;

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
                .add_directive("penny=info".parse().expect("valid directive")),
        )
        .init();

    let cli = Cli::parse();
    let db_path = commands::common::resolve_db_path(cli.db_path);

    match cli.command {
        Some(Commands::Add {
            amount,
            description,
            category,
            subcategory,
            currency,
            date,
        }) => {
            commands::add::run_add(
                &amount,
                &description,
                category.as_deref(),
                subcategory.as_deref(),
                currency.as_deref(),
                date.as_deref(),
                &db_path,
            )
            .await?;
        }
        Some(Commands::List {
            limit,
            category,
            json,
        }) => {
            commands::list::run_list(limit, category.as_deref(), json, &db_path).await?;
        }
        Some(Commands::Delete { id }) => commands::delete::run_delete(&id, &db_path).await?,
        Some(Commands::Category { command }) => match command {
            CategoryCommands::Add { name, icon, color } => {
                commands::category::run_category_add(&name, &icon, &color, &db_path).await?;
            }
            CategoryCommands::AddSub { category, name } => {
                commands::category::run_category_add_sub(&category, &name, &db_path).await?;
            }
            CategoryCommands::List { json } => {
                commands::category::run_category_list(json, &db_path).await?;
            }
            CategoryCommands::Delete { name } => {
                commands::category::run_category_delete(&name, &db_path).await?;
            }
        },
        Some(Commands::Sync { command }) => match command {
            None => commands::sync::run_sync(false, &db_path).await?,
            Some(SyncCommands::Full) => commands::sync::run_sync(true, &db_path).await?,
            Some(SyncCommands::Conflicts { limit, json }) => {
                commands::sync::run_sync_conflicts(limit, json, &db_path).await?;
            }
        },
        None => {
            // Quick capture mode: penny 12.50 coffee with Sam
            if let Some((amount, description)) = cli.entry.split_first() {
                commands::add::run_add(amount, description, None, None, None, None, &db_path)
                    .await?;
            } else {
                Cli::command().print_help().map_err(CliError::Io)?;
                println!();
            }
        }
    }

    Ok(())
}
