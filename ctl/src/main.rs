use std::{
    io,
    path::{Path, PathBuf},
    process::ExitCode,
};

use anyhow::Context;
use clap::{Parser, Subcommand};
use tether_db::SqliteStorage;
use tether_pce::{PceConfig, PolicyController};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use crate::commands::{CreatePairingKeyArgs, ListAgentsArgs};

mod commands;

#[derive(Parser)]
#[clap(version, about = "Administration tool for the tether pairing registry")]
pub struct Args {
    #[clap(subcommand)]
    command: Command,

    #[clap(
        short = 'D',
        long,
        env = "TETHER_DB_PATH",
        default_value = "/var/lib/tether/tether.sqlite3"
    )]
    db_path: PathBuf,

    #[clap(flatten)]
    pce: PceConfig,
}

#[derive(Clone, Subcommand)]
pub enum Command {
    /// Create and initialize the database. Fails if it already exists.
    #[command(name = "db-setup")]
    DbSetup,

    /// Check the database and, when configured, the policy controller.
    Status,

    #[command(name = "pairing-key", subcommand)]
    PairingKey(PairingKeyCommand),

    #[command(subcommand)]
    Agent(AgentCommand),
}

#[derive(Clone, Subcommand)]
pub enum PairingKeyCommand {
    List,
    Create(CreatePairingKeyArgs),
    Delete { key: String },
}

#[derive(Clone, Subcommand)]
pub enum AgentCommand {
    List(ListAgentsArgs),
    Delete { id: Uuid },
    /// Delete every registered agent.
    #[command(name = "delete-all")]
    DeleteAll,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .with_writer(io::stderr)
        .init();

    match run(Args::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn open(path: &Path) -> anyhow::Result<SqliteStorage> {
    SqliteStorage::open(path, 1)
        .await
        .with_context(|| format!("failed to open database {}", path.display()))
}

async fn run(args: Args) -> anyhow::Result<()> {
    let mut out = io::stdout().lock();

    match args.command {
        Command::DbSetup => commands::db_setup(&args.db_path, &mut out).await,
        Command::Status => {
            let stg = open(&args.db_path).await?;
            commands::status(&stg, &args.pce, &mut out).await
        }
        Command::PairingKey(cmd) => {
            let stg = open(&args.db_path).await?;
            match cmd {
                PairingKeyCommand::List => commands::list_pairing_keys(&stg, &mut out).await,
                PairingKeyCommand::Create(params) => {
                    let controller = match params.target_switch {
                        Some(_) => Some(
                            args.pce
                                .client()
                                .context("--target-switch needs the policy controller")?,
                        ),
                        None => None,
                    };
                    let controller = controller.as_ref().map(|c| c as &dyn PolicyController);

                    commands::create_pairing_key(&stg, controller, params, &mut out).await
                }
                PairingKeyCommand::Delete { key } => {
                    commands::delete_pairing_key(&stg, &key, &mut out).await
                }
            }
        }
        Command::Agent(cmd) => {
            let stg = open(&args.db_path).await?;
            match cmd {
                AgentCommand::List(params) => commands::list_agents(&stg, params, &mut out).await,
                AgentCommand::Delete { id } => commands::delete_agent(&stg, id, &mut out).await,
                AgentCommand::DeleteAll => commands::delete_all_agents(&stg, &mut out).await,
            }
        }
    }
}
