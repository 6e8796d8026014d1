use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use nestplan::api::{
    AppState, DepletionArgs, ProjectionArgs, RulesArgs, build_depletion_inputs,
    build_projection_inputs, run_http_server,
};
use nestplan::core::{project_accumulation, simulate_depletion_trace};
use nestplan::store::{FileStore, KeyValueStore, MemoryStore};
use serde::Serialize;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "nestplan", about = "Personal finance planning: projections, depletion, summaries")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the JSON API.
    Serve {
        #[arg(long, default_value_t = 8080)]
        port: u16,
        /// Persist page state as one JSON file per key; in-memory when unset.
        #[arg(long, env = "NESTPLAN_DATA_DIR")]
        data_dir: Option<PathBuf>,
        #[command(flatten)]
        rules: RulesArgs,
    },
    /// Print a pre-retirement accumulation projection.
    Project(ProjectionArgs),
    /// Print a post-retirement depletion simulation.
    Deplete(DepletionArgs),
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(msg) = run(Cli::parse()).await {
        error!("{msg}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), String> {
    match cli.command {
        Command::Serve {
            port,
            data_dir,
            rules,
        } => {
            let rules = rules.build().map_err(|e| e.to_string())?;
            let store: Arc<dyn KeyValueStore> = match data_dir {
                Some(dir) => {
                    let store = FileStore::open(dir).map_err(|e| e.to_string())?;
                    info!(root = %store.root().display(), "using file store");
                    Arc::new(store)
                }
                None => {
                    info!("no data directory configured; page state is kept in memory");
                    Arc::new(MemoryStore::new())
                }
            };
            run_http_server(port, AppState::new(store, rules))
                .await
                .map_err(|e| format!("server error: {e}"))
        }
        Command::Project(args) => {
            let inputs = build_projection_inputs(&args).map_err(|e| e.to_string())?;
            print_json(&project_accumulation(&inputs))
        }
        Command::Deplete(args) => {
            let inputs = build_depletion_inputs(&args).map_err(|e| e.to_string())?;
            print_json(&simulate_depletion_trace(
                inputs.starting_corpus,
                inputs.plan,
                &inputs.allocation,
                &inputs.returns,
                inputs.inflation_percent,
                inputs.max_years,
            ))
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<(), String> {
    let out = serde_json::to_string_pretty(value).map_err(|e| e.to_string())?;
    println!("{out}");
    Ok(())
}
