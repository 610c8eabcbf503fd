use std::io;
use std::path::PathBuf;
use std::process::exit;

use basegrid::cli::{run_one_off_command, BasegridCli};
use basegrid::config::context::build_workspace;
use basegrid::config::schema::load_config;
use clap::Parser;
use tracing::{error, info};
use tracing_log::LogTracer;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const DEFAULT_LOG_FILTER: &str = "basegrid=info,warn";

#[derive(Debug, Parser)]
#[clap(name = "basegrid", version, about = "Bases, tables and grids in your terminal")]
struct Args {
    #[clap(short, long, default_value = "basegrid.toml")]
    config_path: PathBuf,

    #[clap(long, help = "Log as JSON lines (also `logging.json` in the config)")]
    json_logs: bool,

    #[clap(long, help = "Run `;`-separated commands and exit")]
    one_off: Option<String>,
}

fn prepare_tracing(json_logs: bool) -> Result<(), Box<dyn std::error::Error>> {
    // Route `log` records from dependencies into tracing
    LogTracer::init()?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let registry = tracing_subscriber::registry().with(filter);

    if json_logs {
        tracing::subscriber::set_global_default(
            registry.with(fmt::layer().json().with_writer(io::stderr)),
        )?;
    } else {
        tracing::subscriber::set_global_default(
            registry.with(fmt::layer().with_writer(io::stderr)),
        )?;
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let config = match load_config(&args.config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error loading {}: {e}", args.config_path.display());
            exit(1);
        }
    };

    if let Err(e) = prepare_tracing(args.json_logs || config.logging.json) {
        eprintln!("Error setting up logging: {e}");
    }

    info!("Starting basegrid {}", env!("CARGO_PKG_VERSION"));

    let (workspace, auth) = match build_workspace(&config).await {
        Ok(built) => built,
        Err(e) => {
            error!("Error setting up the store: {e}");
            exit(1);
        }
    };
    let mut cli = BasegridCli::new(workspace, auth);

    if let Some(commands) = args.one_off {
        if let Err(e) = run_one_off_command(&mut cli, &commands, io::stdout()).await {
            eprintln!("{e}");
            exit(1);
        }
        return;
    }

    if let Err(e) = cli.repl_loop().await {
        error!("REPL failed: {e}");
        exit(1);
    }
}
