use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use cricsync_config::{
    ClientConfig, ConfigSnapshot, DEFAULT_ENVIRONMENT, LayeredConfig, StoreConfig, SyncOptions,
    render_effective_config,
};
use cricsync_runtime::{HostOptions, LoggingConfig, SyncHost, init_logging};
use mimalloc::MiMalloc;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

/// Exit code for configuration, construction and startup failures.
const EXIT_FATAL: u8 = 1;

/// CricClubs data sync host
#[derive(Parser)]
#[command(name = "cricsync")]
#[command(about = "CricClubs data sync host - loads layered configuration and runs one sync")]
#[command(version)]
struct Cli {
    /// Directory holding appsettings.{yaml|yml|json} and environment overlays
    #[arg(long, default_value = "config")]
    config_dir: PathBuf,

    /// Environment name selecting appsettings.{Environment}.yaml
    #[arg(short, long, env = "CRICSYNC_ENVIRONMENT", default_value = DEFAULT_ENVIRONMENT)]
    environment: String,

    /// Print effective configuration (JSON, secrets redacted) and exit
    #[arg(long)]
    print_config: bool,

    /// Log verbosity level (-v debug, -vv trace); RUST_LOG takes precedence
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Directory for the daily rolling log file
    #[arg(long, default_value = "logs")]
    log_dir: PathBuf,

    /// Log to the console only
    #[arg(long)]
    no_log_file: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the sync once and exit
    Run {
        /// Configuration overrides (Key=Value, --Key=Value, /Key Value)
        #[arg(value_name = "KEY=VALUE", trailing_var_arg = true, allow_hyphen_values = true)]
        overrides: Vec<String>,
    },
    /// Validate configuration and exit
    Check {
        /// Configuration overrides (Key=Value, --Key=Value, /Key Value)
        #[arg(value_name = "KEY=VALUE", trailing_var_arg = true, allow_hyphen_values = true)]
        overrides: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let logging = LoggingConfig {
        verbosity: cli.verbose,
        log_dir: (!cli.no_log_file).then(|| cli.log_dir.clone()),
        ..LoggingConfig::default()
    };
    let guard = match init_logging(&logging) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Error: {e:#}");
            return ExitCode::from(EXIT_FATAL);
        }
    };

    let code = match dispatch(cli).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = %format!("{e:#}"), "Host terminated unexpectedly");
            eprintln!("Error: {e:#}");
            ExitCode::from(EXIT_FATAL)
        }
    };

    // Flush the file sink on every exit path.
    drop(guard);
    code
}

async fn dispatch(cli: Cli) -> Result<ExitCode> {
    let (check, overrides) = match cli.command {
        Some(Commands::Check { overrides }) => (true, overrides),
        Some(Commands::Run { overrides }) => (false, overrides),
        None => (false, Vec::new()),
    };

    // `environment` is visible to configuration like any other key; explicit
    // overrides that follow it win.
    let args = std::iter::once(format!("environment={}", cli.environment)).chain(overrides);
    let snapshot = LayeredConfig::new(&cli.config_dir)
        .environment(cli.environment.as_str())
        .args(args)
        .load()
        .context("failed to load configuration")?;

    tracing::info!(environment = %cli.environment, "CricClubs sync host starting");

    if cli.print_config {
        print_effective_config(&snapshot)?;
        return Ok(ExitCode::SUCCESS);
    }

    if check {
        return check_config(&snapshot);
    }

    // A finished run exits cleanly whatever its terminal state; the host has
    // already logged a faulted outcome.
    SyncHost::new(Arc::new(snapshot)).run().await?;
    Ok(ExitCode::SUCCESS)
}

fn check_config(snapshot: &ConfigSnapshot) -> Result<ExitCode> {
    tracing::info!("Checking configuration...");
    snapshot
        .bind::<HostOptions>()
        .context("invalid Host section")?;
    print_effective_config(snapshot)?;
    println!("Configuration is valid");
    Ok(ExitCode::SUCCESS)
}

fn print_effective_config(snapshot: &ConfigSnapshot) -> Result<()> {
    let client = snapshot.bind::<ClientConfig>()?;
    let store = snapshot.bind::<StoreConfig>()?;
    let sync = snapshot.bind::<SyncOptions>()?;
    let rendered = render_effective_config(&client, &store, &sync)?;
    println!("Effective configuration:\n{}", serde_json::to_string_pretty(&rendered)?);
    Ok(())
}
