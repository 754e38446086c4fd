//! # Panopticon Load Test CLI
//!
//! Command-line interface for running virtual-session load against the
//! Panopticon task API.
//!
//! ## Usage
//!
//! ```bash
//! # Ten sessions, default 3:2:1:1 list/create/update/delete mix, until Ctrl+C
//! panopticon-loadtest --target http://localhost:8080
//!
//! # Fixed run with a reproducible seed and JSON results
//! panopticon-loadtest --users 100 --spawn-rate 10 --run-time 300 --seed 7 --output results.json
//!
//! # Show the effective configuration
//! panopticon-loadtest --config loadtest.toml config
//! ```

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use panopticon_loadtest::prelude::*;
use panopticon_loadtest::build_http_client;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "panopticon-loadtest")]
#[command(version)]
#[command(about = "Virtual-session load generator for the Panopticon task API", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// TOML configuration file; flags below override its values
    #[arg(short, long, env = "PANOPTICON_LOADTEST_CONFIG")]
    config: Option<PathBuf>,

    /// Target base URL
    #[arg(short, long, env = "PANOPTICON_TARGET")]
    target: Option<String>,

    /// Number of concurrent sessions
    #[arg(short, long)]
    users: Option<usize>,

    /// Sessions started per second
    #[arg(short = 'r', long)]
    spawn_rate: Option<f64>,

    /// Stop after this many seconds
    #[arg(long)]
    run_time: Option<u64>,

    /// Minimum think time in seconds
    #[arg(long)]
    min_wait: Option<f64>,

    /// Maximum think time in seconds
    #[arg(long)]
    max_wait: Option<f64>,

    /// Seed for reproducible session randomness
    #[arg(long)]
    seed: Option<u64>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Emit logs as JSON
    #[arg(long)]
    log_json: bool,

    /// Output results to JSON file
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the load test (default)
    Run,

    /// Print the effective configuration as TOML and exit
    Config,
}

impl Cli {
    /// File config (or defaults) with command-line overrides applied
    fn load_config(&self) -> anyhow::Result<LoadTestConfig> {
        let mut config = match &self.config {
            Some(path) => LoadTestConfig::load(path)
                .with_context(|| format!("loading {}", path.display()))?,
            None => LoadTestConfig::default(),
        };

        if let Some(target) = &self.target {
            config.target_url = target.clone();
        }
        if let Some(users) = self.users {
            config.users = users;
        }
        if let Some(spawn_rate) = self.spawn_rate {
            config.spawn_rate = spawn_rate;
        }
        if let Some(run_time) = self.run_time {
            config.run_time_secs = Some(run_time);
        }
        if let Some(min_wait) = self.min_wait {
            config.session.min_wait_secs = min_wait;
        }
        if let Some(max_wait) = self.max_wait {
            config.session.max_wait_secs = max_wait;
        }
        if let Some(seed) = self.seed {
            config.seed = Some(seed);
        }

        config.validate()?;
        Ok(config)
    }
}

fn init_logging(verbose: bool, json: bool) {
    let env_filter = if verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    let registry = tracing_subscriber::registry().with(env_filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer().with_target(false)).init();
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.log_json);

    let config = cli.load_config()?;

    if let Some(Commands::Config) = cli.command {
        print!("{}", config.to_toml()?);
        return Ok(());
    }

    info!("Panopticon load test v{}", env!("CARGO_PKG_VERSION"));

    let http = build_http_client(config.request_timeout(), config.users)
        .map_err(|e| LoadTestError::ClientSetup(e.to_string()))?;
    let target = config.target_url.clone();

    let pool = SessionPool::new(config)?;
    let report = pool
        .run(
            |_| HttpApiClient::new(http.clone(), target.clone()),
            shutdown_signal(),
        )
        .await?;

    report.summary.log();

    if let Some(output_path) = cli.output {
        let json = serde_json::to_string_pretty(&report.summary)?;
        std::fs::write(&output_path, json)
            .with_context(|| format!("writing {}", output_path.display()))?;
        info!("Results saved to {}", output_path.display());
    }

    Ok(())
}
