// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Observe main entry point - CLI and commands.

use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;

use observe::config::{self, CliOptions, LogFormat};
use observe::demo::DemoApp;
use observe::telemetry::{init_telemetry, TelemetryConfig, GLOBAL_METRICS};

/// Observe version string.
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Observe - observation context propagation.
#[derive(Parser)]
#[command(name = "observe")]
#[command(author, version, about = "Observation context propagation", long_about = None)]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "OBSERVE_LOG_LEVEL")]
    log_level: Option<String>,

    /// Log line layout
    #[arg(long, value_enum)]
    log_format: Option<Format>,

    /// Mirror observations as tracing spans
    #[arg(long)]
    spans: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Log line layouts accepted on the command line.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum Format {
    Compact,
    Full,
}

impl From<Format> for LogFormat {
    fn from(format: Format) -> Self {
        match format {
            Format::Compact => LogFormat::Compact,
            Format::Full => LogFormat::Full,
        }
    }
}

/// Subcommands for observe.
#[derive(Subcommand)]
enum Commands {
    /// Run the user-name demo through the request adapter
    Demo {
        /// User id to look up
        #[arg(short, long, default_value = "1")]
        user_id: String,

        /// Number of concurrent requests
        #[arg(short, long, default_value_t = 1)]
        requests: usize,

        /// Ceiling for the simulated service latency
        #[arg(long, env = "OBSERVE_MAX_LATENCY_MS")]
        max_latency_ms: Option<u64>,
    },

    /// Show configuration
    Config {
        #[command(subcommand)]
        action: Option<ConfigAction>,
    },

    /// Initialize a new configuration file
    Init,

    /// Show version information
    Version,
}

/// Config subcommand actions.
#[derive(Subcommand)]
enum ConfigAction {
    /// Show current configuration
    Show,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut cli_options = CliOptions {
        log_level: cli.log_level,
        log_format: cli.log_format.map(LogFormat::from),
        spans: if cli.spans { Some(true) } else { None },
        max_latency_ms: None,
    };

    match cli.command {
        Commands::Demo {
            user_id,
            requests,
            max_latency_ms,
        } => {
            cli_options.max_latency_ms = max_latency_ms;
            run_demo(cli_options, &user_id, requests).await
        }
        Commands::Config { action } => {
            let workspace_root = std::env::current_dir()?;
            match action {
                Some(ConfigAction::Show) | None => {
                    let config = config::load_config(&workspace_root, cli_options)?;
                    println!("{}", serde_json::to_string_pretty(&config)?);
                }
            }
            Ok(())
        }
        Commands::Init => {
            let workspace_root = std::env::current_dir()?;
            let path = config::init_config(&workspace_root, None)?;
            println!("Created config file: {}", path.display());
            Ok(())
        }
        Commands::Version => {
            println!("observe {}", VERSION);
            Ok(())
        }
    }
}

async fn run_demo(cli_options: CliOptions, user_id: &str, requests: usize) -> anyhow::Result<()> {
    let workspace_root = std::env::current_dir()?;
    let workspace_root = config::find_workspace_root(&workspace_root).unwrap_or(workspace_root);
    let config = config::load_config(&workspace_root, cli_options)?;

    let _guard = init_telemetry(&TelemetryConfig::from_resolved(&config))?;

    let registry = Arc::new(config.build_registry(&GLOBAL_METRICS));
    let app = DemoApp::new(&config, &registry);

    println!(
        "{} Sending {} request(s) for user {}",
        "→".cyan(),
        requests,
        user_id.bright_white()
    );

    let responses = app.run(user_id, requests).await?;
    let succeeded = responses.iter().filter(|r| r.status < 400).count();
    for response in &responses {
        let status = if response.status < 400 {
            response.status.to_string().green()
        } else {
            response.status.to_string().red()
        };
        println!("  {} {}", status, response.body);
    }
    println!(
        "{} {}/{} succeeded\n",
        "✓".green(),
        succeeded,
        responses.len()
    );

    print!("{}", GLOBAL_METRICS.snapshot().format_report());
    Ok(())
}
