//! # Grafter
//!
//! The main binary for the Grafter graph-analysis engine.
//!
//! This application provides:
//! - HTTP REST API server (axum-based) over the command engine
//! - CLI interface for applying and checking transform chains
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                  apps/grafter (THE BINARY)               │
//! │                                                          │
//! │   ┌─────────────┐    ┌─────────────┐    ┌────────────┐   │
//! │   │    CLI      │    │  HTTP API   │    │  Settings  │   │
//! │   │   (clap)    │    │   (axum)    │    │   (toml)   │   │
//! │   └──────┬──────┘    └──────┬──────┘    └─────┬──────┘   │
//! │          └──────────────────┼─────────────────┘          │
//! │                             ▼                            │
//! │                     ┌───────────────┐                    │
//! │                     │ grafter-core  │                    │
//! │                     │ (THE ENGINE)  │                    │
//! │                     └───────────────┘                    │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! grafter server --graph graph.json --port 8080
//! grafter run --graph graph.json --transforms chain.toml
//! grafter check --transforms chain.toml
//! ```

use clap::Parser;
use grafter::cli;
use grafter::settings::{LogFormat, Settings};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

#[tokio::main]
async fn main() {
    let cli = cli::Cli::parse();

    let settings = match Settings::load(cli.config.as_deref()) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    init_tracing(settings.log_format, cli.verbose);

    if !cli.quiet && !cli.json_mode {
        print_banner();
    }

    if let Err(e) = cli::execute(cli, settings).await {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}

/// GRAFTER_LOG (or RUST_LOG) selects the filter; `log_format = "json"` enables
/// machine-parseable output. Logs go to stderr so `--json-mode` output stays clean.
fn init_tracing(format: LogFormat, verbose: bool) {
    let default_filter = if verbose {
        "grafter=debug,grafter_core=debug,tower_http=debug"
    } else {
        "grafter=info,grafter_core=info,tower_http=info"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_env("GRAFTER_LOG")
        .or_else(|_| tracing_subscriber::EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| default_filter.into());

    match format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(std::io::stderr),
                )
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
}

fn print_banner() {
    println!(
        r#"
   __ _ _ __ __ _ / _| |_ ___ _ __
  / _` | '__/ _` | |_| __/ _ \ '__|
 | (_| | | | (_| |  _| ||  __/ |
  \__, |_|  \__,_|_|  \__\___|_|
  |___/

  Graph analysis engine v{}
"#,
        env!("CARGO_PKG_VERSION")
    );
}
