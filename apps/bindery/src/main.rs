//! # Bindery - Semantic/Geometry Synchronization
//!
//! The main binary for the Bindery synchronization engine.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                 apps/bindery (THE BINARY)                │
//! │                                                          │
//! │  ┌─────────────┐   ┌──────────────┐   ┌──────────────┐  │
//! │  │    CLI      │   │   Project    │   │    Config    │  │
//! │  │   (clap)    │   │   (JSON)     │   │    (TOML)    │  │
//! │  └──────┬──────┘   └──────┬───────┘   └──────┬───────┘  │
//! │         └─────────────────┼──────────────────┘          │
//! │                           ▼                             │
//! │                  ┌─────────────────┐                    │
//! │                  │  bindery-core   │                    │
//! │                  │  (THE LOGIC)    │                    │
//! │                  └─────────────────┘                    │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! bindery check project.json
//! bindery sync project.json --async-updates --json-mode
//! bindery mirror project.json --config bindery.toml
//! ```

use bindery::cli;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

fn main() {
    // Parse CLI arguments
    let cli = cli::Cli::parse();

    // Initialize tracing: BINDERY_LOG_FORMAT=json enables machine-parseable output.
    // Logs go to stderr so `--json-mode` output stays clean.
    let log_format = std::env::var("BINDERY_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    let default_filter = if cli.verbose {
        "bindery=debug,bindery_core=debug"
    } else {
        "bindery=info,bindery_core=info"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.into());

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }

    // Display startup banner
    if !cli.quiet && !cli.json_mode {
        print_banner();
    }

    // Execute command
    if let Err(e) = cli::execute(cli) {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Print the Bindery startup banner.
fn print_banner() {
    println!(
        r#"
  ┳┓•   ┓
  ┣┫┓┏┓┏┫┏┓┏┓┓┏
  ┻┛┗┛┗┗┻┗ ┛ ┗┫
              ┛
  Semantic/Geometry Synchronization v{}
"#,
        env!("CARGO_PKG_VERSION")
    );
}
