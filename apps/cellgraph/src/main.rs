//! # cellgraph
//!
//! Congestion prediction over a cell connectivity graph.
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │             apps/cellgraph (THE BINARY)      │
//! │                                              │
//! │   ┌─────────────┐        ┌───────────────┐   │
//! │   │    CLI      │        │   HTTP API    │   │
//! │   │   (clap)    │        │    (axum)     │   │
//! │   └──────┬──────┘        └───────┬───────┘   │
//! │          └───────────┬───────────┘           │
//! │                      ▼                       │
//! │              ┌────────────────┐              │
//! │              │ cellgraph-core │              │
//! │              │ pipeline+store │              │
//! │              └────────────────┘              │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! cellgraph init
//! cellgraph simulate --cells 50 --chords 10
//! cellgraph run
//! cellgraph server --port 8080
//! ```

use cellgraph::cli;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    // CELLGRAPH_LOG_FORMAT=json switches to machine-parseable output.
    let log_format = std::env::var("CELLGRAPH_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "cellgraph=info,cellgraph_core=info,tower_http=debug".into());

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
        }
    }

    let cli = cli::Cli::parse();

    if !cli.quiet && !cli.json_mode {
        print_banner();
    }

    if let Err(e) = cli::execute(cli).await {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}

fn print_banner() {
    println!(
        r#"
   ┌─┐┌─┐┬  ┬  ┌─┐┬─┐┌─┐┌─┐┬ ┬
   │  ├┤ │  │  │ ┬├┬┘├─┤├─┘├─┤
   └─┘└─┘┴─┘┴─┘└─┘┴└─┴ ┴┴  ┴ ┴

  cellgraph v{}  congestion prediction for cellular networks
"#,
        env!("CARGO_PKG_VERSION")
    );
}
