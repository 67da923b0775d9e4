//! hello-httpd
//!
//! Answers every TCP connection with a fixed `Hello, world!` HTTP response
//! and closes it.
//!
//! # Architecture Overview
//!
//! ```text
//!                  ┌──────────────────────────────────────────────┐
//!                  │                 hello-httpd                  │
//!                  │                                              │
//!   TCP client     │  ┌────────────┐  events  ┌────────────────┐  │
//!   ───────────────┼─▶│ net engine │─────────▶│    reactor     │  │
//!                  │  │ + sockets  │          │ (single task)  │  │
//!                  │  └─────▲──────┘          └───────┬────────┘  │
//!                  │        │ primitives              │           │
//!                  │        │                         ▼           │
//!                  │        │                 ┌────────────────┐  │
//!                  │        └─────────────────│  httpd handler │  │
//!                  │                          │  (sessions)    │  │
//!                  │                          └────────────────┘  │
//!                  │                                              │
//!                  │  config · observability · lifecycle          │
//!                  └──────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;

use hello_httpd::config::{load_config, ServerConfig};
use hello_httpd::lifecycle::{self, signals, Shutdown};
use hello_httpd::observability::logging;

#[derive(Parser)]
#[command(name = "hello-httpd")]
#[command(about = "Fixed-response HTTP responder", long_about = None)]
struct Cli {
    /// TOML configuration file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the listener bind address (e.g. 0.0.0.0:8080).
    #[arg(short, long)]
    bind: Option<String>,

    /// Override the log level (trace, debug, info, warn, error).
    #[arg(short, long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ServerConfig::default(),
    };
    if let Some(bind) = cli.bind {
        config.listener.bind_address = bind;
    }
    if let Some(level) = cli.log_level {
        config.observability.log_level = level;
    }

    logging::init_logging(&config.observability.log_level);
    tracing::info!(
        bind_address = %config.listener.bind_address,
        max_sessions = config.listener.max_sessions,
        tick_ms = config.timeouts.tick_ms,
        "hello-httpd v0.1.0 starting"
    );

    let shutdown = Shutdown::new();
    let server = lifecycle::launch(&config, &shutdown)?;

    signals::wait_for_signal().await;
    shutdown.trigger();
    server.join().await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
