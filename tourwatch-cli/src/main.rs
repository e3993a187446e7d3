//! Binary crate for the `tourwatch` command-line tool.
//!
//! This crate focuses on:
//! - Parsing CLI arguments into a simulated tourist
//! - Interactive configuration
//! - Human-friendly and JSON rendering of monitoring cycles

use std::env;

use clap::Parser;
use tracing_subscriber::filter::EnvFilter;

mod cli;
mod output;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cmd = cli::Cli::parse();
    init_tracing(cmd.verbose);
    cmd.run().await
}

/// Install the global tracing subscriber, writing to stderr.
///
/// `RUST_LOG` wins when set; otherwise `TOURWATCH_LOG_LEVEL` picks the level
/// (default `info`, or `debug` with `--verbose`).
fn init_tracing(verbose: bool) {
    let env_filter = if env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        let level = match env::var("TOURWATCH_LOG_LEVEL").ok().as_deref() {
            Some("trace") => "trace",
            Some("debug") => "debug",
            Some("info") => "info",
            Some("warn") => "warn",
            Some("error") => "error",
            _ if verbose => "debug",
            _ => "info",
        };
        EnvFilter::new(format!("{level},hyper=warn,reqwest=warn"))
    };

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_env_filter(env_filter)
        .compact()
        .init();
}
