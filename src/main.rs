//! symdex CLI entry point

use clap::Parser;
use symdex::cli::{self, Cli};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_env("SYMDEX_LOG"))
        .init();

    cli::run(Cli::parse()).await
}
