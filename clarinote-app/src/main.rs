mod cli;
mod config;

use anyhow::Result;
use clap::Parser;
use tokio::runtime::Runtime;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use cli::commands::run_cli;
use cli::opts::Cli;
use config::Config;

fn main() -> Result<()> {
    let args = Cli::parse();
    let config = Config::load(&args);

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    tracing::debug!(data_file = ?config.data_file, "using store");

    let rt = Runtime::new()?;
    rt.block_on(run_cli(args, config))
}
