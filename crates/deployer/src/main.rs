use anyhow::Result;
use clap::Parser;
use deployer::{execute, Cli};
use log::{debug, error, LevelFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let log_level = match cli.log_level.as_str() {
        "error" => LevelFilter::Error,
        "warn" => LevelFilter::Warn,
        "info" => LevelFilter::Info,
        "debug" => LevelFilter::Debug,
        "trace" => LevelFilter::Trace,
        _ => LevelFilter::Info,
    };
    env_logger::Builder::new()
        .filter_level(log_level)
        .format_timestamp(None)
        .init();
    debug!("Log level: {log_level}");

    if let Err(e) = execute(cli).await {
        error!("{e:#}");
        std::process::exit(1);
    }
    Ok(())
}
