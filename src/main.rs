use std::path::Path;
use std::time::Duration;

use clap::Parser;
use eyre::Result;
use log::{info, warn};

mod cli;

use cli::Cli;
use ytx_server::config::{Config, ServerConfig};
use ytx_server::server::Server;

fn setup_logging(log_file: Option<&Path>) -> Result<()> {
    let mut builder = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));

    if let Some(path) = log_file {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }
        let target = Box::new(std::fs::OpenOptions::new().create(true).append(true).open(path)?);
        builder.target(env_logger::Target::Pipe(target));
    }

    builder.init();

    if let Some(path) = log_file {
        info!("Logging initialized: {}", path.display());
    }
    Ok(())
}

/// CLI flags and env vars win over the config file
fn resolve_config(cli: &Cli, file: Config) -> ServerConfig {
    let mut config = ServerConfig::from_file(file);
    if let Some(port) = cli.port {
        config.port = port;
    }
    if let Some(ref bind) = cli.bind {
        config.bind = bind.clone();
    }
    if let Some(ref dir) = cli.scratch_dir {
        config.scratch_dir = dir.clone();
    }
    if let Some(secs) = cli.timeout {
        config.request_timeout = Duration::from_secs(secs);
    }
    config
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.log_file.as_deref())?;

    info!("ytx-server {} starting", env!("GIT_DESCRIBE"));

    // Load config file (non-fatal if missing/invalid)
    let file = Config::load(cli.config.as_deref()).unwrap_or_else(|e| {
        warn!("Ignoring config file: {e:#}");
        Config::default()
    });

    let config = resolve_config(&cli, file);
    info!("Configuration: {config:?}");

    Server::new(config)?.run().await
}
