//! Butler reverse proxy binary.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use butler::config::{load_config, load_config_from_env, ButlerConfig, ConfigError};
use butler::lifecycle::{signals, startup};
use butler::observability::logging;

#[derive(Parser, Debug)]
#[command(name = "butler", version, about = "Host-routed HTTP(S) reverse proxy")]
struct Cli {
    /// Configuration file (TOML, or JSON with a .json extension).
    #[arg(short, long, conflicts_with = "config_env")]
    config: Option<PathBuf>,

    /// Environment variable holding the configuration as JSON.
    #[arg(long, value_name = "VAR")]
    config_env: Option<String>,
}

impl Cli {
    fn load(&self) -> Result<ButlerConfig, ConfigError> {
        match (&self.config, &self.config_env) {
            (Some(path), _) => load_config(path),
            (None, Some(var)) => load_config_from_env(var),
            (None, None) => Ok(ButlerConfig::default()),
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match cli.load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("butler: {e}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = logging::init(&config.observability) {
        eprintln!("butler: failed to initialize logging: {e}");
        return ExitCode::FAILURE;
    }

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        mode = ?config.mode,
        bind_address = %config.listener.bind_address,
        tls = config.tls.is_some(),
        routes = config.targets.len(),
        "butler starting"
    );

    match startup::start(&config, signals::wait_for_termination()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %butler::http::response::error_chain(&e), "Fatal error");
            ExitCode::FAILURE
        }
    }
}
