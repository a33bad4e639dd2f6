use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use clap::{Parser, Subcommand};
use log::{LevelFilter, debug, warn};
use tokio::io::AsyncWriteExt;
use tollgate::{
    config::{Config, LogLevel},
    error::ServerError,
    server::{Connection, Server},
    tls,
};

use crate::{error::CliError, format::FormatType};

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Start an mTLS listener that greets every authenticated peer
    Run {
        /// Path to the configuration file
        #[arg(short, long, default_value = "tollgate.toml")]
        config: PathBuf,
    },

    /// Assemble the TLS configuration and report the policy it enforces
    Check {
        /// Path to the configuration file
        #[arg(short, long, default_value = "tollgate.toml")]
        config: PathBuf,
    },

    /// Print the version of the Tollgate CLI
    Version,
}

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[arg(short, long)]
    /// The log level for the application
    log_level: Option<LogLevel>,

    #[clap(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn new() -> Self {
        let cli = Cli::parse();

        // Filtering happens through `log::set_max_level`, which `load_config` adjusts
        env_logger::Builder::new()
            .filter_level(LevelFilter::Trace)
            .init();
        log::set_max_level(cli.log_level(None));

        cli
    }

    // NOTE: the `--log-level` flag always overrides the level set in the configuration file
    fn log_level(&self, config: Option<&Config>) -> LevelFilter {
        self.log_level
            .or_else(|| config.and_then(|c| c.log_level))
            .unwrap_or_default()
            .into()
    }

    fn load_config(&self, path: &Path) -> Result<Config, CliError> {
        let config = load_config(path)?;
        log::set_max_level(self.log_level(Some(&config)));
        Ok(config)
    }

    pub async fn execute(&self) -> Result<(), CliError> {
        match &self.command {
            Commands::Run { config } => {
                let config = self.load_config(config)?;

                if config.tls.is_empty() {
                    return Err(ServerError::MissingTlsIdentity.into());
                }

                let server = Server::new(Arc::new(config), greet);
                server.run().await?;
            }

            Commands::Check { config } => {
                let config = self.load_config(config)?;

                if config.tls.is_empty() {
                    return Err(ServerError::MissingTlsIdentity.into());
                }

                let assembled = tls::assemble(&config.tls)?;
                println!("address:      {}", config.socket_address());
                println!("level:        {}", assembled.effective_level());
                println!("client auth:  {:?}", assembled.client_auth());
                println!("CA pool:      {}", assembled.has_ca_pool());
                println!("insecure:     {}", assembled.is_insecure());
            }

            Commands::Version => {
                println!("tollgate {}", env!("CARGO_PKG_VERSION"));
            }
        }

        Ok(())
    }
}

fn load_config(path: &Path) -> Result<Config, CliError> {
    let input = std::fs::read_to_string(path).map_err(|source| CliError::Read {
        path: path.display().to_string(),
        source,
    })?;

    let format = FormatType::from_path(path)?;
    Ok(format.format(&input).parse()?)
}

async fn greet(mut connection: Connection) {
    let name = connection
        .peer
        .as_ref()
        .map(|peer| peer.display_name())
        .unwrap_or_else(|| "anonymous".to_string());

    if let Err(e) = connection
        .stream
        .write_all(format!("hello {name}\n").as_bytes())
        .await
    {
        warn!("Failed to greet {}: {e}", connection.peer_addr);
        return;
    }

    if let Err(e) = connection.stream.shutdown().await {
        debug!("Failed to close connection to {}: {e}", connection.peer_addr);
    }
}
