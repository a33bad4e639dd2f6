pub(crate) mod cli;
pub(crate) mod error;
pub(crate) mod format;

use crate::error::CliError;

/// The line printed to stderr when a command fails.
pub(crate) fn report(error: &CliError) -> String {
    format!("\x1b[91m[Error] {error}\x1b[0m")
}

#[tokio::main]
async fn main() {
    let cli = cli::Cli::new();

    if let Err(e) = cli.execute().await {
        eprintln!("{}", report(&e));
        std::process::exit(1);
    }
}
