use thiserror::Error;

#[derive(Error, Debug)]
pub(crate) enum CliError {
    #[error("Failed to read the configuration file `{path}`: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{0}")]
    Config(#[from] tollgate::error::ConfigError),

    #[error("{0}")]
    Assembly(#[from] tollgate::error::AssemblyError),

    #[error("{0}")]
    Server(#[from] tollgate::error::ServerError),

    #[error("{0}")]
    Generic(String),
}
