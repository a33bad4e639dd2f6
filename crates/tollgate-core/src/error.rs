use std::net::SocketAddr;

use thiserror::Error;

/// Errors raised while decoding or validating configuration input.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Unknown client auth level `{0}`")]
    UnknownLevel(String),

    #[error("Error in `{field}`: {message}")]
    ParseError { field: String, message: String },

    #[error("Failed to serialize configuration: {0}")]
    SerializeError(String),
}

/// Errors raised while turning a `TlsIdentity` into a server configuration.
///
/// Every variant is fatal to startup: a listener must never run with a
/// partially assembled configuration.
#[derive(Error, Debug)]
pub enum AssemblyError {
    #[error("Failed to load certificate `{cert}` with key `{key}`: {message}")]
    CertLoad {
        cert: String,
        key: String,
        message: String,
    },

    #[error("Failed to load client CA bundle `{path}`: {message}")]
    CaPool { path: String, message: String },

    #[error("Failed to initialize TLS: {0}")]
    TlsInitializationFailed(String),
}

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("TLS configuration assembly failed: {0}")]
    Assembly(#[from] AssemblyError),

    #[error("Failed to bind listener on {address}: {source}")]
    FailedToBind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to accept connection, reason: {0}")]
    FailedToAcceptConnection(std::io::Error),

    #[error("TLS handshake with {peer} failed: {message}")]
    HandshakeFailed { peer: SocketAddr, message: String },

    #[error("No TLS certificate and key configured; refusing to start a plaintext listener")]
    MissingTlsIdentity,

    #[error("Timed out waiting for open connections to close")]
    TimeoutWaitingForConnections,
}
