use std::net::SocketAddr;

use log::debug;
use rustls::server::Acceptor;
use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tokio_rustls::{LazyConfigAcceptor, server::TlsStream};

use crate::{
    config::TlsIdentity,
    error::ServerError,
    tls::{self, AssembledConfig, HandshakeAuthenticator, HandshakeInfo},
};

/// A TCP listener that completes an mTLS handshake on every connection.
#[derive(Debug)]
pub struct TlsListener {
    listener: TcpListener,
    config: AssembledConfig,
}

impl TlsListener {
    /// Assemble the TLS configuration for `identity`, then bind `address`.
    ///
    /// Assembly runs first so a bad certificate or CA bundle never leaves a
    /// bound socket behind.
    pub async fn bind(
        address: impl ToSocketAddrs + std::fmt::Debug,
        identity: &TlsIdentity,
    ) -> Result<Self, ServerError> {
        if identity.is_empty() {
            return Err(ServerError::MissingTlsIdentity);
        }

        let config = tls::assemble(identity)?;

        let label = format!("{address:?}");
        let listener = TcpListener::bind(address)
            .await
            .map_err(|source| ServerError::FailedToBind {
                address: label,
                source,
            })?;

        Ok(Self::from_parts(listener, config))
    }

    /// Wrap an already bound listener.
    pub fn from_parts(listener: TcpListener, config: AssembledConfig) -> Self {
        Self { listener, config }
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn config(&self) -> &AssembledConfig {
        &self.config
    }

    /// Accept the next TCP connection.
    ///
    /// The handshake is not performed here; run [`Incoming::handshake`] on its
    /// own task so one slow client cannot hold up the accept loop.
    pub async fn accept(&self) -> Result<Incoming, ServerError> {
        let (stream, peer_addr) = self
            .listener
            .accept()
            .await
            .map_err(ServerError::FailedToAcceptConnection)?;
        debug!("Accepted connection from {peer_addr}");

        Ok(Incoming {
            stream,
            peer_addr,
            authenticator: self.config.authenticator().clone(),
        })
    }
}

/// A connection whose TLS handshake has not started yet.
#[derive(Debug)]
pub struct Incoming {
    stream: TcpStream,
    peer_addr: SocketAddr,
    authenticator: HandshakeAuthenticator,
}

impl Incoming {
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    /// Read the ClientHello, derive this connection's configuration and
    /// complete the handshake.
    ///
    /// Any verification failure ends this connection only.
    pub async fn handshake(self) -> Result<TlsStream<TcpStream>, ServerError> {
        let peer = self.peer_addr;
        let failed = |message: String| ServerError::HandshakeFailed { peer, message };

        let start = LazyConfigAcceptor::new(Acceptor::default(), self.stream)
            .await
            .map_err(|e| failed(e.to_string()))?;

        let info = HandshakeInfo::new(peer).with_server_name(start.client_hello().server_name());
        let config = self
            .authenticator
            .config_for(&info)
            .map_err(|e| failed(e.to_string()))?;

        let stream = start
            .into_stream(config)
            .await
            .map_err(|e| failed(e.to_string()))?;
        debug!(
            "Completed TLS handshake with {peer} (server name: {})",
            info.server_name.as_deref().unwrap_or("<none>")
        );

        Ok(stream)
    }
}
