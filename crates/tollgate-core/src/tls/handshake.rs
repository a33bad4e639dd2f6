// Per-handshake configuration derivation

use std::{net::SocketAddr, sync::Arc};

use rustls::{
    RootCertStore, ServerConfig,
    crypto::CryptoProvider,
    server::{ResolvesServerCert, danger::ClientCertVerifier},
};

use crate::config::AuthLevel;

use super::{
    assembler::PROTOCOL_VERSIONS,
    san::{SanBoundVerifier, peer_host},
};

/// What is known about a connection when its handshake starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeInfo {
    /// Transport address of the remote peer
    pub peer_addr: SocketAddr,
    /// SNI sent in the ClientHello, if any
    pub server_name: Option<String>,
}

impl HandshakeInfo {
    pub fn new(peer_addr: SocketAddr) -> Self {
        Self {
            peer_addr,
            server_name: None,
        }
    }

    pub fn with_server_name(mut self, server_name: Option<&str>) -> Self {
        self.server_name = server_name.map(str::to_owned);
        self
    }
}

/// Everything the authenticator closes over. Built once by the assembler and
/// never written again.
#[derive(Debug)]
pub(crate) struct Material {
    pub(crate) provider: Arc<CryptoProvider>,
    pub(crate) cert_resolver: Arc<dyn ResolvesServerCert>,
    pub(crate) roots: Option<Arc<RootCertStore>>,
    pub(crate) level: AuthLevel,
    /// Verifier for the native requirement of `level`; `None` means no client
    /// certificate is requested.
    pub(crate) verifier: Option<Arc<dyn ClientCertVerifier>>,
}

impl Material {
    pub(crate) fn server_config(
        &self,
        verifier: Option<Arc<dyn ClientCertVerifier>>,
    ) -> Result<ServerConfig, rustls::Error> {
        let builder = ServerConfig::builder_with_provider(Arc::clone(&self.provider))
            .with_protocol_versions(PROTOCOL_VERSIONS)?;

        let builder = match verifier {
            Some(verifier) => builder.with_client_cert_verifier(verifier),
            None => builder.with_no_client_auth(),
        };

        Ok(builder.with_cert_resolver(Arc::clone(&self.cert_resolver)))
    }
}

/// Derives the rustls configuration used for one handshake.
///
/// Cloning is cheap and every clone shares the same immutable material, so
/// the authenticator can be handed to as many concurrent handshakes as needed.
#[derive(Debug, Clone)]
pub struct HandshakeAuthenticator {
    material: Arc<Material>,
    /// Configuration shared by every handshake. `None` at the SAN-bound level,
    /// where no configuration is valid without knowing the peer.
    base: Option<Arc<ServerConfig>>,
}

impl HandshakeAuthenticator {
    pub(crate) fn new(material: Arc<Material>) -> Result<Self, rustls::Error> {
        let base = if material.level.checks_san() {
            None
        } else {
            Some(Arc::new(material.server_config(material.verifier.clone())?))
        };

        Ok(Self { material, base })
    }

    /// The configuration to complete the handshake described by `info` with.
    ///
    /// Below `RequireAndVerifyClientCertAndSan` the shared base configuration
    /// is returned as is. At that level a new configuration is built whose
    /// verifier only accepts certificates naming the peer's address.
    pub fn config_for(&self, info: &HandshakeInfo) -> Result<Arc<ServerConfig>, rustls::Error> {
        if let Some(base) = &self.base {
            return Ok(Arc::clone(base));
        }

        let inner = self.material.verifier.clone().ok_or_else(|| {
            rustls::Error::General("SAN-bound level assembled without a verifier".to_string())
        })?;
        let verifier = SanBoundVerifier::new(inner, peer_host(&info.peer_addr));

        Ok(Arc::new(self.material.server_config(Some(Arc::new(verifier)))?))
    }

    /// The shared configuration, if one exists for this level.
    pub fn shared_config(&self) -> Option<Arc<ServerConfig>> {
        self.base.clone()
    }

    pub fn level(&self) -> AuthLevel {
        self.material.level
    }
}
