// TLS module: policy assembly, client verification and per-handshake configuration

pub mod assembler;
pub mod client_auth;
pub mod handshake;
pub mod peer;
pub mod pem;
pub mod san;

pub use assembler::{AssembledConfig, assemble, crypto_provider, effective_level};
pub use client_auth::ClientAuth;
pub use handshake::{HandshakeAuthenticator, HandshakeInfo};
pub use peer::PeerIdentity;
pub use san::{SanBoundVerifier, peer_host, san_matches_host};
