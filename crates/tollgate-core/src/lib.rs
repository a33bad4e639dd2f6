//! Mutual-TLS listener core.
//!
//! A [`TlsIdentity`](config::TlsIdentity) describes where the server
//! certificate, key and client CA bundle live and how strictly client
//! certificates are checked. [`tls::assemble`] turns it into a shared,
//! read-only [`AssembledConfig`](tls::AssembledConfig), and
//! [`server::TlsListener`] derives a fresh rustls configuration from it for
//! every incoming handshake.

pub mod config;
pub mod error;
pub mod server;
pub mod tls;
