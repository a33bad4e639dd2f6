use std::path::Path;

use serde::{Deserialize, Serialize};

use super::AuthLevel;

/// Where the server's TLS material lives and how client certificates are
/// checked.
///
/// This is plain data: nothing is read from disk until the identity is handed
/// to [`crate::tls::assemble`]. Key material is referenced by path so that
/// identities stay cheap to clone, compare and log.
///
/// # Example
/// ```
/// use tollgate::config::{AuthLevel, TlsIdentity};
///
/// let identity = TlsIdentity::new("./certs/server.pem", "./certs/server.key")
///     .with_ca("./certs/clients-ca.pem")
///     .with_level(AuthLevel::RequireAndVerifyClientCertAndSan);
///
/// assert!(!identity.is_empty());
/// ```
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TlsIdentity {
    /// Path to the PEM certificate chain, leaf first
    pub cert: String,
    /// Path to the PEM private key
    pub key: String,
    /// Path to the PEM bundle of CAs trusted to sign client certificates
    pub ca: String,
    /// Disable every client certificate check. Meant for local development only.
    pub insecure: bool,
    /// Client certificate policy
    pub level: AuthLevel,
}

impl TlsIdentity {
    /// Creates an identity with the given certificate and key paths and the
    /// default (unset) client auth level.
    pub fn new(cert: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            cert: cert.into(),
            key: key.into(),
            ..Default::default()
        }
    }

    /// Sets the client CA bundle path.
    pub fn with_ca(mut self, ca: impl Into<String>) -> Self {
        self.ca = ca.into();
        self
    }

    /// Sets the client auth level.
    pub fn with_level(mut self, level: AuthLevel) -> Self {
        self.level = level;
        self
    }

    /// Turns off client certificate checks entirely.
    pub fn insecure(mut self, insecure: bool) -> Self {
        self.insecure = insecure;
        self
    }

    /// An empty identity means TLS is disabled. Callers must check this before
    /// assembling a configuration.
    pub fn is_empty(&self) -> bool {
        self.cert.is_empty() && self.key.is_empty()
    }

    /// Structural equality over all five fields, used to detect no-op reloads.
    pub fn same_as(&self, other: &TlsIdentity) -> bool {
        self == other
    }

    pub fn cert_path(&self) -> &Path {
        Path::new(&self.cert)
    }

    pub fn key_path(&self) -> &Path {
        Path::new(&self.key)
    }

    /// Returns the CA path, or `None` when no bundle is configured.
    pub fn ca_path(&self) -> Option<&Path> {
        if self.ca.is_empty() {
            None
        } else {
            Some(Path::new(&self.ca))
        }
    }
}
