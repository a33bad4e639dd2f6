// Turns a TlsIdentity into a shared, read-only server configuration

use std::sync::Arc;

use log::{debug, info, warn};
use rustls::{
    RootCertStore, ServerConfig, SupportedCipherSuite, SupportedProtocolVersion,
    crypto::{
        CryptoProvider, SupportedKxGroup,
        aws_lc_rs::{self, cipher_suite, kx_group},
    },
    version,
};

use crate::{
    config::{AuthLevel, TlsIdentity},
    error::AssemblyError,
};

use super::{
    client_auth::ClientAuth,
    handshake::{HandshakeAuthenticator, Material},
    pem,
};

/// TLS 1.2 is the minimum and TLS 1.3 the maximum.
pub static PROTOCOL_VERSIONS: &[&SupportedProtocolVersion] = &[&version::TLS13, &version::TLS12];

/// The cipher-suite allow-list: every TLS 1.3 AEAD suite, and ECDHE with
/// AES-GCM for TLS 1.2.
pub fn cipher_suites() -> Vec<SupportedCipherSuite> {
    vec![
        cipher_suite::TLS13_AES_128_GCM_SHA256,
        cipher_suite::TLS13_AES_256_GCM_SHA384,
        cipher_suite::TLS13_CHACHA20_POLY1305_SHA256,
        cipher_suite::TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256,
        cipher_suite::TLS_ECDHE_ECDSA_WITH_AES_256_GCM_SHA384,
        cipher_suite::TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256,
        cipher_suite::TLS_ECDHE_RSA_WITH_AES_256_GCM_SHA384,
    ]
}

/// Key-exchange groups in preference order. P-384 and P-521 are left out.
pub fn kx_groups() -> Vec<&'static dyn SupportedKxGroup> {
    vec![kx_group::SECP256R1, kx_group::X25519]
}

/// The aws-lc-rs provider narrowed to [`cipher_suites`] and [`kx_groups`].
pub fn crypto_provider() -> CryptoProvider {
    CryptoProvider {
        cipher_suites: cipher_suites(),
        kx_groups: kx_groups(),
        ..aws_lc_rs::default_provider()
    }
}

/// A server configuration assembled from a [`TlsIdentity`].
///
/// Holds the loaded certificate, the CA pool and the effective client auth
/// level behind `Arc`s that are never written after assembly, so it can be
/// shared across any number of concurrent handshakes without locking.
#[derive(Debug, Clone)]
pub struct AssembledConfig {
    authenticator: HandshakeAuthenticator,
    client_auth: ClientAuth,
    insecure: bool,
    has_ca_pool: bool,
}

impl AssembledConfig {
    /// The per-handshake callback.
    pub fn authenticator(&self) -> &HandshakeAuthenticator {
        &self.authenticator
    }

    /// A configuration usable by any rustls acceptor.
    ///
    /// Returns `None` at `RequireAndVerifyClientCertAndSan`: that level can only
    /// be enforced through [`HandshakeAuthenticator::config_for`], which knows
    /// the peer address.
    pub fn server_config(&self) -> Option<Arc<ServerConfig>> {
        self.authenticator.shared_config()
    }

    /// The level actually enforced, after the insecure override and the
    /// coercion of an unset level.
    pub fn effective_level(&self) -> AuthLevel {
        self.authenticator.level()
    }

    /// The native client-auth requirement.
    pub fn client_auth(&self) -> ClientAuth {
        self.client_auth
    }

    pub fn is_insecure(&self) -> bool {
        self.insecure
    }

    pub fn has_ca_pool(&self) -> bool {
        self.has_ca_pool
    }
}

fn cert_load_error(identity: &TlsIdentity, message: String) -> AssemblyError {
    AssemblyError::CertLoad {
        cert: identity.cert.clone(),
        key: identity.key.clone(),
        message,
    }
}

/// The level enforced for a non-insecure identity.
///
/// An unset level (`NoClientCert`) is treated as `RequestClientCert`: the
/// client is asked for a certificate, which is neither required nor verified.
/// Set the level explicitly to get verification.
pub fn effective_level(level: AuthLevel) -> AuthLevel {
    match level {
        AuthLevel::NoClientCert => AuthLevel::RequestClientCert,
        other => other,
    }
}

/// Load the CA pool, if the identity configures one.
///
/// A bundle is mandatory for levels that verify client certificates. For the
/// other levels a configured bundle is still loaded and must be valid.
fn load_roots(
    identity: &TlsIdentity,
    level: AuthLevel,
) -> Result<Option<Arc<RootCertStore>>, AssemblyError> {
    let Some(path) = identity.ca_path() else {
        if level.verifies_client_cert() {
            return Err(AssemblyError::CaPool {
                path: identity.ca.clone(),
                message: format!(
                    "level `{level}` verifies client certificates but no CA bundle is configured"
                ),
            });
        }
        return Ok(None);
    };

    let roots = pem::load_ca_pool(path).map_err(|message| AssemblyError::CaPool {
        path: identity.ca.clone(),
        message,
    })?;
    debug!("Loaded {} client CA certificate(s) from {}", roots.len(), identity.ca);

    Ok(Some(Arc::new(roots)))
}

/// Assemble the server configuration for `identity`.
///
/// The identity must not be empty; callers decide whether TLS is enabled
/// before calling this. All file access happens here, once, on the calling
/// thread.
pub fn assemble(identity: &TlsIdentity) -> Result<AssembledConfig, AssemblyError> {
    let chain = pem::load_certificate_chain(identity.cert_path())
        .map_err(|message| cert_load_error(identity, message))?;
    let key = pem::load_private_key(identity.key_path())
        .map_err(|message| cert_load_error(identity, message))?;

    let provider = Arc::new(crypto_provider());

    // Only used to validate the pair and obtain a resolver the per-handshake
    // configurations can share.
    let certified = ServerConfig::builder_with_provider(Arc::clone(&provider))
        .with_protocol_versions(PROTOCOL_VERSIONS)
        .map_err(|e| AssemblyError::TlsInitializationFailed(e.to_string()))?
        .with_no_client_auth()
        .with_single_cert(chain, key)
        .map_err(|e| cert_load_error(identity, format!("unusable certificate or key: {e}")))?;
    let cert_resolver = Arc::clone(&certified.cert_resolver);

    if identity.insecure {
        warn!(
            "TLS for {} is INSECURE: client certificates are neither requested nor verified (configured level `{}` ignored)",
            identity.cert, identity.level
        );

        let material = Material {
            provider,
            cert_resolver,
            roots: None,
            level: AuthLevel::NoClientCert,
            verifier: None,
        };
        return finish(material, ClientAuth::NoClientCert, true);
    }

    let level = effective_level(identity.level);
    if level != identity.level {
        warn!(
            "No client auth level configured for {}, defaulting to `{level}` (certificates requested, not verified)",
            identity.cert
        );
    }

    let roots = load_roots(identity, level)?;

    let client_auth = level.to_native();
    let verifier = client_auth
        .verifier(roots.as_ref(), &provider)
        .map_err(AssemblyError::TlsInitializationFailed)?;

    let material = Material {
        provider,
        cert_resolver,
        roots,
        level,
        verifier,
    };
    finish(material, client_auth, false)
}

fn finish(
    material: Material,
    client_auth: ClientAuth,
    insecure: bool,
) -> Result<AssembledConfig, AssemblyError> {
    let has_ca_pool = material.roots.is_some();
    let level = material.level;

    let authenticator = HandshakeAuthenticator::new(Arc::new(material))
        .map_err(|e| AssemblyError::TlsInitializationFailed(e.to_string()))?;

    info!("Assembled TLS configuration: level `{level}`, client auth {client_auth:?}, CA pool: {has_ca_pool}");

    Ok(AssembledConfig {
        authenticator,
        client_auth,
        insecure,
        has_ca_pool,
    })
}
