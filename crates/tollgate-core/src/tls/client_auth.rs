// Native client-auth requirements and the rustls verifiers that implement them

use std::sync::Arc;

use rustls::{
    DigitallySignedStruct, DistinguishedName, RootCertStore, SignatureScheme,
    client::danger::HandshakeSignatureValid,
    crypto::{CryptoProvider, WebPkiSupportedAlgorithms, verify_tls12_signature, verify_tls13_signature},
    pki_types::{CertificateDer, UnixTime},
    server::{
        WebPkiClientVerifier,
        danger::{ClientCertVerified, ClientCertVerifier},
    },
};

/// The client certificate requirements the TLS stack understands natively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClientAuth {
    NoClientCert,
    RequestClientCert,
    RequireAnyClientCert,
    VerifyClientCertIfGiven,
    RequireAndVerifyClientCert,
}

impl ClientAuth {
    /// Whether the server asks the client for a certificate at all
    pub fn is_requested(&self) -> bool {
        !matches!(self, ClientAuth::NoClientCert)
    }

    /// Whether a client that sends no certificate is rejected
    pub fn is_mandatory(&self) -> bool {
        matches!(
            self,
            ClientAuth::RequireAnyClientCert | ClientAuth::RequireAndVerifyClientCert
        )
    }

    /// Whether a presented certificate is checked against the CA pool
    pub fn is_verified(&self) -> bool {
        matches!(
            self,
            ClientAuth::VerifyClientCertIfGiven | ClientAuth::RequireAndVerifyClientCert
        )
    }

    /// Build the rustls verifier for this requirement.
    ///
    /// Returns `Ok(None)` for `NoClientCert`. Verifying requirements need
    /// `roots`; the others ignore it.
    pub fn verifier(
        &self,
        roots: Option<&Arc<RootCertStore>>,
        provider: &Arc<CryptoProvider>,
    ) -> Result<Option<Arc<dyn ClientCertVerifier>>, String> {
        if !self.is_requested() {
            return Ok(None);
        }

        if !self.is_verified() {
            return Ok(Some(Arc::new(UnverifiedClientCert::new(
                self.is_mandatory(),
                provider,
            ))));
        }

        let roots = roots.ok_or_else(|| format!("{self:?} needs a client CA pool"))?;
        let builder = WebPkiClientVerifier::builder_with_provider(
            Arc::clone(roots),
            Arc::clone(provider),
        );
        let builder = if self.is_mandatory() {
            builder
        } else {
            builder.allow_unauthenticated()
        };

        builder
            .build()
            .map(Some)
            .map_err(|e| format!("failed to build client verifier: {e}"))
    }
}

/// Requests a client certificate without checking who issued it.
///
/// The handshake signature is still checked, so the client has to hold the
/// private key for whatever certificate it sends.
#[derive(Debug)]
pub(crate) struct UnverifiedClientCert {
    mandatory: bool,
    supported_algs: WebPkiSupportedAlgorithms,
}

impl UnverifiedClientCert {
    pub(crate) fn new(mandatory: bool, provider: &CryptoProvider) -> Self {
        Self {
            mandatory,
            supported_algs: provider.signature_verification_algorithms,
        }
    }
}

impl ClientCertVerifier for UnverifiedClientCert {
    fn offer_client_auth(&self) -> bool {
        true
    }

    fn client_auth_mandatory(&self) -> bool {
        self.mandatory
    }

    fn root_hint_subjects(&self) -> &[DistinguishedName] {
        &[]
    }

    fn verify_client_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _now: UnixTime,
    ) -> Result<ClientCertVerified, rustls::Error> {
        Ok(ClientCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls12_signature(message, cert, dss, &self.supported_algs)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls13_signature(message, cert, dss, &self.supported_algs)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.supported_algs.supported_schemes()
    }
}
