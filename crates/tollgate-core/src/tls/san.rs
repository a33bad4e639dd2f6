// Client certificate verification bound to the address a peer connected from

use std::{
    net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr},
    sync::Arc,
};

use log::debug;
use rustls::{
    CertificateError, DigitallySignedStruct, DistinguishedName, SignatureScheme,
    client::danger::HandshakeSignatureValid,
    pki_types::{CertificateDer, UnixTime},
    server::danger::{ClientCertVerified, ClientCertVerifier},
};
use x509_parser::{certificate::X509Certificate, extensions::GeneralName, prelude::FromDer};

/// The host part of a peer address, with the port stripped.
///
/// IPv4-mapped IPv6 addresses (seen on dual-stack listeners) are reduced to
/// plain IPv4 so they compare equal to IPv4 SAN entries.
pub fn peer_host(addr: &SocketAddr) -> IpAddr {
    addr.ip().to_canonical()
}

fn ip_from_octets(bytes: &[u8]) -> Option<IpAddr> {
    match bytes.len() {
        4 => Some(IpAddr::V4(Ipv4Addr::new(
            bytes[0], bytes[1], bytes[2], bytes[3],
        ))),
        16 => {
            let array: [u8; 16] = bytes.try_into().ok()?;
            Some(IpAddr::V6(Ipv6Addr::from(array)))
        }
        _ => None,
    }
}

/// Whether the certificate lists `host` among its IP address SANs.
///
/// A certificate without a SAN extension never matches.
pub fn san_matches_host(cert: &CertificateDer<'_>, host: IpAddr) -> Result<bool, rustls::Error> {
    let (_, parsed) = X509Certificate::from_der(cert.as_ref())
        .map_err(|_| rustls::Error::InvalidCertificate(CertificateError::BadEncoding))?;
    let san = parsed
        .subject_alternative_name()
        .map_err(|_| rustls::Error::InvalidCertificate(CertificateError::BadEncoding))?;

    let Some(san) = san else {
        return Ok(false);
    };

    Ok(san.value.general_names.iter().any(|name| match name {
        GeneralName::IPAddress(bytes) => {
            ip_from_octets(bytes).is_some_and(|ip| ip.to_canonical() == host)
        }
        _ => false,
    }))
}

/// Verifier built for a single handshake.
///
/// The presented leaf must chain directly to the client CA pool (intermediates
/// sent by the peer are ignored, so any intermediate CA has to be part of the
/// pool) with the client-auth extended key usage, and one of its IP SANs has
/// to equal the address the peer connected from.
#[derive(Debug)]
pub struct SanBoundVerifier {
    inner: Arc<dyn ClientCertVerifier>,
    peer: IpAddr,
}

impl SanBoundVerifier {
    /// `inner` performs chain verification against the CA pool.
    pub fn new(inner: Arc<dyn ClientCertVerifier>, peer: IpAddr) -> Self {
        Self { inner, peer }
    }
}

impl ClientCertVerifier for SanBoundVerifier {
    fn offer_client_auth(&self) -> bool {
        true
    }

    fn client_auth_mandatory(&self) -> bool {
        true
    }

    fn root_hint_subjects(&self) -> &[DistinguishedName] {
        self.inner.root_hint_subjects()
    }

    fn verify_client_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        now: UnixTime,
    ) -> Result<ClientCertVerified, rustls::Error> {
        let verified = self.inner.verify_client_cert(end_entity, &[], now)?;

        if !san_matches_host(end_entity, self.peer)? {
            debug!("Client certificate SANs do not cover peer {}", self.peer);
            return Err(rustls::Error::InvalidCertificate(
                CertificateError::NotValidForName,
            ));
        }

        Ok(verified)
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        self.inner.verify_tls12_signature(message, cert, dss)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        self.inner.verify_tls13_signature(message, cert, dss)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.inner.supported_verify_schemes()
    }
}
