// Identity fields of an authenticated peer, for logging

use std::net::IpAddr;

use rustls::pki_types::CertificateDer;
use x509_parser::{certificate::X509Certificate, extensions::GeneralName, prelude::FromDer};

/// Subject fields pulled from the leaf certificate a peer presented.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PeerIdentity {
    pub common_name: Option<String>,
    pub san_dns_names: Vec<String>,
    pub san_ips: Vec<IpAddr>,
}

impl PeerIdentity {
    /// Parse a DER-encoded certificate. Returns `None` if it cannot be parsed.
    pub fn from_der(cert: &CertificateDer<'_>) -> Option<Self> {
        let (_, parsed) = X509Certificate::from_der(cert.as_ref()).ok()?;

        let common_name = parsed
            .subject()
            .iter_common_name()
            .next()
            .and_then(|attr| attr.as_str().ok())
            .map(str::to_owned);

        let mut san_dns_names = Vec::new();
        let mut san_ips = Vec::new();
        if let Ok(Some(san)) = parsed.subject_alternative_name() {
            for name in &san.value.general_names {
                match name {
                    GeneralName::DNSName(dns) => san_dns_names.push((*dns).to_owned()),
                    GeneralName::IPAddress(bytes) => {
                        if let Ok(octets) = <[u8; 4]>::try_from(*bytes) {
                            san_ips.push(IpAddr::from(octets));
                        } else if let Ok(octets) = <[u8; 16]>::try_from(*bytes) {
                            san_ips.push(IpAddr::from(octets));
                        }
                    }
                    _ => {}
                }
            }
        }

        Some(Self {
            common_name,
            san_dns_names,
            san_ips,
        })
    }

    /// Identity of the first certificate in `chain`, if any.
    pub fn from_chain(chain: Option<&[CertificateDer<'_>]>) -> Option<Self> {
        chain.and_then(|certs| certs.first()).and_then(Self::from_der)
    }

    /// A short label for logs: the CN, else the first SAN, else `<anonymous>`.
    pub fn display_name(&self) -> String {
        self.common_name
            .clone()
            .or_else(|| self.san_dns_names.first().cloned())
            .or_else(|| self.san_ips.first().map(IpAddr::to_string))
            .unwrap_or_else(|| "<anonymous>".to_string())
    }
}
