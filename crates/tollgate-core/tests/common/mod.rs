#![allow(dead_code)]

use std::{net::SocketAddr, sync::Arc};

use rcgen::{
    BasicConstraints, Certificate, CertificateParams, DistinguishedName, DnType,
    ExtendedKeyUsagePurpose, IsCa, KeyPair, SanType,
};
use rustls::{
    ClientConfig, RootCertStore,
    crypto::aws_lc_rs,
    pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer, ServerName},
};
use tempfile::TempDir;
use tokio::net::TcpStream;
use tokio_rustls::{TlsConnector, client::TlsStream};
use tollgate::config::{AuthLevel, TlsIdentity};

/// A throwaway CA with its files written to a temporary directory.
pub struct TestPki {
    pub dir: TempDir,
    ca_cert: Certificate,
    ca_key: KeyPair,
}

/// A client certificate chain and its private key.
pub struct ClientCert {
    pub chain: Vec<CertificateDer<'static>>,
    key_der: Vec<u8>,
}

impl ClientCert {
    pub fn key(&self) -> PrivateKeyDer<'static> {
        PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(self.key_der.clone()))
    }

    pub fn leaf(&self) -> &CertificateDer<'static> {
        &self.chain[0]
    }
}

pub fn ip_san(ip: &str) -> SanType {
    SanType::IpAddress(ip.parse().expect("valid IP literal"))
}

pub fn dns_san(name: &str) -> SanType {
    SanType::DnsName(name.try_into().expect("valid DNS name"))
}

fn build_ca(common_name: &str) -> (Certificate, KeyPair) {
    let mut params = CertificateParams::default();
    params.distinguished_name = DistinguishedName::new();
    params.distinguished_name.push(DnType::CommonName, common_name);
    params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
    let key = KeyPair::generate().expect("generate CA key");
    let cert = params.self_signed(&key).expect("self-sign CA");
    (cert, key)
}

fn client_params(common_name: &str, sans: Vec<SanType>) -> CertificateParams {
    let mut params = CertificateParams::new(Vec::<String>::new()).expect("client params");
    params.distinguished_name = DistinguishedName::new();
    params.distinguished_name.push(DnType::CommonName, common_name);
    params.subject_alt_names = sans;
    params.is_ca = IsCa::NoCa;
    params.extended_key_usages = vec![ExtendedKeyUsagePurpose::ClientAuth];
    params
}

/// A client certificate that does not chain to any test CA.
pub fn self_signed_client(common_name: &str, sans: Vec<SanType>) -> ClientCert {
    let key = KeyPair::generate().expect("generate client key");
    let cert = client_params(common_name, sans)
        .self_signed(&key)
        .expect("self-sign client");

    ClientCert {
        chain: vec![cert.der().clone()],
        key_der: key.serialize_der(),
    }
}

impl TestPki {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("create temp dir");
        let (ca_cert, ca_key) = build_ca("tollgate-test-ca");
        std::fs::write(dir.path().join("ca.pem"), ca_cert.pem()).expect("write CA");

        TestPki {
            dir,
            ca_cert,
            ca_key,
        }
    }

    pub fn path(&self, name: &str) -> String {
        self.dir.path().join(name).display().to_string()
    }

    pub fn ca_path(&self) -> String {
        self.path("ca.pem")
    }

    pub fn write(&self, name: &str, contents: impl AsRef<[u8]>) -> String {
        let path = self.dir.path().join(name);
        std::fs::write(&path, contents).expect("write fixture");
        path.display().to_string()
    }

    pub fn ca_der(&self) -> CertificateDer<'static> {
        self.ca_cert.der().clone()
    }

    /// Mint a server certificate for `localhost` / 127.0.0.1 and return an
    /// identity pointing at it, the CA bundle and `level`.
    pub fn server_identity(&self, level: AuthLevel) -> TlsIdentity {
        let mut params =
            CertificateParams::new(vec!["localhost".to_string()]).expect("server params");
        params.subject_alt_names.push(ip_san("127.0.0.1"));
        params.distinguished_name = DistinguishedName::new();
        params.distinguished_name.push(DnType::CommonName, "localhost");
        params.is_ca = IsCa::NoCa;

        let key = KeyPair::generate().expect("generate server key");
        let cert = params
            .signed_by(&key, &self.ca_cert, &self.ca_key)
            .expect("sign server");

        let cert_path = self.write("server.pem", cert.pem());
        let key_path = self.write("server.key", key.serialize_pem());

        TlsIdentity::new(cert_path, key_path)
            .with_ca(self.ca_path())
            .with_level(level)
    }

    /// A client certificate issued directly by this CA.
    pub fn client(&self, common_name: &str, sans: Vec<SanType>) -> ClientCert {
        let key = KeyPair::generate().expect("generate client key");
        let cert = client_params(common_name, sans)
            .signed_by(&key, &self.ca_cert, &self.ca_key)
            .expect("sign client");

        ClientCert {
            chain: vec![cert.der().clone()],
            key_der: key.serialize_der(),
        }
    }

    /// A client certificate issued by an intermediate CA, which itself is
    /// issued by this CA. The chain includes the intermediate.
    pub fn client_via_intermediate(&self, common_name: &str, sans: Vec<SanType>) -> ClientCert {
        let mut params = CertificateParams::default();
        params.distinguished_name = DistinguishedName::new();
        params
            .distinguished_name
            .push(DnType::CommonName, "tollgate-test-intermediate");
        params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        let intermediate_key = KeyPair::generate().expect("generate intermediate key");
        let intermediate = params
            .signed_by(&intermediate_key, &self.ca_cert, &self.ca_key)
            .expect("sign intermediate");

        let key = KeyPair::generate().expect("generate client key");
        let cert = client_params(common_name, sans)
            .signed_by(&key, &intermediate, &intermediate_key)
            .expect("sign client");

        ClientCert {
            chain: vec![cert.der().clone(), intermediate.der().clone()],
            key_der: key.serialize_der(),
        }
    }

    pub fn roots(&self) -> RootCertStore {
        let mut roots = RootCertStore::empty();
        roots.add(self.ca_der()).expect("add CA root");
        roots
    }

    /// A connector trusting this CA, presenting `client` when given.
    pub fn connector(&self, client: Option<&ClientCert>) -> TlsConnector {
        let builder = ClientConfig::builder_with_provider(Arc::new(aws_lc_rs::default_provider()))
            .with_safe_default_protocol_versions()
            .expect("client protocol versions")
            .with_root_certificates(self.roots());

        let config = match client {
            Some(client) => builder
                .with_client_auth_cert(client.chain.clone(), client.key())
                .expect("client auth cert"),
            None => builder.with_no_client_auth(),
        };

        TlsConnector::from(Arc::new(config))
    }
}

pub async fn connect(
    connector: &TlsConnector,
    addr: SocketAddr,
) -> std::io::Result<TlsStream<TcpStream>> {
    let stream = TcpStream::connect(addr).await?;
    let server_name = ServerName::try_from("localhost").expect("valid server name");
    connector.connect(server_name, stream).await
}
