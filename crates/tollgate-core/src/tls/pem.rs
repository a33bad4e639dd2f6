// PEM loading for server certificates, private keys and client CA bundles

use std::{
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
};

use rustls::{
    RootCertStore,
    pki_types::{CertificateDer, PrivateKeyDer},
};
use rustls_pemfile::{certs, private_key};

/// Resolve `path` to an existing regular file.
///
/// The path is canonicalized so symlinks and relative components are resolved
/// before the file is opened.
fn validate_pem_path(path: &Path, file_type: &str) -> Result<PathBuf, String> {
    let canonical = path
        .canonicalize()
        .map_err(|e| format!("cannot access {file_type} `{}`: {e}", path.display()))?;

    if !canonical.is_file() {
        return Err(format!("{file_type} `{}` is not a file", path.display()));
    }

    Ok(canonical)
}

fn open_pem(path: &Path, file_type: &str) -> Result<BufReader<File>, String> {
    let safe_path = validate_pem_path(path, file_type)?;
    let file = File::open(&safe_path)
        .map_err(|e| format!("cannot open {file_type} `{}`: {e}", path.display()))?;

    Ok(BufReader::new(file))
}

/// Load every certificate from a PEM file, in file order.
///
/// A file that holds no `CERTIFICATE` block is an error.
pub fn load_certificate_chain(path: &Path) -> Result<Vec<CertificateDer<'static>>, String> {
    let mut reader = open_pem(path, "certificate")?;
    let chain = certs(&mut reader)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| format!("failed to parse certificate `{}`: {e}", path.display()))?;

    if chain.is_empty() {
        return Err(format!("no certificate found in `{}`", path.display()));
    }

    Ok(chain)
}

/// Load the first private key from a PEM file (PKCS#8, PKCS#1 or SEC1)
pub fn load_private_key(path: &Path) -> Result<PrivateKeyDer<'static>, String> {
    let mut reader = open_pem(path, "private key")?;

    private_key(&mut reader)
        .map_err(|e| format!("failed to parse private key `{}`: {e}", path.display()))?
        .ok_or_else(|| format!("no private key found in `{}`", path.display()))
}

/// Load a bundle of trusted CA certificates into a root store.
///
/// Every certificate in the bundle must be usable as a trust anchor, and the
/// bundle must contain at least one.
pub fn load_ca_pool(path: &Path) -> Result<RootCertStore, String> {
    let bundle = load_certificate_chain(path)?;

    let mut roots = RootCertStore::empty();
    for (index, cert) in bundle.into_iter().enumerate() {
        roots.add(cert).map_err(|e| {
            format!(
                "certificate #{index} in `{}` is not a usable trust anchor: {e}",
                path.display()
            )
        })?;
    }

    Ok(roots)
}
