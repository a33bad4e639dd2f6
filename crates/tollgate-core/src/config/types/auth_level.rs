use std::{fmt::Display, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize, Serializer, de};

use crate::{error::ConfigError, tls::ClientAuth};

/// Server-side policy for requesting and verifying client certificates.
///
/// Variants are ordered from the most permissive to the strictest. Each one has
/// a canonical token used in configuration files and JSON, and maps onto one of
/// the native [`ClientAuth`] requirements.
///
/// | Variant                            | Token          |
/// |------------------------------------|----------------|
/// | `NoClientCert`                     | `"never"`      |
/// | `RequestClientCert`                | `"demande"`    |
/// | `RequireAnyClientCert`             | `"allow"`      |
/// | `VerifyClientCertIfGiven`          | `"try"`        |
/// | `RequireAndVerifyClientCert`       | `"hard"`       |
/// | `RequireAndVerifyClientCertAndSan` | `"hardAndSAN"` |
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AuthLevel {
    /// No client certificate is requested; anything sent is not verified.
    #[default]
    NoClientCert,
    /// A certificate is requested but neither required nor verified.
    RequestClientCert,
    /// A certificate is required but not verified.
    RequireAnyClientCert,
    /// A certificate is optional, and verified against the CA pool when given.
    VerifyClientCertIfGiven,
    /// A certificate is required and verified against the CA pool.
    RequireAndVerifyClientCert,
    /// Like `RequireAndVerifyClientCert`, and the certificate's subject
    /// alternative names must cover the address the peer connected from.
    RequireAndVerifyClientCertAndSan,
}

impl AuthLevel {
    /// Every level, weakest first.
    pub const ALL: [AuthLevel; 6] = [
        AuthLevel::NoClientCert,
        AuthLevel::RequestClientCert,
        AuthLevel::RequireAnyClientCert,
        AuthLevel::VerifyClientCertIfGiven,
        AuthLevel::RequireAndVerifyClientCert,
        AuthLevel::RequireAndVerifyClientCertAndSan,
    ];

    /// Parse a canonical token. Matching is exact and case-sensitive.
    pub fn parse(token: &str) -> Result<Self, ConfigError> {
        match token {
            "never" => Ok(AuthLevel::NoClientCert),
            "demande" => Ok(AuthLevel::RequestClientCert),
            "allow" => Ok(AuthLevel::RequireAnyClientCert),
            "try" => Ok(AuthLevel::VerifyClientCertIfGiven),
            "hard" => Ok(AuthLevel::RequireAndVerifyClientCert),
            "hardAndSAN" => Ok(AuthLevel::RequireAndVerifyClientCertAndSan),
            _ => Err(ConfigError::UnknownLevel(token.to_string())),
        }
    }

    /// The canonical token for this level.
    pub fn as_token(&self) -> &'static str {
        match self {
            AuthLevel::NoClientCert => "never",
            AuthLevel::RequestClientCert => "demande",
            AuthLevel::RequireAnyClientCert => "allow",
            AuthLevel::VerifyClientCertIfGiven => "try",
            AuthLevel::RequireAndVerifyClientCert => "hard",
            AuthLevel::RequireAndVerifyClientCertAndSan => "hardAndSAN",
        }
    }

    /// The native client-auth requirement for this level.
    ///
    /// The SAN level has no native counterpart; it maps to the same
    /// requirement as `RequireAndVerifyClientCert` and the address check is
    /// layered on top by the handshake authenticator.
    pub fn to_native(&self) -> ClientAuth {
        match self {
            AuthLevel::NoClientCert => ClientAuth::NoClientCert,
            AuthLevel::RequestClientCert => ClientAuth::RequestClientCert,
            AuthLevel::RequireAnyClientCert => ClientAuth::RequireAnyClientCert,
            AuthLevel::VerifyClientCertIfGiven => ClientAuth::VerifyClientCertIfGiven,
            AuthLevel::RequireAndVerifyClientCert
            | AuthLevel::RequireAndVerifyClientCertAndSan => {
                ClientAuth::RequireAndVerifyClientCert
            }
        }
    }

    /// Whether a handshake without a client certificate is rejected.
    pub fn requires_client_cert(&self) -> bool {
        self.to_native().is_mandatory()
    }

    /// Whether a presented certificate is verified against the CA pool.
    pub fn verifies_client_cert(&self) -> bool {
        self.to_native().is_verified()
    }

    /// Whether the certificate must also be bound to the peer address.
    pub fn checks_san(&self) -> bool {
        matches!(self, AuthLevel::RequireAndVerifyClientCertAndSan)
    }
}

impl FromStr for AuthLevel {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AuthLevel::parse(s)
    }
}

impl Display for AuthLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_token())
    }
}

impl Serialize for AuthLevel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_token())
    }
}

impl<'de> Deserialize<'de> for AuthLevel {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let token = String::deserialize(deserializer)?;
        AuthLevel::parse(&token).map_err(de::Error::custom)
    }
}
