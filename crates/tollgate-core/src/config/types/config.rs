use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use serde::{Deserialize, Serialize};

use super::{LogLevel, TlsIdentity};

/// Top-level configuration for a Tollgate listener
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Config {
    /// The IP address to bind the listener to (default: 0.0.0.0)
    #[serde(default = "Config::default_host")]
    pub host: IpAddr,

    /// The port number to bind the listener to (default: 8443)
    #[serde(default = "Config::default_port")]
    pub port: u16,

    /// The log level to use (default: "info")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_level: Option<LogLevel>,

    /// Server certificate and client certificate policy. Leaving both `cert`
    /// and `key` unset disables TLS.
    #[serde(default)]
    pub tls: TlsIdentity,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            host: Config::default_host(),
            port: Config::default_port(),
            log_level: None,
            tls: TlsIdentity::default(),
        }
    }
}

impl Config {
    pub fn default_host() -> IpAddr {
        IpAddr::V4(Ipv4Addr::UNSPECIFIED)
    }

    pub fn default_port() -> u16 {
        8443
    }

    /// The address the listener binds to.
    pub fn socket_address(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}
