use std::net::{IpAddr, SocketAddr};

use crate::LinkError;

/// One side of a link: an address, a port and the Nagle setting for sockets
/// on that side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkAddr {
    pub host: IpAddr,
    pub port: u16,
    /// `true` leaves Nagle's algorithm on; `false` sets TCP_NODELAY.
    pub nagle: bool,
}

impl LinkAddr {
    pub fn new(host: IpAddr, port: u16, nagle: bool) -> Self {
        Self { host, port, nagle }
    }

    pub fn endpoint(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    fn validate(&self) -> Result<(), LinkError> {
        if self.port == 0 {
            return Err(LinkError::InvalidPort(0));
        }
        Ok(())
    }
}

/// TLS protocol selection, by raw method value. Out-of-range raw values fall
/// back to TLS 1.2.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TlsMethod {
    TlsV13,
    #[default]
    TlsV12,
    TlsV11,
    Tls,
    SslV23,
    SslV3,
    SslV2,
    Ssl,
}

impl TlsMethod {
    pub fn from_raw(value: i32) -> Self {
        match value {
            0 => TlsMethod::TlsV13,
            1 => TlsMethod::TlsV12,
            2 => TlsMethod::TlsV11,
            3 => TlsMethod::Tls,
            4 => TlsMethod::SslV23,
            5 => TlsMethod::SslV3,
            6 => TlsMethod::SslV2,
            7 => TlsMethod::Ssl,
            _ => TlsMethod::TlsV12,
        }
    }
}

/// Plain TCP port forward: accept on `local`, dial `remote`, relay raw bytes.
#[derive(Debug, Clone)]
pub struct TcpForwardLink {
    pub local: LinkAddr,
    pub remote: LinkAddr,
}

impl TcpForwardLink {
    pub fn validate(&self) -> Result<(), LinkError> {
        self.local.validate()?;
        self.remote.validate()
    }
}

/// Accept plain TCP on `local`, dial `remote` and wrap the outbound side in a
/// TLS client session.
#[derive(Debug, Clone)]
pub struct TlsClientLink {
    pub local: LinkAddr,
    pub remote: LinkAddr,
    /// Server name for SNI and certificate verification. Empty means verify
    /// against the remote IP address.
    pub sni: String,
    pub method: TlsMethod,
    /// Colon-separated TLS 1.3 cipher suite names; empty keeps the provider
    /// default.
    pub cipher_suites: String,
}

impl TlsClientLink {
    pub fn validate(&self) -> Result<(), LinkError> {
        self.local.validate()?;
        self.remote.validate()
    }
}

/// Terminate a WebSocket upgrade on `local` under `path`, relay the message
/// payloads to a raw TCP connection to `remote`.
#[derive(Debug, Clone)]
pub struct WsLink {
    pub local: LinkAddr,
    pub remote: LinkAddr,
    /// Upgrade path prefix. `/` (or empty) matches every request path.
    pub path: String,
}

impl WsLink {
    pub fn validate(&self) -> Result<(), LinkError> {
        self.local.validate()?;
        self.remote.validate()
    }
}

/// Accept raw TCP on `local`, dial `remote` and speak WebSocket client on the
/// outbound side.
#[derive(Debug, Clone)]
pub struct WsClientLink {
    pub local: LinkAddr,
    pub remote: LinkAddr,
    pub path: String,
    /// Host header / SNI-style name for the upgrade request. Empty uses the
    /// remote IP.
    pub sni: String,
}

impl WsClientLink {
    pub fn validate(&self) -> Result<(), LinkError> {
        self.local.validate()?;
        self.remote.validate()
    }
}

/// `WsClientLink` with the outbound side additionally wrapped in TLS.
#[derive(Debug, Clone)]
pub struct WssClientLink {
    pub tls: TlsClientLink,
    pub path: String,
}

impl WssClientLink {
    pub fn validate(&self) -> Result<(), LinkError> {
        self.tls.validate()
    }
}

/// TLS-terminating WebSocket listener: TLS accept, then WebSocket upgrade
/// under `path`, relayed to a raw TCP connection to `remote`.
#[derive(Debug, Clone)]
pub struct WssLink {
    pub local: LinkAddr,
    pub remote: LinkAddr,
    pub sni: String,
    pub path: String,
    pub cert_file: String,
    pub key_file: String,
    pub key_pass: String,
    pub method: TlsMethod,
    pub cipher_suites: String,
}

impl WssLink {
    pub fn validate(&self) -> Result<(), LinkError> {
        self.local.validate()?;
        self.remote.validate()?;
        if self.cert_file.is_empty() || self.key_file.is_empty() {
            return Err(LinkError::MissingCertOrKey);
        }
        Ok(())
    }
}
