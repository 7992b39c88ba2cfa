//! Raw link configurations as the host process supplies them.
//!
//! Ports arrive as `i32` and are range-checked here, before any typed link
//! is built. Paths are normalized here as well, so listeners only ever see
//! a trimmed, non-empty path.

use std::net::IpAddr;

use wirelink_link::{
    normalize_path, valid_port, LinkAddr, TcpForwardLink, TlsClientLink, TlsMethod, WsClientLink,
    WsLink, WssClientLink, WssLink,
};

fn link_addr(host: IpAddr, port: i32, nagle: bool) -> Option<LinkAddr> {
    if !valid_port(port) {
        return None;
    }
    Some(LinkAddr::new(host, port as u16, nagle))
}

#[derive(Debug, Clone)]
pub struct TcpForwardLinkConfig {
    pub local_host: IpAddr,
    pub local_port: i32,
    pub local_nagle: bool,
    pub remote_host: IpAddr,
    pub remote_port: i32,
    pub remote_nagle: bool,
}

impl TcpForwardLinkConfig {
    pub(crate) fn to_link(&self) -> Option<TcpForwardLink> {
        Some(TcpForwardLink {
            local: link_addr(self.local_host, self.local_port, self.local_nagle)?,
            remote: link_addr(self.remote_host, self.remote_port, self.remote_nagle)?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct TlsClientLinkConfig {
    pub local_host: IpAddr,
    pub local_port: i32,
    pub local_nagle: bool,
    pub remote_host: IpAddr,
    pub remote_port: i32,
    pub remote_nagle: bool,
    /// Server name for SNI and verification; empty verifies the remote IP.
    pub host_sni: String,
    /// Raw TLS method value; out-of-range falls back to TLS 1.2.
    pub ssl_method: i32,
    /// Colon-separated TLS 1.3 suite names; empty keeps the default.
    pub ssl_cipher_suites: String,
}

impl TlsClientLinkConfig {
    pub(crate) fn to_link(&self) -> Option<TlsClientLink> {
        Some(TlsClientLink {
            local: link_addr(self.local_host, self.local_port, self.local_nagle)?,
            remote: link_addr(self.remote_host, self.remote_port, self.remote_nagle)?,
            sni: self.host_sni.clone(),
            method: TlsMethod::from_raw(self.ssl_method),
            cipher_suites: self.ssl_cipher_suites.clone(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct WsLinkConfig {
    pub local_host: IpAddr,
    pub local_port: i32,
    pub local_nagle: bool,
    pub remote_host: IpAddr,
    pub remote_port: i32,
    pub remote_nagle: bool,
    pub path: String,
}

impl WsLinkConfig {
    pub(crate) fn to_link(&self) -> Option<WsLink> {
        Some(WsLink {
            local: link_addr(self.local_host, self.local_port, self.local_nagle)?,
            remote: link_addr(self.remote_host, self.remote_port, self.remote_nagle)?,
            path: normalize_path(&self.path),
        })
    }
}

#[derive(Debug, Clone)]
pub struct WsClientLinkConfig {
    pub local_host: IpAddr,
    pub local_port: i32,
    pub local_nagle: bool,
    pub remote_host: IpAddr,
    pub remote_port: i32,
    pub remote_nagle: bool,
    pub path: String,
    /// Host header name for the upgrade request; empty uses the remote IP.
    pub host_sni: String,
}

impl WsClientLinkConfig {
    pub(crate) fn to_link(&self) -> Option<WsClientLink> {
        Some(WsClientLink {
            local: link_addr(self.local_host, self.local_port, self.local_nagle)?,
            remote: link_addr(self.remote_host, self.remote_port, self.remote_nagle)?,
            path: normalize_path(&self.path),
            sni: self.host_sni.clone(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct WssClientLinkConfig {
    pub tls: TlsClientLinkConfig,
    pub path: String,
}

impl WssClientLinkConfig {
    pub(crate) fn to_link(&self) -> Option<WssClientLink> {
        Some(WssClientLink {
            tls: self.tls.to_link()?,
            path: normalize_path(&self.path),
        })
    }
}

#[derive(Debug, Clone)]
pub struct WssLinkConfig {
    pub local_host: IpAddr,
    pub local_port: i32,
    pub local_nagle: bool,
    pub remote_host: IpAddr,
    pub remote_port: i32,
    pub remote_nagle: bool,
    pub host_sni: String,
    pub path: String,
    pub ssl_cert_file: String,
    pub ssl_key_file: String,
    pub ssl_key_pass: String,
    pub ssl_method: i32,
    pub ssl_cipher_suites: String,
}

impl WssLinkConfig {
    pub(crate) fn to_link(&self) -> Option<WssLink> {
        Some(WssLink {
            local: link_addr(self.local_host, self.local_port, self.local_nagle)?,
            remote: link_addr(self.remote_host, self.remote_port, self.remote_nagle)?,
            sni: self.host_sni.clone(),
            path: normalize_path(&self.path),
            cert_file: self.ssl_cert_file.clone(),
            key_file: self.ssl_key_file.clone(),
            key_pass: self.ssl_key_pass.clone(),
            method: TlsMethod::from_raw(self.ssl_method),
            cipher_suites: self.ssl_cipher_suites.clone(),
        })
    }
}
