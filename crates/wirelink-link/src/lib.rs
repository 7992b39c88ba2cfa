//! Link configuration for tunnel listeners.
//!
//! A link describes one listener: the local endpoint it accepts on, the
//! remote endpoint it dials, and the per-transport fields (SNI, upgrade
//! path, certificate material, TLS method and cipher suites).

pub mod addr;
pub mod sockopt;

mod links;

pub use links::{
    LinkAddr, TcpForwardLink, TlsClientLink, TlsMethod, WsClientLink, WsLink, WssClientLink,
    WssLink,
};

use thiserror::Error;

/// Size of each relay buffer. One read of at most this many bytes, then one
/// write, per direction.
pub const TRANSFER_UNIT: usize = 65536;

/// Listener backlog.
pub const LISTEN_BACKLOG: i32 = 32767;

#[derive(Debug, Error)]
pub enum LinkError {
    #[error("port {0} is out of range")]
    InvalidPort(i32),
    #[error("certificate or private key path is empty")]
    MissingCertOrKey,
}

/// Checks a raw port value before it is narrowed to `u16`.
pub fn valid_port(port: i32) -> bool {
    (1..=65535).contains(&port)
}

/// Trims an upgrade path, falling back to `/` when nothing is left.
pub fn normalize_path(path: &str) -> String {
    let trimmed = path.trim();
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        trimmed.to_string()
    }
}
