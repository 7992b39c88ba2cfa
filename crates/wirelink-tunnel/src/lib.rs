//! Connection pairing and bidirectional relay.
//!
//! Six listener variants, each pairing an inbound connection with one
//! outbound connection and pumping bytes both ways:
//!
//! - [`TcpForwardHost`]: plain TCP in, plain TCP out.
//! - [`TlsClientHost`]: plain TCP in, TLS client out.
//! - [`WsHost`]: WebSocket server in, plain TCP out.
//! - [`WsClientHost`]: plain TCP in, WebSocket client out.
//! - [`WssHost`]: TLS-terminating WebSocket server in, plain TCP out.
//! - [`WssClientHost`]: plain TCP in, WebSocket-over-TLS client out.
//!
//! A listener owns its accepting socket only; every accepted connection is
//! handed to a tunnel task with its own lifetime. Relay never starts before
//! all handshakes on both sides complete, and the first failure or EOF in
//! either direction tears the whole tunnel down.

pub mod establish;
pub mod guard;
pub mod path;

mod listener;
mod outbound;
mod relay;

mod tcp_forward;
mod tls_client;
mod ws;
mod ws_client;
mod wss;
mod wss_client;

pub use tcp_forward::TcpForwardHost;
pub use tls_client::TlsClientHost;
pub use ws::WsHost;
pub use ws_client::WsClientHost;
pub use wss::WssHost;
pub use wss_client::WssClientHost;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TunnelError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("link error: {0}")]
    Link(#[from] wirelink_link::LinkError),
    #[error("TLS error: {0}")]
    Tls(#[from] wirelink_tls::TlsError),
    #[error("WebSocket error: {0}")]
    Ws(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("request path does not match the configured prefix")]
    PathMismatch,
    #[error("outbound connect rejected by protect hook")]
    Rejected,
    #[error("execution host is not running")]
    HostStopped,
    #[error("canceled")]
    Canceled,
}
