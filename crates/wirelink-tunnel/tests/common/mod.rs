//! Shared helpers for the tunnel integration tests.

use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;

use wirelink_io::IoHost;
use wirelink_link::LinkAddr;

pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "debug".into()),
        )
        .with_test_writer()
        .try_init()
        .ok();
}

/// A port that was free a moment ago. Listeners under test bind it right
/// away, so collisions are unlikely.
pub fn free_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

pub fn local_addr(port: u16) -> LinkAddr {
    LinkAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), port, false)
}

pub fn started_host(concurrent: i32) -> Arc<IoHost> {
    let host = IoHost::new(concurrent);
    host.start().unwrap();
    host
}
