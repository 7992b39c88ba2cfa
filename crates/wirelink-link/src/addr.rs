//! Endpoint helpers.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

/// Local address an outbound socket binds to before connecting, mirroring
/// the destination's locality: loopback destinations bind loopback, anything
/// else binds the wildcard. Always an ephemeral port, family matched.
pub fn outbound_bind_addr(remote: &IpAddr) -> SocketAddr {
    let host = match remote {
        IpAddr::V4(ip) => {
            if ip.is_loopback() {
                IpAddr::V4(Ipv4Addr::LOCALHOST)
            } else {
                IpAddr::V4(Ipv4Addr::UNSPECIFIED)
            }
        }
        IpAddr::V6(ip) => {
            if ip.is_loopback() {
                IpAddr::V6(Ipv6Addr::LOCALHOST)
            } else {
                IpAddr::V6(Ipv6Addr::UNSPECIFIED)
            }
        }
    };
    SocketAddr::new(host, 0)
}
