//! Outbound connection setup shared by every tunnel variant.

use std::net::SocketAddr;

use tokio::net::{TcpSocket, TcpStream};
use tracing::trace;

use wirelink_io::{IoHost, ProtectTarget};
use wirelink_link::{addr, sockopt, LinkAddr};

use crate::TunnelError;

/// Opens the outbound socket: family match, fast-open and transport hints,
/// bind to loopback or wildcard mirroring the destination's locality, then
/// the protect check, and only then the connect.
pub(crate) async fn connect_remote(
    io: &IoHost,
    remote: &LinkAddr,
    inbound_peer: SocketAddr,
) -> Result<TcpStream, TunnelError> {
    let dest = remote.endpoint();
    let socket = if dest.is_ipv4() {
        TcpSocket::new_v4()?
    } else {
        TcpSocket::new_v6()?
    };
    sockopt::set_fast_open(&socket);
    sockopt::set_transport_hints(&socket, dest.is_ipv4());
    socket.bind(addr::outbound_bind_addr(&dest.ip()))?;

    let target = ProtectTarget {
        fd: raw_fd(&socket),
        bound: socket.local_addr()?,
        peer: inbound_peer,
        remote: dest,
    };
    if !io.protect(&target) {
        trace!(?dest, "outbound connect rejected by protect hook");
        return Err(TunnelError::Rejected);
    }

    let stream = socket.connect(dest).await?;
    let _ = stream.set_nodelay(!remote.nagle);
    Ok(stream)
}

#[cfg(unix)]
fn raw_fd(socket: &TcpSocket) -> i32 {
    use std::os::fd::AsRawFd;
    socket.as_raw_fd()
}

#[cfg(not(unix))]
fn raw_fd(_socket: &TcpSocket) -> i32 {
    -1
}
