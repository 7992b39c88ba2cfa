//! Socket option helpers.
//!
//! Listener assembly goes through `socket2` so the socket can be configured
//! between `socket()` and `listen()`. The transport hints (DSCP marking,
//! TCP fast-open, path-MTU discovery) are best-effort raw setsockopt calls:
//! failures are ignored, unsupported platforms compile them out.

use std::io;
use std::net::SocketAddr;

use socket2::{Domain, Protocol, Socket, Type};

use crate::LISTEN_BACKLOG;

/// Low-delay DSCP/TOS marking (AF41).
#[cfg(unix)]
const TOS_LOW_DELAY: libc::c_int = 0x68;

/// Builds a bound, listening, non-blocking socket for `local`, ready to hand
/// to the async runtime.
pub fn build_listener(local: SocketAddr) -> io::Result<std::net::TcpListener> {
    let domain = if local.is_ipv4() {
        Domain::IPV4
    } else {
        Domain::IPV6
    };
    let socket = Socket::new(domain, Type::STREAM, Some(Protocol::TCP))?;
    socket.set_reuse_address(true)?;
    set_fast_open(&socket);
    set_transport_hints(&socket, local.is_ipv4());
    socket.bind(&local.into())?;
    socket.listen(LISTEN_BACKLOG)?;
    socket.set_nonblocking(true)?;
    Ok(socket.into())
}

/// Per-connection tuning applied to accepted and dialed streams.
pub fn tune_stream(stream: &tokio::net::TcpStream, nagle: bool) {
    let _ = stream.set_nodelay(!nagle);
    let v4 = stream.local_addr().map(|a| a.is_ipv4()).unwrap_or(true);
    set_transport_hints(stream, v4);
}

#[cfg(unix)]
fn setsockopt_int(fd: std::os::fd::RawFd, level: libc::c_int, name: libc::c_int, value: libc::c_int) {
    unsafe {
        libc::setsockopt(
            fd,
            level,
            name,
            &value as *const libc::c_int as *const libc::c_void,
            std::mem::size_of::<libc::c_int>() as libc::socklen_t,
        );
    }
}

/// Enables TCP fast-open where the platform has it.
#[cfg(unix)]
pub fn set_fast_open<S: std::os::fd::AsRawFd>(socket: &S) {
    #[cfg(target_os = "linux")]
    setsockopt_int(socket.as_raw_fd(), libc::IPPROTO_TCP, libc::TCP_FASTOPEN, 1);
    #[cfg(not(target_os = "linux"))]
    let _ = socket;
}

#[cfg(not(unix))]
pub fn set_fast_open<S>(_socket: &S) {}

/// DSCP marking plus a path-MTU discovery hint.
#[cfg(unix)]
pub fn set_transport_hints<S: std::os::fd::AsRawFd>(socket: &S, v4: bool) {
    let fd = socket.as_raw_fd();
    if v4 {
        setsockopt_int(fd, libc::IPPROTO_IP, libc::IP_TOS, TOS_LOW_DELAY);
        #[cfg(target_os = "linux")]
        setsockopt_int(
            fd,
            libc::IPPROTO_IP,
            libc::IP_MTU_DISCOVER,
            libc::IP_PMTUDISC_WANT,
        );
    } else {
        setsockopt_int(fd, libc::IPPROTO_IPV6, libc::IPV6_TCLASS, TOS_LOW_DELAY);
        #[cfg(target_os = "linux")]
        setsockopt_int(
            fd,
            libc::IPPROTO_IPV6,
            libc::IPV6_MTU_DISCOVER,
            libc::IP_PMTUDISC_WANT,
        );
    }
}

#[cfg(not(unix))]
pub fn set_transport_hints<S>(_socket: &S, _v4: bool) {}
