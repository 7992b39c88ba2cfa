//! Listener socket assembly and the shared accept loop.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use wirelink_io::{IoContext, IoHost};
use wirelink_link::{sockopt, LinkAddr};

use crate::TunnelError;

/// Binds the listening socket for `local` while the caller is still on its
/// own thread; the async accept loop adopts it afterwards.
pub(crate) fn bind(local: &LinkAddr) -> Result<std::net::TcpListener, TunnelError> {
    Ok(sockopt::build_listener(local.endpoint())?)
}

/// Spawns the accept loop on the host's default context. Accept errors are
/// logged and the loop re-arms; it exits when `cancel` fires or the host is
/// closed. Every accepted connection is tuned and handed to `spawn_tunnel`
/// together with a round-robin relay context.
pub(crate) fn spawn_accept_loop<F>(
    io: Arc<IoHost>,
    listener: std::net::TcpListener,
    local_nagle: bool,
    cancel: CancellationToken,
    spawn_tunnel: F,
) -> Result<(), TunnelError>
where
    F: Fn(TcpStream, SocketAddr, Arc<IoContext>) + Send + Sync + 'static,
{
    let default = io.default_context().ok_or(TunnelError::HostStopped)?;
    let listener = {
        let _guard = default.handle().enter();
        TcpListener::from_std(listener)?
    };
    default.spawn(async move {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("listener closed");
                    break;
                }
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        sockopt::tune_stream(&stream, local_nagle);
                        match io.get() {
                            Some(ctx) => spawn_tunnel(stream, peer, ctx),
                            None => {
                                debug!("execution host closed, stopping listener");
                                break;
                            }
                        }
                    }
                    Err(e) => {
                        warn!("accept failed: {}", e);
                    }
                }
            }
        }
    });
    Ok(())
}
