//! Plain TCP port forward.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use wirelink_io::IoHost;
use wirelink_link::TcpForwardLink;

use crate::guard::TeardownGuard;
use crate::{listener, outbound, relay, TunnelError};

/// Listener accepting plain TCP and relaying each connection to the link's
/// remote endpoint.
pub struct TcpForwardHost {
    io: Arc<IoHost>,
    link: Arc<TcpForwardLink>,
    cancel: CancellationToken,
    guard: TeardownGuard,
}

impl TcpForwardHost {
    pub fn new(io: Arc<IoHost>, link: TcpForwardLink) -> Result<Self, TunnelError> {
        link.validate()?;
        Ok(Self {
            io,
            link: Arc::new(link),
            cancel: CancellationToken::new(),
            guard: TeardownGuard::new(),
        })
    }

    /// Binds the local endpoint and starts accepting. On error the listener
    /// stays inert and can be dropped.
    pub fn run(&self) -> Result<(), TunnelError> {
        let socket = listener::bind(&self.link.local)?;
        let io = self.io.clone();
        let link = self.link.clone();
        listener::spawn_accept_loop(
            self.io.clone(),
            socket,
            self.link.local.nagle,
            self.cancel.clone(),
            move |stream, peer, ctx| {
                let tunnel = TcpForwardTunnel {
                    io: io.clone(),
                    link: link.clone(),
                };
                ctx.spawn(tunnel.run(stream, peer));
            },
        )
    }

    /// Stops accepting. Tunnels already running keep their own lifetime.
    pub fn close(&self) {
        if self.guard.arm() {
            self.cancel.cancel();
        }
    }
}

impl Drop for TcpForwardHost {
    fn drop(&mut self) {
        self.close();
    }
}

struct TcpForwardTunnel {
    io: Arc<IoHost>,
    link: Arc<TcpForwardLink>,
}

impl TcpForwardTunnel {
    async fn run(self, local: TcpStream, peer: SocketAddr) {
        let remote = match outbound::connect_remote(&self.io, &self.link.remote, peer).await {
            Ok(remote) => remote,
            Err(e) => {
                debug!(%peer, "tcp forward tunnel failed to establish: {}", e);
                relay::shutdown_stream(local).await;
                return;
            }
        };
        relay::relay_streams(local, remote).await;
        debug!(%peer, "tcp forward tunnel closed");
    }
}
