//! TCP in, TLS client out.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpStream;
use tokio_rustls::client;
use tokio_rustls::TlsConnector;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use wirelink_io::IoHost;
use wirelink_link::TlsClientLink;

use crate::guard::TeardownGuard;
use crate::{listener, outbound, relay, TunnelError};

/// Listener accepting plain TCP and wrapping the outbound side of each
/// connection in a TLS client session.
pub struct TlsClientHost {
    io: Arc<IoHost>,
    link: Arc<TlsClientLink>,
    connector: TlsConnector,
    cancel: CancellationToken,
    guard: TeardownGuard,
}

impl TlsClientHost {
    pub fn new(io: Arc<IoHost>, link: TlsClientLink) -> Result<Self, TunnelError> {
        link.validate()?;
        let config = wirelink_tls::client_config(link.method, &link.cipher_suites)?;
        // A bad server name must fail construction, not the first tunnel.
        wirelink_tls::server_name(&link.sni, link.remote.host)?;
        Ok(Self {
            io,
            link: Arc::new(link),
            connector: TlsConnector::from(config),
            cancel: CancellationToken::new(),
            guard: TeardownGuard::new(),
        })
    }

    pub fn run(&self) -> Result<(), TunnelError> {
        let socket = listener::bind(&self.link.local)?;
        let io = self.io.clone();
        let link = self.link.clone();
        let connector = self.connector.clone();
        listener::spawn_accept_loop(
            self.io.clone(),
            socket,
            self.link.local.nagle,
            self.cancel.clone(),
            move |stream, peer, ctx| {
                let tunnel = TlsClientTunnel {
                    io: io.clone(),
                    link: link.clone(),
                    connector: connector.clone(),
                };
                ctx.spawn(tunnel.run(stream, peer));
            },
        )
    }

    pub fn close(&self) {
        if self.guard.arm() {
            self.cancel.cancel();
        }
    }
}

impl Drop for TlsClientHost {
    fn drop(&mut self) {
        self.close();
    }
}

struct TlsClientTunnel {
    io: Arc<IoHost>,
    link: Arc<TlsClientLink>,
    connector: TlsConnector,
}

impl TlsClientTunnel {
    async fn run(self, local: TcpStream, peer: SocketAddr) {
        let remote = match self.establish(peer).await {
            Ok(remote) => remote,
            Err(e) => {
                debug!(%peer, "tls client tunnel failed to establish: {}", e);
                relay::shutdown_stream(local).await;
                return;
            }
        };
        relay::relay_streams(local, remote).await;
        debug!(%peer, "tls client tunnel closed");
    }

    async fn establish(&self, peer: SocketAddr) -> Result<client::TlsStream<TcpStream>, TunnelError> {
        let stream = outbound::connect_remote(&self.io, &self.link.remote, peer).await?;
        let name = wirelink_tls::server_name(&self.link.sni, self.link.remote.host)?;
        Ok(self.connector.connect(name, stream).await?)
    }
}
