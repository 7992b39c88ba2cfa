//! TCP in, WebSocket-over-TLS client out.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream;
use tokio_rustls::TlsConnector;
use tokio_tungstenite::WebSocketStream;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use wirelink_io::IoHost;
use wirelink_link::{normalize_path, WssClientLink};

use crate::guard::TeardownGuard;
use crate::ws_client::request_uri;
use crate::{listener, outbound, relay, TunnelError};

/// Listener accepting raw TCP and framing each connection's bytes into a
/// WebSocket session over an outbound TLS client connection.
pub struct WssClientHost {
    io: Arc<IoHost>,
    link: Arc<WssClientLink>,
    connector: TlsConnector,
    cancel: CancellationToken,
    guard: TeardownGuard,
}

impl WssClientHost {
    pub fn new(io: Arc<IoHost>, link: WssClientLink) -> Result<Self, TunnelError> {
        link.validate()?;
        let config = wirelink_tls::client_config(link.tls.method, &link.tls.cipher_suites)?;
        wirelink_tls::server_name(&link.tls.sni, link.tls.remote.host)?;
        let link = WssClientLink {
            path: normalize_path(&link.path),
            ..link
        };
        Ok(Self {
            io,
            link: Arc::new(link),
            connector: TlsConnector::from(config),
            cancel: CancellationToken::new(),
            guard: TeardownGuard::new(),
        })
    }

    pub fn run(&self) -> Result<(), TunnelError> {
        let socket = listener::bind(&self.link.tls.local)?;
        let io = self.io.clone();
        let link = self.link.clone();
        let connector = self.connector.clone();
        listener::spawn_accept_loop(
            self.io.clone(),
            socket,
            self.link.tls.local.nagle,
            self.cancel.clone(),
            move |stream, peer, ctx| {
                let tunnel = WssClientTunnel {
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

impl Drop for WssClientHost {
    fn drop(&mut self) {
        self.close();
    }
}

struct WssClientTunnel {
    io: Arc<IoHost>,
    link: Arc<WssClientLink>,
    connector: TlsConnector,
}

impl WssClientTunnel {
    async fn run(self, local: TcpStream, peer: SocketAddr) {
        let ws = match self.establish(peer).await {
            Ok(ws) => ws,
            Err(e) => {
                debug!(%peer, "secure websocket client tunnel failed to establish: {}", e);
                relay::shutdown_stream(local).await;
                return;
            }
        };
        relay::relay_ws(ws, local).await;
        debug!(%peer, "secure websocket client tunnel closed");
    }

    /// Connect, TLS client handshake, then the upgrade, in that order.
    async fn establish(
        &self,
        peer: SocketAddr,
    ) -> Result<WebSocketStream<TlsStream<TcpStream>>, TunnelError> {
        let stream = outbound::connect_remote(&self.io, &self.link.tls.remote, peer).await?;
        let name = wirelink_tls::server_name(&self.link.tls.sni, self.link.tls.remote.host)?;
        let tls = self.connector.connect(name, stream).await?;
        let uri = request_uri(
            "wss",
            &self.link.tls.sni,
            &self.link.tls.remote,
            &self.link.path,
        );
        let (ws, _response) = tokio_tungstenite::client_async(uri, tls).await?;
        Ok(ws)
    }
}
