//! TCP in, WebSocket client out.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use tokio::net::TcpStream;
use tokio_tungstenite::WebSocketStream;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use wirelink_io::IoHost;
use wirelink_link::{normalize_path, LinkAddr, WsClientLink};

use crate::guard::TeardownGuard;
use crate::{listener, outbound, relay, TunnelError};

/// Listener accepting raw TCP and framing each connection's bytes into a
/// WebSocket client session toward the remote endpoint.
pub struct WsClientHost {
    io: Arc<IoHost>,
    link: Arc<WsClientLink>,
    cancel: CancellationToken,
    guard: TeardownGuard,
}

impl WsClientHost {
    pub fn new(io: Arc<IoHost>, link: WsClientLink) -> Result<Self, TunnelError> {
        link.validate()?;
        let link = WsClientLink {
            path: normalize_path(&link.path),
            ..link
        };
        Ok(Self {
            io,
            link: Arc::new(link),
            cancel: CancellationToken::new(),
            guard: TeardownGuard::new(),
        })
    }

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
                let tunnel = WsClientTunnel {
                    io: io.clone(),
                    link: link.clone(),
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

impl Drop for WsClientHost {
    fn drop(&mut self) {
        self.close();
    }
}

struct WsClientTunnel {
    io: Arc<IoHost>,
    link: Arc<WsClientLink>,
}

impl WsClientTunnel {
    async fn run(self, local: TcpStream, peer: SocketAddr) {
        let ws = match self.establish(peer).await {
            Ok(ws) => ws,
            Err(e) => {
                debug!(%peer, "websocket client tunnel failed to establish: {}", e);
                relay::shutdown_stream(local).await;
                return;
            }
        };
        relay::relay_ws(ws, local).await;
        debug!(%peer, "websocket client tunnel closed");
    }

    async fn establish(
        &self,
        peer: SocketAddr,
    ) -> Result<WebSocketStream<TcpStream>, TunnelError> {
        let stream = outbound::connect_remote(&self.io, &self.link.remote, peer).await?;
        let uri = request_uri("ws", &self.link.sni, &self.link.remote, &self.link.path);
        let (ws, _response) = tokio_tungstenite::client_async(uri, stream).await?;
        Ok(ws)
    }
}

/// Request URI for the client handshake. The host part doubles as the Host
/// header: the configured name when present, the remote IP otherwise.
pub(crate) fn request_uri(scheme: &str, sni: &str, remote: &LinkAddr, path: &str) -> String {
    let host = if sni.is_empty() {
        match remote.host {
            IpAddr::V4(ip) => ip.to_string(),
            IpAddr::V6(ip) => format!("[{}]", ip),
        }
    } else {
        sni.to_string()
    };
    let slash = if path.starts_with('/') { "" } else { "/" };
    format!("{}://{}:{}{}{}", scheme, host, remote.port, slash, path)
}
