//! TLS-terminating WebSocket server in, plain TCP out.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio_rustls::server::TlsStream;
use tokio_rustls::TlsAcceptor;
use tokio_tungstenite::WebSocketStream;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use wirelink_io::IoHost;
use wirelink_link::{normalize_path, WssLink};

use crate::establish::{EstablishGate, Side};
use crate::guard::TeardownGuard;
use crate::ws::accept_upgrade;
use crate::{listener, outbound, relay, TunnelError};

/// Listener terminating TLS, then a WebSocket upgrade, relaying message
/// payloads to a raw TCP connection.
pub struct WssHost {
    io: Arc<IoHost>,
    link: Arc<WssLink>,
    acceptor: TlsAcceptor,
    cancel: CancellationToken,
    guard: TeardownGuard,
}

impl WssHost {
    /// Fails when the link is invalid or the certificate material cannot be
    /// loaded; no socket is opened in either case.
    pub fn new(io: Arc<IoHost>, link: WssLink) -> Result<Self, TunnelError> {
        link.validate()?;
        let config = wirelink_tls::server_config(
            link.method,
            &link.cert_file,
            &link.key_file,
            &link.key_pass,
            &link.cipher_suites,
        )?;
        let link = WssLink {
            path: normalize_path(&link.path),
            ..link
        };
        Ok(Self {
            io,
            link: Arc::new(link),
            acceptor: TlsAcceptor::from(config),
            cancel: CancellationToken::new(),
            guard: TeardownGuard::new(),
        })
    }

    pub fn run(&self) -> Result<(), TunnelError> {
        let socket = listener::bind(&self.link.local)?;
        let io = self.io.clone();
        let link = self.link.clone();
        let acceptor = self.acceptor.clone();
        listener::spawn_accept_loop(
            self.io.clone(),
            socket,
            self.link.local.nagle,
            self.cancel.clone(),
            move |stream, peer, ctx| {
                let tunnel = WssTunnel {
                    io: io.clone(),
                    link: link.clone(),
                    acceptor: acceptor.clone(),
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

impl Drop for WssHost {
    fn drop(&mut self) {
        self.close();
    }
}

struct WssTunnel {
    io: Arc<IoHost>,
    link: Arc<WssLink>,
    acceptor: TlsAcceptor,
}

impl WssTunnel {
    /// Same dual-readiness shape as the plain WebSocket variant, with the
    /// inbound side layered: TLS accept strictly before the upgrade.
    async fn run(self, local: TcpStream, peer: SocketAddr) {
        let gate = EstablishGate::new();
        let cancel = CancellationToken::new();

        let local_side = {
            let cancel = cancel.clone();
            let acceptor = self.acceptor.clone();
            let prefix = self.link.path.clone();
            let gate = &gate;
            async move {
                let result = tokio::select! {
                    r = accept_layered(acceptor, local, prefix) => r,
                    _ = cancel.cancelled() => Err(TunnelError::Canceled),
                };
                match &result {
                    Ok(_) => {
                        gate.signal(Side::Local);
                    }
                    Err(_) => cancel.cancel(),
                }
                result
            }
        };
        let remote_side = {
            let cancel = cancel.clone();
            let io = self.io.clone();
            let remote = self.link.remote;
            let gate = &gate;
            async move {
                let result = tokio::select! {
                    r = outbound::connect_remote(&io, &remote, peer) => r,
                    _ = cancel.cancelled() => Err(TunnelError::Canceled),
                };
                match &result {
                    Ok(_) => {
                        gate.signal(Side::Remote);
                    }
                    Err(_) => cancel.cancel(),
                }
                result
            }
        };

        let (local_result, remote_result) = tokio::join!(local_side, remote_side);
        match (local_result, remote_result) {
            (Ok(ws), Ok(remote)) if gate.is_ready() => {
                relay::relay_ws(ws, remote).await;
                debug!(%peer, "secure websocket tunnel closed");
            }
            (local_result, remote_result) => {
                debug!(%peer, "secure websocket tunnel failed to establish");
                if let Ok(mut ws) = local_result {
                    let _ = ws.close(None).await;
                    let _ = ws.get_mut().shutdown().await;
                }
                if let Ok(mut remote) = remote_result {
                    let _ = remote.shutdown().await;
                }
            }
        }
    }
}

async fn accept_layered(
    acceptor: TlsAcceptor,
    stream: TcpStream,
    prefix: String,
) -> Result<WebSocketStream<TlsStream<TcpStream>>, TunnelError> {
    let tls = acceptor.accept(stream).await?;
    accept_upgrade(tls, prefix).await
}
