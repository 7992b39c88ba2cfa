//! WebSocket server in, plain TCP out.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::Error as WsError;
use tokio_tungstenite::WebSocketStream;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use wirelink_io::IoHost;
use wirelink_link::{normalize_path, WsLink};

use crate::establish::{EstablishGate, Side};
use crate::guard::TeardownGuard;
use crate::{listener, outbound, path, relay, TunnelError};

/// Listener terminating a WebSocket upgrade and relaying message payloads to
/// a raw TCP connection.
pub struct WsHost {
    io: Arc<IoHost>,
    link: Arc<WsLink>,
    cancel: CancellationToken,
    guard: TeardownGuard,
}

impl WsHost {
    pub fn new(io: Arc<IoHost>, link: WsLink) -> Result<Self, TunnelError> {
        link.validate()?;
        let link = WsLink {
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
                let tunnel = WsTunnel {
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

impl Drop for WsHost {
    fn drop(&mut self) {
        self.close();
    }
}

struct WsTunnel {
    io: Arc<IoHost>,
    link: Arc<WsLink>,
}

impl WsTunnel {
    /// Both sides establish concurrently: the inbound upgrade and the
    /// outbound connect. The first failure cancels the other side; pumps
    /// start only once the gate has seen both.
    async fn run(self, local: TcpStream, peer: SocketAddr) {
        let gate = EstablishGate::new();
        let cancel = CancellationToken::new();

        let local_side = {
            let cancel = cancel.clone();
            let prefix = self.link.path.clone();
            let gate = &gate;
            async move {
                let result = tokio::select! {
                    r = accept_upgrade(local, prefix) => r,
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
                debug!(%peer, "websocket tunnel closed");
            }
            (local_result, remote_result) => {
                debug!(%peer, "websocket tunnel failed to establish");
                if let Ok(mut ws) = local_result {
                    let _ = ws.close(None).await;
                }
                if let Ok(mut remote) = remote_result {
                    let _ = remote.shutdown().await;
                }
            }
        }
    }
}

/// Accepts the upgrade, rejecting with 404 during the handshake when the
/// request target does not match the configured prefix. Shared with the
/// TLS-terminating variant.
pub(crate) async fn accept_upgrade<S>(
    stream: S,
    prefix: String,
) -> Result<WebSocketStream<S>, TunnelError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let callback = move |request: &Request, response: Response| -> Result<Response, ErrorResponse> {
        let target = request
            .uri()
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/");
        if path::check_path(&prefix, target) {
            Ok(response)
        } else {
            let mut reject = ErrorResponse::new(None);
            *reject.status_mut() = StatusCode::NOT_FOUND;
            Err(reject)
        }
    };
    match tokio_tungstenite::accept_hdr_async(stream, callback).await {
        Ok(ws) => Ok(ws),
        Err(WsError::Http(_)) => Err(TunnelError::PathMismatch),
        Err(e) => Err(e.into()),
    }
}
