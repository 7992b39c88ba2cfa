//! Relay pumps: one read, one write, repeat, per direction.

use bytes::BytesMut;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;
use tracing::trace;

use wirelink_link::TRANSFER_UNIT;

use crate::TunnelError;

async fn pump<R, W>(reader: &mut R, writer: &mut W) -> Result<(), TunnelError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = BytesMut::with_capacity(TRANSFER_UNIT);
    loop {
        buf.clear();
        let n = reader.read_buf(&mut buf).await?;
        if n == 0 {
            return Ok(());
        }
        writer.write_all(&buf).await?;
    }
}

async fn pump_ws_to_raw<S, W>(
    stream: &mut SplitStream<WebSocketStream<S>>,
    writer: &mut W,
) -> Result<(), TunnelError>
where
    S: AsyncRead + AsyncWrite + Unpin,
    W: AsyncWrite + Unpin,
{
    while let Some(message) = stream.next().await {
        match message? {
            msg @ (Message::Binary(_) | Message::Text(_)) => {
                let data = msg.into_data();
                if !data.is_empty() {
                    writer.write_all(&data).await?;
                }
            }
            Message::Close(_) => return Ok(()),
            // Ping/pong are answered by the protocol layer.
            _ => {}
        }
    }
    Ok(())
}

async fn pump_raw_to_ws<R, S>(
    reader: &mut R,
    sink: &mut SplitSink<WebSocketStream<S>, Message>,
) -> Result<(), TunnelError>
where
    R: AsyncRead + Unpin,
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut buf = BytesMut::with_capacity(TRANSFER_UNIT);
    loop {
        buf.clear();
        let n = reader.read_buf(&mut buf).await?;
        if n == 0 {
            return Ok(());
        }
        sink.send(Message::Binary(buf.to_vec())).await?;
    }
}

/// Pumps two byte streams into each other until either direction ends, then
/// shuts both write sides down. For a TLS stream the shutdown drives the
/// close-notify exchange.
pub(crate) async fn relay_streams<A, B>(a: A, b: B)
where
    A: AsyncRead + AsyncWrite + Unpin,
    B: AsyncRead + AsyncWrite + Unpin,
{
    let (mut a_read, mut a_write) = tokio::io::split(a);
    let (mut b_read, mut b_write) = tokio::io::split(b);
    tokio::select! {
        result = pump(&mut a_read, &mut b_write) => {
            trace!(?result, "inbound direction finished");
        }
        result = pump(&mut b_read, &mut a_write) => {
            trace!(?result, "outbound direction finished");
        }
    }
    let _ = b_write.shutdown().await;
    let _ = a_write.shutdown().await;
}

/// Pumps a WebSocket and a byte stream into each other until either
/// direction ends. Close is layered: WebSocket close frame first, then the
/// carrier (close-notify when the carrier is TLS), then the raw side.
pub(crate) async fn relay_ws<S, T>(ws: WebSocketStream<S>, raw: T)
where
    S: AsyncRead + AsyncWrite + Unpin,
    T: AsyncRead + AsyncWrite + Unpin,
{
    let (mut sink, mut stream) = ws.split();
    let (mut raw_read, mut raw_write) = tokio::io::split(raw);
    tokio::select! {
        result = pump_ws_to_raw(&mut stream, &mut raw_write) => {
            trace!(?result, "websocket direction finished");
        }
        result = pump_raw_to_ws(&mut raw_read, &mut sink) => {
            trace!(?result, "raw direction finished");
        }
    }
    if let Ok(mut ws) = sink.reunite(stream) {
        let _ = ws.close(None).await;
        let _ = ws.get_mut().shutdown().await;
    }
    let _ = raw_write.shutdown().await;
}

/// Half-closes an inbound connection whose tunnel never established.
pub(crate) async fn shutdown_stream<S>(mut stream: S)
where
    S: AsyncWrite + Unpin,
{
    let _ = stream.shutdown().await;
}
