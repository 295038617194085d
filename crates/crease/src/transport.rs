//! WebSocket accept and the two halves of a connection.
//!
//! The reading half stays with the connection task. The writing half is
//! moved into its own task fed by an unbounded channel, so broadcasts from
//! other tasks never wait on a slow reader.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};

use crease_protocol::SocketId;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, trace};

use crate::TransportError;

/// Counter for socket ids. Never reused within a process.
static NEXT_SOCKET_ID: AtomicU64 = AtomicU64::new(1);

type WsStream = WebSocketStream<TcpStream>;

/// Listens for TCP connections to upgrade.
pub struct WebSocketTransport {
    listener: TcpListener,
}

impl WebSocketTransport {
    pub async fn bind(addr: &str) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(TransportError::AcceptFailed)?;
        info!(addr, "WebSocket transport listening");
        Ok(Self { listener })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, TransportError> {
        self.listener.local_addr().map_err(TransportError::AcceptFailed)
    }

    /// Waits for the next TCP connection. The WebSocket upgrade happens
    /// later in [`upgrade`], off the accept loop.
    pub async fn accept(&self) -> Result<(TcpStream, SocketAddr), TransportError> {
        self.listener
            .accept()
            .await
            .map_err(TransportError::AcceptFailed)
    }
}

/// Completes the WebSocket handshake and assigns a [`SocketId`].
pub async fn upgrade(
    stream: TcpStream,
    addr: SocketAddr,
) -> Result<WebSocketConnection, TransportError> {
    let ws = tokio_tungstenite::accept_async(stream)
        .await
        .map_err(TransportError::Handshake)?;
    let id = SocketId(NEXT_SOCKET_ID.fetch_add(1, Ordering::Relaxed));
    debug!(socket = %id, %addr, "accepted WebSocket connection");
    Ok(WebSocketConnection { id, ws })
}

/// One upgraded connection, not yet split.
pub struct WebSocketConnection {
    id: SocketId,
    ws: WsStream,
}

impl WebSocketConnection {
    pub fn id(&self) -> SocketId {
        self.id
    }

    /// Splits into a reader and a writer task draining `outbox`.
    ///
    /// The writer closes the socket once every sender of `outbox` is gone.
    pub fn split(self, outbox: mpsc::UnboundedReceiver<Message>) -> (FrameReader, JoinHandle<()>) {
        let (sink, stream) = self.ws.split();
        let writer = tokio::spawn(write_frames(self.id, sink, outbox));
        let reader = FrameReader {
            id: self.id,
            stream,
        };
        (reader, writer)
    }
}

/// The receiving half.
pub struct FrameReader {
    id: SocketId,
    stream: SplitStream<WsStream>,
}

impl FrameReader {
    /// The next text or binary frame as bytes.
    ///
    /// Returns `Ok(None)` on a close frame or end of stream. Pings and
    /// pongs are skipped; tungstenite answers pings itself.
    pub async fn recv(&mut self) -> Result<Option<Vec<u8>>, TransportError> {
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => return Ok(Some(text.as_bytes().to_vec())),
                Some(Ok(Message::Binary(data))) => return Ok(Some(data.to_vec())),
                Some(Ok(Message::Close(_))) | None => {
                    trace!(socket = %self.id, "peer closed");
                    return Ok(None);
                }
                Some(Ok(_)) => continue,
                Some(Err(e)) => return Err(TransportError::ReceiveFailed(e)),
            }
        }
    }
}

async fn write_frames(
    id: SocketId,
    mut sink: SplitSink<WsStream, Message>,
    mut outbox: mpsc::UnboundedReceiver<Message>,
) {
    while let Some(frame) = outbox.recv().await {
        if let Err(e) = sink.send(frame).await {
            debug!(socket = %id, error = %e, "write failed, writer stopping");
            return;
        }
    }
    let _ = sink.close().await;
    trace!(socket = %id, "writer closed");
}
