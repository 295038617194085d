//! Outbound fan-out: which socket gets which event.
//!
//! Every connection task registers an [`Outbox`] here when it starts. Any
//! task can then reach any socket by id without touching the socket
//! itself: the hub encodes the event once, clones the frame per target and
//! pushes it into the target's channel. The connection's writer task
//! drains that channel onto the wire.
//!
//! The hub knows nothing about rooms. Callers pass the [`Room`] they just
//! read or wrote, and [`Room::recipients`] turns a [`Recipient`] into the
//! socket ids to reach. A socket that disconnected in the meantime is
//! simply missing from the map and skipped.

use std::collections::HashMap;

use crease_protocol::{Codec, JsonCodec, ProtocolError, Recipient, Room, ServerEvent, SocketId};
use tokio::sync::{RwLock, mpsc};
use tokio_tungstenite::tungstenite::Message;
use tracing::trace;

/// Sender feeding one connection's writer task.
pub(crate) type Outbox = mpsc::UnboundedSender<Message>;

/// Every live connection's outbox, keyed by socket.
///
/// The map sits behind a Tokio `RwLock`: sends and broadcasts only read
/// it and run concurrently, while register and unregister take the write
/// lock briefly. Pushing into an unbounded channel never waits, so no
/// send holds the read lock across a slow socket.
#[derive(Default)]
pub(crate) struct Hub {
    sockets: RwLock<HashMap<SocketId, Outbox>>,
    codec: JsonCodec,
}

impl Hub {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) async fn register(&self, socket: SocketId, outbox: Outbox) {
        self.sockets.write().await.insert(socket, outbox);
    }

    /// Drops the socket's outbox, which lets its writer close the socket.
    pub(crate) async fn unregister(&self, socket: SocketId) -> bool {
        self.sockets.write().await.remove(&socket).is_some()
    }

    /// How many sockets are registered.
    pub(crate) async fn connections(&self) -> usize {
        self.sockets.read().await.len()
    }

    /// Sends `event` to one socket. A socket that is gone is skipped.
    pub(crate) async fn send(&self, socket: SocketId, event: &ServerEvent) -> Result<(), ProtocolError> {
        let frame = self.frame(event)?;
        let sockets = self.sockets.read().await;
        deliver(&sockets, socket, frame, event);
        Ok(())
    }

    /// Sends `event` to the sockets of `room` that `recipient` selects.
    /// The frame is encoded once. Returns how many sockets got it.
    pub(crate) async fn broadcast(
        &self,
        room: &Room,
        recipient: &Recipient,
        event: &ServerEvent,
    ) -> Result<usize, ProtocolError> {
        let targets = room.recipients(recipient);
        if targets.is_empty() {
            return Ok(0);
        }
        let frame = self.frame(event)?;
        let sockets = self.sockets.read().await;
        Ok(targets
            .into_iter()
            .filter(|socket| deliver(&sockets, *socket, frame.clone(), event))
            .count())
    }

    /// JSON goes out as a text frame.
    fn frame(&self, event: &ServerEvent) -> Result<Message, ProtocolError> {
        let bytes = self.codec.encode(event)?;
        Ok(match String::from_utf8(bytes) {
            Ok(text) => Message::text(text),
            Err(raw) => Message::binary(raw.into_bytes()),
        })
    }
}

fn deliver(
    sockets: &HashMap<SocketId, Outbox>,
    socket: SocketId,
    frame: Message,
    event: &ServerEvent,
) -> bool {
    match sockets.get(&socket) {
        Some(outbox) if outbox.send(frame).is_ok() => {
            trace!(%socket, event = event.name(), "event queued");
            true
        }
        _ => {
            trace!(%socket, event = event.name(), "socket gone, event dropped");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crease_engine::Side;
    use crease_protocol::{Mode, PlayerInRoom, RoomCode};

    fn room_of(sockets: &[u64]) -> Room {
        let mut room = Room::new(
            RoomCode::parse("HUBBY").unwrap(),
            Mode::Tournament,
            PlayerInRoom::new(SocketId(sockets[0]), "P0", Side::ALL[0]),
        );
        for (i, id) in sockets.iter().enumerate().skip(1) {
            room.players
                .push(PlayerInRoom::new(SocketId(*id), &format!("P{i}"), Side::ALL[i]));
        }
        room
    }

    fn text(msg: Message) -> String {
        msg.into_text().unwrap().as_str().to_string()
    }

    #[tokio::test]
    async fn test_broadcast_all_except_skips_sender() {
        let hub = Hub::new();
        let (tx1, mut rx1) = mpsc::unbounded_channel();
        let (tx2, mut rx2) = mpsc::unbounded_channel();
        hub.register(SocketId(1), tx1).await;
        hub.register(SocketId(2), tx2).await;

        let room = room_of(&[1, 2]);
        let sent = hub
            .broadcast(&room, &Recipient::AllExcept(SocketId(1)), &ServerEvent::EndOnlineMatch)
            .await
            .unwrap();

        assert_eq!(sent, 1);
        assert!(rx1.try_recv().is_err());
        assert_eq!(text(rx2.try_recv().unwrap()), r#"{"event":"endOnlineMatch"}"#);
    }

    #[tokio::test]
    async fn test_broadcast_skips_unregistered_members() {
        let hub = Hub::new();
        let (tx1, mut rx1) = mpsc::unbounded_channel();
        hub.register(SocketId(1), tx1).await;

        let room = room_of(&[1, 2, 3]);
        let sent = hub
            .broadcast(&room, &Recipient::All, &ServerEvent::StartOnlineMatch)
            .await
            .unwrap();
        assert_eq!(sent, 1);
        assert!(rx1.try_recv().is_ok());
    }

    #[tokio::test]
    async fn test_unregister_closes_channel() {
        let hub = Hub::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        hub.register(SocketId(5), tx).await;
        assert_eq!(hub.connections().await, 1);

        assert!(hub.unregister(SocketId(5)).await);
        assert!(!hub.unregister(SocketId(5)).await);
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_send_to_unknown_socket_is_ok() {
        let hub = Hub::new();
        hub.send(SocketId(42), &ServerEvent::HeartbeatAck).await.unwrap();
    }
}
