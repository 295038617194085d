//! Codec trait and the JSON implementation.
//!
//! A codec turns typed values into bytes and back. Two layers need that:
//! the hub, which encodes every [`ServerEvent`](crate::ServerEvent) before
//! it goes out on a socket, and the session store, which keeps rooms as
//! opaque byte blobs under `room:<CODE>`. Both go through a [`Codec`]
//! rather than calling `serde_json` themselves, so the framing lives in one
//! place and a different format only means another implementation of the
//! trait.
//!
//! [`JsonCodec`] is the only implementation today. The browser clients
//! speak JSON, and stored rooms stay readable when inspecting a store.

use serde::{Serialize, de::DeserializeOwned};

use crate::ProtocolError;

/// Encodes values to bytes and decodes them back.
///
/// ## Trait bounds
///
/// - `Send + Sync`: one codec value is shared by every connection task,
///   and Tokio may poll those tasks on any worker thread.
/// - `'static`: the codec owns everything it needs and borrows nothing,
///   so it can live inside the long-running server state.
///
/// ## Generic methods
///
/// `encode` and `decode` are generic over the value, so the same codec
/// handles events, rooms and anything else with serde impls. `decode`
/// asks for `DeserializeOwned` rather than `Deserialize<'de>`: the decoded
/// value must not borrow from the input, because the frame buffer is
/// dropped as soon as decoding returns.
///
/// Because of those generic methods the trait is not object safe. Callers
/// take it as a type parameter or hold a concrete codec.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into bytes.
    ///
    /// # Errors
    /// Returns `ProtocolError::Encode` if serialization fails, e.g. a map
    /// with non-string keys in a format that requires them.
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes bytes back into a value.
    ///
    /// # Errors
    /// Returns `ProtocolError::Decode` if the bytes are malformed,
    /// truncated, or describe something other than `T` (an unknown event
    /// tag, a missing field, a wrong payload shape).
    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError>;
}

// ---------------------------------------------------------------------------
// JsonCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] backed by `serde_json`.
///
/// A zero-sized unit struct, so every copy behaves the same; the server
/// keeps one in its shared state and the store keeps another. Decoding
/// rejects a payload of the wrong shape but ignores fields it does not
/// know.
///
/// Behind the `json` feature, which is on by default.
///
/// ```rust
/// use crease_protocol::{ClientEvent, Codec, JsonCodec};
///
/// let codec = JsonCodec;
/// let bytes = codec.encode(&ClientEvent::Heartbeat).unwrap();
/// let decoded: ClientEvent = codec.decode(&bytes).unwrap();
/// assert_eq!(decoded, ClientEvent::Heartbeat);
///
/// let start: ClientEvent = codec
///     .decode(br#"{"event":"startOnlineMatch","data":{"code":"ABCDE"}}"#)
///     .unwrap();
/// assert_eq!(start.room_code(), Some("ABCDE"));
/// ```
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[cfg(feature = "json")]
impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}

#[cfg(all(test, feature = "json"))]
mod tests {
    use super::*;
    use crate::{Mode, PlayerInRoom, Room, RoomCode, SocketId};
    use crease_engine::Side;

    #[test]
    fn test_json_codec_room_survives_encoding() {
        let host = PlayerInRoom::new(SocketId(1), "Asha", Side::ALL[0]);
        let room = Room::new(RoomCode::parse("ABCDE").unwrap(), Mode::Quick, host);
        let bytes = JsonCodec.encode(&room).unwrap();
        let decoded: Room = JsonCodec.decode(&bytes).unwrap();
        assert_eq!(decoded, room);
    }

    #[test]
    fn test_json_codec_decode_ignores_unknown_fields() {
        let event: crate::ClientEvent = JsonCodec
            .decode(br#"{"event":"endOnlineMatch","data":{"code":"ABCDE","reason":"done"}}"#)
            .unwrap();
        assert_eq!(event.room_code(), Some("ABCDE"));
    }

    #[test]
    fn test_json_codec_decode_wrong_shape_is_error() {
        let result: Result<crate::ClientEvent, _> =
            JsonCodec.decode(br#"{"event":"matchStateUpdate","data":{"code":"ABCDE"}}"#);
        assert!(matches!(result, Err(ProtocolError::Decode(_))));
    }

    #[test]
    fn test_json_codec_decode_garbage_is_error() {
        let result: Result<Room, _> = JsonCodec.decode(b"not json");
        assert!(matches!(result, Err(ProtocolError::Decode(_))));
    }
}
