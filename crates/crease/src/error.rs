//! Unified error type for the server.

use crease_engine::EngineError;
use crease_protocol::ProtocolError;
use crease_room::RoomError;
use crease_store::StoreError;
use tokio_tungstenite::tungstenite;

/// Errors from the WebSocket layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Binding or accepting TCP connections failed.
    #[error("accept failed: {0}")]
    AcceptFailed(#[source] std::io::Error),

    /// The WebSocket upgrade did not complete.
    #[error("websocket handshake failed: {0}")]
    Handshake(#[source] tungstenite::Error),

    /// Reading a frame failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(#[source] tungstenite::Error),
}

/// Top-level error wrapping every crate-specific error.
///
/// Only setup and connection-level failures surface as this type. A
/// rejected client command becomes a scoped error event instead.
#[derive(Debug, thiserror::Error)]
pub enum CreaseError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Room(#[from] RoomError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    /// An environment variable held a value that does not parse.
    #[error("invalid value {value:?} for {var}")]
    Config { var: &'static str, value: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crease_protocol::RoomCode;

    #[test]
    fn test_from_room_error_keeps_message() {
        let code = RoomCode::parse("ABCDE").unwrap();
        let err: CreaseError = RoomError::NotFound(code).into();
        assert!(matches!(err, CreaseError::Room(_)));
        assert_eq!(err.to_string(), "room ABCDE not found");
    }

    #[test]
    fn test_from_store_error() {
        let err: CreaseError = StoreError::Unavailable("down".into()).into();
        assert!(matches!(err, CreaseError::Store(_)));
    }

    #[test]
    fn test_from_engine_error() {
        let err: CreaseError = EngineError::MatchOver.into();
        assert!(matches!(err, CreaseError::Engine(EngineError::MatchOver)));
    }

    #[test]
    fn test_config_error_names_variable() {
        let err = CreaseError::Config {
            var: "CREASE_ROOM_TTL_SECS",
            value: "soon".into(),
        };
        assert!(err.to_string().contains("CREASE_ROOM_TTL_SECS"));
    }
}
