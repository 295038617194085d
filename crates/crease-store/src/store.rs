//! The typed room store.

use std::collections::HashMap;
use std::sync::Arc;

use crease_protocol::{Codec, JsonCodec, Room, RoomCode, SocketId};
use tokio::sync::Mutex;
use tracing::{debug, trace};

use crate::{KeyValueStore, MemoryStore, StoreConfig, StoreError};

const ROOM_PREFIX: &str = "room:";
const SOCKET_PREFIX: &str = "socket:";

fn room_key(code: &RoomCode) -> String {
    format!("{ROOM_PREFIX}{code}")
}

fn socket_key(socket: SocketId) -> String {
    format!("{SOCKET_PREFIX}{}", socket.0)
}

/// Result of [`SessionStore::update_room`].
#[derive(Debug)]
pub struct Updated<T> {
    /// Whatever the mutation returned.
    pub value: T,
    /// The room as written, or `None` if the mutation emptied it and it was
    /// deleted.
    pub room: Option<Room>,
}

/// Rooms and the socket index on top of a [`KeyValueStore`].
///
/// Share it behind an `Arc`. Every method takes `&self`.
pub struct SessionStore<S = MemoryStore> {
    backend: S,
    codec: JsonCodec,
    config: StoreConfig,
    /// One async lock per room code, taken for the whole of a
    /// read-modify-write.
    locks: Mutex<HashMap<RoomCode, Arc<Mutex<()>>>>,
}

impl SessionStore<MemoryStore> {
    /// A store backed by process memory.
    pub fn in_memory(config: StoreConfig) -> Self {
        Self::new(MemoryStore::new(), config)
    }
}

impl<S: KeyValueStore> SessionStore<S> {
    pub fn new(backend: S, config: StoreConfig) -> Self {
        Self {
            backend,
            codec: JsonCodec,
            config,
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    // -- Rooms ------------------------------------------------------------

    /// Loads a room, `None` if it does not exist (or expired).
    pub async fn room(&self, code: &RoomCode) -> Result<Option<Room>, StoreError> {
        match self.backend.get(&room_key(code)).await? {
            Some(bytes) => Ok(Some(self.codec.decode(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Writes a room as-is and refreshes its TTL.
    pub async fn put_room(&self, room: &Room) -> Result<(), StoreError> {
        let bytes = self.codec.encode(room)?;
        self.backend
            .set(&room_key(&room.code), bytes, self.config.room_ttl)
            .await
    }

    /// Deletes a room. Returns whether it existed.
    pub async fn delete_room(&self, code: &RoomCode) -> Result<bool, StoreError> {
        let existed = self.backend.delete(&room_key(code)).await?;
        if existed {
            debug!(%code, "room deleted");
        }
        Ok(existed)
    }

    pub async fn room_exists(&self, code: &RoomCode) -> Result<bool, StoreError> {
        self.backend.exists(&room_key(code)).await
    }

    /// Writes `room` only if no room with its code exists. Returns whether
    /// it was written.
    pub async fn insert_room_if_absent(&self, room: &Room) -> Result<bool, StoreError> {
        let lock = self.lock_for(&room.code).await;
        let _guard = lock.lock().await;
        if self.room_exists(&room.code).await? {
            return Ok(false);
        }
        self.put_room(room).await?;
        Ok(true)
    }

    /// Codes of every live room, sorted.
    pub async fn room_codes(&self) -> Result<Vec<RoomCode>, StoreError> {
        let keys = self.backend.keys(ROOM_PREFIX).await?;
        let mut codes: Vec<RoomCode> = keys
            .iter()
            .filter_map(|k| k.strip_prefix(ROOM_PREFIX))
            .filter_map(|code| RoomCode::parse(code).ok())
            .collect();
        codes.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        Ok(codes)
    }

    /// Read → mutate → write, serialized per room.
    ///
    /// `mutate` runs on a fresh copy of the stored room while the room's
    /// lock is held, so concurrent updates to one room never overwrite each
    /// other. If it returns `Err` nothing is written. Otherwise the room is
    /// written with `version` bumped, or deleted if it has no players left.
    ///
    /// # Errors
    /// - `StoreError::RoomMissing` (converted into `E`) if the room does
    ///   not exist.
    /// - Any error `mutate` returns.
    pub async fn update_room<T, E, F>(
        &self,
        code: &RoomCode,
        mutate: F,
    ) -> Result<Updated<T>, E>
    where
        F: FnOnce(&mut Room) -> Result<T, E> + Send,
        T: Send,
        E: From<StoreError> + Send,
    {
        let lock = self.lock_for(code).await;
        let _guard = lock.lock().await;

        let mut room = self
            .room(code)
            .await?
            .ok_or_else(|| StoreError::RoomMissing(code.clone()))?;
        let value = mutate(&mut room)?;

        if room.players.is_empty() {
            self.backend.delete(&room_key(code)).await?;
            debug!(%code, "last player left, room deleted");
            return Ok(Updated { value, room: None });
        }

        room.version += 1;
        self.put_room(&room).await?;
        trace!(%code, version = room.version, "room updated");
        Ok(Updated {
            value,
            room: Some(room),
        })
    }

    // -- Socket index -----------------------------------------------------

    /// The room a socket is in, if any.
    pub async fn socket_room(&self, socket: SocketId) -> Result<Option<RoomCode>, StoreError> {
        let Some(bytes) = self.backend.get(&socket_key(socket)).await? else {
            return Ok(None);
        };
        Ok(Some(self.codec.decode(&bytes)?))
    }

    pub async fn bind_socket(&self, socket: SocketId, code: &RoomCode) -> Result<(), StoreError> {
        let bytes = self.codec.encode(code)?;
        self.backend
            .set(&socket_key(socket), bytes, self.config.room_ttl)
            .await
    }

    /// Removes a socket's index entry. Returns whether it existed.
    pub async fn unbind_socket(&self, socket: SocketId) -> Result<bool, StoreError> {
        self.backend.delete(&socket_key(socket)).await
    }

    // -- Housekeeping -----------------------------------------------------

    /// Drops expired keys and the locks of rooms that no longer exist.
    /// Returns how many keys were removed.
    pub async fn purge_expired(&self) -> usize {
        let purged = self.backend.purge_expired().await;

        let candidates: Vec<RoomCode> = {
            let locks = self.locks.lock().await;
            locks
                .iter()
                .filter(|(_, lock)| Arc::strong_count(*lock) == 1)
                .map(|(code, _)| code.clone())
                .collect()
        };
        let mut idle = Vec::new();
        for code in candidates {
            if !self.room_exists(&code).await.unwrap_or(true) {
                idle.push(code);
            }
        }
        if !idle.is_empty() {
            let mut locks = self.locks.lock().await;
            for code in &idle {
                if locks.get(code).is_some_and(|l| Arc::strong_count(l) == 1) {
                    locks.remove(code);
                }
            }
        }

        if purged > 0 {
            debug!(purged, locks_dropped = idle.len(), "store swept");
        }
        purged
    }

    async fn lock_for(&self, code: &RoomCode) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        Arc::clone(locks.entry(code.clone()).or_default())
    }

    #[cfg(test)]
    async fn lock_count(&self) -> usize {
        self.locks.lock().await.len()
    }
}

// =========================================================================
// Tests
// =========================================================================
