//! Storage for Crease.
//!
//! Two layers:
//!
//! 1. **Backend** ([`KeyValueStore`] trait, [`MemoryStore`]): opaque bytes
//!    under string keys, each with a time-to-live.
//! 2. **Typed store** ([`SessionStore`]): rooms under `room:<CODE>` and the
//!    socket → room index under `socket:<ID>`, encoded with the protocol
//!    codec. Read-modify-write on a room goes through
//!    [`SessionStore::update_room`], which serializes writers per room.
//!
//! ```text
//! Coordinators ──▶ SessionStore (Room, per-room lock) ──▶ KeyValueStore (bytes, TTL)
//! ```

mod backend;
mod config;
mod error;
mod store;

pub use backend::{KeyValueStore, MemoryStore};
pub use config::StoreConfig;
pub use error::StoreError;
pub use store::{SessionStore, Updated};
