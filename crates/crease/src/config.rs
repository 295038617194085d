//! Server configuration.

use std::str::FromStr;
use std::time::Duration;

use crease_auction::AUCTION_TIMER_SECS;
use crease_room::{AuctionConfig, RoomConfig};
use crease_store::StoreConfig;

use crate::CreaseError;

/// Everything the server needs to start.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to listen on. Default: `127.0.0.1:3001`.
    pub bind_addr: String,

    /// A connection that sends nothing for this long is dropped.
    /// Clients keep it open with `heartbeat`. Default: 60 seconds.
    pub idle_timeout: Duration,

    pub store: StoreConfig,
    pub room: RoomConfig,
    pub auction: AuctionConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:3001".to_string(),
            idle_timeout: Duration::from_secs(60),
            store: StoreConfig::default(),
            room: RoomConfig::default(),
            auction: AuctionConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Defaults overridden by the process environment:
    ///
    /// | Variable                    | Field                  |
    /// |-----------------------------|------------------------|
    /// | `CREASE_BIND_ADDR`          | `bind_addr`            |
    /// | `CREASE_ROOM_TTL_SECS`      | `store.room_ttl`       |
    /// | `CREASE_IDLE_TIMEOUT_SECS`  | `idle_timeout`         |
    /// | `CREASE_AUCTION_TIMER_SECS` | `auction.timer_secs`   |
    ///
    /// The auction clock accepts `1..=AUCTION_TIMER_SECS` seconds; a round
    /// can be shortened but never run longer than the standard clock.
    ///
    /// # Errors
    /// `CreaseError::Config` if a variable is set but does not parse, or
    /// the auction timer is out of range.
    pub fn from_env() -> Result<Self, CreaseError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Same as [`from_env`](Self::from_env) with a custom lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, CreaseError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(addr) = lookup("CREASE_BIND_ADDR") {
            config.bind_addr = addr;
        }
        if let Some(secs) = parse::<u64>(&lookup, "CREASE_ROOM_TTL_SECS")? {
            config.store.room_ttl = Duration::from_secs(secs);
        }
        if let Some(secs) = parse::<u64>(&lookup, "CREASE_IDLE_TIMEOUT_SECS")? {
            config.idle_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = parse::<u32>(&lookup, "CREASE_AUCTION_TIMER_SECS")? {
            if !(1..=AUCTION_TIMER_SECS).contains(&secs) {
                return Err(CreaseError::Config {
                    var: "CREASE_AUCTION_TIMER_SECS",
                    value: secs.to_string(),
                });
            }
            config.auction.timer_secs = secs;
        }
        Ok(config)
    }
}

fn parse<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
) -> Result<Option<T>, CreaseError> {
    let Some(value) = lookup(var) else {
        return Ok(None);
    };
    value
        .trim()
        .parse()
        .map(Some)
        .map_err(|_| CreaseError::Config { var, value })
}
