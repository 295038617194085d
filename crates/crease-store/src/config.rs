//! Store configuration.

use std::time::Duration;

/// How long stored keys live and how often expired ones are swept.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// TTL of `room:*` and `socket:*` keys, refreshed on every write.
    ///
    /// Default: 6 hours.
    pub room_ttl: Duration,

    /// Period of the background sweep that drops expired keys.
    ///
    /// Default: 60 seconds.
    pub sweep_interval: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            room_ttl: Duration::from_secs(6 * 60 * 60),
            sweep_interval: Duration::from_secs(60),
        }
    }
}
