use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Logical clock value. One unit is one millisecond of simulated time; the
/// clock only moves when the session is updated, never from the wall clock.
pub type Tick = u32;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetConfig {
    /// Clock increment applied by every update call (one frame at 60 Hz).
    pub tick_ms: Tick,
    pub retry_timeout: Tick,
    pub max_retries: u8,
    pub player_timeout: Tick,
    pub heartbeat_interval: Tick,
    /// How long after joining the lobby unreliable Join rebroadcasts continue.
    pub discovery_window: Tick,
    pub discovery_interval: Tick,
    /// Extra unreliable copies of the Join sent right after the reliable one.
    pub join_burst: u8,
    pub disconnect_sends: u8,
    pub disconnect_spacing: Duration,
}

impl Default for NetConfig {
    fn default() -> Self {
        Self {
            tick_ms: 16,
            retry_timeout: 500,
            max_retries: 5,
            player_timeout: 3000,
            heartbeat_interval: 1000,
            discovery_window: 2000,
            discovery_interval: 300,
            join_burst: 3,
            disconnect_sends: 3,
            disconnect_spacing: Duration::from_millis(16),
        }
    }
}
