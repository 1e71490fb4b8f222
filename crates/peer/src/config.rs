use std::collections::hash_map::RandomState;
use std::hash::{BuildHasher, Hasher};
use std::time::{SystemTime, UNIX_EPOCH};

use kartlink::{HardwareId, NetConfig};

pub const MAX_TICK_RATE: u32 = 1000;

#[derive(Debug, Clone)]
pub struct PeerConfig {
    pub tick_rate: u32,
    /// Lobby ticks before the local player marks itself ready.
    pub ready_after: u32,
    pub countdown_frames: u32,
    pub race_ticks: u32,
    pub box_pickup_interval: u32,
    pub item_interval: u32,
    pub net: NetConfig,
}

impl Default for PeerConfig {
    fn default() -> Self {
        Self {
            tick_rate: 60,
            ready_after: 60,
            countdown_frames: 180,
            race_ticks: 60 * 30,
            box_pickup_interval: 120,
            item_interval: 300,
            net: NetConfig::default(),
        }
    }
}

impl PeerConfig {
    /// Defaults with the logical clock stepped to match `tick_rate`. The clock
    /// moves in whole milliseconds, so faster rates would stop it.
    pub fn for_tick_rate(tick_rate: u32) -> anyhow::Result<Self> {
        anyhow::ensure!(
            (1..=MAX_TICK_RATE).contains(&tick_rate),
            "tick rate must be between 1 and {} Hz, got {}",
            MAX_TICK_RATE,
            tick_rate
        );
        Ok(Self {
            tick_rate,
            net: NetConfig {
                tick_ms: 1000 / tick_rate,
                ..NetConfig::default()
            },
            ..Self::default()
        })
    }
}

/// Hardware id of the first non-loopback interface, so the same machine
/// claims the same player id every session. Falls back to a random id when
/// no MAC can be read.
pub fn local_hardware_id() -> HardwareId {
    match mac_address::get_mac_address() {
        Ok(Some(mac)) if mac.bytes() != [0; 6] => HardwareId(mac.bytes()),
        Ok(_) => {
            log::warn!("No interface MAC address found, using a random hardware id");
            generate_hardware_id()
        }
        Err(err) => {
            log::warn!(
                "Could not read interface MAC address ({}), using a random hardware id",
                err
            );
            generate_hardware_id()
        }
    }
}

/// Random locally administered unicast address.
pub fn generate_hardware_id() -> HardwareId {
    let mut hasher = RandomState::new().build_hasher();
    hasher.write_u128(
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or_default(),
    );
    let bytes = hasher.finish().to_le_bytes();
    HardwareId([0x02, bytes[0], bytes[1], bytes[2], bytes[3], bytes[4]])
}
