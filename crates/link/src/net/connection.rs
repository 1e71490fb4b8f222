use crate::config::Tick;

use super::protocol::{MAX_PLAYERS, PlayerId};
use super::tracking::AckQueue;
use super::transport::HardwareId;

/// Local player id derived from the hardware id, so a device keeps its id
/// across sessions and sequential address allocation cannot make two
/// devices collide.
pub fn local_player_id(hardware_id: &HardwareId) -> PlayerId {
    hardware_id.last_byte() % MAX_PLAYERS as u8
}

#[derive(Debug, Clone, Default)]
pub struct PlayerSlot {
    pub connected: bool,
    pub ready: bool,
    pub last_packet_time: Tick,
    pub last_seq_received: u8,
    pub pending: AckQueue,
}

impl PlayerSlot {
    pub fn touch(&mut self, now: Tick, seq: u8) {
        self.last_packet_time = now;
        self.last_seq_received = seq;
    }

    pub fn is_timed_out(&self, now: Tick, timeout: Tick) -> bool {
        self.connected && now.wrapping_sub(self.last_packet_time) > timeout
    }

    pub fn disconnect(&mut self) {
        self.connected = false;
        self.ready = false;
        self.pending.clear();
    }
}

#[derive(Debug, Clone, Default)]
pub struct PlayerTable {
    slots: [PlayerSlot; MAX_PLAYERS],
    local: Option<PlayerId>,
}

impl PlayerTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wipes the table and marks `id` as the connected local player.
    pub fn claim_local(&mut self, id: PlayerId, now: Tick) {
        *self = Self::default();
        self.local = Some(id);
        if let Some(slot) = self.get_mut(id) {
            slot.connected = true;
            slot.last_packet_time = now;
        }
    }

    pub fn local(&self) -> Option<PlayerId> {
        self.local
    }

    pub fn get(&self, id: PlayerId) -> Option<&PlayerSlot> {
        self.slots.get(id as usize)
    }

    pub fn get_mut(&mut self, id: PlayerId) -> Option<&mut PlayerSlot> {
        self.slots.get_mut(id as usize)
    }

    pub fn local_slot_mut(&mut self) -> Option<&mut PlayerSlot> {
        let id = self.local?;
        self.get_mut(id)
    }

    pub fn is_local(&self, id: PlayerId) -> bool {
        self.local == Some(id)
    }

    /// Clears every slot except the local player's, dropping stale peers
    /// left over from an earlier lobby.
    pub fn reset_peers(&mut self) {
        for (_, slot) in self.peers_mut() {
            *slot = PlayerSlot::default();
        }
    }

    pub fn peers(&self) -> impl Iterator<Item = (PlayerId, &PlayerSlot)> {
        let local = self.local;
        self.slots
            .iter()
            .enumerate()
            .map(|(i, slot)| (i as PlayerId, slot))
            .filter(move |(id, _)| Some(*id) != local)
    }

    pub fn peers_mut(&mut self) -> impl Iterator<Item = (PlayerId, &mut PlayerSlot)> {
        let local = self.local;
        self.slots
            .iter_mut()
            .enumerate()
            .map(|(i, slot)| (i as PlayerId, slot))
            .filter(move |(id, _)| Some(*id) != local)
    }

    /// Returns true if the player was connected before the call.
    pub fn mark_disconnected(&mut self, id: PlayerId) -> bool {
        if self.is_local(id) {
            return false;
        }
        match self.get_mut(id) {
            Some(slot) => {
                let was_connected = slot.connected;
                slot.disconnect();
                was_connected
            }
            None => false,
        }
    }

    /// Disconnects every peer silent for longer than `timeout` and returns their ids.
    pub fn expire_stale(&mut self, now: Tick, timeout: Tick) -> Vec<PlayerId> {
        let mut expired = Vec::new();
        for (id, slot) in self.peers_mut() {
            if slot.is_timed_out(now, timeout) {
                slot.disconnect();
                expired.push(id);
            }
        }
        expired
    }

    pub fn connected_count(&self) -> usize {
        self.slots.iter().filter(|s| s.connected).count()
    }

    pub fn ready_count(&self) -> usize {
        self.slots.iter().filter(|s| s.connected && s.ready).count()
    }

    /// At least two players connected (self included) and every one of them ready.
    pub fn all_ready(&self) -> bool {
        let connected = self.connected_count();
        connected >= 2 && self.ready_count() == connected
    }

    pub fn pending_ack_count(&self) -> usize {
        self.slots.iter().map(|s| s.pending.active_count()).sum()
    }

    pub fn clear_pending(&mut self) {
        for slot in &mut self.slots {
            slot.pending.clear();
        }
    }
}
