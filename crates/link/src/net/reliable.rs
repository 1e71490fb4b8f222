use crate::config::Tick;

use super::connection::PlayerTable;
use super::endpoint::Endpoint;
use super::protocol::{Packet, PlayerId};
use super::transport::Transport;

/// Selective-repeat ARQ over broadcast. Each reliable packet is sent once
/// and tracked separately for every connected peer until that peer acks its
/// sequence number or the retry budget runs out. The channel knows nothing
/// about what the packets mean.
#[derive(Debug, Default)]
pub struct ReliableChannel {
    next_seq: u8,
}

impl ReliableChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_seq(&self) -> u8 {
        self.next_seq
    }

    pub fn reset(&mut self) {
        self.next_seq = 0;
    }

    /// Stamps the next sequence number, broadcasts once and starts tracking.
    /// A peer whose queue is full gets this one message best-effort only.
    pub fn submit<T: Transport>(
        &mut self,
        mut packet: Packet,
        players: &mut PlayerTable,
        endpoint: &mut Endpoint<T>,
        now: Tick,
    ) -> Packet {
        packet.seq = self.next_seq;
        self.next_seq = self.next_seq.wrapping_add(1);

        endpoint.send(&packet);

        for (id, slot) in players.peers_mut() {
            if !slot.connected {
                continue;
            }
            if !slot.pending.track(packet, now) {
                log::debug!(
                    "Ack queue for player {} full, {:?} seq {} sent untracked",
                    id,
                    packet.message_type(),
                    packet.seq
                );
            }
        }

        packet
    }

    pub fn resend_due<T: Transport>(
        &self,
        players: &mut PlayerTable,
        endpoint: &mut Endpoint<T>,
        now: Tick,
        retry_timeout: Tick,
        max_retries: u8,
    ) {
        for (id, slot) in players.peers_mut() {
            let sweep = slot.pending.sweep(now, retry_timeout, max_retries);

            for packet in &sweep.resend {
                log::debug!(
                    "Resending {:?} seq {} for player {}",
                    packet.message_type(),
                    packet.seq,
                    id
                );
                endpoint.resend(packet);
            }

            if sweep.abandoned > 0 {
                log::debug!(
                    "Gave up on {} message(s) to player {}",
                    sweep.abandoned,
                    id
                );
                endpoint.record_abandoned(sweep.abandoned);
            }
        }
    }

    pub fn on_ack(&self, players: &mut PlayerTable, from: PlayerId, acked_seq: u8) -> bool {
        if players.is_local(from) {
            return false;
        }
        players
            .get_mut(from)
            .is_some_and(|slot| slot.pending.acknowledge(acked_seq))
    }

    /// Drops every in-flight message to every peer.
    pub fn clear_all(&self, players: &mut PlayerTable) {
        players.clear_pending();
    }
}
