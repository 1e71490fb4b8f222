use crate::config::Tick;
use crate::net::{Packet, Payload, Transport};

use super::{Phase, Session};

/// Discovery and heartbeat bookkeeping for the current lobby.
#[derive(Debug, Clone, Copy, Default)]
pub(super) struct LobbyTimers {
    joined_at: Tick,
    last_heartbeat: Tick,
    last_discovery: Tick,
    join_packet: Option<Packet>,
}

impl LobbyTimers {
    /// Stops the Join rebroadcasts for the rest of this lobby.
    pub(super) fn end_discovery(&mut self) {
        self.join_packet = None;
    }
}

impl<T: Transport> Session<T> {
    /// Announces the local player. Peers from an earlier lobby are forgotten,
    /// the local ready flag is cleared and the Join is broadcast once plus a
    /// short burst to survive early loss. Peers already in the lobby learn
    /// about us from the burst and from the discovery rebroadcasts that
    /// follow in `update_lobby`.
    pub fn join_lobby(&mut self) {
        let Some(local) = self.players.local() else {
            log::warn!("join_lobby called before init");
            return;
        };

        self.players.reset_peers();
        self.reliable.reset();
        let now = self.clock;
        if let Some(slot) = self.players.local_slot_mut() {
            slot.ready = false;
            slot.last_packet_time = now;
        }
        self.phase = Phase::Lobby;

        let Some(endpoint) = self.endpoint.as_mut() else {
            return;
        };
        let join = self.reliable.submit(
            Packet::new(local, Payload::Join { ready: false }),
            &mut self.players,
            endpoint,
            now,
        );
        for _ in 0..self.config.join_burst {
            endpoint.send(&join);
        }

        self.lobby = LobbyTimers {
            joined_at: now,
            last_heartbeat: now,
            last_discovery: now,
            join_packet: Some(join),
        };
        log::info!("Player {} entered the lobby", local);
    }

    /// One lobby tick: retries, discovery, heartbeat, inbound traffic and the
    /// liveness sweep. Returns true once every connected player (at least two)
    /// is ready.
    pub fn update_lobby(&mut self) -> bool {
        if !self.is_initialized() {
            return false;
        }

        self.advance_clock();
        self.resend_due();
        self.lobby_broadcasts();
        self.receive_all(None);
        self.sweep_liveness();

        self.players.all_ready()
    }

    pub fn set_ready(&mut self, ready: bool) {
        let Some(slot) = self.players.local_slot_mut() else {
            return;
        };
        slot.ready = ready;
        log::info!("Local player ready: {}", ready);
        self.submit(Payload::Ready { ready });
    }

    fn lobby_broadcasts(&mut self) {
        // Nothing is announced before join_lobby or after start_race.
        if self.phase != Phase::Lobby {
            return;
        }
        let now = self.clock;

        if let Some(join) = self.lobby.join_packet {
            let in_window = now.wrapping_sub(self.lobby.joined_at) < self.config.discovery_window;
            let due = now.wrapping_sub(self.lobby.last_discovery) >= self.config.discovery_interval;
            if in_window && due {
                self.send_packet(&join);
                self.lobby.last_discovery = now;
            }
        }

        if now.wrapping_sub(self.lobby.last_heartbeat) >= self.config.heartbeat_interval {
            let ready = self.local_ready();
            if let Some(slot) = self.players.local_slot_mut() {
                slot.last_packet_time = now;
            }
            self.submit(Payload::Update { ready });
            self.lobby.last_heartbeat = now;
        }
    }

    /// Late lobby traffic during the race only keeps a known peer alive.
    fn refresh_liveness(&mut self, packet: Packet) {
        let now = self.clock;
        if let Some(slot) = self.players.get_mut(packet.sender) {
            if slot.connected {
                slot.touch(now, packet.seq);
            }
        }
    }

    pub(super) fn on_join(&mut self, packet: Packet) {
        if self.phase == Phase::Race {
            self.refresh_liveness(packet);
            return;
        }

        self.mark_seen(packet.sender, packet.seq);
        self.set_peer_ready(packet.sender, false);
        self.send(Payload::Ack {
            acked_seq: packet.seq,
        });

        let ready = self.local_ready();
        self.submit(Payload::Update { ready });
    }

    pub(super) fn on_lobby_update(&mut self, packet: Packet, ready: bool) {
        if self.phase == Phase::Race {
            self.refresh_liveness(packet);
            return;
        }

        self.mark_seen(packet.sender, packet.seq);
        self.set_peer_ready(packet.sender, ready);
        self.send(Payload::Ack {
            acked_seq: packet.seq,
        });
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use crate::config::NetConfig;
    use crate::event::PeerEvent;
    use crate::net::{HardwareId, LoopbackNetwork, LoopbackTransport, MessageType, Packet, Payload};

    use super::*;

    fn session(network: &LoopbackNetwork, last: u8) -> Session<LoopbackTransport> {
        let config = NetConfig {
            disconnect_spacing: Duration::ZERO,
            ..NetConfig::default()
        };
        let mut session = Session::new(config);
        let transport = network.attach(HardwareId([0x02, 0, 0, 0, 0, last]));
        session.init(|| Ok(transport)).unwrap();
        session
    }

    #[test]
    fn test_join_burst() {
        let network = LoopbackNetwork::new();
        let mut host = session(&network, 1);
        host.join_lobby();

        let sent = network.sent_by(0);
        assert_eq!(sent.len(), 4);
        assert!(sent.iter().all(|p| p.payload == Payload::Join { ready: false } && p.seq == 0));
        assert_eq!(host.phase(), Phase::Lobby);
        assert_eq!(host.next_seq(), 1);
    }

    #[test]
    fn test_discovery_stops_after_window() {
        let network = LoopbackNetwork::new();
        let mut host = session(&network, 1);
        host.join_lobby();
        network.clear_log();

        for _ in 0..200 {
            host.update_lobby();
        }

        let joins: Vec<u8> = network
            .sent_by(0)
            .iter()
            .filter(|p| p.message_type() == MessageType::Join)
            .map(|p| p.seq)
            .collect();
        // at 304, 608, 912, 1216, 1520 and 1824
        assert_eq!(joins.len(), 6);
        assert!(joins.iter().all(|seq| *seq == 0));
    }

    #[test]
    fn test_heartbeat_interval() {
        let network = LoopbackNetwork::new();
        let mut host = session(&network, 1);
        host.join_lobby();
        network.clear_log();

        // 63 ticks of 16 units = 1008
        for _ in 0..63 {
            host.update_lobby();
        }
        let updates = network
            .sent_by(0)
            .iter()
            .filter(|p| p.message_type() == MessageType::Update)
            .count();
        assert_eq!(updates, 1);
    }

    #[test]
    fn test_idle_session_stays_silent() {
        let network = LoopbackNetwork::new();
        let mut host = session(&network, 1);

        // 70 ticks of 16 units = 1120, past one heartbeat interval
        for _ in 0..70 {
            assert!(!host.update_lobby());
        }
        assert_eq!(host.phase(), Phase::Idle);
        assert!(network.sent_by(0).is_empty());
        assert_eq!(host.pending_ack_count(), 0);
    }

    #[test]
    fn test_race_start_ends_discovery() {
        let network = LoopbackNetwork::new();
        let mut host = session(&network, 1);
        host.join_lobby();
        host.start_race();
        network.clear_log();

        for _ in 0..200 {
            host.update_lobby();
        }
        assert!(network.sent_by(0).is_empty());
        assert!(host.lobby.join_packet.is_none());
    }

    #[test]
    fn test_ready_change_is_reported() {
        let network = LoopbackNetwork::new();
        let mut host = session(&network, 1);
        host.join_lobby();
        let node = host.transport().unwrap().node();

        let mut update = Packet::new(4, Payload::Ready { ready: true });
        update.seq = 2;
        network.inject(node, &update.encode());
        host.update_lobby();

        let events: Vec<PeerEvent> = host.drain_events().collect();
        assert_eq!(
            events,
            vec![
                PeerEvent::Joined { player_id: 4 },
                PeerEvent::ReadyChanged {
                    player_id: 4,
                    ready: true
                },
            ]
        );
        assert!(host.is_player_ready(4));
        assert_eq!(host.ready_count(), 1);
    }

    #[test]
    fn test_lobby_traffic_ignored_during_race() {
        let network = LoopbackNetwork::new();
        let mut host = session(&network, 1);
        host.join_lobby();
        host.start_race();
        network.clear_log();
        let node = host.transport().unwrap().node();

        network.inject(node, &Packet::new(6, Payload::Join { ready: false }).encode());
        let mut mirrors = [crate::net::CarState::default(); 8];
        host.receive_car_states(&mut mirrors);

        assert!(!host.is_player_connected(6));
        assert!(network.sent_by(0).is_empty());
    }
}
