mod lobby;
mod race;

use std::collections::VecDeque;

use crate::config::{NetConfig, Tick};
use crate::event::{BoxPickupEvent, DisconnectReason, EventBuffer, ItemPlacedEvent, PeerEvent};
use crate::net::{
    CarState, Endpoint, HardwareId, NetworkStats, Packet, Payload, PlayerId, PlayerSlot,
    PlayerTable, ReliableChannel, Transport, TransportError, local_player_id,
};

use lobby::LobbyTimers;

const MAX_PEER_EVENTS: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Idle,
    Lobby,
    Race,
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("transport bring-up failed: {0}")]
    Transport(#[from] TransportError),
}

/// One networking session: the peer table, the reliable channel, the event
/// buffers and the transport they share.
///
/// Everything is driven from the caller's simulation loop, one non-blocking
/// update per tick (`update_lobby` in the lobby, `receive_car_states` during
/// the race). The session must never be updated re-entrantly.
pub struct Session<T: Transport> {
    config: NetConfig,
    endpoint: Option<Endpoint<T>>,
    hardware_id: Option<HardwareId>,
    players: PlayerTable,
    reliable: ReliableChannel,
    lobby: LobbyTimers,
    clock: Tick,
    phase: Phase,
    item_placed: EventBuffer<ItemPlacedEvent>,
    box_pickups: EventBuffer<BoxPickupEvent>,
    peer_events: VecDeque<PeerEvent>,
}

impl<T: Transport> Default for Session<T> {
    fn default() -> Self {
        Self::new(NetConfig::default())
    }
}

impl<T: Transport> Session<T> {
    pub fn new(config: NetConfig) -> Self {
        Self {
            config,
            endpoint: None,
            hardware_id: None,
            players: PlayerTable::new(),
            reliable: ReliableChannel::new(),
            lobby: LobbyTimers::default(),
            clock: 0,
            phase: Phase::Idle,
            item_placed: EventBuffer::default(),
            box_pickups: EventBuffer::default(),
            peer_events: VecDeque::new(),
        }
    }

    /// Brings the transport up and claims the local player id derived from
    /// its hardware id. An already initialized session is cleaned up first.
    pub fn init<F>(&mut self, connect: F) -> Result<PlayerId, SessionError>
    where
        F: FnOnce() -> Result<T, TransportError>,
    {
        if self.is_initialized() {
            self.cleanup();
        }

        let transport = connect()?;
        let hardware_id = transport.hardware_id();
        let id = local_player_id(&hardware_id);

        self.reset();
        self.players.claim_local(id, self.clock);
        self.endpoint = Some(Endpoint::new(transport));
        self.hardware_id = Some(hardware_id);

        log::info!(
            "Session initialized as player {} (hardware id {})",
            id,
            hardware_id
        );
        Ok(id)
    }

    /// Graceful shutdown: one Disconnect broadcast, transport released,
    /// state reset. Does nothing on a session that is not initialized.
    pub fn cleanup(&mut self) {
        let Some(endpoint) = self.endpoint.as_mut() else {
            return;
        };
        if let Some(id) = self.players.local() {
            endpoint.send(&Packet::new(id, Payload::Disconnect));
        }
        endpoint.close();

        log::info!("Session closed");
        self.reset();
    }

    /// Forced teardown from any state, including never initialized. Repeats
    /// the Disconnect broadcast, releases the transport and wipes everything.
    pub fn nuke(&mut self) {
        if let Some(endpoint) = self.endpoint.as_mut() {
            if let Some(id) = self.players.local() {
                let packet = Packet::new(id, Payload::Disconnect);
                for attempt in 0..self.config.disconnect_sends {
                    if attempt > 0 && !self.config.disconnect_spacing.is_zero() {
                        std::thread::sleep(self.config.disconnect_spacing);
                    }
                    endpoint.send(&packet);
                }
            }
            endpoint.close();
            log::info!("Session torn down");
        }
        self.reset();
    }

    pub fn is_initialized(&self) -> bool {
        self.endpoint.is_some()
    }

    pub fn my_id(&self) -> Option<PlayerId> {
        self.players.local()
    }

    pub fn hardware_id(&self) -> Option<HardwareId> {
        self.hardware_id
    }

    pub fn config(&self) -> &NetConfig {
        &self.config
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Current logical clock.
    pub fn now(&self) -> Tick {
        self.clock
    }

    pub fn connected_count(&self) -> usize {
        self.players.connected_count()
    }

    pub fn ready_count(&self) -> usize {
        self.players.ready_count()
    }

    pub fn all_ready(&self) -> bool {
        self.players.all_ready()
    }

    pub fn is_player_connected(&self, id: PlayerId) -> bool {
        self.players.get(id).is_some_and(|slot| slot.connected)
    }

    pub fn is_player_ready(&self, id: PlayerId) -> bool {
        self.players.get(id).is_some_and(|slot| slot.ready)
    }

    pub fn player(&self, id: PlayerId) -> Option<&PlayerSlot> {
        self.players.get(id)
    }

    pub fn pending_ack_count(&self) -> usize {
        self.players.pending_ack_count()
    }

    pub fn next_seq(&self) -> u8 {
        self.reliable.next_seq()
    }

    pub fn stats(&self) -> NetworkStats {
        self.endpoint
            .as_ref()
            .map(|endpoint| endpoint.stats().clone())
            .unwrap_or_default()
    }

    pub fn transport(&self) -> Option<&T> {
        self.endpoint.as_ref().map(Endpoint::transport)
    }

    pub fn drain_events(&mut self) -> impl Iterator<Item = PeerEvent> + '_ {
        self.peer_events.drain(..)
    }

    fn reset(&mut self) {
        self.endpoint = None;
        self.hardware_id = None;
        self.players = PlayerTable::new();
        self.reliable.reset();
        self.lobby = LobbyTimers::default();
        self.clock = 0;
        self.phase = Phase::Idle;
        self.item_placed.clear();
        self.box_pickups.clear();
        self.peer_events.clear();
    }

    fn advance_clock(&mut self) -> Tick {
        self.clock = self.clock.wrapping_add(self.config.tick_ms);
        self.clock
    }

    fn local_ready(&self) -> bool {
        self.players
            .local()
            .is_some_and(|id| self.is_player_ready(id))
    }

    fn send_packet(&mut self, packet: &Packet) {
        if let Some(endpoint) = self.endpoint.as_mut() {
            endpoint.send(packet);
        }
    }

    /// Unreliable broadcast, no sequence number, no tracking.
    fn send(&mut self, payload: Payload) {
        if let Some(id) = self.players.local() {
            self.send_packet(&Packet::new(id, payload));
        }
    }

    fn submit(&mut self, payload: Payload) -> Option<Packet> {
        let id = self.players.local()?;
        let endpoint = self.endpoint.as_mut()?;
        Some(self.reliable.submit(
            Packet::new(id, payload),
            &mut self.players,
            endpoint,
            self.clock,
        ))
    }

    fn resend_due(&mut self) {
        let Some(endpoint) = self.endpoint.as_mut() else {
            return;
        };
        self.reliable.resend_due(
            &mut self.players,
            endpoint,
            self.clock,
            self.config.retry_timeout,
            self.config.max_retries,
        );
    }

    /// Drains every datagram waiting on the transport and routes it by type.
    fn receive_all(&mut self, mut mirrors: Option<&mut [CarState]>) {
        let Some(local) = self.players.local() else {
            return;
        };
        let Some(endpoint) = self.endpoint.as_mut() else {
            return;
        };

        for packet in endpoint.drain(local) {
            match packet.payload {
                Payload::Join { .. } => self.on_join(packet),
                Payload::Update { ready } | Payload::Ready { ready } => {
                    self.on_lobby_update(packet, ready)
                }
                Payload::Ack { acked_seq } => {
                    self.reliable.on_ack(&mut self.players, packet.sender, acked_seq);
                }
                Payload::CarUpdate(state) => {
                    self.on_car_update(packet, state, mirrors.as_deref_mut())
                }
                Payload::ItemPlaced(placement) => self.on_item_placed(packet.sender, placement),
                Payload::ItemBoxPickup { box_index } => {
                    self.on_box_pickup(packet.sender, box_index)
                }
                Payload::Disconnect => self.on_disconnect(packet.sender),
            }
        }
    }

    fn sweep_liveness(&mut self) {
        let expired = self
            .players
            .expire_stale(self.clock, self.config.player_timeout);

        for player_id in expired {
            log::debug!("Player {} {}", player_id, DisconnectReason::Timeout.as_str());
            self.push_event(PeerEvent::Left {
                player_id,
                reason: DisconnectReason::Timeout,
            });
        }
    }

    /// Marks a peer connected and refreshes its liveness timestamp.
    fn mark_seen(&mut self, player_id: PlayerId, seq: u8) {
        let now = self.clock;
        let Some(slot) = self.players.get_mut(player_id) else {
            return;
        };

        let newly_connected = !slot.connected;
        slot.connected = true;
        slot.touch(now, seq);

        if newly_connected {
            log::debug!("Player {} joined", player_id);
            self.push_event(PeerEvent::Joined { player_id });
        }
    }

    fn set_peer_ready(&mut self, player_id: PlayerId, ready: bool) {
        let Some(slot) = self.players.get_mut(player_id) else {
            return;
        };
        if slot.ready != ready {
            slot.ready = ready;
            self.push_event(PeerEvent::ReadyChanged { player_id, ready });
        }
    }

    fn on_disconnect(&mut self, player_id: PlayerId) {
        if self.players.mark_disconnected(player_id) {
            log::debug!("Player {} {}", player_id, DisconnectReason::Graceful.as_str());
            self.push_event(PeerEvent::Left {
                player_id,
                reason: DisconnectReason::Graceful,
            });
        }
    }

    fn push_event(&mut self, event: PeerEvent) {
        if self.peer_events.len() >= MAX_PEER_EVENTS {
            self.peer_events.pop_front();
        }
        self.peer_events.push_back(event);
    }
}
