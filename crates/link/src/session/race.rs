use crate::event::{BoxPickupEvent, ItemPlacedEvent};
use crate::net::{CarState, ItemPlacement, Packet, Payload, PlayerId, Transport};

use super::{Phase, Session};

impl<T: Transport> Session<T> {
    /// Leaves the lobby. Lobby messages still in flight are abandoned so
    /// retries do not leak into the race.
    pub fn start_race(&mut self) {
        self.reliable.clear_all(&mut self.players);
        self.lobby.end_discovery();
        self.phase = Phase::Race;
        log::info!(
            "Race started with {} player(s)",
            self.players.connected_count()
        );
    }

    /// Fire-and-forget telemetry. A lost update is superseded by the next one.
    pub fn send_car_state(&mut self, state: &CarState) {
        self.send(Payload::CarUpdate(*state));
    }

    /// Drains inbound traffic and overwrites `mirrors[sender]` with the most
    /// recent state from each peer. Senders outside `mirrors` are skipped.
    pub fn receive_car_states(&mut self, mirrors: &mut [CarState]) {
        if !self.is_initialized() {
            return;
        }

        self.advance_clock();
        self.receive_all(Some(mirrors));
        self.sweep_liveness();
    }

    pub fn send_item_placed(&mut self, placement: &ItemPlacement) {
        self.send(Payload::ItemPlaced(*placement));
    }

    pub fn send_item_box_pickup(&mut self, box_index: i32) {
        self.send(Payload::ItemBoxPickup { box_index });
    }

    pub fn poll_item_placed(&mut self) -> Option<ItemPlacedEvent> {
        self.item_placed.pop()
    }

    pub fn poll_item_box_pickup(&mut self) -> Option<BoxPickupEvent> {
        self.box_pickups.pop()
    }

    pub(super) fn on_car_update(
        &mut self,
        packet: Packet,
        state: CarState,
        mirrors: Option<&mut [CarState]>,
    ) {
        let Some(mirror) = mirrors.and_then(|m| m.get_mut(packet.sender as usize)) else {
            return;
        };
        *mirror = state;
        self.mark_seen(packet.sender, packet.seq);
    }

    pub(super) fn on_item_placed(&mut self, player_id: PlayerId, placement: ItemPlacement) {
        let event = ItemPlacedEvent {
            player_id,
            placement,
        };
        if !self.item_placed.push(event) {
            log::debug!("Item placement from player {} dropped, buffer full", player_id);
        }
    }

    pub(super) fn on_box_pickup(&mut self, player_id: PlayerId, box_index: i32) {
        let event = BoxPickupEvent {
            player_id,
            box_index,
        };
        if !self.box_pickups.push(event) {
            log::debug!("Box pickup from player {} dropped, buffer full", player_id);
        }
    }
}
