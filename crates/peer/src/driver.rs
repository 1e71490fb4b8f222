use std::f32::consts::TAU;

use glam::Vec2;
use kartlink::{
    CAR_UPDATE_INTERVAL, CarState, ItemPlacement, MAX_PLAYERS, PeerEvent, PlayerId, Session,
    SessionError, Transport, TransportError,
};

use crate::config::PeerConfig;
use crate::countdown::Countdown;

const FIXED_ONE: f32 = 256.0;
const ANGLE_STEPS: i32 = 512;
const ANGLE_PER_TICK: i32 = 2;
const ORBIT_RADIUS: f32 = 96.0;
const ORBIT_CENTER: Vec2 = Vec2::new(128.0, 128.0);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Lobby,
    Race,
    Finished,
}

/// Plays one peer end to end: lobby, countdown, a scripted race lap loop,
/// then a graceful leave.
pub struct PeerDriver<T: Transport> {
    session: Session<T>,
    config: PeerConfig,
    stage: Stage,
    countdown: Countdown,
    mirrors: [CarState; MAX_PLAYERS],
    car: CarState,
    lobby_ticks: u32,
    race_ticks: u32,
    label: String,
}

impl<T: Transport> PeerDriver<T> {
    pub fn new(config: PeerConfig) -> Self {
        Self {
            session: Session::new(config.net.clone()),
            countdown: Countdown::new(config.countdown_frames),
            config,
            stage: Stage::Lobby,
            mirrors: [CarState::default(); MAX_PLAYERS],
            car: CarState::default(),
            lobby_ticks: 0,
            race_ticks: 0,
            label: String::from("P?"),
        }
    }

    pub fn init<F>(&mut self, connect: F) -> Result<PlayerId, SessionError>
    where
        F: FnOnce() -> Result<T, TransportError>,
    {
        let id = self.session.init(connect)?;
        self.label = format!("P{}", id);
        self.session.join_lobby();
        Ok(id)
    }

    pub fn is_finished(&self) -> bool {
        self.stage == Stage::Finished
    }

    pub fn tick(&mut self) {
        match self.stage {
            Stage::Lobby => self.tick_lobby(),
            Stage::Race => self.tick_race(),
            Stage::Finished => {}
        }
        self.report_events();
    }

    /// Hard stop from any stage.
    pub fn abort(&mut self) {
        log::warn!("[{}] Aborting", self.label);
        self.session.nuke();
        self.stage = Stage::Finished;
    }

    fn tick_lobby(&mut self) {
        self.lobby_ticks += 1;
        if self.lobby_ticks == self.config.ready_after {
            self.session.set_ready(true);
        }

        let all_ready = self.session.update_lobby();
        let connected = self.session.connected_count();

        if self.countdown.is_active() && (!all_ready || connected < 2) {
            log::info!(
                "[{}] Countdown cancelled with {} frames left",
                self.label,
                self.countdown.remaining().unwrap_or_default()
            );
            self.countdown.cancel();
        } else if all_ready && !self.countdown.is_active() {
            self.countdown.start();
            log::info!(
                "[{}] All {} players ready, starting countdown",
                self.label,
                connected
            );
        }

        if self.countdown.tick() {
            self.session.start_race();
            self.stage = Stage::Race;
        }
    }

    fn tick_race(&mut self) {
        self.race_ticks += 1;
        self.advance_car();

        if self.race_ticks % CAR_UPDATE_INTERVAL == 0 {
            self.session.send_car_state(&self.car);
        }
        let box_interval = self.config.box_pickup_interval.max(1);
        if self.race_ticks % box_interval == 0 {
            self.session.send_item_box_pickup((self.race_ticks / box_interval) as i32);
        }
        if self.race_ticks % self.config.item_interval.max(1) == 0 {
            self.drop_item();
        }

        self.session.receive_car_states(&mut self.mirrors);

        while let Some(event) = self.session.poll_item_placed() {
            log::info!(
                "[{}] Player {} placed item {} at {}",
                self.label,
                event.player_id,
                event.placement.item_type,
                event.placement.position
            );
        }
        while let Some(event) = self.session.poll_item_box_pickup() {
            log::info!(
                "[{}] Player {} picked up box {}",
                self.label,
                event.player_id,
                event.box_index
            );
        }

        if self.race_ticks % self.config.tick_rate.max(1) == 0 {
            self.log_mirrors();
        }
        if self.race_ticks >= self.config.race_ticks {
            self.finish();
        }
    }

    fn advance_car(&mut self) {
        let mut angle = self.car.angle + ANGLE_PER_TICK;
        if angle >= ANGLE_STEPS {
            angle -= ANGLE_STEPS;
            self.car.lap += 1;
        }

        let theta = angle as f32 * TAU / ANGLE_STEPS as f32;
        let position = ORBIT_CENTER + Vec2::from_angle(theta) * ORBIT_RADIUS;

        self.car.angle = angle;
        self.car.position = (position * FIXED_ONE).as_ivec2();
        self.car.speed = (ORBIT_RADIUS * TAU / ANGLE_STEPS as f32
            * ANGLE_PER_TICK as f32
            * FIXED_ONE) as i32;
    }

    fn drop_item(&mut self) {
        let Some(id) = self.session.my_id() else {
            return;
        };
        let placement = ItemPlacement {
            item_type: 1,
            position: self.car.position,
            angle: self.car.angle,
            speed: 0,
            shooter_id: id as i32,
        };
        self.session.send_item_placed(&placement);
    }

    fn log_mirrors(&self) {
        for (id, mirror) in self.mirrors.iter().enumerate() {
            let id = id as PlayerId;
            if Some(id) == self.session.my_id() || !self.session.is_player_connected(id) {
                continue;
            }
            log::debug!(
                "[{}] Player {} lap {} at {}",
                self.label,
                id,
                mirror.lap,
                mirror.position / FIXED_ONE as i32
            );
        }
    }

    fn finish(&mut self) {
        let stats = self.session.stats();
        log::info!(
            "[{}] Race over after {} laps: sent {} received {} retransmitted {} abandoned {}",
            self.label,
            self.car.lap,
            stats.packets_sent,
            stats.packets_received,
            stats.retransmissions,
            stats.messages_abandoned
        );
        self.session.cleanup();
        self.stage = Stage::Finished;
    }

    fn report_events(&mut self) {
        for event in self.session.drain_events() {
            match event {
                PeerEvent::Joined { player_id } => {
                    log::info!("[{}] Player {} joined", self.label, player_id);
                }
                PeerEvent::ReadyChanged { player_id, ready } => {
                    log::info!("[{}] Player {} ready: {}", self.label, player_id, ready);
                }
                PeerEvent::Left { player_id, reason } => {
                    log::info!("[{}] Player {} {}", self.label, player_id, reason.as_str());
                }
            }
        }
    }
}
