pub mod config;
pub mod event;
pub mod net;
pub mod session;

pub use config::{NetConfig, Tick};
pub use event::{
    BoxPickupEvent, DisconnectReason, EVENT_BUFFER_CAPACITY, EventBuffer, ItemPlacedEvent,
    PeerEvent,
};
pub use net::{
    CAR_UPDATE_INTERVAL, CarState, DEFAULT_PORT, DEFAULT_TICK_RATE, HardwareId, HardwareIdError,
    ItemPlacement, LoopbackNetwork, LoopbackTransport, MAX_PLAYERS, MessageType, NetworkStats,
    PACKET_SIZE, Packet, PacketError, PacketLossSimulation, Payload, PlayerId, Transport,
    TransportError, UdpConfig, UdpTransport,
};
pub use session::{Phase, Session, SessionError};
