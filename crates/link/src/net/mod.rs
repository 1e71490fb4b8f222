mod connection;
mod endpoint;
mod protocol;
mod reliable;
mod simulator;
mod stats;
mod tracking;
mod transport;

pub use connection::{PlayerSlot, PlayerTable, local_player_id};
pub use endpoint::Endpoint;
pub use protocol::{
    CAR_UPDATE_INTERVAL, CarState, DEFAULT_PORT, DEFAULT_TICK_RATE, Datagram, HEADER_SIZE,
    ItemPlacement, MAX_PLAYERS, MessageType, PACKET_SIZE, PAYLOAD_SIZE, PROTOCOL_VERSION, Packet,
    PacketError, Payload, PlayerId,
};
pub use reliable::ReliableChannel;
pub use simulator::{LoopbackNetwork, LoopbackTransport, NodeId};
pub use stats::{NetworkStats, PacketLossSimulation, SimRng};
pub use tracking::{ACK_QUEUE_LEN, AckQueue, PendingAck, RetrySweep};
pub use transport::{
    HardwareId, HardwareIdError, Transport, TransportError, UdpConfig, UdpTransport,
};
