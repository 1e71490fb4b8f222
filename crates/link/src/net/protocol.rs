use glam::IVec2;
use serde::{Deserialize, Serialize};

pub const PROTOCOL_VERSION: u8 = 1;
pub const PACKET_SIZE: usize = 32;
pub const HEADER_SIZE: usize = 4;
pub const PAYLOAD_SIZE: usize = PACKET_SIZE - HEADER_SIZE;
pub const MAX_PLAYERS: usize = 8;
pub const DEFAULT_PORT: u16 = 8888;
pub const DEFAULT_TICK_RATE: u32 = 60;
/// Ticks between telemetry sends at the reference cadence (15 Hz at 60 ticks/sec).
pub const CAR_UPDATE_INTERVAL: u32 = 4;

pub type PlayerId = u8;
pub type Datagram = [u8; PACKET_SIZE];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageType {
    Join = 0,
    Update = 1,
    Ready = 2,
    Ack = 3,
    CarUpdate = 4,
    ItemPlaced = 5,
    ItemBoxPickup = 6,
    Disconnect = 7,
}

impl TryFrom<u8> for MessageType {
    type Error = PacketError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Ok(match value {
            0 => Self::Join,
            1 => Self::Update,
            2 => Self::Ready,
            3 => Self::Ack,
            4 => Self::CarUpdate,
            5 => Self::ItemPlaced,
            6 => Self::ItemBoxPickup,
            7 => Self::Disconnect,
            other => return Err(PacketError::UnknownMessageType(other)),
        })
    }
}

/// Mirrored state of one car. Position and speed are Q16.8 fixed point,
/// angle is in 1/512ths of a turn.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CarState {
    pub position: IVec2,
    pub speed: i32,
    pub angle: i32,
    pub lap: i32,
    pub item: i32,
}

impl CarState {
    pub const ITEM_NONE: i32 = 0;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemPlacement {
    pub item_type: i32,
    pub position: IVec2,
    pub angle: i32,
    pub speed: i32,
    pub shooter_id: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Payload {
    Join { ready: bool },
    Update { ready: bool },
    Ready { ready: bool },
    Ack { acked_seq: u8 },
    CarUpdate(CarState),
    ItemPlaced(ItemPlacement),
    ItemBoxPickup { box_index: i32 },
    Disconnect,
}

impl Payload {
    pub fn message_type(&self) -> MessageType {
        match self {
            Self::Join { .. } => MessageType::Join,
            Self::Update { .. } => MessageType::Update,
            Self::Ready { .. } => MessageType::Ready,
            Self::Ack { .. } => MessageType::Ack,
            Self::CarUpdate(_) => MessageType::CarUpdate,
            Self::ItemPlaced(_) => MessageType::ItemPlaced,
            Self::ItemBoxPickup { .. } => MessageType::ItemBoxPickup,
            Self::Disconnect => MessageType::Disconnect,
        }
    }

    fn write(&self, buf: &mut [u8; PAYLOAD_SIZE]) {
        let mut w = FieldWriter::new(buf);
        match *self {
            Self::Join { ready } | Self::Update { ready } | Self::Ready { ready } => {
                w.put_u8(ready as u8);
            }
            Self::Ack { acked_seq } => w.put_u8(acked_seq),
            Self::CarUpdate(car) => {
                w.put_i32(car.position.x);
                w.put_i32(car.position.y);
                w.put_i32(car.speed);
                w.put_i32(car.angle);
                w.put_i32(car.lap);
                w.put_i32(car.item);
            }
            Self::ItemPlaced(item) => {
                w.put_i32(item.item_type);
                w.put_i32(item.position.x);
                w.put_i32(item.position.y);
                w.put_i32(item.angle);
                w.put_i32(item.speed);
                w.put_i32(item.shooter_id);
            }
            Self::ItemBoxPickup { box_index } => w.put_i32(box_index),
            Self::Disconnect => {}
        }
    }

    fn read(kind: MessageType, buf: &[u8]) -> Self {
        let mut r = FieldReader::new(buf);
        match kind {
            MessageType::Join => Self::Join { ready: r.get_u8() != 0 },
            MessageType::Update => Self::Update { ready: r.get_u8() != 0 },
            MessageType::Ready => Self::Ready { ready: r.get_u8() != 0 },
            MessageType::Ack => Self::Ack { acked_seq: r.get_u8() },
            MessageType::CarUpdate => Self::CarUpdate(CarState {
                position: IVec2::new(r.get_i32(), r.get_i32()),
                speed: r.get_i32(),
                angle: r.get_i32(),
                lap: r.get_i32(),
                item: r.get_i32(),
            }),
            MessageType::ItemPlaced => Self::ItemPlaced(ItemPlacement {
                item_type: r.get_i32(),
                position: IVec2::new(r.get_i32(), r.get_i32()),
                angle: r.get_i32(),
                speed: r.get_i32(),
                shooter_id: r.get_i32(),
            }),
            MessageType::ItemBoxPickup => Self::ItemBoxPickup { box_index: r.get_i32() },
            MessageType::Disconnect => Self::Disconnect,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Packet {
    pub sender: PlayerId,
    pub seq: u8,
    pub payload: Payload,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PacketError {
    #[error("datagram is {0} bytes, expected 32")]
    WrongSize(usize),
    #[error("unsupported protocol version {0}")]
    VersionMismatch(u8),
    #[error("unknown message type {0}")]
    UnknownMessageType(u8),
    #[error("sender id {0} out of range")]
    InvalidSender(u8),
}

impl Packet {
    pub fn new(sender: PlayerId, payload: Payload) -> Self {
        Self {
            sender,
            seq: 0,
            payload,
        }
    }

    pub fn message_type(&self) -> MessageType {
        self.payload.message_type()
    }

    /// Serializes into the fixed 32-byte little-endian wire layout.
    /// Unused payload bytes are always zero.
    pub fn encode(&self) -> Datagram {
        let mut data = [0u8; PACKET_SIZE];
        data[0] = PROTOCOL_VERSION;
        data[1] = self.message_type() as u8;
        data[2] = self.sender;
        data[3] = self.seq;

        let mut payload = [0u8; PAYLOAD_SIZE];
        self.payload.write(&mut payload);
        data[HEADER_SIZE..].copy_from_slice(&payload);
        data
    }

    pub fn decode(data: &[u8]) -> Result<Self, PacketError> {
        if data.len() != PACKET_SIZE {
            return Err(PacketError::WrongSize(data.len()));
        }
        if data[0] != PROTOCOL_VERSION {
            return Err(PacketError::VersionMismatch(data[0]));
        }
        let kind = MessageType::try_from(data[1])?;
        let sender = data[2];
        if sender as usize >= MAX_PLAYERS {
            return Err(PacketError::InvalidSender(sender));
        }

        Ok(Self {
            sender,
            seq: data[3],
            payload: Payload::read(kind, &data[HEADER_SIZE..]),
        })
    }
}

struct FieldWriter<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

impl<'a> FieldWriter<'a> {
    fn new(buf: &'a mut [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn put_u8(&mut self, value: u8) {
        self.buf[self.pos] = value;
        self.pos += 1;
    }

    fn put_i32(&mut self, value: i32) {
        self.buf[self.pos..self.pos + 4].copy_from_slice(&value.to_le_bytes());
        self.pos += 4;
    }
}

struct FieldReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> FieldReader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn get_u8(&mut self) -> u8 {
        let value = self.buf[self.pos];
        self.pos += 1;
        value
    }

    fn get_i32(&mut self) -> i32 {
        let mut bytes = [0u8; 4];
        bytes.copy_from_slice(&self.buf[self.pos..self.pos + 4]);
        self.pos += 4;
        i32::from_le_bytes(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_layout() {
        let mut packet = Packet::new(5, Payload::Ready { ready: true });
        packet.seq = 200;

        let data = packet.encode();
        assert_eq!(data.len(), PACKET_SIZE);
        assert_eq!(data[0], PROTOCOL_VERSION);
        assert_eq!(data[1], MessageType::Ready as u8);
        assert_eq!(data[2], 5);
        assert_eq!(data[3], 200);
        assert_eq!(data[4], 1);
        assert!(data[5..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_car_update_layout() {
        let car = CarState {
            position: IVec2::new(100, -200),
            speed: 50,
            angle: 128,
            lap: 2,
            item: CarState::ITEM_NONE,
        };
        let data = Packet::new(3, Payload::CarUpdate(car)).encode();

        assert_eq!(&data[4..8], &100i32.to_le_bytes());
        assert_eq!(&data[8..12], &(-200i32).to_le_bytes());
        assert_eq!(&data[12..16], &50i32.to_le_bytes());
        assert_eq!(&data[16..20], &128i32.to_le_bytes());
        assert_eq!(&data[20..24], &2i32.to_le_bytes());
        assert!(data[28..].iter().all(|&b| b == 0));

        let decoded = Packet::decode(&data).unwrap();
        assert_eq!(decoded.payload, Payload::CarUpdate(car));
    }

    #[test]
    fn test_item_placed_decode() {
        let item = ItemPlacement {
            item_type: 2,
            position: IVec2::new(7, 9),
            angle: 256,
            speed: -3,
            shooter_id: 4,
        };
        let data = Packet::new(1, Payload::ItemPlaced(item)).encode();
        assert_eq!(&data[4..8], &2i32.to_le_bytes());

        match Packet::decode(&data).unwrap().payload {
            Payload::ItemPlaced(decoded) => assert_eq!(decoded, item),
            other => panic!("Expected ItemPlaced, got {:?}", other),
        }
    }

    #[test]
    fn test_reserved_bytes_ignored() {
        let mut data = Packet::new(2, Payload::Ack { acked_seq: 9 }).encode();
        data[20] = 0xAA;
        data[31] = 0x55;

        let decoded = Packet::decode(&data).unwrap();
        assert_eq!(decoded.payload, Payload::Ack { acked_seq: 9 });
    }

    #[test]
    fn test_decode_rejects_foreign_packets() {
        let good = Packet::new(1, Payload::Disconnect).encode();

        assert_eq!(Packet::decode(&good[..31]), Err(PacketError::WrongSize(31)));

        let mut bad_version = good;
        bad_version[0] = 2;
        assert_eq!(
            Packet::decode(&bad_version),
            Err(PacketError::VersionMismatch(2))
        );

        let mut bad_type = good;
        bad_type[1] = 8;
        assert_eq!(
            Packet::decode(&bad_type),
            Err(PacketError::UnknownMessageType(8))
        );

        let mut bad_sender = good;
        bad_sender[2] = MAX_PLAYERS as u8;
        assert_eq!(
            Packet::decode(&bad_sender),
            Err(PacketError::InvalidSender(8))
        );
    }
}
