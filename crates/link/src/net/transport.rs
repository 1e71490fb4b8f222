use std::fmt;
use std::io;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4, UdpSocket};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::protocol::{DEFAULT_PORT, Datagram};

const RECV_BUFFER_SIZE: usize = 64;

/// Hardware-burned, globally unique device identifier (a MAC address).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HardwareId(pub [u8; 6]);

impl HardwareId {
    pub fn last_byte(&self) -> u8 {
        self.0[5]
    }
}

impl fmt::Display for HardwareId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02X}:{b:02X}:{c:02X}:{d:02X}:{e:02X}:{g:02X}")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HardwareIdError {
    #[error("expected 6 colon-separated octets, got {0}")]
    WrongLength(usize),
    #[error("invalid octet '{0}'")]
    InvalidOctet(String),
}

impl FromStr for HardwareId {
    type Err = HardwareIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.trim().split([':', '-']).collect();
        if parts.len() != 6 {
            return Err(HardwareIdError::WrongLength(parts.len()));
        }

        let mut bytes = [0u8; 6];
        for (byte, part) in bytes.iter_mut().zip(&parts) {
            *byte = u8::from_str_radix(part, 16)
                .map_err(|_| HardwareIdError::InvalidOctet(part.to_string()))?;
        }
        Ok(Self(bytes))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("transport unavailable: {0}")]
    Unavailable(String),
    #[error("transport closed")]
    Closed,
}

/// Datagram medium shared by every peer on the local segment.
///
/// Both calls must return immediately. `send` is fire-and-forget broadcast,
/// `try_recv` hands back at most one pending datagram per call. Datagrams may
/// be lost or reordered but are never duplicated by the medium.
pub trait Transport {
    fn send(&mut self, datagram: &Datagram) -> Result<(), TransportError>;

    fn try_recv(&mut self) -> Option<Vec<u8>>;

    fn hardware_id(&self) -> HardwareId;

    fn close(&mut self) {}
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UdpConfig {
    pub bind_addr: SocketAddr,
    pub broadcast_addr: SocketAddr,
    pub hardware_id: HardwareId,
}

impl Default for UdpConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, DEFAULT_PORT)),
            broadcast_addr: SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::BROADCAST, DEFAULT_PORT)),
            hardware_id: HardwareId::default(),
        }
    }
}

/// Non-blocking UDP broadcast socket on a single fixed port.
#[derive(Debug)]
pub struct UdpTransport {
    socket: Option<UdpSocket>,
    local_addr: SocketAddr,
    broadcast_addr: SocketAddr,
    hardware_id: HardwareId,
    recv_buffer: [u8; RECV_BUFFER_SIZE],
}

impl UdpTransport {
    pub fn open(config: &UdpConfig) -> Result<Self, TransportError> {
        let socket = UdpSocket::bind(config.bind_addr)?;
        socket.set_broadcast(true)?;
        socket.set_nonblocking(true)?;

        let local_addr = socket.local_addr()?;
        log::debug!(
            "UDP transport bound on {} broadcasting to {}",
            local_addr,
            config.broadcast_addr
        );

        Ok(Self {
            socket: Some(socket),
            local_addr,
            broadcast_addr: config.broadcast_addr,
            hardware_id: config.hardware_id,
            recv_buffer: [0u8; RECV_BUFFER_SIZE],
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn broadcast_addr(&self) -> SocketAddr {
        self.broadcast_addr
    }

    pub fn set_broadcast_addr(&mut self, addr: SocketAddr) {
        self.broadcast_addr = addr;
    }

    pub fn is_open(&self) -> bool {
        self.socket.is_some()
    }
}

impl Transport for UdpTransport {
    fn send(&mut self, datagram: &Datagram) -> Result<(), TransportError> {
        let socket = self.socket.as_ref().ok_or(TransportError::Closed)?;
        socket.send_to(datagram, self.broadcast_addr)?;
        Ok(())
    }

    fn try_recv(&mut self) -> Option<Vec<u8>> {
        let socket = self.socket.as_ref()?;
        match socket.recv_from(&mut self.recv_buffer) {
            Ok((size, _addr)) => Some(self.recv_buffer[..size].to_vec()),
            Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => None,
            Err(e) => {
                log::debug!("UDP receive failed: {}", e);
                None
            }
        }
    }

    fn hardware_id(&self) -> HardwareId {
        self.hardware_id
    }

    fn close(&mut self) {
        self.socket = None;
    }
}
