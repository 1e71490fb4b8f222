use super::protocol::{PACKET_SIZE, Packet, PlayerId};
use super::stats::NetworkStats;
use super::transport::Transport;

/// Owns the transport for one session: encodes outgoing packets, decodes and
/// filters incoming ones, and keeps the traffic counters.
pub struct Endpoint<T: Transport> {
    transport: T,
    stats: NetworkStats,
}

impl<T: Transport> Endpoint<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            stats: NetworkStats::default(),
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn stats(&self) -> &NetworkStats {
        &self.stats
    }

    pub fn send(&mut self, packet: &Packet) {
        let data = packet.encode();
        match self.transport.send(&data) {
            Ok(()) => {
                self.stats.packets_sent += 1;
                self.stats.bytes_sent += PACKET_SIZE as u64;
            }
            Err(e) => {
                log::warn!("Failed to send {:?}: {}", packet.message_type(), e);
            }
        }
    }

    pub fn resend(&mut self, packet: &Packet) {
        self.stats.retransmissions += 1;
        self.send(packet);
    }

    pub fn record_abandoned(&mut self, count: usize) {
        self.stats.messages_abandoned += count as u64;
    }

    /// Pulls every datagram currently waiting on the transport. Malformed,
    /// foreign and self-originated datagrams are dropped here and never
    /// reach the caller.
    pub fn drain(&mut self, local_id: PlayerId) -> Vec<Packet> {
        let mut packets = Vec::new();

        while let Some(data) = self.transport.try_recv() {
            self.stats.packets_received += 1;
            self.stats.bytes_received += data.len() as u64;

            match Packet::decode(&data) {
                Ok(packet) if packet.sender == local_id => {
                    self.stats.packets_discarded += 1;
                }
                Ok(packet) => packets.push(packet),
                Err(e) => {
                    log::debug!("Discarding datagram: {}", e);
                    self.stats.packets_discarded += 1;
                }
            }
        }

        packets
    }

    pub fn close(&mut self) {
        self.transport.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::protocol::Payload;
    use crate::net::simulator::LoopbackNetwork;
    use crate::net::transport::HardwareId;

    #[test]
    fn test_drain_filters_foreign_and_own_packets() {
        let network = LoopbackNetwork::new();
        let mut endpoint = Endpoint::new(network.attach(HardwareId([0, 0, 0, 0, 0, 1])));
        let node = endpoint.transport().node();

        network.inject(node, &Packet::new(2, Payload::Ready { ready: true }).encode());
        network.inject(node, &Packet::new(1, Payload::Disconnect).encode());
        network.inject(node, &[1, 2, 3]);
        let mut wrong_version = Packet::new(3, Payload::Disconnect).encode();
        wrong_version[0] = 9;
        network.inject(node, &wrong_version);

        let packets = endpoint.drain(1);
        assert_eq!(packets.len(), 1);
        assert_eq!(packets[0].sender, 2);

        let stats = endpoint.stats();
        assert_eq!(stats.packets_received, 4);
        assert_eq!(stats.packets_discarded, 3);
        assert!(endpoint.drain(1).is_empty());
    }

    #[test]
    fn test_send_counts_only_successes() {
        let network = LoopbackNetwork::new();
        let mut endpoint = Endpoint::new(network.attach(HardwareId([0, 0, 0, 0, 0, 1])));
        let packet = Packet::new(1, Payload::Disconnect);

        endpoint.send(&packet);
        endpoint.resend(&packet);
        endpoint.close();
        endpoint.send(&packet);

        let stats = endpoint.stats();
        assert_eq!(stats.packets_sent, 2);
        assert_eq!(stats.bytes_sent, 64);
        assert_eq!(stats.retransmissions, 1);
    }
}
