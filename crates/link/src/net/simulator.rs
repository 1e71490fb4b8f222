use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use super::protocol::{Datagram, Packet};
use super::stats::{PacketLossSimulation, SimRng};
use super::transport::{HardwareId, Transport, TransportError};

pub type NodeId = usize;

#[derive(Debug, Default)]
struct Medium {
    inboxes: Vec<VecDeque<Vec<u8>>>,
    isolated: Vec<bool>,
    loss: PacketLossSimulation,
    rng: SimRng,
    sent_log: Vec<(NodeId, Datagram)>,
    dropped: u64,
}

/// In-memory broadcast segment. Every datagram sent by one attached node is
/// queued on every other node, minus simulated loss and isolated nodes.
#[derive(Debug, Clone, Default)]
pub struct LoopbackNetwork {
    medium: Rc<RefCell<Medium>>,
}

impl LoopbackNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_loss(loss: PacketLossSimulation, seed: u64) -> Self {
        let network = Self::new();
        {
            let mut medium = network.medium.borrow_mut();
            medium.loss = loss;
            medium.rng = SimRng::new(seed);
        }
        network
    }

    pub fn attach(&self, hardware_id: HardwareId) -> LoopbackTransport {
        let mut medium = self.medium.borrow_mut();
        medium.inboxes.push(VecDeque::new());
        medium.isolated.push(false);

        LoopbackTransport {
            node: medium.inboxes.len() - 1,
            hardware_id,
            network: self.clone(),
            closed: false,
        }
    }

    pub fn set_loss(&self, loss: PacketLossSimulation) {
        self.medium.borrow_mut().loss = loss;
    }

    /// An isolated node neither sends nor receives anything.
    pub fn set_isolated(&self, node: NodeId, isolated: bool) {
        if let Some(flag) = self.medium.borrow_mut().isolated.get_mut(node) {
            *flag = isolated;
        }
    }

    /// Queues raw bytes on one node as if they had arrived from the wire.
    pub fn inject(&self, node: NodeId, data: &[u8]) {
        if let Some(inbox) = self.medium.borrow_mut().inboxes.get_mut(node) {
            inbox.push_back(data.to_vec());
        }
    }

    pub fn pending(&self, node: NodeId) -> usize {
        self.medium
            .borrow()
            .inboxes
            .get(node)
            .map_or(0, VecDeque::len)
    }

    /// Everything `node` handed to the medium, in send order, lost or not.
    pub fn sent_by(&self, node: NodeId) -> Vec<Packet> {
        self.medium
            .borrow()
            .sent_log
            .iter()
            .filter(|(from, _)| *from == node)
            .filter_map(|(_, data)| Packet::decode(data).ok())
            .collect()
    }

    pub fn clear_log(&self) {
        self.medium.borrow_mut().sent_log.clear();
    }

    pub fn dropped(&self) -> u64 {
        self.medium.borrow().dropped
    }

    fn broadcast(&self, from: NodeId, datagram: &Datagram) {
        let mut medium = self.medium.borrow_mut();
        medium.sent_log.push((from, *datagram));

        if medium.isolated.get(from).copied().unwrap_or(true) {
            medium.dropped += 1;
            return;
        }

        let Medium {
            inboxes,
            isolated,
            loss,
            rng,
            dropped,
            ..
        } = &mut *medium;

        for (node, inbox) in inboxes.iter_mut().enumerate() {
            if node == from || isolated[node] {
                continue;
            }
            if loss.should_drop(rng) {
                *dropped += 1;
                continue;
            }
            inbox.push_back(datagram.to_vec());
        }
    }

    fn receive(&self, node: NodeId) -> Option<Vec<u8>> {
        let mut medium = self.medium.borrow_mut();
        if medium.isolated.get(node).copied().unwrap_or(true) {
            return None;
        }
        medium.inboxes.get_mut(node)?.pop_front()
    }
}

#[derive(Debug)]
pub struct LoopbackTransport {
    node: NodeId,
    hardware_id: HardwareId,
    network: LoopbackNetwork,
    closed: bool,
}

impl LoopbackTransport {
    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl Transport for LoopbackTransport {
    fn send(&mut self, datagram: &Datagram) -> Result<(), TransportError> {
        if self.closed {
            return Err(TransportError::Closed);
        }
        self.network.broadcast(self.node, datagram);
        Ok(())
    }

    fn try_recv(&mut self) -> Option<Vec<u8>> {
        if self.closed {
            return None;
        }
        self.network.receive(self.node)
    }

    fn hardware_id(&self) -> HardwareId {
        self.hardware_id
    }

    fn close(&mut self) {
        self.closed = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::protocol::Payload;

    fn hw(last: u8) -> HardwareId {
        HardwareId([0, 0, 0, 0, 0, last])
    }

    #[test]
    fn test_broadcast_reaches_everyone_but_sender() {
        let network = LoopbackNetwork::new();
        let mut a = network.attach(hw(1));
        let b = network.attach(hw(2));
        let c = network.attach(hw(3));

        a.send(&Packet::new(1, Payload::Disconnect).encode()).unwrap();

        assert_eq!(network.pending(a.node()), 0);
        assert_eq!(network.pending(b.node()), 1);
        assert_eq!(network.pending(c.node()), 1);
        assert_eq!(network.sent_by(a.node()).len(), 1);
    }

    #[test]
    fn test_isolated_node_is_cut_off() {
        let network = LoopbackNetwork::new();
        let mut a = network.attach(hw(1));
        let mut b = network.attach(hw(2));

        network.set_isolated(b.node(), true);
        a.send(&Packet::new(1, Payload::Disconnect).encode()).unwrap();
        b.send(&Packet::new(2, Payload::Disconnect).encode()).unwrap();

        assert!(a.try_recv().is_none());
        assert!(b.try_recv().is_none());
        assert_eq!(network.dropped(), 1);
        assert_eq!(network.pending(b.node()), 0);
    }

    #[test]
    fn test_closed_transport() {
        let network = LoopbackNetwork::new();
        let mut a = network.attach(hw(1));
        a.close();

        assert!(a.is_closed());
        assert!(matches!(a.send(&[0u8; 32]), Err(TransportError::Closed)));
    }
}
