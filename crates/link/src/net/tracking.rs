use crate::config::Tick;

use super::protocol::Packet;

pub const ACK_QUEUE_LEN: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingAck {
    pub packet: Packet,
    pub sent_at: Tick,
    pub retry_count: u8,
}

#[derive(Debug, Clone, Default)]
pub struct RetrySweep {
    pub resend: Vec<Packet>,
    pub abandoned: usize,
}

/// Reliable messages in flight to a single peer. Fixed capacity: once all
/// slots are busy, further messages to that peer go out untracked.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AckQueue {
    slots: [Option<PendingAck>; ACK_QUEUE_LEN],
}

impl AckQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Puts `packet` in the first free slot. Returns false when the queue is full.
    pub fn track(&mut self, packet: Packet, now: Tick) -> bool {
        match self.slots.iter_mut().find(|slot| slot.is_none()) {
            Some(slot) => {
                *slot = Some(PendingAck {
                    packet,
                    sent_at: now,
                    retry_count: 0,
                });
                true
            }
            None => false,
        }
    }

    /// Deactivates the first in-flight entry carrying `seq`.
    pub fn acknowledge(&mut self, seq: u8) -> bool {
        let found = self
            .slots
            .iter_mut()
            .find(|slot| slot.is_some_and(|pending| pending.packet.seq == seq));

        match found {
            Some(slot) => {
                *slot = None;
                true
            }
            None => false,
        }
    }

    /// Collects every entry whose last send is at least `retry_timeout` old.
    /// Entries that reach `max_retries` resends are dropped after this resend.
    pub fn sweep(&mut self, now: Tick, retry_timeout: Tick, max_retries: u8) -> RetrySweep {
        let mut sweep = RetrySweep::default();

        for slot in &mut self.slots {
            let Some(pending) = slot else {
                continue;
            };
            if now.wrapping_sub(pending.sent_at) < retry_timeout {
                continue;
            }

            sweep.resend.push(pending.packet);
            pending.retry_count += 1;
            pending.sent_at = now;

            if pending.retry_count >= max_retries {
                *slot = None;
                sweep.abandoned += 1;
            }
        }

        sweep
    }

    pub fn clear(&mut self) {
        self.slots = Default::default();
    }

    pub fn active_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn is_full(&self) -> bool {
        self.active_count() == ACK_QUEUE_LEN
    }

    pub fn iter(&self) -> impl Iterator<Item = &PendingAck> {
        self.slots.iter().flatten()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::protocol::Payload;

    fn update(seq: u8) -> Packet {
        let mut packet = Packet::new(1, Payload::Update { ready: false });
        packet.seq = seq;
        packet
    }

    #[test]
    fn test_queue_capacity() {
        let mut queue = AckQueue::new();

        for seq in 0..ACK_QUEUE_LEN as u8 {
            assert!(queue.track(update(seq), 0));
        }
        assert!(queue.is_full());
        assert!(!queue.track(update(99), 0));
        assert_eq!(queue.active_count(), ACK_QUEUE_LEN);
    }

    #[test]
    fn test_ack_frees_first_matching_slot() {
        let mut queue = AckQueue::new();
        queue.track(update(3), 0);
        queue.track(update(4), 0);

        assert!(queue.acknowledge(3));
        assert!(!queue.acknowledge(3));
        assert!(!queue.acknowledge(42));
        assert_eq!(queue.active_count(), 1);

        assert!(queue.track(update(5), 0));
        assert_eq!(queue.iter().next().map(|p| p.packet.seq), Some(5));
    }

    #[test]
    fn test_retry_schedule() {
        let mut queue = AckQueue::new();
        queue.track(update(7), 0);

        assert!(queue.sweep(499, 500, 5).resend.is_empty());

        let mut resends = 0;
        let mut now = 0;
        while queue.active_count() > 0 {
            now += 100;
            resends += queue.sweep(now, 500, 5).resend.len();
        }

        assert_eq!(resends, 5);
        assert_eq!(now, 2500);
    }

    #[test]
    fn test_abandoned_count() {
        let mut queue = AckQueue::new();
        queue.track(update(1), 0);
        queue.track(update(2), 0);

        let mut abandoned = 0;
        for step in 1..=5 {
            abandoned += queue.sweep(step * 500, 500, 5).abandoned;
        }

        assert_eq!(abandoned, 2);
        assert_eq!(queue.active_count(), 0);
    }

    #[test]
    fn test_clock_wraparound() {
        let mut queue = AckQueue::new();
        queue.track(update(1), Tick::MAX - 100);

        assert!(queue.sweep(Tick::MAX, 500, 5).resend.is_empty());
        assert_eq!(queue.sweep(399, 500, 5).resend.len(), 1);
    }
}
