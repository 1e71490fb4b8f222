use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkStats {
    pub packets_sent: u64,
    pub packets_received: u64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
    /// Datagrams dropped on receive: malformed, foreign version, bad sender, or our own echo.
    pub packets_discarded: u64,
    pub retransmissions: u64,
    pub messages_abandoned: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PacketLossSimulation {
    pub enabled: bool,
    pub loss_percent: f32,
}

impl PacketLossSimulation {
    pub fn with_loss(loss_percent: f32) -> Self {
        Self {
            enabled: true,
            loss_percent,
        }
    }

    pub fn should_drop(&self, rng: &mut SimRng) -> bool {
        if !self.enabled || self.loss_percent <= 0.0 {
            return false;
        }
        rng.next_percent() < self.loss_percent
    }
}

/// Seeded xorshift generator so simulated loss is reproducible between runs.
#[derive(Debug, Clone)]
pub struct SimRng(u64);

impl SimRng {
    pub fn new(seed: u64) -> Self {
        Self(seed.max(1))
    }

    pub fn next_u64(&mut self) -> u64 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.0 = x;
        x
    }

    pub fn next_percent(&mut self) -> f32 {
        (self.next_u64() % 10_000) as f32 / 100.0
    }
}

impl Default for SimRng {
    fn default() -> Self {
        Self::new(0x9E37_79B9_7F4A_7C15)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_simulation_never_drops() {
        let sim = PacketLossSimulation {
            enabled: false,
            loss_percent: 100.0,
        };
        let mut rng = SimRng::default();
        assert!((0..100).all(|_| !sim.should_drop(&mut rng)));
    }

    #[test]
    fn test_full_loss_always_drops() {
        let sim = PacketLossSimulation::with_loss(100.0);
        let mut rng = SimRng::new(7);
        assert!((0..100).all(|_| sim.should_drop(&mut rng)));
    }

    #[test]
    fn test_rng_is_reproducible() {
        let mut a = SimRng::new(42);
        let mut b = SimRng::new(42);
        for _ in 0..16 {
            assert_eq!(a.next_u64(), b.next_u64());
        }
    }
}
