//! Network and host fault injection: dropped datagrams and slow processing.

use std::sync::Mutex;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::SimulationSection;

pub struct FaultSimulator {
    drop_rate: f64,
    min_delay_ms: u64,
    max_delay_ms: u64,
    rng: Mutex<StdRng>,
}

impl FaultSimulator {
    pub fn new(cfg: &SimulationSection) -> Self {
        Self::with_rng(cfg, StdRng::from_entropy())
    }

    /// Deterministic simulator for tests.
    pub fn seeded(cfg: &SimulationSection, seed: u64) -> Self {
        Self::with_rng(cfg, StdRng::seed_from_u64(seed))
    }

    pub fn disabled() -> Self {
        Self::seeded(&SimulationSection::default(), 0)
    }

    fn with_rng(cfg: &SimulationSection, rng: StdRng) -> Self {
        Self {
            drop_rate: cfg.drop_rate.clamp(0.0, 1.0),
            min_delay_ms: cfg.min_delay_ms,
            max_delay_ms: cfg.max_delay_ms.max(cfg.min_delay_ms),
            rng: Mutex::new(rng),
        }
    }

    pub fn is_active(&self) -> bool {
        self.drop_rate > 0.0 || self.max_delay_ms > 0
    }

    /// Roll for a lost datagram.
    pub fn should_drop(&self) -> bool {
        if self.drop_rate <= 0.0 {
            return false;
        }
        if self.drop_rate >= 1.0 {
            return true;
        }
        self.roll(|rng| rng.gen::<f64>() < self.drop_rate)
    }

    /// Processing delay, uniform in `[min_delay_ms, max_delay_ms]`.
    pub fn delay(&self) -> Duration {
        if self.max_delay_ms == self.min_delay_ms {
            return Duration::from_millis(self.min_delay_ms);
        }
        let ms = self.roll(|rng| rng.gen_range(self.min_delay_ms..=self.max_delay_ms));
        Duration::from_millis(ms)
    }

    fn roll<T>(&self, f: impl FnOnce(&mut StdRng) -> T) -> T {
        let mut rng = match self.rng.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut rng)
    }
}
