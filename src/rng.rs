//! Deterministic random number generation
//!
//! Every agent owns an independent stream derived from the master seed and
//! its role, so no generator is ever shared between threads.

use rand::{Rng, RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::systems::AgentRole;

/// Random stream handed to an agent thread.
pub type AgentRng = Box<dyn RngCore + Send>;

pub struct RngManager {
    master_seed: u64,
}

impl RngManager {
    pub fn new(seed: u64) -> Self {
        Self { master_seed: seed }
    }

    /// Fresh stream for `role`. Calling twice yields identical streams.
    pub fn stream(&self, role: AgentRole) -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(self.derive_seed(role.id()))
    }

    fn derive_seed(&self, stream_id: u32) -> u64 {
        let mut seed = self.master_seed;
        seed = seed
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        seed ^= (stream_id as u64).wrapping_mul(1103515245);
        seed = seed
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        seed
    }
}

impl Default for RngManager {
    fn default() -> Self {
        Self::new(32)
    }
}

/// Draw helpers shared by the update rules.
pub trait RngExt {
    /// Uniform draw in `[low, high)`.
    fn uniform(&mut self, low: f32, high: f32) -> f32;
    /// True when a unit draw falls below `probability`. Values above 1.0 always hit.
    fn chance(&mut self, probability: f32) -> bool;
}

impl<R: Rng + ?Sized> RngExt for R {
    fn uniform(&mut self, low: f32, high: f32) -> f32 {
        low + self.gen::<f32>() * (high - low)
    }

    fn chance(&mut self, probability: f32) -> bool {
        self.gen::<f32>() < probability
    }
}
