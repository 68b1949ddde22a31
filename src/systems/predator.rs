use rand::RngCore;

use crate::{
    config::PredatorConfig,
    rng::RngExt,
    systems::{AgentRole, UpdateRule},
    world::{PopulationState, StateSnapshot},
};

/// Predators grow by one with a chance proportional to the prey count and
/// otherwise shrink by one. The two outcomes are exclusive.
#[derive(Debug, Clone)]
pub struct PredatorRule {
    reproduction_chance_per_prey: f32,
}

impl PredatorRule {
    pub fn new(config: &PredatorConfig) -> Self {
        Self {
            reproduction_chance_per_prey: config.reproduction_chance_per_prey,
        }
    }
}

impl UpdateRule for PredatorRule {
    type Value = PopulationState;

    fn role(&self) -> AgentRole {
        AgentRole::Predator
    }

    fn propose(&self, snapshot: &StateSnapshot, rng: &mut dyn RngCore) -> PopulationState {
        let mut next = snapshot.predator.count as i64;
        if rng.chance(snapshot.prey.count as f32 * self.reproduction_chance_per_prey) {
            next += 1;
        } else {
            next -= 1;
        }

        PopulationState {
            count: next.clamp(0, u32::MAX as i64) as u32,
        }
    }
}
