use rand::RngCore;

use crate::{
    config::PreyConfig,
    rng::RngExt,
    systems::{AgentRole, UpdateRule},
    world::{PopulationState, StateSnapshot},
};

/// Prey drift one step toward the carrying capacity set by vegetation height,
/// and may lose one more to predators.
#[derive(Debug, Clone)]
pub struct PreyRule {
    predation_chance_per_predator: f32,
}

impl PreyRule {
    pub fn new(config: &PreyConfig) -> Self {
        Self {
            predation_chance_per_predator: config.predation_chance_per_predator,
        }
    }

    pub fn carrying_capacity(height: f32) -> i64 {
        height.max(0.0) as i64
    }
}

impl UpdateRule for PreyRule {
    type Value = PopulationState;

    fn role(&self) -> AgentRole {
        AgentRole::Prey
    }

    fn propose(&self, snapshot: &StateSnapshot, rng: &mut dyn RngCore) -> PopulationState {
        let capacity = Self::carrying_capacity(snapshot.vegetation.height);
        let mut next = snapshot.prey.count as i64;
        if next < capacity {
            next += 1;
        } else if next > capacity {
            next -= 1;
        }

        // Not clamped: three or more predators always take one.
        let predation = snapshot.predator.count as f32 * self.predation_chance_per_predator;
        if rng.chance(predation) {
            next -= 1;
        }

        PopulationState {
            count: next.clamp(0, u32::MAX as i64) as u32,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::mock::StepRng;

    use crate::config::SimulationConfig;
    use crate::world::{EnvironmentState, ResourceState};

    fn snapshot(prey: u32, predator: u32, height: f32) -> StateSnapshot {
        let mut snapshot = StateSnapshot::initial(
            &SimulationConfig::reference(),
            EnvironmentState {
                temperature: 60.0,
                precipitation: 14.0,
            },
        );
        snapshot.prey.count = prey;
        snapshot.predator.count = predator;
        snapshot.vegetation = ResourceState { height };
        snapshot
    }

    /// Every unit draw lands just below 1.0.
    fn high_draw() -> StepRng {
        StepRng::new(u32::MAX as u64, 0)
    }

    fn rule() -> PreyRule {
        PreyRule::new(&PreyConfig::default())
    }

    #[test]
    fn grows_toward_capacity_without_predators() {
        let next = rule().propose(&snapshot(3, 0, 7.9), &mut StepRng::new(0, 0));
        assert_eq!(next.count, 4);
    }

    #[test]
    fn shrinks_above_capacity() {
        let next = rule().propose(&snapshot(10, 0, 5.0), &mut high_draw());
        assert_eq!(next.count, 9);
    }

    #[test]
    fn holds_at_capacity() {
        let next = rule().propose(&snapshot(5, 0, 5.5), &mut high_draw());
        assert_eq!(next.count, 5);
    }

    #[test]
    fn predator_draw_takes_one_more() {
        let next = rule().propose(&snapshot(5, 1, 5.0), &mut StepRng::new(0, 0));
        assert_eq!(next.count, 4);
    }

    #[test]
    fn zero_height_drives_prey_down_and_floors_at_zero() {
        let next = rule().propose(&snapshot(1, 3, 0.0), &mut StepRng::new(0, 0));
        assert_eq!(next.count, 0);

        let next = rule().propose(&snapshot(0, 5, 0.0), &mut StepRng::new(0, 0));
        assert_eq!(next.count, 0);
    }

    #[test]
    fn full_population_saturates_instead_of_wrapping() {
        let next = rule().propose(&snapshot(u32::MAX, 0, 1e12), &mut high_draw());
        assert_eq!(next.count, u32::MAX);
    }

    #[test]
    fn capacity_truncates_height() {
        assert_eq!(PreyRule::carrying_capacity(0.0), 0);
        assert_eq!(PreyRule::carrying_capacity(4.99), 4);
        assert_eq!(PreyRule::carrying_capacity(12.0), 12);
    }
}
