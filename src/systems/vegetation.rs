use rand::RngCore;

use crate::{
    config::{PreyConfig, VegetationConfig},
    systems::{AgentRole, UpdateRule},
    world::{ResourceState, StateSnapshot},
};

#[derive(Debug, Clone)]
pub struct VegetationRule {
    growth_per_month: f32,
    optimum_temp: f32,
    optimum_precip: f32,
    temp_spread: f32,
    precip_spread: f32,
    eaten_per_prey: f32,
}

impl VegetationRule {
    pub fn new(config: &VegetationConfig, prey: &PreyConfig) -> Self {
        Self {
            growth_per_month: config.growth_per_month,
            optimum_temp: config.optimum_temp,
            optimum_precip: config.optimum_precip,
            temp_spread: config.temp_spread,
            precip_spread: config.precip_spread,
            eaten_per_prey: prey.consumption_per_month,
        }
    }

    /// exp(-((value - optimum) / spread)^2): 1.0 at the optimum, falling off on both sides.
    pub fn suitability(value: f32, optimum: f32, spread: f32) -> f32 {
        let z = (value - optimum) / spread;
        (-(z * z)).exp()
    }
}

impl UpdateRule for VegetationRule {
    type Value = ResourceState;

    fn role(&self) -> AgentRole {
        AgentRole::Vegetation
    }

    fn propose(&self, snapshot: &StateSnapshot, _rng: &mut dyn RngCore) -> ResourceState {
        let env = &snapshot.environment;
        let temp_factor = Self::suitability(env.temperature, self.optimum_temp, self.temp_spread);
        let precip_factor =
            Self::suitability(env.precipitation, self.optimum_precip, self.precip_spread);

        let growth = temp_factor * precip_factor * self.growth_per_month;
        let eaten = snapshot.prey.count as f32 * self.eaten_per_prey;

        ResourceState {
            height: (snapshot.vegetation.height + growth - eaten).max(0.0),
        }
    }
}
