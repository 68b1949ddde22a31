mod climate;
mod predator;
mod prey;
mod vegetation;

pub use climate::{fahrenheit_to_celsius, ClimateModel};
pub use predator::PredatorRule;
pub use prey::PreyRule;
pub use vegetation::VegetationRule;

use std::fmt;

use rand::RngCore;

use crate::world::StateSnapshot;

/// The four concurrently running agents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AgentRole {
    /// Owns the clock and climate and emits the monthly report.
    Coordinator,
    Prey,
    Vegetation,
    Predator,
}

impl AgentRole {
    pub const ALL: [AgentRole; 4] = [
        AgentRole::Coordinator,
        AgentRole::Prey,
        AgentRole::Vegetation,
        AgentRole::Predator,
    ];

    pub fn id(self) -> u32 {
        match self {
            AgentRole::Coordinator => 1,
            AgentRole::Prey => 2,
            AgentRole::Vegetation => 3,
            AgentRole::Predator => 4,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            AgentRole::Coordinator => "coordinator",
            AgentRole::Prey => "prey",
            AgentRole::Vegetation => "vegetation",
            AgentRole::Predator => "predator",
        }
    }
}

impl fmt::Display for AgentRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Computes one agent's proposed value for the next month from the last
/// published snapshot. Implementations never touch shared state.
pub trait UpdateRule: Send {
    type Value: Copy + Send + Sync + fmt::Debug + 'static;

    fn role(&self) -> AgentRole;

    fn propose(&self, snapshot: &StateSnapshot, rng: &mut dyn RngCore) -> Self::Value;
}
