pub mod barrier;
pub mod config;
pub mod engine;
pub mod report;
pub mod rng;
pub mod systems;
pub mod world;

pub use config::SimulationConfig;
pub use engine::{RunSummary, Simulation, SimulationBuilder, SimulationError};
pub use report::MonthReport;
