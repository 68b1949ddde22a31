use std::f32::consts::PI;

use rand::RngCore;

use crate::{config::ClimateConfig, rng::RngExt, world::EnvironmentState};

pub fn fahrenheit_to_celsius(fahrenheit: f32) -> f32 {
    (5.0 / 9.0) * (fahrenheit - 32.0)
}

/// Seasonal temperature and precipitation curve with uniform noise.
#[derive(Debug, Clone)]
pub struct ClimateModel {
    config: ClimateConfig,
}

impl ClimateModel {
    pub fn new(config: ClimateConfig) -> Self {
        Self { config }
    }

    /// Environment for `month` (0 - 11). Draws temperature noise first, then
    /// precipitation noise.
    pub fn environment_for(&self, month: u32, rng: &mut dyn RngCore) -> EnvironmentState {
        let c = &self.config;
        let angle = (30.0 * month as f32 + 15.0) * (PI / 180.0);

        let temperature =
            c.avg_temp - c.amp_temp * angle.cos() + rng.uniform(-c.random_temp, c.random_temp);

        let precipitation = c.avg_precip
            + c.amp_precip * angle.sin()
            + rng.uniform(-c.random_precip, c.random_precip);

        EnvironmentState {
            temperature,
            precipitation: precipitation.max(0.0),
        }
    }
}
