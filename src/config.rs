use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

fn default_seed() -> u64 {
    32
}

fn default_start_year() -> i32 {
    2023
}

fn default_horizon_year() -> i32 {
    2029
}

fn default_avg_temp() -> f32 {
    60.0
}

fn default_amp_temp() -> f32 {
    20.0
}

fn default_random_temp() -> f32 {
    10.0
}

fn default_avg_precip() -> f32 {
    12.0
}

fn default_amp_precip() -> f32 {
    4.0
}

fn default_random_precip() -> f32 {
    2.0
}

fn default_growth_per_month() -> f32 {
    30.0
}

fn default_optimum_temp() -> f32 {
    60.0
}

fn default_optimum_precip() -> f32 {
    14.0
}

fn default_spread() -> f32 {
    10.0
}

fn default_initial_height() -> f32 {
    5.0
}

fn default_consumption_per_month() -> f32 {
    1.0
}

fn default_predation_chance() -> f32 {
    0.4
}

fn default_prey_count() -> u32 {
    10
}

fn default_reproduction_chance() -> f32 {
    0.05
}

fn default_predator_count() -> u32 {
    1
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read scenario file: {0}")]
    Io(#[from] std::io::Error),
    #[error("scenario parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("scenario validation error: {0}")]
    Validation(String),
}

/// Every parameter of a run. Defaults reproduce the reference grassland.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    #[serde(default = "default_seed")]
    pub seed: u64,
    /// Milliseconds an agent may wait at a barrier before the run fails.
    /// Absent means wait forever.
    #[serde(default)]
    pub barrier_timeout_ms: Option<u64>,
    #[serde(default)]
    pub clock: ClockConfig,
    #[serde(default)]
    pub climate: ClimateConfig,
    #[serde(default)]
    pub vegetation: VegetationConfig,
    #[serde(default)]
    pub prey: PreyConfig,
    #[serde(default)]
    pub predator: PredatorConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClockConfig {
    #[serde(default)]
    pub start_month: u32,
    #[serde(default = "default_start_year")]
    pub start_year: i32,
    /// First year that is not simulated.
    #[serde(default = "default_horizon_year")]
    pub horizon_year: i32,
}

/// Seasonal curve in Fahrenheit and inches of rain per month.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClimateConfig {
    #[serde(default = "default_avg_temp")]
    pub avg_temp: f32,
    #[serde(default = "default_amp_temp")]
    pub amp_temp: f32,
    #[serde(default = "default_random_temp")]
    pub random_temp: f32,
    #[serde(default = "default_avg_precip")]
    pub avg_precip: f32,
    #[serde(default = "default_amp_precip")]
    pub amp_precip: f32,
    #[serde(default = "default_random_precip")]
    pub random_precip: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VegetationConfig {
    #[serde(default = "default_growth_per_month")]
    pub growth_per_month: f32,
    #[serde(default = "default_optimum_temp")]
    pub optimum_temp: f32,
    #[serde(default = "default_optimum_precip")]
    pub optimum_precip: f32,
    #[serde(default = "default_spread")]
    pub temp_spread: f32,
    #[serde(default = "default_spread")]
    pub precip_spread: f32,
    #[serde(default = "default_initial_height")]
    pub initial_height: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreyConfig {
    /// Vegetation height eaten by one prey per month.
    #[serde(default = "default_consumption_per_month")]
    pub consumption_per_month: f32,
    /// Added to the chance of an extra decrement for every predator.
    #[serde(default = "default_predation_chance")]
    pub predation_chance_per_predator: f32,
    #[serde(default = "default_prey_count")]
    pub initial_count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredatorConfig {
    /// Added to the chance of an increment for every prey.
    #[serde(default = "default_reproduction_chance")]
    pub reproduction_chance_per_prey: f32,
    /// Reference model parameter kept so scenarios carry the full constant set.
    /// The predator rule does not read it.
    #[serde(default = "default_consumption_per_month")]
    pub consumption_per_month: f32,
    #[serde(default = "default_predator_count")]
    pub initial_count: u32,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            start_month: 0,
            start_year: default_start_year(),
            horizon_year: default_horizon_year(),
        }
    }
}

impl Default for ClimateConfig {
    fn default() -> Self {
        Self {
            avg_temp: default_avg_temp(),
            amp_temp: default_amp_temp(),
            random_temp: default_random_temp(),
            avg_precip: default_avg_precip(),
            amp_precip: default_amp_precip(),
            random_precip: default_random_precip(),
        }
    }
}

impl Default for VegetationConfig {
    fn default() -> Self {
        Self {
            growth_per_month: default_growth_per_month(),
            optimum_temp: default_optimum_temp(),
            optimum_precip: default_optimum_precip(),
            temp_spread: default_spread(),
            precip_spread: default_spread(),
            initial_height: default_initial_height(),
        }
    }
}

impl Default for PreyConfig {
    fn default() -> Self {
        Self {
            consumption_per_month: default_consumption_per_month(),
            predation_chance_per_predator: default_predation_chance(),
            initial_count: default_prey_count(),
        }
    }
}

impl Default for PredatorConfig {
    fn default() -> Self {
        Self {
            reproduction_chance_per_prey: default_reproduction_chance(),
            consumption_per_month: default_consumption_per_month(),
            initial_count: default_predator_count(),
        }
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self::reference()
    }
}

impl SimulationConfig {
    /// The reference grassland: seed 32, January 2023 through December 2028.
    pub fn reference() -> Self {
        Self {
            seed: default_seed(),
            barrier_timeout_ms: None,
            clock: ClockConfig::default(),
            climate: ClimateConfig::default(),
            vegetation: VegetationConfig::default(),
            prey: PreyConfig::default(),
            predator: PredatorConfig::default(),
        }
    }

    /// Loads and validates a YAML scenario.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        Self::from_yaml_str(&text)
    }

    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        // An empty document deserializes to unit, not to a map.
        let config: SimulationConfig = if text.trim().is_empty() {
            Self::reference()
        } else {
            serde_yaml::from_str(text)?
        };
        config.validate()?;
        Ok(config)
    }

    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn barrier_timeout(&self) -> Option<Duration> {
        self.barrier_timeout_ms.map(Duration::from_millis)
    }

    /// Number of months the run will report.
    pub fn months_to_simulate(&self) -> u64 {
        let years = (self.clock.horizon_year as i64 - self.clock.start_year as i64).max(0) as u64;
        (years * 12).saturating_sub(self.clock.start_month as u64)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.clock.start_month >= 12 {
            return Err(ConfigError::Validation(format!(
                "start_month must be in 0..12, got {}",
                self.clock.start_month
            )));
        }
        if self.clock.horizon_year < self.clock.start_year {
            return Err(ConfigError::Validation(format!(
                "horizon_year {} is before start_year {}",
                self.clock.horizon_year, self.clock.start_year
            )));
        }
        if self.barrier_timeout_ms == Some(0) {
            return Err(ConfigError::Validation(
                "barrier_timeout_ms must be greater than zero when set".into(),
            ));
        }

        let climate = &self.climate;
        require_finite("climate.avg_temp", climate.avg_temp)?;
        require_finite("climate.avg_precip", climate.avg_precip)?;
        require_non_negative("climate.amp_temp", climate.amp_temp)?;
        require_non_negative("climate.random_temp", climate.random_temp)?;
        require_non_negative("climate.amp_precip", climate.amp_precip)?;
        require_non_negative("climate.random_precip", climate.random_precip)?;

        let vegetation = &self.vegetation;
        require_non_negative("vegetation.growth_per_month", vegetation.growth_per_month)?;
        require_non_negative("vegetation.initial_height", vegetation.initial_height)?;
        require_finite("vegetation.optimum_temp", vegetation.optimum_temp)?;
        require_finite("vegetation.optimum_precip", vegetation.optimum_precip)?;
        require_positive("vegetation.temp_spread", vegetation.temp_spread)?;
        require_positive("vegetation.precip_spread", vegetation.precip_spread)?;

        require_non_negative("prey.consumption_per_month", self.prey.consumption_per_month)?;
        require_non_negative(
            "prey.predation_chance_per_predator",
            self.prey.predation_chance_per_predator,
        )?;
        require_non_negative(
            "predator.reproduction_chance_per_prey",
            self.predator.reproduction_chance_per_prey,
        )?;
        require_non_negative(
            "predator.consumption_per_month",
            self.predator.consumption_per_month,
        )?;
        Ok(())
    }
}

fn require_finite(name: &str, value: f32) -> Result<(), ConfigError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::Validation(format!("{name} must be finite")))
    }
}

fn require_non_negative(name: &str, value: f32) -> Result<(), ConfigError> {
    require_finite(name, value)?;
    if value < 0.0 {
        return Err(ConfigError::Validation(format!(
            "{name} must not be negative, got {value}"
        )));
    }
    Ok(())
}

fn require_positive(name: &str, value: f32) -> Result<(), ConfigError> {
    require_finite(name, value)?;
    if value <= 0.0 {
        return Err(ConfigError::Validation(format!(
            "{name} must be greater than zero, got {value}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_config_matches_grassland_defaults() {
        let config = SimulationConfig::reference();

        assert_eq!(config.seed, 32);
        assert_eq!(config.clock.start_year, 2023);
        assert_eq!(config.clock.horizon_year, 2029);
        assert_eq!(config.prey.initial_count, 10);
        assert_eq!(config.predator.initial_count, 1);
        assert_eq!(config.vegetation.initial_height, 5.0);
        assert_eq!(config.months_to_simulate(), 72);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn empty_document_yields_reference() {
        let config = SimulationConfig::from_yaml_str("").unwrap();
        assert_eq!(config, SimulationConfig::reference());
    }

    #[test]
    fn partial_document_keeps_defaults() {
        let text = "seed: 7\nclock:\n  horizon_year: 2024\nprey:\n  initial_count: 0\n";
        let config = SimulationConfig::from_yaml_str(text).unwrap();

        assert_eq!(config.seed, 7);
        assert_eq!(config.clock.start_year, 2023);
        assert_eq!(config.clock.horizon_year, 2024);
        assert_eq!(config.prey.initial_count, 0);
        assert_eq!(config.prey.predation_chance_per_predator, 0.4);
    }

    #[test]
    fn yaml_round_trip_preserves_values() {
        let mut config = SimulationConfig::reference();
        config.barrier_timeout_ms = Some(250);
        config.climate.random_temp = 3.5;

        let text = config.to_yaml().unwrap();
        let loaded = SimulationConfig::from_yaml_str(&text).unwrap();
        assert_eq!(config, loaded);
        assert_eq!(loaded.barrier_timeout(), Some(Duration::from_millis(250)));
    }

    #[test]
    fn horizon_before_start_is_rejected() {
        let mut config = SimulationConfig::reference();
        config.clock.horizon_year = 2020;
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn negative_rates_are_rejected() {
        let mut config = SimulationConfig::reference();
        config.vegetation.growth_per_month = -1.0;
        assert!(config.validate().is_err());

        let mut config = SimulationConfig::reference();
        config.prey.consumption_per_month = -0.5;
        assert!(config.validate().is_err());

        let mut config = SimulationConfig::reference();
        config.vegetation.temp_spread = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn bad_start_month_and_zero_timeout_are_rejected() {
        let mut config = SimulationConfig::reference();
        config.clock.start_month = 12;
        assert!(config.validate().is_err());

        let mut config = SimulationConfig::reference();
        config.barrier_timeout_ms = Some(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn start_month_shortens_the_run() {
        let mut config = SimulationConfig::reference();
        config.clock.start_month = 6;
        config.clock.horizon_year = 2024;
        assert_eq!(config.months_to_simulate(), 6);
    }

    #[test]
    fn extreme_years_do_not_overflow_month_count() {
        let mut config = SimulationConfig::reference();
        config.clock.start_year = i32::MIN;
        config.clock.horizon_year = i32::MAX;
        assert!(config.validate().is_ok());
        assert_eq!(config.months_to_simulate(), u32::MAX as u64 * 12);
    }

    #[test]
    fn malformed_yaml_is_a_parse_error() {
        let err = SimulationConfig::from_yaml_str("seed: [not, a, number]").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
