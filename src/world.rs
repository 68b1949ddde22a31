//! Shared state store.
//!
//! All agents read every field; each field is written only through the one
//! [`FieldWriter`] handed out when the store is created. The per-field locks
//! are a safety net: the stepping barrier already keeps reads of month N
//! apart from the writes that produce month N + 1.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use serde::{Deserialize, Serialize};

use crate::config::SimulationConfig;

pub const MONTHS_PER_YEAR: u32 = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationClock {
    /// 0 - 11
    pub month: u32,
    pub year: i32,
    /// First year that is not simulated.
    pub horizon_year: i32,
}

impl SimulationClock {
    pub fn new(month: u32, year: i32, horizon_year: i32) -> Self {
        Self {
            month: month % MONTHS_PER_YEAR,
            year,
            horizon_year,
        }
    }

    pub fn is_running(&self) -> bool {
        self.year < self.horizon_year
    }

    /// Moves forward one month, rolling into the next year after December.
    pub fn advance(&mut self) {
        self.month = (self.month + 1) % MONTHS_PER_YEAR;
        if self.month == 0 {
            self.year += 1;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentState {
    /// Fahrenheit
    pub temperature: f32,
    /// Inches of rain this month, never negative.
    pub precipitation: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PopulationState {
    pub count: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResourceState {
    /// Inches
    pub height: f32,
}

/// Every tracked value as of one fully published month.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StateSnapshot {
    pub clock: SimulationClock,
    pub environment: EnvironmentState,
    pub prey: PopulationState,
    pub vegetation: ResourceState,
    pub predator: PopulationState,
}

impl StateSnapshot {
    /// Starting state from a config. The environment must be supplied by the
    /// climate model since it depends on a random draw.
    pub fn initial(config: &SimulationConfig, environment: EnvironmentState) -> Self {
        Self {
            clock: SimulationClock::new(
                config.clock.start_month,
                config.clock.start_year,
                config.clock.horizon_year,
            ),
            environment,
            prey: PopulationState {
                count: config.prey.initial_count,
            },
            vegetation: ResourceState {
                height: config.vegetation.initial_height.max(0.0),
            },
            predator: PopulationState {
                count: config.predator.initial_count,
            },
        }
    }
}

/// Totals of finished compute and publish phases across all agents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PhaseCounts {
    pub computed: u64,
    pub published: u64,
}

#[derive(Debug, Default)]
pub struct PhaseLedger {
    computed: AtomicU64,
    published: AtomicU64,
}

impl PhaseLedger {
    pub fn record_computed(&self) {
        self.computed.fetch_add(1, Ordering::SeqCst);
    }

    pub fn record_published(&self) {
        self.published.fetch_add(1, Ordering::SeqCst);
    }

    pub fn counts(&self) -> PhaseCounts {
        PhaseCounts {
            computed: self.computed.load(Ordering::SeqCst),
            published: self.published.load(Ordering::SeqCst),
        }
    }
}

#[derive(Debug)]
pub struct SharedState {
    clock: RwLock<SimulationClock>,
    environment: RwLock<EnvironmentState>,
    prey: RwLock<PopulationState>,
    vegetation: RwLock<ResourceState>,
    predator: RwLock<PopulationState>,
    phases: PhaseLedger,
}

/// The only write handles to the store, one per owned field.
#[derive(Debug)]
pub struct Writers {
    pub clock: FieldWriter<SimulationClock>,
    pub environment: FieldWriter<EnvironmentState>,
    pub prey: FieldWriter<PopulationState>,
    pub vegetation: FieldWriter<ResourceState>,
    pub predator: FieldWriter<PopulationState>,
}

impl SharedState {
    pub fn new(initial: StateSnapshot) -> (Arc<Self>, Writers) {
        let state = Arc::new(Self {
            clock: RwLock::new(initial.clock),
            environment: RwLock::new(initial.environment),
            prey: RwLock::new(initial.prey),
            vegetation: RwLock::new(initial.vegetation),
            predator: RwLock::new(initial.predator),
            phases: PhaseLedger::default(),
        });
        let writers = Writers {
            clock: FieldWriter::new(&state, "clock", clock_slot),
            environment: FieldWriter::new(&state, "environment", environment_slot),
            prey: FieldWriter::new(&state, "prey", prey_slot),
            vegetation: FieldWriter::new(&state, "vegetation", vegetation_slot),
            predator: FieldWriter::new(&state, "predator", predator_slot),
        };
        (state, writers)
    }

    pub fn clock(&self) -> SimulationClock {
        read(&self.clock)
    }

    pub fn environment(&self) -> EnvironmentState {
        read(&self.environment)
    }

    pub fn prey(&self) -> PopulationState {
        read(&self.prey)
    }

    pub fn vegetation(&self) -> ResourceState {
        read(&self.vegetation)
    }

    pub fn predator(&self) -> PopulationState {
        read(&self.predator)
    }

    pub fn snapshot(&self) -> StateSnapshot {
        StateSnapshot {
            clock: self.clock(),
            environment: self.environment(),
            prey: self.prey(),
            vegetation: self.vegetation(),
            predator: self.predator(),
        }
    }

    pub fn phases(&self) -> &PhaseLedger {
        &self.phases
    }
}

fn read<T: Copy>(slot: &RwLock<T>) -> T {
    *slot.read().unwrap_or_else(PoisonError::into_inner)
}

type Slot<T> = fn(&SharedState) -> &RwLock<T>;

fn clock_slot(state: &SharedState) -> &RwLock<SimulationClock> {
    &state.clock
}

fn environment_slot(state: &SharedState) -> &RwLock<EnvironmentState> {
    &state.environment
}

fn prey_slot(state: &SharedState) -> &RwLock<PopulationState> {
    &state.prey
}

fn vegetation_slot(state: &SharedState) -> &RwLock<ResourceState> {
    &state.vegetation
}

fn predator_slot(state: &SharedState) -> &RwLock<PopulationState> {
    &state.predator
}

/// Exclusive write access to one field. Not `Clone`, so a field has exactly
/// one writer for the lifetime of the store.
pub struct FieldWriter<T> {
    state: Arc<SharedState>,
    field: &'static str,
    slot: Slot<T>,
}

impl<T: Copy> FieldWriter<T> {
    fn new(state: &Arc<SharedState>, field: &'static str, slot: Slot<T>) -> Self {
        Self {
            state: Arc::clone(state),
            field,
            slot,
        }
    }

    pub fn field(&self) -> &'static str {
        self.field
    }

    pub fn get(&self) -> T {
        read((self.slot)(&self.state))
    }

    pub fn publish(&self, value: T) {
        *(self.slot)(&self.state)
            .write()
            .unwrap_or_else(PoisonError::into_inner) = value;
    }
}

impl<T> std::fmt::Debug for FieldWriter<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldWriter")
            .field("field", &self.field)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> StateSnapshot {
        StateSnapshot::initial(
            &SimulationConfig::reference(),
            EnvironmentState {
                temperature: 41.0,
                precipitation: 11.0,
            },
        )
    }

    #[test]
    fn clock_wraps_into_next_year() {
        let mut clock = SimulationClock::new(10, 2023, 2029);
        clock.advance();
        assert_eq!((clock.month, clock.year), (11, 2023));
        clock.advance();
        assert_eq!((clock.month, clock.year), (0, 2024));
    }

    #[test]
    fn clock_stops_at_horizon() {
        let mut clock = SimulationClock::new(11, 2028, 2029);
        assert!(clock.is_running());
        clock.advance();
        assert!(!clock.is_running());
    }

    #[test]
    fn initial_snapshot_uses_config_values() {
        let snapshot = sample();
        assert_eq!(snapshot.clock, SimulationClock::new(0, 2023, 2029));
        assert_eq!(snapshot.prey.count, 10);
        assert_eq!(snapshot.predator.count, 1);
        assert_eq!(snapshot.vegetation.height, 5.0);
    }

    #[test]
    fn writers_publish_only_their_field() {
        let (state, writers) = SharedState::new(sample());

        writers.prey.publish(PopulationState { count: 4 });
        writers.vegetation.publish(ResourceState { height: 8.5 });

        let snapshot = state.snapshot();
        assert_eq!(snapshot.prey.count, 4);
        assert_eq!(snapshot.vegetation.height, 8.5);
        assert_eq!(snapshot.predator.count, 1);
        assert_eq!(snapshot.environment, sample().environment);
        assert_eq!(writers.prey.field(), "prey");
        assert_eq!(writers.predator.get().count, 1);
    }

    #[test]
    fn phase_ledger_counts() {
        let (state, _writers) = SharedState::new(sample());
        state.phases().record_computed();
        state.phases().record_computed();
        state.phases().record_published();
        assert_eq!(
            state.phases().counts(),
            PhaseCounts {
                computed: 2,
                published: 1
            }
        );
    }
}
