mod agent;

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use thiserror::Error;
use tracing::{error, info};

use crate::{
    barrier::{BarrierError, SteppingBarrier},
    config::{ConfigError, SimulationConfig},
    report::{HookSink, MonthReport, ReportError, ReportLog, ReportSink},
    rng::{AgentRng, RngManager},
    systems::{AgentRole, ClimateModel, PredatorRule, PreyRule, UpdateRule, VegetationRule},
    world::{FieldWriter, PhaseCounts, SharedState, StateSnapshot, Writers},
};

use agent::{run_coordinator, run_owner, AgentContext};

#[derive(Debug, Error)]
pub enum SimulationError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("{role} agent: {source}")]
    Barrier {
        role: AgentRole,
        #[source]
        source: BarrierError,
    },
    #[error("{role} agent panicked")]
    AgentPanicked { role: AgentRole },
    #[error("failed to spawn {role} agent thread: {source}")]
    Spawn {
        role: AgentRole,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Report(#[from] ReportError),
}

impl SimulationError {
    /// Errors that only happened because a sibling failed first.
    fn is_secondary(&self) -> bool {
        matches!(self, SimulationError::Barrier { source, .. } if source.is_secondary())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunSummary {
    pub months_reported: u64,
    pub final_state: StateSnapshot,
    pub phases: PhaseCounts,
}

type RngFactory = Box<dyn Fn(AgentRole) -> AgentRng>;

pub struct SimulationBuilder {
    config: SimulationConfig,
    sink: Box<dyn ReportSink>,
    rng_factory: Option<RngFactory>,
}

impl SimulationBuilder {
    pub fn new(config: SimulationConfig) -> Self {
        Self {
            config,
            sink: Box::new(ReportLog::new()),
            rng_factory: None,
        }
    }

    pub fn with_sink(mut self, sink: impl ReportSink + 'static) -> Self {
        self.sink = Box::new(sink);
        self
    }

    pub fn with_hook(self, hook: impl FnMut(&MonthReport) + Send + 'static) -> Self {
        self.with_sink(HookSink::new(hook))
    }

    /// Replaces the seeded per-role streams, e.g. with a fixed-draw generator.
    pub fn with_rng_factory(mut self, factory: impl Fn(AgentRole) -> AgentRng + 'static) -> Self {
        self.rng_factory = Some(Box::new(factory));
        self
    }

    /// Validates the configuration. Nothing is spawned before this succeeds.
    pub fn build(self) -> Result<Simulation, SimulationError> {
        self.config.validate()?;
        let rng_factory: RngFactory = match self.rng_factory {
            Some(factory) => factory,
            None => {
                let manager = RngManager::new(self.config.seed);
                Box::new(move |role: AgentRole| -> AgentRng { Box::new(manager.stream(role)) })
            }
        };
        Ok(Simulation {
            config: self.config,
            sink: self.sink,
            rng_factory,
        })
    }
}

pub struct Simulation {
    config: SimulationConfig,
    sink: Box<dyn ReportSink>,
    rng_factory: RngFactory,
}

impl Simulation {
    pub fn builder(config: SimulationConfig) -> SimulationBuilder {
        SimulationBuilder::new(config)
    }

    /// Runs the four agents to the horizon year and joins them.
    pub fn run(self) -> Result<RunSummary, SimulationError> {
        let Simulation {
            config,
            sink,
            rng_factory,
        } = self;

        let climate = ClimateModel::new(config.climate.clone());
        let mut coordinator_rng = rng_factory(AgentRole::Coordinator);
        let environment = climate.environment_for(config.clock.start_month, &mut *coordinator_rng);
        let (state, writers) = SharedState::new(StateSnapshot::initial(&config, environment));
        let barrier = Arc::new(SteppingBarrier::with_timeout(
            AgentRole::ALL.len(),
            config.barrier_timeout(),
        ));

        info!(
            seed = config.seed,
            start_month = config.clock.start_month,
            start_year = config.clock.start_year,
            horizon_year = config.clock.horizon_year,
            months = config.months_to_simulate(),
            "starting simulation"
        );

        let mut launcher = Launcher {
            state: Arc::clone(&state),
            barrier: Arc::clone(&barrier),
            handles: Vec::with_capacity(AgentRole::ALL.len()),
        };
        let started = launch_all(
            &mut launcher,
            &config,
            climate,
            sink,
            writers,
            coordinator_rng,
            &rng_factory,
        );
        if started.is_err() {
            barrier.abandon();
        }

        let mut months_reported = 0;
        let mut failures = Vec::new();
        for (role, handle) in launcher.handles {
            match handle.join() {
                Ok(Ok(months)) => {
                    if role == AgentRole::Coordinator {
                        months_reported = months;
                    }
                }
                Ok(Err(err)) => failures.push(err),
                Err(_) => failures.push(SimulationError::AgentPanicked { role }),
            }
        }

        if let Err(err) = started {
            error!(error = %err, "simulation could not start all agents");
            return Err(err);
        }
        if let Some(err) = root_cause(failures) {
            error!(error = %err, "simulation failed");
            return Err(err);
        }

        let summary = RunSummary {
            months_reported,
            final_state: state.snapshot(),
            phases: state.phases().counts(),
        };
        info!(
            months = summary.months_reported,
            prey = summary.final_state.prey.count,
            predator = summary.final_state.predator.count,
            height = summary.final_state.vegetation.height,
            "simulation finished"
        );
        Ok(summary)
    }
}

type AgentHandle = JoinHandle<Result<u64, SimulationError>>;

struct Launcher {
    state: Arc<SharedState>,
    barrier: Arc<SteppingBarrier>,
    handles: Vec<(AgentRole, AgentHandle)>,
}

impl Launcher {
    fn context(&self, role: AgentRole, rng: AgentRng) -> AgentContext {
        AgentContext {
            role,
            state: Arc::clone(&self.state),
            barrier: Arc::clone(&self.barrier),
            rng,
        }
    }

    fn start<F>(&mut self, role: AgentRole, body: F) -> Result<(), SimulationError>
    where
        F: FnOnce() -> Result<u64, SimulationError> + Send + 'static,
    {
        let handle = thread::Builder::new()
            .name(role.name().to_string())
            .spawn(body)
            .map_err(|source| SimulationError::Spawn { role, source })?;
        self.handles.push((role, handle));
        Ok(())
    }
}

fn launch_all(
    launcher: &mut Launcher,
    config: &SimulationConfig,
    climate: ClimateModel,
    sink: Box<dyn ReportSink>,
    writers: Writers,
    coordinator_rng: AgentRng,
    rng_factory: &RngFactory,
) -> Result<(), SimulationError> {
    let Writers {
        clock,
        environment,
        prey,
        vegetation,
        predator,
    } = writers;

    let ctx = launcher.context(AgentRole::Coordinator, coordinator_rng);
    launcher.start(AgentRole::Coordinator, move || {
        run_coordinator(climate, clock, environment, sink, ctx)
    })?;

    launch_owner(launcher, PreyRule::new(&config.prey), prey, rng_factory)?;
    launch_owner(
        launcher,
        VegetationRule::new(&config.vegetation, &config.prey),
        vegetation,
        rng_factory,
    )?;
    launch_owner(
        launcher,
        PredatorRule::new(&config.predator),
        predator,
        rng_factory,
    )?;

    Ok(())
}

fn launch_owner<U: UpdateRule + 'static>(
    launcher: &mut Launcher,
    rule: U,
    writer: FieldWriter<U::Value>,
    rng_factory: &RngFactory,
) -> Result<(), SimulationError> {
    let role = rule.role();
    let ctx = launcher.context(role, rng_factory(role));
    launcher.start(role, move || run_owner(rule, writer, ctx))
}

/// The first failure that was not caused by another agent's failure.
fn root_cause(failures: Vec<SimulationError>) -> Option<SimulationError> {
    let mut secondary = None;
    for err in failures {
        if !err.is_secondary() {
            return Some(err);
        }
        secondary.get_or_insert(err);
    }
    secondary
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_config_fails_before_spawning() {
        let mut config = SimulationConfig::reference();
        config.clock.horizon_year = 2000;
        let err = Simulation::builder(config).build().err().unwrap();
        assert!(matches!(err, SimulationError::Config(_)));
    }

    #[test]
    fn horizon_equal_to_start_reports_nothing() {
        let mut config = SimulationConfig::reference();
        config.clock.horizon_year = config.clock.start_year;
        let log = ReportLog::new();

        let summary = Simulation::builder(config)
            .with_sink(log.clone())
            .build()
            .unwrap()
            .run()
            .unwrap();

        assert_eq!(summary.months_reported, 0);
        assert_eq!(summary.phases, PhaseCounts::default());
        assert!(log.reports().is_empty());
    }

    #[test]
    fn root_cause_prefers_primary_errors() {
        let failures = vec![
            SimulationError::Barrier {
                role: AgentRole::Prey,
                source: BarrierError::Broken {
                    point: crate::barrier::BarrierPoint::DoneAssigning,
                },
            },
            SimulationError::AgentPanicked {
                role: AgentRole::Predator,
            },
        ];
        assert!(matches!(
            root_cause(failures),
            Some(SimulationError::AgentPanicked {
                role: AgentRole::Predator
            })
        ));
        assert!(root_cause(Vec::new()).is_none());
    }
}
