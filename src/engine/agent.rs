//! The per-thread loops. Every agent runs the same three-barrier month:
//! compute, publish, and (coordinator only) report and advance.

use std::sync::Arc;

use tracing::{debug, trace};

use crate::{
    barrier::{BarrierPoint, SteppingBarrier},
    engine::SimulationError,
    report::{MonthReport, ReportSink},
    rng::AgentRng,
    systems::{AgentRole, ClimateModel, UpdateRule},
    world::{EnvironmentState, FieldWriter, SharedState, SimulationClock},
};

pub(crate) struct AgentContext {
    pub role: AgentRole,
    pub state: Arc<SharedState>,
    pub barrier: Arc<SteppingBarrier>,
    pub rng: AgentRng,
}

impl AgentContext {
    fn rendezvous(&self, point: BarrierPoint) -> Result<(), SimulationError> {
        self.barrier
            .wait(point)
            .map(|_| ())
            .map_err(|source| SimulationError::Barrier {
                role: self.role,
                source,
            })
    }

    fn participate(&self) -> Participation {
        Participation {
            barrier: Arc::clone(&self.barrier),
            finished: false,
        }
    }
}

/// Breaks the barrier if the agent leaves the loop early, by error or panic,
/// so siblings are released instead of waiting on a participant that is gone.
struct Participation {
    barrier: Arc<SteppingBarrier>,
    finished: bool,
}

impl Participation {
    fn finish(mut self) {
        self.finished = true;
    }
}

impl Drop for Participation {
    fn drop(&mut self) {
        if !self.finished {
            self.barrier.abandon();
        }
    }
}

/// Loop for an agent that owns one field. Returns the number of months stepped.
pub(crate) fn run_owner<U: UpdateRule>(
    rule: U,
    writer: FieldWriter<U::Value>,
    mut ctx: AgentContext,
) -> Result<u64, SimulationError> {
    let participation = ctx.participate();
    let mut months = 0_u64;

    while ctx.state.clock().is_running() {
        let snapshot = ctx.state.snapshot();
        let next = rule.propose(&snapshot, &mut *ctx.rng);
        ctx.state.phases().record_computed();
        ctx.rendezvous(BarrierPoint::DoneComputing)?;

        writer.publish(next);
        ctx.state.phases().record_published();
        trace!(role = %ctx.role, value = ?next, "published");
        ctx.rendezvous(BarrierPoint::DoneAssigning)?;

        ctx.rendezvous(BarrierPoint::DoneReporting)?;
        months += 1;
    }

    participation.finish();
    Ok(months)
}

/// Loop for the coordinator. It proposes nothing in the first two phases;
/// after every publish it reports the month, advances the clock and
/// recomputes the climate for the new month.
pub(crate) fn run_coordinator(
    climate: ClimateModel,
    clock: FieldWriter<SimulationClock>,
    environment: FieldWriter<EnvironmentState>,
    mut sink: Box<dyn ReportSink>,
    mut ctx: AgentContext,
) -> Result<u64, SimulationError> {
    let participation = ctx.participate();
    let mut months = 0_u64;

    while clock.get().is_running() {
        ctx.state.phases().record_computed();
        ctx.rendezvous(BarrierPoint::DoneComputing)?;

        ctx.state.phases().record_published();
        ctx.rendezvous(BarrierPoint::DoneAssigning)?;

        let snapshot = ctx.state.snapshot();
        let report = MonthReport::from_snapshot(&snapshot);
        sink.emit(&report, ctx.state.phases().counts())?;
        debug!(
            month = report.month,
            year = report.year,
            prey = report.prey,
            predator = report.predator,
            height = report.vegetation_height,
            "month reported"
        );
        months += 1;

        let mut next = snapshot.clock;
        next.advance();
        clock.publish(next);
        environment.publish(climate.environment_for(next.month, &mut *ctx.rng));

        ctx.rendezvous(BarrierPoint::DoneReporting)?;
    }

    sink.finish()?;
    participation.finish();
    Ok(months)
}
