//! Reusable rendezvous for the fixed set of agents.
//!
//! Each month every agent passes the same barrier three times. A pass only
//! completes once all parties have arrived for that generation. Without a
//! timeout a missing participant blocks the others forever; with one, the
//! first waiter to give up breaks the barrier and every sibling is released
//! with [`BarrierError::Broken`].

use std::fmt;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{trace, warn};

/// The three rendezvous points of a month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BarrierPoint {
    DoneComputing,
    DoneAssigning,
    DoneReporting,
}

impl BarrierPoint {
    pub const CYCLE: [BarrierPoint; 3] = [
        BarrierPoint::DoneComputing,
        BarrierPoint::DoneAssigning,
        BarrierPoint::DoneReporting,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            BarrierPoint::DoneComputing => "done-computing",
            BarrierPoint::DoneAssigning => "done-assigning",
            BarrierPoint::DoneReporting => "done-reporting",
        }
    }
}

impl fmt::Display for BarrierPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BarrierError {
    #[error(
        "timed out after {waited:?} at {point} barrier \
         (generation {generation}, {arrived}/{parties} arrived)"
    )]
    Timeout {
        point: BarrierPoint,
        generation: u64,
        arrived: usize,
        parties: usize,
        waited: Duration,
    },
    #[error("participant arrived at {found} while generation {generation} is at {expected}")]
    PhaseMismatch {
        expected: BarrierPoint,
        found: BarrierPoint,
        generation: u64,
    },
    #[error("{point} barrier was broken by another participant")]
    Broken { point: BarrierPoint },
}

impl BarrierError {
    /// True for errors raised as a consequence of some other participant failing.
    pub fn is_secondary(&self) -> bool {
        matches!(self, BarrierError::Broken { .. })
    }
}

/// Outcome of a completed pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BarrierWaitResult {
    pub generation: u64,
    /// Exactly one participant per generation, the last to arrive, is the leader.
    pub is_leader: bool,
}

#[derive(Debug)]
struct BarrierState {
    arrived: usize,
    generation: u64,
    point: Option<BarrierPoint>,
    broken: bool,
}

#[derive(Debug)]
pub struct SteppingBarrier {
    parties: usize,
    timeout: Option<Duration>,
    state: Mutex<BarrierState>,
    released: Condvar,
}

impl SteppingBarrier {
    /// Barrier that waits indefinitely for `parties` arrivals.
    pub fn new(parties: usize) -> Self {
        Self::with_timeout(parties, None)
    }

    pub fn with_timeout(parties: usize, timeout: Option<Duration>) -> Self {
        assert!(parties > 0, "a barrier needs at least one participant");
        Self {
            parties,
            timeout,
            state: Mutex::new(BarrierState {
                arrived: 0,
                generation: 0,
                point: None,
                broken: false,
            }),
            released: Condvar::new(),
        }
    }

    /// Number of completed passes so far.
    pub fn generation(&self) -> u64 {
        self.lock().generation
    }

    pub fn is_broken(&self) -> bool {
        self.lock().broken
    }

    /// Blocks until every party has arrived at `point` for the current generation.
    pub fn wait(&self, point: BarrierPoint) -> Result<BarrierWaitResult, BarrierError> {
        let mut state = self.lock();
        if state.broken {
            return Err(BarrierError::Broken { point });
        }

        let generation = state.generation;
        match state.point {
            Some(expected) if expected != point => {
                self.break_locked(&mut state);
                return Err(BarrierError::PhaseMismatch {
                    expected,
                    found: point,
                    generation,
                });
            }
            _ => state.point = Some(point),
        }

        state.arrived += 1;
        trace!(%point, generation, arrived = state.arrived, "barrier arrival");
        if state.arrived == self.parties {
            state.arrived = 0;
            state.point = None;
            state.generation = state.generation.wrapping_add(1);
            self.released.notify_all();
            trace!(%point, generation, "barrier released");
            return Ok(BarrierWaitResult {
                generation,
                is_leader: true,
            });
        }

        let started = Instant::now();
        while state.generation == generation && !state.broken {
            match self.timeout {
                None => {
                    state = self
                        .released
                        .wait(state)
                        .unwrap_or_else(PoisonError::into_inner);
                }
                Some(timeout) => {
                    let waited = started.elapsed();
                    if waited >= timeout {
                        let arrived = state.arrived;
                        self.break_locked(&mut state);
                        warn!(%point, generation, arrived, parties = self.parties, "barrier timed out");
                        return Err(BarrierError::Timeout {
                            point,
                            generation,
                            arrived,
                            parties: self.parties,
                            waited,
                        });
                    }
                    let (guard, _) = self
                        .released
                        .wait_timeout(state, timeout - waited)
                        .unwrap_or_else(PoisonError::into_inner);
                    state = guard;
                }
            }
        }

        if state.generation != generation {
            Ok(BarrierWaitResult {
                generation,
                is_leader: false,
            })
        } else {
            Err(BarrierError::Broken { point })
        }
    }

    /// Marks the barrier broken and wakes every waiter. Used by a participant
    /// that is leaving the protocol early.
    pub fn abandon(&self) {
        let mut state = self.lock();
        if !state.broken {
            warn!(generation = state.generation, "barrier abandoned by a participant");
        }
        self.break_locked(&mut state);
    }

    fn break_locked(&self, state: &mut BarrierState) {
        state.broken = true;
        self.released.notify_all();
    }

    fn lock(&self) -> MutexGuard<'_, BarrierState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
