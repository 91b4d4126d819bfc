use super::diagnostics::{DiagnosticEvent, DiagnosticsSink};
use super::search::Attempt;
use super::types::{AttemptOutcome, AttemptParams, CancelFlag, SearchStats};
use crate::allocation::{Allocation, AllocationDiff, AllocationStats};
use crate::config::{AllocatorConfig, ConfigError};
use crate::topology::{Level, Zone};
use serde::Serialize;

/// Parameters carried from one attempt to the next.
///
/// `target`, `disjoint_level` and `overlap_tolerance` only relax over a run, except that a
/// disjoint-level step restarts the target at 0 and a tolerance step lowers it by one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EscalationState {
    pub target: usize,
    pub disjoint_level: Level,
    pub overlap_tolerance: usize,
    pub frozen: Vec<usize>,
    pub retry_available: bool,
}

/// What a failed attempt led to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Escalation {
    /// Run again unchanged.
    Retry,
    DisjointLevel(Level),
    OverlapTolerance(usize),
}

impl EscalationState {
    pub fn initial(config: &AllocatorConfig) -> Self {
        Self {
            target: config.initial_target,
            disjoint_level: config.initial_disjoint_level,
            overlap_tolerance: config.initial_overlap_tolerance,
            frozen: Vec::new(),
            retry_available: true,
        }
    }

    pub fn params(&self, iteration: usize) -> AttemptParams {
        AttemptParams {
            iteration,
            target: self.target,
            disjoint_level: self.disjoint_level,
            overlap_tolerance: self.overlap_tolerance,
            frozen: self.frozen.clone(),
        }
    }

    /// Raises the target past `objective`. Returns `true` once the whole zone is placed.
    pub fn record_solved(&mut self, objective: usize, capacity: usize) -> bool {
        self.retry_available = true;
        self.target = (objective + 1).min(capacity);
        objective >= capacity
    }

    pub fn record_failed(&mut self) -> Escalation {
        if self.retry_available {
            self.retry_available = false;
            return Escalation::Retry;
        }

        self.retry_available = true;
        match self.disjoint_level.child().filter(|&next| next <= Level::Disk) {
            Some(next) => {
                self.disjoint_level = next;
                self.frozen.clear();
                self.target = 0;
                Escalation::DisjointLevel(next)
            }
            None => {
                self.overlap_tolerance += 1;
                self.target = self.target.saturating_sub(1);
                Escalation::OverlapTolerance(self.overlap_tolerance)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Every location of the zone holds a partition.
    Complete,
    /// The overlap tolerance would exceed its maximum.
    GaveUp,
    Cancelled,
    IterationLimit,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttemptRecord {
    pub iteration: usize,
    pub target: usize,
    pub disjoint_level: Level,
    pub overlap_tolerance: usize,
    pub outcome: &'static str,
    pub objective: Option<usize>,
    pub stats: SearchStats,
}

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub status: RunStatus,
    pub iterations: usize,
    /// Snapshot of the last solved attempt, if any.
    pub best: Option<Allocation>,
    pub best_objective: Option<usize>,
    pub final_state: EscalationState,
    pub attempts: Vec<AttemptRecord>,
}

/// Runs attempts until the zone is fully placed or the escalation bounds are exhausted.
pub struct Allocator<'z> {
    zone: &'z Zone,
    config: AllocatorConfig,
    initial: Allocation,
}

impl<'z> Allocator<'z> {
    pub fn new(zone: &'z Zone, config: AllocatorConfig, initial: Allocation) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            zone,
            config,
            initial,
        })
    }

    /// `on_snapshot` receives every solved snapshot with its movement against the previous
    /// one. An error from it aborts the run.
    pub fn run<F>(&self, cancel: &CancelFlag, sink: &mut dyn DiagnosticsSink, mut on_snapshot: F) -> anyhow::Result<RunSummary>
    where
        F: FnMut(&Allocation, &AllocationDiff) -> anyhow::Result<()>,
    {
        let universe = self.initial.universe();
        let capacity = self.zone.capacity();
        let mut state = EscalationState::initial(&self.config);
        let mut latest = self.initial.clone();
        let mut best: Option<(Allocation, usize)> = None;
        let mut attempts = Vec::new();
        let mut status = RunStatus::IterationLimit;
        let mut iterations = 0;

        tracing::info!(
            "Allocating {} partitions x{} over {} locations in zone {}",
            universe.count(),
            self.config.replication_factor,
            capacity,
            self.zone.name()
        );

        for iteration in 1..=self.config.max_iterations {
            if cancel.is_cancelled() {
                status = RunStatus::Cancelled;
                break;
            }
            iterations = iteration;

            let params = state.params(iteration);
            let report = Attempt::new(self.zone, &self.config, universe.count(), params.clone())
                .run(Some(&latest), cancel, sink);
            state.frozen = report.frozen;

            let objective = match &report.outcome {
                AttemptOutcome::Solved(solution) => Some(solution.objective),
                _ => None,
            };
            attempts.push(AttemptRecord {
                iteration,
                target: params.target,
                disjoint_level: params.disjoint_level,
                overlap_tolerance: params.overlap_tolerance,
                outcome: report.outcome.label(),
                objective,
                stats: report.stats,
            });

            match report.outcome {
                AttemptOutcome::Solved(solution) => {
                    let allocation = Allocation::from_disk_sets(self.zone, universe, &solution.disk_sets, Some(&latest));
                    let diff = AllocationDiff::between(self.zone, &latest, &allocation);
                    let stats = AllocationStats::compute(self.zone, &allocation, self.config.replication_factor);
                    diff.log();
                    stats.log();

                    on_snapshot(&allocation, &diff)?;
                    sink.emit(DiagnosticEvent::SnapshotWritten {
                        objective: solution.objective,
                        unsatisfied_disks: stats.unsatisfied_disks.len(),
                        unsatisfied_partitions: stats.unsatisfied_partitions.len(),
                        moved_replicas: diff.moved_replicas(),
                    });

                    latest = allocation.clone();
                    best = Some((allocation, solution.objective));
                    if state.record_solved(solution.objective, capacity) {
                        status = RunStatus::Complete;
                        break;
                    }
                }
                AttemptOutcome::Failed { .. } => {
                    match state.record_failed() {
                        Escalation::Retry => {
                            tracing::info!("Attempt {} failed; retrying once unchanged", iteration);
                            continue;
                        }
                        Escalation::DisjointLevel(_) | Escalation::OverlapTolerance(_) => {
                            sink.emit(DiagnosticEvent::Escalated {
                                disjoint_level: state.disjoint_level,
                                overlap_tolerance: state.overlap_tolerance,
                                target: state.target,
                            });
                        }
                    }
                    if state.overlap_tolerance > self.config.max_overlap_tolerance {
                        tracing::warn!(
                            "Overlap tolerance {} exceeds {}; no full allocation found",
                            state.overlap_tolerance,
                            self.config.max_overlap_tolerance
                        );
                        status = RunStatus::GaveUp;
                        break;
                    }
                }
                AttemptOutcome::Cancelled => {
                    status = RunStatus::Cancelled;
                    break;
                }
            }
        }

        tracing::info!("Allocation finished: {:?} after {} iterations", status, iterations);
        let (best, best_objective) = match best {
            Some((allocation, objective)) => (Some(allocation), Some(objective)),
            None => (None, None),
        };
        Ok(RunSummary {
            status,
            iterations,
            best,
            best_objective,
            final_state: state,
            attempts,
        })
    }
}
