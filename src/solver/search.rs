use super::diagnostics::{DiagnosticEvent, DiagnosticsSink};
use super::engine::{ModelParams, PropagationEngine};
use super::error::{Contradiction, ContradictionReason};
use super::seed::{self, SeedPlan, SeedRepair};
use super::types::{
    AttemptOutcome, AttemptParams, AttemptPhase, AttemptReport, CancelFlag, FailureCause, SearchStats, Solution,
};
use crate::allocation::Allocation;
use crate::config::AllocatorConfig;
use crate::topology::Zone;

/// Saved cursor positions of a [`VariableOrder`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderCheckpoint {
    frozen: usize,
    declared: usize,
}

/// Frozen disks first, in their recorded order, then every disk in declaration order.
/// Instantiated disks are skipped.
///
/// Instantiation only grows while descending, so both cursors only move forward between
/// checkpoints; backtracking restores the checkpoint taken before the undone decision.
#[derive(Debug, Clone)]
pub struct VariableOrder {
    frozen: Vec<usize>,
    disk_count: usize,
    cursor: OrderCheckpoint,
}

impl VariableOrder {
    pub fn new(frozen: Vec<usize>, disk_count: usize) -> Self {
        Self {
            frozen: frozen.into_iter().filter(|&d| d < disk_count).collect(),
            disk_count,
            cursor: OrderCheckpoint { frozen: 0, declared: 0 },
        }
    }

    pub fn checkpoint(&self) -> OrderCheckpoint {
        self.cursor
    }

    pub fn restore(&mut self, checkpoint: OrderCheckpoint) {
        self.cursor = checkpoint;
    }

    /// Next undecided disk and the smallest value it may still take.
    pub fn next(&mut self, engine: &PropagationEngine) -> Option<(usize, usize)> {
        while let Some(&disk) = self.frozen.get(self.cursor.frozen) {
            if let Some(value) = engine.next_value(disk) {
                return Some((disk, value));
            }
            self.cursor.frozen += 1;
        }
        while self.cursor.declared < self.disk_count {
            let disk = self.cursor.declared;
            if let Some(value) = engine.next_value(disk) {
                return Some((disk, value));
            }
            self.cursor.declared += 1;
        }
        None
    }
}

/// How one search below a seed ended.
enum BranchEnd {
    Solved(Solution),
    Exhausted(Contradiction),
    LimitReached(Contradiction),
    Cancelled,
}

#[derive(Debug, Clone, Copy)]
struct Decision {
    disk: usize,
    value: usize,
    checkpoint: OrderCheckpoint,
}

/// One depth-first search run against fixed escalation parameters.
pub struct Attempt<'z> {
    zone: &'z Zone,
    config: &'z AllocatorConfig,
    universe: usize,
    params: AttemptParams,
}

impl<'z> Attempt<'z> {
    pub fn new(zone: &'z Zone, config: &'z AllocatorConfig, universe: usize, params: AttemptParams) -> Self {
        Self {
            zone,
            config,
            universe,
            params,
        }
    }

    pub fn run(&self, prior: Option<&Allocation>, cancel: &CancelFlag, sink: &mut dyn DiagnosticsSink) -> AttemptReport {
        let mut frozen = self.params.frozen.clone();
        sink.emit(DiagnosticEvent::AttemptStarted {
            iteration: self.params.iteration,
            target: self.params.target,
            disjoint_level: self.params.disjoint_level,
            overlap_tolerance: self.params.overlap_tolerance,
            frozen: frozen.len(),
        });

        self.enter(AttemptPhase::Initializing);
        let mut engine = PropagationEngine::new(
            self.zone,
            ModelParams {
                universe: self.universe,
                replication_factor: self.config.replication_factor,
                disjoint_level: self.params.disjoint_level,
                overlap_tolerance: self.params.overlap_tolerance,
                target: 0,
            },
        );
        let mut stats = SearchStats::default();

        if let Err(contradiction) = engine.initialize() {
            sink.emit(DiagnosticEvent::Contradiction {
                depth: 0,
                reason: contradiction.reason,
            });
            return self.failed(FailureCause::Root, Some(contradiction), frozen, stats, &engine, sink);
        }

        let stages = match prior.filter(|p| !p.is_empty()) {
            Some(prior) => self.seed_stages(prior, &mut frozen, sink),
            None => vec![None],
        };
        let order = VariableOrder::new(frozen.clone(), engine.disk_count());

        let mut searched = false;
        let mut last = None;
        for (stage, plan) in stages.iter().enumerate() {
            // Each stage lives in its own level so the next one starts from the bare model.
            engine.push_level();
            if let Some(plan) = plan {
                self.apply_seed(&mut engine, plan, sink);
            }

            // The target only binds once the prior is in place; dropped prior assignments must
            // not be blamed on the objective.
            self.enter(AttemptPhase::Propagating);
            engine.set_target(self.params.target);
            let end = match engine.propagate() {
                Ok(()) => {
                    searched = true;
                    self.branch(&mut engine, order.clone(), &mut stats, cancel, sink)
                }
                Err(contradiction) => {
                    sink.emit(DiagnosticEvent::Contradiction {
                        depth: 0,
                        reason: contradiction.reason,
                    });
                    BranchEnd::Exhausted(contradiction)
                }
            };

            match end {
                BranchEnd::Solved(solution) => {
                    stats.propagations = engine.propagations();
                    sink.emit(DiagnosticEvent::AttemptSolved {
                        iteration: self.params.iteration,
                        objective: solution.objective,
                        stats,
                    });
                    return AttemptReport {
                        outcome: AttemptOutcome::Solved(solution),
                        frozen,
                        stats,
                        phase: AttemptPhase::Solved,
                    };
                }
                BranchEnd::Cancelled => {
                    tracing::warn!("Attempt {} cancelled", self.params.iteration);
                    stats.propagations = engine.propagations();
                    return AttemptReport {
                        outcome: AttemptOutcome::Cancelled,
                        frozen,
                        stats,
                        phase: AttemptPhase::Branching,
                    };
                }
                BranchEnd::LimitReached(contradiction) => {
                    return self.failed(FailureCause::LimitReached, Some(contradiction), frozen, stats, &engine, sink);
                }
                BranchEnd::Exhausted(contradiction) => {
                    last = Some(contradiction);
                    engine.pop_level();
                    engine.set_target(0);
                    if stage + 1 < stages.len() {
                        tracing::debug!(
                            "Attempt {}: seed stage {} cannot reach target {}; loosening the seed",
                            self.params.iteration,
                            stage,
                            self.params.target
                        );
                    }
                }
            }
        }

        let cause = if searched { FailureCause::Exhausted } else { FailureCause::Root };
        self.failed(cause, last, frozen, stats, &engine, sink)
    }

    /// Seeds to try in turn: the whole repaired prior, then only its unsatisfied disks, then
    /// nothing at all.
    fn seed_stages(&self, prior: &Allocation, frozen: &mut Vec<usize>, sink: &mut dyn DiagnosticsSink) -> Vec<Option<SeedPlan>> {
        let plan = SeedRepair::new(
            self.zone,
            self.config.replication_factor,
            self.params.disjoint_level,
            self.params.overlap_tolerance,
            self.config.seed_repair_cutoff,
        )
        .plan(prior);

        if plan.repaired() {
            sink.emit(DiagnosticEvent::SeedRepaired {
                conflicts: plan.conflicts.len(),
                trimmed: plan.trimmed.len(),
            });
        } else {
            sink.emit(DiagnosticEvent::SeedSwapped {
                swaps: plan.swaps.len(),
                unsatisfied_disks: plan.unsatisfied_disks.len(),
                unsatisfied_replicas: plan.unsatisfied_replicas,
                gave_up: plan.gave_up,
            });
            for &disk in &plan.unsatisfied_disks {
                if !frozen.contains(&disk) {
                    frozen.push(disk);
                }
            }
        }

        let narrowed = plan.frozen_only();
        let mut stages = vec![Some(plan)];
        if let Some(narrowed) = narrowed {
            stages.push(Some(narrowed));
        }
        stages.push(None);
        stages
    }

    fn apply_seed(&self, engine: &mut PropagationEngine, plan: &SeedPlan, sink: &mut dyn DiagnosticsSink) {
        for dropped in seed::apply(engine, plan) {
            sink.emit(DiagnosticEvent::SeedDropped {
                disk: self.zone.disk(dropped.disk).name.clone(),
                partition: dropped.partition,
                reason: dropped.contradiction.reason,
            });
        }
    }

    /// Depth-first search below the current level. Every decision it opens is closed again
    /// unless the search ends with a solution.
    fn branch(
        &self,
        engine: &mut PropagationEngine,
        mut order: VariableOrder,
        stats: &mut SearchStats,
        cancel: &CancelFlag,
        sink: &mut dyn DiagnosticsSink,
    ) -> BranchEnd {
        self.enter(AttemptPhase::Branching);
        let mut stack: Vec<Decision> = Vec::new();
        let mut pending: Option<Contradiction> = None;

        loop {
            if let Some(contradiction) = pending.take() {
                stats.failures += 1;
                sink.emit(DiagnosticEvent::Contradiction {
                    depth: stack.len(),
                    reason: contradiction.reason,
                });

                if stats.failures >= self.config.fail_limit {
                    return BranchEnd::LimitReached(contradiction);
                }
                let Some(decision) = stack.pop() else {
                    return BranchEnd::Exhausted(contradiction);
                };
                engine.pop_level();
                order.restore(decision.checkpoint);
                if let Err(contradiction) = engine.remove_from_disk(decision.disk, decision.value) {
                    pending = Some(contradiction);
                }
                continue;
            }

            if cancel.is_cancelled() {
                tracing::debug!("Attempt {} stopping at depth {}", self.params.iteration, stack.len());
                return BranchEnd::Cancelled;
            }

            let checkpoint = order.checkpoint();
            let Some((disk, value)) = order.next(engine) else {
                let objective = engine.objective();
                if objective < self.params.target {
                    pending = Some(Contradiction::global(ContradictionReason::ObjectiveUnreachable {
                        bound: objective,
                        target: self.params.target,
                    }));
                    continue;
                }
                return BranchEnd::Solved(Solution {
                    objective,
                    disk_sets: engine.disk_sets(),
                });
            };

            stats.decisions += 1;
            engine.push_level();
            stack.push(Decision {
                disk,
                value,
                checkpoint,
            });
            stats.max_depth = stats.max_depth.max(stack.len());
            if let Err(contradiction) = engine.force_disk(disk, value) {
                pending = Some(contradiction);
            }
        }
    }

    fn enter(&self, phase: AttemptPhase) {
        tracing::debug!("Attempt {} entering {:?}", self.params.iteration, phase);
    }

    fn failed(
        &self,
        cause: FailureCause,
        last_contradiction: Option<Contradiction>,
        frozen: Vec<usize>,
        mut stats: SearchStats,
        engine: &PropagationEngine,
        sink: &mut dyn DiagnosticsSink,
    ) -> AttemptReport {
        stats.propagations = engine.propagations();
        sink.emit(DiagnosticEvent::AttemptFailed {
            iteration: self.params.iteration,
            cause,
            stats,
        });
        AttemptReport {
            outcome: AttemptOutcome::Failed {
                cause,
                last_contradiction,
            },
            frozen,
            stats,
            phase: AttemptPhase::Failed,
        }
    }
}
