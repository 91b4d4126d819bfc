use super::error::ContradictionReason;
use super::types::{FailureCause, SearchStats};
use crate::topology::Level;
use serde::Serialize;

/// Structured events the solver emits for an external observer.
///
/// Nothing in the solver reads them back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DiagnosticEvent {
    AttemptStarted {
        iteration: usize,
        target: usize,
        disjoint_level: Level,
        overlap_tolerance: usize,
        frozen: usize,
    },
    SeedRepaired {
        conflicts: usize,
        trimmed: usize,
    },
    SeedSwapped {
        swaps: usize,
        unsatisfied_disks: usize,
        unsatisfied_replicas: usize,
        gave_up: bool,
    },
    SeedDropped {
        disk: String,
        partition: usize,
        reason: ContradictionReason,
    },
    Contradiction {
        depth: usize,
        reason: ContradictionReason,
    },
    AttemptSolved {
        iteration: usize,
        objective: usize,
        stats: SearchStats,
    },
    AttemptFailed {
        iteration: usize,
        cause: FailureCause,
        stats: SearchStats,
    },
    Escalated {
        disjoint_level: Level,
        overlap_tolerance: usize,
        target: usize,
    },
    SnapshotWritten {
        objective: usize,
        unsatisfied_disks: usize,
        unsatisfied_partitions: usize,
        moved_replicas: usize,
    },
}

pub trait DiagnosticsSink {
    fn emit(&mut self, event: DiagnosticEvent);
}

/// Forwards events to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl DiagnosticsSink for TracingSink {
    fn emit(&mut self, event: DiagnosticEvent) {
        match &event {
            DiagnosticEvent::AttemptStarted {
                iteration,
                target,
                disjoint_level,
                overlap_tolerance,
                frozen,
            } => tracing::info!(
                "Attempt {}: target {}, disjoint level {}, overlap {}, {} frozen disks",
                iteration,
                target,
                disjoint_level,
                overlap_tolerance,
                frozen
            ),
            DiagnosticEvent::SeedRepaired { conflicts, trimmed } => {
                tracing::info!("Seed repaired {} conflicts, trimmed {} replicas", conflicts, trimmed)
            }
            DiagnosticEvent::SeedSwapped {
                swaps,
                unsatisfied_disks,
                unsatisfied_replicas,
                gave_up,
            } => tracing::info!(
                "Seed applied {} swaps; {} unsatisfied disks, {} unsatisfied replicas{}",
                swaps,
                unsatisfied_disks,
                unsatisfied_replicas,
                if *gave_up { " (gave up)" } else { "" }
            ),
            DiagnosticEvent::SeedDropped { disk, partition, reason } => {
                tracing::warn!("Dropped prior partition {} on {}: {}", partition, disk, reason)
            }
            DiagnosticEvent::Contradiction { depth, reason } => {
                tracing::trace!("Contradiction at depth {}: {}", depth, reason)
            }
            DiagnosticEvent::AttemptSolved {
                iteration,
                objective,
                stats,
            } => tracing::info!(
                "Attempt {} solved with objective {} ({} decisions, {} failures)",
                iteration,
                objective,
                stats.decisions,
                stats.failures
            ),
            DiagnosticEvent::AttemptFailed { iteration, cause, stats } => tracing::info!(
                "Attempt {} failed: {:?} ({} decisions, {} failures)",
                iteration,
                cause,
                stats.decisions,
                stats.failures
            ),
            DiagnosticEvent::Escalated {
                disjoint_level,
                overlap_tolerance,
                target,
            } => tracing::info!(
                "Escalating to disjoint level {}, overlap {}, target {}",
                disjoint_level,
                overlap_tolerance,
                target
            ),
            DiagnosticEvent::SnapshotWritten {
                objective,
                unsatisfied_disks,
                unsatisfied_partitions,
                moved_replicas,
            } => tracing::info!(
                "Snapshot at objective {}: {} unsatisfied disks, {} unsatisfied partitions, {} moved replicas",
                objective,
                unsatisfied_disks,
                unsatisfied_partitions,
                moved_replicas
            ),
        }
    }
}

/// Keeps every event in memory.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    pub events: Vec<DiagnosticEvent>,
}

impl RecordingSink {
    pub fn to_json_lines(&self) -> serde_json::Result<String> {
        let lines = self
            .events
            .iter()
            .map(serde_json::to_string)
            .collect::<serde_json::Result<Vec<_>>>()?;
        Ok(lines.join("\n"))
    }
}

impl DiagnosticsSink for RecordingSink {
    fn emit(&mut self, event: DiagnosticEvent) {
        self.events.push(event);
    }
}
