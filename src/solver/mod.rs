//! Constraint Solver Module
//!
//! Finds a placement of partition replicas onto disks with an incremental set-domain
//! constraint model, a seed/repair pass over the previous placement, depth-first search, and an
//! outer loop that relaxes the problem until a full placement is found.
//!
//! ## Core Concepts
//! - **Set-domain variable**: every unit from Zone down to Disk has a `committed ⊆ value ⊆
//!   possible` pair of partition sets plus a capacity. Search narrows the bounds until they meet.
//! - **Trail**: every bound change is recorded, so backtracking to a choice point is an undo of
//!   the trail suffix rather than a copy of the state.
//! - **Worklist propagation**: bound changes queue events; the engine drains the queue through
//!   the hierarchy and overlap propagators until nothing changes or a contradiction shows up.
//! - **Disjoint level**: below it, siblings never share a partition. Starting at Rack, the driver
//!   moves it towards Disk when attempts keep failing, then raises the overlap tolerance.
//! - **Objective**: total cardinality of the variables at the disjoint level. The driver raises
//!   the target past every solved objective until the zone is full.
//!
//! ## Submodules
//! - **`bitset`**, **`domain`**: partition sets and the trailed domain store.
//! - **`hierarchy`**, **`overlap`**: the two propagators.
//! - **`engine`**: model construction, fixed-point loop and objective bound.
//! - **`seed`**: repair and swap pass over the prior placement.
//! - **`search`**: variable/value ordering and the depth-first attempt.
//! - **`driver`**: escalation loop and snapshot hand-off.
//! - **`diagnostics`**: structured event stream.

pub mod bitset;
pub mod diagnostics;
pub mod domain;
pub mod driver;
pub mod engine;
pub mod error;
pub mod hierarchy;
pub mod overlap;
pub mod search;
pub mod seed;
pub mod types;

pub use diagnostics::{DiagnosticEvent, DiagnosticsSink, RecordingSink, TracingSink};
pub use driver::{Allocator, AttemptRecord, Escalation, EscalationState, RunStatus, RunSummary};
pub use engine::{ModelParams, PropagationEngine};
pub use error::{Contradiction, ContradictionReason};
pub use search::{Attempt, VariableOrder};
pub use seed::{SeedPlan, SeedRepair};
pub use types::{AttemptOutcome, AttemptParams, CancelFlag, FailureCause, Solution, VarId};
