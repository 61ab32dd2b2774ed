//! Pure computations over runs and workflow files.
//!
//! Nothing in this module performs I/O or holds shared state: every function
//! takes plain values and returns plain values, so results depend only on
//! their inputs.
//!
//! ## Submodules
//!
//! - [`duration`]: Parsing and formatting of duration strings (e.g., "30s", "5m")
//! - [`window`]: Calendar-day windows in one fixed UTC offset
//! - [`normalize`]: Collapsing runs into one [`DailyBucket`] per workflow per day
//! - [`workflow_file`]: Typed extraction of triggers from workflow configuration text
//! - [`graph`]: The [`TriggerGraph`] of which workflows trigger which
//! - [`health`]: Day-over-day transitions and windowed [`HealthStatus`]
//!
//! ## Data Flow
//!
//! ```text
//! Vec<Run>                      Vec<Workflow>
//!    │                               │
//!    ▼                               ▼
//! normalize()                   build_graph()
//!    │                               │
//!    ▼                               ▼
//! DailyBucket ──▶ HealthClassifier   TriggerGraph
//!                      │                 │
//!                      ▼                 │
//!                 HealthRecord ◀─────────┘ (filter by dependents)
//! ```

pub mod duration;
pub mod graph;
pub mod health;
pub mod normalize;
pub mod window;
pub mod workflow_file;

pub use graph::{build_graph, normalize_name, TriggerGraph, TriggerKey};
pub use health::{
    compare_days, DayOverDay, HealthClassifier, HealthRecord, HealthStatus, Outcome, Transition,
    TransitionCounts,
};
pub use normalize::{normalize, DailyBucket};
pub use window::{DayWindow, TimeRange};
pub use workflow_file::{ParseError, WorkflowDefinition};
