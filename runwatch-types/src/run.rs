//! Run - one execution of a workflow.

use std::fmt;

use chrono::{DateTime, Utc};

use crate::WorkflowId;

/// Provider-assigned identifier of a single run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct RunId(pub u64);

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle status of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum RunStatus {
    Queued,
    InProgress,
    Completed,
}

impl RunStatus {
    /// Whether the run has reached its final state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Completed)
    }
}

/// Final outcome of a completed run.
///
/// Only [`Conclusion::Success`] counts as a pass; every other outcome is
/// treated as a failure by the health classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Conclusion {
    Success,
    Failure,
    Cancelled,
    Skipped,
    TimedOut,
    ActionRequired,
    Neutral,
    Stale,
}

impl Conclusion {
    pub fn is_success(&self) -> bool {
        matches!(self, Conclusion::Success)
    }
}

/// A point-in-time snapshot of one workflow execution.
///
/// `conclusion` is `Some` exactly when `status` is [`RunStatus::Completed`].
/// [`RunBuilder`] enforces this for runs constructed in code; snapshots
/// ingested from a provider can be checked with [`Run::is_well_formed`].
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Run {
    pub id: RunId,
    pub workflow_id: WorkflowId,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub status: RunStatus,
    #[cfg_attr(feature = "serde", serde(default))]
    pub conclusion: Option<Conclusion>,
}

impl Run {
    /// Create a builder for a run of the given workflow.
    pub fn builder(id: u64, workflow_id: WorkflowId) -> RunBuilder {
        RunBuilder::new(id, workflow_id)
    }

    /// Check the status/conclusion invariant.
    pub fn is_well_formed(&self) -> bool {
        self.status.is_terminal() == self.conclusion.is_some()
    }

    /// Whether the run finished successfully.
    pub fn is_success(&self) -> bool {
        self.conclusion.is_some_and(|c| c.is_success())
    }
}

/// Builder for constructing `Run` instances.
///
/// A run starts out queued; calling [`RunBuilder::completed`] is the only
/// way to attach a conclusion.
#[derive(Debug)]
pub struct RunBuilder {
    id: RunId,
    workflow_id: WorkflowId,
    started_at: DateTime<Utc>,
    updated_at: Option<DateTime<Utc>>,
    status: RunStatus,
    conclusion: Option<Conclusion>,
}

impl RunBuilder {
    pub fn new(id: u64, workflow_id: WorkflowId) -> Self {
        Self {
            id: RunId(id),
            workflow_id,
            started_at: DateTime::<Utc>::default(),
            updated_at: None,
            status: RunStatus::Queued,
            conclusion: None,
        }
    }

    pub fn started_at(mut self, at: DateTime<Utc>) -> Self {
        self.started_at = at;
        self
    }

    /// Set the last update time. Defaults to the start time.
    pub fn updated_at(mut self, at: DateTime<Utc>) -> Self {
        self.updated_at = Some(at);
        self
    }

    pub fn queued(mut self) -> Self {
        self.status = RunStatus::Queued;
        self.conclusion = None;
        self
    }

    pub fn in_progress(mut self) -> Self {
        self.status = RunStatus::InProgress;
        self.conclusion = None;
        self
    }

    pub fn completed(mut self, conclusion: Conclusion) -> Self {
        self.status = RunStatus::Completed;
        self.conclusion = Some(conclusion);
        self
    }

    pub fn build(self) -> Run {
        Run {
            id: self.id,
            workflow_id: self.workflow_id,
            started_at: self.started_at,
            updated_at: self.updated_at.unwrap_or(self.started_at),
            status: self.status,
            conclusion: self.conclusion,
        }
    }
}
