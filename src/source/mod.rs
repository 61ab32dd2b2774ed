//! Collaborators that supply run records and workflow definitions.
//!
//! The aggregator only talks to these traits, so the same pipeline runs
//! against a directory on disk ([`FileSource`]), an in-process store
//! ([`MemorySource`]), or any provider client an embedder plugs in.

mod file;
mod memory;

pub use file::FileSource;
pub use memory::MemorySource;

pub use crate::error::SourceError;

use std::fmt::Debug;

use async_trait::async_trait;
use runwatch_types::{Repository, Run, Workflow};

use crate::data::TimeRange;

/// Supplies the runs of a repository.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use runwatch::{MemorySource, RunSource};
/// use runwatch::data::DayWindow;
/// use runwatch_types::Repository;
///
/// # tokio_test::block_on(async {
/// let repo = Repository::new("acme", "app");
/// let source = Arc::new(MemorySource::new());
/// source.add_repository(&repo);
///
/// let day = chrono::NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
/// let range = DayWindow::single(day).utc_bounds(&chrono::FixedOffset::east_opt(0).unwrap());
/// let runs = source.fetch_runs(&repo, &range).await.unwrap();
/// assert!(runs.is_empty());
/// # });
/// ```
#[async_trait]
pub trait RunSource: Send + Sync + Debug {
    /// Fetch every run that started within `range`.
    ///
    /// An empty list means no runs happened; failures are reported as
    /// [`SourceError`], never as an empty list.
    async fn fetch_runs(&self, repo: &Repository, range: &TimeRange) -> Result<Vec<Run>, SourceError>;

    /// Returns a human-readable description of the source.
    fn description(&self) -> &str;
}

/// Supplies the workflow definitions of a repository, with their
/// configuration text where available.
#[async_trait]
pub trait WorkflowSource: Send + Sync + Debug {
    async fn fetch_workflows(&self, repo: &Repository) -> Result<Vec<Workflow>, SourceError>;
}
