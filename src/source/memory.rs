//! In-process source.
//!
//! Holds runs and workflows per repository in memory. Useful for embedding
//! and for observing how often the aggregator actually reaches its
//! collaborators.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use runwatch_types::{Repository, Run, Workflow};

use super::{RunSource, SourceError, WorkflowSource};
use crate::data::TimeRange;

#[derive(Debug, Default, Clone)]
struct RepoData {
    runs: Vec<Run>,
    workflows: Vec<Workflow>,
}

/// A source backed by in-memory data.
///
/// Unknown repositories are reported as [`SourceError::NotFound`]. A failure
/// queued with [`MemorySource::fail_next`] is returned by the next fetch of
/// either kind, after which fetches succeed again.
#[derive(Debug, Default)]
pub struct MemorySource {
    repos: RwLock<HashMap<Repository, RepoData>>,
    pending_failure: Mutex<Option<SourceError>>,
    run_fetches: AtomicUsize,
    workflow_fetches: AtomicUsize,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a repository with no runs or workflows.
    pub fn add_repository(&self, repo: &Repository) {
        self.repos.write().entry(repo.clone()).or_default();
    }

    /// Append runs to a repository, registering it if needed.
    pub fn add_runs(&self, repo: &Repository, runs: impl IntoIterator<Item = Run>) {
        self.repos
            .write()
            .entry(repo.clone())
            .or_default()
            .runs
            .extend(runs);
    }

    /// Replace a repository's workflows, registering it if needed.
    pub fn set_workflows(&self, repo: &Repository, workflows: Vec<Workflow>) {
        self.repos.write().entry(repo.clone()).or_default().workflows = workflows;
    }

    /// Make the next fetch fail with `err`.
    pub fn fail_next(&self, err: SourceError) {
        *self.pending_failure.lock() = Some(err);
    }

    /// Number of `fetch_runs` calls so far, including failed ones.
    pub fn run_fetches(&self) -> usize {
        self.run_fetches.load(Ordering::Relaxed)
    }

    /// Number of `fetch_workflows` calls so far, including failed ones.
    pub fn workflow_fetches(&self) -> usize {
        self.workflow_fetches.load(Ordering::Relaxed)
    }

    fn take_failure(&self) -> Result<(), SourceError> {
        match self.pending_failure.lock().take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn with_repo<T>(&self, repo: &Repository, f: impl FnOnce(&RepoData) -> T) -> Result<T, SourceError> {
        self.take_failure()?;
        let repos = self.repos.read();
        repos
            .get(repo)
            .map(f)
            .ok_or_else(|| SourceError::NotFound(repo.to_string()))
    }
}

#[async_trait]
impl RunSource for MemorySource {
    async fn fetch_runs(&self, repo: &Repository, range: &TimeRange) -> Result<Vec<Run>, SourceError> {
        self.run_fetches.fetch_add(1, Ordering::Relaxed);
        self.with_repo(repo, |data| {
            data.runs
                .iter()
                .filter(|r| range.contains(&r.started_at))
                .cloned()
                .collect()
        })
    }

    fn description(&self) -> &str {
        "memory"
    }
}

#[async_trait]
impl WorkflowSource for MemorySource {
    async fn fetch_workflows(&self, repo: &Repository) -> Result<Vec<Workflow>, SourceError> {
        self.workflow_fetches.fetch_add(1, Ordering::Relaxed);
        self.with_repo(repo, |data| data.workflows.clone())
    }
}
