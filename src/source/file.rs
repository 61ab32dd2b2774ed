//! Directory-backed source.
//!
//! Reads exported provider data laid out per repository:
//!
//! ```text
//! <root>/<owner>/<name>/runs.json          array of runs
//! <root>/<owner>/<name>/workflows.json     array of workflow metadata
//! <root>/<owner>/<name>/<workflow.path>    configuration text
//! ```

use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use runwatch_types::{Repository, Run, Workflow};
use tokio::fs;
use tracing::{debug, warn};

use super::{RunSource, SourceError, WorkflowSource};
use crate::data::TimeRange;

const RUNS_FILE: &str = "runs.json";
const WORKFLOWS_FILE: &str = "workflows.json";

/// A source that reads runs and workflows from a data directory.
///
/// A repository without `runs.json` has no runs, and one without
/// `workflows.json` has no workflows. A repository without a directory at
/// all is reported as [`SourceError::NotFound`].
#[derive(Debug, Clone)]
pub struct FileSource {
    root: PathBuf,
    description: String,
}

impl FileSource {
    /// Create a new file source rooted at the given directory.
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        let root = root.as_ref().to_path_buf();
        let description = format!("dir: {}", root.display());
        Self { root, description }
    }

    /// Returns the data directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding one repository's files.
    async fn repo_dir(&self, repo: &Repository) -> Result<PathBuf, SourceError> {
        if !is_plain_name(&repo.owner) || !is_plain_name(&repo.name) {
            return Err(SourceError::NotFound(repo.to_string()));
        }
        let dir = self.root.join(&repo.owner).join(&repo.name);
        match fs::metadata(&dir).await {
            Ok(meta) if meta.is_dir() => Ok(dir),
            Ok(_) => Err(SourceError::NotFound(repo.to_string())),
            Err(e) => Err(map_io(e, repo.to_string())),
        }
    }

    async fn read_json<T>(&self, path: &Path) -> Result<Option<T>, SourceError>
    where
        T: serde::de::DeserializeOwned,
    {
        let Some(content) = read_optional(path).await? else {
            return Ok(None);
        };
        serde_json::from_str(&content)
            .map(Some)
            .map_err(|e| SourceError::decode(path.display().to_string(), e))
    }
}

#[async_trait]
impl RunSource for FileSource {
    async fn fetch_runs(&self, repo: &Repository, range: &TimeRange) -> Result<Vec<Run>, SourceError> {
        let dir = self.repo_dir(repo).await?;
        let runs: Vec<Run> = self.read_json(&dir.join(RUNS_FILE)).await?.unwrap_or_default();

        let total = runs.len();
        let runs: Vec<Run> = runs
            .into_iter()
            .filter(|r| range.contains(&r.started_at))
            .collect();

        let malformed = runs.iter().filter(|r| !r.is_well_formed()).count();
        if malformed > 0 {
            warn!(%repo, malformed, "Runs with inconsistent status and conclusion");
        }
        debug!(%repo, total, in_range = runs.len(), "Loaded runs");
        Ok(runs)
    }

    fn description(&self) -> &str {
        &self.description
    }
}

#[async_trait]
impl WorkflowSource for FileSource {
    async fn fetch_workflows(&self, repo: &Repository) -> Result<Vec<Workflow>, SourceError> {
        let dir = self.repo_dir(repo).await?;
        let mut workflows: Vec<Workflow> = self
            .read_json(&dir.join(WORKFLOWS_FILE))
            .await?
            .unwrap_or_default();

        for workflow in workflows.iter_mut().filter(|w| w.content.is_none()) {
            let Some(relative) = safe_relative(&workflow.path) else {
                warn!(%repo, path = %workflow.path, "Skipping workflow path outside repository");
                continue;
            };
            workflow.content = read_optional(&dir.join(relative)).await?;
            if workflow.content.is_none() {
                debug!(%repo, path = %workflow.path, "No configuration text for workflow");
            }
        }

        debug!(%repo, count = workflows.len(), "Loaded workflows");
        Ok(workflows)
    }
}

/// Read a file, treating a missing file as `None`.
async fn read_optional(path: &Path) -> Result<Option<String>, SourceError> {
    match fs::read_to_string(path).await {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(map_io(e, path.display().to_string())),
    }
}

fn map_io(err: std::io::Error, what: String) -> SourceError {
    match err.kind() {
        ErrorKind::NotFound => SourceError::NotFound(what),
        ErrorKind::PermissionDenied => SourceError::AccessDenied(what),
        _ => SourceError::Io(err),
    }
}

/// A workflow path that stays inside the repository directory.
fn safe_relative(path: &str) -> Option<&Path> {
    let path = Path::new(path.trim());
    let inside = path
        .components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
    (inside && path.components().next().is_some()).then_some(path)
}

/// Exactly one normal path component, so joining it cannot leave the root.
fn is_plain_name(part: &str) -> bool {
    let mut components = Path::new(part).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}
