//! Workflow - a named automation definition within a repository.

use std::fmt;

/// Stable numeric identifier of a workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct WorkflowId(pub u64);

impl fmt::Display for WorkflowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Whether the workflow file still exists in the default branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum WorkflowState {
    #[default]
    Active,
    Deleted,
}

/// A workflow definition as reported by the CI provider.
///
/// `content` carries the raw configuration text (YAML) of the file at
/// `path`. It is `None` when the collaborator could not retrieve it; such a
/// workflow simply contributes no edges to the trigger graph.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Workflow {
    pub id: WorkflowId,
    pub name: String,
    pub path: String,
    #[cfg_attr(feature = "serde", serde(default))]
    pub state: WorkflowState,
    #[cfg_attr(
        feature = "serde",
        serde(default, skip_serializing_if = "Option::is_none")
    )]
    pub content: Option<String>,
}

impl Workflow {
    /// Create an active workflow without configuration text.
    pub fn new(id: u64, name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            id: WorkflowId(id),
            name: name.into(),
            path: path.into(),
            state: WorkflowState::Active,
            content: None,
        }
    }

    /// Attach raw configuration text.
    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    pub fn with_state(mut self, state: WorkflowState) -> Self {
        self.state = state;
        self
    }

    /// The basename of the workflow file (e.g. `ci.yml`).
    pub fn file_name(&self) -> &str {
        file_name(&self.path)
    }

    pub fn is_active(&self) -> bool {
        self.state == WorkflowState::Active
    }
}

/// Basename of a slash-separated path, ignoring any trailing `@ref`.
///
/// ```rust
/// assert_eq!(runwatch_types::file_name(".github/workflows/ci.yml"), "ci.yml");
/// assert_eq!(runwatch_types::file_name("./.github/workflows/build.yaml@main"), "build.yaml");
/// assert_eq!(runwatch_types::file_name("deploy.yml"), "deploy.yml");
/// ```
pub fn file_name(path: &str) -> &str {
    let path = path.trim();
    let path = path.split('@').next().unwrap_or(path);
    let path = path.trim_end_matches('/');
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_name_strips_directories() {
        let wf = Workflow::new(1, "CI", ".github/workflows/ci.yml");
        assert_eq!(wf.file_name(), "ci.yml");
    }

    #[test]
    fn test_file_name_handles_windows_separators() {
        assert_eq!(file_name(r".github\workflows\lint.yml"), "lint.yml");
    }

    #[test]
    fn test_new_workflow_is_active_without_content() {
        let wf = Workflow::new(1, "CI", "ci.yml");
        assert!(wf.is_active());
        assert!(wf.content.is_none());

        let wf = wf.with_state(WorkflowState::Deleted).with_content("on: push");
        assert!(!wf.is_active());
        assert_eq!(wf.content.as_deref(), Some("on: push"));
    }
}
