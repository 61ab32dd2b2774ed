//! Typed extraction of trigger and call declarations from workflow files.
//!
//! Only the handful of fields the trigger graph needs are read. A file that
//! is not valid YAML (or not a mapping at the top level) is a [`ParseError`];
//! anything else that is missing or shaped unexpectedly simply contributes
//! nothing.

use serde_yaml::{Mapping, Value};
use thiserror::Error;
use tracing::debug;

use runwatch_types::file_name;

/// Prefix of a job-level `uses:` that points at a workflow in the same repository.
pub const LOCAL_WORKFLOW_PREFIX: &str = "./.github/workflows/";

/// Event that makes a workflow callable from other workflows.
const WORKFLOW_CALL: &str = "workflow_call";

/// Event that runs a workflow after other named workflows complete.
const WORKFLOW_RUN: &str = "workflow_run";

/// Errors produced when a workflow file cannot be read at all.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("workflow document is not a mapping")]
    NotAMapping,
}

/// The trigger-related declarations of one workflow file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkflowDefinition {
    /// The `name:` declared in the file, if any.
    pub name: Option<String>,
    /// Whether the workflow declares `workflow_call` and can be invoked by others.
    pub reusable: bool,
    /// Names listed under `on.workflow_run.workflows`, in file order.
    pub upstream_names: Vec<String>,
    /// Basenames of same-repository workflows invoked by jobs, deduplicated.
    pub called_local_files: Vec<String>,
}

impl WorkflowDefinition {
    /// Parse workflow configuration text.
    pub fn parse(text: &str) -> Result<Self, ParseError> {
        let doc: Value = serde_yaml::from_str(text)?;
        let Value::Mapping(root) = doc else {
            return Err(ParseError::NotAMapping);
        };

        let name = root
            .get("name")
            .and_then(Value::as_str)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        let triggers = trigger_section(&root);
        let reusable = triggers.is_some_and(|t| declares_event(t, WORKFLOW_CALL));
        let upstream_names = triggers.map(upstream_names).unwrap_or_default();
        let called_local_files = root.get("jobs").map(local_calls).unwrap_or_default();

        Ok(Self {
            name,
            reusable,
            upstream_names,
            called_local_files,
        })
    }
}

/// The `on:` section. YAML 1.1 loaders read a bare `on` key as boolean
/// `true`, so both spellings are accepted.
fn trigger_section(root: &Mapping) -> Option<&Value> {
    root.get("on").or_else(|| root.get(Value::Bool(true)))
}

fn declares_event(triggers: &Value, event: &str) -> bool {
    match triggers {
        Value::String(s) => s == event,
        Value::Sequence(events) => events.iter().any(|e| e.as_str() == Some(event)),
        Value::Mapping(events) => events.contains_key(event),
        _ => false,
    }
}

fn upstream_names(triggers: &Value) -> Vec<String> {
    let Some(workflows) = triggers
        .get(WORKFLOW_RUN)
        .and_then(|run| run.get("workflows"))
    else {
        return Vec::new();
    };

    let names: Vec<String> = match workflows {
        Value::String(name) => vec![name.clone()],
        Value::Sequence(items) => items
            .iter()
            .filter_map(|item| {
                let name = item.as_str();
                if name.is_none() {
                    debug!(?item, "ignoring non-string workflow_run entry");
                }
                name.map(str::to_string)
            })
            .collect(),
        other => {
            debug!(?other, "ignoring malformed workflow_run.workflows");
            Vec::new()
        }
    };

    names
        .into_iter()
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
        .collect()
}

fn local_calls(jobs: &Value) -> Vec<String> {
    let Some(jobs) = jobs.as_mapping() else {
        debug!("ignoring jobs section that is not a mapping");
        return Vec::new();
    };

    let mut files: Vec<String> = Vec::new();
    for job in jobs.values() {
        let Some(uses) = job.get("uses").and_then(Value::as_str) else {
            continue;
        };
        if !is_local_workflow_ref(uses) {
            continue;
        }
        let called = file_name(uses).to_string();
        if !called.is_empty() && !files.contains(&called) {
            files.push(called);
        }
    }
    files
}

/// Whether a `uses:` value references a workflow file in the same repository.
pub fn is_local_workflow_ref(uses: &str) -> bool {
    uses.trim().starts_with(LOCAL_WORKFLOW_PREFIX)
}
