//! Workflow trigger graph inferred from configuration text.
//!
//! Two kinds of relationship become directed `trigger -> dependent` edges:
//!
//! - **by name**: a workflow declares `on.workflow_run.workflows: [Build]`,
//!   giving the edge `build -> this.yml` in [`TriggerGraph::name_to_testing`];
//! - **by file**: a job in this workflow calls `./.github/workflows/test.yml`,
//!   giving the edge `this.yml -> test.yml` in [`TriggerGraph::file_to_testing`].
//!
//! Callers should look dependents up through [`TriggerGraph::resolve_dependents`]
//! rather than the raw maps, since the same logical workflow is referenced
//! by name in one place and by file in another.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::fmt;

use runwatch_types::{file_name, Workflow};
use serde::Serialize;
use tracing::{debug, info, warn};

use super::workflow_file::WorkflowDefinition;

/// Key of a trigger in the reverse map, tagged with the forward map it came from.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(tag = "kind", content = "key", rename_all = "snake_case")]
pub enum TriggerKey {
    /// A normalized workflow name (see [`normalize_name`]).
    Name(String),
    /// A workflow file basename.
    File(String),
}

impl TriggerKey {
    /// A by-name key, normalized.
    pub fn name(name: &str) -> Self {
        TriggerKey::Name(normalize_name(name))
    }

    /// A by-file key, reduced to the basename.
    pub fn file(path: &str) -> Self {
        TriggerKey::File(file_name(path).to_string())
    }

    pub fn as_str(&self) -> &str {
        match self {
            TriggerKey::Name(s) | TriggerKey::File(s) => s,
        }
    }
}

impl fmt::Display for TriggerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalize a workflow name for matching: trimmed and lowercased.
pub fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Trigger relationships between the workflows of one repository.
///
/// All collections are ordered sets, so the same workflow list always
/// produces an identical graph regardless of input order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TriggerGraph {
    /// Normalized upstream workflow name -> dependent file basenames.
    pub name_to_testing: BTreeMap<String, BTreeSet<String>>,
    /// Calling file basename -> called file basenames.
    pub file_to_testing: BTreeMap<String, BTreeSet<String>>,
    /// Dependent file basename -> every key that triggers it.
    pub testing_to_trigger: BTreeMap<String, BTreeSet<TriggerKey>>,
    /// File basename -> every normalized name the file is known by: the
    /// provider's workflow name plus the `name:` declared in the file.
    /// Several workflows may share a basename (a deleted workflow and its
    /// successor), so all of their names are kept.
    pub names: BTreeMap<String, BTreeSet<String>>,
    /// Basenames of workflows that declare `workflow_call`.
    pub reusable: BTreeSet<String>,
    /// Basenames of workflows whose configuration could not be parsed.
    pub unparsed: BTreeSet<String>,
}

impl TriggerGraph {
    /// Build the graph from a repository's workflows.
    ///
    /// A workflow whose configuration fails to parse is logged and
    /// contributes no edges; the rest of the batch is unaffected.
    pub fn build(workflows: &[Workflow]) -> Self {
        let mut graph = Self::default();

        for workflow in workflows {
            let this = workflow.file_name().to_string();
            graph
                .names
                .entry(this.clone())
                .or_default()
                .insert(normalize_name(&workflow.name));

            let Some(content) = workflow.content.as_deref() else {
                debug!(workflow_id = %workflow.id, path = %workflow.path, "no configuration text");
                continue;
            };

            let definition = match WorkflowDefinition::parse(content) {
                Ok(definition) => definition,
                Err(e) => {
                    warn!(
                        workflow_id = %workflow.id,
                        path = %workflow.path,
                        error = %e,
                        "skipping unparseable workflow"
                    );
                    graph.unparsed.insert(this);
                    continue;
                }
            };

            if let Some(declared) = &definition.name {
                if let Some(names) = graph.names.get_mut(&this) {
                    names.insert(normalize_name(declared));
                }
            }
            if definition.reusable {
                graph.reusable.insert(this.clone());
            }
            for upstream in &definition.upstream_names {
                graph
                    .name_to_testing
                    .entry(normalize_name(upstream))
                    .or_default()
                    .insert(this.clone());
            }
            for called in &definition.called_local_files {
                graph
                    .file_to_testing
                    .entry(this.clone())
                    .or_default()
                    .insert(called.clone());
            }
        }

        graph.rebuild_reverse();
        info!(
            workflows = workflows.len(),
            edges = graph.edge_count(),
            unparsed = graph.unparsed.len(),
            "built trigger graph"
        );
        graph
    }

    /// Recompute `testing_to_trigger` by inverting both forward maps.
    fn rebuild_reverse(&mut self) {
        let mut reverse: BTreeMap<String, BTreeSet<TriggerKey>> = BTreeMap::new();
        for (name, dependents) in &self.name_to_testing {
            for dependent in dependents {
                reverse
                    .entry(dependent.clone())
                    .or_default()
                    .insert(TriggerKey::Name(name.clone()));
            }
        }
        for (file, dependents) in &self.file_to_testing {
            for dependent in dependents {
                reverse
                    .entry(dependent.clone())
                    .or_default()
                    .insert(TriggerKey::File(file.clone()));
            }
        }
        self.testing_to_trigger = reverse;
    }

    /// Files that depend on `key`, which may be a workflow name, a file
    /// basename or a path.
    ///
    /// Name matching is case-insensitive and ignores surrounding whitespace.
    /// File matching uses the basename only; a key without an extension also
    /// matches `<key>.yml` and `<key>.yaml`.
    pub fn resolve_dependents(&self, key: &str) -> BTreeSet<String> {
        let mut dependents = BTreeSet::new();

        if let Some(by_name) = self.name_to_testing.get(&normalize_name(key)) {
            dependents.extend(by_name.iter().cloned());
        }
        for candidate in file_candidates(key) {
            if let Some(by_file) = self.file_to_testing.get(&candidate) {
                dependents.extend(by_file.iter().cloned());
            }
        }

        dependents
    }

    /// Keys that trigger the workflow in `file`.
    pub fn triggers_of(&self, file: &str) -> BTreeSet<TriggerKey> {
        file_candidates(file)
            .iter()
            .filter_map(|candidate| self.testing_to_trigger.get(candidate))
            .flatten()
            .cloned()
            .collect()
    }

    /// The file basename of the workflow carrying `name`, if one is known.
    ///
    /// Links a by-name trigger key to its by-file representation. When
    /// several files share a name the alphabetically first wins.
    pub fn trigger_file_for(&self, name: &str) -> Option<&str> {
        let wanted = normalize_name(name);
        self.names
            .iter()
            .find(|(_, names)| names.contains(&wanted))
            .map(|(file, _)| file.as_str())
    }

    /// Every file reachable downstream of `key`, following both edge kinds.
    pub fn downstream_closure(&self, key: &str) -> BTreeSet<String> {
        let mut seen: BTreeSet<String> = BTreeSet::new();
        let mut queue: VecDeque<String> = self.resolve_dependents(key).into_iter().collect();

        while let Some(file) = queue.pop_front() {
            if !seen.insert(file.clone()) {
                continue;
            }
            let mut next = self.resolve_dependents(&file);
            for name in self.names.get(&file).into_iter().flatten() {
                next.extend(self.resolve_dependents(name));
            }
            queue.extend(next.into_iter().filter(|f| !seen.contains(f)));
        }

        seen
    }

    /// Total number of distinct edges across both forward maps.
    pub fn edge_count(&self) -> usize {
        self.name_to_testing
            .values()
            .chain(self.file_to_testing.values())
            .map(BTreeSet::len)
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.edge_count() == 0
    }
}

/// Candidate file keys for a lookup string.
fn file_candidates(key: &str) -> Vec<String> {
    let base = file_name(key);
    if base.is_empty() {
        return Vec::new();
    }
    if base.contains('.') {
        vec![base.to_string()]
    } else {
        vec![format!("{base}.yml"), format!("{base}.yaml")]
    }
}

/// Build the trigger graph for a list of workflows.
pub fn build_graph(workflows: &[Workflow]) -> TriggerGraph {
    TriggerGraph::build(workflows)
}
