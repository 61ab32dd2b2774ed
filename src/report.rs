//! JSON export of computed views.
//!
//! Each export wraps a computed result with a small summary block so the
//! output is useful without post-processing.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::dashboard::{DependentsHealth, HealthReport};
use crate::data::{DayWindow, HealthStatus, TriggerGraph, TriggerKey};

/// Counts of workflows per health status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HealthSummary {
    pub total_workflows: usize,
    pub consistent: usize,
    pub improved: usize,
    pub regressed: usize,
    pub still_failing: usize,
    pub no_runs: usize,
    pub unclassified: usize,
}

impl HealthSummary {
    pub fn from_statuses<'a>(statuses: impl IntoIterator<Item = &'a HealthStatus>) -> Self {
        let mut summary = Self::default();
        for status in statuses {
            summary.total_workflows += 1;
            match status {
                HealthStatus::Consistent => summary.consistent += 1,
                HealthStatus::Improved => summary.improved += 1,
                HealthStatus::Regressed => summary.regressed += 1,
                HealthStatus::StillFailing => summary.still_failing += 1,
                HealthStatus::NoRunsToday => summary.no_runs += 1,
                HealthStatus::Unclassified => summary.unclassified += 1,
            }
        }
        summary
    }
}

/// One row of the health export.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkflowHealthRow {
    pub id: u64,
    pub name: Option<String>,
    pub file: Option<String>,
    pub status: HealthStatus,
    pub label: &'static str,
    pub pass_count: u32,
    pub fail_count: u32,
    pub running_count: u32,
    pub pass_rate: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthExport {
    pub window: DayWindow,
    pub summary: HealthSummary,
    pub workflows: Vec<WorkflowHealthRow>,
}

impl From<&HealthReport> for HealthExport {
    fn from(report: &HealthReport) -> Self {
        let workflows = report
            .records
            .iter()
            .map(|(id, record)| {
                let summary = report.workflows.get(id);
                WorkflowHealthRow {
                    id: id.0,
                    name: summary.map(|w| w.name.clone()),
                    file: summary.map(|w| w.file.clone()),
                    status: record.status,
                    label: record.status.label(),
                    pass_count: record.pass_count,
                    fail_count: record.fail_count,
                    running_count: record.running_count,
                    pass_rate: record.pass_rate(),
                }
            })
            .collect();

        Self {
            window: report.window,
            summary: HealthSummary::from_statuses(report.records.values().map(|r| &r.status)),
            workflows,
        }
    }
}

/// One `trigger -> dependent` edge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EdgeRow {
    pub trigger: TriggerKey,
    /// File of the triggering workflow, when the trigger is a known name.
    pub trigger_file: Option<String>,
    pub dependent: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GraphExport {
    pub edge_count: usize,
    pub edges: Vec<EdgeRow>,
    pub reusable: Vec<String>,
    pub unparsed: Vec<String>,
}

impl From<&TriggerGraph> for GraphExport {
    fn from(graph: &TriggerGraph) -> Self {
        let mut edges = Vec::with_capacity(graph.edge_count());
        for (dependent, triggers) in &graph.testing_to_trigger {
            for trigger in triggers {
                let trigger_file = match trigger {
                    TriggerKey::Name(name) => graph.trigger_file_for(name).map(str::to_string),
                    TriggerKey::File(file) => Some(file.clone()),
                };
                edges.push(EdgeRow {
                    trigger: trigger.clone(),
                    trigger_file,
                    dependent: dependent.clone(),
                });
            }
        }

        Self {
            edge_count: graph.edge_count(),
            edges,
            reusable: graph.reusable.iter().cloned().collect(),
            unparsed: graph.unparsed.iter().cloned().collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DependentsExport {
    pub key: String,
    pub window: DayWindow,
    pub summary: HealthSummary,
    /// Dependent files with their status, or `None` when no record exists.
    pub dependents: BTreeMap<String, Option<HealthStatus>>,
}

impl From<&DependentsHealth> for DependentsExport {
    fn from(d: &DependentsHealth) -> Self {
        Self {
            key: d.key.clone(),
            window: d.window,
            summary: HealthSummary::from_statuses(d.records.values().map(|r| &r.status)),
            dependents: d
                .files
                .iter()
                .map(|f| (f.clone(), d.records.get(f).map(|r| r.status)))
                .collect(),
        }
    }
}

/// Render a value as pretty JSON.
pub fn to_json<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).context("Failed to serialize report")
}

/// Write a value as pretty JSON to `path`.
pub fn export_to_file<T: Serialize>(value: &T, path: &Path) -> Result<()> {
    let json = to_json(value)?;
    let mut file = std::fs::File::create(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    file.write_all(json.as_bytes())?;
    file.write_all(b"\n")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use runwatch_types::{Workflow, WorkflowId};

    use crate::data::build_graph;
    use crate::data::health::classify_window;

    fn make_graph() -> TriggerGraph {
        build_graph(&[
            Workflow::new(1, "Build", ".github/workflows/build.yml")
                .with_content("on: push\njobs:\n  test:\n    uses: ./.github/workflows/test.yml\n"),
            Workflow::new(2, "Deploy", ".github/workflows/deploy.yml")
                .with_content("on:\n  workflow_run:\n    workflows: [Build]\n"),
            Workflow::new(3, "Test", ".github/workflows/test.yml").with_content("on: workflow_call\n"),
        ])
    }

    #[test]
    fn test_graph_export_links_names_to_files() {
        let export = GraphExport::from(&make_graph());

        assert_eq!(export.edge_count, 2);
        assert_eq!(export.reusable, vec!["test.yml"]);
        let deploy = export.edges.iter().find(|e| e.dependent == "deploy.yml").unwrap();
        assert_eq!(deploy.trigger, TriggerKey::Name("build".to_string()));
        assert_eq!(deploy.trigger_file.as_deref(), Some("build.yml"));
    }

    #[test]
    fn test_summary_counts() {
        let summary = HealthSummary::from_statuses(&[
            HealthStatus::Consistent,
            HealthStatus::Consistent,
            HealthStatus::StillFailing,
            HealthStatus::Unclassified,
        ]);
        assert_eq!(summary.total_workflows, 4);
        assert_eq!(summary.consistent, 2);
        assert_eq!(summary.still_failing, 1);
        assert_eq!(summary.unclassified, 1);
    }

    #[test]
    fn test_health_export_json_shape() {
        let day = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let window = DayWindow::single(day);
        let report = HealthReport {
            window,
            records: BTreeMap::from([(WorkflowId(7), classify_window(WorkflowId(7), &[], window, 7))]),
            buckets: Vec::new(),
            workflows: BTreeMap::from([(
                WorkflowId(7),
                (&Workflow::new(7, "Nightly", ".github/workflows/nightly.yml")).into(),
            )]),
        };

        let json: serde_json::Value =
            serde_json::from_str(&to_json(&HealthExport::from(&report)).unwrap()).unwrap();
        assert_eq!(json["summary"]["no_runs"], 1);
        assert_eq!(json["workflows"][0]["file"], "nightly.yml");
        assert_eq!(json["workflows"][0]["status"], "no_runs_today");
        assert!(json["workflows"][0]["pass_rate"].is_null());
        assert_eq!(json["window"]["start"], "2024-03-01");
    }

    #[test]
    fn test_export_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("graph.json");

        export_to_file(&GraphExport::from(&make_graph()), &path).unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        let json: serde_json::Value = serde_json::from_str(&written).unwrap();
        assert_eq!(json["edge_count"], 2);
    }
}
