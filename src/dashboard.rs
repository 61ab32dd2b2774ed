//! The windowed aggregator.
//!
//! [`Dashboard`] fetches runs and workflows from its sources, runs them
//! through the normalizer, graph builder and classifier, and memoizes the
//! results for the configured TTL.
//!
//! ```text
//! RunSource ───────┐
//!                  ├── try_join! ──▶ normalize ──▶ classify_all ──▶ HealthReport
//! WorkflowSource ──┤
//!                  └───────────────▶ build_graph ─────────────────▶ TriggerGraph
//! ```
//!
//! Graphs are cached per repository and reports per (repository, window).

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::{Duration, NaiveDate};
use runwatch_types::{Repository, Run, Workflow, WorkflowId};
use serde::Serialize;
use tracing::info;

use crate::cache::{CacheKey, Clock, SystemClock, TtlCache};
use crate::config::Settings;
use crate::data::health::classify_window;
use crate::data::{
    build_graph, compare_days, normalize, DailyBucket, DayOverDay, DayWindow, HealthRecord,
    TriggerGraph,
};
use crate::source::{RunSource, SourceError, WorkflowSource};

/// Display information about a workflow, keyed by id in reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkflowSummary {
    pub name: String,
    pub path: String,
    pub file: String,
    pub active: bool,
}

impl From<&Workflow> for WorkflowSummary {
    fn from(w: &Workflow) -> Self {
        Self {
            name: w.name.clone(),
            path: w.path.clone(),
            file: w.file_name().to_string(),
            active: w.is_active(),
        }
    }
}

/// Health of every workflow in a repository over one window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthReport {
    pub window: DayWindow,
    pub records: BTreeMap<WorkflowId, HealthRecord>,
    pub buckets: Vec<DailyBucket>,
    pub workflows: BTreeMap<WorkflowId, WorkflowSummary>,
}

impl HealthReport {
    /// The record of the workflow stored at `file`, if any.
    ///
    /// A file may belong to several workflows (a deleted one and its
    /// successor). Only workflows with a record are considered; active ones
    /// are preferred, then the lowest id.
    pub fn record_for_file(&self, file: &str) -> Option<&HealthRecord> {
        self.workflows
            .iter()
            .filter(|(_, w)| w.file == file)
            .filter_map(|(id, w)| self.records.get(id).map(|record| (w.active, record)))
            .min_by_key(|(active, _)| !active)
            .map(|(_, record)| record)
    }
}

/// Health of the workflows triggered by one key.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DependentsHealth {
    pub key: String,
    pub window: DayWindow,
    /// Dependent workflow files, whether or not they have a record.
    pub files: BTreeSet<String>,
    pub records: BTreeMap<String, HealthRecord>,
}

/// Aggregates sources into cached graph and health views.
#[derive(Debug)]
pub struct Dashboard {
    runs: Arc<dyn RunSource>,
    workflows: Arc<dyn WorkflowSource>,
    settings: Settings,
    graphs: TtlCache<CacheKey, Arc<TriggerGraph>>,
    reports: TtlCache<CacheKey, Arc<HealthReport>>,
}

impl Dashboard {
    pub fn new(
        runs: Arc<dyn RunSource>,
        workflows: Arc<dyn WorkflowSource>,
        settings: Settings,
    ) -> Self {
        Self::with_clock(runs, workflows, settings, Arc::new(SystemClock))
    }

    pub fn with_clock(
        runs: Arc<dyn RunSource>,
        workflows: Arc<dyn WorkflowSource>,
        settings: Settings,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let ttl = settings.cache_ttl;
        Self {
            runs,
            workflows,
            graphs: TtlCache::with_clock(ttl, clock.clone()),
            reports: TtlCache::with_clock(ttl, clock),
            settings,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// The configured window ending on `end`.
    pub fn window_ending(&self, end: NaiveDate) -> DayWindow {
        self.settings.classifier().window_ending(end)
    }

    /// The trigger graph of a repository.
    pub async fn trigger_graph(&self, repo: &Repository) -> Result<Arc<TriggerGraph>, SourceError> {
        self.graphs
            .get_or_compute_async(CacheKey::repository(repo), || async {
                let workflows = self.workflows.fetch_workflows(repo).await?;
                Ok(Arc::new(build_graph(&workflows)))
            })
            .await
    }

    /// Health of every workflow in a repository over `window`.
    ///
    /// Active workflows without runs in the window are included with a
    /// `no_runs_today` status.
    pub async fn health(
        &self,
        repo: &Repository,
        window: DayWindow,
    ) -> Result<Arc<HealthReport>, SourceError> {
        self.reports
            .get_or_compute_async(CacheKey::windowed(repo, window), || async {
                let range = window.utc_bounds(&self.settings.utc_offset);
                let (runs, workflows) = tokio::try_join!(
                    self.runs.fetch_runs(repo, &range),
                    self.workflows.fetch_workflows(repo),
                )?;

                let report = self.build_report(window, &runs, &workflows);
                info!(
                    %repo,
                    start = %window.start,
                    end = %window.end,
                    runs = runs.len(),
                    workflows = report.records.len(),
                    "Computed health"
                );
                Ok(Arc::new(report))
            })
            .await
    }

    fn build_report(
        &self,
        window: DayWindow,
        runs: &[Run],
        workflows: &[Workflow],
    ) -> HealthReport {
        let classifier = self.settings.classifier();
        let buckets = normalize(runs, &self.settings.utc_offset);
        let mut records = classifier.classify_all(&buckets, window);

        for workflow in workflows.iter().filter(|w| w.is_active()) {
            records
                .entry(workflow.id)
                .or_insert_with(|| classify_window(workflow.id, &[], window, classifier.recent_days));
        }

        HealthReport {
            window,
            records,
            buckets,
            workflows: workflows.iter().map(|w| (w.id, w.into())).collect(),
        }
    }

    /// Compare `day` with the day before.
    pub async fn day_over_day(&self, repo: &Repository, day: NaiveDate) -> Result<DayOverDay, SourceError> {
        let window = DayWindow::new(day - Duration::days(1), day);
        let report = self.health(repo, window).await?;
        Ok(compare_days(&report.buckets, day))
    }

    /// Health of the workflows that `key` triggers, by name or by file.
    pub async fn dependents_health(
        &self,
        repo: &Repository,
        window: DayWindow,
        key: &str,
    ) -> Result<DependentsHealth, SourceError> {
        let (graph, report) = tokio::try_join!(self.trigger_graph(repo), self.health(repo, window))?;

        let files = graph.resolve_dependents(key);
        let records = files
            .iter()
            .filter_map(|file| {
                report
                    .record_for_file(file)
                    .map(|record| (file.clone(), record.clone()))
            })
            .collect();

        Ok(DependentsHealth {
            key: key.to_string(),
            window,
            files,
            records,
        })
    }

    /// Drop every cached result.
    pub fn invalidate(&self) {
        self.graphs.clear();
        self.reports.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration as StdDuration;

    use chrono::{TimeZone, Utc};
    use runwatch_types::{Conclusion, WorkflowState};

    use crate::cache::ManualClock;
    use crate::data::HealthStatus;
    use crate::source::MemorySource;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, day).unwrap()
    }

    fn make_run(id: u64, wf: u64, day: u32, conclusion: Option<Conclusion>) -> Run {
        let builder = Run::builder(id, WorkflowId(wf))
            .started_at(Utc.with_ymd_and_hms(2024, 3, day, 12, 0, 0).unwrap());
        let builder = match conclusion {
            Some(c) => builder.completed(c),
            None => builder.in_progress(),
        };
        builder.build()
    }

    fn make_workflows() -> Vec<Workflow> {
        vec![
            Workflow::new(1, "Build", ".github/workflows/build.yml").with_content("on: push\n"),
            Workflow::new(2, "Deploy", ".github/workflows/deploy.yml")
                .with_content("on:\n  workflow_run:\n    workflows: [Build]\n"),
            Workflow::new(3, "Docs", ".github/workflows/docs.yml")
                .with_content("on:\n  workflow_run:\n    workflows: [Build]\n"),
            Workflow::new(4, "Lint", ".github/workflows/lint.yml").with_content("on: push\n"),
        ]
    }

    fn make_dashboard() -> (Dashboard, Arc<MemorySource>, Arc<ManualClock>, Repository) {
        let repo = Repository::new("acme", "app");
        let source = Arc::new(MemorySource::new());
        source.set_workflows(&repo, make_workflows());
        source.add_runs(
            &repo,
            [
                make_run(1, 1, 1, Some(Conclusion::Failure)),
                make_run(2, 1, 2, Some(Conclusion::Success)),
                make_run(3, 2, 1, Some(Conclusion::Success)),
                make_run(4, 2, 2, Some(Conclusion::Success)),
                make_run(5, 4, 2, None),
            ],
        );

        let clock = Arc::new(ManualClock::new());
        let settings = Settings {
            cache_ttl: StdDuration::from_secs(300),
            ..Settings::default()
        };
        let dashboard = Dashboard::with_clock(source.clone(), source.clone(), settings, clock.clone());
        (dashboard, source, clock, repo)
    }

    #[tokio::test]
    async fn test_health_is_cached_until_ttl() {
        let (dashboard, source, clock, repo) = make_dashboard();
        let window = DayWindow::new(date(1), date(2));

        let first = dashboard.health(&repo, window).await.unwrap();
        let second = dashboard.health(&repo, window).await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(source.run_fetches(), 1);

        clock.advance(StdDuration::from_secs(301));
        dashboard.health(&repo, window).await.unwrap();
        assert_eq!(source.run_fetches(), 2);
    }

    #[tokio::test]
    async fn test_windows_are_cached_separately() {
        let (dashboard, source, _clock, repo) = make_dashboard();

        dashboard.health(&repo, DayWindow::single(date(1))).await.unwrap();
        dashboard.health(&repo, DayWindow::single(date(2))).await.unwrap();
        assert_eq!(source.run_fetches(), 2);
    }

    #[tokio::test]
    async fn test_health_records() {
        let (dashboard, _source, _clock, repo) = make_dashboard();
        let report = dashboard
            .health(&repo, DayWindow::new(date(1), date(2)))
            .await
            .unwrap();

        assert_eq!(report.records.len(), 4);
        assert_eq!(report.records[&WorkflowId(1)].status, HealthStatus::Unclassified);
        assert_eq!(report.records[&WorkflowId(1)].transitions.improved, 1);
        assert_eq!(report.records[&WorkflowId(2)].status, HealthStatus::Consistent);
        // Docs never ran; Lint is still running.
        assert_eq!(report.records[&WorkflowId(3)].status, HealthStatus::NoRunsToday);
        assert_eq!(report.records[&WorkflowId(4)].status, HealthStatus::NoRunsToday);
        assert_eq!(report.records[&WorkflowId(4)].running_count, 1);
        assert_eq!(report.workflows[&WorkflowId(2)].file, "deploy.yml");
    }

    #[tokio::test]
    async fn test_source_errors_pass_through_uncached() {
        let (dashboard, source, _clock, repo) = make_dashboard();
        let window = DayWindow::single(date(2));

        source.fail_next(SourceError::Unavailable("maintenance".into()));
        let err = dashboard.health(&repo, window).await.unwrap_err();
        assert!(matches!(err, SourceError::Unavailable(_)));

        let report = dashboard.health(&repo, window).await.unwrap();
        assert!(!report.records.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_repository_is_not_found() {
        let (dashboard, _source, _clock, _repo) = make_dashboard();
        let err = dashboard
            .trigger_graph(&Repository::new("acme", "other"))
            .await
            .unwrap_err();
        assert!(matches!(err, SourceError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_trigger_graph_cached_per_repository() {
        let (dashboard, source, _clock, repo) = make_dashboard();

        let graph = dashboard.trigger_graph(&repo).await.unwrap();
        dashboard.trigger_graph(&repo).await.unwrap();
        assert_eq!(source.workflow_fetches(), 1);
        assert_eq!(
            graph.resolve_dependents("Build"),
            BTreeSet::from(["deploy.yml".to_string(), "docs.yml".to_string()])
        );

        dashboard.invalidate();
        dashboard.trigger_graph(&repo).await.unwrap();
        assert_eq!(source.workflow_fetches(), 2);
    }

    #[tokio::test]
    async fn test_day_over_day() {
        let (dashboard, _source, _clock, repo) = make_dashboard();
        let report = dashboard.day_over_day(&repo, date(2)).await.unwrap();

        assert_eq!(report.counts.improved, 1);
        assert_eq!(report.counts.consistent, 1);
        assert!(report.running.contains(&WorkflowId(4)));
    }

    #[tokio::test]
    async fn test_dependents_health() {
        let (dashboard, _source, _clock, repo) = make_dashboard();
        let window = DayWindow::new(date(1), date(2));

        let dependents = dashboard.dependents_health(&repo, window, "build").await.unwrap();
        assert_eq!(dependents.files.len(), 2);
        assert_eq!(dependents.records["deploy.yml"].status, HealthStatus::Consistent);
        assert_eq!(dependents.records["docs.yml"].status, HealthStatus::NoRunsToday);
        assert!(!dependents.records.contains_key("lint.yml"));
    }

    #[tokio::test]
    async fn test_dependents_health_skips_deleted_workflow_sharing_file() {
        let repo = Repository::new("acme", "app");
        let source = Arc::new(MemorySource::new());
        source.set_workflows(
            &repo,
            vec![
                Workflow::new(1, "Build", ".github/workflows/build.yml").with_content("on: push\n"),
                Workflow::new(2, "Deploy", ".github/workflows/deploy.yml")
                    .with_state(WorkflowState::Deleted),
                Workflow::new(3, "Deploy", ".github/workflows/deploy.yml")
                    .with_content("on:\n  workflow_run:\n    workflows: [Build]\n"),
            ],
        );
        source.add_runs(&repo, [make_run(1, 3, 1, Some(Conclusion::Success))]);
        let dashboard = Dashboard::new(source.clone(), source, Settings::default());

        let dependents = dashboard
            .dependents_health(&repo, DayWindow::single(date(1)), "Build")
            .await
            .unwrap();
        assert_eq!(dependents.files, BTreeSet::from(["deploy.yml".to_string()]));
        let record = &dependents.records["deploy.yml"];
        assert_eq!(record.workflow_id, WorkflowId(3));
        assert_eq!(record.status, HealthStatus::Consistent);
    }

    #[test]
    fn test_record_for_file_prefers_active_workflow() {
        let window = DayWindow::single(date(1));
        let deleted = Workflow::new(5, "Old", ".github/workflows/ci.yml").with_state(WorkflowState::Deleted);
        let active = Workflow::new(6, "CI", ".github/workflows/ci.yml");
        let report = HealthReport {
            window,
            records: BTreeMap::from([
                (WorkflowId(5), classify_window(WorkflowId(5), &[], window, 7)),
                (WorkflowId(6), classify_window(WorkflowId(6), &[], window, 7)),
            ]),
            buckets: Vec::new(),
            workflows: BTreeMap::from([
                (WorkflowId(5), (&deleted).into()),
                (WorkflowId(6), (&active).into()),
            ]),
        };

        assert_eq!(report.record_for_file("ci.yml").unwrap().workflow_id, WorkflowId(6));
        assert!(report.record_for_file("other.yml").is_none());
    }
}
