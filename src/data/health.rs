//! Health classification of workflows over daily buckets.
//!
//! Two views are computed from the same per-day records:
//!
//! - **day-over-day transitions**: every pair of consecutive calendar days
//!   with a finished bucket on both sides increments exactly one of four
//!   counters;
//! - **window classification**: pass/fail totals over an N-day window, with
//!   the most recent sub-window deciding whether a mostly-passing workflow
//!   counts as `consistent`.
//!
//! A bucket whose latest run is still running takes part in neither.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{Duration, NaiveDate};
use runwatch_types::WorkflowId;
use serde::Serialize;

use super::normalize::{buckets_on, group_by_workflow, DailyBucket};
use super::window::DayWindow;

/// Default length of the recent sub-window used to detect `consistent`.
pub const DEFAULT_RECENT_DAYS: u32 = 7;

/// Default length of the classification window.
pub const DEFAULT_WINDOW_DAYS: u32 = 30;

/// Outcome of a single daily bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Passed,
    Failed,
    Running,
}

impl Outcome {
    /// Outcome of a bucket, taken from its most recently started run.
    pub fn of(bucket: &DailyBucket) -> Self {
        let latest = &bucket.latest;
        match latest.conclusion {
            Some(c) if c.is_success() => Outcome::Passed,
            None if !latest.status.is_terminal() => Outcome::Running,
            _ => Outcome::Failed,
        }
    }
}

/// The change between two consecutive finished days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Transition {
    /// passed -> passed
    Consistent,
    /// failed -> passed
    Improved,
    /// passed -> failed
    Regressed,
    /// failed -> failed
    StillFailing,
}

impl Transition {
    /// The transition from `prev` to `curr`, or `None` if either is running.
    pub fn between(prev: Outcome, curr: Outcome) -> Option<Self> {
        match (prev, curr) {
            (Outcome::Passed, Outcome::Passed) => Some(Transition::Consistent),
            (Outcome::Failed, Outcome::Passed) => Some(Transition::Improved),
            (Outcome::Passed, Outcome::Failed) => Some(Transition::Regressed),
            (Outcome::Failed, Outcome::Failed) => Some(Transition::StillFailing),
            (Outcome::Running, _) | (_, Outcome::Running) => None,
        }
    }
}

/// Counts of day-over-day transitions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TransitionCounts {
    pub consistent: u32,
    pub improved: u32,
    pub regressed: u32,
    pub still_failing: u32,
}

impl TransitionCounts {
    pub fn record(&mut self, transition: Transition) {
        match transition {
            Transition::Consistent => self.consistent += 1,
            Transition::Improved => self.improved += 1,
            Transition::Regressed => self.regressed += 1,
            Transition::StillFailing => self.still_failing += 1,
        }
    }

    pub fn total(&self) -> u32 {
        self.consistent + self.improved + self.regressed + self.still_failing
    }
}

/// Window-level health of a workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Consistent,
    Improved,
    Regressed,
    StillFailing,
    /// No finished runs at all in the window.
    NoRunsToday,
    /// Equal pass and fail counts: no trend either way.
    Unclassified,
}

impl HealthStatus {
    /// Returns a short label for display.
    pub fn label(&self) -> &'static str {
        match self {
            HealthStatus::Consistent => "consistent",
            HealthStatus::Improved => "improved",
            HealthStatus::Regressed => "regressed",
            HealthStatus::StillFailing => "still failing",
            HealthStatus::NoRunsToday => "no runs",
            HealthStatus::Unclassified => "no trend",
        }
    }
}

/// Health of one workflow over one window, with the raw counts behind it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthRecord {
    pub workflow_id: WorkflowId,
    pub window: DayWindow,
    pub status: HealthStatus,
    pub pass_count: u32,
    pub fail_count: u32,
    /// Buckets excluded because their latest run had not finished.
    pub running_count: u32,
    pub recent_pass_count: u32,
    pub recent_fail_count: u32,
    pub transitions: TransitionCounts,
    /// Outcome of the most recent bucket in the window.
    pub latest: Option<Outcome>,
}

impl HealthRecord {
    /// Share of finished days that passed, as a percentage.
    pub fn pass_rate(&self) -> Option<f64> {
        let total = self.pass_count + self.fail_count;
        (total > 0).then(|| f64::from(self.pass_count) * 100.0 / f64::from(total))
    }
}

/// Count day-over-day transitions in one workflow's history.
///
/// `history` must hold a single workflow's buckets in ascending day order.
/// Only buckets on consecutive calendar days are compared; a gap or a
/// running bucket on either side yields no transition.
pub fn transitions(history: &[&DailyBucket]) -> TransitionCounts {
    let mut counts = TransitionCounts::default();
    for pair in history.windows(2) {
        let (prev, curr) = (pair[0], pair[1]);
        if curr.day - prev.day != Duration::days(1) {
            continue;
        }
        if let Some(t) = Transition::between(Outcome::of(prev), Outcome::of(curr)) {
            counts.record(t);
        }
    }
    counts
}

/// Decide a window status from its counts.
///
/// A recent sub-window without failures marks a mostly-passing workflow
/// `consistent` regardless of failures earlier in the window.
pub fn classify_counts(pass: u32, fail: u32, recent_pass: u32, recent_fail: u32) -> HealthStatus {
    if fail > 0 && pass == 0 {
        HealthStatus::StillFailing
    } else if pass > fail && recent_fail == 0 && recent_pass >= 1 {
        HealthStatus::Consistent
    } else if pass > fail {
        HealthStatus::Improved
    } else if fail > pass {
        HealthStatus::Regressed
    } else if pass + fail == 0 {
        HealthStatus::NoRunsToday
    } else {
        HealthStatus::Unclassified
    }
}

/// Classify one workflow's history over `window`.
///
/// Buckets outside the window are ignored. The recent sub-window is the
/// last `recent_days` days of `window`.
pub fn classify_window(
    workflow_id: WorkflowId,
    history: &[&DailyBucket],
    window: DayWindow,
    recent_days: u32,
) -> HealthRecord {
    let recent = window.recent(recent_days);
    let in_window: Vec<&DailyBucket> = history
        .iter()
        .copied()
        .filter(|b| window.contains(b.day))
        .collect();

    let (mut pass, mut fail, mut running) = (0, 0, 0);
    let (mut recent_pass, mut recent_fail) = (0, 0);
    for bucket in &in_window {
        let is_recent = recent.contains(bucket.day);
        match Outcome::of(bucket) {
            Outcome::Passed => {
                pass += 1;
                if is_recent {
                    recent_pass += 1;
                }
            }
            Outcome::Failed => {
                fail += 1;
                if is_recent {
                    recent_fail += 1;
                }
            }
            Outcome::Running => running += 1,
        }
    }

    HealthRecord {
        workflow_id,
        window,
        status: classify_counts(pass, fail, recent_pass, recent_fail),
        pass_count: pass,
        fail_count: fail,
        running_count: running,
        recent_pass_count: recent_pass,
        recent_fail_count: recent_fail,
        transitions: transitions(&in_window),
        latest: in_window.iter().max_by_key(|b| b.day).map(|b| Outcome::of(b)),
    }
}

/// Window and sub-window lengths for classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthClassifier {
    pub window_days: u32,
    pub recent_days: u32,
}

impl Default for HealthClassifier {
    fn default() -> Self {
        Self {
            window_days: DEFAULT_WINDOW_DAYS,
            recent_days: DEFAULT_RECENT_DAYS,
        }
    }
}

impl HealthClassifier {
    pub fn new(window_days: u32, recent_days: u32) -> Self {
        Self {
            window_days,
            recent_days,
        }
    }

    /// The window this classifier evaluates when it ends on `end`.
    pub fn window_ending(&self, end: NaiveDate) -> DayWindow {
        DayWindow::ending(end, self.window_days)
    }

    /// Classify one workflow's history over the window ending on `end`.
    pub fn classify(
        &self,
        workflow_id: WorkflowId,
        history: &[&DailyBucket],
        end: NaiveDate,
    ) -> HealthRecord {
        classify_window(workflow_id, history, self.window_ending(end), self.recent_days)
    }

    /// Classify every workflow present in `buckets` over `window`.
    pub fn classify_all(
        &self,
        buckets: &[DailyBucket],
        window: DayWindow,
    ) -> BTreeMap<WorkflowId, HealthRecord> {
        group_by_workflow(buckets)
            .into_iter()
            .map(|(id, history)| (id, classify_window(id, &history, window, self.recent_days)))
            .collect()
    }
}

/// Comparison of every workflow between `today` and the day before.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DayOverDay {
    pub today: NaiveDate,
    pub counts: TransitionCounts,
    pub per_workflow: BTreeMap<WorkflowId, Transition>,
    /// Workflows that ran yesterday but have no bucket today.
    pub no_runs_today: BTreeSet<WorkflowId>,
    /// Workflows whose latest run today has not finished.
    pub running: BTreeSet<WorkflowId>,
}

/// Compare `today` with the previous day across all workflows in `buckets`.
pub fn compare_days(buckets: &[DailyBucket], today: NaiveDate) -> DayOverDay {
    let before = by_workflow_on(buckets, today - Duration::days(1));
    let after = by_workflow_on(buckets, today);

    let mut report = DayOverDay {
        today,
        counts: TransitionCounts::default(),
        per_workflow: BTreeMap::new(),
        no_runs_today: BTreeSet::new(),
        running: BTreeSet::new(),
    };

    for (id, bucket) in &after {
        let outcome = Outcome::of(bucket);
        if outcome == Outcome::Running {
            report.running.insert(*id);
            continue;
        }
        let Some(prev) = before.get(id) else {
            continue;
        };
        if let Some(t) = Transition::between(Outcome::of(prev), outcome) {
            report.counts.record(t);
            report.per_workflow.insert(*id, t);
        }
    }
    report.no_runs_today = before
        .keys()
        .filter(|id| !after.contains_key(id))
        .copied()
        .collect();

    report
}

fn by_workflow_on(buckets: &[DailyBucket], day: NaiveDate) -> BTreeMap<WorkflowId, &DailyBucket> {
    buckets_on(buckets, day)
        .map(|b| (b.workflow_id, b))
        .collect()
}
