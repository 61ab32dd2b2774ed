//! Collapse raw runs into one logical record per workflow per day.

use std::collections::BTreeMap;

use chrono::{FixedOffset, NaiveDate};
use runwatch_types::{Run, WorkflowId};
use serde::Serialize;

use super::window::day_of;

/// The state of one workflow on one calendar day.
///
/// `latest` is the most recently *started* run of the day, regardless of
/// whether it has finished. Every other run of the day is kept in
/// `earlier`, most recent first, so drill-down views see the full history.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyBucket {
    pub day: NaiveDate,
    pub workflow_id: WorkflowId,
    pub latest: Run,
    /// Number of runs that started on this day (`1 + earlier.len()`).
    pub count: usize,
    pub earlier: Vec<Run>,
}

impl DailyBucket {
    fn start(day: NaiveDate, run: Run) -> Self {
        Self {
            day,
            workflow_id: run.workflow_id,
            latest: run,
            count: 1,
            earlier: Vec::new(),
        }
    }

    fn push_earlier(&mut self, run: Run) {
        self.earlier.push(run);
        self.count += 1;
    }

    /// All runs of the day, most recent first.
    pub fn runs(&self) -> impl Iterator<Item = &Run> {
        std::iter::once(&self.latest).chain(self.earlier.iter())
    }
}

/// Normalize runs into daily buckets.
///
/// Runs are bucketed by the calendar day their `started_at` falls on in
/// `offset`. The result is ordered by day, then workflow id.
pub fn normalize(runs: &[Run], offset: &FixedOffset) -> Vec<DailyBucket> {
    let mut sorted: Vec<&Run> = runs.iter().collect();
    // Most recent first; equal start times fall back to the higher run id.
    sorted.sort_by(|a, b| {
        b.started_at
            .cmp(&a.started_at)
            .then_with(|| b.id.cmp(&a.id))
    });

    let mut buckets: BTreeMap<(NaiveDate, WorkflowId), DailyBucket> = BTreeMap::new();
    for run in sorted {
        let day = day_of(&run.started_at, offset);
        match buckets.get_mut(&(day, run.workflow_id)) {
            Some(bucket) => bucket.push_earlier(run.clone()),
            None => {
                buckets.insert((day, run.workflow_id), DailyBucket::start(day, run.clone()));
            }
        }
    }

    buckets.into_values().collect()
}

/// Group buckets by workflow, each list in ascending day order.
pub fn group_by_workflow(buckets: &[DailyBucket]) -> BTreeMap<WorkflowId, Vec<&DailyBucket>> {
    let mut grouped: BTreeMap<WorkflowId, Vec<&DailyBucket>> = BTreeMap::new();
    for bucket in buckets {
        grouped.entry(bucket.workflow_id).or_default().push(bucket);
    }
    for history in grouped.values_mut() {
        history.sort_by_key(|b| b.day);
    }
    grouped
}

/// Buckets that fall on a specific day.
pub fn buckets_on(buckets: &[DailyBucket], day: NaiveDate) -> impl Iterator<Item = &DailyBucket> {
    buckets.iter().filter(move |b| b.day == day)
}
