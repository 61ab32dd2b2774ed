//! # runwatch
//!
//! Trigger graphs and health classification for CI workflow runs.
//!
//! This crate takes the run records and workflow configuration files of a
//! repository and derives two views: which workflows trigger which (inferred
//! purely from configuration text), and how healthy each workflow has been
//! over a window of calendar days.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                          Dashboard                           │
//! │  ┌─────────┐    ┌──────────────────────────┐    ┌─────────┐  │
//! │  │ source  │───▶│           data           │───▶│  cache  │  │
//! │  │ (input) │    │ normalize · graph ·      │    │  (TTL)  │  │
//! │  └────┬────┘    │ health · window          │    └─────────┘  │
//! │       │         └──────────────────────────┘                 │
//! │       ▼                                                      │
//! │  FileSource | MemorySource | your provider client            │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! - **[`source`]**: Collaborator traits ([`RunSource`], [`WorkflowSource`]) with
//!   a directory-backed and an in-memory implementation
//! - **[`data`]**: Pure computations - daily buckets, the trigger graph and
//!   health classification
//! - **[`cache`]**: A TTL cache with an injectable clock
//! - **[`dashboard`]**: The aggregator wiring all of the above together
//! - **[`config`]**: Layered settings (file, environment)
//! - **[`report`]**: JSON export of results
//!
//! ## Usage
//!
//! ### As a CLI tool
//!
//! ```bash
//! # Which workflows does "Build" trigger?
//! runwatch --data-dir ./data dependents acme/app Build
//!
//! # Health over the last 30 days, written to a file
//! runwatch --data-dir ./data health acme/app --export health.json
//! ```
//!
//! ### As a library
//!
//! ```
//! use std::sync::Arc;
//! use runwatch::{Dashboard, MemorySource, Settings};
//! use runwatch::data::HealthStatus;
//! use runwatch_types::{Conclusion, Repository, Run, Workflow, WorkflowId};
//!
//! # tokio_test::block_on(async {
//! let repo = Repository::new("acme", "app");
//! let source = Arc::new(MemorySource::new());
//! source.set_workflows(&repo, vec![Workflow::new(1, "Build", ".github/workflows/build.yml")]);
//! source.add_runs(&repo, [Run::builder(10, WorkflowId(1))
//!     .started_at("2024-03-01T09:00:00Z".parse().unwrap())
//!     .completed(Conclusion::Success)
//!     .build()]);
//!
//! let dashboard = Dashboard::new(source.clone(), source, Settings::default());
//! let day = chrono::NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
//! let report = dashboard.health(&repo, dashboard.window_ending(day)).await.unwrap();
//! assert_eq!(report.records[&WorkflowId(1)].status, HealthStatus::Consistent);
//! # });
//! ```

pub mod cache;
pub mod config;
pub mod dashboard;
pub mod data;
pub mod error;
pub mod report;
pub mod source;

// Re-export main types for convenience
pub use cache::{Clock, ManualClock, SystemClock, TtlCache};
pub use crate::config::Settings;
pub use dashboard::{Dashboard, DependentsHealth, HealthReport};
pub use data::{DayWindow, HealthRecord, HealthStatus, TriggerGraph};
pub use error::{ConfigError, SourceError};
pub use source::{FileSource, MemorySource, RunSource, WorkflowSource};
