//! # runwatch-types
//!
//! Core types for CI workflow monitoring. This crate defines the normalized
//! records that a CI provider collaborator hands to the runwatch core: runs,
//! workflows and the repository they belong to.
//!
//! ## Design Goals
//!
//! - **Provider agnostic**: Fields cover what every CI provider reports for a
//!   run (start time, status, conclusion), nothing more
//! - **Optional serialization**: Enable the `serde` feature for JSON input/output
//! - **Immutable snapshots**: A `Run` is a point-in-time copy of provider state;
//!   nothing in runwatch mutates one after ingestion
//!
//! ## Features
//!
//! - `serde`: JSON/YAML/etc. serialization via serde
//!
//! ## Example
//!
//! ```rust
//! use chrono::{TimeZone, Utc};
//! use runwatch_types::{Conclusion, Run, RunStatus, WorkflowId};
//!
//! let started = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();
//! let run = Run::builder(42, WorkflowId(7))
//!     .started_at(started)
//!     .completed(Conclusion::Success)
//!     .build();
//!
//! assert_eq!(run.status, RunStatus::Completed);
//! assert!(run.is_well_formed());
//! ```

mod repository;
mod run;
mod workflow;

pub use repository::*;
pub use run::*;
pub use workflow::*;
