//! Error types for the library.

use std::time::Duration;

use thiserror::Error;

/// Errors reported by run and workflow sources.
///
/// An empty result is never an error: a source with no runs in range
/// returns `Ok(vec![])`.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The provider asked us to back off.
    #[error("Rate limited{}", retry_hint(.retry_after))]
    RateLimited { retry_after: Option<Duration> },

    /// The repository is not known to the source.
    #[error("Repository not found: {0}")]
    NotFound(String),

    /// Credentials or permissions do not allow access.
    #[error("Access denied: {0}")]
    AccessDenied(String),

    /// The source is temporarily unreachable.
    #[error("Source unavailable: {0}")]
    Unavailable(String),

    /// Reading local data failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Data was read but could not be decoded.
    #[error("Failed to decode {what}: {reason}")]
    Decode { what: String, reason: String },
}

impl SourceError {
    pub fn decode(what: impl Into<String>, reason: impl ToString) -> Self {
        SourceError::Decode {
            what: what.into(),
            reason: reason.to_string(),
        }
    }

    /// Whether retrying the same request later may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            SourceError::RateLimited { .. } | SourceError::Unavailable(_)
        )
    }
}

fn retry_hint(retry_after: &Option<Duration>) -> String {
    match retry_after {
        Some(d) => format!(", retry after {}s", d.as_secs()),
        None => String::new(),
    }
}

/// Errors produced while loading settings.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Invalid UTC offset '{0}' (expected e.g. \"+02:00\")")]
    InvalidOffset(String),

    #[error("Invalid cache TTL '{value}': {reason}")]
    InvalidTtl { value: String, reason: String },
}
