//! Layered settings.
//!
//! Values come from, in increasing precedence: built-in defaults, an
//! optional TOML file, and `RUNWATCH_*` environment variables. The binary
//! applies its command-line overrides on top of the result.
//!
//! ```toml
//! data_dir = "/var/lib/runwatch"
//! utc_offset = "+00:00"
//! window_days = 30
//! recent_days = 7
//! cache_ttl = "5m"
//! log_level = "info"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{FixedOffset, Offset, Utc};
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, Environment, File};
use serde::Deserialize;

use crate::data::duration::parse_duration;
use crate::data::health::{DEFAULT_RECENT_DAYS, DEFAULT_WINDOW_DAYS};
use crate::data::HealthClassifier;
use crate::error::ConfigError;

/// Prefix of environment variables read by [`Settings::load`].
pub const ENV_PREFIX: &str = "RUNWATCH";

/// Settings as written in files and the environment.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
struct RawSettings {
    data_dir: PathBuf,
    utc_offset: String,
    window_days: u32,
    recent_days: u32,
    cache_ttl: String,
    log_level: String,
}

impl Default for RawSettings {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            utc_offset: "+00:00".to_string(),
            window_days: DEFAULT_WINDOW_DAYS,
            recent_days: DEFAULT_RECENT_DAYS,
            cache_ttl: "5m".to_string(),
            log_level: "info".to_string(),
        }
    }
}

/// Validated settings.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    /// Root of the directory read by [`crate::FileSource`].
    pub data_dir: PathBuf,
    /// Offset in which calendar days are evaluated.
    pub utc_offset: FixedOffset,
    pub window_days: u32,
    pub recent_days: u32,
    pub cache_ttl: Duration,
    pub log_level: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            utc_offset: Utc.fix(),
            window_days: DEFAULT_WINDOW_DAYS,
            recent_days: DEFAULT_RECENT_DAYS,
            cache_ttl: Duration::from_secs(300),
            log_level: "info".to_string(),
        }
    }
}

impl Settings {
    /// Load settings from an optional file and the environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path));
        }
        builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true));
        Self::from_builder(builder)
    }

    fn from_builder(builder: ConfigBuilder<DefaultState>) -> Result<Self, ConfigError> {
        let raw: RawSettings = builder.build()?.try_deserialize()?;
        Self::try_from(raw)
    }

    /// A classifier using the configured window lengths.
    pub fn classifier(&self) -> HealthClassifier {
        HealthClassifier::new(self.window_days, self.recent_days)
    }
}

impl TryFrom<RawSettings> for Settings {
    type Error = ConfigError;

    fn try_from(raw: RawSettings) -> Result<Self, Self::Error> {
        let utc_offset = parse_offset(&raw.utc_offset)?;
        let cache_ttl = parse_duration(&raw.cache_ttl).map_err(|e| ConfigError::InvalidTtl {
            value: raw.cache_ttl.clone(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            data_dir: raw.data_dir,
            utc_offset,
            window_days: raw.window_days.max(1),
            recent_days: raw.recent_days.max(1),
            cache_ttl,
            log_level: raw.log_level,
        })
    }
}

/// Parse an offset such as `"+02:00"` or `"Z"`.
pub fn parse_offset(s: &str) -> Result<FixedOffset, ConfigError> {
    let s = s.trim();
    if s.eq_ignore_ascii_case("z") || s.eq_ignore_ascii_case("utc") {
        return Ok(Utc.fix());
    }
    s.parse::<FixedOffset>()
        .map_err(|_| ConfigError::InvalidOffset(s.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::FileFormat;

    fn from_toml(toml: &str) -> Result<Settings, ConfigError> {
        Settings::from_builder(Config::builder().add_source(File::from_str(toml, FileFormat::Toml)))
    }

    #[test]
    fn test_defaults() {
        let settings = from_toml("").unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.classifier(), HealthClassifier::default());
    }

    #[test]
    fn test_file_values() {
        let settings = from_toml(
            r#"
data_dir = "/srv/ci"
utc_offset = "-05:00"
window_days = 14
cache_ttl = "90s"
"#,
        )
        .unwrap();

        assert_eq!(settings.data_dir, PathBuf::from("/srv/ci"));
        assert_eq!(settings.utc_offset.local_minus_utc(), -5 * 3600);
        assert_eq!(settings.window_days, 14);
        assert_eq!(settings.recent_days, DEFAULT_RECENT_DAYS);
        assert_eq!(settings.cache_ttl, Duration::from_secs(90));
    }

    #[test]
    fn test_zero_windows_are_raised() {
        let settings = from_toml("window_days = 0\nrecent_days = 0\n").unwrap();
        assert_eq!(settings.window_days, 1);
        assert_eq!(settings.recent_days, 1);
    }

    #[test]
    fn test_invalid_offset() {
        let err = from_toml("utc_offset = \"somewhere\"").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidOffset(_)));
    }

    #[test]
    fn test_invalid_ttl() {
        let err = from_toml("cache_ttl = \"forever\"").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidTtl { .. }));
    }

    #[test]
    fn test_later_sources_override() {
        let settings = Settings::from_builder(
            Config::builder()
                .add_source(File::from_str("window_days = 14", FileFormat::Toml))
                .add_source(File::from_str("window_days = 21", FileFormat::Toml)),
        )
        .unwrap();
        assert_eq!(settings.window_days, 21);
    }

    #[test]
    fn test_parse_offset_forms() {
        assert_eq!(parse_offset("Z").unwrap().local_minus_utc(), 0);
        assert_eq!(parse_offset("+02:00").unwrap().local_minus_utc(), 7200);
        assert!(parse_offset("+25:00").is_err());
    }
}
