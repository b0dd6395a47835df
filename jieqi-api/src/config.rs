//! Service configuration: an optional TOML file, overridden by CLI flags.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use jieqi_core::{CalibrationConfig, SearchLimits};
use jieqi_engine::EngineConfig;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid config {path}: {reason}")]
    Invalid { path: String, reason: String },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub bind: String,
    pub default_depth: u8,
    pub max_depth: u8,
    pub default_time_budget_ms: u64,
    pub max_time_budget_ms: u64,
    pub engine: EngineConfig,
    pub calibration: CalibrationConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        ServiceConfig {
            bind: "0.0.0.0:8000".to_string(),
            default_depth: 6,
            max_depth: 12,
            default_time_budget_ms: 3000,
            max_time_budget_ms: 10_000,
            engine: EngineConfig::default(),
            calibration: CalibrationConfig::default(),
        }
    }
}

impl ServiceConfig {
    pub fn from_toml(text: &str, path: &str) -> Result<ServiceConfig, ConfigError> {
        let config: ServiceConfig = toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: path.to_string(),
            source,
        })?;
        config.calibration.validate().map_err(|reason| ConfigError::Invalid {
            path: path.to_string(),
            reason,
        })?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<ServiceConfig, ConfigError> {
        let shown = path.display().to_string();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: shown.clone(),
            source,
        })?;
        ServiceConfig::from_toml(&text, &shown)
    }

    /// Search limits for one request. Client values are clamped to the
    /// configured ceilings; depth is at least 1 and a negative budget is 0.
    pub fn limits(&self, depth: Option<i64>, time_budget_ms: Option<i64>) -> SearchLimits {
        let max_depth = self.max_depth.max(1);
        let depth = depth
            .unwrap_or(i64::from(self.default_depth))
            .clamp(1, i64::from(max_depth));
        let depth = u8::try_from(depth).unwrap_or(max_depth);
        let budget = match time_budget_ms {
            Some(ms) => u64::try_from(ms).unwrap_or(0),
            None => self.default_time_budget_ms,
        }
        .min(self.max_time_budget_ms);
        SearchLimits {
            max_depth: depth,
            time_budget: Duration::from_millis(budget),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let text = r#"
            bind = "127.0.0.1:9000"
            max_depth = 8

            [engine]
            tt_mb = 4

            [calibration]
            decisive_threshold = 300
        "#;
        let config = ServiceConfig::from_toml(text, "test.toml").unwrap();
        assert_eq!(config.bind, "127.0.0.1:9000");
        assert_eq!(config.max_depth, 8);
        assert_eq!(config.default_depth, 6);
        assert_eq!(config.engine.tt_mb, 4);
        assert_eq!(config.calibration.decisive_threshold, 300);
        assert_eq!(config.calibration.slight_threshold, 50);
    }

    #[test]
    fn test_bad_toml_is_reported() {
        let err = ServiceConfig::from_toml("max_depth = \"deep\"", "bad.toml").unwrap_err();
        assert!(err.to_string().starts_with("invalid config bad.toml"));
    }

    #[test]
    fn test_inverted_percent_band_is_rejected() {
        let text = r#"
            [calibration]
            percent_floor = 95.0
            percent_ceiling = 5.0
        "#;
        let err = ServiceConfig::from_toml(text, "band.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
        assert!(err.to_string().contains("percent_floor"));

        let text = "[calibration]\nsquash_scale = nan\n";
        let err = ServiceConfig::from_toml(text, "nan.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn test_missing_file() {
        let err = ServiceConfig::load(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_limits_are_clamped() {
        let config = ServiceConfig::default();
        let limits = config.limits(None, None);
        assert_eq!(limits.max_depth, 6);
        assert_eq!(limits.time_budget, Duration::from_millis(3000));

        let limits = config.limits(Some(40), Some(60_000));
        assert_eq!(limits.max_depth, 12);
        assert_eq!(limits.time_budget, Duration::from_millis(10_000));

        assert_eq!(config.limits(Some(0), None).max_depth, 1);
    }

    #[test]
    fn test_limits_accept_out_of_range_values() {
        let config = ServiceConfig::default();
        assert_eq!(config.limits(Some(300), None).max_depth, 12);
        assert_eq!(config.limits(Some(-5), None).max_depth, 1);
        assert_eq!(config.limits(None, Some(-1)).time_budget, Duration::ZERO);
        assert_eq!(
            config.limits(None, Some(i64::MAX)).time_budget,
            Duration::from_millis(10_000)
        );
    }
}
