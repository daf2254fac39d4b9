//! Runtime configuration
//!
//! Loaded from TOML, overridable through `COHERENCE_*` environment variables.
//! Every field has a default, so an empty file is a valid configuration.

use crate::errors::{CoherenceError, CoherenceResult};
use crate::transitions::DEFAULT_STALENESS_WINDOW;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// Prefix for environment overrides
pub const ENV_PREFIX: &str = "COHERENCE_";

/// Keys accepted by [`CoherenceConfig::set_from_string`]
pub const KEYS: [&str; 6] = [
    "staleness_window_secs",
    "resync_interval_secs",
    "staleness_sweep_interval_secs",
    "metrics_report_interval_secs",
    "recent_activity_capacity",
    "event_buffer",
];

/// Engine, reconciler and metrics configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CoherenceConfig {
    /// Window applied to bounded-staleness records
    pub staleness_window_secs: u64,
    /// Period of the SHARED_MINUS resync sweep
    pub resync_interval_secs: u64,
    /// Period of the staleness sweep
    pub staleness_sweep_interval_secs: u64,
    /// Period of the metrics report; 0 disables it
    pub metrics_report_interval_secs: u64,
    /// Capacity of the recent-transition and activity logs
    pub recent_activity_capacity: usize,
    /// Broadcast buffer for state-change events
    pub event_buffer: usize,
}

impl Default for CoherenceConfig {
    fn default() -> Self {
        Self {
            staleness_window_secs: DEFAULT_STALENESS_WINDOW.as_secs(),
            resync_interval_secs: 10,
            staleness_sweep_interval_secs: 30,
            metrics_report_interval_secs: 60,
            recent_activity_capacity: 50,
            event_buffer: 256,
        }
    }
}

impl CoherenceConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(content: &str) -> CoherenceResult<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| CoherenceError::invalid(format!("Invalid configuration: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file, apply environment overrides, validate
    pub fn load_from_file(path: &Path) -> CoherenceResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            CoherenceError::invalid(format!(
                "Failed to read config file {}: {e}",
                path.display()
            ))
        })?;
        let mut config: Self = toml::from_str(&content)
            .map_err(|e| CoherenceError::invalid(format!("Invalid configuration: {e}")))?;
        config.merge_with_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `COHERENCE_<FIELD>` overrides from the process environment
    pub fn merge_with_env(&mut self) -> CoherenceResult<()> {
        self.merge_with_vars(std::env::vars())
    }

    /// Apply overrides from an explicit variable list.
    ///
    /// Prefixed variables that name no configuration key are skipped; a known
    /// key with an unparsable value is an error.
    pub fn merge_with_vars(
        &mut self,
        vars: impl IntoIterator<Item = (String, String)>,
    ) -> CoherenceResult<()> {
        for (key, value) in vars {
            let Some(field) = key.strip_prefix(ENV_PREFIX) else {
                continue;
            };
            let field = field.to_ascii_lowercase();
            if !KEYS.contains(&field.as_str()) {
                debug!(variable = %key, "Ignoring environment variable that is not a config key");
                continue;
            }
            self.set_from_string(&field, &value)?;
        }
        Ok(())
    }

    /// Set one field by name
    pub fn set_from_string(&mut self, key: &str, value: &str) -> CoherenceResult<()> {
        fn parse<T: std::str::FromStr>(key: &str, value: &str) -> CoherenceResult<T> {
            value
                .trim()
                .parse()
                .map_err(|_| CoherenceError::invalid(format!("{key}: not a number: {value}")))
        }

        match key {
            "staleness_window_secs" => self.staleness_window_secs = parse(key, value)?,
            "resync_interval_secs" => self.resync_interval_secs = parse(key, value)?,
            "staleness_sweep_interval_secs" => {
                self.staleness_sweep_interval_secs = parse(key, value)?;
            }
            "metrics_report_interval_secs" => {
                self.metrics_report_interval_secs = parse(key, value)?;
            }
            "recent_activity_capacity" => self.recent_activity_capacity = parse(key, value)?,
            "event_buffer" => self.event_buffer = parse(key, value)?,
            other => {
                return Err(CoherenceError::invalid(format!(
                    "Unknown configuration key: {other}"
                )))
            }
        }
        Ok(())
    }

    /// Reject zero periods and capacities
    pub fn validate(&self) -> CoherenceResult<()> {
        let positive = [
            ("staleness_window_secs", self.staleness_window_secs),
            ("resync_interval_secs", self.resync_interval_secs),
            (
                "staleness_sweep_interval_secs",
                self.staleness_sweep_interval_secs,
            ),
            ("recent_activity_capacity", self.recent_activity_capacity as u64),
            ("event_buffer", self.event_buffer as u64),
        ];
        for (name, value) in positive {
            if value == 0 {
                return Err(CoherenceError::invalid(format!("{name} must be positive")));
            }
        }
        Ok(())
    }

    /// Staleness window as a duration
    pub fn staleness_window(&self) -> Duration {
        Duration::from_secs(self.staleness_window_secs)
    }

    /// Resync sweep period
    pub fn resync_interval(&self) -> Duration {
        Duration::from_secs(self.resync_interval_secs)
    }

    /// Staleness sweep period
    pub fn staleness_sweep_interval(&self) -> Duration {
        Duration::from_secs(self.staleness_sweep_interval_secs)
    }

    /// Metrics report period, if enabled
    pub fn metrics_report_interval(&self) -> Option<Duration> {
        (self.metrics_report_interval_secs > 0)
            .then_some(Duration::from_secs(self.metrics_report_interval_secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::io::Write;

    #[test]
    fn empty_document_yields_defaults() {
        let config = CoherenceConfig::from_toml_str("").unwrap();
        assert_eq!(config, CoherenceConfig::default());
        assert_eq!(config.staleness_window(), Duration::from_secs(30));
        assert_eq!(config.recent_activity_capacity, 50);
    }

    #[test]
    fn partial_document_overrides_fields() {
        let config = CoherenceConfig::from_toml_str("resync_interval_secs = 2\n").unwrap();
        assert_eq!(config.resync_interval(), Duration::from_secs(2));
        assert_eq!(config.staleness_sweep_interval(), Duration::from_secs(30));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = CoherenceConfig::from_toml_str("resync = 2\n").unwrap_err();
        assert_matches!(err, CoherenceError::Invalid { .. });
    }

    #[test]
    fn zero_interval_fails_validation() {
        let err = CoherenceConfig::from_toml_str("resync_interval_secs = 0\n").unwrap_err();
        assert!(err.to_string().contains("resync_interval_secs"));
    }

    #[test]
    fn zero_report_interval_disables_reporting() {
        let config =
            CoherenceConfig::from_toml_str("metrics_report_interval_secs = 0\n").unwrap();
        assert!(config.metrics_report_interval().is_none());
    }

    #[test]
    fn env_style_overrides_apply() {
        let mut config = CoherenceConfig::default();
        config
            .merge_with_vars(vec![
                ("COHERENCE_STALENESS_WINDOW_SECS".to_string(), "5".to_string()),
                ("PATH".to_string(), "/bin".to_string()),
            ])
            .unwrap();
        assert_eq!(config.staleness_window_secs, 5);

        let err = config
            .merge_with_vars(vec![("COHERENCE_EVENT_BUFFER".to_string(), "lots".to_string())])
            .unwrap_err();
        assert_matches!(err, CoherenceError::Invalid { .. });
    }

    #[test]
    fn unrelated_prefixed_variables_are_ignored() {
        let mut config = CoherenceConfig::default();
        config
            .merge_with_vars(vec![
                ("COHERENCE_LOG".to_string(), "debug".to_string()),
                ("COHERENCE_RESYNC_INTERVAL_SECS".to_string(), "4".to_string()),
            ])
            .unwrap();
        assert_eq!(config.resync_interval_secs, 4);
        assert_eq!(config.event_buffer, CoherenceConfig::default().event_buffer);
    }

    #[test]
    fn set_from_string_still_rejects_unknown_keys() {
        let mut config = CoherenceConfig::default();
        let err = config.set_from_string("log", "debug").unwrap_err();
        assert_matches!(err, CoherenceError::Invalid { .. });
    }

    #[test]
    fn load_from_file_reads_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "staleness_sweep_interval_secs = 7").unwrap();
        let config = CoherenceConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.staleness_sweep_interval_secs, 7);
    }
}
