//! Scheduler configuration.
//!
//! This module provides the initial settings for a [`Scheduler`](super::Scheduler)
//! (concurrency, grouping, tick interval, event buffering) and the value
//! checks shared with the runtime setters.

use std::time::Duration;

use crate::error::{ConfigError, SchedulerError};

/// Default number of dispatch units allowed in flight.
pub const DEFAULT_CONCURRENCY: usize = 1;

/// Default number of tasks per batch in grouped mode.
pub const DEFAULT_GROUP_SIZE: usize = 1;

/// Default period of the re-scheduling tick while running.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(100);

/// Default capacity of the event broadcast channel.
pub const DEFAULT_EVENT_CAPACITY: usize = 1024;

/// Configuration for a scheduler instance.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Name used in log fields and metric labels.
    pub name: String,
    /// Maximum number of in-flight dispatch units.
    pub concurrency: usize,
    /// Whether tasks are bundled into batches.
    pub grouping_enabled: bool,
    /// Number of tasks per batch when grouping is enabled.
    pub group_size: usize,
    /// Period of the safety-net scheduling tick while running.
    pub tick_interval: Duration,
    /// Number of events buffered per subscriber before it lags.
    pub event_capacity: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            concurrency: DEFAULT_CONCURRENCY,
            grouping_enabled: false,
            group_size: DEFAULT_GROUP_SIZE,
            tick_interval: DEFAULT_TICK_INTERVAL,
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

impl SchedulerConfig {
    /// Creates a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `TASKQ_NAME`: Scheduler name (default: default)
    /// - `TASKQ_CONCURRENCY`: Maximum in-flight units, integer >= 0 (default: 1)
    /// - `TASKQ_GROUPING`: Enable grouped dispatch (default: false)
    /// - `TASKQ_GROUP_SIZE`: Tasks per batch, integer >= 1 (default: 1)
    /// - `TASKQ_TICK_INTERVAL_MS`: Re-scheduling tick in milliseconds (default: 100)
    /// - `TASKQ_EVENT_CAPACITY`: Event channel capacity (default: 1024)
    ///
    /// # Errors
    ///
    /// Returns the same error kinds as the runtime setters for concurrency,
    /// group size and the grouping flag, and `SchedulerError::Config` for
    /// everything else.
    pub fn from_env() -> Result<Self, SchedulerError> {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("TASKQ_NAME") {
            config.name = val;
        }

        if let Ok(val) = std::env::var("TASKQ_CONCURRENCY") {
            config.concurrency = parse_concurrency(&val)?;
        }

        if let Ok(val) = std::env::var("TASKQ_GROUPING") {
            config.grouping_enabled = parse_bool("TASKQ_GROUPING", &val)?;
        }

        if let Ok(val) = std::env::var("TASKQ_GROUP_SIZE") {
            config.group_size = parse_group_size(&val)?;
        }

        if let Ok(val) = std::env::var("TASKQ_TICK_INTERVAL_MS") {
            let millis: u64 = parse_env_value(&val, "TASKQ_TICK_INTERVAL_MS")?;
            config.tick_interval = Duration::from_millis(millis);
        }

        if let Ok(val) = std::env::var("TASKQ_EVENT_CAPACITY") {
            config.event_capacity = parse_env_value(&val, "TASKQ_EVENT_CAPACITY")?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationFailed` if any values are invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.is_empty() {
            return Err(ConfigError::ValidationFailed(
                "name cannot be empty".to_string(),
            ));
        }

        if self.group_size == 0 {
            return Err(ConfigError::ValidationFailed(
                "group_size must be greater than 0".to_string(),
            ));
        }

        if self.tick_interval.is_zero() {
            return Err(ConfigError::ValidationFailed(
                "tick_interval must be greater than 0".to_string(),
            ));
        }

        if self.event_capacity == 0 {
            return Err(ConfigError::ValidationFailed(
                "event_capacity must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Sets the scheduler name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the concurrency limit.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Enables or disables grouped dispatch.
    pub fn with_grouping(mut self, enabled: bool) -> Self {
        self.grouping_enabled = enabled;
        self
    }

    /// Sets the group size.
    pub fn with_group_size(mut self, size: usize) -> Self {
        self.group_size = size;
        self
    }

    /// Sets the re-scheduling tick interval.
    pub fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval;
        self
    }

    /// Sets the event channel capacity.
    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }
}

/// Checks a concurrency value: any integer >= 0.
pub fn check_concurrency(value: i64) -> Result<usize, SchedulerError> {
    usize::try_from(value).map_err(|_| SchedulerError::InvalidConcurrency {
        value: value.to_string(),
    })
}

/// Checks a group size value: any integer >= 1.
pub fn check_group_size(value: i64) -> Result<usize, SchedulerError> {
    match usize::try_from(value) {
        Ok(size) if size > 0 => Ok(size),
        _ => Err(SchedulerError::InvalidGroupSize {
            value: value.to_string(),
        }),
    }
}

/// Parses a concurrency value from text.
///
/// Non-integers such as `"1.5"` are rejected the same way as negatives.
pub fn parse_concurrency(value: &str) -> Result<usize, SchedulerError> {
    let parsed: i64 = value
        .trim()
        .parse()
        .map_err(|_| SchedulerError::InvalidConcurrency {
            value: value.to_string(),
        })?;
    check_concurrency(parsed)
}

/// Parses a group size from text.
pub fn parse_group_size(value: &str) -> Result<usize, SchedulerError> {
    let parsed: i64 = value
        .trim()
        .parse()
        .map_err(|_| SchedulerError::InvalidGroupSize {
            value: value.to_string(),
        })?;
    check_group_size(parsed)
}

/// Parses a boolean switch.
pub fn parse_bool(key: &str, value: &str) -> Result<bool, SchedulerError> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(SchedulerError::InvalidArgument {
            key: key.to_string(),
            value: value.to_string(),
        }),
    }
}

/// Parse an environment variable value.
fn parse_env_value<T: std::str::FromStr>(value: &str, key: &str) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        message: format!("could not parse '{}'", value),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SchedulerConfig::default();

        assert_eq!(config.name, "default");
        assert_eq!(config.concurrency, 1);
        assert!(!config.grouping_enabled);
        assert_eq!(config.group_size, 1);
        assert_eq!(config.tick_interval, Duration::from_millis(100));
        assert_eq!(config.event_capacity, 1024);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = SchedulerConfig::new()
            .with_name("ingest")
            .with_concurrency(8)
            .with_grouping(true)
            .with_group_size(25)
            .with_tick_interval(Duration::from_millis(10))
            .with_event_capacity(64);

        assert_eq!(config.name, "ingest");
        assert_eq!(config.concurrency, 8);
        assert!(config.grouping_enabled);
        assert_eq!(config.group_size, 25);
        assert_eq!(config.tick_interval, Duration::from_millis(10));
        assert_eq!(config.event_capacity, 64);
    }

    #[test]
    fn test_validation_rejects_zero_group_size() {
        let config = SchedulerConfig::new().with_group_size(0);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationFailed(_))
        ));
    }

    #[test]
    fn test_validation_rejects_zero_tick() {
        let config = SchedulerConfig::new().with_tick_interval(Duration::ZERO);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_allows_zero_concurrency() {
        let config = SchedulerConfig::new().with_concurrency(0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_check_concurrency() {
        assert_eq!(check_concurrency(0), Ok(0));
        assert_eq!(check_concurrency(12), Ok(12));
        assert!(matches!(
            check_concurrency(-1),
            Err(SchedulerError::InvalidConcurrency { .. })
        ));
    }

    #[test]
    fn test_parse_concurrency_rejects_fractions() {
        assert_eq!(parse_concurrency(" 3 "), Ok(3));
        assert!(matches!(
            parse_concurrency("1.5"),
            Err(SchedulerError::InvalidConcurrency { .. })
        ));
        assert!(matches!(
            parse_concurrency("-1"),
            Err(SchedulerError::InvalidConcurrency { .. })
        ));
        assert!(parse_concurrency("many").is_err());
    }

    #[test]
    fn test_group_size_must_be_positive() {
        assert_eq!(check_group_size(1), Ok(1));
        assert!(matches!(
            check_group_size(0),
            Err(SchedulerError::InvalidGroupSize { .. })
        ));
        assert!(parse_group_size("2.0").is_err());
        assert_eq!(parse_group_size("4"), Ok(4));
    }

    // The only test touching TASKQ_* variables, so it cannot race others.
    #[test]
    fn test_from_env() {
        std::env::set_var("TASKQ_NAME", "env-sched");
        std::env::set_var("TASKQ_CONCURRENCY", "4");
        std::env::set_var("TASKQ_GROUPING", "yes");
        std::env::set_var("TASKQ_GROUP_SIZE", "10");
        std::env::set_var("TASKQ_TICK_INTERVAL_MS", "250");

        let config = SchedulerConfig::from_env().expect("env config should load");
        assert_eq!(config.name, "env-sched");
        assert_eq!(config.concurrency, 4);
        assert!(config.grouping_enabled);
        assert_eq!(config.group_size, 10);
        assert_eq!(config.tick_interval, Duration::from_millis(250));

        std::env::set_var("TASKQ_CONCURRENCY", "1.5");
        assert!(matches!(
            SchedulerConfig::from_env(),
            Err(SchedulerError::InvalidConcurrency { .. })
        ));

        std::env::set_var("TASKQ_CONCURRENCY", "2");
        std::env::set_var("TASKQ_TICK_INTERVAL_MS", "soon");
        assert!(matches!(
            SchedulerConfig::from_env(),
            Err(SchedulerError::Config(ConfigError::InvalidValue { .. }))
        ));

        for key in [
            "TASKQ_NAME",
            "TASKQ_CONCURRENCY",
            "TASKQ_GROUPING",
            "TASKQ_GROUP_SIZE",
            "TASKQ_TICK_INTERVAL_MS",
        ] {
            std::env::remove_var(key);
        }
    }

    #[test]
    fn test_parse_bool() {
        assert_eq!(parse_bool("k", "true"), Ok(true));
        assert_eq!(parse_bool("k", "ON"), Ok(true));
        assert_eq!(parse_bool("k", "0"), Ok(false));
        assert!(matches!(
            parse_bool("k", "maybe"),
            Err(SchedulerError::InvalidArgument { .. })
        ));
    }
}
