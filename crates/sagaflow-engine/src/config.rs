use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;

const DEFAULT_STEP_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_COMPENSATION_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_BACKOFF_BASE: Duration = Duration::from_secs(1);
const DEFAULT_BACKOFF_MAX: Duration = Duration::from_secs(10);

/// Timing defaults applied when neither the step, the call options nor the
/// definition supply a value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    step_timeout: Duration,
    compensation_timeout: Duration,
    retry_backoff_base: Duration,
    retry_backoff_max: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            step_timeout: DEFAULT_STEP_TIMEOUT,
            compensation_timeout: DEFAULT_COMPENSATION_TIMEOUT,
            retry_backoff_base: DEFAULT_BACKOFF_BASE,
            retry_backoff_max: DEFAULT_BACKOFF_MAX,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct EngineSection {
    step_timeout_ms: Option<u64>,
    compensation_timeout_ms: Option<u64>,
    retry_backoff_base_ms: Option<u64>,
    retry_backoff_max_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    engine: EngineSection,
}

impl EngineConfig {
    #[must_use]
    pub fn step_timeout(&self) -> Duration {
        self.step_timeout
    }

    #[must_use]
    pub fn compensation_timeout(&self) -> Duration {
        self.compensation_timeout
    }

    #[must_use]
    pub fn retry_backoff_base(&self) -> Duration {
        self.retry_backoff_base
    }

    #[must_use]
    pub fn retry_backoff_max(&self) -> Duration {
        self.retry_backoff_max
    }

    #[must_use]
    pub fn with_step_timeout(mut self, timeout: Duration) -> Self {
        self.step_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_compensation_timeout(mut self, timeout: Duration) -> Self {
        self.compensation_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_retry_backoff(mut self, base: Duration, max: Duration) -> Self {
        self.retry_backoff_base = base;
        self.retry_backoff_max = max;
        self
    }

    /// Delay before the attempt following failed attempt number `attempt`
    /// (1-based): the base delay doubled per attempt, capped at the maximum.
    #[must_use]
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        self.retry_backoff_base
            .saturating_mul(1_u32 << exponent)
            .min(self.retry_backoff_max)
    }

    /// Parses the `[engine]` table of a TOML document. Other tables are
    /// ignored, missing keys keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is not valid TOML, the `[engine]`
    /// table has unknown keys, or a value is out of range.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile = toml::from_str(content)?;
        Self::from_section(file.engine)
    }

    fn from_section(section: EngineSection) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let config = Self {
            step_timeout: positive_millis("step_timeout_ms", section.step_timeout_ms)?
                .unwrap_or(defaults.step_timeout),
            compensation_timeout: positive_millis(
                "compensation_timeout_ms",
                section.compensation_timeout_ms,
            )?
            .unwrap_or(defaults.compensation_timeout),
            retry_backoff_base: section
                .retry_backoff_base_ms
                .map_or(defaults.retry_backoff_base, Duration::from_millis),
            retry_backoff_max: section
                .retry_backoff_max_ms
                .map_or(defaults.retry_backoff_max, Duration::from_millis),
        };

        if config.retry_backoff_base > config.retry_backoff_max {
            return Err(ConfigError::Invalid {
                field: "retry_backoff_base_ms",
                reason: "must not exceed retry_backoff_max_ms",
            });
        }

        Ok(config)
    }
}

fn positive_millis(field: &'static str, value: Option<u64>) -> Result<Option<Duration>, ConfigError> {
    match value {
        Some(0) => Err(ConfigError::Invalid {
            field,
            reason: "must be greater than zero",
        }),
        other => Ok(other.map(Duration::from_millis)),
    }
}
