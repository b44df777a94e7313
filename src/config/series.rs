//! Series configuration types
//!
//! Defines the structure of series configuration files. Step fields that the
//! engine validates (`method`, `payload`, `on_failure`, threshold specs) stay
//! raw strings here so every configuration fault surfaces as one typed engine
//! error naming the offending step or spec, not as a serde message pointing
//! at a YAML line.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::engine::{
    InvalidThresholdFormat, MalformedStepConfig, RawStep, RunThresholds, StepSequence,
};

/// Errors that can occur during configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error(transparent)]
    Step(#[from] MalformedStepConfig),

    #[error(transparent)]
    Threshold(#[from] InvalidThresholdFormat),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Configuration for a single step
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StepConfig {
    /// URL (or host:port for certificate series)
    pub target: String,

    /// HTTP method; defaults to GET
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,

    /// URL-encoded request body for methods that send one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<String>,

    /// Severity policy for an outright probe failure; defaults to critical
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_failure: Option<String>,
}

impl StepConfig {
    fn to_raw(&self) -> RawStep {
        RawStep {
            target: self.target.clone(),
            method: self.method.clone(),
            payload: self.payload.clone(),
            on_failure: self.on_failure.clone(),
        }
    }
}

/// The ordered series of steps
///
/// The map preserves file order for display, but execution order is always
/// the sorted order of step names.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeriesConfig {
    /// Series name, used in the plugin output line
    #[serde(default = "default_series_name")]
    pub name: String,

    /// Step name -> definition
    pub steps: IndexMap<String, StepConfig>,
}

fn default_series_name() -> String {
    "series".to_string()
}

/// Raw threshold specification strings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ThresholdConfig {
    /// Per-step warning spec (single value or positional comma list)
    #[serde(default)]
    pub step_warning: String,

    /// Per-step critical spec
    #[serde(default)]
    pub step_critical: String,

    /// Warning threshold for the total run duration
    #[serde(default)]
    pub total_warning: String,

    /// Critical threshold for the total run duration
    #[serde(default)]
    pub total_critical: String,
}

/// Top-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub series: SeriesConfig,

    #[serde(default)]
    pub thresholds: ThresholdConfig,

    /// Whole-run deadline; no deadline when absent
    #[serde(
        default,
        with = "humantime_serde",
        skip_serializing_if = "Option::is_none"
    )]
    pub timeout: Option<Duration>,
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Validate the step entries into an executable sequence
    pub fn to_sequence(&self) -> Result<StepSequence, ConfigError> {
        if self.series.steps.is_empty() {
            return Err(ConfigError::Invalid("series has no steps".to_string()));
        }
        let raws: Vec<(String, RawStep)> = self
            .series
            .steps
            .iter()
            .map(|(name, step)| (name.clone(), step.to_raw()))
            .collect();
        Ok(StepSequence::from(
            raws.iter().map(|(n, r)| (n.as_str(), r)),
        )?)
    }

    /// Build the run thresholds against the sequence's sorted names
    pub fn to_thresholds(&self, sequence: &StepSequence) -> Result<RunThresholds, ConfigError> {
        Ok(RunThresholds::build(
            sequence,
            &self.thresholds.step_warning,
            &self.thresholds.step_critical,
            &self.thresholds.total_warning,
            &self.thresholds.total_critical,
        )?)
    }

    /// Generate a default configuration
    pub fn default_config() -> Self {
        let mut steps = IndexMap::new();
        steps.insert(
            "01-home".to_string(),
            StepConfig {
                target: "https://shop.example.com/".to_string(),
                ..Default::default()
            },
        );
        steps.insert(
            "02-login".to_string(),
            StepConfig {
                target: "https://shop.example.com/login".to_string(),
                method: Some("POST".to_string()),
                payload: Some("user=probe&password=secret".to_string()),
                on_failure: Some("critical".to_string()),
            },
        );

        Config {
            series: SeriesConfig {
                name: "storefront".to_string(),
                steps,
            },
            thresholds: ThresholdConfig {
                step_warning: "0.5,1.0".to_string(),
                step_critical: "2".to_string(),
                total_warning: "3".to_string(),
                total_critical: "5".to_string(),
            },
            timeout: Some(Duration::from_secs(30)),
        }
    }

    /// Serialize to a YAML string
    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        Ok(serde_yaml::to_string(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{Method, Severity};

    const SAMPLE_CONFIG: &str = r#"
series:
  name: storefront
  steps:
    "02-login":
      target: https://shop.example.com/login
      method: POST
      payload: "user=probe&password=secret"
      on_failure: warning
    "01-home":
      target: https://shop.example.com/

thresholds:
  step_warning: "0.5,1.0"
  step_critical: "2"
  total_critical: "5"

timeout: 30s
"#;

    #[test]
    fn test_parse_config() {
        let config = Config::from_yaml(SAMPLE_CONFIG).unwrap();
        assert_eq!(config.series.name, "storefront");
        assert_eq!(config.series.steps.len(), 2);
        assert_eq!(config.timeout, Some(Duration::from_secs(30)));
        assert_eq!(config.thresholds.total_warning, "");
    }

    #[test]
    fn test_sequence_is_sorted_not_file_order() {
        let config = Config::from_yaml(SAMPLE_CONFIG).unwrap();
        let seq = config.to_sequence().unwrap();
        assert_eq!(seq.list(), vec!["01-home", "02-login"]);

        let login = seq.lookup("02-login").unwrap();
        assert_eq!(login.method(), Method::Post);
        assert_eq!(login.on_failure(), Severity::Warning);
    }

    #[test]
    fn test_thresholds_build_against_sorted_names() {
        let config = Config::from_yaml(SAMPLE_CONFIG).unwrap();
        let seq = config.to_sequence().unwrap();
        let thresholds = config.to_thresholds(&seq).unwrap();

        // positional: 0.5 -> 01-home, 1.0 -> 02-login
        assert_eq!(
            thresholds.step_warning.get("01-home").unwrap().max(),
            Some(0.5)
        );
        assert_eq!(
            thresholds.step_warning.get("02-login").unwrap().max(),
            Some(1.0)
        );
        assert!(thresholds.total_warning.is_none());
        assert!(thresholds.total_critical.is_some());
    }

    #[test]
    fn test_bad_step_surfaces_step_name() {
        let yaml = r#"
series:
  steps:
    "bad":
      target: https://example.com/
      on_failure: fatal
"#;
        let config = Config::from_yaml(yaml).unwrap();
        let err = config.to_sequence().unwrap_err();
        assert!(err.to_string().contains("bad"));
    }

    #[test]
    fn test_empty_series_rejected() {
        let yaml = r#"
series:
  steps: {}
"#;
        let config = Config::from_yaml(yaml).unwrap();
        assert!(matches!(
            config.to_sequence(),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_roundtrip() {
        let config = Config::default_config();
        let yaml = config.to_yaml().unwrap();
        let parsed = Config::from_yaml(&yaml).unwrap();
        assert_eq!(parsed.series.name, config.series.name);
        assert_eq!(parsed.series.steps.len(), config.series.steps.len());
        assert_eq!(parsed.timeout, config.timeout);
    }
}
