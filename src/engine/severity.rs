//! Severity levels
//!
//! The four monitoring-plugin severities, totally ordered by escalation
//! level. `Unknown` sits above `Critical`: a check that cannot even run is
//! never reported as healthier than one that ran and failed.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// One monitoring-plugin severity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    Ok,
    Warning,
    Critical,
    Unknown,
}

/// Unrecognized severity token in configuration
#[derive(Debug, Error)]
#[error("unrecognized severity '{0}' (expected ok, warning, critical or unknown)")]
pub struct UnknownSeverity(pub String);

impl Severity {
    /// Conventional plugin exit code for this severity
    pub fn exit_code(self) -> i32 {
        match self {
            Severity::Ok => 0,
            Severity::Warning => 1,
            Severity::Critical => 2,
            Severity::Unknown => 3,
        }
    }

    /// Whether a run-terminating failure policy
    pub fn is_fatal(self) -> bool {
        matches!(self, Severity::Critical | Severity::Unknown)
    }
}

impl FromStr for Severity {
    type Err = UnknownSeverity;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ok" => Ok(Severity::Ok),
            "warning" => Ok(Severity::Warning),
            "critical" => Ok(Severity::Critical),
            "unknown" => Ok(Severity::Unknown),
            other => Err(UnknownSeverity(other.to_string())),
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Ok => write!(f, "OK"),
            Severity::Warning => write!(f, "WARNING"),
            Severity::Critical => write!(f, "CRITICAL"),
            Severity::Unknown => write!(f, "UNKNOWN"),
        }
    }
}
