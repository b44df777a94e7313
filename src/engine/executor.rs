//! Step execution
//!
//! Drives a single step through the injected [`Probe`] capability, measuring
//! wall-clock duration around the call. Transport faults and error responses
//! get identical treatment: `succeeded = false` with the fault text as the
//! failure detail. No retries; the whole-run deadline lives in the runner.

use async_trait::async_trait;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::debug;

use super::step::{Method, Step};

/// A probe call that did not succeed
#[derive(Debug, Error)]
pub enum ProbeError {
    /// The call never produced a response (DNS failure, connection refused, ...)
    #[error("{0}")]
    Transport(String),

    /// The target answered, but with a failure status
    #[error("{0}")]
    Rejected(String),
}

/// The injected "perform one request" capability
///
/// Implementations return the status detail text on success (e.g. the HTTP
/// status line) and a [`ProbeError`] on failure.
#[async_trait]
pub trait Probe: Send + Sync {
    async fn perform(
        &self,
        method: Method,
        target: &str,
        payload: Option<&[(String, String)]>,
    ) -> Result<String, ProbeError>;
}

/// Outcome of executing one step
#[derive(Debug, Clone)]
pub struct StepResult {
    pub name: String,
    pub succeeded: bool,
    pub duration: Duration,
    /// Status text on success, failure detail otherwise
    pub detail: String,
}

impl StepResult {
    pub fn duration_seconds(&self) -> f64 {
        self.duration.as_secs_f64()
    }
}

/// Perform one step via the probe, timing the call
pub async fn execute_step(probe: &dyn Probe, step: &Step) -> StepResult {
    debug!(step = %step.name(), method = %step.method(), target = %step.target(), "Executing step");

    let start = Instant::now();
    let outcome = probe
        .perform(step.method(), step.target(), step.payload())
        .await;
    let duration = start.elapsed();

    match outcome {
        Ok(detail) => {
            debug!(step = %step.name(), duration_ms = duration.as_millis(), "Step succeeded");
            StepResult {
                name: step.name().to_string(),
                succeeded: true,
                duration,
                detail,
            }
        }
        Err(e) => {
            debug!(step = %step.name(), error = %e, "Step failed");
            StepResult {
                name: step.name().to_string(),
                succeeded: false,
                duration,
                detail: e.to_string(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::step::RawStep;

    struct FixedProbe {
        outcome: Result<String, String>,
    }

    #[async_trait]
    impl Probe for FixedProbe {
        async fn perform(
            &self,
            _method: Method,
            _target: &str,
            _payload: Option<&[(String, String)]>,
        ) -> Result<String, ProbeError> {
            self.outcome
                .clone()
                .map_err(ProbeError::Transport)
        }
    }

    fn step() -> Step {
        let raw = RawStep {
            target: "http://example.com".into(),
            ..Default::default()
        };
        Step::new("a", &raw).unwrap()
    }

    #[tokio::test]
    async fn test_success_carries_status_detail() {
        let probe = FixedProbe {
            outcome: Ok("200 OK".into()),
        };
        let result = execute_step(&probe, &step()).await;
        assert!(result.succeeded);
        assert_eq!(result.name, "a");
        assert_eq!(result.detail, "200 OK");
    }

    #[tokio::test]
    async fn test_transport_fault_reported_as_failure() {
        let probe = FixedProbe {
            outcome: Err("connection refused".into()),
        };
        let result = execute_step(&probe, &step()).await;
        assert!(!result.succeeded);
        assert_eq!(result.detail, "connection refused");
    }
}
