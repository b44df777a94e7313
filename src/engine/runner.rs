//! Run driver
//!
//! Walks a [`StepSequence`] strictly in sorted-name order through the probe,
//! feeding each result to the aggregator and honoring its short-circuit
//! decision. Execution is fully sequential; a step never starts before the
//! previous probe call has returned. One optional whole-run deadline aborts
//! the run wherever it is currently suspended.

use std::ops::ControlFlow;
use std::time::Duration;
use tracing::info;

use super::aggregate::{StatusAggregator, Verdict};
use super::executor::{execute_step, Probe, StepResult};
use super::severity::Severity;
use super::step::StepSequence;
use super::threshold::{InvalidThresholdFormat, Threshold, ThresholdSet};

/// The full threshold configuration for a run
#[derive(Debug, Clone, Default)]
pub struct RunThresholds {
    pub step_warning: ThresholdSet,
    pub step_critical: ThresholdSet,
    pub total_warning: Option<Threshold>,
    pub total_critical: Option<Threshold>,
}

impl RunThresholds {
    /// Build from the four raw specification strings
    ///
    /// `step_*` specs follow the positional expansion against the sorted step
    /// names; `total_*` specs are single scalars (empty = no threshold).
    pub fn build(
        sequence: &StepSequence,
        step_warning: &str,
        step_critical: &str,
        total_warning: &str,
        total_critical: &str,
    ) -> Result<Self, InvalidThresholdFormat> {
        let names: Vec<String> = sequence.list().iter().map(|s| s.to_string()).collect();
        Ok(Self {
            step_warning: ThresholdSet::build(step_warning, &names)?,
            step_critical: ThresholdSet::build(step_critical, &names)?,
            total_warning: parse_scalar(total_warning)?,
            total_critical: parse_scalar(total_critical)?,
        })
    }
}

fn parse_scalar(spec: &str) -> Result<Option<Threshold>, InvalidThresholdFormat> {
    if spec.trim().is_empty() {
        Ok(None)
    } else {
        Threshold::parse(spec).map(Some)
    }
}

/// What a run produced: the verdict plus the per-step results that executed
///
/// On a short-circuit the results cover only the steps that ran; on a
/// deadline expiry they are empty.
#[derive(Debug)]
pub struct RunOutcome {
    pub verdict: Verdict,
    pub results: Vec<StepResult>,
}

/// Drives a step sequence through a probe to a single verdict
pub struct Runner<'a> {
    probe: &'a dyn Probe,
}

impl<'a> Runner<'a> {
    pub fn new(probe: &'a dyn Probe) -> Self {
        Self { probe }
    }

    /// Execute the whole sequence, bounded by an optional global deadline
    pub async fn run(
        &self,
        sequence: &StepSequence,
        thresholds: &RunThresholds,
        deadline: Option<Duration>,
    ) -> RunOutcome {
        info!(steps = sequence.len(), deadline = ?deadline, "Starting run");

        let outcome = match deadline {
            None => self.run_inner(sequence, thresholds).await,
            Some(limit) => {
                match tokio::time::timeout(limit, self.run_inner(sequence, thresholds)).await {
                    Ok(outcome) => outcome,
                    Err(_) => RunOutcome {
                        verdict: Verdict::halted(
                            Severity::Unknown,
                            format!("operation timed out after {}", humantime::format_duration(limit)),
                        ),
                        results: Vec::new(),
                    },
                }
            }
        };

        info!(
            severity = %outcome.verdict.severity(),
            executed = outcome.results.len(),
            "Run complete"
        );
        outcome
    }

    async fn run_inner(&self, sequence: &StepSequence, thresholds: &RunThresholds) -> RunOutcome {
        let mut aggregator = StatusAggregator::new();
        let mut results = Vec::new();

        for step in sequence.iter() {
            let result = execute_step(self.probe, step).await;
            let flow = aggregator.record(
                step,
                &result,
                &thresholds.step_warning,
                &thresholds.step_critical,
            );
            results.push(result);

            if let ControlFlow::Break(verdict) = flow {
                return RunOutcome { verdict, results };
            }
        }

        let verdict = aggregator.finish(
            thresholds.total_warning.as_ref(),
            thresholds.total_critical.as_ref(),
        );
        RunOutcome { verdict, results }
    }
}
