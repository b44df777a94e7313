//! Status aggregation
//!
//! Folds per-step results into one overall verdict. The aggregate severity is
//! the monotonic maximum of everything seen so far, with one exception: a
//! failed step whose on-failure policy is CRITICAL or UNKNOWN terminates the
//! run immediately and the verdict is exactly that single failure, discarding
//! anything accumulated before it.

use std::ops::ControlFlow;
use std::time::Duration;
use tracing::{debug, warn};

use super::executor::StepResult;
use super::severity::Severity;
use super::step::Step;
use super::threshold::{Threshold, ThresholdSet};

/// The aggregate verdict of a run
#[derive(Debug, Clone)]
pub struct Verdict {
    severity: Severity,
    /// When set, the run was cut short and this is the whole report
    halt: Option<String>,
    criticals: Vec<String>,
    warnings: Vec<String>,
    oks: Vec<String>,
}

impl Verdict {
    /// Verdict for a run terminated by a fatal step failure or a timeout
    pub fn halted(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            severity,
            halt: Some(message.into()),
            criticals: Vec::new(),
            warnings: Vec::new(),
            oks: Vec::new(),
        }
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    /// Compose the final report: criticals, then warnings, then oks
    pub fn message(&self) -> String {
        if let Some(halt) = &self.halt {
            return halt.clone();
        }

        let mut groups = Vec::new();
        for (label, messages) in [
            ("critical", &self.criticals),
            ("warning", &self.warnings),
            ("ok", &self.oks),
        ] {
            if !messages.is_empty() {
                groups.push(format!("{label}: {}", messages.join(", ")));
            }
        }
        if groups.is_empty() {
            "no steps executed".to_string()
        } else {
            groups.join("; ")
        }
    }
}

/// Accumulates per-step severities into one monotonic overall verdict
///
/// Created empty at run start, fed once per step result and once more for the
/// total-duration check, then consumed to build the final report.
#[derive(Debug, Default)]
pub struct StatusAggregator {
    severity: Severity,
    criticals: Vec<String>,
    warnings: Vec<String>,
    oks: Vec<String>,
    total: Duration,
}

impl StatusAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Running total of all step durations so far
    pub fn total(&self) -> Duration {
        self.total
    }

    fn raise(&mut self, severity: Severity) {
        self.severity = self.severity.max(severity);
    }

    /// Fold one step result into the aggregate
    ///
    /// Returns `Break` with the final verdict when the step's failure policy
    /// terminates the run; `Continue` otherwise.
    pub fn record(
        &mut self,
        step: &Step,
        result: &StepResult,
        warning: &ThresholdSet,
        critical: &ThresholdSet,
    ) -> ControlFlow<Verdict> {
        self.total += result.duration;
        let secs = result.duration_seconds();

        if result.succeeded {
            // Critical takes precedence; a value breaching both thresholds is
            // reported once, as critical.
            if let Some(t) = critical.get(&result.name).filter(|t| t.evaluate(secs)) {
                warn!(step = %result.name, duration_s = secs, threshold = %t, "Critical duration");
                self.criticals
                    .push(format!("{} took {:.3}s (critical is {})", result.name, secs, t));
                self.raise(Severity::Critical);
            } else if let Some(t) = warning.get(&result.name).filter(|t| t.evaluate(secs)) {
                warn!(step = %result.name, duration_s = secs, threshold = %t, "Slow step");
                self.warnings
                    .push(format!("{} took {:.3}s (warning is {})", result.name, secs, t));
                self.raise(Severity::Warning);
            } else {
                self.oks
                    .push(format!("{}: {} ({:.3}s)", result.name, result.detail, secs));
            }
            return ControlFlow::Continue(());
        }

        match step.on_failure() {
            Severity::Ok => {
                debug!(step = %result.name, detail = %result.detail, "Failure ignored as configured");
                self.oks.push(format!(
                    "{} failed ({}), ignored as configured",
                    result.name, result.detail
                ));
                ControlFlow::Continue(())
            }
            Severity::Warning => {
                warn!(step = %result.name, detail = %result.detail, "Step failed, continuing");
                self.warnings
                    .push(format!("{} failed: {}", result.name, result.detail));
                self.raise(Severity::Warning);
                ControlFlow::Continue(())
            }
            fatal => {
                warn!(step = %result.name, detail = %result.detail, severity = %fatal, "Step failed, terminating run");
                ControlFlow::Break(Verdict::halted(
                    fatal,
                    format!("{} failed: {}", result.name, result.detail),
                ))
            }
        }
    }

    /// Close out the run: evaluate the total duration and build the verdict
    ///
    /// The total-duration pair mirrors the per-step precedence (critical
    /// before warning) and can only raise the severity, never short-circuit.
    pub fn finish(
        mut self,
        total_warning: Option<&Threshold>,
        total_critical: Option<&Threshold>,
    ) -> Verdict {
        let secs = self.total.as_secs_f64();

        if let Some(t) = total_critical.filter(|t| t.evaluate(secs)) {
            self.criticals
                .push(format!("total time {:.3}s (critical is {})", secs, t));
            self.raise(Severity::Critical);
        } else if let Some(t) = total_warning.filter(|t| t.evaluate(secs)) {
            self.warnings
                .push(format!("total time {:.3}s (warning is {})", secs, t));
            self.raise(Severity::Warning);
        }

        Verdict {
            severity: self.severity,
            halt: None,
            criticals: self.criticals,
            warnings: self.warnings,
            oks: self.oks,
        }
    }
}
