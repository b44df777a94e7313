//! Plugin output rendering
//!
//! Maps a run outcome to the host monitoring system's conventions: one
//! status line on stdout (`cairn <SEVERITY> - <message> | <perfdata>`) and a
//! process exit code of 0/1/2/3 for OK/WARNING/CRITICAL/UNKNOWN.

use std::fmt::Write as _;

use crate::engine::RunOutcome;

/// Compose the full plugin line for a run
pub fn render(service: &str, outcome: &RunOutcome) -> String {
    let mut line = format!(
        "{} {} - {}",
        service,
        outcome.verdict.severity(),
        outcome.verdict.message()
    );

    let perf = perfdata(outcome);
    if !perf.is_empty() {
        let _ = write!(line, " | {perf}");
    }
    line
}

/// Key=value duration metrics for every executed step, plus the total
fn perfdata(outcome: &RunOutcome) -> String {
    if outcome.results.is_empty() {
        return String::new();
    }

    let mut parts: Vec<String> = outcome
        .results
        .iter()
        .map(|r| format!("{}={:.3}s", r.name, r.duration_seconds()))
        .collect();

    let total: f64 = outcome.results.iter().map(|r| r.duration_seconds()).sum();
    parts.push(format!("total={total:.3}s"));
    parts.join(" ")
}
