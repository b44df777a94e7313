//! Range thresholds
//!
//! Implements the classic monitoring range grammar `[@]start:end`:
//!
//! - `10`     - breach when the value is outside 0..=10
//! - `10:`    - breach when the value is below 10
//! - `~:10`   - breach when the value is above 10 (`~` = no lower bound)
//! - `10:20`  - breach when the value is outside 10..=20
//! - `@10:20` - breach when the value is *inside* 10..=20
//!
//! An empty specification means "no threshold" and never breaches.
//!
//! [`ThresholdSet`] handles the positional expansion used for per-step
//! thresholds: a comma-less spec applies to every step, a comma list is
//! matched positionally against the sorted step names.

use std::collections::HashMap;
use thiserror::Error;

/// Malformed range specification
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid threshold format '{spec}': {reason}")]
pub struct InvalidThresholdFormat {
    pub spec: String,
    pub reason: String,
}

impl InvalidThresholdFormat {
    fn new(spec: &str, reason: impl Into<String>) -> Self {
        Self {
            spec: spec.to_string(),
            reason: reason.into(),
        }
    }
}

/// A numeric range whose breach maps a measured value to a severity
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Threshold {
    /// Lower bound; `None` means no lower limit (`~`)
    min: Option<f64>,
    /// Upper bound; `None` means no upper limit
    max: Option<f64>,
    /// Leading `@`: alert when the value is inside the range
    inverted: bool,
}

impl Threshold {
    /// Parse a single range specification
    ///
    /// The empty string is rejected here; "no threshold" is represented as
    /// `Option::<Threshold>::None` by the callers that allow it.
    pub fn parse(spec: &str) -> Result<Self, InvalidThresholdFormat> {
        let spec = spec.trim();
        if spec.is_empty() {
            return Err(InvalidThresholdFormat::new(spec, "empty range"));
        }

        let (inverted, range) = match spec.strip_prefix('@') {
            Some(rest) => (true, rest),
            None => (false, spec),
        };

        let (min, max) = match range.split_once(':') {
            None => {
                // Bare number N means 0..=N
                let max = parse_bound(spec, range)?;
                (Some(0.0), Some(max))
            }
            Some((lo, hi)) => {
                let min = match lo {
                    "" => Some(0.0),
                    "~" => None,
                    other => Some(parse_bound(spec, other)?),
                };
                let max = match hi {
                    "" => None,
                    other => Some(parse_bound(spec, other)?),
                };
                (min, max)
            }
        };

        if let (Some(lo), Some(hi)) = (min, max) {
            if lo > hi {
                return Err(InvalidThresholdFormat::new(
                    spec,
                    format!("lower bound {lo} exceeds upper bound {hi}"),
                ));
            }
        }

        Ok(Self { min, max, inverted })
    }

    /// True exactly when `value` constitutes a breach
    pub fn evaluate(&self, value: f64) -> bool {
        let outside = self.min.is_some_and(|lo| value < lo) || self.max.is_some_and(|hi| value > hi);
        if self.inverted { !outside } else { outside }
    }

    /// Upper bound, if any (used for perfdata rendering)
    pub fn max(&self) -> Option<f64> {
        self.max
    }

    /// Lower bound, if any
    pub fn min(&self) -> Option<f64> {
        self.min
    }
}

impl std::fmt::Display for Threshold {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.inverted {
            write!(f, "@")?;
        }
        match (self.min, self.max) {
            (Some(lo), Some(hi)) if lo == 0.0 => write!(f, "{hi}"),
            (Some(lo), Some(hi)) => write!(f, "{lo}:{hi}"),
            (Some(lo), None) => write!(f, "{lo}:"),
            (None, Some(hi)) => write!(f, "~:{hi}"),
            (None, None) => write!(f, "~:"),
        }
    }
}

fn parse_bound(spec: &str, text: &str) -> Result<f64, InvalidThresholdFormat> {
    text.trim()
        .parse::<f64>()
        .map_err(|_| InvalidThresholdFormat::new(spec, format!("'{text}' is not a number")))
}

/// Per-step thresholds built from one raw specification string
///
/// Expansion rule:
/// - no comma: the single threshold (or none, if empty) applies to every step
/// - commas: position *i* supplies the threshold for the step at sorted-order
///   index *i*; empty positions mean "no threshold"; extra positions are
///   ignored; steps past the end of the list get no threshold
///
/// Lookups by names not present at construction return `None`, never an
/// error. Non-empty segments that fail range parsing fail the build.
#[derive(Debug, Clone, Default)]
pub struct ThresholdSet {
    by_name: HashMap<String, Threshold>,
}

impl ThresholdSet {
    /// Build from a raw spec string and the sorted list of step names
    pub fn build(spec: &str, ordered_names: &[String]) -> Result<Self, InvalidThresholdFormat> {
        let spec = spec.trim();
        let mut by_name = HashMap::new();

        if spec.is_empty() {
            return Ok(Self { by_name });
        }

        if !spec.contains(',') {
            let threshold = Threshold::parse(spec)?;
            for name in ordered_names {
                by_name.insert(name.clone(), threshold);
            }
            return Ok(Self { by_name });
        }

        for (segment, name) in spec.split(',').zip(ordered_names) {
            if segment.trim().is_empty() {
                continue;
            }
            by_name.insert(name.clone(), Threshold::parse(segment)?);
        }

        Ok(Self { by_name })
    }

    /// Threshold for a step, if one was configured
    pub fn get(&self, name: &str) -> Option<&Threshold> {
        self.by_name.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_bare_number_means_zero_to_n() {
        let t = Threshold::parse("10").unwrap();
        assert!(!t.evaluate(0.0));
        assert!(!t.evaluate(10.0));
        assert!(t.evaluate(10.1));
        assert!(t.evaluate(-0.5));
    }

    #[test]
    fn test_lower_bound_only() {
        let t = Threshold::parse("10:").unwrap();
        assert!(t.evaluate(9.9));
        assert!(!t.evaluate(10.0));
        assert!(!t.evaluate(1000.0));
    }

    #[test]
    fn test_tilde_removes_lower_bound() {
        let t = Threshold::parse("~:10").unwrap();
        assert!(!t.evaluate(-50.0));
        assert!(!t.evaluate(10.0));
        assert!(t.evaluate(10.5));
    }

    #[test]
    fn test_omitted_start_defaults_to_zero() {
        let t = Threshold::parse(":10").unwrap();
        assert!(t.evaluate(-0.1));
        assert!(!t.evaluate(5.0));
        assert!(t.evaluate(11.0));
    }

    #[test]
    fn test_explicit_range() {
        let t = Threshold::parse("10:20").unwrap();
        assert!(t.evaluate(9.0));
        assert!(!t.evaluate(15.0));
        assert!(t.evaluate(21.0));
    }

    #[test]
    fn test_inverted_range() {
        let t = Threshold::parse("@10:20").unwrap();
        assert!(!t.evaluate(9.0));
        assert!(t.evaluate(10.0));
        assert!(t.evaluate(20.0));
        assert!(!t.evaluate(21.0));
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(Threshold::parse("abc").is_err());
        assert!(Threshold::parse("1:2:3").is_err());
        assert!(Threshold::parse("").is_err());
    }

    #[test]
    fn test_rejects_crossed_bounds() {
        let err = Threshold::parse("20:10").unwrap_err();
        assert!(err.reason.contains("exceeds"));
    }

    #[test]
    fn test_set_single_spec_applies_to_all() {
        let set = ThresholdSet::build("5", &names(&["a", "b", "c"])).unwrap();
        for name in ["a", "b", "c"] {
            let t = set.get(name).unwrap();
            assert!(t.evaluate(6.0));
            assert!(!t.evaluate(4.0));
        }
    }

    #[test]
    fn test_set_empty_spec_means_no_thresholds() {
        let set = ThresholdSet::build("", &names(&["a", "b"])).unwrap();
        assert!(set.get("a").is_none());
        assert!(set.get("b").is_none());
    }

    #[test]
    fn test_set_positional_expansion() {
        let ns = names(&["a", "b", "c", "d", "e"]);
        let set = ThresholdSet::build(",0.2,,,0.5", &ns).unwrap();
        assert!(set.get("a").is_none());
        assert_eq!(set.get("b").unwrap().max(), Some(0.2));
        assert!(set.get("c").is_none());
        assert!(set.get("d").is_none());
        assert_eq!(set.get("e").unwrap().max(), Some(0.5));
    }

    #[test]
    fn test_set_extra_positions_ignored() {
        let set = ThresholdSet::build("1,2,3,4", &names(&["a", "b"])).unwrap();
        assert_eq!(set.get("a").unwrap().max(), Some(1.0));
        assert_eq!(set.get("b").unwrap().max(), Some(2.0));
    }

    #[test]
    fn test_set_short_list_leaves_rest_unset() {
        let set = ThresholdSet::build("1,2", &names(&["a", "b", "c"])).unwrap();
        assert!(set.get("c").is_none());
    }

    #[test]
    fn test_set_unknown_name_returns_none() {
        let set = ThresholdSet::build("5", &names(&["a"])).unwrap();
        assert!(set.get("zzz").is_none());
    }

    #[test]
    fn test_set_rejects_malformed_segment() {
        assert!(ThresholdSet::build("1,garbage,3", &names(&["a", "b", "c"])).is_err());
    }
}
