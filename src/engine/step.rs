//! Step and StepSequence
//!
//! A [`Step`] is the immutable description of one probe action; a
//! [`StepSequence`] is the ordered, named collection the executor walks.
//! Step names encode execution order: iteration is always lexicographic by
//! name, never insertion order.

use std::collections::BTreeMap;
use std::str::FromStr;
use thiserror::Error;

use super::severity::Severity;

/// A step entry that failed validation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("step '{step}': {reason}")]
pub struct MalformedStepConfig {
    pub step: String,
    pub reason: String,
}

impl MalformedStepConfig {
    fn new(step: &str, reason: impl Into<String>) -> Self {
        Self {
            step: step.to_string(),
            reason: reason.into(),
        }
    }
}

/// HTTP method for a probe step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Method {
    #[default]
    Get,
    Post,
    Head,
}

impl Method {
    /// Whether this method sends a request body
    pub fn sends_body(self) -> bool {
        matches!(self, Method::Post)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Head => "HEAD",
        }
    }
}

impl FromStr for Method {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Method::Get),
            "POST" => Ok(Method::Post),
            "HEAD" => Ok(Method::Head),
            other => Err(format!("unsupported method '{other}'")),
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unvalidated step fields as they come out of configuration
///
/// `method`, `payload` and `on_failure` stay raw strings here so that every
/// validation failure surfaces as one [`MalformedStepConfig`] naming the
/// step, rather than as a serde error pointing at a YAML line.
#[derive(Debug, Clone, Default)]
pub struct RawStep {
    pub target: String,
    pub method: Option<String>,
    pub payload: Option<String>,
    pub on_failure: Option<String>,
}

/// Immutable description of one probe action
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    name: String,
    target: String,
    method: Method,
    payload: Option<Vec<(String, String)>>,
    on_failure: Severity,
}

impl Step {
    /// Validate one raw entry into a step
    pub fn new(name: &str, raw: &RawStep) -> Result<Self, MalformedStepConfig> {
        if raw.target.trim().is_empty() {
            return Err(MalformedStepConfig::new(name, "target must not be empty"));
        }

        let method = match &raw.method {
            None => Method::default(),
            Some(m) => m
                .parse::<Method>()
                .map_err(|e| MalformedStepConfig::new(name, e))?,
        };

        let payload = match &raw.payload {
            None => None,
            Some(p) => Some(decode_payload(p).map_err(|e| MalformedStepConfig::new(name, e))?),
        };

        let on_failure = match &raw.on_failure {
            None => Severity::Critical,
            Some(s) => s
                .parse::<Severity>()
                .map_err(|e| MalformedStepConfig::new(name, e.to_string()))?,
        };

        Ok(Self {
            name: name.to_string(),
            target: raw.target.clone(),
            method,
            payload,
            on_failure,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn method(&self) -> Method {
        self.method
    }

    /// Decoded form pairs, present only when configured
    pub fn payload(&self) -> Option<&[(String, String)]> {
        self.payload.as_deref()
    }

    /// Policy applied when the probe reports an outright failure
    pub fn on_failure(&self) -> Severity {
        self.on_failure
    }
}

/// Decode a single URL-encoded string into name/value pairs
///
/// Every non-empty `&`-separated segment must contain `=`; bare tokens make
/// the payload undecodable and fail step construction.
fn decode_payload(raw: &str) -> Result<Vec<(String, String)>, String> {
    for segment in raw.split('&') {
        if !segment.is_empty() && !segment.contains('=') {
            return Err(format!("undecodable payload: '{segment}' has no '='"));
        }
    }
    Ok(url::form_urlencoded::parse(raw.as_bytes())
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect())
}

/// Ordered, named collection of steps
///
/// Backed by a `BTreeMap` so iteration is the sorted order of names
/// regardless of how the configuration listed them.
#[derive(Debug, Clone, Default)]
pub struct StepSequence {
    steps: BTreeMap<String, Step>,
}

impl StepSequence {
    /// Validate a raw name -> definition mapping into a sequence
    ///
    /// Fails on the first entry that does not form a valid step.
    pub fn from<'a, I>(raw: I) -> Result<Self, MalformedStepConfig>
    where
        I: IntoIterator<Item = (&'a str, &'a RawStep)>,
    {
        let mut steps = BTreeMap::new();
        for (name, raw_step) in raw {
            let step = Step::new(name, raw_step)?;
            steps.insert(name.to_string(), step);
        }
        Ok(Self { steps })
    }

    /// Step names in execution order (sorted, deterministic)
    pub fn list(&self) -> Vec<&str> {
        self.steps.keys().map(String::as_str).collect()
    }

    /// Look up a step by name
    pub fn lookup(&self, name: &str) -> Option<&Step> {
        self.steps.get(name)
    }

    /// Steps in execution order
    pub fn iter(&self) -> impl Iterator<Item = &Step> {
        self.steps.values()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}
