//! Cairn - Sequenced End-to-End Health Checks
//!
//! Walks an ordered series of HTTP steps (or TLS targets), times each one,
//! classifies the outcome against configurable thresholds, and folds the
//! per-step severities into a single monitoring-plugin verdict
//! (OK/WARNING/CRITICAL/UNKNOWN).
//!
//! ## Modules
//!
//! - [`engine`] - Step sequencing, threshold evaluation, status aggregation
//! - [`probe`] - HTTP and TLS/OCSP probe implementations
//! - [`config`] - Series configuration parsing (YAML)
//! - [`report`] - Plugin output line and exit-code rendering

pub mod config;
pub mod engine;
pub mod probe;
pub mod report;
