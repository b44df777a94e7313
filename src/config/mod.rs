//! Configuration parsing
//!
//! Loads the YAML series configuration and turns it into the engine's
//! validated types.

mod series;

pub use series::{Config, ConfigError, SeriesConfig, StepConfig, ThresholdConfig};
