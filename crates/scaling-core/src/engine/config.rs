use super::descriptors::{DescriptorError, DescriptorGroup, Descriptors, Method};
use crate::core::models::reaction::{Reaction, ReactionError};
use crate::core::relation::eads::DEFAULT_METRIC_THRESHOLD;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_STEP_LENGTH: f64 = 1.0;

#[derive(Debug, Error, PartialEq, Clone)]
pub enum ConfigError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),
    #[error("Invalid value {value} for parameter '{name}': {reason}")]
    InvalidParameter {
        name: &'static str,
        value: f64,
        reason: &'static str,
    },
}

/// Tunables shared by both building methods.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BuilderConfig {
    /// Ratio grid spacing of the adaptive search, in percent.
    pub step_length: f64,
    /// Fits scoring below this value are reported as warnings.
    pub metric_threshold: f64,
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self {
            step_length: DEFAULT_STEP_LENGTH,
            metric_threshold: DEFAULT_METRIC_THRESHOLD,
        }
    }
}

#[derive(Default)]
pub struct BuilderConfigBuilder {
    step_length: Option<f64>,
    metric_threshold: Option<f64>,
}

impl BuilderConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn step_length(mut self, step_length: f64) -> Self {
        self.step_length = Some(step_length);
        self
    }
    pub fn metric_threshold(mut self, threshold: f64) -> Self {
        self.metric_threshold = Some(threshold);
        self
    }

    pub fn build(self) -> Result<BuilderConfig, ConfigError> {
        let step_length = self.step_length.unwrap_or(DEFAULT_STEP_LENGTH);
        if !(step_length.is_finite() && step_length > 0.0 && step_length < 100.0) {
            return Err(ConfigError::InvalidParameter {
                name: "step_length",
                value: step_length,
                reason: "expected a finite value in (0, 100)",
            });
        }
        let metric_threshold = self.metric_threshold.unwrap_or(DEFAULT_METRIC_THRESHOLD);
        if !metric_threshold.is_finite() {
            return Err(ConfigError::InvalidParameter {
                name: "metric_threshold",
                value: metric_threshold,
                reason: "expected a finite value",
            });
        }
        Ok(BuilderConfig {
            step_length,
            metric_threshold,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct JobFile {
    data: Option<PathBuf>,
    method: Option<Method>,
    #[serde(default)]
    groups: Vec<DescriptorGroup>,
    step_length: Option<f64>,
    metric_threshold: Option<f64>,
    #[serde(default)]
    reaction: Vec<String>,
}

/// A complete scaling-relation job, usually read from a TOML file:
///
/// ```toml
/// data = "eads.csv"
/// method = "traditional"
/// metric_threshold = 0.6
/// reaction = [
///     "*CO2(-1.2, 0) + H+_aq(0, 0) + e-_aq(0, 0) -> *COOH(-1.5, 0)",
/// ]
///
/// [[groups]]
/// descriptor = "*CO"
/// members = ["*COOH", "*CHO"]
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ScalingJob {
    pub data_path: PathBuf,
    /// Groups together with the declared building method, if any.
    pub descriptors: Descriptors,
    pub config: BuilderConfig,
    /// Reaction steps in the textual form accepted by `ReactionStep::from_str`.
    pub reaction: Vec<String>,
}

impl ScalingJob {
    /// Loads a job file. A relative `data` path is resolved against the
    /// directory containing the job file.
    pub fn load(path: &Path) -> Result<Self, JobLoadError> {
        let content = std::fs::read_to_string(path).map_err(|e| JobLoadError::Io {
            path: path.to_string_lossy().to_string(),
            source: e,
        })?;
        let file: JobFile = toml::from_str(&content).map_err(|e| JobLoadError::Toml {
            path: path.to_string_lossy().to_string(),
            source: e,
        })?;

        let data = file.data.ok_or(ConfigError::MissingParameter("data"))?;
        let data_path = match path.parent() {
            Some(dir) if data.is_relative() => dir.join(data),
            _ => data,
        };

        let mut config = BuilderConfigBuilder::new();
        if let Some(step_length) = file.step_length {
            config = config.step_length(step_length);
        }
        if let Some(threshold) = file.metric_threshold {
            config = config.metric_threshold(threshold);
        }

        Ok(Self {
            data_path,
            descriptors: Descriptors::new(file.groups, file.method)?,
            config: config.build()?,
            reaction: file.reaction,
        })
    }

    /// The building method: the declared one, else the one implied by the
    /// descriptor groups.
    pub fn method(&self) -> Option<Method> {
        self.descriptors.method()
    }

    /// Parses the reaction steps, or `None` when the job has none.
    pub fn reaction(&self) -> Result<Option<Reaction>, ReactionError> {
        if self.reaction.is_empty() {
            return Ok(None);
        }
        let steps = self
            .reaction
            .iter()
            .map(|step| step.parse())
            .collect::<Result<Vec<_>, _>>()?;
        Reaction::new(steps).map(Some)
    }
}

#[derive(Debug, Error)]
pub enum JobLoadError {
    #[error("File I/O error for '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("TOML parsing error for '{path}': {source}")]
    Toml {
        path: String,
        source: toml::de::Error,
    },
    #[error("Invalid job configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("Invalid descriptors: {0}")]
    Descriptors(#[from] DescriptorError),
}
