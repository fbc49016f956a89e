//! Simulation configuration.
//!
//! A [`Configuration`] is loaded from YAML and validated as a whole before it
//! is handed to the generator: an invalid file never produces a value of this
//! type. Apart from its dimension list, which drift replaces wholesale, the
//! configuration is immutable once built.

use crate::behavior::{Behavior, BehaviorError, BehaviorKind};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

// ============================================================================
// Error Types
// ============================================================================

/// Error type for configuration loading and validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Error reading configuration file
    #[error("Failed to read configuration file: {0}")]
    IoError(#[from] std::io::Error),

    /// Error parsing YAML
    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    /// A behavior violates its own invariants
    #[error("Invalid behavior for '{name}': {source}")]
    InvalidBehavior {
        name: String,
        #[source]
        source: BehaviorError,
    },

    /// A measure declared with something other than a fixed behavior
    #[error("Behavior must be Fixed for measure '{name}', got {kind}")]
    MeasureNotFixed { name: String, kind: BehaviorKind },

    /// A dimension declared with a fixed behavior but no cardinality
    #[error("Fixed behavior of dimension '{0}' must declare values")]
    MissingValues(String),

    /// Negative or non-finite standard deviation
    #[error("Standard deviation of measure '{name}' must be >= 0, got {std_dev}")]
    InvalidStdDev { name: String, std_dev: f64 },

    /// Two attributes share a name
    #[error("Attribute name '{0}' is declared more than once")]
    DuplicateName(String),

    /// Hierarchy references an attribute that is not a dimension
    #[error("Dimension {0} not found")]
    UnknownHierarchyMember(String),

    /// Base frequency missing or zero
    #[error("frequency must be set and greater than 0")]
    InvalidFrequency,

    /// Data variation parameters out of range
    #[error("Invalid data variation: {0}")]
    InvalidDataVariation(String),

    /// Data variation frequency is not a multiple of the base frequency
    #[error("dataVariation frequency {variation} must be a multiple of frequency {frequency}")]
    VariationFrequencyMismatch { variation: u64, frequency: u64 },

    /// Replacement dimension list does not match the configured names
    #[error("Replacement dimensions must keep the configured names and order")]
    DimensionSetChanged,
}

// ============================================================================
// Attributes
// ============================================================================

/// A categorical attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dimension {
    pub name: String,
    pub behavior: Behavior,
}

impl Dimension {
    pub fn new(name: impl Into<String>, behavior: Behavior) -> Self {
        Self {
            name: name.into(),
            behavior,
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        self.behavior
            .validate()
            .map_err(|source| ConfigError::InvalidBehavior {
                name: self.name.clone(),
                source,
            })?;
        if let Behavior::Fixed { values: None, .. } = self.behavior {
            return Err(ConfigError::MissingValues(self.name.clone()));
        }
        Ok(())
    }
}

/// A numeric attribute sampled from a normal distribution when present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measure {
    pub name: String,
    pub mean: f64,
    #[serde(rename = "stdDev")]
    pub std_dev: f64,
    pub behavior: Behavior,
}

impl Measure {
    pub fn new(
        name: impl Into<String>,
        mean: f64,
        std_dev: f64,
        probability: f64,
    ) -> Result<Self, ConfigError> {
        let name = name.into();
        let behavior = Behavior::fixed_probability(probability).map_err(|source| {
            ConfigError::InvalidBehavior {
                name: name.clone(),
                source,
            }
        })?;
        let measure = Self {
            name,
            mean,
            std_dev,
            behavior,
        };
        measure.validate()?;
        Ok(measure)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.behavior.kind() != BehaviorKind::Fixed {
            return Err(ConfigError::MeasureNotFixed {
                name: self.name.clone(),
                kind: self.behavior.kind(),
            });
        }
        self.behavior
            .validate()
            .map_err(|source| ConfigError::InvalidBehavior {
                name: self.name.clone(),
                source,
            })?;
        if !(self.std_dev.is_finite() && self.std_dev >= 0.0) {
            return Err(ConfigError::InvalidStdDev {
                name: self.name.clone(),
                std_dev: self.std_dev,
            });
        }
        Ok(())
    }
}

// ============================================================================
// Data variation
// ============================================================================

/// Parameters of the periodic random drift applied to dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DataVariation {
    /// Warm-up time before drift starts acting
    pub delay: u64,
    /// Cycle length; also the settling time of reassigned behaviors
    pub frequency: u64,
    /// Fraction of dimensions re-randomized per cycle
    pub extension: f64,
    /// Relative magnitude of the new ramp endpoint
    pub impact: f64,
}

impl DataVariation {
    pub fn new(delay: u64, frequency: u64, extension: f64, impact: f64) -> Result<Self, ConfigError> {
        let variation = Self {
            delay,
            frequency,
            extension,
            impact,
        };
        variation.validate()?;
        Ok(variation)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.extension) {
            return Err(ConfigError::InvalidDataVariation(format!(
                "The percentage of dimensions must be in [0,1], got {}",
                self.extension
            )));
        }
        if !(0.0..=1.0).contains(&self.impact) {
            return Err(ConfigError::InvalidDataVariation(format!(
                "The impact of dimensions must be in [0,1], got {}",
                self.impact
            )));
        }
        if self.frequency == 0 {
            return Err(ConfigError::InvalidDataVariation(
                "The frequency must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

// ============================================================================
// Configuration aggregate
// ============================================================================

/// On-disk shape of a configuration, before validation.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConfigurationFile {
    #[serde(default)]
    dimensions: Vec<Dimension>,
    #[serde(default)]
    measures: Vec<Measure>,
    #[serde(default)]
    frequency: Option<u64>,
    #[serde(default)]
    hierarchies: Vec<Vec<String>>,
    #[serde(default)]
    duration: Option<u64>,
    #[serde(default)]
    data_variation: Option<DataVariation>,
}

impl TryFrom<ConfigurationFile> for Configuration {
    type Error = ConfigError;

    fn try_from(file: ConfigurationFile) -> Result<Self, Self::Error> {
        let configuration = Configuration {
            dimensions: file.dimensions,
            measures: file.measures,
            frequency: file.frequency.unwrap_or(0),
            hierarchies: file.hierarchies,
            duration: file.duration,
            data_variation: file.data_variation,
        };
        configuration.validate()?;
        Ok(configuration)
    }
}

/// Validated simulation configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ConfigurationFile", rename_all = "camelCase")]
pub struct Configuration {
    dimensions: Vec<Dimension>,
    measures: Vec<Measure>,
    frequency: u64,
    hierarchies: Vec<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    duration: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    data_variation: Option<DataVariation>,
}

impl Configuration {
    /// Build and validate a configuration.
    pub fn new(
        dimensions: Vec<Dimension>,
        measures: Vec<Measure>,
        frequency: u64,
        hierarchies: Vec<Vec<String>>,
        duration: Option<u64>,
        data_variation: Option<DataVariation>,
    ) -> Result<Self, ConfigError> {
        ConfigurationFile {
            dimensions,
            measures,
            frequency: Some(frequency),
            hierarchies,
            duration,
            data_variation,
        }
        .try_into()
    }

    /// Load configuration from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let file: ConfigurationFile = serde_yaml::from_str(yaml)?;
        file.try_into()
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.frequency == 0 {
            return Err(ConfigError::InvalidFrequency);
        }

        let mut names = HashSet::new();
        for dimension in &self.dimensions {
            dimension.validate()?;
            if !names.insert(dimension.name.as_str()) {
                return Err(ConfigError::DuplicateName(dimension.name.clone()));
            }
        }
        let dimension_names = names.clone();
        for measure in &self.measures {
            measure.validate()?;
            if !names.insert(measure.name.as_str()) {
                return Err(ConfigError::DuplicateName(measure.name.clone()));
            }
        }

        for member in self.hierarchies.iter().flatten() {
            if !dimension_names.contains(member.as_str()) {
                return Err(ConfigError::UnknownHierarchyMember(member.clone()));
            }
        }

        if let Some(variation) = &self.data_variation {
            variation.validate()?;
            if variation.frequency % self.frequency != 0 {
                return Err(ConfigError::VariationFrequencyMismatch {
                    variation: variation.frequency,
                    frequency: self.frequency,
                });
            }
        }
        Ok(())
    }

    pub fn dimensions(&self) -> &[Dimension] {
        &self.dimensions
    }

    pub fn measures(&self) -> &[Measure] {
        &self.measures
    }

    /// Tick length.
    pub fn frequency(&self) -> u64 {
        self.frequency
    }

    pub fn hierarchies(&self) -> &[Vec<String>] {
        &self.hierarchies
    }

    /// Run length, if bounded.
    pub fn duration(&self) -> Option<u64> {
        self.duration
    }

    pub fn data_variation(&self) -> Option<&DataVariation> {
        self.data_variation.as_ref()
    }

    /// Replace the whole dimension list with a new snapshot.
    ///
    /// The replacement must keep the same names in the same order; only the
    /// behaviors may differ.
    pub fn replace_dimensions(&mut self, dimensions: Vec<Dimension>) -> Result<(), ConfigError> {
        let same_names = dimensions.len() == self.dimensions.len()
            && dimensions
                .iter()
                .zip(&self.dimensions)
                .all(|(new, old)| new.name == old.name);
        if !same_names {
            return Err(ConfigError::DimensionSetChanged);
        }
        for dimension in &dimensions {
            dimension.validate()?;
        }
        self.dimensions = dimensions;
        Ok(())
    }

    /// Copy of this configuration with a different data variation.
    pub fn with_data_variation(
        &self,
        data_variation: Option<DataVariation>,
    ) -> Result<Self, ConfigError> {
        let configuration = Self {
            data_variation,
            ..self.clone()
        };
        configuration.validate()?;
        Ok(configuration)
    }

    /// Copy of this configuration with a different run length.
    pub fn with_duration(&self, duration: Option<u64>) -> Self {
        Self {
            duration,
            ..self.clone()
        }
    }

    /// Copy of this configuration with a different tick length.
    pub fn with_frequency(&self, frequency: u64) -> Result<Self, ConfigError> {
        let configuration = Self {
            frequency,
            ..self.clone()
        };
        configuration.validate()?;
        Ok(configuration)
    }
}
