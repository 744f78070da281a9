use crate::core::diagnostics::Warning;
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Metric value under which a fit is flagged for review.
pub const DEFAULT_METRIC_THRESHOLD: f64 = 0.5;

/// Absolute tolerance on the sum of a species' descriptor ratios.
pub const RATIO_SUM_TOLERANCE: f64 = 0.01;

pub type SpeciesMap<T> = BTreeMap<String, T>;

#[derive(Debug, Error, PartialEq, Clone)]
pub enum RelationError {
    #[error("A relation needs coefficients for at least one species")]
    Empty,
    #[error("Species and descriptor names cannot be empty")]
    EmptyName,
    #[error("All coefficients must have the same length: '{species}' has {found}, expected {expected}")]
    LengthMismatch {
        species: String,
        expected: usize,
        found: usize,
    },
    #[error("{descriptors} descriptor name(s) given for {dim} coefficient(s) per species")]
    DescriptorCount { descriptors: usize, dim: usize },
    #[error("Duplicate descriptor '{0}'")]
    DuplicateDescriptor(String),
    #[error("Non-finite {field} for species '{species}'")]
    NonFinite {
        species: String,
        field: &'static str,
    },
    #[error("Missing intercept for species '{0}'")]
    MissingIntercept(String),
    #[error("{field} given for species '{species}' which has no coefficients")]
    UnknownSpecies {
        species: String,
        field: &'static str,
    },
    #[error("Ratio of species '{species}' refers to unknown descriptor '{descriptor}'")]
    UnknownDescriptor { species: String, descriptor: String },
    #[error("Ratios of species '{species}' should sum to 1.0, got {sum}")]
    RatioSum { species: String, sum: f64 },
    #[error("Ratios of species '{species}' have {found} descriptor(s), expected {expected}")]
    RatioDimension {
        species: String,
        expected: usize,
        found: usize,
    },
    #[error("Species '{0}' has no relation")]
    MissingSpecies(String),
    #[error("Expected {expected} descriptor value(s), got {found}")]
    DescriptorValues { expected: usize, found: usize },
    #[error("Cannot re-express relation over descriptors that do not contain '{0}'")]
    DescriptorNotCovered(String),
}

/// A fitted adsorption-energy scaling relation.
///
/// For each species `Z` the relation holds
///
/// ```text
/// Eads(Z) = c_0(Z) * Eads(D_0) + ... + c_n(Z) * Eads(D_n) + intercept(Z)
/// ```
///
/// where `D_0..D_n` are the descriptors. Alongside the coefficient matrix the
/// relation keeps the goodness-of-fit metric and the descriptor mixing ratios
/// each species was fitted with.
///
/// The value is validated on construction and by each `with_*` method, so an
/// invalid relation cannot exist. The dimensionality is derived from the
/// coefficient vectors and never stored.
#[derive(Debug, Clone, PartialEq)]
pub struct Relation {
    descriptors: Vec<String>,
    coefficients: SpeciesMap<Vec<f64>>,
    intercepts: SpeciesMap<f64>,
    metrics: SpeciesMap<f64>,
    ratios: SpeciesMap<BTreeMap<String, f64>>,
}

impl Relation {
    /// Creates and validates a relation.
    ///
    /// `descriptors` names the coefficient columns in order. It may be empty
    /// for relations whose descriptors are anonymous, in which case ratio keys
    /// are not checked against it.
    pub fn new(
        descriptors: Vec<String>,
        coefficients: SpeciesMap<Vec<f64>>,
        intercepts: SpeciesMap<f64>,
        metrics: SpeciesMap<f64>,
        ratios: SpeciesMap<BTreeMap<String, f64>>,
    ) -> Result<Self, RelationError> {
        let relation = Self {
            descriptors,
            coefficients,
            intercepts,
            metrics,
            ratios,
        };
        relation.validate()?;
        Ok(relation)
    }

    pub fn with_coefficients(
        self,
        coefficients: SpeciesMap<Vec<f64>>,
    ) -> Result<Self, RelationError> {
        Self::new(
            self.descriptors,
            coefficients,
            self.intercepts,
            self.metrics,
            self.ratios,
        )
    }

    pub fn with_intercepts(self, intercepts: SpeciesMap<f64>) -> Result<Self, RelationError> {
        Self::new(
            self.descriptors,
            self.coefficients,
            intercepts,
            self.metrics,
            self.ratios,
        )
    }

    pub fn with_metrics(self, metrics: SpeciesMap<f64>) -> Result<Self, RelationError> {
        Self::new(
            self.descriptors,
            self.coefficients,
            self.intercepts,
            metrics,
            self.ratios,
        )
    }

    pub fn with_ratios(
        self,
        ratios: SpeciesMap<BTreeMap<String, f64>>,
    ) -> Result<Self, RelationError> {
        Self::new(
            self.descriptors,
            self.coefficients,
            self.intercepts,
            self.metrics,
            ratios,
        )
    }

    fn validate(&self) -> Result<(), RelationError> {
        let dim = self
            .coefficients
            .values()
            .next()
            .map(Vec::len)
            .ok_or(RelationError::Empty)?;

        for (species, coefs) in &self.coefficients {
            if species.trim().is_empty() {
                return Err(RelationError::EmptyName);
            }
            if coefs.len() != dim {
                return Err(RelationError::LengthMismatch {
                    species: species.clone(),
                    expected: dim,
                    found: coefs.len(),
                });
            }
            if coefs.iter().any(|c| !c.is_finite()) {
                return Err(non_finite(species, "coefficient"));
            }
            match self.intercepts.get(species) {
                Some(intercept) if !intercept.is_finite() => {
                    return Err(non_finite(species, "intercept"));
                }
                Some(_) => {}
                None => return Err(RelationError::MissingIntercept(species.clone())),
            }
        }

        if !self.descriptors.is_empty() {
            if self.descriptors.len() != dim {
                return Err(RelationError::DescriptorCount {
                    descriptors: self.descriptors.len(),
                    dim,
                });
            }
            for (i, descriptor) in self.descriptors.iter().enumerate() {
                if descriptor.trim().is_empty() {
                    return Err(RelationError::EmptyName);
                }
                if self.descriptors[..i].contains(descriptor) {
                    return Err(RelationError::DuplicateDescriptor(descriptor.clone()));
                }
            }
        }

        self.check_known_species(self.intercepts.keys(), "intercept")?;
        self.check_known_species(self.metrics.keys(), "metric")?;
        self.check_known_species(self.ratios.keys(), "ratio")?;

        for (species, metric) in &self.metrics {
            if !metric.is_finite() {
                return Err(non_finite(species, "metric"));
            }
        }

        self.validate_ratios()
    }

    fn check_known_species<'a>(
        &self,
        mut names: impl Iterator<Item = &'a String>,
        field: &'static str,
    ) -> Result<(), RelationError> {
        match names.find(|name| !self.coefficients.contains_key(*name)) {
            Some(species) => Err(RelationError::UnknownSpecies {
                species: species.clone(),
                field,
            }),
            None => Ok(()),
        }
    }

    fn validate_ratios(&self) -> Result<(), RelationError> {
        let mut expected_len = None;
        for (species, ratios) in &self.ratios {
            let expected = *expected_len.get_or_insert(ratios.len());
            if ratios.len() != expected {
                return Err(RelationError::RatioDimension {
                    species: species.clone(),
                    expected,
                    found: ratios.len(),
                });
            }
            for (descriptor, value) in ratios {
                if !value.is_finite() {
                    return Err(non_finite(species, "ratio"));
                }
                if !self.descriptors.is_empty() && !self.descriptors.contains(descriptor) {
                    return Err(RelationError::UnknownDescriptor {
                        species: species.clone(),
                        descriptor: descriptor.clone(),
                    });
                }
            }
            let sum: f64 = ratios.values().sum();
            if (sum - 1.0).abs() > RATIO_SUM_TOLERANCE {
                return Err(RelationError::RatioSum {
                    species: species.clone(),
                    sum,
                });
            }
        }
        Ok(())
    }

    /// Number of descriptors, the length of every coefficient vector.
    pub fn dim(&self) -> usize {
        self.coefficients.values().next().map_or(0, Vec::len)
    }

    pub fn descriptors(&self) -> &[String] {
        &self.descriptors
    }

    pub fn coefficients(&self) -> &SpeciesMap<Vec<f64>> {
        &self.coefficients
    }

    pub fn intercepts(&self) -> &SpeciesMap<f64> {
        &self.intercepts
    }

    pub fn metrics(&self) -> &SpeciesMap<f64> {
        &self.metrics
    }

    pub fn ratios(&self) -> &SpeciesMap<BTreeMap<String, f64>> {
        &self.ratios
    }

    /// Species names in sorted order.
    pub fn species(&self) -> impl Iterator<Item = &str> {
        self.coefficients.keys().map(String::as_str)
    }

    pub fn contains(&self, species: &str) -> bool {
        self.coefficients.contains_key(species)
    }

    pub fn coefficient(&self, species: &str) -> Option<&[f64]> {
        self.coefficients.get(species).map(Vec::as_slice)
    }

    pub fn intercept(&self, species: &str) -> Option<f64> {
        self.intercepts.get(species).copied()
    }

    /// Species whose metric is below `threshold`, in sorted order.
    pub fn low_metrics(&self, threshold: f64) -> Vec<(&str, f64)> {
        self.metrics
            .iter()
            .filter(|(_, metric)| **metric < threshold)
            .map(|(species, metric)| (species.as_str(), *metric))
            .collect()
    }

    /// One [`Warning::LowMetric`] per poorly fitted species.
    pub fn warnings(&self, threshold: f64) -> Vec<Warning> {
        self.low_metrics(threshold)
            .into_iter()
            .map(|(species, metric)| Warning::LowMetric {
                species: species.to_string(),
                metric,
                threshold,
            })
            .collect()
    }

    /// Evaluates the relation of `species` at the given descriptor energies.
    pub fn predict(&self, species: &str, descriptor_values: &[f64]) -> Result<f64, RelationError> {
        let coefs = self
            .coefficients
            .get(species)
            .ok_or_else(|| RelationError::MissingSpecies(species.to_string()))?;
        if descriptor_values.len() != coefs.len() {
            return Err(RelationError::DescriptorValues {
                expected: coefs.len(),
                found: descriptor_values.len(),
            });
        }
        let linear: f64 = coefs.iter().zip(descriptor_values).map(|(c, x)| c * x).sum();
        Ok(linear + self.intercepts[species])
    }

    /// Re-expresses this relation over a superset of its descriptors.
    ///
    /// Coefficients of the new descriptors are zero and their ratios are 0.0,
    /// so predictions are unchanged. Relations fitted over different descriptor
    /// sets must be brought to a common set this way before being compared or
    /// combined.
    pub fn padded_to(&self, descriptors: &[String]) -> Result<Self, RelationError> {
        if self.descriptors.is_empty() {
            return Err(RelationError::DescriptorCount {
                descriptors: 0,
                dim: self.dim(),
            });
        }
        let positions = self
            .descriptors
            .iter()
            .map(|d| {
                descriptors
                    .iter()
                    .position(|target| target == d)
                    .ok_or_else(|| RelationError::DescriptorNotCovered(d.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let coefficients = self
            .coefficients
            .iter()
            .map(|(species, coefs)| {
                let mut padded = vec![0.0; descriptors.len()];
                for (coef, &pos) in coefs.iter().zip(&positions) {
                    padded[pos] = *coef;
                }
                (species.clone(), padded)
            })
            .collect();

        let ratios = self
            .ratios
            .iter()
            .map(|(species, ratios)| {
                let padded = descriptors
                    .iter()
                    .map(|d| (d.clone(), ratios.get(d).copied().unwrap_or(0.0)))
                    .collect();
                (species.clone(), padded)
            })
            .collect();

        Self::new(
            descriptors.to_vec(),
            coefficients,
            self.intercepts.clone(),
            self.metrics.clone(),
            ratios,
        )
    }

    fn column_labels(&self) -> Vec<String> {
        if self.descriptors.is_empty() {
            (0..self.dim()).map(|i| format!("coef_{i}")).collect()
        } else {
            self.descriptors.clone()
        }
    }
}

fn non_finite(species: &str, field: &'static str) -> RelationError {
    RelationError::NonFinite {
        species: species.to_string(),
        field,
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name_width = self
            .coefficients
            .keys()
            .map(String::len)
            .chain(std::iter::once("Species".len()))
            .max()
            .unwrap_or_default()
            + 2;

        write!(f, "{:<name_width$}", "Species")?;
        for label in self.column_labels() {
            write!(f, " {label:>10}")?;
        }
        writeln!(f, " {:>10}", "intercept")?;

        for (species, coefs) in &self.coefficients {
            write!(f, "{species:<name_width$}")?;
            for coef in coefs {
                write!(f, " {coef:>10.4}")?;
            }
            writeln!(f, " {:>10.4}", self.intercepts[species])?;
        }

        writeln!(f)?;
        writeln!(f, "Adsorbate Metrics")?;
        for (species, metric) in &self.metrics {
            writeln!(f, "{species:<name_width$} {metric:>10.4}")?;
        }

        writeln!(f)?;
        writeln!(f, "Adsorbate Ratios")?;
        for (species, ratios) in &self.ratios {
            let formatted: Vec<String> = ratios
                .iter()
                .map(|(descriptor, ratio)| format!("{descriptor}: {ratio:.2}"))
                .collect();
            writeln!(f, "{species:<name_width$} {}", formatted.join(", "))?;
        }
        Ok(())
    }
}
