use std::fmt;

/// A non-fatal quality notice raised while validating inputs or fitting relations.
///
/// Warnings never abort an operation. They are returned next to the result
/// (or exposed through a `warnings()` query on the validated object) so that
/// callers can decide whether a human should review the input, and each one is
/// also emitted through `tracing` at the point it is detected.
#[derive(Debug, Clone, PartialEq)]
pub enum Warning {
    /// A fit whose goodness-of-fit score fell below the review threshold.
    LowMetric {
        species: String,
        metric: f64,
        threshold: f64,
    },
    /// A reaction step that uses a negative stoichiometric number.
    NegativeStoichiometry { species: String, number: f64 },
    /// Two steps of a reaction that are the same elementary step written backwards.
    ReversedStep { first: usize, second: usize },
    /// A species that is listed as a member of more than one descriptor group.
    GroupOverlap { species: String },
    /// A group member that is itself one of the nominated descriptors.
    DescriptorAsMember { species: String },
    /// A step length above the accuracy advisory limit.
    CoarseStepLength(f64),
    /// A step length below the performance advisory limit.
    FineStepLength(f64),
    /// An adsorption energy that is zero or positive.
    NonNegativeEnergy { species: String, energy: f64 },
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LowMetric {
                species,
                metric,
                threshold,
            } => write!(
                f,
                "Low metric {metric:.3} for '{species}' (threshold {threshold:.3}), the fit may need review"
            ),
            Self::NegativeStoichiometry { species, number } => write!(
                f,
                "Negative stoichiometric number {number} found for '{species}'"
            ),
            Self::ReversedStep { first, second } => {
                write!(f, "Step {second} is the reverse of step {first}")
            }
            Self::GroupOverlap { species } => {
                write!(f, "Descriptor group members overlap on '{species}'")
            }
            Self::DescriptorAsMember { species } => write!(
                f,
                "Descriptor '{species}' is also listed as a group member and will not be re-fit"
            ),
            Self::CoarseStepLength(step) => {
                write!(f, "Large step length {step} may harm accuracy")
            }
            Self::FineStepLength(step) => {
                write!(f, "Small step length {step} may slow down searching")
            }
            Self::NonNegativeEnergy { species, energy } => {
                write!(f, "Non-negative energy {energy} found for '{species}'")
            }
        }
    }
}

impl Warning {
    /// Logs this warning through `tracing` and hands it back for collection.
    pub(crate) fn emit(self) -> Self {
        tracing::warn!("{}", self);
        self
    }
}
