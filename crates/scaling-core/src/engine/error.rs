use thiserror::Error;

use super::builder::MAX_RATIO_GRID_POINTS;
use crate::core::data::eads::TableError;
use crate::core::regression::RegressionError;
use crate::core::relation::RelationError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Adsorption energy table error: {source}")]
    Table {
        #[from]
        source: TableError,
    },

    #[error("Fitted relation is invalid: {source}")]
    Relation {
        #[from]
        source: RelationError,
    },

    #[error("Regression failed for species '{species}': {source}")]
    Regression {
        species: String,
        source: RegressionError,
    },

    #[error("Illegal step length {0}, expected a finite value in (0, 100)")]
    IllegalStepLength(f64),

    #[error(
        "Step length {step_length} needs {points} ratios per species, above the limit of {limit}",
        limit = MAX_RATIO_GRID_POINTS
    )]
    RatioGridTooFine { step_length: f64, points: f64 },

    #[error("Expect two descriptors for adaptive method, got {0}")]
    DescriptorCount(usize),

    #[error("Group member for traditional builder cannot be None (descriptor '{0}')")]
    MissingMembers(String),

    #[error("Composite descriptor needs at least one ratio")]
    EmptyRatios,

    #[error("Ratios should sum to 1.0, got {0}")]
    RatioSum(f64),

    #[error("Non-finite ratio for descriptor '{0}'")]
    NonFiniteRatio(String),
}
