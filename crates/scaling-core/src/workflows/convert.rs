use crate::core::models::reaction::{Reaction, ReactionStep};
use crate::core::models::species::Species;
use crate::core::relation::{DeltaERelation, DeltaERelationError, Relation};
use nalgebra::DVector;
use thiserror::Error;
use tracing::{debug, instrument};

#[derive(Debug, Error, PartialEq, Clone)]
pub enum ConversionError {
    #[error("Adsorbed species '{0}' has no fitted relation")]
    MissingRelation(String),
    #[error("Species '{0}' has no energy")]
    MissingEnergy(String),
    #[error("Contribution of '{species}' has length {found}, expected {expected}")]
    Dimension {
        species: String,
        expected: usize,
        found: usize,
    },
    #[error("Reaction energy relation is invalid: {0}")]
    DeltaE(#[from] DeltaERelationError),
}

/// Turns an adsorption energy relation into reaction energy changes.
///
/// With `ΔE = E(products) - E(reactants)`, a step contributes for every
/// species `n * [c_0, ..., c_n, intercept + energy + correction]`, where
/// free species carry zero coefficients and intercept.
#[derive(Debug, Clone, Copy)]
pub struct AdsorbToDeltaE<'a> {
    relation: &'a Relation,
    reaction: &'a Reaction,
}

impl<'a> AdsorbToDeltaE<'a> {
    pub fn new(relation: &'a Relation, reaction: &'a Reaction) -> Self {
        Self { relation, reaction }
    }

    /// Length of every step vector: one slot per descriptor plus the constant.
    pub fn width(&self) -> usize {
        self.relation.dim() + 1
    }

    fn contribution(&self, species: &Species) -> Result<DVector<f64>, ConversionError> {
        let label = species.label();
        let energy = species
            .energy()
            .ok_or_else(|| ConversionError::MissingEnergy(label.clone()))?;

        let mut vector = if species.is_adsorbed() {
            let coefficients = self
                .relation
                .coefficient(&label)
                .ok_or_else(|| ConversionError::MissingRelation(label.clone()))?;
            let intercept = self
                .relation
                .intercept(&label)
                .ok_or_else(|| ConversionError::MissingRelation(label.clone()))?;
            DVector::from_iterator(
                coefficients.len() + 1,
                coefficients.iter().copied().chain(std::iter::once(intercept)),
            )
        } else {
            DVector::zeros(self.width())
        };

        if vector.len() != self.width() {
            return Err(ConversionError::Dimension {
                species: label,
                expected: self.width(),
                found: vector.len(),
            });
        }
        vector[self.width() - 1] += energy + species.correction();
        Ok(vector)
    }

    /// Coefficient vector of one step's energy change.
    pub fn convert_step(&self, step: &ReactionStep) -> Result<DVector<f64>, ConversionError> {
        let mut accumulator = DVector::zeros(self.width());
        for (species, number) in step.signed_terms() {
            accumulator += self.contribution(species)? * number;
        }
        Ok(accumulator)
    }

    /// Converts every step of the reaction, in order.
    #[instrument(skip_all, name = "delta_e_conversion")]
    pub fn convert(&self) -> Result<DeltaERelation, ConversionError> {
        let coefficients = self
            .reaction
            .iter()
            .map(|step| self.convert_step(step))
            .collect::<Result<Vec<_>, _>>()?;
        debug!(steps = coefficients.len(), "Reaction steps converted.");

        let descriptors = if self.relation.descriptors().is_empty() {
            (0..self.relation.dim()).map(|i| format!("coef_{i}")).collect()
        } else {
            self.relation.descriptors().to_vec()
        };
        Ok(DeltaERelation::new(self.reaction.clone(), descriptors, coefficients)?)
    }
}
