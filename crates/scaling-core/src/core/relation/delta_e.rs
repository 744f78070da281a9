use crate::core::models::reaction::Reaction;
use nalgebra::DVector;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Clone)]
pub enum DeltaERelationError {
    #[error("Got {coefficients} coefficient vector(s) for {steps} reaction step(s)")]
    StepCount { steps: usize, coefficients: usize },
    #[error("Coefficient vector of step {step} has length {found}, expected {expected}")]
    LengthMismatch {
        step: usize,
        expected: usize,
        found: usize,
    },
    #[error("Non-finite coefficient in step {0}")]
    NonFinite(usize),
    #[error("Expected {expected} descriptor value(s), got {found}")]
    DescriptorValues { expected: usize, found: usize },
}

/// Reaction energy changes of every step of a reaction as linear functions of
/// the descriptors.
///
/// Each step owns a vector `[c_0, ..., c_n, constant]` so that
/// `ΔE(step) = Σ c_i * Eads(D_i) + constant`. All vectors share the length
/// `descriptors.len() + 1`.
#[derive(Debug, Clone, PartialEq)]
pub struct DeltaERelation {
    reaction: Reaction,
    descriptors: Vec<String>,
    coefficients: Vec<DVector<f64>>,
}

impl DeltaERelation {
    pub fn new(
        reaction: Reaction,
        descriptors: Vec<String>,
        coefficients: Vec<DVector<f64>>,
    ) -> Result<Self, DeltaERelationError> {
        if coefficients.len() != reaction.len() {
            return Err(DeltaERelationError::StepCount {
                steps: reaction.len(),
                coefficients: coefficients.len(),
            });
        }
        let expected = descriptors.len() + 1;
        for (step, coefs) in coefficients.iter().enumerate() {
            if coefs.len() != expected {
                return Err(DeltaERelationError::LengthMismatch {
                    step,
                    expected,
                    found: coefs.len(),
                });
            }
            if coefs.iter().any(|c| !c.is_finite()) {
                return Err(DeltaERelationError::NonFinite(step));
            }
        }
        Ok(Self {
            reaction,
            descriptors,
            coefficients,
        })
    }

    pub fn reaction(&self) -> &Reaction {
        &self.reaction
    }

    pub fn descriptors(&self) -> &[String] {
        &self.descriptors
    }

    pub fn coefficients(&self) -> &[DVector<f64>] {
        &self.coefficients
    }

    /// Number of descriptors. Each coefficient vector is one longer.
    pub fn dim(&self) -> usize {
        self.descriptors.len()
    }

    /// Energy change of every step at the given descriptor energies.
    pub fn evaluate(&self, descriptor_values: &[f64]) -> Result<Vec<f64>, DeltaERelationError> {
        if descriptor_values.len() != self.dim() {
            return Err(DeltaERelationError::DescriptorValues {
                expected: self.dim(),
                found: descriptor_values.len(),
            });
        }
        Ok(self
            .coefficients
            .iter()
            .map(|coefs| {
                let linear: f64 = coefs
                    .iter()
                    .zip(descriptor_values)
                    .map(|(c, x)| c * x)
                    .sum();
                linear + coefs[self.dim()]
            })
            .collect())
    }

    /// Index and energy change of the most endergonic step, or `None` for a
    /// reaction without steps. Ties go to the earlier step.
    pub fn limiting_step(
        &self,
        descriptor_values: &[f64],
    ) -> Result<Option<(usize, f64)>, DeltaERelationError> {
        let energies = self.evaluate(descriptor_values)?;
        Ok(energies
            .into_iter()
            .enumerate()
            .fold(None, |best, (i, e)| match best {
                Some((_, best_e)) if best_e >= e => best,
                _ => Some((i, e)),
            }))
    }

    /// Limiting potential `-max ΔE`, in volts when every step transfers one
    /// proton-electron pair and energies are in eV (computational hydrogen
    /// electrode).
    pub fn limiting_potential(
        &self,
        descriptor_values: &[f64],
    ) -> Result<Option<f64>, DeltaERelationError> {
        Ok(self
            .limiting_step(descriptor_values)?
            .map(|(_, delta_e)| -delta_e))
    }
}

impl fmt::Display for DeltaERelation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:<6}", "Step")?;
        for descriptor in &self.descriptors {
            write!(f, " {descriptor:>10}")?;
        }
        writeln!(f, " {:>10}", "constant")?;

        for ((i, coefs), step) in self.coefficients.iter().enumerate().zip(&self.reaction) {
            write!(f, "{i:<6}")?;
            for coef in coefs.iter() {
                write!(f, " {coef:>10.4}")?;
            }
            writeln!(f, "   {step}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn two_step_reaction() -> Reaction {
        "*A(-1, 0) -> *B(-2, 0)\n*B(-2, 0) -> *C(-3, 0)".parse().unwrap()
    }

    fn relation() -> DeltaERelation {
        DeltaERelation::new(
            two_step_reaction(),
            vec!["*X".to_string(), "*Y".to_string()],
            vec![
                DVector::from_vec(vec![1.0, 0.0, -0.5]),
                DVector::from_vec(vec![0.0, 2.0, 0.25]),
            ],
        )
        .unwrap()
    }

    #[test]
    fn new_rejects_step_count_mismatch() {
        let result = DeltaERelation::new(
            two_step_reaction(),
            vec!["*X".to_string()],
            vec![DVector::from_vec(vec![1.0, 0.0])],
        );
        assert_eq!(
            result,
            Err(DeltaERelationError::StepCount {
                steps: 2,
                coefficients: 1
            })
        );
    }

    #[test]
    fn new_rejects_vectors_of_wrong_length() {
        let result = DeltaERelation::new(
            two_step_reaction(),
            vec!["*X".to_string()],
            vec![
                DVector::from_vec(vec![1.0, 0.0]),
                DVector::from_vec(vec![1.0, 0.0, 3.0]),
            ],
        );
        assert_eq!(
            result,
            Err(DeltaERelationError::LengthMismatch {
                step: 1,
                expected: 2,
                found: 3
            })
        );
    }

    #[test]
    fn evaluate_returns_energy_change_per_step() {
        let energies = relation().evaluate(&[1.0, -1.0]).unwrap();
        assert_abs_diff_eq!(energies[0], 0.5);
        assert_abs_diff_eq!(energies[1], -1.75);

        assert_eq!(
            relation().evaluate(&[1.0]),
            Err(DeltaERelationError::DescriptorValues {
                expected: 2,
                found: 1
            })
        );
    }

    #[test]
    fn limiting_step_picks_largest_energy_change() {
        let relation = relation();
        assert_eq!(relation.limiting_step(&[1.0, -1.0]).unwrap(), Some((0, 0.5)));
        assert_eq!(relation.limiting_step(&[0.0, 1.0]).unwrap(), Some((1, 2.25)));
        assert_eq!(relation.limiting_potential(&[0.0, 1.0]).unwrap(), Some(-2.25));
    }

    #[test]
    fn limiting_step_of_empty_reaction_is_none() {
        let empty = DeltaERelation::new(Reaction::new(Vec::new()).unwrap(), Vec::new(), Vec::new())
            .unwrap();
        assert_eq!(empty.limiting_step(&[]).unwrap(), None);
    }

    #[test]
    fn display_lists_descriptors_and_steps() {
        let text = relation().to_string();
        assert!(text.starts_with("Step"));
        assert!(text.contains("*X"));
        assert!(text.contains("constant"));
        assert!(text.contains("1.0*A -> 1.0*B"));
    }
}
