use super::species::{Species, SpeciesError};
use crate::core::diagnostics::Warning;
use std::fmt;
use std::ops::Index;
use std::str::FromStr;
use thiserror::Error;

const STEP_ARROW: &str = "->";
const TERM_SEPARATOR: &str = " + ";

#[derive(Debug, Error, PartialEq, Clone)]
pub enum ReactionError {
    #[error("Stoichiometric number of '{species}' must be finite, got {number}")]
    NonFiniteStoichiometry { species: String, number: f64 },
    #[error("Reaction step {index} duplicates step {original}")]
    DuplicateStep { index: usize, original: usize },
    #[error("Invalid reaction step '{0}': expected exactly one '->'")]
    MissingArrow(String),
    #[error("Species '{species}' is listed with corrections {first} and {second} on one side")]
    ConflictingCorrection {
        species: String,
        first: f64,
        second: f64,
    },
    #[error("Invalid stoichiometric number in '{0}'")]
    InvalidStoichiometry(String),
    #[error("Invalid species in '{term}': {source}")]
    Species {
        term: String,
        #[source]
        source: SpeciesError,
    },
}

/// One elementary step of a surface reaction.
///
/// Reactants and products are ordered lists of `(species, stoichiometric
/// number)`. The order is kept for display only; equality treats each side as
/// a map. Listing the same species twice on one side merges the numbers, as
/// long as both entries carry the same correction.
#[derive(Debug, Clone)]
pub struct ReactionStep {
    reactants: Vec<(Species, f64)>,
    products: Vec<(Species, f64)>,
}

impl ReactionStep {
    /// Creates and validates a reaction step.
    ///
    /// Negative stoichiometric numbers are accepted but reported through
    /// [`ReactionStep::warnings`] since they usually indicate a typo in the
    /// step definition.
    pub fn new(
        reactants: impl IntoIterator<Item = (Species, f64)>,
        products: impl IntoIterator<Item = (Species, f64)>,
    ) -> Result<Self, ReactionError> {
        let step = Self {
            reactants: merge_side(reactants)?,
            products: merge_side(products)?,
        };
        for warning in step.warnings() {
            warning.emit();
        }
        Ok(step)
    }

    pub fn reactants(&self) -> &[(Species, f64)] {
        &self.reactants
    }

    pub fn products(&self) -> &[(Species, f64)] {
        &self.products
    }

    /// Iterates over every species of the step with a signed stoichiometric
    /// number: negative for reactants and positive for products.
    pub fn signed_terms(&self) -> impl Iterator<Item = (&Species, f64)> {
        self.reactants
            .iter()
            .map(|(s, n)| (s, -n))
            .chain(self.products.iter().map(|(s, n)| (s, *n)))
    }

    /// Whether `other` is this step written backwards.
    pub fn is_reverse_of(&self, other: &ReactionStep) -> bool {
        same_side(&self.reactants, &other.products) && same_side(&self.products, &other.reactants)
    }

    pub fn warnings(&self) -> Vec<Warning> {
        self.reactants
            .iter()
            .chain(self.products.iter())
            .filter(|(_, number)| *number < 0.0)
            .map(|(species, number)| Warning::NegativeStoichiometry {
                species: species.label(),
                number: *number,
            })
            .collect()
    }
}

fn merge_side(
    terms: impl IntoIterator<Item = (Species, f64)>,
) -> Result<Vec<(Species, f64)>, ReactionError> {
    let mut merged: Vec<(Species, f64)> = Vec::new();
    for (species, number) in terms {
        if !number.is_finite() {
            return Err(ReactionError::NonFiniteStoichiometry {
                species: species.label(),
                number,
            });
        }
        match merged.iter_mut().find(|(existing, _)| *existing == species) {
            Some((existing, _)) if existing.correction() != species.correction() => {
                return Err(ReactionError::ConflictingCorrection {
                    species: species.label(),
                    first: existing.correction(),
                    second: species.correction(),
                });
            }
            Some((_, total)) => *total += number,
            None => merged.push((species, number)),
        }
    }
    Ok(merged)
}

fn same_side(a: &[(Species, f64)], b: &[(Species, f64)]) -> bool {
    a.len() == b.len()
        && a.iter()
            .all(|(species, number)| b.iter().any(|(s, n)| s == species && n == number))
}

impl PartialEq for ReactionStep {
    fn eq(&self, other: &Self) -> bool {
        same_side(&self.reactants, &other.reactants) && same_side(&self.products, &other.products)
    }
}

fn fmt_side(f: &mut fmt::Formatter<'_>, side: &[(Species, f64)]) -> fmt::Result {
    for (i, (species, number)) in side.iter().enumerate() {
        if i > 0 {
            f.write_str(TERM_SEPARATOR)?;
        }
        write!(f, "{:?}{}", number, species.label())?;
    }
    Ok(())
}

impl fmt::Display for ReactionStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt_side(f, &self.reactants)?;
        write!(f, " {STEP_ARROW} ")?;
        fmt_side(f, &self.products)
    }
}

/// Splits a term such as `2H2O_g(-1, 2)` into its stoichiometric number and
/// species notation. The number defaults to 1.0 when absent.
fn split_stoichiometric_number(term: &str) -> Result<(f64, &str), ReactionError> {
    let term = term.trim();
    let split = term
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(term.len());
    let (number, species) = term.split_at(split);
    if number.is_empty() {
        return Ok((1.0, species.trim()));
    }
    let number = number
        .parse::<f64>()
        .map_err(|_| ReactionError::InvalidStoichiometry(term.to_string()))?;
    Ok((number, species.trim()))
}

fn parse_side(side: &str) -> Result<Vec<(Species, f64)>, ReactionError> {
    let side = side.trim();
    if side.is_empty() {
        return Ok(Vec::new());
    }
    side.split(TERM_SEPARATOR)
        .map(|term| {
            let (number, notation) = split_stoichiometric_number(term)?;
            let species = notation
                .parse::<Species>()
                .map_err(|source| ReactionError::Species {
                    term: term.trim().to_string(),
                    source,
                })?;
            Ok((species, number))
        })
        .collect()
}

impl FromStr for ReactionStep {
    type Err = ReactionError;

    /// Parses notation such as `*A(-1, 0) + 2H2O_g(-2, 3) -> 2*B(-4, 0)`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut sides = s.split(STEP_ARROW);
        let (Some(lhs), Some(rhs), None) = (sides.next(), sides.next(), sides.next()) else {
            return Err(ReactionError::MissingArrow(s.trim().to_string()));
        };
        Self::new(parse_side(lhs)?, parse_side(rhs)?)
    }
}

/// An ordered pathway of unique reaction steps.
#[derive(Debug, Clone, PartialEq)]
pub struct Reaction {
    steps: Vec<ReactionStep>,
}

impl Reaction {
    /// Creates a reaction, rejecting steps that duplicate an earlier one.
    pub fn new(steps: Vec<ReactionStep>) -> Result<Self, ReactionError> {
        for (index, step) in steps.iter().enumerate() {
            if let Some(original) = steps[..index].iter().position(|s| s == step) {
                return Err(ReactionError::DuplicateStep { index, original });
            }
        }
        let reaction = Self { steps };
        for (first, second) in reaction.reversed_pairs() {
            Warning::ReversedStep { first, second }.emit();
        }
        Ok(reaction)
    }

    pub fn steps(&self) -> &[ReactionStep] {
        &self.steps
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ReactionStep> {
        self.steps.iter()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Index pairs `(i, j)` with `i < j` where step `j` reverses step `i`.
    pub fn reversed_pairs(&self) -> Vec<(usize, usize)> {
        let mut pairs = Vec::new();
        for (j, later) in self.steps.iter().enumerate() {
            for (i, earlier) in self.steps[..j].iter().enumerate() {
                if later.is_reverse_of(earlier) {
                    pairs.push((i, j));
                }
            }
        }
        pairs
    }

    /// Step warnings followed by one warning per reversed step pair.
    pub fn warnings(&self) -> Vec<Warning> {
        let mut warnings: Vec<Warning> = self.steps.iter().flat_map(|s| s.warnings()).collect();
        warnings.extend(
            self.reversed_pairs()
                .into_iter()
                .map(|(first, second)| Warning::ReversedStep { first, second }),
        );
        warnings
    }
}

impl Index<usize> for Reaction {
    type Output = ReactionStep;

    fn index(&self, index: usize) -> &Self::Output {
        &self.steps[index]
    }
}

impl<'a> IntoIterator for &'a Reaction {
    type Item = &'a ReactionStep;
    type IntoIter = std::slice::Iter<'a, ReactionStep>;

    fn into_iter(self) -> Self::IntoIter {
        self.steps.iter()
    }
}

impl fmt::Display for Reaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, step) in self.steps.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{step}")?;
        }
        Ok(())
    }
}

impl FromStr for Reaction {
    type Err = ReactionError;

    /// Parses one step per line. Blank lines and `#` comments are skipped.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let steps = s
            .lines()
            .map(|line| line.split('#').next().unwrap_or_default().trim())
            .filter(|line| !line.is_empty())
            .map(str::parse::<ReactionStep>)
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(steps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn species(name: &str, energy: f64, adsorbed: bool, state: &str) -> Species {
        Species::new(name, Some(energy), adsorbed, 0.0, state).unwrap()
    }

    fn co2_to_cooh() -> ReactionStep {
        ReactionStep::new(
            vec![
                (species("CO2", -1.0, true, "NA"), 1.0),
                (species("H+", -1.0, false, "aq"), 1.0),
                (species("e-", -1.0, false, "aq"), 1.0),
            ],
            vec![(species("COOH", -1.0, true, "NA"), 1.0)],
        )
        .unwrap()
    }

    #[test]
    fn new_keeps_reactants_and_products() {
        let step = co2_to_cooh();
        assert_eq!(step.reactants().len(), 3);
        assert_eq!(step.products().len(), 1);
        assert_eq!(step.products()[0].0.name(), "COOH");
    }

    #[test]
    fn display_lists_numbers_and_labels() {
        assert_eq!(
            co2_to_cooh().to_string(),
            "1.0*CO2 + 1.0H+_aq + 1.0e-_aq -> 1.0*COOH"
        );
    }

    #[test]
    fn repeated_species_are_merged() {
        let h2o = species("H2O", -2.0, false, "g");
        let step = ReactionStep::new(vec![(h2o.clone(), 1.0), (h2o, 1.5)], vec![]).unwrap();
        assert_eq!(step.reactants().len(), 1);
        assert_eq!(step.reactants()[0].1, 2.5);
    }

    #[test]
    fn repeated_species_with_different_corrections_are_rejected() {
        let h2o = Species::new("H2O", Some(-2.0), false, 0.5, "g").unwrap();
        let corrected = h2o.with_correction(1.5).unwrap();
        assert_eq!(corrected.correction(), 1.5);

        let result = ReactionStep::new(vec![(h2o.clone(), 1.0), (corrected, 1.0)], vec![]);
        assert_eq!(
            result.unwrap_err(),
            ReactionError::ConflictingCorrection {
                species: "H2O_g".to_string(),
                first: 0.5,
                second: 1.5,
            }
        );

        let same = h2o.with_correction(0.5).unwrap();
        let step = ReactionStep::new(vec![(h2o, 1.0), (same, 1.0)], vec![]).unwrap();
        assert_eq!(step.reactants().len(), 1);
        assert_eq!(step.reactants()[0].1, 2.0);
    }

    #[test]
    fn negative_stoichiometry_is_a_warning() {
        let step =
            ReactionStep::new(vec![(species("CO2", -1.0, true, "NA"), -1.0)], vec![]).unwrap();
        assert_eq!(
            step.warnings(),
            vec![Warning::NegativeStoichiometry {
                species: "*CO2".to_string(),
                number: -1.0
            }]
        );
    }

    #[test]
    fn non_finite_stoichiometry_is_rejected() {
        let result = ReactionStep::new(vec![(species("CO2", -1.0, true, "NA"), f64::NAN)], vec![]);
        assert!(matches!(
            result,
            Err(ReactionError::NonFiniteStoichiometry { .. })
        ));
    }

    #[test]
    fn equality_ignores_term_order() {
        let a = species("A", -1.0, true, "NA");
        let b = species("B", -2.0, false, "g");
        let c = species("C", -3.0, true, "NA");
        let forward =
            ReactionStep::new(vec![(a.clone(), 1.0), (b.clone(), 2.0)], vec![(c.clone(), 1.0)])
                .unwrap();
        let shuffled = ReactionStep::new(vec![(b, 2.0), (a, 1.0)], vec![(c, 1.0)]).unwrap();
        assert_eq!(forward, shuffled);
    }

    #[test]
    fn reverse_step_is_detected_but_not_equal() {
        let a = species("A", -1.0, true, "NA");
        let b = species("B", -2.0, true, "NA");
        let forward = ReactionStep::new(vec![(a.clone(), 1.0)], vec![(b.clone(), 1.0)]).unwrap();
        let backward = ReactionStep::new(vec![(b, 1.0)], vec![(a, 1.0)]).unwrap();

        assert!(forward.is_reverse_of(&backward));
        assert!(backward.is_reverse_of(&forward));
        assert_ne!(forward, backward);
        assert!(!forward.is_reverse_of(&forward));
    }

    #[test]
    fn split_stoichiometric_number_defaults_to_one() {
        assert_eq!(
            split_stoichiometric_number(" *CO2(0, 0) ").unwrap(),
            (1.0, "*CO2(0, 0)")
        );
        assert_eq!(
            split_stoichiometric_number(" 2H2O_g(-1, 2) ").unwrap(),
            (2.0, "H2O_g(-1, 2)")
        );
        assert_eq!(
            split_stoichiometric_number("0.5O2_g(-9, 0)").unwrap(),
            (0.5, "O2_g(-9, 0)")
        );
        assert!(split_stoichiometric_number("1.2.3*A").is_err());
    }

    #[test]
    fn from_str_matches_explicit_construction() {
        let parsed: ReactionStep = "*A(-1, 0) + 2H2O_g(-2, 3) -> 2*B(-4, 0)".parse().unwrap();

        let expected = ReactionStep::new(
            vec![
                (Species::new("A", Some(-1.0), true, 0.0, "NA").unwrap(), 1.0),
                (Species::new("H2O", Some(-2.0), false, 3.0, "g").unwrap(), 2.0),
            ],
            vec![(Species::new("B", Some(-4.0), true, 0.0, "NA").unwrap(), 2.0)],
        )
        .unwrap();
        assert_eq!(parsed, expected);

        let from_species = ReactionStep::new(
            vec![
                ("*A(-1, 0)".parse::<Species>().unwrap(), 1.0),
                ("H2O_g(-2, 3)".parse::<Species>().unwrap(), 2.0),
            ],
            vec![("*B(-4, 0)".parse::<Species>().unwrap(), 2.0)],
        )
        .unwrap();
        assert_eq!(parsed, from_species);
    }

    #[test]
    fn from_str_handles_charged_species_and_empty_sides() {
        let step: ReactionStep =
            "*COOH(-3, 0) + H+_aq(0, 0) + e-_aq(0, 0) -> *CO(-2, 0) + H2O_l(-2.4, 0)"
                .parse()
                .unwrap();
        assert_eq!(step.reactants().len(), 3);
        assert_eq!(step.reactants()[1].0.name(), "H+");
        assert_eq!(step.products().len(), 2);

        let desorption: ReactionStep = "*CH4(-1, 0) -> ".parse().unwrap();
        assert!(desorption.products().is_empty());
    }

    #[test]
    fn from_str_rejects_missing_or_repeated_arrow() {
        assert!(matches!(
            "*A(-1, 0) + *B(-1, 0)".parse::<ReactionStep>(),
            Err(ReactionError::MissingArrow(_))
        ));
        assert!(matches!(
            "*A(-1, 0) -> *B(-1, 0) -> *C(-1, 0)".parse::<ReactionStep>(),
            Err(ReactionError::MissingArrow(_))
        ));
        assert!(matches!(
            "*A(-1, 0, 2) -> *B(-1, 0)".parse::<ReactionStep>(),
            Err(ReactionError::Species { .. })
        ));
    }

    #[test]
    fn reaction_rejects_duplicate_steps() {
        let result = Reaction::new(vec![co2_to_cooh(), co2_to_cooh()]);
        assert_eq!(
            result,
            Err(ReactionError::DuplicateStep {
                index: 1,
                original: 0
            })
        );
    }

    #[test]
    fn reaction_reports_reversed_pairs() {
        let forward: ReactionStep = "*A(-1, 0) -> *B(-2, 0)".parse().unwrap();
        let other: ReactionStep = "*B(-2, 0) -> *C(-3, 0)".parse().unwrap();
        let backward: ReactionStep = "*B(-2, 0) -> *A(-1, 0)".parse().unwrap();
        let reaction = Reaction::new(vec![forward, other, backward]).unwrap();

        assert_eq!(reaction.reversed_pairs(), vec![(0, 2)]);
        assert_eq!(
            reaction.warnings(),
            vec![Warning::ReversedStep { first: 0, second: 2 }]
        );
    }

    #[test]
    fn reaction_from_str_skips_comments_and_blank_lines() {
        let reaction: Reaction = "
            # CO2 to COOH
            *CO2(-1, 0) + H+_aq(0, 0) + e-_aq(0, 0) -> *COOH(-2, 0)

            *COOH(-2, 0) + H+_aq(0, 0) + e-_aq(0, 0) -> *CO(-3, 0) + H2O_l(-2.4, 0)  # dehydration
        "
        .parse()
        .unwrap();

        assert_eq!(reaction.len(), 2);
        assert_eq!(reaction[1].products().len(), 2);
        assert_eq!(reaction.iter().count(), 2);
        assert_eq!(reaction.steps()[0], reaction[0]);
    }
}
