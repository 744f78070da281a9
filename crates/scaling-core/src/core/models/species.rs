use crate::core::diagnostics::Warning;
use serde::Deserialize;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use thiserror::Error;

/// Errors raised while constructing or parsing a [`Species`].
#[derive(Debug, Error, PartialEq, Clone)]
pub enum SpeciesError {
    #[error("Species name cannot be empty")]
    EmptyName,
    #[error("Invalid physical state '{0}', supported: g, l, s, aq, NA")]
    InvalidState(String),
    #[error("Energy of species '{name}' must be finite, got {value}")]
    NonFiniteEnergy { name: String, value: f64 },
    #[error("Correction of species '{name}' must be finite, got {value}")]
    NonFiniteCorrection { name: String, value: f64 },
    #[error("Invalid format for energy and correction in '{0}'")]
    InvalidEnergyFormat(String),
}

/// Physical state of a free (non-adsorbed) species.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PhysicalState {
    Gas,
    Liquid,
    Solid,
    Aqueous,
    /// Not applicable, the state used for adsorbed species.
    #[default]
    NotApplicable,
}

impl PhysicalState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gas => "g",
            Self::Liquid => "l",
            Self::Solid => "s",
            Self::Aqueous => "aq",
            Self::NotApplicable => "NA",
        }
    }
}

impl FromStr for PhysicalState {
    type Err = SpeciesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "g" => Ok(Self::Gas),
            "l" => Ok(Self::Liquid),
            "s" => Ok(Self::Solid),
            "aq" => Ok(Self::Aqueous),
            "NA" => Ok(Self::NotApplicable),
            other => Err(SpeciesError::InvalidState(other.to_string())),
        }
    }
}

impl fmt::Display for PhysicalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A chemical species taking part in a surface reaction.
///
/// `Species` is an immutable value type. Two species are the same entity only
/// when name, adsorption flag, energy and physical state all match, which makes
/// them usable as keys of stoichiometric maps. The correction term (zero-point
/// energy, solvation and such) does not participate in identity.
///
/// For an adsorbed species the energy is the free-species reference energy that
/// gets added on top of the fitted adsorption energy when a relation is
/// converted to reaction energy changes.
#[derive(Debug, Clone, Deserialize)]
#[serde(try_from = "SpeciesRecord")]
pub struct Species {
    name: String,
    energy: Option<f64>,
    adsorbed: bool,
    correction: f64,
    state: PhysicalState,
}

/// Raw, unvalidated species fields as they appear in configuration files.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SpeciesRecord {
    name: String,
    #[serde(default)]
    energy: Option<f64>,
    adsorbed: bool,
    #[serde(default)]
    correction: f64,
    #[serde(default = "default_state")]
    state: String,
}

fn default_state() -> String {
    PhysicalState::NotApplicable.as_str().to_string()
}

impl TryFrom<SpeciesRecord> for Species {
    type Error = SpeciesError;

    fn try_from(record: SpeciesRecord) -> Result<Self, Self::Error> {
        Species::new(
            &record.name,
            record.energy,
            record.adsorbed,
            record.correction,
            &record.state,
        )
    }
}

impl Species {
    /// Creates and validates a species.
    ///
    /// # Errors
    ///
    /// Fails for an empty name, an unknown physical state, or a non-finite
    /// energy or correction. A non-negative energy is accepted but logged.
    pub fn new(
        name: &str,
        energy: Option<f64>,
        adsorbed: bool,
        correction: f64,
        state: &str,
    ) -> Result<Self, SpeciesError> {
        let state = state.parse::<PhysicalState>()?;
        Self::with_state(name, energy, adsorbed, correction, state)
    }

    /// Shorthand for an adsorbed species with no correction.
    pub fn adsorbed(name: &str, energy: f64) -> Result<Self, SpeciesError> {
        Self::with_state(name, Some(energy), true, 0.0, PhysicalState::NotApplicable)
    }

    /// Shorthand for a free species with no correction and no declared state.
    pub fn free(name: &str, energy: f64) -> Result<Self, SpeciesError> {
        Self::with_state(name, Some(energy), false, 0.0, PhysicalState::NotApplicable)
    }

    pub fn with_state(
        name: &str,
        energy: Option<f64>,
        adsorbed: bool,
        correction: f64,
        state: PhysicalState,
    ) -> Result<Self, SpeciesError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(SpeciesError::EmptyName);
        }
        if let Some(value) = energy {
            if !value.is_finite() {
                return Err(SpeciesError::NonFiniteEnergy {
                    name: name.to_string(),
                    value,
                });
            }
        }
        if !correction.is_finite() {
            return Err(SpeciesError::NonFiniteCorrection {
                name: name.to_string(),
                value: correction,
            });
        }

        let species = Self {
            name: name.to_string(),
            energy,
            adsorbed,
            correction,
            state,
        };
        for warning in species.warnings() {
            warning.emit();
        }
        Ok(species)
    }

    /// Returns a copy of this species with a different correction term.
    pub fn with_correction(&self, correction: f64) -> Result<Self, SpeciesError> {
        Self::with_state(
            &self.name,
            self.energy,
            self.adsorbed,
            correction,
            self.state,
        )
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn energy(&self) -> Option<f64> {
        self.energy
    }

    pub fn is_adsorbed(&self) -> bool {
        self.adsorbed
    }

    pub fn correction(&self) -> f64 {
        self.correction
    }

    pub fn state(&self) -> PhysicalState {
        self.state
    }

    /// The label used in reaction notation: `*` prefix when adsorbed and a
    /// `_state` suffix when a physical state is declared.
    pub fn label(&self) -> String {
        let prefix = if self.adsorbed { "*" } else { "" };
        match self.state {
            PhysicalState::NotApplicable => format!("{prefix}{}", self.name),
            state => format!("{prefix}{}_{state}", self.name),
        }
    }

    /// Quality warnings derived from this species' values.
    pub fn warnings(&self) -> Vec<Warning> {
        match self.energy {
            Some(energy) if energy >= 0.0 => vec![Warning::NonNegativeEnergy {
                species: self.label(),
                energy,
            }],
            _ => Vec::new(),
        }
    }

    fn energy_key(&self) -> Option<u64> {
        // +0.0 and -0.0 compare equal, so they must hash equal too.
        self.energy
            .map(|e| if e == 0.0 { 0.0f64.to_bits() } else { e.to_bits() })
    }
}

impl PartialEq for Species {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.adsorbed == other.adsorbed
            && self.energy_key() == other.energy_key()
            && self.state == other.state
    }
}

impl Eq for Species {}

impl Hash for Species {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
        self.adsorbed.hash(state);
        self.energy_key().hash(state);
        self.state.hash(state);
    }
}

impl fmt::Display for Species {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.energy {
            Some(energy) => write!(f, "{}({:?}, {:?})", self.label(), energy, self.correction),
            None => f.write_str(&self.label()),
        }
    }
}

impl FromStr for Species {
    type Err = SpeciesError;

    /// Parses notation such as `*CO2(-1.0, -2.0)` or `H2O_g(-2, 3)`.
    ///
    /// A leading `*` marks an adsorbed species, a trailing `_g`, `_l`, `_s` or
    /// `_aq` sets the physical state, and the optional parenthesized pair is
    /// `(energy, correction)`. Without parentheses the energy is unset.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();

        let (head, values) = match s.find('(') {
            Some(open) => {
                let inner = s[open + 1..]
                    .strip_suffix(')')
                    .ok_or_else(|| SpeciesError::InvalidEnergyFormat(s.to_string()))?;
                (&s[..open], Some(inner))
            }
            None => (s, None),
        };

        let (energy, correction) = match values {
            Some(inner) => {
                let parts: Vec<&str> = inner.split(',').map(str::trim).collect();
                let [energy, correction] = parts.as_slice() else {
                    return Err(SpeciesError::InvalidEnergyFormat(s.to_string()));
                };
                let energy = energy
                    .parse::<f64>()
                    .map_err(|_| SpeciesError::InvalidEnergyFormat(s.to_string()))?;
                let correction = correction
                    .parse::<f64>()
                    .map_err(|_| SpeciesError::InvalidEnergyFormat(s.to_string()))?;
                (Some(energy), correction)
            }
            None => (None, 0.0),
        };

        let head = head.trim();
        let (adsorbed, name) = match head.strip_prefix('*') {
            Some(rest) => (true, rest),
            None => (false, head),
        };

        let (name, state) = match name.rsplit_once('_') {
            Some((base, suffix)) if !base.is_empty() => match suffix.parse::<PhysicalState>() {
                Ok(state) if state != PhysicalState::NotApplicable => (base, state),
                _ => (name, PhysicalState::NotApplicable),
            },
            _ => (name, PhysicalState::NotApplicable),
        };

        Self::with_state(name, energy, adsorbed, correction, state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn new_sets_all_fields() {
        let species = Species::new("CO2", Some(-1.0), true, -2.0, "NA").unwrap();
        assert_eq!(species.name(), "CO2");
        assert_eq!(species.energy(), Some(-1.0));
        assert!(species.is_adsorbed());
        assert_eq!(species.correction(), -2.0);
        assert_eq!(species.state(), PhysicalState::NotApplicable);
    }

    #[test]
    fn new_rejects_bogus_state() {
        let result = Species::new("X", Some(-1.0), true, 0.0, "bogus");
        assert_eq!(result, Err(SpeciesError::InvalidState("bogus".to_string())));
    }

    #[test]
    fn new_rejects_empty_name_and_non_finite_values() {
        assert_eq!(
            Species::adsorbed("  ", -1.0),
            Err(SpeciesError::EmptyName)
        );
        assert!(matches!(
            Species::adsorbed("CO", f64::NAN),
            Err(SpeciesError::NonFiniteEnergy { .. })
        ));
        assert!(matches!(
            Species::new("CO", Some(-1.0), true, f64::INFINITY, "NA"),
            Err(SpeciesError::NonFiniteCorrection { .. })
        ));
    }

    #[test]
    fn non_negative_energy_is_a_warning_not_an_error() {
        let species = Species::adsorbed("CO", 0.5).unwrap();
        assert_eq!(
            species.warnings(),
            vec![Warning::NonNegativeEnergy {
                species: "*CO".to_string(),
                energy: 0.5
            }]
        );
        assert!(Species::adsorbed("CO", -0.5).unwrap().warnings().is_empty());
    }

    #[test]
    fn equality_ignores_correction() {
        let a = Species::new("CO2", Some(-1.0), true, 0.0, "NA").unwrap();
        let b = Species::new("CO2", Some(-1.0), true, 5.0, "NA").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn equality_considers_energy_state_and_adsorption() {
        let base = Species::new("H2O", Some(-2.0), false, 0.0, "g").unwrap();
        assert_ne!(base, Species::new("H2O", Some(-3.0), false, 0.0, "g").unwrap());
        assert_ne!(base, Species::new("H2O", Some(-2.0), false, 0.0, "l").unwrap());
        assert_ne!(base, Species::new("H2O", Some(-2.0), true, 0.0, "g").unwrap());
        assert_ne!(base, Species::new("H2O", None, false, 0.0, "g").unwrap());
    }

    #[test]
    fn species_work_as_map_keys() {
        let a = Species::new("CO2", Some(-1.0), true, 0.0, "NA").unwrap();
        let same = Species::new("CO2", Some(-1.0), true, 1.0, "NA").unwrap();
        let mut map = HashMap::new();
        map.insert(a, 1.0);
        assert_eq!(map.get(&same), Some(&1.0));
    }

    #[test]
    fn display_follows_reaction_notation() {
        let adsorbed = Species::new("CO2", Some(-1.0), true, -2.0, "NA").unwrap();
        assert_eq!(adsorbed.to_string(), "*CO2(-1.0, -2.0)");

        let free = Species::new("H2O", Some(-2.0), false, -3.0, "g").unwrap();
        assert_eq!(free.to_string(), "H2O_g(-2.0, -3.0)");

        let bare = Species::new("OH", None, true, 0.0, "NA").unwrap();
        assert_eq!(bare.to_string(), "*OH");
    }

    #[test]
    fn from_str_parses_adsorbed_and_free_species() {
        let adsorbed: Species = "*CO2(-1.0, -2.0)".parse().unwrap();
        assert_eq!(adsorbed, Species::new("CO2", Some(-1.0), true, -2.0, "NA").unwrap());
        assert_eq!(adsorbed.correction(), -2.0);

        let free: Species = " H2O_g(-2, 3) ".parse().unwrap();
        assert_eq!(free, Species::new("H2O", Some(-2.0), false, 3.0, "g").unwrap());
        assert_eq!(free.correction(), 3.0);
    }

    #[test]
    fn from_str_keeps_unknown_suffixes_in_the_name() {
        let species: Species = "*CH2_OH(-1, 0)".parse().unwrap();
        assert_eq!(species.name(), "CH2_OH");
        assert_eq!(species.state(), PhysicalState::NotApplicable);

        let electron: Species = "e-_aq(0, 0)".parse().unwrap();
        assert_eq!(electron.name(), "e-");
        assert_eq!(electron.state(), PhysicalState::Aqueous);
    }

    #[test]
    fn from_str_without_values_leaves_energy_unset() {
        let species: Species = "*OH".parse().unwrap();
        assert_eq!(species.energy(), None);
        assert!(species.is_adsorbed());
    }

    #[test]
    fn from_str_rejects_malformed_values() {
        assert!(matches!(
            "H2O_g(-2.0, -3.0, invalid)".parse::<Species>(),
            Err(SpeciesError::InvalidEnergyFormat(_))
        ));
        assert!(matches!(
            "H2O_g(-2.0)".parse::<Species>(),
            Err(SpeciesError::InvalidEnergyFormat(_))
        ));
        assert!(matches!(
            "H2O_g(-2.0, x)".parse::<Species>(),
            Err(SpeciesError::InvalidEnergyFormat(_))
        ));
        assert!(matches!(
            "H2O_g(-2.0, 1".parse::<Species>(),
            Err(SpeciesError::InvalidEnergyFormat(_))
        ));
    }

    #[test]
    fn deserializes_from_record_with_defaults() {
        #[derive(Deserialize)]
        struct Wrapper {
            species: Species,
        }

        let full: Wrapper = toml::from_str(
            r#"
            [species]
            name = "CO2"
            energy = -2.5
            adsorbed = true
            correction = 0.1
            "#,
        )
        .unwrap();
        assert_eq!(full.species, Species::new("CO2", Some(-2.5), true, 0.1, "NA").unwrap());
        assert_eq!(full.species.correction(), 0.1);

        let partial: Wrapper = toml::from_str(
            r#"
            [species]
            name = "H2O"
            energy = -2.0
            adsorbed = false
            "#,
        )
        .unwrap();
        assert_eq!(partial.species.correction(), 0.0);
        assert_eq!(partial.species.state(), PhysicalState::NotApplicable);
    }

    #[test]
    fn deserialization_requires_adsorbed_and_valid_state() {
        #[derive(Debug, Deserialize)]
        #[allow(dead_code)]
        struct Wrapper {
            species: Species,
        }

        let missing = toml::from_str::<Wrapper>(
            r#"
            [species]
            name = "H2O"
            energy = -2.0
            "#,
        );
        assert!(missing.is_err());

        let bad_state = toml::from_str::<Wrapper>(
            r#"
            [species]
            name = "H2O"
            energy = -2.0
            adsorbed = false
            state = "plasma"
            "#,
        );
        assert!(bad_state.is_err());
    }
}
