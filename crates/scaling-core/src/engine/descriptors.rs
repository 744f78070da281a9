use crate::core::diagnostics::Warning;
use serde::Deserialize;
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum DescriptorError {
    #[error("At least one descriptor is required")]
    Empty,
    #[error("Descriptor names cannot be empty")]
    EmptyName,
    #[error("Duplicate descriptor '{0}'")]
    Duplicate(String),
    #[error("Invalid method '{0}', expected 'traditional' or 'adaptive'")]
    InvalidMethod(String),
}

/// How a relation is built from the descriptors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub enum Method {
    /// Each group member is approximated by its own single descriptor.
    Traditional,
    /// Every species is fitted against a searched mixture of two descriptors.
    Adaptive,
}

impl FromStr for Method {
    type Err = DescriptorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "traditional" => Ok(Self::Traditional),
            "adaptive" => Ok(Self::Adaptive),
            _ => Err(DescriptorError::InvalidMethod(s.to_string())),
        }
    }
}

impl TryFrom<String> for Method {
    type Error = DescriptorError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Traditional => f.write_str("traditional"),
            Self::Adaptive => f.write_str("adaptive"),
        }
    }
}

/// A descriptor and, for the traditional method, the species it approximates.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DescriptorGroup {
    pub descriptor: String,
    /// `None` marks a descriptor that takes part in an adaptive ratio search.
    #[serde(default)]
    pub members: Option<Vec<String>>,
}

/// The descriptors a relation is built on, in declaration order.
///
/// For CO2 reduction to methane the traditional grouping is:
///
/// ```text
/// *CO -> [*COOH, *CHO, *CH2O]   (C-centered)
/// *OH -> [*OCH3, *O]            (O-centered)
/// ```
///
/// while the adaptive method only names `*CO` and `*OH` and lets the builder
/// find the best mixture for every species.
#[derive(Debug, Clone, PartialEq)]
pub struct Descriptors {
    groups: Vec<DescriptorGroup>,
    method: Option<Method>,
}

impl Descriptors {
    /// Creates a descriptor specification.
    ///
    /// Descriptor names must be unique and non-empty. Members shared between
    /// groups, or members that are themselves descriptors, are accepted and
    /// reported by [`Descriptors::warnings`].
    pub fn new(
        groups: Vec<DescriptorGroup>,
        method: Option<Method>,
    ) -> Result<Self, DescriptorError> {
        if groups.is_empty() {
            return Err(DescriptorError::Empty);
        }
        let mut seen = HashSet::new();
        for group in &groups {
            if group.descriptor.trim().is_empty() {
                return Err(DescriptorError::EmptyName);
            }
            if !seen.insert(group.descriptor.as_str()) {
                return Err(DescriptorError::Duplicate(group.descriptor.clone()));
            }
        }

        let descriptors = Self { groups, method };
        for warning in descriptors.warnings() {
            warning.emit();
        }
        Ok(descriptors)
    }

    /// Groups for the traditional method, as `(descriptor, members)` pairs.
    pub fn traditional<D, M>(
        groups: impl IntoIterator<Item = (D, Vec<M>)>,
    ) -> Result<Self, DescriptorError>
    where
        D: Into<String>,
        M: Into<String>,
    {
        let groups = groups
            .into_iter()
            .map(|(descriptor, members)| DescriptorGroup {
                descriptor: descriptor.into(),
                members: Some(members.into_iter().map(Into::into).collect()),
            })
            .collect();
        Self::new(groups, Some(Method::Traditional))
    }

    /// Member-less descriptors for the adaptive method.
    pub fn adaptive<D: Into<String>>(
        descriptors: impl IntoIterator<Item = D>,
    ) -> Result<Self, DescriptorError> {
        let groups = descriptors
            .into_iter()
            .map(|descriptor| DescriptorGroup {
                descriptor: descriptor.into(),
                members: None,
            })
            .collect();
        Self::new(groups, Some(Method::Adaptive))
    }

    pub fn groups(&self) -> &[DescriptorGroup] {
        &self.groups
    }

    /// Descriptor names in declaration order.
    pub fn names(&self) -> Vec<&str> {
        self.groups.iter().map(|g| g.descriptor.as_str()).collect()
    }

    /// The declared method, or the one implied by the groups when none was
    /// declared: all groups with members is traditional, none is adaptive.
    pub fn method(&self) -> Option<Method> {
        self.method.or_else(|| {
            if self.groups.iter().all(|g| g.members.is_some()) {
                Some(Method::Traditional)
            } else if self.groups.iter().all(|g| g.members.is_none()) {
                Some(Method::Adaptive)
            } else {
                None
            }
        })
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn is_descriptor(&self, name: &str) -> bool {
        self.groups.iter().any(|g| g.descriptor == name)
    }

    pub fn warnings(&self) -> Vec<Warning> {
        let mut warnings = Vec::new();
        let mut seen = HashSet::new();
        let mut reported = HashSet::new();

        for member in self.groups.iter().flat_map(|g| g.members.iter().flatten()) {
            if self.is_descriptor(member) && reported.insert(member.as_str()) {
                warnings.push(Warning::DescriptorAsMember {
                    species: member.clone(),
                });
            }
            if !seen.insert(member.as_str()) && reported.insert(member.as_str()) {
                warnings.push(Warning::GroupOverlap {
                    species: member.clone(),
                });
            }
        }
        warnings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn traditional_keeps_declaration_order() {
        let descriptors = Descriptors::traditional([
            ("*CO", vec!["*COOH", "*CHO", "*CH2O"]),
            ("*OH", vec!["*OCH3", "*O"]),
        ])
        .unwrap();

        assert_eq!(descriptors.names(), vec!["*CO", "*OH"]);
        assert_eq!(descriptors.len(), 2);
        assert_eq!(descriptors.method(), Some(Method::Traditional));
        assert!(descriptors.warnings().is_empty());
    }

    #[test]
    fn adaptive_has_no_members() {
        let descriptors = Descriptors::adaptive(["*CO", "*OH"]).unwrap();
        assert_eq!(descriptors.names(), vec!["*CO", "*OH"]);
        assert!(descriptors.groups().iter().all(|g| g.members.is_none()));
        assert_eq!(descriptors.method(), Some(Method::Adaptive));
    }

    #[test]
    fn method_is_inferred_when_not_declared() {
        let group = |name: &str, members: Option<Vec<String>>| DescriptorGroup {
            descriptor: name.to_string(),
            members,
        };

        let adaptive = Descriptors::new(vec![group("*A", None), group("*B", None)], None).unwrap();
        assert_eq!(adaptive.method(), Some(Method::Adaptive));

        let mixed = Descriptors::new(
            vec![group("*A", None), group("*B", Some(vec!["*C".to_string()]))],
            None,
        )
        .unwrap();
        assert_eq!(mixed.method(), None);
    }

    #[test]
    fn overlapping_members_produce_a_warning() {
        let descriptors =
            Descriptors::traditional([("*CO", vec!["*COOH", "*O"]), ("*OH", vec!["*O", "*OCH3"])])
                .unwrap();
        assert_eq!(
            descriptors.warnings(),
            vec![Warning::GroupOverlap {
                species: "*O".to_string()
            }]
        );
    }

    #[test]
    fn descriptor_listed_as_member_produces_a_warning() {
        let descriptors =
            Descriptors::traditional([("*CO", vec!["*COOH"]), ("*OH", vec!["*CO"])]).unwrap();
        assert_eq!(
            descriptors.warnings(),
            vec![Warning::DescriptorAsMember {
                species: "*CO".to_string()
            }]
        );
    }

    #[test]
    fn invalid_specifications_are_rejected() {
        assert_eq!(
            Descriptors::adaptive(Vec::<String>::new()),
            Err(DescriptorError::Empty)
        );
        assert_eq!(
            Descriptors::adaptive(["*CO", "*CO"]),
            Err(DescriptorError::Duplicate("*CO".to_string()))
        );
        assert_eq!(
            Descriptors::adaptive(["*CO", " "]),
            Err(DescriptorError::EmptyName)
        );
    }

    #[test]
    fn method_parses_case_insensitively() {
        assert_eq!("Traditional".parse::<Method>(), Ok(Method::Traditional));
        assert_eq!(" ADAPTIVE ".parse::<Method>(), Ok(Method::Adaptive));
        assert_eq!(
            "greedy".parse::<Method>(),
            Err(DescriptorError::InvalidMethod("greedy".to_string()))
        );
    }

    #[test]
    fn groups_deserialize_with_optional_members() {
        #[derive(Deserialize)]
        struct Wrapper {
            groups: Vec<DescriptorGroup>,
            method: Method,
        }

        let parsed: Wrapper = toml::from_str(
            r#"
            method = "traditional"

            [[groups]]
            descriptor = "*CO"
            members = ["*COOH", "*CHO"]

            [[groups]]
            descriptor = "*OH"
            "#,
        )
        .unwrap();

        assert_eq!(parsed.method, Method::Traditional);
        assert_eq!(parsed.groups[0].members.as_ref().unwrap().len(), 2);
        assert_eq!(parsed.groups[1].members, None);
    }
}
