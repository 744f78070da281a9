use super::config::BuilderConfig;
use super::descriptors::{Descriptors, Method};
use super::error::EngineError;
use super::progress::{Progress, ProgressReporter};
use crate::core::data::eads::{EadsTable, TableError};
use crate::core::diagnostics::Warning;
use crate::core::regression::{LinearFit, OrdinaryLeastSquares, Regressor};
use crate::core::relation::eads::{Relation, SpeciesMap};
use nalgebra::DVector;
use std::collections::BTreeMap;
use tracing::{debug, info, instrument};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Absolute tolerance on the ratio sum of a composite descriptor.
pub const COMPOSITE_RATIO_TOLERANCE: f64 = 1e-4;

/// A later ratio must beat the best score by more than this to replace it.
const SCORE_TIE_TOLERANCE: f64 = 1e-9;
/// Largest ratio grid the adaptive search will scan per species, reached at a
/// step length of 0.001 percent.
pub const MAX_RATIO_GRID_POINTS: usize = 100_001;

const COARSE_STEP_LENGTH: f64 = 5.0;
const FINE_STEP_LENGTH: f64 = 0.1;

/// Linear fit of one species against a weighted mixture of descriptors.
#[derive(Debug, Clone, PartialEq)]
pub struct SpeciesFit {
    /// `slope * ratio` for each ratio entry, in the order given.
    pub coefficients: Vec<f64>,
    pub intercept: f64,
    pub metric: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BuildOutcome {
    pub relation: Relation,
    pub warnings: Vec<Warning>,
}

#[derive(Default)]
struct RelationParts {
    coefficients: SpeciesMap<Vec<f64>>,
    intercepts: SpeciesMap<f64>,
    metrics: SpeciesMap<f64>,
    ratios: SpeciesMap<BTreeMap<String, f64>>,
}

impl RelationParts {
    fn insert(&mut self, species: &str, fit: SpeciesFit, ratios: BTreeMap<String, f64>) {
        self.coefficients.insert(species.to_string(), fit.coefficients);
        self.intercepts.insert(species.to_string(), fit.intercept);
        self.metrics.insert(species.to_string(), fit.metric);
        self.ratios.insert(species.to_string(), ratios);
    }

    fn into_relation(self, descriptors: &[&str]) -> Result<Relation, EngineError> {
        Ok(Relation::new(
            descriptors.iter().map(|d| d.to_string()).collect(),
            self.coefficients,
            self.intercepts,
            self.metrics,
            self.ratios,
        )?)
    }
}

/// Fits scaling relations over a borrowed adsorption energy table.
///
/// The table is borrowed for the lifetime of the builder, so it cannot change
/// while a relation is being built.
pub struct Builder<'a, R = OrdinaryLeastSquares> {
    data: &'a EadsTable,
    regressor: R,
    config: BuilderConfig,
    reporter: Option<&'a ProgressReporter<'a>>,
}

impl<'a> Builder<'a, OrdinaryLeastSquares> {
    pub fn new(data: &'a EadsTable) -> Self {
        Self {
            data,
            regressor: OrdinaryLeastSquares,
            config: BuilderConfig::default(),
            reporter: None,
        }
    }
}

impl<'a, R: Regressor> Builder<'a, R> {
    pub fn with_regressor<S: Regressor>(self, regressor: S) -> Builder<'a, S> {
        Builder {
            data: self.data,
            regressor,
            config: self.config,
            reporter: self.reporter,
        }
    }

    pub fn with_config(mut self, config: BuilderConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_reporter(mut self, reporter: &'a ProgressReporter<'a>) -> Self {
        self.reporter = Some(reporter);
        self
    }

    pub fn config(&self) -> &BuilderConfig {
        &self.config
    }

    fn report(&self, event: Progress) {
        if let Some(reporter) = self.reporter {
            reporter.report(event);
        }
    }

    /// Weighted sum of descriptor columns, `Σ ratio_i * Eads(D_i)`.
    ///
    /// The ratios must sum to 1 within [`COMPOSITE_RATIO_TOLERANCE`].
    pub fn build_composite_descriptor(
        &self,
        ratios: &[(&str, f64)],
    ) -> Result<DVector<f64>, EngineError> {
        if ratios.is_empty() {
            return Err(EngineError::EmptyRatios);
        }
        if let Some((name, _)) = ratios.iter().find(|(_, r)| !r.is_finite()) {
            return Err(EngineError::NonFiniteRatio(name.to_string()));
        }
        let sum: f64 = ratios.iter().map(|(_, r)| r).sum();
        if (sum - 1.0).abs() > COMPOSITE_RATIO_TOLERANCE {
            return Err(EngineError::RatioSum(sum));
        }

        let mut composite = DVector::zeros(self.data.samples().len());
        for (name, ratio) in ratios {
            composite += self.data.column(name)? * *ratio;
        }
        Ok(composite)
    }

    /// Regresses `species` on the composite descriptor built from `ratios`.
    pub fn fit_species(
        &self,
        species: &str,
        ratios: &[(&str, f64)],
    ) -> Result<SpeciesFit, EngineError> {
        let composite = self.build_composite_descriptor(ratios)?;
        let target = self.data.column(species)?;
        let fit = self.regress(species, &composite, &target)?;
        Ok(SpeciesFit {
            coefficients: ratios.iter().map(|(_, r)| fit.slope * r).collect(),
            intercept: fit.intercept,
            metric: fit.score,
        })
    }

    fn regress(
        &self,
        species: &str,
        x: &DVector<f64>,
        y: &DVector<f64>,
    ) -> Result<LinearFit, EngineError> {
        self.regressor
            .fit(x, y)
            .map_err(|source| EngineError::Regression {
                species: species.to_string(),
                source,
            })
    }

    /// Builds a relation with `method`. The adaptive search uses the configured
    /// step length.
    pub fn build(
        &self,
        method: Method,
        descriptors: &Descriptors,
    ) -> Result<BuildOutcome, EngineError> {
        match method {
            Method::Traditional => self.build_traditional(descriptors),
            Method::Adaptive => self.build_adaptive(descriptors, self.config.step_length),
        }
    }

    /// Builds a relation where every group member is fitted against its own
    /// descriptor alone.
    ///
    /// Coefficients span all descriptors in declaration order, with zeros for
    /// the descriptors of other groups. Each descriptor is represented by
    /// itself: coefficient 1 on its own column, intercept 0 and metric 1. A
    /// member listed in several groups keeps the fit of the last group. Every
    /// group must list at least one member.
    #[instrument(skip_all, name = "traditional_build")]
    pub fn build_traditional(
        &self,
        descriptors: &Descriptors,
    ) -> Result<BuildOutcome, EngineError> {
        let names = descriptors.names();
        let mut work = Vec::new();
        for (index, group) in descriptors.groups().iter().enumerate() {
            let members = group
                .members
                .as_ref()
                .filter(|members| !members.is_empty())
                .ok_or_else(|| EngineError::MissingMembers(group.descriptor.clone()))?;
            if !self.data.has_adsorbate(&group.descriptor) {
                return Err(TableError::UnknownAdsorbate(group.descriptor.clone()).into());
            }
            work.extend(
                members
                    .iter()
                    .filter(|m| !descriptors.is_descriptor(m))
                    .map(|m| (index, group.descriptor.as_str(), m.as_str())),
            );
        }

        info!(
            descriptors = names.len(),
            members = work.len(),
            "Fitting group members against their descriptors."
        );
        self.report(Progress::TaskStart {
            total_steps: work.len() as u64,
        });

        #[cfg(not(feature = "parallel"))]
        let iterator = work.iter();

        #[cfg(feature = "parallel")]
        let iterator = work.par_iter();

        let results: Vec<Result<SpeciesFit, EngineError>> = iterator
            .map(|&(_, descriptor, member)| {
                let fit = self.fit_species(member, &[(descriptor, 1.0)]);
                self.report(Progress::TaskIncrement);
                fit
            })
            .collect();

        self.report(Progress::TaskFinish);

        let mut parts = RelationParts::default();
        for (&(index, _, member), result) in work.iter().zip(results) {
            let fit = result?;
            let mut coefficients = vec![0.0; names.len()];
            coefficients[index] = fit.coefficients[0];
            debug!(species = member, metric = fit.metric, "Member fitted.");
            parts.insert(
                member,
                SpeciesFit {
                    coefficients,
                    ..fit
                },
                unit_ratios(&names, index),
            );
        }
        for (index, descriptor) in names.iter().enumerate() {
            let mut coefficients = vec![0.0; names.len()];
            coefficients[index] = 1.0;
            let identity = SpeciesFit {
                coefficients,
                intercept: 0.0,
                metric: 1.0,
            };
            parts.insert(descriptor, identity, unit_ratios(&names, index));
        }

        let relation = parts.into_relation(&names)?;
        Ok(self.finish(relation, descriptors.warnings()))
    }

    /// Builds a relation where every species in the table is fitted against
    /// the best mixture `r * D_0 + (1 - r) * D_1` of two descriptors.
    ///
    /// `r` is searched on a grid of `step_length` percent. Among ratios whose
    /// scores tie, the smallest wins. See [`ratio_grid`] for the accepted
    /// step lengths.
    #[instrument(skip_all, name = "adaptive_build", fields(step_length = step_length))]
    pub fn build_adaptive(
        &self,
        descriptors: &Descriptors,
        step_length: f64,
    ) -> Result<BuildOutcome, EngineError> {
        let grid = ratio_grid(step_length)?;
        let mut warnings = Vec::new();
        if step_length > COARSE_STEP_LENGTH {
            warnings.push(Warning::CoarseStepLength(step_length).emit());
        } else if step_length < FINE_STEP_LENGTH {
            warnings.push(Warning::FineStepLength(step_length).emit());
        }

        let names = descriptors.names();
        let &[first, second] = names.as_slice() else {
            return Err(EngineError::DescriptorCount(names.len()));
        };
        let first_values = self.data.column(first)?;
        let second_values = self.data.column(second)?;
        let species = self.data.adsorbates();

        info!(
            species = species.len(),
            ratios = grid.len(),
            "Searching descriptor ratios for every species."
        );
        self.report(Progress::TaskStart {
            total_steps: species.len() as u64,
        });

        #[cfg(not(feature = "parallel"))]
        let iterator = species.iter();

        #[cfg(feature = "parallel")]
        let iterator = species.par_iter();

        let results: Vec<Result<(f64, SpeciesFit), EngineError>> = iterator
            .map(|name| {
                let ratio = self.search_ratio(name, &first_values, &second_values, &grid)?;
                let fit = self.fit_species(name, &[(first, ratio), (second, 1.0 - ratio)])?;
                self.report(Progress::TaskIncrement);
                Ok((ratio, fit))
            })
            .collect();

        self.report(Progress::TaskFinish);

        let mut parts = RelationParts::default();
        for (name, result) in species.iter().zip(results) {
            let (ratio, fit) = result?;
            let ratios = BTreeMap::from([
                (first.to_string(), ratio),
                (second.to_string(), 1.0 - ratio),
            ]);
            parts.insert(name, fit, ratios);
        }

        let relation = parts.into_relation(&names)?;
        Ok(self.finish(relation, warnings))
    }

    fn search_ratio(
        &self,
        species: &str,
        first: &DVector<f64>,
        second: &DVector<f64>,
        grid: &[f64],
    ) -> Result<f64, EngineError> {
        let target = self.data.column(species)?;
        let mut best = (0.0, f64::NEG_INFINITY);
        for &ratio in grid {
            let composite = first * ratio + second * (1.0 - ratio);
            let fit = self.regress(species, &composite, &target)?;
            if fit.score > best.1 + SCORE_TIE_TOLERANCE {
                best = (ratio, fit.score);
            }
        }
        debug!(species, ratio = best.0, score = best.1, "Best ratio found.");
        Ok(best.0)
    }

    fn finish(&self, relation: Relation, mut warnings: Vec<Warning>) -> BuildOutcome {
        warnings.extend(
            relation
                .warnings(self.config.metric_threshold)
                .into_iter()
                .map(Warning::emit),
        );
        info!(
            species = relation.coefficients().len(),
            dim = relation.dim(),
            warnings = warnings.len(),
            "Relation built."
        );
        BuildOutcome { relation, warnings }
    }
}

/// Ratios `0, s/100, 2s/100, ...` up to 1 inclusive, for a step length `s`
/// in percent. The last entry is always exactly 1.
///
/// `s` must be finite and in (0, 100), and the grid may not exceed
/// [`MAX_RATIO_GRID_POINTS`].
pub fn ratio_grid(step_length: f64) -> Result<Vec<f64>, EngineError> {
    if !(step_length.is_finite() && step_length > 0.0 && step_length < 100.0) {
        return Err(EngineError::IllegalStepLength(step_length));
    }
    let steps = (100.0 / step_length + 1e-9).floor();
    if steps + 1.0 > MAX_RATIO_GRID_POINTS as f64 {
        return Err(EngineError::RatioGridTooFine {
            step_length,
            points: steps + 1.0,
        });
    }
    let steps = steps as usize;
    let mut grid: Vec<f64> = (0..=steps)
        .map(|i| (i as f64 * step_length / 100.0).min(1.0))
        .collect();
    match grid.last_mut() {
        Some(last) if (1.0 - *last).abs() < 1e-12 => *last = 1.0,
        _ => grid.push(1.0),
    }
    Ok(grid)
}

fn unit_ratios(names: &[&str], index: usize) -> BTreeMap<String, f64> {
    names
        .iter()
        .enumerate()
        .map(|(i, name)| (name.to_string(), if i == index { 1.0 } else { 0.0 }))
        .collect()
}
