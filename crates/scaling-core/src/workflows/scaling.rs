use super::convert::{AdsorbToDeltaE, ConversionError};
use crate::core::data::eads::{EadsTable, TableError};
use crate::core::diagnostics::Warning;
use crate::core::models::reaction::ReactionError;
use crate::core::relation::{DeltaERelation, Relation};
use crate::engine::builder::{BuildOutcome, Builder};
use crate::engine::config::ScalingJob;
use crate::engine::error::EngineError;
use crate::engine::progress::{Progress, ProgressReporter};
use thiserror::Error;
use tracing::{info, instrument};

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("Failed to load adsorption energies: {0}")]
    Data(#[from] TableError),
    #[error("Failed to build relation: {0}")]
    Engine(#[from] EngineError),
    #[error("Invalid reaction: {0}")]
    Reaction(#[from] ReactionError),
    #[error("Failed to convert reaction: {0}")]
    Conversion(#[from] ConversionError),
    #[error("Cannot infer the building method: only some descriptor groups have members")]
    AmbiguousMethod,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScalingResult {
    pub relation: Relation,
    /// Present when the job defines a reaction.
    pub delta_e: Option<DeltaERelation>,
    pub warnings: Vec<Warning>,
}

/// Loads the job's data, builds the relation and converts the reaction.
#[instrument(skip_all, name = "scaling_workflow")]
pub fn run(
    job: &ScalingJob,
    reporter: &ProgressReporter,
) -> Result<ScalingResult, WorkflowError> {
    reporter.report(Progress::PhaseStart { name: "Loading" });
    let table = EadsTable::from_csv(&job.data_path)?;
    let (samples, adsorbates) = table.shape();
    info!(samples, adsorbates, path = %job.data_path.display(), "Adsorption energies loaded.");
    reporter.report(Progress::PhaseFinish);

    run_with_table(&table, job, reporter)
}

/// Same as [`run`] over an already loaded table.
#[instrument(skip_all, name = "scaling_workflow")]
pub fn run_with_table(
    table: &EadsTable,
    job: &ScalingJob,
    reporter: &ProgressReporter,
) -> Result<ScalingResult, WorkflowError> {
    reporter.report(Progress::PhaseStart { name: "Building" });
    let method = job.method().ok_or(WorkflowError::AmbiguousMethod)?;
    info!(%method, descriptors = ?job.descriptors.names(), "Building scaling relation.");

    let builder = Builder::new(table)
        .with_config(job.config)
        .with_reporter(reporter);
    let BuildOutcome {
        relation,
        mut warnings,
    } = builder.build(method, &job.descriptors)?;
    reporter.report(Progress::PhaseFinish);

    let delta_e = match job.reaction()? {
        Some(reaction) => {
            reporter.report(Progress::PhaseStart { name: "Converting" });
            warnings.extend(reaction.warnings());
            let delta_e = AdsorbToDeltaE::new(&relation, &reaction).convert()?;
            info!(steps = reaction.len(), "Reaction energy relation derived.");
            reporter.report(Progress::PhaseFinish);
            Some(delta_e)
        }
        None => None,
    };

    info!(warnings = warnings.len(), "Scaling workflow finished.");
    Ok(ScalingResult {
        relation,
        delta_e,
        warnings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use std::path::Path;
    use tempfile::TempDir;

    const EADS_CSV: &str = "\
sample,*A,*B,*C,*D
m0,0.0,0.0,0.3,0.0
m1,0.1,1.0,-0.2,-0.1
m2,0.2,2.0,0.5,-0.2
m3,0.3,3.0,0.1,-0.3
m4,0.4,4.0,-0.4,-0.4
m5,0.5,5.0,0.2,-0.5
";

    fn write_job(dir: &Path, job: &str) -> ScalingJob {
        std::fs::write(dir.join("eads.csv"), EADS_CSV).unwrap();
        let path = dir.join("job.toml");
        std::fs::write(&path, job).unwrap();
        ScalingJob::load(&path).unwrap()
    }

    #[test]
    fn traditional_job_builds_and_converts() {
        let dir = TempDir::new().unwrap();
        let job = write_job(
            dir.path(),
            r#"
            data = "eads.csv"
            reaction = ["*A(-1, 0) + H2O_g(-8, 0) -> *B(-10, 0)"]

            [[groups]]
            descriptor = "*A"
            members = ["*B"]

            [[groups]]
            descriptor = "*C"
            members = ["*D"]
            "#,
        );

        let result = run(&job, &ProgressReporter::new()).unwrap();
        assert_eq!(result.relation.dim(), 2);

        let delta_e = result.delta_e.unwrap();
        let step = &delta_e.coefficients()[0];
        assert_abs_diff_eq!(step[0], 9.0, epsilon = 1e-9);
        assert_abs_diff_eq!(step[1], 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(step[2], -1.0, epsilon = 1e-9);

        assert!(result.warnings.iter().any(|w| matches!(
            w,
            Warning::LowMetric { species, .. } if species == "*D"
        )));
    }

    #[test]
    fn adaptive_job_without_reaction() {
        let dir = TempDir::new().unwrap();
        let job = write_job(
            dir.path(),
            r#"
            data = "eads.csv"
            method = "adaptive"
            step_length = 10.0

            [[groups]]
            descriptor = "*A"

            [[groups]]
            descriptor = "*D"
            "#,
        );

        let result = run(&job, &ProgressReporter::new()).unwrap();
        assert!(result.delta_e.is_none());
        assert_eq!(result.relation.coefficients().len(), 4);
        assert_eq!(result.relation.ratios()["*B"]["*D"], 1.0);
        assert_eq!(result.warnings[0], Warning::CoarseStepLength(10.0));
        // *C is unrelated to either descriptor
        assert!(result.warnings.iter().any(|w| matches!(
            w,
            Warning::LowMetric { species, .. } if species == "*C"
        )));
    }

    #[test]
    fn phases_are_reported() {
        let dir = TempDir::new().unwrap();
        let job = write_job(
            dir.path(),
            r#"
            data = "eads.csv"
            reaction = ["*A(-1, 0) -> *B(-10, 0)"]

            [[groups]]
            descriptor = "*A"
            members = ["*B"]
            "#,
        );

        let phases = std::sync::Mutex::new(Vec::new());
        let reporter = ProgressReporter::with_callback(Box::new(|event| {
            if let Progress::PhaseStart { name } = event {
                phases.lock().unwrap().push(name);
            }
        }));
        run(&job, &reporter).unwrap();
        drop(reporter);

        assert_eq!(
            phases.into_inner().unwrap(),
            vec!["Loading", "Building", "Converting"]
        );
    }

    #[test]
    fn mixed_groups_without_method_are_rejected() {
        let dir = TempDir::new().unwrap();
        let job = write_job(
            dir.path(),
            r#"
            data = "eads.csv"

            [[groups]]
            descriptor = "*A"
            members = ["*B"]

            [[groups]]
            descriptor = "*C"
            "#,
        );
        assert!(matches!(
            run(&job, &ProgressReporter::new()),
            Err(WorkflowError::AmbiguousMethod)
        ));
    }

    #[test]
    fn missing_species_in_reaction_is_reported() {
        let dir = TempDir::new().unwrap();
        let job = write_job(
            dir.path(),
            r#"
            data = "eads.csv"
            reaction = ["*A(-1, 0) -> *Z(-2, 0)"]

            [[groups]]
            descriptor = "*A"
            members = ["*B"]
            "#,
        );
        assert!(matches!(
            run(&job, &ProgressReporter::new()),
            Err(WorkflowError::Conversion(ConversionError::MissingRelation(species)))
                if species == "*Z"
        ));
    }

    #[test]
    fn missing_data_file_is_reported() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("job.toml");
        std::fs::write(
            &path,
            "data = \"absent.csv\"\n[[groups]]\ndescriptor = \"*A\"\nmembers = [\"*B\"]\n",
        )
        .unwrap();
        let job = ScalingJob::load(&path).unwrap();
        assert!(matches!(
            run(&job, &ProgressReporter::new()),
            Err(WorkflowError::Data(TableError::Csv { .. }))
        ));
    }
}
