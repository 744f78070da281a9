use nalgebra::{DMatrix, DVector};
use std::io::Read;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

const READER_ORIGIN: &str = "<reader>";

#[derive(Debug, Error)]
pub enum TableError {
    #[error("Adsorbate '{0}' not found in table")]
    UnknownAdsorbate(String),
    #[error("Sample '{0}' not found in table")]
    UnknownSample(String),
    #[error("Adsorbate '{0}' already exists")]
    DuplicateAdsorbate(String),
    #[error("Sample '{0}' already exists")]
    DuplicateSample(String),
    #[error("Names in table cannot be empty")]
    EmptyName,
    #[error("New {axis} energies length {found} doesn't match expected {expected}")]
    LengthMismatch {
        axis: &'static str,
        expected: usize,
        found: usize,
    },
    #[error("Non-finite energy {value} for sample '{sample}', adsorbate '{adsorbate}'")]
    NonFinite {
        sample: String,
        adsorbate: String,
        value: f64,
    },
    #[error("Invalid energy '{value}' for sample '{sample}', adsorbate '{adsorbate}' in '{origin}'")]
    InvalidValue {
        origin: String,
        sample: String,
        adsorbate: String,
        value: String,
    },
    #[error("CSV parsing error for '{origin}': {source}")]
    Csv { origin: String, source: csv::Error },
}

/// Which axes [`EadsTable::sort`] reorders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortTarget {
    Columns,
    Rows,
    Both,
}

/// Adsorption (free) energies of adsorbates across a set of samples.
///
/// Rows are samples (candidate materials) and columns are adsorbates:
///
/// ```text
///              *CO2   *COOH  ...  *O     *OH
/// Cu@g-C3N4    0.89   4.37   ... -1.73   0.17
/// Ni@C2N      -4.57  -4.95   ... -2.81  -3.21
/// ```
///
/// Names are unique along each axis and every column has one value per sample.
#[derive(Debug, Clone, PartialEq)]
pub struct EadsTable {
    samples: Vec<String>,
    adsorbates: Vec<String>,
    /// `samples.len() x adsorbates.len()` energies.
    values: DMatrix<f64>,
}

impl Default for EadsTable {
    fn default() -> Self {
        Self {
            samples: Vec::new(),
            adsorbates: Vec::new(),
            values: DMatrix::zeros(0, 0),
        }
    }
}

impl EadsTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a table from sample names and `(adsorbate, energies)` columns.
    pub fn from_columns<S, A>(
        samples: impl IntoIterator<Item = S>,
        columns: impl IntoIterator<Item = (A, Vec<f64>)>,
    ) -> Result<Self, TableError>
    where
        S: Into<String>,
        A: Into<String>,
    {
        let mut table = Self::new();
        for sample in samples {
            let sample = sample.into();
            check_name(&sample)?;
            if table.samples.contains(&sample) {
                return Err(TableError::DuplicateSample(sample));
            }
            table.samples.push(sample);
        }
        table.values = DMatrix::zeros(table.samples.len(), 0);

        for (name, energies) in columns {
            table.add_adsorbate(name, &energies)?;
        }
        Ok(table)
    }

    /// Loads a table from a CSV file.
    ///
    /// The first header cell labels the sample column and is ignored, the rest
    /// are adsorbate names. Each record starts with the sample name.
    pub fn from_csv(path: &Path) -> Result<Self, TableError> {
        let origin = path.to_string_lossy().to_string();
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_path(path)
            .map_err(|e| TableError::Csv {
                origin: origin.clone(),
                source: e,
            })?;
        Self::read_records(reader, &origin)
    }

    /// Loads a table from any CSV source, in the same layout as [`EadsTable::from_csv`].
    pub fn from_reader(reader: impl Read) -> Result<Self, TableError> {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);
        Self::read_records(reader, READER_ORIGIN)
    }

    fn read_records<R: Read>(
        mut reader: csv::Reader<R>,
        origin: &str,
    ) -> Result<Self, TableError> {
        let csv_error = |e: csv::Error| TableError::Csv {
            origin: origin.to_string(),
            source: e,
        };

        let headers = reader.headers().map_err(csv_error)?.clone();
        let adsorbates: Vec<String> = headers.iter().skip(1).map(str::to_string).collect();
        for (i, name) in adsorbates.iter().enumerate() {
            check_name(name)?;
            if adsorbates[..i].contains(name) {
                return Err(TableError::DuplicateAdsorbate(name.clone()));
            }
        }

        let mut samples = Vec::new();
        let mut flat = Vec::new();
        for record in reader.records() {
            let record = record.map_err(csv_error)?;
            let mut fields = record.iter();
            let sample = fields.next().unwrap_or_default().to_string();
            check_name(&sample)?;
            if samples.contains(&sample) {
                return Err(TableError::DuplicateSample(sample));
            }

            for (adsorbate, field) in adsorbates.iter().zip(fields) {
                let value = field.parse::<f64>().map_err(|_| TableError::InvalidValue {
                    origin: origin.to_string(),
                    sample: sample.clone(),
                    adsorbate: adsorbate.clone(),
                    value: field.to_string(),
                })?;
                check_value(&sample, adsorbate, value)?;
                flat.push(value);
            }
            samples.push(sample);
        }

        debug!(
            origin,
            samples = samples.len(),
            adsorbates = adsorbates.len(),
            "Loaded adsorption energy table."
        );

        Ok(Self {
            values: DMatrix::from_row_slice(samples.len(), adsorbates.len(), &flat),
            samples,
            adsorbates,
        })
    }

    /// Adsorbate (column) names in table order.
    pub fn adsorbates(&self) -> &[String] {
        &self.adsorbates
    }

    /// Sample (row) names in table order.
    pub fn samples(&self) -> &[String] {
        &self.samples
    }

    pub fn has_adsorbate(&self, name: &str) -> bool {
        self.adsorbates.iter().any(|a| a == name)
    }

    /// `(samples, adsorbates)`.
    pub fn shape(&self) -> (usize, usize) {
        (self.samples.len(), self.adsorbates.len())
    }

    pub fn values(&self) -> &DMatrix<f64> {
        &self.values
    }

    fn adsorbate_index(&self, name: &str) -> Result<usize, TableError> {
        self.adsorbates
            .iter()
            .position(|a| a == name)
            .ok_or_else(|| TableError::UnknownAdsorbate(name.to_string()))
    }

    fn sample_index(&self, name: &str) -> Result<usize, TableError> {
        self.samples
            .iter()
            .position(|s| s == name)
            .ok_or_else(|| TableError::UnknownSample(name.to_string()))
    }

    /// Energies of one adsorbate across all samples.
    pub fn column(&self, adsorbate: &str) -> Result<DVector<f64>, TableError> {
        let j = self.adsorbate_index(adsorbate)?;
        Ok(self.values.column(j).into_owned())
    }

    /// Energies of all adsorbates on one sample.
    pub fn row(&self, sample: &str) -> Result<DVector<f64>, TableError> {
        let i = self.sample_index(sample)?;
        Ok(self.values.row(i).transpose())
    }

    pub fn add_adsorbate(
        &mut self,
        name: impl Into<String>,
        energies: &[f64],
    ) -> Result<(), TableError> {
        let name = name.into();
        check_name(&name)?;
        if energies.len() != self.samples.len() {
            return Err(TableError::LengthMismatch {
                axis: "adsorbate",
                expected: self.samples.len(),
                found: energies.len(),
            });
        }
        if self.has_adsorbate(&name) {
            return Err(TableError::DuplicateAdsorbate(name));
        }
        for (sample, &value) in self.samples.iter().zip(energies) {
            check_value(sample, &name, value)?;
        }

        let ncols = self.adsorbates.len();
        self.values = DMatrix::from_fn(self.samples.len(), ncols + 1, |i, j| {
            if j < ncols { self.values[(i, j)] } else { energies[i] }
        });
        self.adsorbates.push(name);
        Ok(())
    }

    pub fn add_sample(
        &mut self,
        name: impl Into<String>,
        energies: &[f64],
    ) -> Result<(), TableError> {
        let name = name.into();
        check_name(&name)?;
        if energies.len() != self.adsorbates.len() {
            return Err(TableError::LengthMismatch {
                axis: "sample",
                expected: self.adsorbates.len(),
                found: energies.len(),
            });
        }
        if self.samples.contains(&name) {
            return Err(TableError::DuplicateSample(name));
        }
        for (adsorbate, &value) in self.adsorbates.iter().zip(energies) {
            check_value(&name, adsorbate, value)?;
        }

        let nrows = self.samples.len();
        self.values = DMatrix::from_fn(nrows + 1, self.adsorbates.len(), |i, j| {
            if i < nrows { self.values[(i, j)] } else { energies[j] }
        });
        self.samples.push(name);
        Ok(())
    }

    pub fn remove_adsorbate(&mut self, name: &str) -> Result<DVector<f64>, TableError> {
        let j = self.adsorbate_index(name)?;
        let removed = self.values.column(j).into_owned();
        self.values = self.values.clone().remove_column(j);
        self.adsorbates.remove(j);
        Ok(removed)
    }

    pub fn remove_sample(&mut self, name: &str) -> Result<DVector<f64>, TableError> {
        let i = self.sample_index(name)?;
        let removed = self.values.row(i).transpose();
        self.values = self.values.clone().remove_row(i);
        self.samples.remove(i);
        Ok(removed)
    }

    /// Sorts adsorbates and/or samples by name. Sorting is stable and idempotent.
    pub fn sort(&mut self, target: SortTarget) {
        let sort_columns = matches!(target, SortTarget::Columns | SortTarget::Both);
        let sort_rows = matches!(target, SortTarget::Rows | SortTarget::Both);

        let col_order = if sort_columns {
            sorted_order(&self.adsorbates)
        } else {
            (0..self.adsorbates.len()).collect()
        };
        let row_order = if sort_rows {
            sorted_order(&self.samples)
        } else {
            (0..self.samples.len()).collect()
        };

        self.values = DMatrix::from_fn(row_order.len(), col_order.len(), |i, j| {
            self.values[(row_order[i], col_order[j])]
        });
        self.adsorbates = col_order.iter().map(|&j| self.adsorbates[j].clone()).collect();
        self.samples = row_order.iter().map(|&i| self.samples[i].clone()).collect();
    }
}

fn sorted_order(names: &[String]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..names.len()).collect();
    order.sort_by(|&a, &b| names[a].cmp(&names[b]));
    order
}

fn check_name(name: &str) -> Result<(), TableError> {
    if name.trim().is_empty() {
        Err(TableError::EmptyName)
    } else {
        Ok(())
    }
}

fn check_value(sample: &str, adsorbate: &str, value: f64) -> Result<(), TableError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(TableError::NonFinite {
            sample: sample.to_string(),
            adsorbate: adsorbate.to_string(),
            value,
        })
    }
}
