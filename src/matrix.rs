use crate::config::MotifGroupTable;
use crate::error::{MotifError, Result};
use crate::types::*;
use ndarray::Array2;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

/// Background probability of each nucleotide under the uniform model
pub const BACKGROUND: f64 = 0.25;

const MATRIX_EXTENSION: &str = "motif";

/// A position probability matrix for a single motif.
///
/// Rows are positions along the binding site, columns are the nucleotides
/// A, C, G and T. Every entry is strictly positive so the log-odds against
/// the uniform background is always finite.
#[derive(Debug, Clone)]
pub struct PositionProbabilityMatrix {
    id: String,
    probabilities: PPM,
    log_odds: Array2<f64>,
}

impl PositionProbabilityMatrix {
    /// Builds a matrix from an `(N, 4)` array of probabilities.
    ///
    /// # Errors
    /// * `MotifError::MalformedMatrixFile` - If the array does not have four columns,
    ///   has no rows, or holds a value outside (0, 1]
    pub fn new(id: impl Into<String>, probabilities: PPM) -> Result<Self> {
        let id = id.into();
        if probabilities.ncols() != 4 {
            return Err(MotifError::malformed_matrix(
                id,
                0,
                format!("expected 4 columns, found {}", probabilities.ncols()),
            ));
        }
        if probabilities.nrows() == 0 {
            return Err(MotifError::malformed_matrix(id, 0, "matrix has no positions"));
        }
        for ((row, _), &p) in probabilities.indexed_iter() {
            if !p.is_finite() || p <= 0.0 || p > 1.0 {
                return Err(MotifError::malformed_matrix(
                    id,
                    row + 2,
                    format!("probability {} is outside (0, 1]", p),
                ));
            }
        }

        let log_odds = probabilities.mapv(|p| (p / BACKGROUND).ln());
        Ok(Self {
            id,
            probabilities,
            log_odds,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Number of positions, i.e. the expected binding site length
    pub fn len(&self) -> usize {
        self.probabilities.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn probabilities(&self) -> &PPM {
        &self.probabilities
    }

    /// Per-position `ln(p / 0.25)` values
    pub fn log_odds(&self) -> &Array2<f64> {
        &self.log_odds
    }
}

/// Parses a matrix in the HOMER `.motif` layout.
///
/// The first line is a header and is discarded without validation. Every
/// following non-blank line holds the A, C, G and T probabilities for one
/// position.
///
/// # Errors
/// * `MotifError::Io` - If the reader fails
/// * `MotifError::MalformedMatrixFile` - If a row does not have exactly four numeric
///   fields, a probability is not in (0, 1], or there are no rows
pub fn parse_matrix<R: BufRead>(id: &str, reader: R) -> Result<PositionProbabilityMatrix> {
    let mut values: Vec<f64> = Vec::new();
    let mut rows = 0;

    for (idx, line) in reader.lines().enumerate().skip(1) {
        let line = line?;
        let line_number = idx + 1;
        if line.trim().is_empty() {
            continue;
        }

        let fields: Vec<f64> = line
            .split_whitespace()
            .map(|s| s.parse::<f64>())
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| {
                MotifError::malformed_matrix(id, line_number, format!("invalid probability: {}", e))
            })?;

        if fields.len() != 4 {
            return Err(MotifError::malformed_matrix(
                id,
                line_number,
                format!("expected 4 fields, found {}", fields.len()),
            ));
        }
        if let Some(p) = fields.iter().find(|p| !p.is_finite() || **p <= 0.0 || **p > 1.0) {
            return Err(MotifError::malformed_matrix(
                id,
                line_number,
                format!("probability {} is outside (0, 1]", p),
            ));
        }

        values.extend(fields);
        rows += 1;
    }

    if rows == 0 {
        return Err(MotifError::malformed_matrix(id, 1, "matrix has no positions"));
    }

    let probabilities = Array2::from_shape_vec((rows, 4), values)
        .map_err(|e| MotifError::malformed_matrix(id, 0, e.to_string()))?;

    PositionProbabilityMatrix::new(id, probabilities)
}

/// In-memory store of the matrices needed for a run, loaded once from a
/// directory of `<motif id>.motif` files.
#[derive(Debug, Clone)]
pub struct MotifMatrixStore {
    dir: PathBuf,
    matrices: MatrixCollection,
}

impl MotifMatrixStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            matrices: HashMap::new(),
        }
    }

    /// Builds a store holding every matrix referenced by the motif group table.
    pub fn for_table(dir: impl Into<PathBuf>, table: &MotifGroupTable) -> Result<Self> {
        let mut store = Self::new(dir);
        store.preload(table.matrix_ids())?;
        Ok(store)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Reads and parses `<dir>/<id>.motif` without caching it.
    pub fn load(&self, id: &str) -> Result<PositionProbabilityMatrix> {
        let path = self.dir.join(format!("{}.{}", id, MATRIX_EXTENSION));
        let file = File::open(&path)?;
        parse_matrix(id, BufReader::new(file))
    }

    /// Loads every listed matrix that is not already in memory.
    pub fn preload<I, S>(&mut self, ids: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for id in ids {
            let id = id.as_ref();
            if self.matrices.contains_key(id) {
                continue;
            }
            let matrix = self.load(id)?;
            self.matrices.insert(id.to_string(), matrix);
        }
        Ok(())
    }

    pub fn insert(&mut self, matrix: PositionProbabilityMatrix) {
        self.matrices.insert(matrix.id().to_string(), matrix);
    }

    pub fn get(&self, id: &str) -> Option<&PositionProbabilityMatrix> {
        self.matrices.get(id)
    }

    pub fn len(&self) -> usize {
        self.matrices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matrices.is_empty()
    }
}
