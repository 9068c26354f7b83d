use crate::config::{MatrixSpec, MotifGroup};
use crate::error::{MotifError, Result};
use crate::matrix::{MotifMatrixStore, PositionProbabilityMatrix};
use crate::sequence::nucleotide_index;
use std::collections::HashSet;
use std::fmt;

/// Log-likelihood ratio of a sequence against a matrix and a uniform
/// 0.25/base background.
///
/// Sums `ln(p[i][base] / 0.25)` over the matrix positions. Bases are
/// case-insensitive and anything other than A, C, G or T (e.g. `N`)
/// contributes nothing. The sequence is expected to have the matrix length;
/// extra bases are ignored.
///
/// # Example
/// ```ignore
/// let raw = score("aaaaaaaaaa", &matrix);
/// ```
pub fn score(sequence: &str, matrix: &PositionProbabilityMatrix) -> f64 {
    matrix
        .log_odds()
        .rows()
        .into_iter()
        .zip(sequence.chars())
        .filter_map(|(row, base)| nucleotide_index(base).map(|idx| row[idx]))
        .sum()
}

/// Rounds a raw score to the nearest integer, ties to even.
pub fn round_score(raw: f64) -> i64 {
    raw.round_ties_even() as i64
}

/// Score of one matrix after thresholding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatrixScore {
    /// The raw score was at or below the matrix threshold
    BelowThreshold,
    Rounded(i64),
}

impl MatrixScore {
    pub fn from_raw(raw: f64, threshold: Option<f64>) -> Self {
        match threshold {
            Some(t) if raw <= t => MatrixScore::BelowThreshold,
            _ => MatrixScore::Rounded(round_score(raw)),
        }
    }

    /// True when this score explains an upstream BED score.
    pub fn explains(&self, bed_score: i64) -> bool {
        matches!(self, MatrixScore::Rounded(v) if *v == bed_score)
    }
}

impl fmt::Display for MatrixScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatrixScore::BelowThreshold => f.write_str("-1"),
            MatrixScore::Rounded(v) => write!(f, "{}", v),
        }
    }
}

/// Scores candidate sites against the competing matrices of one motif group
#[derive(Debug)]
pub struct ScoringEngine<'a> {
    group: &'a MotifGroup,
    matrices: Vec<(&'a MatrixSpec, &'a PositionProbabilityMatrix)>,
}

impl<'a> ScoringEngine<'a> {
    /// Resolves the group's matrices from the store.
    ///
    /// # Errors
    /// * `MotifError::InvalidConfig` - If a matrix is not loaded or its length differs
    ///   from the group length
    pub fn new(group: &'a MotifGroup, store: &'a MotifMatrixStore) -> Result<Self> {
        let matrices = group
            .matrices
            .iter()
            .map(|spec| {
                let matrix = store.get(&spec.id).ok_or_else(|| {
                    MotifError::InvalidConfig(format!(
                        "matrix {} of {} is not loaded",
                        spec.id, group.name
                    ))
                })?;
                if matrix.len() != group.length {
                    return Err(MotifError::InvalidConfig(format!(
                        "matrix {} has {} positions but {} expects {}",
                        spec.id,
                        matrix.len(),
                        group.name,
                        group.length
                    )));
                }
                Ok((spec, matrix))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { group, matrices })
    }

    pub fn group(&self) -> &MotifGroup {
        self.group
    }

    /// Interval length every candidate must have
    pub fn length(&self) -> usize {
        self.group.length
    }

    pub fn matrix_ids(&self) -> impl Iterator<Item = &str> {
        self.matrices.iter().map(|(spec, _)| spec.id.as_str())
    }

    /// Thresholded scores of a strand-corrected sequence, in group order.
    pub fn score_sequence(&self, sequence: &str) -> Vec<MatrixScore> {
        self.matrices
            .iter()
            .map(|(spec, matrix)| MatrixScore::from_raw(score(sequence, matrix), spec.threshold))
            .collect()
    }

    /// Ids of the matrices whose score equals the upstream BED score.
    pub fn matching<'s>(
        &'s self,
        scores: &'s [MatrixScore],
        bed_score: i64,
    ) -> impl Iterator<Item = &'a str> + 's {
        self.matrices
            .iter()
            .map(|&(spec, _)| spec)
            .zip(scores)
            .filter(move |(_, s)| s.explains(bed_score))
            .map(|(spec, _)| spec.id.as_str())
    }
}

/// Intervals that already produced a row for a given matrix during one scan
#[derive(Debug, Default)]
pub struct ProcessedIntervals {
    seen: HashSet<(String, u64, u64, String)>,
}

impl ProcessedIntervals {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, chrom: &str, start: u64, end: u64, matrix_id: &str) -> bool {
        self.seen
            .contains(&(chrom.to_string(), start, end, matrix_id.to_string()))
    }

    /// True when every listed matrix already produced a row for the interval.
    pub fn contains_all<'m, I>(&self, chrom: &str, start: u64, end: u64, matrix_ids: I) -> bool
    where
        I: IntoIterator<Item = &'m str>,
    {
        matrix_ids
            .into_iter()
            .all(|id| self.contains(chrom, start, end, id))
    }

    /// Records a row; returns false if it was already recorded.
    pub fn insert(&mut self, chrom: &str, start: u64, end: u64, matrix_id: &str) -> bool {
        self.seen
            .insert((chrom.to_string(), start, end, matrix_id.to_string()))
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}
