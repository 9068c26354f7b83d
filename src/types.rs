use crate::error::MotifError;
use ndarray::Array2;
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::matrix::PositionProbabilityMatrix;

/// Raw per-position probabilities, one row per position
/// and one column per nucleotide in A, C, G, T order
pub type PPM = Array2<f64>;

/// Collection of matrices indexed by motif ID
pub type MatrixCollection = HashMap<String, PositionProbabilityMatrix>;

/// Reference genome builds the annotation resource is produced for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenomeBuild {
    Hg19,
    Hg38,
}

impl GenomeBuild {
    pub fn as_str(&self) -> &'static str {
        match self {
            GenomeBuild::Hg19 => "hg19",
            GenomeBuild::Hg38 => "hg38",
        }
    }
}

impl FromStr for GenomeBuild {
    type Err = MotifError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "hg19" => Ok(GenomeBuild::Hg19),
            "hg38" => Ok(GenomeBuild::Hg38),
            other => Err(MotifError::UnsupportedGenomeBuild(other.to_string())),
        }
    }
}

impl fmt::Display for GenomeBuild {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Strand of a candidate interval
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strand {
    Forward,
    Reverse,
}

impl FromStr for Strand {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "+" => Ok(Strand::Forward),
            "-" => Ok(Strand::Reverse),
            other => Err(format!("invalid strand '{}'", other)),
        }
    }
}

impl fmt::Display for Strand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strand::Forward => f.write_str("+"),
            Strand::Reverse => f.write_str("-"),
        }
    }
}
