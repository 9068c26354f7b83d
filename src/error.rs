use polars::prelude::PolarsError;
use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MotifError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Polars error: {0}")]
    Polars(#[from] PolarsError),

    #[error("Malformed matrix file for {motif} at line {line}: {message}")]
    MalformedMatrixFile {
        motif: String,
        line: usize,
        message: String,
    },

    #[error("Failed to fetch reference sequence for {region}: {message}")]
    ReferenceFetch { region: String, message: String },

    #[error("Unsupported genome build: {0} (supported: hg19, hg38)")]
    UnsupportedGenomeBuild(String),

    #[error("Unsupported motif group: {0}")]
    UnsupportedMotifGroup(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid file format: {0}")]
    InvalidFileFormat(String),

    #[error("Invalid BED record at line {line}: {message}")]
    InvalidRecord { line: usize, message: String },
}

/// Type alias for Result with MotifError
pub type Result<T> = std::result::Result<T, MotifError>;

impl MotifError {
    /// Create a new MalformedMatrixFile error
    pub fn malformed_matrix(motif: impl Into<String>, line: usize, message: impl Into<String>) -> Self {
        MotifError::MalformedMatrixFile {
            motif: motif.into(),
            line,
            message: message.into(),
        }
    }

    /// Create a new ReferenceFetch error
    pub fn reference_fetch(region: impl Into<String>, message: impl Into<String>) -> Self {
        MotifError::ReferenceFetch {
            region: region.into(),
            message: message.into(),
        }
    }

    /// Create a new InvalidRecord error
    pub fn invalid_record(line: usize, message: impl Into<String>) -> Self {
        MotifError::InvalidRecord {
            line,
            message: message.into(),
        }
    }
}
