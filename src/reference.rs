use crate::error::{MotifError, Result};
use crate::sequence::parse_faidx_output;
use crate::types::GenomeBuild;
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Command;
use tracing::trace;

/// Source of reference genome sequence.
///
/// Coordinates are 1-based and inclusive, so the returned sequence is
/// `end - start + 1` bases long and lowercase.
pub trait ReferenceSequenceProvider {
    fn fetch(&self, build: GenomeBuild, chrom: &str, start: u64, end: u64) -> Result<String>;
}

/// Formats a `chrom:start-end` region string.
pub fn region_string(chrom: &str, start: u64, end: u64) -> String {
    format!("{}:{}-{}", chrom, start, end)
}

/// Reference access through `samtools faidx` on an indexed FASTA per build
#[derive(Debug, Clone)]
pub struct SamtoolsFaidx {
    program: PathBuf,
    references: HashMap<GenomeBuild, PathBuf>,
}

impl SamtoolsFaidx {
    pub fn new(references: HashMap<GenomeBuild, PathBuf>) -> Self {
        Self {
            program: PathBuf::from("samtools"),
            references,
        }
    }

    /// Uses a specific `samtools` executable instead of the one on `PATH`.
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }
}

impl ReferenceSequenceProvider for SamtoolsFaidx {
    fn fetch(&self, build: GenomeBuild, chrom: &str, start: u64, end: u64) -> Result<String> {
        let region = region_string(chrom, start, end);
        let fasta = self
            .references
            .get(&build)
            .ok_or_else(|| MotifError::UnsupportedGenomeBuild(build.to_string()))?;

        trace!(%region, %build, "samtools faidx");
        let output = Command::new(&self.program)
            .arg("faidx")
            .arg(fasta)
            .arg(&region)
            .output()
            .map_err(|e| {
                MotifError::reference_fetch(&region, format!("failed to run samtools: {}", e))
            })?;

        if !output.status.success() {
            return Err(MotifError::reference_fetch(
                region,
                format!(
                    "samtools exited with {}: {}",
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            ));
        }

        let sequence = parse_faidx_output(&String::from_utf8_lossy(&output.stdout));
        let expected = end
            .checked_sub(start)
            .map_or(0, |span| span.saturating_add(1)) as usize;
        if sequence.is_empty() {
            return Err(MotifError::reference_fetch(region, "no sequence returned"));
        }
        if sequence.len() != expected {
            return Err(MotifError::reference_fetch(
                region,
                format!("expected {} bases, got {}", expected, sequence.len()),
            ));
        }

        Ok(sequence)
    }
}
