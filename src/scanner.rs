use crate::bed::{bgzip_file, open_bed, CandidateInterval};
use crate::config::{MotifGroup, MotifGroupTable, INPUT_SUFFIX};
use crate::error::{MotifError, Result};
use crate::matrix::MotifMatrixStore;
use crate::metadata::{MetadataRecord, MotifMetadataIndex};
use crate::reference::ReferenceSequenceProvider;
use crate::scoring::{MatrixScore, ProcessedIntervals, ScoringEngine};
use crate::sequence::reverse_complement;
use crate::types::{GenomeBuild, Strand};
use rayon::prelude::*;
use std::fmt;
use std::fs::{self, File};
use std::io::{BufRead, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, trace};

const OUTPUT_SUFFIX: &str = ".processed.bed";

/// Leading output columns shared by scored and plain annotation files
pub const ANNOTATION_COLUMNS: [&str; 11] = [
    "#chrom",
    "chromStart",
    "chromEnd",
    "name",
    "score",
    "strand",
    "motifID",
    "DNA_binding_domain",
    "cell_type",
    "binding_sequence",
    "consensus_sequence",
];

/// Header of a plain annotation file
pub fn plain_header() -> String {
    ANNOTATION_COLUMNS.join("\t")
}

/// Header of a scored file: one `motif_score_<id>` column per matrix, then `motif_name`
pub fn scored_header<'m, I>(matrix_ids: I) -> String
where
    I: IntoIterator<Item = &'m str>,
{
    let mut columns: Vec<String> = ANNOTATION_COLUMNS.iter().map(|c| c.to_string()).collect();
    columns.extend(matrix_ids.into_iter().map(|id| format!("motif_score_{}", id)));
    columns.push("motif_name".to_string());
    columns.join("\t")
}

/// One output row
#[derive(Debug, Clone)]
pub struct AnnotatedRecord<'r> {
    pub interval: &'r CandidateInterval,
    pub metadata: MetadataRecord,
    /// Reference sequence, reverse-complemented for '-' strand intervals
    pub binding_sequence: &'r str,
    /// Per-matrix scores; empty for plain annotation rows
    pub scores: &'r [MatrixScore],
    /// Matrix that explains the interval score; `None` for plain annotation rows
    pub motif_name: Option<&'r str>,
}

impl fmt::Display for AnnotatedRecord<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let iv = self.interval;
        write!(
            f,
            "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
            iv.chrom,
            iv.output_start(),
            iv.end,
            iv.name,
            iv.score,
            iv.strand,
            self.metadata.motif_id,
            self.metadata.dna_binding_domain,
            self.metadata.cell_type,
            self.binding_sequence,
            self.metadata.consensus_sequence
        )?;
        for score in self.scores {
            write!(f, "\t{}", score)?;
        }
        if let Some(name) = self.motif_name {
            write!(f, "\t{}", name)?;
        }
        Ok(())
    }
}

/// Counters for one scan
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanSummary {
    /// Data lines read, excluding comments
    pub records: usize,
    pub length_mismatches: usize,
    /// Records whose interval already produced a row for every matrix
    pub duplicates: usize,
    /// Records no matrix explains, or plain records written with sentinel metadata
    pub unmatched: usize,
    pub rows_written: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    Written { path: PathBuf, summary: ScanSummary },
    /// The compressed output already existed
    Skipped(PathBuf),
}

/// Outcome of a batch of motif files
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub written: Vec<PathBuf>,
    pub skipped: Vec<PathBuf>,
    /// Inputs that failed, with the error message
    pub failures: Vec<(PathBuf, String)>,
}

impl BatchSummary {
    pub fn total(&self) -> usize {
        self.written.len() + self.skipped.len() + self.failures.len()
    }

    pub fn failed(&self) -> usize {
        self.failures.len()
    }
}

/// Streams candidate intervals and writes annotated rows.
///
/// Stores are borrowed read-only, so one scanner can be shared by workers
/// that each own a different input/output pair.
pub struct IntervalScanner<'a, R: ReferenceSequenceProvider + ?Sized> {
    build: GenomeBuild,
    matrices: &'a MotifMatrixStore,
    metadata: &'a MotifMetadataIndex,
    reference: &'a R,
}

impl<'a, R: ReferenceSequenceProvider + ?Sized> IntervalScanner<'a, R> {
    pub fn new(
        build: GenomeBuild,
        matrices: &'a MotifMatrixStore,
        metadata: &'a MotifMetadataIndex,
        reference: &'a R,
    ) -> Self {
        Self {
            build,
            matrices,
            metadata,
            reference,
        }
    }

    pub fn build(&self) -> GenomeBuild {
        self.build
    }

    /// Fetches the reference under an interval, on the interval's strand.
    fn binding_sequence(&self, interval: &CandidateInterval) -> Result<String> {
        let sequence =
            self.reference
                .fetch(self.build, &interval.chrom, interval.start, interval.end)?;
        if sequence.len() != interval.len() {
            return Err(MotifError::reference_fetch(
                interval.region(),
                format!("expected {} bases, got {}", interval.len(), sequence.len()),
            ));
        }
        Ok(match interval.strand {
            Strand::Forward => sequence,
            Strand::Reverse => reverse_complement(&sequence),
        })
    }

    /// Scores every candidate of a motif group against the group's matrices.
    ///
    /// A row is written for each matrix whose thresholded, rounded score equals
    /// the record's BED score. Records of the wrong length are dropped, and an
    /// interval that already produced a row for a matrix does not produce it again.
    pub fn score_records<B: BufRead, W: Write>(
        &self,
        group: &MotifGroup,
        reader: B,
        mut writer: W,
    ) -> Result<ScanSummary> {
        let engine = ScoringEngine::new(group, self.matrices)?;
        let mut processed = ProcessedIntervals::new();
        let mut summary = ScanSummary::default();

        writeln!(writer, "{}", scored_header(engine.matrix_ids()))?;

        for (idx, line) in reader.lines().enumerate() {
            let line = line?;
            if line.starts_with('#') || line.trim().is_empty() {
                continue;
            }
            let interval = CandidateInterval::parse_line(&line, idx + 1)?;
            summary.records += 1;

            if interval.len() != engine.length() {
                trace!(region = %interval.region(), length = interval.len(), "length mismatch");
                summary.length_mismatches += 1;
                continue;
            }
            if processed.contains_all(
                &interval.chrom,
                interval.start,
                interval.end,
                engine.matrix_ids(),
            ) {
                summary.duplicates += 1;
                continue;
            }

            let sequence = self.binding_sequence(&interval)?;
            let scores = engine.score_sequence(&sequence);

            let mut matched = false;
            for motif_id in engine.matching(&scores, interval.score) {
                matched = true;
                if !processed.insert(&interval.chrom, interval.start, interval.end, motif_id) {
                    continue;
                }
                let record = AnnotatedRecord {
                    interval: &interval,
                    metadata: self.metadata.by_motif_id_or_sentinel(motif_id),
                    binding_sequence: &sequence,
                    scores: &scores,
                    motif_name: Some(motif_id),
                };
                writeln!(writer, "{}", record)?;
                summary.rows_written += 1;
            }
            if !matched {
                trace!(region = %interval.region(), bed_score = interval.score, "no matrix explains score");
                summary.unmatched += 1;
            }
        }

        writer.flush()?;
        Ok(summary)
    }

    /// Annotates candidates of a group that needs no scoring.
    ///
    /// Metadata is looked up by motif name and interval length (then by name
    /// alone). Records with no metadata entry are still written, with "." in
    /// every metadata column, and counted as unmatched.
    pub fn annotate_records<B: BufRead, W: Write>(
        &self,
        reader: B,
        mut writer: W,
    ) -> Result<ScanSummary> {
        let mut summary = ScanSummary::default();
        writeln!(writer, "{}", plain_header())?;

        for (idx, line) in reader.lines().enumerate() {
            let line = line?;
            if line.starts_with('#') || line.trim().is_empty() {
                continue;
            }
            let interval = CandidateInterval::parse_line(&line, idx + 1)?;
            summary.records += 1;

            let metadata = match self.metadata.lookup(&interval.name, interval.len()) {
                Some(metadata) => metadata.clone(),
                None => {
                    debug!(motif = %interval.name, length = interval.len(), "no metadata, using sentinel");
                    summary.unmatched += 1;
                    MetadataRecord::sentinel()
                }
            };

            let sequence = self.binding_sequence(&interval)?;
            let record = AnnotatedRecord {
                interval: &interval,
                metadata,
                binding_sequence: &sequence,
                scores: &[],
                motif_name: None,
            };
            writeln!(writer, "{}", record)?;
            summary.rows_written += 1;
        }

        writer.flush()?;
        Ok(summary)
    }

    /// Processes one `<group>.bed.gz` file into `<group>.processed.bed.gz`.
    ///
    /// With a motif group the records are scored, otherwise they get plain
    /// annotation. The output is written uncompressed, then block-compressed in
    /// a single pass. Files whose compressed output already exists are skipped.
    pub fn process_file(
        &self,
        input: &Path,
        output_dir: &Path,
        group: Option<&MotifGroup>,
    ) -> Result<FileOutcome> {
        let output = output_path(input, output_dir)?;
        let mut compressed = output.as_os_str().to_owned();
        compressed.push(".gz");
        let compressed = PathBuf::from(compressed);
        if compressed.exists() {
            info!(output = %compressed.display(), "output already exists, skipping");
            return Ok(FileOutcome::Skipped(compressed));
        }

        fs::create_dir_all(output_dir)?;
        let result = self.write_output(input, &output, group);
        let summary = match result {
            Ok(summary) => summary,
            Err(e) => {
                let _ = fs::remove_file(&output);
                return Err(e);
            }
        };
        let path = bgzip_file(&output)?;

        info!(
            input = %input.display(),
            output = %path.display(),
            records = summary.records,
            rows = summary.rows_written,
            length_mismatches = summary.length_mismatches,
            duplicates = summary.duplicates,
            unmatched = summary.unmatched,
            "processed motif file"
        );
        Ok(FileOutcome::Written { path, summary })
    }

    fn write_output(
        &self,
        input: &Path,
        output: &Path,
        group: Option<&MotifGroup>,
    ) -> Result<ScanSummary> {
        let reader = open_bed(input)?;
        let writer = BufWriter::new(File::create(output)?);
        match group {
            Some(group) => self.score_records(group, reader, writer),
            None => self.annotate_records(reader, writer),
        }
    }
}

/// Processes every input file on the current rayon pool.
///
/// Files with a configured motif group are scored, the rest get plain
/// annotation. A failing file is logged and recorded in the summary; it never
/// stops the other files. Run inside `ThreadPool::install` to bound the workers.
pub fn process_batch<R>(
    scanner: &IntervalScanner<'_, R>,
    groups: &MotifGroupTable,
    inputs: &[PathBuf],
    output_dir: &Path,
) -> BatchSummary
where
    R: ReferenceSequenceProvider + Sync + ?Sized,
{
    let outcomes: Vec<std::result::Result<FileOutcome, String>> = inputs
        .par_iter()
        .map(|input| {
            scanner
                .process_file(input, output_dir, groups.group_for_file(input))
                .map_err(|e| {
                    error!(input = %input.display(), error = %e, "failed to process motif file");
                    e.to_string()
                })
        })
        .collect();

    let mut summary = BatchSummary::default();
    for (input, outcome) in inputs.iter().zip(outcomes) {
        match outcome {
            Ok(FileOutcome::Written { path, .. }) => summary.written.push(path),
            Ok(FileOutcome::Skipped(path)) => summary.skipped.push(path),
            Err(message) => summary.failures.push((input.clone(), message)),
        }
    }
    summary
}

/// `<output_dir>/<stem>.processed.bed` for an input `<stem>.bed.gz`.
pub fn output_path(input: &Path, output_dir: &Path) -> Result<PathBuf> {
    let file_name = input
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| {
            MotifError::InvalidFileFormat(format!("invalid input path {}", input.display()))
        })?;
    let stem = file_name.strip_suffix(INPUT_SUFFIX).ok_or_else(|| {
        MotifError::InvalidFileFormat(format!("{} does not end in {}", file_name, INPUT_SUFFIX))
    })?;
    Ok(output_dir.join(format!("{}{}", stem, OUTPUT_SUFFIX)))
}
