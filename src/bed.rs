use crate::error::{MotifError, Result};
use crate::reference::region_string;
use crate::types::Strand;
use flate2::read::MultiGzDecoder;
use std::collections::{BTreeMap, HashMap};
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const READ_CAPACITY: usize = 256 * 1024;

/// One motif occurrence from the candidate BED file.
///
/// Coordinates are treated as 1-based and inclusive, which is the convention
/// of the region strings handed to the reference lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateInterval {
    pub chrom: String,
    pub start: u64,
    pub end: u64,
    pub name: String,
    pub score: i64,
    pub strand: Strand,
}

#[allow(clippy::len_without_is_empty)]
impl CandidateInterval {
    /// Parses a tab-delimited BED line with at least six columns.
    ///
    /// # Errors
    /// * `MotifError::InvalidRecord` - If a column is missing or cannot be parsed,
    ///   chromEnd is `u64::MAX`, or the interval ends before it starts
    pub fn parse_line(line: &str, line_number: usize) -> Result<Self> {
        let columns: Vec<&str> = line.trim_end_matches(['\r', '\n']).split('\t').collect();
        if columns.len() < 6 {
            return Err(MotifError::invalid_record(
                line_number,
                format!("expected at least 6 columns, found {}", columns.len()),
            ));
        }

        let coordinate = |idx: usize, label: &str| -> Result<u64> {
            columns[idx].trim().parse::<u64>().map_err(|e| {
                MotifError::invalid_record(line_number, format!("invalid {}: {}", label, e))
            })
        };
        let start = coordinate(1, "chromStart")?;
        let end = coordinate(2, "chromEnd")?;
        if end == u64::MAX {
            return Err(MotifError::invalid_record(
                line_number,
                format!("chromEnd {} is out of range", end),
            ));
        }
        if end < start {
            return Err(MotifError::invalid_record(
                line_number,
                format!("chromEnd {} is before chromStart {}", end, start),
            ));
        }

        let score = columns[4].trim().parse::<i64>().map_err(|e| {
            MotifError::invalid_record(line_number, format!("invalid score: {}", e))
        })?;
        let strand = columns[5]
            .trim()
            .parse::<Strand>()
            .map_err(|e| MotifError::invalid_record(line_number, e))?;

        Ok(Self {
            chrom: columns[0].to_string(),
            start,
            end,
            name: columns[3].to_string(),
            score,
            strand,
        })
    }

    /// Number of bases covered, counting both ends
    pub fn len(&self) -> usize {
        (self.end - self.start + 1) as usize
    }

    /// `chrom:start-end` region string for reference lookups
    pub fn region(&self) -> String {
        region_string(&self.chrom, self.start, self.end)
    }

    /// chromStart written to output files, shifted to the 0-based convention
    pub fn output_start(&self) -> u64 {
        self.start.saturating_sub(1)
    }
}

fn is_gzipped(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e == "gz" || e == "bgz")
        .unwrap_or(false)
}

/// Opens a BED file for line reading, decompressing gzip/BGZF input.
pub fn open_bed(path: &Path) -> Result<Box<dyn BufRead>> {
    let file = File::open(path)?;
    let reader: Box<dyn Read> = if is_gzipped(path) {
        Box::new(MultiGzDecoder::new(file))
    } else {
        Box::new(file)
    };
    Ok(Box::new(BufReader::with_capacity(READ_CAPACITY, reader)))
}

/// Block-compresses a finished file to `<path>.gz` and removes the original.
///
/// # Returns
/// * `Result<PathBuf>` - Path of the compressed file
pub fn bgzip_file(path: &Path) -> Result<PathBuf> {
    let mut target = path.as_os_str().to_owned();
    target.push(".gz");
    let target = PathBuf::from(target);

    let mut input = File::open(path)?;
    let mut writer = noodles_bgzf::io::Writer::new(File::create(&target)?);
    io::copy(&mut input, &mut writer)?;
    writer.finish()?;
    fs::remove_file(path)?;

    Ok(target)
}

fn split_file_name(name: &str) -> String {
    format!("{}.bed", name.replace('/', "_"))
}

/// Splits a genome-wide motif BED by its name column.
///
/// Every non-comment line with at least four columns is copied unchanged to
/// `<output_dir>/<name>.bed`, and each split file is then block-compressed to
/// `<name>.bed.gz`. Existing split files for the same names are overwritten.
///
/// # Returns
/// * `Result<BTreeMap<String, usize>>` - Number of lines written per motif name
pub fn split_by_name(input: &Path, output_dir: &Path) -> Result<BTreeMap<String, usize>> {
    fs::create_dir_all(output_dir)?;

    let reader = open_bed(input)?;
    let mut writers: HashMap<String, (PathBuf, BufWriter<File>)> = HashMap::new();
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();

    for line in reader.lines() {
        let line = line?;
        if line.starts_with('#') || line.trim().is_empty() {
            continue;
        }
        let Some(name) = line.split('\t').nth(3) else {
            debug!(line = %line, "fewer than 4 columns, dropping line");
            continue;
        };

        if !writers.contains_key(name) {
            let path = output_dir.join(split_file_name(name));
            let writer = BufWriter::new(File::create(&path)?);
            writers.insert(name.to_string(), (path, writer));
        }
        if let Some((_, writer)) = writers.get_mut(name) {
            writeln!(writer, "{}", line)?;
        }
        *counts.entry(name.to_string()).or_insert(0) += 1;
    }

    for (name, (path, mut writer)) in writers {
        writer.flush()?;
        drop(writer);
        bgzip_file(&path)?;
        debug!(motif = %name, "compressed split file");
    }

    info!(
        motifs = counts.len(),
        lines = counts.values().sum::<usize>(),
        "split source BED by motif name"
    );
    Ok(counts)
}
