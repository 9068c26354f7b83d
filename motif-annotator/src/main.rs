use clap::{Args, Parser, Subcommand};
use motif_annot_rs::bed::split_by_name;
use motif_annot_rs::config::{group_name_for_file, AnnotatorConfig, INPUT_SUFFIX};
use motif_annot_rs::error::MotifError;
use motif_annot_rs::matrix::MotifMatrixStore;
use motif_annot_rs::metadata::MotifMetadataIndex;
use motif_annot_rs::reference::SamtoolsFaidx;
use motif_annot_rs::scanner::{process_batch, FileOutcome, IntervalScanner};
use motif_annot_rs::types::GenomeBuild;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(thiserror::Error, Debug)]
pub enum AnnotatorError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Motif(#[from] MotifError),

    #[error("Thread pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("{failed} of {total} motif files failed")]
    BatchFailed { failed: usize, total: usize },
}

#[derive(Parser)]
#[command(
    name = "motif-annotator",
    about = "Scores and annotates genome-wide transcription factor motif occurrences",
    long_about = "Builds a per-motif annotated BED resource from a genome-wide motif occurrence file. \
                  Occurrences are split by motif name, the reference sequence under each occurrence \
                  is fetched with samtools, and motifs explained by more than one matrix are scored \
                  against each candidate matrix to find the one behind the reported score.",
    version,
    after_help = "Example usage:\n    \
                  motif-annotator split homer.KnownMotifs.hg38.191020.bed.gz split_by_motifName/hg38\n    \
                  motif-annotator annotate split_by_motifName/hg38 processed_bed/hg38 --genome-build hg38\n    \
                  motif-annotator score 'FOXA1(Forkhead).bed.gz' processed_bed/hg38 --genome-build hg38",
    color = clap::ColorChoice::Always
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Split a genome-wide motif BED into one block-compressed file per motif name
    Split {
        /// Source BED file (gzip-compressed)
        #[arg(value_name = "SOURCE_BED")]
        source: PathBuf,

        /// Directory receiving <motif name>.bed.gz files
        #[arg(value_name = "OUTPUT_DIR")]
        output_dir: PathBuf,
    },

    /// Score one motif group file against its candidate matrices
    Score {
        /// Input <motif group>.bed.gz file; the group must be configured
        #[arg(value_name = "INPUT_BED")]
        input: PathBuf,

        /// Directory receiving the processed output
        #[arg(value_name = "OUTPUT_DIR")]
        output_dir: PathBuf,

        #[command(flatten)]
        shared: SharedArgs,
    },

    /// Process every <motif>.bed.gz file in a directory in parallel
    Annotate {
        /// Directory of split <motif>.bed.gz files
        #[arg(value_name = "INPUT_DIR")]
        input_dir: PathBuf,

        /// Directory receiving the processed outputs
        #[arg(value_name = "OUTPUT_DIR")]
        output_dir: PathBuf,

        /// Number of worker threads (defaults to the number of CPUs)
        #[arg(long)]
        threads: Option<usize>,

        #[command(flatten)]
        shared: SharedArgs,
    },
}

#[derive(Args, Debug)]
struct SharedArgs {
    /// Genome build of the input coordinates (hg19 or hg38)
    #[arg(long, short = 'g')]
    genome_build: String,

    /// Directory of <motif id>.motif matrix files
    #[arg(long, default_value = "motif_files")]
    motif_dir: PathBuf,

    /// Tab-delimited motif metadata table
    #[arg(long, default_value = "parsed_subheadings.txt")]
    metadata: PathBuf,

    /// TOML file with reference paths and scored motif groups
    /// (the built-in configuration is used when omitted)
    #[arg(long)]
    config: Option<PathBuf>,

    /// samtools executable used for reference lookups
    #[arg(long, default_value = "samtools")]
    samtools: PathBuf,
}

/// Everything loaded once before any file is processed
struct Resources {
    build: GenomeBuild,
    config: AnnotatorConfig,
    matrices: MotifMatrixStore,
    metadata: MotifMetadataIndex,
    reference: SamtoolsFaidx,
}

impl Resources {
    fn load(args: &SharedArgs) -> Result<Self, AnnotatorError> {
        // Checked before anything is read.
        let build: GenomeBuild = args.genome_build.parse()?;

        let config = match &args.config {
            Some(path) => AnnotatorConfig::from_path(path)?,
            None => AnnotatorConfig::builtin()?,
        };
        config.reference_for(build)?;

        let matrices = MotifMatrixStore::for_table(&args.motif_dir, &config.groups)?;
        let metadata = MotifMetadataIndex::from_path(&args.metadata)?;
        let reference =
            SamtoolsFaidx::new(config.references.clone()).with_program(&args.samtools);

        info!(
            build = %build,
            matrices = matrices.len(),
            metadata = metadata.len(),
            "loaded motif resources"
        );
        Ok(Self {
            build,
            config,
            matrices,
            metadata,
            reference,
        })
    }

    fn scanner(&self) -> IntervalScanner<'_, SamtoolsFaidx> {
        IntervalScanner::new(self.build, &self.matrices, &self.metadata, &self.reference)
    }
}

fn list_inputs(input_dir: &Path) -> Result<Vec<PathBuf>, AnnotatorError> {
    let mut inputs: Vec<PathBuf> = fs::read_dir(input_dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .map(|n| n.ends_with(INPUT_SUFFIX))
                .unwrap_or(false)
        })
        .collect();
    inputs.sort();
    Ok(inputs)
}

fn run_score(input: &Path, output_dir: &Path, shared: &SharedArgs) -> Result<(), AnnotatorError> {
    let resources = Resources::load(shared)?;
    let name = group_name_for_file(input)
        .ok_or_else(|| MotifError::UnsupportedMotifGroup(input.display().to_string()))?;
    let group = resources.config.groups.require(name)?;

    match resources.scanner().process_file(input, output_dir, Some(group))? {
        FileOutcome::Written { path, summary } => {
            println!("Output written to {} ({} rows)", path.display(), summary.rows_written)
        }
        FileOutcome::Skipped(path) => println!("Output file {} already exists. Skipping.", path.display()),
    }
    Ok(())
}

fn run_annotate(
    input_dir: &Path,
    output_dir: &Path,
    threads: Option<usize>,
    shared: &SharedArgs,
) -> Result<(), AnnotatorError> {
    let resources = Resources::load(shared)?;
    let inputs = list_inputs(input_dir)?;
    fs::create_dir_all(output_dir)?;
    println!("{} motif files to process", inputs.len());

    let mut builder = rayon::ThreadPoolBuilder::new();
    if let Some(n) = threads {
        builder = builder.num_threads(n);
    }
    let pool = builder.build()?;

    let scanner = resources.scanner();
    let summary = pool.install(|| {
        process_batch(&scanner, &resources.config.groups, &inputs, output_dir)
    });
    println!(
        "{} written, {} skipped, {} failed",
        summary.written.len(),
        summary.skipped.len(),
        summary.failed()
    );

    if summary.failed() > 0 {
        return Err(AnnotatorError::BatchFailed {
            failed: summary.failed(),
            total: summary.total(),
        });
    }
    Ok(())
}

fn main() -> Result<(), AnnotatorError> {
    let start_time = std::time::Instant::now();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match &cli.command {
        Command::Split { source, output_dir } => {
            let counts = split_by_name(source, output_dir)?;
            println!("{} motif BED files created and compressed.", counts.len());
        }
        Command::Score {
            input,
            output_dir,
            shared,
        } => run_score(input, output_dir, shared)?,
        Command::Annotate {
            input_dir,
            output_dir,
            threads,
            shared,
        } => run_annotate(input_dir, output_dir, *threads, shared)?,
    }

    let elapsed = start_time.elapsed();
    println!(
        "Total execution time: {:.4} minutes",
        elapsed.as_secs_f64() / 60.0
    );

    Ok(())
}
