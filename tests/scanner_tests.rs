mod common;

use common::{data_path, motif_dir, read_gz, write_gz, InMemoryReference};
use motif_annot_rs::config::{AnnotatorConfig, MotifGroup};
use motif_annot_rs::error::MotifError;
use motif_annot_rs::matrix::MotifMatrixStore;
use motif_annot_rs::metadata::MotifMetadataIndex;
use motif_annot_rs::scanner::{
    output_path, plain_header, process_batch, scored_header, FileOutcome, IntervalScanner,
};
use motif_annot_rs::types::GenomeBuild;
use std::path::Path;
use tempfile::tempdir;

const SCORED_HEADER: &str = "#chrom\tchromStart\tchromEnd\tname\tscore\tstrand\tmotifID\tDNA_binding_domain\tcell_type\tbinding_sequence\tconsensus_sequence\tmotif_score_motif109\tmotif_score_motif110\tmotif_name";

struct Fixture {
    group: MotifGroup,
    matrices: MotifMatrixStore,
    metadata: MotifMetadataIndex,
}

fn fixture() -> Fixture {
    let config = AnnotatorConfig::builtin().unwrap();
    let group = config.groups.require("FOXA1(Forkhead)").unwrap().clone();
    let mut matrices = MotifMatrixStore::new(motif_dir());
    matrices.preload(group.matrix_ids()).unwrap();
    let metadata = MotifMetadataIndex::from_path(&data_path("parsed_subheadings.txt")).unwrap();
    Fixture {
        group,
        matrices,
        metadata,
    }
}

fn reference() -> InMemoryReference {
    InMemoryReference::new()
        .with("chr1", 101, 110, "AAAAAAAAAA")
        .with("chr1", 201, 210, "aaaaaaaaaa")
        .with("chr1", 301, 310, "aaaaattttt")
        .with("chr2", 11, 20, "atgactcatc")
        .with("chr3", 1, 12, "gggcccaaattt")
}

fn score_text(fx: &Fixture, reference: &InMemoryReference, input: &str) -> String {
    let scanner = IntervalScanner::new(GenomeBuild::Hg38, &fx.matrices, &fx.metadata, reference);
    let mut out = Vec::new();
    scanner
        .score_records(&fx.group, input.as_bytes(), &mut out)
        .unwrap();
    String::from_utf8(out).unwrap()
}

#[test]
fn test_scored_header() {
    assert_eq!(scored_header(["motif109", "motif110"]), SCORED_HEADER);
    assert!(plain_header().starts_with("#chrom\tchromStart\tchromEnd"));
    assert!(plain_header().ends_with("binding_sequence\tconsensus_sequence"));
}

#[test]
fn test_forward_strand_row() {
    let fx = fixture();
    let reference = reference();
    let text = score_text(
        &fx,
        &reference,
        "#comment\nchr1\t101\t110\tFOXA1(Forkhead)\t10\t+\n",
    );

    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0], SCORED_HEADER);
    assert_eq!(
        lines[1],
        "chr1\t100\t110\tFOXA1(Forkhead)\t10\t+\tmotif109\tForkhead\tLNCAP\taaaaaaaaaa\tTGTTTACWYW\t10\t-1\tmotif109"
    );
}

#[test]
fn test_reverse_strand_row() {
    let fx = fixture();
    let reference = reference();
    let text = score_text(&fx, &reference, "chr1\t201\t210\tFOXA1(Forkhead)\t10\t-\n");

    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 2);
    assert_eq!(
        lines[1],
        "chr1\t200\t210\tFOXA1(Forkhead)\t10\t-\tmotif110\tForkhead\tMCF7\ttttttttttt\tWAAGTAAACA\t-1\t10\tmotif110"
    );
}

#[test]
fn test_no_row_when_score_is_not_explained() {
    let fx = fixture();
    let reference = reference();
    let scanner = IntervalScanner::new(GenomeBuild::Hg38, &fx.matrices, &fx.metadata, &reference);
    let input = "chr1\t101\t110\tFOXA1(Forkhead)\t9\t+\n\
                 chr1\t301\t310\tFOXA1(Forkhead)\t-1\t+\n";
    let mut out = Vec::new();
    let summary = scanner
        .score_records(&fx.group, input.as_bytes(), &mut out)
        .unwrap();

    assert_eq!(String::from_utf8(out).unwrap().lines().count(), 1);
    assert_eq!(summary.records, 2);
    assert_eq!(summary.unmatched, 2);
    assert_eq!(summary.rows_written, 0);
}

#[test]
fn test_length_mismatch_is_filtered() {
    let fx = fixture();
    let reference = reference();
    let scanner = IntervalScanner::new(GenomeBuild::Hg38, &fx.matrices, &fx.metadata, &reference);
    let mut out = Vec::new();
    let summary = scanner
        .score_records(
            &fx.group,
            "chr3\t1\t12\tFOXA1(Forkhead)\t10\t+\n".as_bytes(),
            &mut out,
        )
        .unwrap();

    assert_eq!(String::from_utf8(out).unwrap().lines().count(), 1);
    assert_eq!(summary.length_mismatches, 1);
    assert_eq!(reference.fetches(), 0);
}

#[test]
fn test_duplicate_intervals_are_emitted_once() {
    let fx = fixture();
    let row = "chr1\t101\t110\tFOXA1(Forkhead)\t10\t+\n";

    let once = score_text(&fx, &reference(), row);
    let duplicated = score_text(&fx, &reference(), &row.repeat(3));
    assert_eq!(once, duplicated);

    let reference = reference();
    let scanner = IntervalScanner::new(GenomeBuild::Hg38, &fx.matrices, &fx.metadata, &reference);
    let mut out = Vec::new();
    let summary = scanner
        .score_records(&fx.group, row.repeat(3).as_bytes(), &mut out)
        .unwrap();
    assert_eq!(summary.rows_written, 1);
    assert_eq!(summary.duplicates, 0);
    // motif110 never produced a row, so repeats are still scored
    assert_eq!(reference.fetches(), 3);
}

#[test]
fn test_fully_processed_interval_is_not_fetched_again() {
    let fx = fixture();
    let mut group = fx.group.clone();
    group.matrices.truncate(1);
    let reference = reference();
    let scanner = IntervalScanner::new(GenomeBuild::Hg38, &fx.matrices, &fx.metadata, &reference);

    let row = "chr1\t101\t110\tFOXA1(Forkhead)\t10\t+\n";
    let mut out = Vec::new();
    let summary = scanner
        .score_records(&group, row.repeat(2).as_bytes(), &mut out)
        .unwrap();

    assert_eq!(summary.rows_written, 1);
    assert_eq!(summary.duplicates, 1);
    assert_eq!(reference.fetches(), 1);
}

#[test]
fn test_metadata_miss_uses_sentinel() {
    let fx = fixture();
    let reference = reference();
    let metadata = MotifMetadataIndex::new();
    let scanner = IntervalScanner::new(GenomeBuild::Hg19, &fx.matrices, &metadata, &reference);
    let mut out = Vec::new();
    scanner
        .score_records(
            &fx.group,
            "chr1\t101\t110\tFOXA1(Forkhead)\t10\t+\n".as_bytes(),
            &mut out,
        )
        .unwrap();

    let text = String::from_utf8(out).unwrap();
    assert_eq!(
        text.lines().nth(1).unwrap(),
        "chr1\t100\t110\tFOXA1(Forkhead)\t10\t+\t.\t.\t.\taaaaaaaaaa\t.\t10\t-1\tmotif109"
    );
}

#[test]
fn test_reference_failure_propagates() {
    let fx = fixture();
    let reference = InMemoryReference::new();
    let scanner = IntervalScanner::new(GenomeBuild::Hg38, &fx.matrices, &fx.metadata, &reference);
    let result = scanner.score_records(
        &fx.group,
        "chr9\t101\t110\tFOXA1(Forkhead)\t10\t+\n".as_bytes(),
        Vec::<u8>::new(),
    );
    assert!(matches!(result, Err(MotifError::ReferenceFetch { .. })));
}

#[test]
fn test_short_reference_sequence_is_an_error() {
    let fx = fixture();
    let reference = InMemoryReference::new().with("chr1", 101, 110, "aaaa");
    let scanner = IntervalScanner::new(GenomeBuild::Hg38, &fx.matrices, &fx.metadata, &reference);
    let result = scanner.score_records(
        &fx.group,
        "chr1\t101\t110\tFOXA1(Forkhead)\t10\t+\n".as_bytes(),
        Vec::<u8>::new(),
    );
    assert!(matches!(result, Err(MotifError::ReferenceFetch { .. })));
}

#[test]
fn test_malformed_record_is_an_error() {
    let fx = fixture();
    let reference = reference();
    let scanner = IntervalScanner::new(GenomeBuild::Hg38, &fx.matrices, &fx.metadata, &reference);
    let result = scanner.score_records(
        &fx.group,
        "#header\nchr1\t101\t110\tFOXA1(Forkhead)\tten\t+\n".as_bytes(),
        Vec::<u8>::new(),
    );
    assert!(matches!(
        result,
        Err(MotifError::InvalidRecord { line: 2, .. })
    ));
}

#[test]
fn test_annotate_records() {
    let fx = fixture();
    let reference = reference();
    let scanner = IntervalScanner::new(GenomeBuild::Hg38, &fx.matrices, &fx.metadata, &reference);
    let input = "chr2\t11\t20\tAP-1(bZIP)\t8\t+\n\
                 chr3\t1\t12\tZNF652\t7\t-\n\
                 chr2\t11\t20\tUnknown(?)\t8\t+\n";
    let mut out = Vec::new();
    let summary = scanner.annotate_records(input.as_bytes(), &mut out).unwrap();

    let text = String::from_utf8(out).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 4);
    assert_eq!(lines[0], plain_header());
    assert_eq!(
        lines[1],
        "chr2\t10\t20\tAP-1(bZIP)\t8\t+\tmotif1\tbZIP\tThioMac\tatgactcatc\tVTGACTCATC"
    );
    assert_eq!(
        lines[2],
        "chr3\t0\t12\tZNF652\t7\t-\tmotif400\t.\tHepG2\taaatttgggccc\tN/A"
    );
    // no metadata entry: the row is kept with "." metadata
    assert_eq!(
        lines[3],
        "chr2\t10\t20\tUnknown(?)\t8\t+\t.\t.\t.\tatgactcatc\t."
    );
    assert_eq!(summary.records, 3);
    assert_eq!(summary.unmatched, 1);
    assert_eq!(summary.rows_written, 3);
}

#[test]
fn test_empty_metadata_field_is_written_empty() {
    let fx = fixture();
    let reference = reference();
    let scanner = IntervalScanner::new(GenomeBuild::Hg38, &fx.matrices, &fx.metadata, &reference);
    let mut out = Vec::new();
    scanner
        .annotate_records("chr2\t11\t20\tSTAT3(Stat)\t9\t+\n".as_bytes(), &mut out)
        .unwrap();

    let text = String::from_utf8(out).unwrap();
    assert_eq!(
        text.lines().nth(1).unwrap(),
        "chr2\t10\t20\tSTAT3(Stat)\t9\t+\tmotif500\tStat\t\tatgactcatc\tCTTCCGGGAA"
    );
}

#[test]
fn test_process_file() {
    let fx = fixture();
    let reference = reference();
    let scanner = IntervalScanner::new(GenomeBuild::Hg38, &fx.matrices, &fx.metadata, &reference);

    let input_dir = tempdir().unwrap();
    let output_dir = tempdir().unwrap();
    let input = input_dir.path().join("FOXA1(Forkhead).bed.gz");
    write_gz(
        &input,
        "chr1\t101\t110\tFOXA1(Forkhead)\t10\t+\n\
         chr1\t201\t210\tFOXA1(Forkhead)\t10\t-\n",
    );

    let outcome = scanner
        .process_file(&input, output_dir.path(), Some(&fx.group))
        .unwrap();
    let path = match outcome {
        FileOutcome::Written { path, summary } => {
            assert_eq!(summary.rows_written, 2);
            path
        }
        FileOutcome::Skipped(_) => panic!("output should have been written"),
    };
    assert_eq!(
        path,
        output_dir.path().join("FOXA1(Forkhead).processed.bed.gz")
    );
    assert!(!output_dir
        .path()
        .join("FOXA1(Forkhead).processed.bed")
        .exists());

    let text = read_gz(&path);
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[0], SCORED_HEADER);
    assert!(lines[1].ends_with("\tmotif109"));
    assert!(lines[2].ends_with("\tmotif110"));

    // second run leaves the existing output alone
    let again = scanner
        .process_file(&input, output_dir.path(), Some(&fx.group))
        .unwrap();
    assert_eq!(again, FileOutcome::Skipped(path));
}

#[test]
fn test_process_file_failure_leaves_no_output() {
    let fx = fixture();
    let reference = InMemoryReference::new();
    let scanner = IntervalScanner::new(GenomeBuild::Hg38, &fx.matrices, &fx.metadata, &reference);

    let input_dir = tempdir().unwrap();
    let output_dir = tempdir().unwrap();
    let input = input_dir.path().join("AP-1(bZIP).bed.gz");
    write_gz(&input, "chr2\t11\t20\tAP-1(bZIP)\t8\t+\n");

    assert!(scanner.process_file(&input, output_dir.path(), None).is_err());
    assert!(!output_dir.path().join("AP-1(bZIP).processed.bed").exists());
    assert!(!output_dir.path().join("AP-1(bZIP).processed.bed.gz").exists());
}

#[test]
fn test_batch_failure_is_isolated_to_its_file() {
    let fx = fixture();
    let config = AnnotatorConfig::builtin().unwrap();
    let reference = reference();
    let scanner = IntervalScanner::new(GenomeBuild::Hg38, &fx.matrices, &fx.metadata, &reference);

    let input_dir = tempdir().unwrap();
    let output_dir = tempdir().unwrap();
    let bad = input_dir.path().join("AP-1(bZIP).bed.gz");
    write_gz(&bad, "chr9\t11\t20\tAP-1(bZIP)\t8\t+\n");
    let good = input_dir.path().join("FOXA1(Forkhead).bed.gz");
    write_gz(&good, "chr1\t101\t110\tFOXA1(Forkhead)\t10\t+\n");

    let summary = process_batch(
        &scanner,
        &config.groups,
        &[bad.clone(), good],
        output_dir.path(),
    );

    assert_eq!(summary.total(), 2);
    assert_eq!(summary.failed(), 1);
    assert_eq!(summary.failures[0].0, bad);
    assert!(summary.failures[0].1.contains("chr9:11-20"));
    assert_eq!(
        summary.written,
        vec![output_dir.path().join("FOXA1(Forkhead).processed.bed.gz")]
    );

    let text = read_gz(&summary.written[0]);
    assert_eq!(text.lines().count(), 2);
    assert!(!output_dir.path().join("AP-1(bZIP).processed.bed").exists());
    assert!(!output_dir.path().join("AP-1(bZIP).processed.bed.gz").exists());
}

#[test]
fn test_output_path() {
    assert_eq!(
        output_path(Path::new("in/Nr5a2(NR).bed.gz"), Path::new("out")).unwrap(),
        Path::new("out/Nr5a2(NR).processed.bed")
    );
    assert!(output_path(Path::new("in/Nr5a2(NR).txt"), Path::new("out")).is_err());
}
