#![allow(dead_code)]

use flate2::write::GzEncoder;
use flate2::read::MultiGzDecoder;
use flate2::Compression;
use motif_annot_rs::error::{MotifError, Result};
use motif_annot_rs::reference::{region_string, ReferenceSequenceProvider};
use motif_annot_rs::types::GenomeBuild;
use std::collections::HashMap;
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Reference double serving fixed sequences by region string
#[derive(Default)]
pub struct InMemoryReference {
    sequences: HashMap<String, String>,
    fetches: AtomicUsize,
}

impl InMemoryReference {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, chrom: &str, start: u64, end: u64, sequence: &str) -> Self {
        self.sequences
            .insert(region_string(chrom, start, end), sequence.to_lowercase());
        self
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

impl ReferenceSequenceProvider for InMemoryReference {
    fn fetch(&self, _build: GenomeBuild, chrom: &str, start: u64, end: u64) -> Result<String> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let region = region_string(chrom, start, end);
        self.sequences
            .get(&region)
            .cloned()
            .ok_or_else(|| MotifError::reference_fetch(region, "region not in test reference"))
    }
}

pub fn data_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/data")
        .join(name)
}

pub fn motif_dir() -> PathBuf {
    data_path("motifs")
}

pub fn write_gz(path: &Path, text: &str) {
    let mut encoder = GzEncoder::new(File::create(path).unwrap(), Compression::default());
    encoder.write_all(text.as_bytes()).unwrap();
    encoder.finish().unwrap();
}

pub fn read_gz(path: &Path) -> String {
    let mut text = String::new();
    MultiGzDecoder::new(File::open(path).unwrap())
        .read_to_string(&mut text)
        .unwrap();
    text
}
