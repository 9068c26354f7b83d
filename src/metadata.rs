use crate::error::{MotifError, Result};
use polars::prelude::*;
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, warn};

const COL_MOTIF_ID: usize = 0;
const COL_NAME: usize = 1;
const COL_DNA_BINDING_DOMAIN: usize = 3;
const COL_CELL_TYPE: usize = 4;
const COL_CONSENSUS: usize = 9;
const COL_CONSENSUS_LENGTH: usize = 10;

const MISSING: &str = ".";

/// Annotation attached to every output row of a motif
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataRecord {
    pub motif_id: String,
    pub cell_type: String,
    pub dna_binding_domain: String,
    pub consensus_sequence: String,
}

impl MetadataRecord {
    /// Record used when a motif has no metadata: every field is "."
    pub fn sentinel() -> Self {
        Self {
            motif_id: MISSING.to_string(),
            cell_type: MISSING.to_string(),
            dna_binding_domain: MISSING.to_string(),
            consensus_sequence: MISSING.to_string(),
        }
    }
}

fn string_column(df: &DataFrame, idx: usize) -> Result<&StringChunked> {
    Ok(df.get_columns()[idx].str()?)
}

/// Display name plus consensus length; `None` when the length was not known
pub type MetadataKey = (String, Option<usize>);

/// Lookup from motif display name and length to motif metadata
#[derive(Debug, Clone, Default)]
pub struct MotifMetadataIndex {
    by_key: HashMap<MetadataKey, MetadataRecord>,
    by_id: HashMap<String, MetadataRecord>,
}

impl MotifMetadataIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads the tab-delimited metadata table.
    ///
    /// The table has one header line. Columns are used by position: motif ID (0),
    /// display name (1), DNA-binding domain (3), cell type (4), consensus
    /// sequence (9) and consensus length (10). Empty fields are kept as empty
    /// strings.
    ///
    /// # Errors
    /// * `MotifError::Polars` - If the table cannot be read
    /// * `MotifError::InvalidFileFormat` - If the table has fewer than 11 columns
    pub fn from_path(path: &Path) -> Result<Self> {
        let df = CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(Some(0))
            .with_parse_options(
                CsvParseOptions::default()
                    .with_separator(b'\t')
                    .with_quote_char(None)
                    .with_missing_is_null(false),
            )
            .try_into_reader_with_file_path(Some(path.to_path_buf()))?
            .finish()?;

        Self::from_dataframe(&df)
    }

    /// Builds the index from a table whose columns are all strings.
    pub fn from_dataframe(df: &DataFrame) -> Result<Self> {
        if df.width() <= COL_CONSENSUS_LENGTH {
            return Err(MotifError::InvalidFileFormat(format!(
                "metadata table has {} columns, expected at least {}",
                df.width(),
                COL_CONSENSUS_LENGTH + 1
            )));
        }

        let ids = string_column(df, COL_MOTIF_ID)?;
        let names = string_column(df, COL_NAME)?;
        let domains = string_column(df, COL_DNA_BINDING_DOMAIN)?;
        let cell_types = string_column(df, COL_CELL_TYPE)?;
        let consensus = string_column(df, COL_CONSENSUS)?;
        let lengths = string_column(df, COL_CONSENSUS_LENGTH)?;

        let mut index = Self::new();
        for idx in 0..df.height() {
            let field = |ca: &StringChunked| ca.get(idx).unwrap_or("").trim().to_string();

            let name = field(names);
            let record = MetadataRecord {
                motif_id: field(ids),
                cell_type: field(cell_types),
                dna_binding_domain: field(domains),
                consensus_sequence: field(consensus),
            };
            let length = field(lengths);
            index.insert_row(idx + 2, name, &length, record);
        }

        debug!(records = index.len(), "loaded motif metadata");
        Ok(index)
    }

    /// Adds one table row.
    ///
    /// A numeric, non-zero length must equal the consensus length; rows that
    /// do not are rejected. Rows without a usable length are indexed by name only.
    /// Returns whether the row was indexed.
    pub fn insert_row(
        &mut self,
        line: usize,
        name: String,
        length: &str,
        record: MetadataRecord,
    ) -> bool {
        let length = length.parse::<usize>().ok().filter(|&l| l > 0);
        if let Some(l) = length {
            if record.consensus_sequence.len() != l {
                warn!(
                    line,
                    motif = %record.motif_id,
                    consensus = %record.consensus_sequence,
                    length = l,
                    "consensus length does not match length column, skipping row"
                );
                return false;
            }
        }

        self.by_id.insert(record.motif_id.clone(), record.clone());
        self.by_key.insert((name, length), record);
        true
    }

    /// Exact `(name, length)` lookup, falling back to the name-only entry.
    pub fn lookup(&self, name: &str, length: usize) -> Option<&MetadataRecord> {
        self.by_key
            .get(&(name.to_string(), Some(length)))
            .or_else(|| self.by_key.get(&(name.to_string(), None)))
    }

    /// Like `lookup`, but a miss yields the "." sentinel record.
    pub fn lookup_or_sentinel(&self, name: &str, length: usize) -> MetadataRecord {
        self.lookup(name, length)
            .cloned()
            .unwrap_or_else(MetadataRecord::sentinel)
    }

    pub fn by_motif_id(&self, motif_id: &str) -> Option<&MetadataRecord> {
        self.by_id.get(motif_id)
    }

    pub fn by_motif_id_or_sentinel(&self, motif_id: &str) -> MetadataRecord {
        self.by_motif_id(motif_id)
            .cloned()
            .unwrap_or_else(MetadataRecord::sentinel)
    }

    pub fn len(&self) -> usize {
        self.by_key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }
}
