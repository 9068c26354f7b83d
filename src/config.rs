use crate::error::{MotifError, Result};
use crate::types::GenomeBuild;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

const DEFAULT_CONFIG: &str = include_str!("../config/default.toml");

/// Suffix of the per-motif-group candidate files produced by the split step
pub const INPUT_SUFFIX: &str = ".bed.gz";

/// One candidate matrix of a motif group
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MatrixSpec {
    pub id: String,
    /// Raw scores at or below this value mean the matrix does not explain the site
    #[serde(default)]
    pub threshold: Option<f64>,
}

/// A named motif whose occurrences may come from one of several matrices
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MotifGroup {
    pub name: String,
    /// Expected interval length, equal to the length of every matrix in the group
    pub length: usize,
    pub matrices: Vec<MatrixSpec>,
}

impl MotifGroup {
    pub fn matrix_ids(&self) -> impl Iterator<Item = &str> {
        self.matrices.iter().map(|m| m.id.as_str())
    }

    fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(MotifError::InvalidConfig("motif group with an empty name".into()));
        }
        if self.length == 0 {
            return Err(MotifError::InvalidConfig(format!(
                "motif group {} has length 0",
                self.name
            )));
        }
        if self.matrices.is_empty() || self.matrices.len() > 2 {
            return Err(MotifError::InvalidConfig(format!(
                "motif group {} must list one or two matrices, found {}",
                self.name,
                self.matrices.len()
            )));
        }
        for spec in &self.matrices {
            if let Some(t) = spec.threshold {
                if !t.is_finite() {
                    return Err(MotifError::InvalidConfig(format!(
                        "threshold for {} in {} is not finite",
                        spec.id, self.name
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Motif groups that need scoring, keyed by group name
#[derive(Debug, Clone, Default)]
pub struct MotifGroupTable {
    groups: Vec<MotifGroup>,
    by_name: HashMap<String, usize>,
}

impl MotifGroupTable {
    pub fn new(groups: Vec<MotifGroup>) -> Result<Self> {
        let mut by_name = HashMap::with_capacity(groups.len());
        for (idx, group) in groups.iter().enumerate() {
            group.validate()?;
            if by_name.insert(group.name.clone(), idx).is_some() {
                return Err(MotifError::InvalidConfig(format!(
                    "motif group {} is listed twice",
                    group.name
                )));
            }
        }
        Ok(Self { groups, by_name })
    }

    pub fn get(&self, name: &str) -> Option<&MotifGroup> {
        self.by_name.get(name).map(|&idx| &self.groups[idx])
    }

    /// Looks up a group that must be configured.
    ///
    /// # Errors
    /// * `MotifError::UnsupportedMotifGroup` - If no group has this name
    pub fn require(&self, name: &str) -> Result<&MotifGroup> {
        self.get(name)
            .ok_or_else(|| MotifError::UnsupportedMotifGroup(name.to_string()))
    }

    /// Finds the group an input file `<group name>.bed.gz` belongs to.
    pub fn group_for_file(&self, path: &Path) -> Option<&MotifGroup> {
        group_name_for_file(path).and_then(|name| self.get(name))
    }

    pub fn iter(&self) -> impl Iterator<Item = &MotifGroup> {
        self.groups.iter()
    }

    pub fn matrix_ids(&self) -> impl Iterator<Item = &str> {
        self.groups.iter().flat_map(|g| g.matrix_ids())
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

/// Strips the `.bed.gz` suffix from a candidate file name.
pub fn group_name_for_file(path: &Path) -> Option<&str> {
    path.file_name()
        .and_then(|name| name.to_str())
        .and_then(|name| name.strip_suffix(INPUT_SUFFIX))
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    #[serde(default)]
    references: HashMap<GenomeBuild, PathBuf>,
    #[serde(default)]
    motif_groups: Vec<MotifGroup>,
}

/// Run configuration: reference FASTA per build and the scored motif groups
#[derive(Debug, Clone)]
pub struct AnnotatorConfig {
    pub references: HashMap<GenomeBuild, PathBuf>,
    pub groups: MotifGroupTable,
}

impl AnnotatorConfig {
    /// The configuration shipped in `config/default.toml`
    pub fn builtin() -> Result<Self> {
        Self::from_toml_str(DEFAULT_CONFIG)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        let raw: RawConfig =
            toml::from_str(text).map_err(|e| MotifError::InvalidConfig(e.to_string()))?;
        Ok(Self {
            references: raw.references,
            groups: MotifGroupTable::new(raw.motif_groups)?,
        })
    }

    /// Reference FASTA for a build.
    ///
    /// # Errors
    /// * `MotifError::UnsupportedGenomeBuild` - If the build has no reference configured
    pub fn reference_for(&self, build: GenomeBuild) -> Result<&Path> {
        self.references
            .get(&build)
            .map(PathBuf::as_path)
            .ok_or_else(|| MotifError::UnsupportedGenomeBuild(build.to_string()))
    }
}
