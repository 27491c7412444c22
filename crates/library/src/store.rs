//! Rule library document and its JSON persistence.

use crate::entry::RuleLibraryEntry;
use kernelscope_core::{KernelScopeError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::info;

pub const LIBRARY_SCHEMA_VERSION: &str = "1.0";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LibraryMetadata {
    #[serde(default)]
    pub gpu: String,
    pub version: String,
    #[serde(default)]
    pub description: String,
}

impl LibraryMetadata {
    pub fn new(gpu: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            gpu: gpu.into(),
            version: LIBRARY_SCHEMA_VERSION.to_string(),
            description: description.into(),
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }
}

/// Operator type → historical entries, plus the metadata describing where they came from.
///
/// The library is read-only once built; new captures are merged through
/// [`crate::RuleLibraryBuilder`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleLibrary {
    #[serde(flatten)]
    metadata: LibraryMetadata,
    data: BTreeMap<String, Vec<RuleLibraryEntry>>,
}

impl RuleLibrary {
    pub fn new(metadata: LibraryMetadata, data: BTreeMap<String, Vec<RuleLibraryEntry>>) -> Self {
        Self { metadata, data }
    }

    pub fn metadata(&self) -> &LibraryMetadata {
        &self.metadata
    }

    /// Candidates for one operator type; `None` when the type was never observed.
    pub fn entries(&self, op_type: &str) -> Option<&[RuleLibraryEntry]> {
        self.data.get(op_type).map(Vec::as_slice)
    }

    pub fn op_types(&self) -> impl Iterator<Item = &str> {
        self.data.keys().map(String::as_str)
    }

    pub fn entry_count(&self) -> usize {
        self.data.values().map(Vec::len).sum()
    }

    pub(crate) fn into_data(self) -> BTreeMap<String, Vec<RuleLibraryEntry>> {
        self.data
    }

    /// Write the library as one self-describing JSON document.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let blob = serde_json::to_vec_pretty(self)?;
        fs::write(path, blob)?;
        info!(
            path = %path.display(),
            entries = self.entry_count(),
            version = %self.metadata.version,
            "rule library saved"
        );
        Ok(())
    }

    /// Load a library document. Files without a `version` tag or a `data`
    /// field predate the versioned format and are rejected.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let source_name = path.display().to_string();
        let text = fs::read_to_string(path).map_err(|e| KernelScopeError::parse(&source_name, e))?;
        let document: Value =
            serde_json::from_str(&text).map_err(|e| KernelScopeError::parse(&source_name, e))?;

        for field in ["version", "data"] {
            if document.get(field).is_none() {
                return Err(KernelScopeError::Schema {
                    path: path.to_path_buf(),
                    field,
                });
            }
        }

        let library: RuleLibrary =
            serde_json::from_value(document).map_err(|e| KernelScopeError::parse(&source_name, e))?;
        info!(
            path = %path.display(),
            version = %library.metadata.version,
            gpu = %library.metadata.gpu,
            entries = library.entry_count(),
            "rule library loaded"
        );
        Ok(library)
    }
}
