//! Accumulates captures into a rule library.

use crate::entry::RuleLibraryEntry;
use crate::store::{LibraryMetadata, RuleLibrary};
use kernelscope_core::{OperatorKernelPair, Result};
use kernelscope_metrics::{MetricIntegrator, MetricTable};
use kernelscope_trace::load_pairs;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::info;

/// Owned accumulator for library entries, keyed by operator type.
///
/// Merges go through `&mut self`, so a caller that shares a builder has to
/// serialize them itself.
#[derive(Debug, Default)]
pub struct RuleLibraryBuilder {
    data: BTreeMap<String, Vec<RuleLibraryEntry>>,
    integrator: MetricIntegrator,
}

impl RuleLibraryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Continue accumulating on top of a previously saved library.
    pub fn from_library(library: RuleLibrary) -> Self {
        Self {
            data: library.into_data(),
            integrator: MetricIntegrator::default(),
        }
    }

    pub fn with_integrator(mut self, integrator: MetricIntegrator) -> Self {
        self.integrator = integrator;
        self
    }

    /// Append one entry per pair. Returns the number of entries added.
    pub fn add_pairs(&mut self, pairs: &[OperatorKernelPair], model: &str, batch_size: u32) -> usize {
        for pair in pairs {
            self.data
                .entry(pair.operator.op_type.clone())
                .or_default()
                .push(RuleLibraryEntry::from_pair(pair, model, batch_size));
        }
        pairs.len()
    }

    /// Read a trace, attach metrics when a table is given, and merge it.
    ///
    /// The model name is the trace file's stem. Parse and consistency
    /// failures abort the merge and leave the builder untouched.
    pub fn add_trace(
        &mut self,
        path: impl AsRef<Path>,
        batch_size: u32,
        metrics: Option<&MetricTable>,
    ) -> Result<usize> {
        let path = path.as_ref();
        let mut pairs = load_pairs(path)?;
        if let Some(table) = metrics {
            self.integrator.integrate(&mut pairs, table)?;
        }

        let model = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();
        let added = self.add_pairs(&pairs, &model, batch_size);
        info!(
            trace = %path.display(),
            model = %model,
            batch_size,
            entries = added,
            with_metrics = metrics.is_some(),
            "merged capture into rule library"
        );
        Ok(added)
    }

    pub fn entry_count(&self) -> usize {
        self.data.values().map(Vec::len).sum()
    }

    pub fn finish(self, metadata: LibraryMetadata) -> RuleLibrary {
        RuleLibrary::new(metadata, self.data)
    }
}
