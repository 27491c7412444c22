//! Operator/kernel pairing over an ordered event log.

use crate::event::{read_trace, EventCategory, TraceEvent};
use kernelscope_core::{is_memcpy_name, KernelScopeError, OperatorKernelPair, Result};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use tracing::debug;

/// Attach every kernel launch to the operator boundary that precedes it.
///
/// Operator indices count every boundary event. Kernel indices count only
/// launches whose name does not mark a memory copy, which matches the launch
/// IDs of the hardware profiler's export; memory copies get no index.
pub fn pair_events(events: &[TraceEvent], source_name: &str) -> Result<Vec<OperatorKernelPair>> {
    let mut pairs: Vec<OperatorKernelPair> = Vec::new();
    let mut kernel_idx: u32 = 0;

    for event in events {
        match event.category {
            EventCategory::Operator => {
                let operator = event
                    .to_operator(pairs.len())
                    .map_err(|detail| KernelScopeError::parse(source_name, detail))?;
                pairs.push(OperatorKernelPair {
                    operator,
                    kernels: Vec::new(),
                });
            }
            EventCategory::Kernel => {
                // Launches before the first boundary belong to session setup.
                let Some(current) = pairs.last_mut() else {
                    continue;
                };
                let index = if is_memcpy_name(&event.name) {
                    None
                } else {
                    kernel_idx += 1;
                    Some(kernel_idx - 1)
                };
                current.kernels.push(event.to_kernel(index));
            }
            EventCategory::Other => {}
        }
    }

    if pairs.is_empty() {
        return Err(KernelScopeError::parse(
            source_name,
            "trace contains no operator events",
        ));
    }

    debug!(
        source = source_name,
        operators = pairs.len(),
        kernels = kernel_idx,
        "paired trace events"
    );
    Ok(pairs)
}

/// Read and pair a trace file.
pub fn load_pairs(path: impl AsRef<Path>) -> Result<Vec<OperatorKernelPair>> {
    let path = path.as_ref();
    let events = read_trace(path)?;
    pair_events(&events, &path.display().to_string())
}

/// Lookup by operator name. Names are not guaranteed unique; later pairs win.
pub fn index_by_name(pairs: &[OperatorKernelPair]) -> HashMap<&str, &OperatorKernelPair> {
    pairs
        .iter()
        .map(|pair| (pair.operator.name.as_str(), pair))
        .collect()
}

pub fn group_by_op_type(pairs: &[OperatorKernelPair]) -> BTreeMap<&str, Vec<&OperatorKernelPair>> {
    let mut groups: BTreeMap<&str, Vec<&OperatorKernelPair>> = BTreeMap::new();
    for pair in pairs {
        groups
            .entry(pair.operator.op_type.as_str())
            .or_default()
            .push(pair);
    }
    groups
}

pub fn max_kernel_index(pairs: &[OperatorKernelPair]) -> Option<u32> {
    pairs
        .iter()
        .flat_map(|pair| pair.kernels.iter())
        .filter_map(|kernel| kernel.index)
        .max()
}
