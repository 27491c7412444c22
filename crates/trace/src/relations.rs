//! Operator → kernel-sequence relation statistics.

use kernelscope_core::OperatorKernelPair;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// An operator type, the provider it ran on, and the kernel names it launched in order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RelationKey {
    pub op_type: String,
    pub provider: String,
    pub kernels: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationStats {
    pub count: usize,
    /// Operator indices of every instance, in trace order.
    pub instances: Vec<usize>,
}

pub fn relation_stats(pairs: &[OperatorKernelPair]) -> BTreeMap<RelationKey, RelationStats> {
    let mut relations: BTreeMap<RelationKey, RelationStats> = BTreeMap::new();

    for pair in pairs {
        let key = RelationKey {
            op_type: pair.operator.op_type.clone(),
            provider: pair.operator.provider.clone(),
            kernels: pair.kernels.iter().map(|k| k.name.clone()).collect(),
        };
        let stats = relations.entry(key).or_default();
        stats.count += 1;
        stats.instances.push(pair.operator.index);
    }

    relations
}

/// Operator types that map to more than one kernel sequence.
pub fn ambiguous_op_types(relations: &BTreeMap<RelationKey, RelationStats>) -> Vec<&str> {
    let mut per_type: BTreeMap<&str, usize> = BTreeMap::new();
    for key in relations.keys() {
        *per_type.entry(key.op_type.as_str()).or_default() += 1;
    }
    per_type
        .into_iter()
        .filter(|(_, sequences)| *sequences > 1)
        .map(|(op_type, _)| op_type)
        .collect()
}
