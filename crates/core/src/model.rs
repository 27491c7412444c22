//! Operator and kernel records shared by every stage of the pipeline.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Dimension list of one tensor.
pub type Shape = Vec<i64>;

/// Marker the runtime uses in the names of memory-copy operators and launches.
pub const MEMCPY_MARKER: &str = "Memcpy";

pub fn is_memcpy_name(name: &str) -> bool {
    name.contains(MEMCPY_MARKER)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TensorShape {
    pub elem_type: String,
    pub dims: Shape,
}

impl TensorShape {
    pub fn new(elem_type: impl Into<String>, dims: Shape) -> Self {
        Self {
            elem_type: elem_type.into(),
            dims,
        }
    }

    pub fn rank(&self) -> usize {
        self.dims.len()
    }
}

/// Three-dimensional launch configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Dim3 {
    pub x: u32,
    pub y: u32,
    pub z: u32,
}

impl Dim3 {
    pub fn new(x: u32, y: u32, z: u32) -> Self {
        Self { x, y, z }
    }

    pub fn volume(&self) -> u64 {
        self.x as u64 * self.y as u64 * self.z as u64
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricValue {
    pub value: f64,
    pub unit: String,
}

/// One GPU launch observed under an operator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KernelRecord {
    pub name: String,
    pub duration_us: u64,
    pub grid: Dim3,
    pub block: Dim3,
    /// Position among non-memcpy launches; `None` for memory copies.
    #[serde(with = "launch_index")]
    pub index: Option<u32>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metrics: BTreeMap<String, MetricValue>,
}

impl KernelRecord {
    pub fn new(name: impl Into<String>, grid: Dim3, block: Dim3) -> Self {
        Self {
            name: name.into(),
            duration_us: 0,
            grid,
            block,
            index: None,
            metrics: BTreeMap::new(),
        }
    }

    pub fn is_memcpy(&self) -> bool {
        is_memcpy_name(&self.name)
    }

    pub fn grid_size(&self) -> u64 {
        self.grid.volume()
    }

    pub fn block_size(&self) -> u64 {
        self.block.volume()
    }

    pub fn metric(&self, name: &str) -> Option<f64> {
        self.metrics.get(name).map(|m| m.value)
    }

    pub fn same_launch(&self, other: &KernelRecord) -> bool {
        self.grid == other.grid && self.block == other.block
    }
}

/// One graph-operator instance from a trace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperatorRecord {
    pub name: String,
    pub op_type: String,
    pub provider: String,
    pub inputs: Vec<TensorShape>,
    pub outputs: Vec<TensorShape>,
    pub parameter_size: u64,
    pub activation_size: u64,
    pub output_size: u64,
    pub duration_us: u64,
    pub index: usize,
}

impl OperatorRecord {
    pub fn is_memcpy(&self) -> bool {
        is_memcpy_name(&self.op_type)
    }

    pub fn input_dims(&self) -> Vec<Shape> {
        self.inputs.iter().map(|t| t.dims.clone()).collect()
    }

    pub fn output_dims(&self) -> Vec<Shape> {
        self.outputs.iter().map(|t| t.dims.clone()).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperatorKernelPair {
    pub operator: OperatorRecord,
    pub kernels: Vec<KernelRecord>,
}

impl OperatorKernelPair {
    pub fn kernel_names(&self) -> Vec<&str> {
        self.kernels.iter().map(|k| k.name.as_str()).collect()
    }

    /// Launches that take part in metric joins.
    pub fn indexed_kernels(&self) -> impl Iterator<Item = &KernelRecord> {
        self.kernels.iter().filter(|k| k.index.is_some())
    }
}

/// Stores a missing launch index as `-1` so documents stay readable by older tooling.
mod launch_index {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(index: &Option<u32>, serializer: S) -> Result<S::Ok, S::Error> {
        match index {
            Some(value) => serializer.serialize_i64(*value as i64),
            None => serializer.serialize_i64(-1),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u32>, D::Error> {
        let raw = i64::deserialize(deserializer)?;
        if raw < 0 {
            return Ok(None);
        }
        u32::try_from(raw)
            .map(Some)
            .map_err(serde::de::Error::custom)
    }
}
