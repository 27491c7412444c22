//! A single historical observation stored in the rule library.

use kernelscope_core::{KernelRecord, OperatorKernelPair, Shape};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

const INPUT_PREFIX: &str = "input_shape_";
const OUTPUT_PREFIX: &str = "output_shape_";

/// Kernel sequence observed for one operator instance, with the shape
/// signature it ran under.
///
/// On disk the shapes are flattened into `input_shape_0`, `input_shape_1`,
/// ... and `output_shape_0`, ... fields next to the kernel list. Entries are
/// immutable once constructed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawEntry", into = "RawEntry")]
pub struct RuleLibraryEntry {
    kernels: Vec<KernelRecord>,
    model: String,
    node_name: String,
    batch_size: u32,
    inputs: Vec<Shape>,
    outputs: Vec<Shape>,
}

impl RuleLibraryEntry {
    pub fn new(kernels: Vec<KernelRecord>, inputs: Vec<Shape>, outputs: Vec<Shape>) -> Self {
        Self {
            kernels,
            model: String::new(),
            node_name: String::new(),
            batch_size: 1,
            inputs,
            outputs,
        }
    }

    pub fn from_pair(pair: &OperatorKernelPair, model: &str, batch_size: u32) -> Self {
        Self {
            kernels: pair.kernels.clone(),
            model: model.to_string(),
            node_name: pair.operator.name.clone(),
            batch_size,
            inputs: pair.operator.input_dims(),
            outputs: pair.operator.output_dims(),
        }
    }

    pub fn with_source(mut self, model: impl Into<String>, node_name: impl Into<String>) -> Self {
        self.model = model.into();
        self.node_name = node_name.into();
        self
    }

    pub fn with_batch_size(mut self, batch_size: u32) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn kernels(&self) -> &[KernelRecord] {
        &self.kernels
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn node_name(&self) -> &str {
        &self.node_name
    }

    pub fn batch_size(&self) -> u32 {
        self.batch_size
    }

    pub fn inputs(&self) -> &[Shape] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[Shape] {
        &self.outputs
    }

    pub fn input(&self, idx: usize) -> Option<&Shape> {
        self.inputs.get(idx)
    }

    pub fn output(&self, idx: usize) -> Option<&Shape> {
        self.outputs.get(idx)
    }
}

#[derive(Serialize, Deserialize)]
struct RawEntry {
    kernels: Vec<KernelRecord>,
    #[serde(default)]
    model: String,
    #[serde(default)]
    node_name: String,
    #[serde(default = "default_batch_size")]
    batch_size: u32,
    #[serde(flatten)]
    fields: BTreeMap<String, Value>,
}

fn default_batch_size() -> u32 {
    1
}

/// Collect `prefix0`, `prefix1`, ... until the first gap.
fn indexed_shapes(fields: &BTreeMap<String, Value>, prefix: &str) -> Result<Vec<Shape>, String> {
    let mut shapes = Vec::new();
    while let Some(value) = fields.get(&format!("{prefix}{}", shapes.len())) {
        let shape: Shape = serde_json::from_value(value.clone())
            .map_err(|e| format!("`{prefix}{}` is not a shape: {e}", shapes.len()))?;
        shapes.push(shape);
    }
    Ok(shapes)
}

impl TryFrom<RawEntry> for RuleLibraryEntry {
    type Error = String;

    fn try_from(raw: RawEntry) -> Result<Self, Self::Error> {
        Ok(Self {
            inputs: indexed_shapes(&raw.fields, INPUT_PREFIX)?,
            outputs: indexed_shapes(&raw.fields, OUTPUT_PREFIX)?,
            kernels: raw.kernels,
            model: raw.model,
            node_name: raw.node_name,
            batch_size: raw.batch_size,
        })
    }
}

impl From<RuleLibraryEntry> for RawEntry {
    fn from(entry: RuleLibraryEntry) -> Self {
        let mut fields = BTreeMap::new();
        for (idx, shape) in entry.inputs.into_iter().enumerate() {
            fields.insert(format!("{INPUT_PREFIX}{idx}"), Value::from(shape));
        }
        for (idx, shape) in entry.outputs.into_iter().enumerate() {
            fields.insert(format!("{OUTPUT_PREFIX}{idx}"), Value::from(shape));
        }
        Self {
            kernels: entry.kernels,
            model: entry.model,
            node_name: entry.node_name,
            batch_size: entry.batch_size,
            fields,
        }
    }
}
