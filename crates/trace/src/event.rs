//! Trace event parsing.

use kernelscope_core::{Dim3, KernelRecord, KernelScopeError, OperatorRecord, Result, TensorShape};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(from = "String")]
pub enum EventCategory {
    /// Start of a graph operator.
    Operator,
    /// A GPU launch issued by the current operator.
    Kernel,
    /// Session-level and other events that pairing ignores.
    #[default]
    Other,
}

impl From<String> for EventCategory {
    fn from(tag: String) -> Self {
        match tag.as_str() {
            "Node" => EventCategory::Operator,
            "Kernel" => EventCategory::Kernel,
            _ => EventCategory::Other,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TraceEvent {
    #[serde(rename = "cat", default)]
    pub category: EventCategory,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "dur", default, deserialize_with = "lenient_u64")]
    pub duration_us: u64,
    #[serde(default)]
    pub args: Map<String, Value>,
}

impl TraceEvent {
    pub fn arg_str(&self, key: &str) -> Option<&str> {
        self.args.get(key).and_then(Value::as_str)
    }

    /// Numeric argument; the profiler writes some sizes as strings.
    pub fn arg_u64(&self, key: &str) -> Option<u64> {
        self.args.get(key).and_then(value_as_u64)
    }

    fn arg_u32(&self, key: &str) -> u32 {
        self.arg_u64(key)
            .and_then(|v| u32::try_from(v).ok())
            .unwrap_or(0)
    }

    /// Reads `[{"float": [1, 3, 640, 640]}, ...]` style shape lists.
    pub fn tensor_shapes(&self, key: &str) -> std::result::Result<Vec<TensorShape>, String> {
        let Some(value) = self.args.get(key) else {
            return Ok(Vec::new());
        };
        let items = value
            .as_array()
            .ok_or_else(|| format!("`{key}` is not a list"))?;

        items
            .iter()
            .map(|item| {
                let (elem_type, dims) = item
                    .as_object()
                    .and_then(|obj| obj.iter().next())
                    .ok_or_else(|| format!("`{key}` entry is not a typed shape"))?;
                let dims = dims
                    .as_array()
                    .ok_or_else(|| format!("`{key}` dims for {elem_type} are not a list"))?
                    .iter()
                    .map(|d| d.as_i64().ok_or_else(|| format!("`{key}` has non-integer dim {d}")))
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(TensorShape::new(elem_type.clone(), dims))
            })
            .collect()
    }

    pub fn to_operator(&self, index: usize) -> std::result::Result<OperatorRecord, String> {
        let op_type = self
            .arg_str("op_name")
            .ok_or_else(|| format!("operator event `{}` has no op_name", self.name))?;

        Ok(OperatorRecord {
            name: self.name.clone(),
            op_type: op_type.to_string(),
            provider: self.arg_str("provider").unwrap_or_default().to_string(),
            inputs: self.tensor_shapes("input_type_shape")?,
            outputs: self.tensor_shapes("output_type_shape")?,
            parameter_size: self.arg_u64("parameter_size").unwrap_or(0),
            activation_size: self.arg_u64("activation_size").unwrap_or(0),
            output_size: self.arg_u64("output_size").unwrap_or(0),
            duration_us: self.duration_us,
            index,
        })
    }

    pub fn to_kernel(&self, index: Option<u32>) -> KernelRecord {
        KernelRecord {
            name: self.name.clone(),
            duration_us: self.duration_us,
            grid: Dim3::new(
                self.arg_u32("grid_x"),
                self.arg_u32("grid_y"),
                self.arg_u32("grid_z"),
            ),
            block: Dim3::new(
                self.arg_u32("block_x"),
                self.arg_u32("block_y"),
                self.arg_u32("block_z"),
            ),
            index,
            metrics: BTreeMap::new(),
        }
    }
}

/// Parse a trace document. Accepts a bare event array or a `{"traceEvents": [...]}` object.
pub fn parse_trace(text: &str, source_name: &str) -> Result<Vec<TraceEvent>> {
    let document: Value =
        serde_json::from_str(text).map_err(|e| KernelScopeError::parse(source_name, e))?;

    let events = match document {
        Value::Array(events) => events,
        Value::Object(mut obj) => match obj.remove("traceEvents") {
            Some(Value::Array(events)) => events,
            _ => {
                return Err(KernelScopeError::parse(
                    source_name,
                    "expected an event array or a `traceEvents` list",
                ))
            }
        },
        _ => {
            return Err(KernelScopeError::parse(
                source_name,
                "expected an event array",
            ))
        }
    };

    events
        .into_iter()
        .enumerate()
        .map(|(position, event)| {
            serde_json::from_value(event)
                .map_err(|e| KernelScopeError::parse(source_name, format!("event {position}: {e}")))
        })
        .collect()
}

pub fn read_trace(path: impl AsRef<Path>) -> Result<Vec<TraceEvent>> {
    let path = path.as_ref();
    let source_name = path.display().to_string();
    let text = fs::read_to_string(path).map_err(|e| KernelScopeError::parse(&source_name, e))?;
    parse_trace(&text, &source_name)
}

fn value_as_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn lenient_u64<'de, D>(deserializer: D) -> std::result::Result<u64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(value_as_u64(&value).unwrap_or(0))
}
