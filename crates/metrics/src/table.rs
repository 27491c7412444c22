//! Metric table loaded from the hardware profiler's CSV export.

use kernelscope_core::{KernelScopeError, Result};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

const ID_COLUMN: &str = "ID";
const NAME_COLUMN: &str = "Metric Name";
const UNIT_COLUMN: &str = "Metric Unit";
const VALUE_COLUMN: &str = "Metric Value";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricRow {
    pub kernel_index: u32,
    pub name: String,
    /// Raw cell text, e.g. `"1,024"` or `"61.43"`.
    pub value: String,
    pub unit: String,
}

impl MetricRow {
    pub fn numeric_value(&self) -> Option<f64> {
        parse_metric_value(&self.value)
    }
}

#[derive(Debug, Clone, Default)]
pub struct MetricTable {
    rows: BTreeMap<u32, Vec<MetricRow>>,
}

struct Columns {
    id: usize,
    name: usize,
    unit: usize,
    value: usize,
}

impl Columns {
    fn locate(header: &[String]) -> Option<Self> {
        let find = |column: &str| header.iter().position(|h| h == column);
        Some(Self {
            id: find(ID_COLUMN)?,
            name: find(NAME_COLUMN)?,
            unit: find(UNIT_COLUMN)?,
            value: find(VALUE_COLUMN)?,
        })
    }

    fn width(&self) -> usize {
        self.id.max(self.name).max(self.unit).max(self.value) + 1
    }
}

impl MetricTable {
    pub fn from_rows(rows: impl IntoIterator<Item = MetricRow>) -> Self {
        let mut table = Self::default();
        for row in rows {
            table.rows.entry(row.kernel_index).or_default().push(row);
        }
        table
    }

    pub fn read(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let source_name = path.display().to_string();
        let file = File::open(path).map_err(|e| KernelScopeError::parse(&source_name, e))?;
        Self::from_lines(BufReader::new(file).lines(), &source_name)
    }

    pub fn parse(text: &str, source_name: &str) -> Result<Self> {
        Self::from_lines(text.lines().map(|l| Ok(l.to_string())), source_name)
    }

    /// Rows before the header (profiler log lines) are skipped.
    fn from_lines<I>(lines: I, source_name: &str) -> Result<Self>
    where
        I: Iterator<Item = std::io::Result<String>>,
    {
        let mut columns: Option<Columns> = None;
        let mut rows = Vec::new();

        for (line_no, line) in lines.enumerate() {
            let line = line.map_err(|e| KernelScopeError::parse(source_name, e))?;
            if line.trim().is_empty() {
                continue;
            }
            let fields = split_record(&line);

            let cols = match &columns {
                Some(cols) => cols,
                None => {
                    columns = Columns::locate(&fields);
                    continue;
                }
            };

            if fields.len() < cols.width() {
                return Err(KernelScopeError::parse(
                    source_name,
                    format!("line {}: expected {} fields, found {}", line_no + 1, cols.width(), fields.len()),
                ));
            }
            let kernel_index = fields[cols.id].trim().parse::<u32>().map_err(|e| {
                KernelScopeError::parse(
                    source_name,
                    format!("line {}: bad kernel ID `{}`: {e}", line_no + 1, fields[cols.id]),
                )
            })?;

            rows.push(MetricRow {
                kernel_index,
                name: fields[cols.name].clone(),
                value: fields[cols.value].clone(),
                unit: fields[cols.unit].clone(),
            });
        }

        if columns.is_none() {
            return Err(KernelScopeError::parse(
                source_name,
                format!("no header with `{ID_COLUMN}`, `{NAME_COLUMN}`, `{UNIT_COLUMN}`, `{VALUE_COLUMN}` columns"),
            ));
        }

        Ok(Self::from_rows(rows))
    }

    pub fn max_index(&self) -> Option<u32> {
        self.rows.keys().next_back().copied()
    }

    pub fn kernel_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows_for(&self, kernel_index: u32) -> &[MetricRow] {
        self.rows
            .get(&kernel_index)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn matching(&self, kernel_index: u32, metric: &str) -> Vec<&MetricRow> {
        self.rows_for(kernel_index)
            .iter()
            .filter(|row| row.name == metric)
            .collect()
    }
}

/// Profiler values may carry thousands separators.
pub fn parse_metric_value(raw: &str) -> Option<f64> {
    let cleaned: String = raw.chars().filter(|c| *c != ',').collect();
    cleaned.trim().parse().ok()
}

/// Split one CSV record, honouring double-quoted fields and `""` escapes.
pub fn split_record(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                current.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => fields.push(std::mem::take(&mut current)),
            '\r' if !in_quotes => {}
            _ => current.push(c),
        }
    }
    fields.push(current);
    fields
}
