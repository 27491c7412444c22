//! Join profiler metric rows onto kernel records by launch index.

use crate::table::MetricTable;
use kernelscope_core::{
    KernelScopeError, LookupWarning, MetricValue, OperatorKernelPair, Result, Verbosity,
};
use tracing::{debug, info, warn};

/// Metrics attached by default: speed-of-light throughput, launch statistics and occupancy.
pub const DEFAULT_METRICS: &[&str] = &[
    "Compute (SM) Throughput",
    "Memory Throughput",
    "SM Active Cycles",
    "Elapsed Cycles",
    "Registers Per Thread",
    "# SMs",
    "Shared Memory Configuration Size",
    "Driver Shared Memory Per Block",
    "Dynamic Shared Memory Per Block",
    "Static Shared Memory Per Block",
    "Block Limit SM",
    "Block Limit Registers",
    "Block Limit Shared Mem",
    "Block Limit Warps",
    "Theoretical Active Warps per SM",
    "Theoretical Occupancy",
    "Achieved Occupancy",
    "Achieved Active Warps Per SM",
];

#[derive(Debug, Clone, Default)]
pub struct IntegrationReport {
    pub processed_kernels: usize,
    pub max_index: Option<u32>,
    pub warnings: Vec<LookupWarning>,
}

#[derive(Debug, Clone)]
pub struct MetricIntegrator {
    metrics: Vec<String>,
    verbosity: Verbosity,
}

impl Default for MetricIntegrator {
    fn default() -> Self {
        Self::new(Verbosity::default())
    }
}

impl MetricIntegrator {
    pub fn new(verbosity: Verbosity) -> Self {
        Self {
            metrics: DEFAULT_METRICS.iter().map(|m| m.to_string()).collect(),
            verbosity,
        }
    }

    pub fn with_metrics<I, S>(mut self, metrics: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.metrics = metrics.into_iter().map(Into::into).collect();
        self
    }

    pub fn metrics(&self) -> &[String] {
        &self.metrics
    }

    /// Attach the requested metrics to every indexed kernel.
    ///
    /// Missing or duplicated rows only produce warnings. The trace and the
    /// table must still describe the same run: the highest launch index seen
    /// in the trace has to equal the highest index in the table.
    pub fn integrate(
        &self,
        pairs: &mut [OperatorKernelPair],
        table: &MetricTable,
    ) -> Result<IntegrationReport> {
        let mut report = IntegrationReport::default();

        for pair in pairs.iter_mut() {
            for kernel in pair.kernels.iter_mut() {
                let Some(kernel_index) = kernel.index else {
                    continue;
                };
                report.processed_kernels += 1;
                report.max_index = report.max_index.max(Some(kernel_index));

                for metric in &self.metrics {
                    let rows = table.matching(kernel_index, metric);
                    let warning = match rows.as_slice() {
                        [] => LookupWarning::MissingMetric {
                            kernel_index,
                            metric: metric.clone(),
                        },
                        [row] => match row.numeric_value() {
                            Some(value) => {
                                kernel.metrics.insert(
                                    metric.clone(),
                                    MetricValue {
                                        value,
                                        unit: row.unit.clone(),
                                    },
                                );
                                continue;
                            }
                            None => LookupWarning::UnparsableMetricValue {
                                kernel_index,
                                metric: metric.clone(),
                                value: row.value.clone(),
                            },
                        },
                        many => LookupWarning::AmbiguousMetric {
                            kernel_index,
                            metric: metric.clone(),
                            rows: many.len(),
                        },
                    };
                    if self.verbosity.warnings() {
                        warn!(%warning, "metric not attached");
                    }
                    report.warnings.push(warning);
                }
            }
        }

        if self.verbosity.info() {
            info!(
                kernels = report.processed_kernels,
                warnings = report.warnings.len(),
                "integrated profiler metrics"
            );
        }

        let metric_max_index = table.max_index();
        if report.max_index != metric_max_index {
            return Err(KernelScopeError::Consistency {
                trace_max_index: report.max_index,
                metric_max_index,
            });
        }

        if self.verbosity.debug() {
            debug!(max_index = ?report.max_index, "kernel index spaces agree");
        }
        Ok(report)
    }
}
