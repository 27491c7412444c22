//! CLI wiring for kernelscope.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use kernelscope_core::{OperatorKernelPair, Verbosity};
use kernelscope_evaluator::{
    accuracy_matrix, EvaluationOptions, JsonReport, NamedLibrary, NamedTarget, ParameterAxis,
    ParameterEvaluator, SequenceEvaluator,
};
use kernelscope_library::{LibraryMetadata, RuleLibrary, RuleLibraryBuilder, LIBRARY_SCHEMA_VERSION};
use kernelscope_matcher::{MatcherConfig, ScoreWeights, ShapeMatcher};
use kernelscope_metrics::{MetricIntegrator, MetricTable};
use kernelscope_trace::{ambiguous_op_types, load_pairs, relation_stats};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "kernelscope",
    about = "Predict GPU kernel launches from a rule library and score the predictions"
)]
pub struct Cli {
    #[arg(long, value_enum, default_value = "warning", global = true)]
    pub verbosity: VerbosityArg,

    /// Weight of a differing dimension's ratio, in (0, 1].
    #[arg(long, default_value_t = 1.0, global = true)]
    pub weight_diff: f64,

    /// Weight of the total element-count ratio.
    #[arg(long, default_value_t = 2.0, global = true)]
    pub weight_size: f64,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum VerbosityArg {
    Silent,
    Error,
    Warning,
    Info,
    Debug,
}

impl From<VerbosityArg> for Verbosity {
    fn from(value: VerbosityArg) -> Verbosity {
        match value {
            VerbosityArg::Silent => Verbosity::Silent,
            VerbosityArg::Error => Verbosity::Error,
            VerbosityArg::Warning => Verbosity::Warning,
            VerbosityArg::Info => Verbosity::Info,
            VerbosityArg::Debug => Verbosity::Debug,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum AxesArg {
    Launch,
    Execution,
    All,
}

impl AxesArg {
    fn axes(self) -> Vec<ParameterAxis> {
        match self {
            AxesArg::Launch => ParameterAxis::launch(),
            AxesArg::Execution => ParameterAxis::execution(),
            AxesArg::All => ParameterAxis::all(),
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Build (or extend) a rule library from runtime traces.
    BuildLibrary {
        #[arg(long = "trace", required = true, num_args = 1..)]
        traces: Vec<PathBuf>,
        /// Profiler metric exports, one per trace and in the same order.
        #[arg(long = "metrics", num_args = 1..)]
        metrics: Vec<PathBuf>,
        #[arg(long, default_value_t = 1)]
        batch_size: u32,
        #[arg(long, default_value = "unknown")]
        gpu: String,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long, default_value = LIBRARY_SCHEMA_VERSION)]
        version: String,
        /// Existing library to extend.
        #[arg(long)]
        append: Option<PathBuf>,
        #[arg(long)]
        output: PathBuf,
    },
    /// Score predicted launch parameters and metrics against a profiled capture.
    EvaluateParams {
        #[arg(long)]
        trace: PathBuf,
        #[arg(long)]
        metrics: PathBuf,
        #[arg(long)]
        library: PathBuf,
        #[arg(long, value_enum, default_value = "launch")]
        axes: AxesArg,
        /// Only evaluate these operator types.
        #[arg(long = "op")]
        ops: Vec<String>,
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Count exact and sequence-level kernel matches for a capture.
    EvaluateSequence {
        #[arg(long)]
        trace: PathBuf,
        #[arg(long)]
        library: PathBuf,
        #[arg(long = "op")]
        ops: Vec<String>,
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Sequence accuracy of every library against every capture.
    Matrix {
        #[arg(long = "library", required = true, num_args = 1..)]
        libraries: Vec<PathBuf>,
        #[arg(long = "trace", required = true, num_args = 1..)]
        traces: Vec<PathBuf>,
        #[arg(long = "op")]
        ops: Vec<String>,
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// List the operator → kernel-sequence relations of a trace.
    Relations {
        #[arg(long)]
        trace: PathBuf,
    },
}

pub fn run_cli(cli: Cli) -> Result<()> {
    let Cli {
        verbosity,
        weight_diff,
        weight_size,
        command,
    } = cli;
    let verbosity = Verbosity::from(verbosity);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::default().add_directive(verbosity.level_filter().into()));
    if let Err(err) = tracing_subscriber::fmt::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
    {
        debug!(error = %err, "keeping the installed tracing subscriber");
    }

    let matcher_config = MatcherConfig {
        weights: ScoreWeights {
            difference: weight_diff,
            total_size: weight_size,
        },
        verbosity,
    };
    matcher_config.validate().map_err(anyhow::Error::msg)?;
    let matcher = ShapeMatcher::with_config(matcher_config);

    match command {
        Command::BuildLibrary {
            traces,
            metrics,
            batch_size,
            gpu,
            description,
            version,
            append,
            output,
        } => {
            if !metrics.is_empty() && metrics.len() != traces.len() {
                bail!(
                    "got {} metric files for {} traces; pass one per trace or none",
                    metrics.len(),
                    traces.len()
                );
            }

            let mut builder = match &append {
                Some(path) => RuleLibraryBuilder::from_library(RuleLibrary::load(path)?),
                None => RuleLibraryBuilder::new(),
            }
            .with_integrator(MetricIntegrator::new(verbosity));

            for (idx, trace) in traces.iter().enumerate() {
                let table = match metrics.get(idx) {
                    Some(path) => Some(MetricTable::read(path)?),
                    None => None,
                };
                builder
                    .add_trace(trace, batch_size, table.as_ref())
                    .with_context(|| format!("merging {}", trace.display()))?;
            }

            let metadata = LibraryMetadata::new(gpu, description).with_version(version);
            let library = builder.finish(metadata);
            library.save(&output)?;
            println!(
                "library={} op_types={} entries={}",
                output.display(),
                library.op_types().count(),
                library.entry_count()
            );
        }
        Command::EvaluateParams {
            trace,
            metrics,
            library,
            axes,
            ops,
            output,
        } => {
            let pairs = load_capture(&trace, Some(&metrics), verbosity)?;
            let library = RuleLibrary::load(&library)?;
            let evaluator = ParameterEvaluator::new(matcher, axes.axes())
                .with_options(evaluation_options(ops, verbosity));
            let report = evaluator.evaluate(&pairs, &library)?;

            println!("operators={} warnings={}", report.evaluated, report.warnings.len());
            for (axis, accuracy) in &report.aggregate {
                println!("- {axis}: {accuracy:.4}");
            }
            if let Some(path) = output {
                report.save(&path)?;
                info!(path = %path.display(), "parameter report written");
            }
        }
        Command::EvaluateSequence {
            trace,
            library,
            ops,
            output,
        } => {
            let pairs = load_capture(&trace, None, verbosity)?;
            let library = RuleLibrary::load(&library)?;
            let evaluator =
                SequenceEvaluator::new(matcher).with_options(evaluation_options(ops, verbosity));
            let report = evaluator.evaluate(&pairs, &library);

            println!("exact: {} / {} ({})", report.exact, report.total, rate(report.exact_rate()));
            println!(
                "sequence: {} / {} ({})",
                report.sequence,
                report.total,
                rate(report.sequence_rate())
            );
            if let Some(path) = output {
                report.save(&path)?;
                info!(path = %path.display(), "sequence report written");
            }
        }
        Command::Matrix {
            libraries,
            traces,
            ops,
            output,
        } => {
            let loaded_libraries = unique_labels(&libraries, "library")?
                .into_iter()
                .zip(&libraries)
                .map(|(name, path)| -> Result<_> { Ok((name, RuleLibrary::load(path)?)) })
                .collect::<Result<Vec<_>>>()?;
            let loaded_targets = unique_labels(&traces, "trace")?
                .into_iter()
                .zip(&traces)
                .map(|(name, path)| -> Result<_> { Ok((name, load_capture(path, None, verbosity)?)) })
                .collect::<Result<Vec<_>>>()?;

            let named_libraries: Vec<NamedLibrary<'_>> = loaded_libraries
                .iter()
                .map(|(name, library)| NamedLibrary { name, library })
                .collect();
            let named_targets: Vec<NamedTarget<'_>> = loaded_targets
                .iter()
                .map(|(name, pairs)| NamedTarget { name, pairs })
                .collect();

            let evaluator =
                SequenceEvaluator::new(matcher).with_options(evaluation_options(ops, verbosity));
            let matrix = accuracy_matrix(&evaluator, &named_libraries, &named_targets);
            for cell in &matrix.cells {
                println!(
                    "{} -> {}: exact={} sequence={} total={}",
                    cell.library,
                    cell.target,
                    rate(cell.exact_rate),
                    rate(cell.sequence_rate),
                    cell.total
                );
            }
            if let Some(path) = output {
                matrix.save(&path)?;
                info!(path = %path.display(), "accuracy matrix written");
            }
        }
        Command::Relations { trace } => {
            let pairs = match load_pairs(&trace) {
                Ok(pairs) => pairs,
                Err(err) => {
                    warn!(error = %err, "trace could not be paired");
                    return Ok(());
                }
            };
            let relations = relation_stats(&pairs);
            for (key, stats) in &relations {
                println!(
                    "{} [{}] x{}: {}",
                    key.op_type,
                    key.provider,
                    stats.count,
                    key.kernels.join(" -> ")
                );
            }
            let ambiguous = ambiguous_op_types(&relations);
            if !ambiguous.is_empty() {
                println!("multiple kernel sequences: {}", ambiguous.join(", "));
            }
        }
    }

    Ok(())
}

fn load_capture(trace: &Path, metrics: Option<&Path>, verbosity: Verbosity) -> Result<Vec<OperatorKernelPair>> {
    let mut pairs = load_pairs(trace)?;
    if let Some(path) = metrics {
        let table = MetricTable::read(path)?;
        MetricIntegrator::new(verbosity).integrate(&mut pairs, &table)?;
    }
    Ok(pairs)
}

fn evaluation_options(ops: Vec<String>, verbosity: Verbosity) -> EvaluationOptions {
    let options = EvaluationOptions::default().with_verbosity(verbosity);
    if ops.is_empty() {
        options
    } else {
        options.with_op_filter(ops)
    }
}

fn stem(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Matrix cells are addressed by file stem, so stems must not repeat.
fn unique_labels(paths: &[PathBuf], kind: &str) -> Result<Vec<String>> {
    let mut seen = HashSet::new();
    paths
        .iter()
        .map(|path| -> Result<String> {
            let label = stem(path);
            if !seen.insert(label.clone()) {
                bail!("{kind} name `{label}` is used by more than one input ({})", path.display());
            }
            Ok(label)
        })
        .collect()
}

fn rate(value: Option<f64>) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| format!("{:.2}%", v * 100.0))
}
