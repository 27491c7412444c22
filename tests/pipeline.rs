use anyhow::Result;
use approx::assert_abs_diff_eq;
use kernelscope::core::{KernelScopeError, Verbosity};
use kernelscope::evaluator::{
    EvaluationOptions, JsonReport, ParameterAxis, ParameterEvaluator, SequenceEvaluator, SequenceReport,
};
use kernelscope::library::{LibraryMetadata, RuleLibrary, RuleLibraryBuilder};
use kernelscope::matcher::{MatcherConfig, ShapeMatcher};
use kernelscope::metrics::{MetricIntegrator, MetricTable};
use kernelscope::trace::load_pairs;
use std::fs;
use std::path::{Path, PathBuf};

const TRACE: &str = r#"{"traceEvents": [
    {"cat": "Session", "name": "session_initialization", "dur": 5000, "args": {}},
    {"cat": "Node", "name": "/model.0/conv/Conv", "dur": 40, "args": {
        "op_name": "Conv", "provider": "CUDAExecutionProvider",
        "parameter_size": "1792", "activation_size": "49152", "output_size": "65536",
        "input_type_shape": [{"float": [1, 3, 64, 64]}, {"float": [16, 3, 3, 3]}, {"float": [16]}],
        "output_type_shape": [{"float": [1, 16, 32, 32]}]}},
    {"cat": "Kernel", "name": "implicit_gemm", "dur": 21, "args": {
        "grid_x": 32, "grid_y": 1, "grid_z": 1, "block_x": 128, "block_y": 1, "block_z": 1}},
    {"cat": "Node", "name": "/model.0/Memcpy", "dur": 3, "args": {
        "op_name": "MemcpyToHost", "provider": "CUDAExecutionProvider",
        "input_type_shape": [{"float": [1, 16, 32, 32]}], "output_type_shape": [{"float": [1, 16, 32, 32]}]}},
    {"cat": "Kernel", "name": "Memcpy DtoH", "dur": 2, "args": {
        "grid_x": 0, "grid_y": 0, "grid_z": 0, "block_x": 0, "block_y": 0, "block_z": 0}},
    {"cat": "Node", "name": "/model.0/act/Sigmoid", "dur": 6, "args": {
        "op_name": "Sigmoid", "provider": "CUDAExecutionProvider",
        "input_type_shape": [{"float": [1, 16, 32, 32]}], "output_type_shape": [{"float": [1, 16, 32, 32]}]}},
    {"cat": "Kernel", "name": "sigmoid_kernel", "dur": 4, "args": {
        "grid_x": "64", "grid_y": "1", "grid_z": "1", "block_x": "256", "block_y": "1", "block_z": "1"}},
    {"cat": "Node", "name": "/model.1/Reshape", "dur": 1, "args": {
        "op_name": "Reshape", "provider": "CUDAExecutionProvider",
        "input_type_shape": [{"float": [1, 16, 32, 32]}, {"int64": [3]}], "output_type_shape": [{"float": [1, 16, 1024]}]}},
    {"cat": "Node", "name": "/model.2/Concat", "dur": 5, "args": {
        "op_name": "Concat", "provider": "CUDAExecutionProvider",
        "input_type_shape": [{"float": [1, 16, 32, 32]}, {"float": [1, 16, 32, 32]}],
        "output_type_shape": [{"float": [1, 32, 32, 32]}]}},
    {"cat": "Kernel", "name": "concat_kernel", "dur": 3, "args": {
        "grid_x": 128, "grid_y": 1, "grid_z": 1, "block_x": 256, "block_y": 1, "block_z": 1}}
]}"#;

fn metrics_csv(max_id: u32) -> String {
    let mut csv = String::from(
        "==PROF== Connected to process 1201\n\
         \"ID\",\"Kernel Name\",\"Section Name\",\"Metric Name\",\"Metric Unit\",\"Metric Value\"\n",
    );
    for id in 0..=max_id {
        let rows = [
            ("Launch Statistics", "Registers Per Thread", "register/thread", "32"),
            ("GPU Speed Of Light Throughput", "Compute (SM) Throughput", "%", "41.5"),
            ("GPU Speed Of Light Throughput", "Memory Throughput", "%", "63.25"),
            ("GPU Speed Of Light Throughput", "SM Active Cycles", "cycle", "1,536.00"),
        ];
        for (section, name, unit, value) in rows {
            csv.push_str(&format!("\"{id}\",\"k{id}\",\"{section}\",\"{name}\",\"{unit}\",\"{value}\"\n"));
        }
    }
    csv
}

struct Capture {
    _dir: tempfile::TempDir,
    trace: PathBuf,
    metrics: PathBuf,
}

fn capture(max_metric_id: u32) -> Result<Capture> {
    let dir = tempfile::tempdir()?;
    let trace = dir.path().join("yolov8n-orto0.json");
    let metrics = dir.path().join("yolov8n-orto0-ncu.csv");
    fs::write(&trace, TRACE)?;
    fs::write(&metrics, metrics_csv(max_metric_id))?;
    Ok(Capture {
        _dir: dir,
        trace,
        metrics,
    })
}

fn silent_matcher() -> ShapeMatcher {
    ShapeMatcher::with_config(MatcherConfig {
        verbosity: Verbosity::Silent,
        ..MatcherConfig::default()
    })
}

fn silent_options() -> EvaluationOptions {
    EvaluationOptions::default().with_verbosity(Verbosity::Silent)
}

fn build_library(capture: &Capture, out: &Path) -> Result<RuleLibrary> {
    let table = MetricTable::read(&capture.metrics)?;
    let mut builder = RuleLibraryBuilder::new().with_integrator(MetricIntegrator::new(Verbosity::Silent));
    builder.add_trace(&capture.trace, 1, Some(&table))?;
    builder
        .finish(LibraryMetadata::new("Tesla V100-SXM2-32GB", "pipeline test"))
        .save(out)?;
    Ok(RuleLibrary::load(out)?)
}

#[test]
fn library_round_trip_predicts_its_own_capture() -> Result<()> {
    let capture = capture(2)?;
    let library = build_library(&capture, &capture.trace.with_file_name("library.json"))?;
    assert_eq!(library.entry_count(), 5);
    assert_eq!(library.entries("Conv").map(|e| e[0].model()), Some("yolov8n-orto0"));

    let mut pairs = load_pairs(&capture.trace)?;
    MetricIntegrator::new(Verbosity::Silent).integrate(&mut pairs, &MetricTable::read(&capture.metrics)?)?;

    let report = ParameterEvaluator::new(silent_matcher(), ParameterAxis::all())
        .with_options(silent_options())
        .evaluate(&pairs, &library)?;
    assert_eq!(report.evaluated, 4);
    for axis in ParameterAxis::all() {
        assert_abs_diff_eq!(report.accuracy(axis).unwrap(), 1.0);
    }
    assert!(report.warnings.is_empty());

    let sequence = SequenceEvaluator::new(silent_matcher())
        .with_options(silent_options())
        .evaluate(&pairs, &library);
    assert_eq!((sequence.exact, sequence.sequence, sequence.total), (4, 4, 4));
    Ok(())
}

#[test]
fn conv_filter_and_report_file() -> Result<()> {
    let capture = capture(2)?;
    let library = build_library(&capture, &capture.trace.with_file_name("library.json"))?;
    let pairs = load_pairs(&capture.trace)?;

    let report = SequenceEvaluator::new(silent_matcher())
        .with_options(silent_options().with_op_filter(["Conv"]))
        .evaluate(&pairs, &library);
    assert_eq!(report.total, 1);
    assert_eq!(report.sequence_rate(), Some(1.0));

    let path = capture.trace.with_file_name("reports").join("conv.json");
    report.save(&path)?;
    assert_eq!(SequenceReport::load(&path)?, report);
    Ok(())
}

#[test]
fn metric_table_from_another_run_is_rejected() -> Result<()> {
    let capture = capture(5)?;
    let mut builder = RuleLibraryBuilder::new().with_integrator(MetricIntegrator::new(Verbosity::Silent));
    let table = MetricTable::read(&capture.metrics)?;

    let err = builder.add_trace(&capture.trace, 1, Some(&table)).unwrap_err();
    assert!(matches!(
        err,
        KernelScopeError::Consistency {
            trace_max_index: Some(2),
            metric_max_index: Some(5),
        }
    ));
    assert_eq!(builder.entry_count(), 0);
    Ok(())
}

#[test]
fn pairing_is_idempotent() -> Result<()> {
    let capture = capture(2)?;
    let first = load_pairs(&capture.trace)?;
    let second = load_pairs(&capture.trace)?;
    assert_eq!(first, second);

    let indices: Vec<_> = first
        .iter()
        .flat_map(|pair| pair.kernels.iter().map(|k| k.index))
        .collect();
    assert_eq!(indices, vec![Some(0), None, Some(1), Some(2)]);
    Ok(())
}
