//! Runtime profiler traces: event parsing and operator/kernel pairing.
//!
//! A trace is the ordered event log written by the inference runtime's
//! profiler. Operator-boundary events (`"cat": "Node"`) open a new operator;
//! every kernel-launch event (`"cat": "Kernel"`) that follows belongs to that
//! operator until the next boundary. Pairing assumes the session ran with
//! sequential execution, which is what the profiler produces for serial
//! inference.

pub mod event;
pub mod pairing;
pub mod relations;

pub use event::*;
pub use pairing::*;
pub use relations::*;
