//! Hardware profiler metrics joined onto traced kernel launches.

pub mod integrator;
pub mod table;

pub use integrator::*;
pub use table::*;
