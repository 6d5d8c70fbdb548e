//! Microgrid assembly, synchronized stepping, and run logging.

/// Run log and aggregate dispatch summary.
pub mod log;
pub mod microgrid;

pub use log::{DispatchSummary, RunLog};
pub use microgrid::{ActionMap, Microgrid, MicrogridBuilder, NamedModule, StepRecord};
