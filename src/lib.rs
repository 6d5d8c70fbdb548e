//! Microgrid simulator with receding-horizon MPC dispatch.

pub mod config;
pub mod error;
pub mod forecast;
/// Module catalog: battery, genset, renewable, load, grid, and slack.
pub mod modules;
/// Receding-horizon MPC: problem builder, solver adapter, controller.
pub mod mpc;
/// Microgrid assembly, stepping, and run logging.
pub mod sim;
pub mod timeseries;

pub use error::MicrogridError;
