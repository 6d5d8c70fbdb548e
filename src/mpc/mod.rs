//! Receding-horizon MPC: horizon problem construction, LP solving, and the
//! outer control loop.

pub mod controller;
pub mod problem;
/// LP backend invocation and offset-0 extraction.
pub mod solver;

pub use controller::ModelPredictiveControl;
pub use problem::{HorizonProblem, MpcOptions, TieBreak, build_horizon_problem};
pub use solver::{FirstStepDecisions, solve_horizon};
