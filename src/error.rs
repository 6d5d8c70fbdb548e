//! Error taxonomy shared across microgrid construction, stepping, and MPC.

use thiserror::Error;

/// All failures surfaced by this crate.
///
/// Configuration problems are detected eagerly at construction time; the
/// remaining variants arise while stepping or solving. Nothing is retried
/// automatically — a failure at a given step recurs deterministically until
/// the caller changes the microgrid (e.g. enables a slack module or widens
/// bounds).
#[derive(Debug, Error)]
pub enum MicrogridError {
    /// Bad construction arguments: unknown module names, conflicting
    /// remove/retain requests, duplicate keys, missing actions.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A requested action lies outside the module's feasible range beyond
    /// numerical tolerance. Actions are never silently clipped.
    #[error("infeasible action for module {module}: {reason}")]
    InfeasibleAction { module: String, reason: String },

    /// Production and consumption did not balance and no slack module was
    /// available to absorb the residual.
    #[error("energy balance violated at step {step}: residual {residual:.6}")]
    Balance { step: usize, residual: f64 },

    /// The horizon optimization problem has no feasible point.
    #[error("horizon problem infeasible at step {step}: {reason}")]
    InfeasibleProblem { step: usize, reason: String },

    /// The shortest exogenous time series has been consumed.
    #[error("episode exhausted after {steps} steps")]
    EpisodeExhausted { steps: usize },
}
