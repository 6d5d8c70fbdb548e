//! Slack module absorbing residual imbalance at a penalty cost.

use crate::modules::types::StepOutput;

/// Default penalty per unit of unmet demand.
pub const DEFAULT_LOSS_LOAD_COST: f64 = 10.0;
/// Default penalty per unit of excess supply.
pub const DEFAULT_OVERGENERATION_COST: f64 = 10.0;

/// The automatically injected slack module.
///
/// Never user-actuated: the microgrid routes the post-step residual here.
/// A supply shortfall appears as `loss_load` (the slack "produces" the gap
/// at a penalty), excess supply as `overgeneration`. Its presence keeps the
/// balance constraint feasible by design.
#[derive(Debug, Clone)]
pub struct UnbalancedModule {
    pub loss_load_cost: f64,
    pub overgeneration_cost: f64,
    current_step: usize,
}

impl Default for UnbalancedModule {
    fn default() -> Self {
        Self::new(DEFAULT_LOSS_LOAD_COST, DEFAULT_OVERGENERATION_COST)
    }
}

impl UnbalancedModule {
    /// # Panics
    ///
    /// Panics on negative penalties.
    pub fn new(loss_load_cost: f64, overgeneration_cost: f64) -> Self {
        assert!(loss_load_cost >= 0.0 && overgeneration_cost >= 0.0);

        Self {
            loss_load_cost,
            overgeneration_cost,
            current_step: 0,
        }
    }

    pub fn current_step(&self) -> usize {
        self.current_step
    }

    /// Absorbs `residual = provided - absorbed` of the other modules and
    /// advances this module's step counter.
    pub fn absorb(&mut self, residual: f64) -> StepOutput {
        let loss_load = (-residual).max(0.0);
        let overgeneration = residual.max(0.0);
        self.current_step += 1;

        StepOutput {
            fields: vec![
                ("loss_load", loss_load),
                ("overgeneration", overgeneration),
            ],
            provided: loss_load,
            absorbed: overgeneration,
            cost: self.loss_load_cost * loss_load + self.overgeneration_cost * overgeneration,
        }
    }
}
