//! Renewable generation module backed by an availability time series.

use crate::error::MicrogridError;
use crate::forecast::Lookahead;
use crate::modules::types::{Action, Bounds, StepOutput};
use crate::timeseries::TimeSeries;

/// Renewable generation (PV, wind) driven by an availability series.
///
/// Curtailable by default: the action chooses how much of the step's
/// availability is actually used, and the remainder is curtailed at zero
/// cost. With curtailment disabled the module is exogenous and always
/// produces the full availability.
#[derive(Debug, Clone)]
pub struct RenewableModule {
    time_series: TimeSeries,
    pub curtailable: bool,
    current_step: usize,
}

impl RenewableModule {
    pub fn new(time_series: TimeSeries) -> Self {
        Self {
            time_series,
            curtailable: true,
            current_step: 0,
        }
    }

    /// Disables curtailment, making the module purely exogenous.
    pub fn without_curtailment(mut self) -> Self {
        self.curtailable = false;
        self
    }

    pub fn series_len(&self) -> usize {
        self.time_series.len()
    }

    pub fn current_step(&self) -> usize {
        self.current_step
    }

    /// Availability at the module's current step (zero past the data).
    pub fn availability(&self) -> f64 {
        self.time_series.get(self.current_step).unwrap_or(0.0)
    }

    pub fn bounds(&self) -> Bounds {
        Bounds::new(0.0, self.availability())
    }

    pub fn forecast(&self, horizon: usize) -> Vec<f64> {
        Lookahead::window(&self.time_series, self.current_step, horizon)
    }

    pub fn step(&mut self, action: Action) -> Result<StepOutput, MicrogridError> {
        let available = self.availability();
        let used = if self.curtailable {
            let requested = action.as_power("renewable")?;
            let bounds = self.bounds();
            if !bounds.contains(requested) {
                return Err(MicrogridError::InfeasibleAction {
                    module: "renewable".to_string(),
                    reason: format!(
                        "usage {requested:.6} outside [0, {available:.6}] availability"
                    ),
                });
            }
            bounds.clip(requested)
        } else {
            action.expect_none("renewable")?;
            available
        };
        self.current_step += 1;

        Ok(StepOutput {
            fields: vec![
                ("renewable_used", used),
                ("curtailment", (available - used).max(0.0)),
            ],
            provided: used,
            absorbed: 0.0,
            cost: 0.0,
        })
    }
}
