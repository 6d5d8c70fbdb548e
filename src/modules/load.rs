//! Fixed load module backed by a demand time series.

use crate::error::MicrogridError;
use crate::forecast::Lookahead;
use crate::modules::types::{Action, StepOutput};
use crate::timeseries::TimeSeries;

/// Exogenous electrical demand driven purely by a time series.
///
/// The demand is always drawn in full; any shortfall on the supply side is
/// the slack module's business, so `load_met` reports the step's demand.
#[derive(Debug, Clone)]
pub struct LoadModule {
    time_series: TimeSeries,
    current_step: usize,
}

impl LoadModule {
    pub fn new(time_series: TimeSeries) -> Self {
        Self {
            time_series,
            current_step: 0,
        }
    }

    pub fn series_len(&self) -> usize {
        self.time_series.len()
    }

    pub fn current_step(&self) -> usize {
        self.current_step
    }

    /// Demand at the module's current step.
    pub fn demand(&self) -> Option<f64> {
        self.time_series.get(self.current_step)
    }

    pub fn forecast(&self, horizon: usize) -> Vec<f64> {
        Lookahead::window(&self.time_series, self.current_step, horizon)
    }

    pub fn step(&mut self, action: Action) -> Result<StepOutput, MicrogridError> {
        action.expect_none("load")?;
        let demand = self.demand().ok_or(MicrogridError::EpisodeExhausted {
            steps: self.current_step,
        })?;
        self.current_step += 1;

        Ok(StepOutput {
            fields: vec![("load_met", demand)],
            provided: 0.0,
            absorbed: demand,
            cost: 0.0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn consumes_the_step_demand() {
        let mut l = LoadModule::new(TimeSeries::constant(3, 60.0));
        let out = l.step(Action::None).unwrap();
        assert_eq!(out.absorbed, 60.0);
        assert_eq!(out.fields, vec![("load_met", 60.0)]);
        assert_eq!(l.current_step(), 1);
    }

    #[test]
    fn rejects_actions() {
        let mut l = LoadModule::new(TimeSeries::constant(3, 60.0));
        assert!(l.step(Action::Power(1.0)).is_err());
    }

    #[test]
    fn exhausts_after_series_end() {
        let mut l = LoadModule::new(TimeSeries::constant(1, 60.0));
        l.step(Action::None).unwrap();
        let err = l.step(Action::None).unwrap_err();
        assert!(matches!(err, MicrogridError::EpisodeExhausted { steps: 1 }));
    }
}
