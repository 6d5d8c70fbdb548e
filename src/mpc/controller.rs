//! Receding-horizon MPC controller: build, solve, apply, log, repeat.

use tracing::debug;

use crate::error::MicrogridError;
use crate::mpc::problem::{MpcOptions, build_horizon_problem};
use crate::mpc::solver::solve_horizon;
use crate::sim::log::RunLog;
use crate::sim::microgrid::Microgrid;

/// Model Predictive Control over a microgrid.
///
/// Each control step assembles the horizon problem from the live microgrid
/// state, solves it, applies only the first-offset decisions, and records
/// the realized outputs. The solve is a blocking call; callers needing
/// bounded latency must impose an external timeout and treat it as an
/// infeasible step.
///
/// The controller exclusively owns its microgrid: state persists across
/// `run` calls, so a second call continues from wherever the previous one
/// stopped.
pub struct ModelPredictiveControl {
    microgrid: Microgrid,
    options: MpcOptions,
}

impl ModelPredictiveControl {
    /// A controller with the default single-step horizon.
    pub fn new(microgrid: Microgrid) -> Self {
        Self::with_options(microgrid, MpcOptions::default())
    }

    /// # Panics
    ///
    /// Panics on a zero horizon or a discount outside `(0, 1]`.
    pub fn with_options(microgrid: Microgrid, options: MpcOptions) -> Self {
        assert!(options.horizon >= 1, "horizon must be >= 1");
        assert!(
            options.discount > 0.0 && options.discount <= 1.0,
            "discount must be in (0, 1]"
        );
        Self { microgrid, options }
    }

    pub fn horizon(&self) -> usize {
        self.options.horizon
    }

    pub fn microgrid(&self) -> &Microgrid {
        &self.microgrid
    }

    pub fn into_microgrid(self) -> Microgrid {
        self.microgrid
    }

    /// Runs up to `max_steps` control steps and returns the accumulated log.
    ///
    /// Running out of forecast data ends the loop cleanly with a shorter
    /// (possibly empty) log; feasibility failures propagate as errors.
    pub fn run(&mut self, max_steps: usize) -> Result<RunLog, MicrogridError> {
        let mut log = RunLog::new();
        for _ in 0..max_steps {
            if self.microgrid.is_exhausted() {
                break;
            }
            let step = self.microgrid.current_step();
            let problem = build_horizon_problem(&self.microgrid, &self.options)?;
            let decisions = solve_horizon(problem, step)?;
            let record = self.microgrid.step(&decisions.actions)?;
            debug!(
                step,
                objective = decisions.objective_value,
                cost = record.total_cost,
                residual = record.residual,
                "applied first-offset dispatch"
            );
            log.push_record(&record);
        }
        Ok(log)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::{GridModule, LoadModule, Module, RenewableModule};
    use crate::sim::microgrid::NamedModule;
    use crate::timeseries::TimeSeries;

    fn pv_load_grid(len: usize) -> Microgrid {
        Microgrid::new(
            vec![
                NamedModule::auto(Module::Renewable(RenewableModule::new(
                    TimeSeries::constant(len, 50.0),
                ))),
                NamedModule::auto(Module::Load(LoadModule::new(TimeSeries::constant(
                    len, 60.0,
                )))),
                NamedModule::auto(Module::Grid(GridModule::new(
                    100.0,
                    0.0,
                    TimeSeries::constant(len, 1.0),
                    TimeSeries::constant(len, 1.0),
                ))),
            ],
            true,
        )
        .unwrap()
    }

    #[test]
    fn default_horizon_is_one() {
        let mpc = ModelPredictiveControl::new(pv_load_grid(10));
        assert_eq!(mpc.horizon(), 1);
    }

    #[test]
    #[should_panic]
    fn zero_horizon_panics() {
        ModelPredictiveControl::with_options(
            pv_load_grid(10),
            MpcOptions {
                horizon: 0,
                ..MpcOptions::default()
            },
        );
    }

    #[test]
    fn run_stops_at_data_exhaustion() {
        let mut mpc = ModelPredictiveControl::new(pv_load_grid(3));
        let log = mpc.run(10).unwrap();
        assert_eq!(log.len(), 3);
        assert!(mpc.microgrid().is_exhausted());
    }

    #[test]
    fn run_after_exhaustion_returns_empty_log() {
        let mut mpc = ModelPredictiveControl::new(pv_load_grid(3));
        mpc.run(10).unwrap();
        let log = mpc.run(10).unwrap();
        assert!(log.is_empty());
    }

    #[test]
    fn run_respects_max_steps() {
        let mut mpc = ModelPredictiveControl::new(pv_load_grid(10));
        let log = mpc.run(4).unwrap();
        assert_eq!(log.len(), 4);
        assert_eq!(mpc.microgrid().current_step(), 4);
    }
}
