//! Dispatchable generator module with an off-or-running production band.

use crate::error::MicrogridError;
use crate::modules::types::{Action, Bounds, StepOutput};

/// A fuel generator that is either off (zero production) or running within
/// `[running_min_production, running_max_production]`.
///
/// Production of zero is always feasible. Nonzero production below the
/// running minimum is an infeasible action, not a clip. Cost is
/// `genset_cost * production`, plus `start_up_cost` on an off-to-on
/// transition when configured.
#[derive(Debug, Clone)]
pub struct GensetModule {
    pub running_min_production: f64,
    pub running_max_production: f64,
    /// Cost per unit of energy produced.
    pub genset_cost: f64,
    /// One-off cost charged when the genset turns on.
    pub start_up_cost: f64,
    on: bool,
    current_step: usize,
}

impl GensetModule {
    /// # Panics
    ///
    /// Panics on a negative or inverted production band or negative costs.
    pub fn new(running_min_production: f64, running_max_production: f64, genset_cost: f64) -> Self {
        assert!(running_min_production >= 0.0);
        assert!(running_max_production >= running_min_production);
        assert!(genset_cost >= 0.0);

        Self {
            running_min_production,
            running_max_production,
            genset_cost,
            start_up_cost: 0.0,
            on: false,
            current_step: 0,
        }
    }

    /// Adds a one-off cost for off-to-on transitions.
    pub fn with_start_up_cost(mut self, start_up_cost: f64) -> Self {
        assert!(start_up_cost >= 0.0);
        self.start_up_cost = start_up_cost;
        self
    }

    /// Whether the genset produced anything on its last step.
    pub fn is_on(&self) -> bool {
        self.on
    }

    pub fn current_step(&self) -> usize {
        self.current_step
    }

    /// Outer feasible envelope. The hole below the running minimum is
    /// enforced in [`GensetModule::step`]; bounds only report the hull.
    pub fn bounds(&self) -> Bounds {
        Bounds::new(0.0, self.running_max_production)
    }

    /// Applies a production action: zero, or within the running band.
    pub fn step(&mut self, action: Action) -> Result<StepOutput, MicrogridError> {
        let requested = action.as_power("genset")?;
        let tol = Bounds::tolerance(requested);

        let production = if requested.abs() <= tol {
            0.0
        } else if requested < 0.0 {
            return Err(MicrogridError::InfeasibleAction {
                module: "genset".to_string(),
                reason: format!("negative production {requested:.6}"),
            });
        } else if requested < self.running_min_production - tol {
            return Err(MicrogridError::InfeasibleAction {
                module: "genset".to_string(),
                reason: format!(
                    "production {requested:.6} below running minimum {:.6}",
                    self.running_min_production
                ),
            });
        } else if requested > self.running_max_production + tol {
            return Err(MicrogridError::InfeasibleAction {
                module: "genset".to_string(),
                reason: format!(
                    "production {requested:.6} above running maximum {:.6}",
                    self.running_max_production
                ),
            });
        } else {
            requested.clamp(self.running_min_production, self.running_max_production)
        };

        let started = !self.on && production > 0.0;
        self.on = production > 0.0;
        self.current_step += 1;

        Ok(StepOutput {
            fields: vec![("genset_production", production)],
            provided: production,
            absorbed: 0.0,
            cost: self.genset_cost * production
                + if started { self.start_up_cost } else { 0.0 },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn genset() -> GensetModule {
        GensetModule::new(10.0, 50.0, 0.5)
    }

    #[test]
    fn zero_production_is_always_feasible() {
        let mut g = genset();
        let out = g.step(Action::Power(0.0)).unwrap();
        assert_eq!(out.provided, 0.0);
        assert_eq!(out.cost, 0.0);
        assert!(!g.is_on());
    }

    #[test]
    fn production_within_band_is_costed() {
        let mut g = genset();
        let out = g.step(Action::Power(20.0)).unwrap();
        assert_eq!(out.provided, 20.0);
        assert!((out.cost - 10.0).abs() < 1e-12);
        assert!(g.is_on());
    }

    #[test]
    fn production_below_running_min_is_infeasible() {
        let mut g = genset();
        let err = g.step(Action::Power(5.0)).unwrap_err();
        assert!(matches!(err, MicrogridError::InfeasibleAction { .. }));
    }

    #[test]
    fn production_above_running_max_is_infeasible() {
        let mut g = genset();
        let err = g.step(Action::Power(60.0)).unwrap_err();
        assert!(matches!(err, MicrogridError::InfeasibleAction { .. }));
    }

    #[test]
    fn negative_production_is_infeasible() {
        let mut g = genset();
        assert!(g.step(Action::Power(-1.0)).is_err());
    }

    #[test]
    fn near_band_edges_clip_onto_the_band() {
        let mut g = genset();
        let out = g.step(Action::Power(10.0 - 1e-9)).unwrap();
        assert_eq!(out.provided, 10.0);
        let out = g.step(Action::Power(50.0 + 1e-9)).unwrap();
        assert_eq!(out.provided, 50.0);
    }

    #[test]
    fn start_up_cost_charged_once_per_transition() {
        let mut g = genset().with_start_up_cost(2.0);
        let out = g.step(Action::Power(10.0)).unwrap();
        assert!((out.cost - 7.0).abs() < 1e-12);
        let out = g.step(Action::Power(10.0)).unwrap();
        assert!((out.cost - 5.0).abs() < 1e-12); // already on
        g.step(Action::Power(0.0)).unwrap();
        let out = g.step(Action::Power(10.0)).unwrap();
        assert!((out.cost - 7.0).abs() < 1e-12); // restarted
    }
}
