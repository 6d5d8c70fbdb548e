//! Common types for microgrid modules: keys, actions, bounds, step outputs,
//! and the tagged [`Module`] enum itself.

use std::fmt;

use crate::error::MicrogridError;
use crate::modules::battery::BatteryModule;
use crate::modules::genset::GensetModule;
use crate::modules::grid::GridModule;
use crate::modules::load::LoadModule;
use crate::modules::renewable::RenewableModule;
use crate::modules::unbalanced::UnbalancedModule;

/// Relative tolerance applied when validating actions against bounds.
///
/// LP solutions carry interior-point slack on the order of 1e-8; anything
/// within this tolerance of a bound is accepted and clipped onto it.
pub const ACTION_TOLERANCE: f64 = 1e-6;

/// Absolute tolerance on the post-step energy balance residual.
pub const BALANCE_TOLERANCE: f64 = 1e-6;

/// Identity of a module instance within a microgrid: `(name, index)`.
///
/// The index distinguishes multiple instances sharing a name; single
/// instances use index 0.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ModuleKey {
    pub name: String,
    pub index: usize,
}

impl ModuleKey {
    pub fn new(name: impl Into<String>, index: usize) -> Self {
        Self {
            name: name.into(),
            index,
        }
    }
}

impl fmt::Display for ModuleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.name, self.index)
    }
}

/// A control action for one module at one step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Action {
    /// No decision: exogenous modules step on their natural forecast value.
    None,
    /// A single signed or non-negative power decision. Battery: positive =
    /// discharge, negative = charge. Genset and curtailable renewable:
    /// non-negative production / usage.
    Power(f64),
    /// Independent non-negative grid import and export components.
    Exchange { import: f64, export: f64 },
}

impl Action {
    /// Extracts a `Power` payload, or an infeasible-action error naming the
    /// offending module.
    pub(crate) fn as_power(&self, module: &str) -> Result<f64, MicrogridError> {
        match self {
            Action::Power(p) => Ok(*p),
            other => Err(MicrogridError::InfeasibleAction {
                module: module.to_string(),
                reason: format!("expected a power action, got {other:?}"),
            }),
        }
    }

    /// Extracts an `Exchange` payload.
    pub(crate) fn as_exchange(&self, module: &str) -> Result<(f64, f64), MicrogridError> {
        match self {
            Action::Exchange { import, export } => Ok((*import, *export)),
            other => Err(MicrogridError::InfeasibleAction {
                module: module.to_string(),
                reason: format!("expected an import/export action, got {other:?}"),
            }),
        }
    }

    /// Rejects any non-`None` action for exogenous modules.
    pub(crate) fn expect_none(&self, module: &str) -> Result<(), MicrogridError> {
        match self {
            Action::None => Ok(()),
            other => Err(MicrogridError::InfeasibleAction {
                module: module.to_string(),
                reason: format!("module takes no action, got {other:?}"),
            }),
        }
    }
}

/// Feasible action range for the next step given a module's current state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub low: f64,
    pub high: f64,
}

impl Bounds {
    pub fn new(low: f64, high: f64) -> Self {
        debug_assert!(low <= high + ACTION_TOLERANCE);
        Self { low, high }
    }

    /// Tolerance scaled to the magnitude of the checked value.
    pub(crate) fn tolerance(value: f64) -> f64 {
        ACTION_TOLERANCE * (1.0 + value.abs())
    }

    /// Whether `value` lies within the bounds, allowing numerical slack.
    pub fn contains(&self, value: f64) -> bool {
        let tol = Self::tolerance(value);
        value >= self.low - tol && value <= self.high + tol
    }

    /// Clips a value accepted by [`Bounds::contains`] onto the exact range.
    pub(crate) fn clip(&self, value: f64) -> f64 {
        value.clamp(self.low, self.high)
    }
}

/// Realized outcome of stepping one module.
#[derive(Debug, Clone, Default)]
pub struct StepOutput {
    /// Named realized values, in a stable per-kind order.
    pub fields: Vec<(&'static str, f64)>,
    /// Energy provided to the microgrid this step (production, >= 0).
    pub provided: f64,
    /// Energy absorbed from the microgrid this step (consumption, >= 0).
    pub absorbed: f64,
    /// Cost contribution of this step.
    pub cost: f64,
}

/// A microgrid module: one energy-producing, -consuming, or -storing unit.
///
/// Heterogeneous device kinds behave uniformly behind this tagged enum: the
/// microgrid and the horizon builder drive every variant through the same
/// `bounds` / `forecast` / `step` surface, and only the builder matches on
/// the variant to pick the LP shape for each kind.
#[derive(Debug, Clone)]
pub enum Module {
    Battery(BatteryModule),
    Genset(GensetModule),
    Renewable(RenewableModule),
    Load(LoadModule),
    Grid(GridModule),
    Unbalanced(UnbalancedModule),
}

impl Module {
    /// Default microgrid name for this module kind.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Module::Battery(_) => "battery",
            Module::Genset(_) => "genset",
            Module::Renewable(_) => "renewable",
            Module::Load(_) => "load",
            Module::Grid(_) => "grid",
            Module::Unbalanced(_) => "unbalanced",
        }
    }

    /// Whether this module carries a decision variable each step.
    ///
    /// The slack module is not controllable: it absorbs whatever residual the
    /// microgrid routes to it.
    pub fn is_controllable(&self) -> bool {
        match self {
            Module::Battery(_) | Module::Genset(_) | Module::Grid(_) => true,
            Module::Renewable(r) => r.curtailable,
            Module::Load(_) | Module::Unbalanced(_) => false,
        }
    }

    /// Length of the exogenous data backing this module, if any.
    pub fn series_len(&self) -> Option<usize> {
        match self {
            Module::Renewable(r) => Some(r.series_len()),
            Module::Load(l) => Some(l.series_len()),
            Module::Grid(g) => Some(g.series_len()),
            Module::Battery(_) | Module::Genset(_) | Module::Unbalanced(_) => None,
        }
    }

    /// Feasible action range for the next step given current state.
    pub fn bounds(&self) -> Bounds {
        match self {
            Module::Battery(b) => b.bounds(),
            Module::Genset(g) => g.bounds(),
            Module::Renewable(r) => r.bounds(),
            Module::Load(_) | Module::Unbalanced(_) => Bounds::new(0.0, 0.0),
            Module::Grid(g) => g.bounds(),
        }
    }

    /// Side-effect-free lookahead of the next `horizon` exogenous values.
    ///
    /// Empty for purely stateful modules; grid modules report import prices.
    pub fn forecast(&self, horizon: usize) -> Vec<f64> {
        match self {
            Module::Renewable(r) => r.forecast(horizon),
            Module::Load(l) => l.forecast(horizon),
            Module::Grid(g) => g.import_price_forecast(horizon),
            Module::Battery(_) | Module::Genset(_) | Module::Unbalanced(_) => Vec::new(),
        }
    }

    /// Deterministic transition: applies `action`, mutates internal state,
    /// and advances this module's step counter by exactly one.
    pub fn step(&mut self, action: Action) -> Result<StepOutput, MicrogridError> {
        match self {
            Module::Battery(b) => b.step(action),
            Module::Genset(g) => g.step(action),
            Module::Renewable(r) => r.step(action),
            Module::Load(l) => l.step(action),
            Module::Grid(g) => g.step(action),
            Module::Unbalanced(u) => {
                action.expect_none("unbalanced")?;
                Ok(u.absorb(0.0))
            }
        }
    }

    /// This module's own step counter.
    pub fn current_step(&self) -> usize {
        match self {
            Module::Battery(b) => b.current_step(),
            Module::Genset(g) => g.current_step(),
            Module::Renewable(r) => r.current_step(),
            Module::Load(l) => l.current_step(),
            Module::Grid(g) => g.current_step(),
            Module::Unbalanced(u) => u.current_step(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timeseries::TimeSeries;

    #[test]
    fn forecast_dispatches_per_kind() {
        let renewable = Module::Renewable(RenewableModule::new(TimeSeries::from_values(vec![
            1.0, 2.0, 3.0,
        ])));
        assert_eq!(renewable.forecast(2), vec![1.0, 2.0]);

        let load = Module::Load(LoadModule::new(TimeSeries::constant(3, 60.0)));
        assert_eq!(load.forecast(2), vec![60.0, 60.0]);

        // Grid modules report import prices; stateful modules have nothing
        // to look ahead at.
        let grid = Module::Grid(GridModule::new(
            10.0,
            0.0,
            TimeSeries::constant(3, 1.5),
            TimeSeries::constant(3, 0.5),
        ));
        assert_eq!(grid.forecast(2), vec![1.5, 1.5]);

        let battery = Module::Battery(BatteryModule::new(0.0, 10.0, 5.0, 5.0, 1.0, 0.5));
        assert!(battery.forecast(2).is_empty());
    }

    #[test]
    fn module_key_display() {
        let key = ModuleKey::new("battery", 0);
        assert_eq!(key.to_string(), "battery[0]");
    }

    #[test]
    fn bounds_contains_allows_numerical_slack() {
        let b = Bounds::new(0.0, 10.0);
        assert!(b.contains(10.0 + 1e-8));
        assert!(b.contains(-1e-8));
        assert!(!b.contains(10.1));
        assert!(!b.contains(-0.1));
    }

    #[test]
    fn bounds_clip_lands_on_exact_range() {
        let b = Bounds::new(0.0, 10.0);
        assert_eq!(b.clip(10.0 + 1e-9), 10.0);
        assert_eq!(b.clip(-1e-9), 0.0);
        assert_eq!(b.clip(5.0), 5.0);
    }

    #[test]
    fn action_shape_mismatch_is_infeasible() {
        let err = Action::None.as_power("battery").unwrap_err();
        assert!(matches!(err, MicrogridError::InfeasibleAction { .. }));
        let err = Action::Power(1.0).as_exchange("grid").unwrap_err();
        assert!(matches!(err, MicrogridError::InfeasibleAction { .. }));
    }
}
