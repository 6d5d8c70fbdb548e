//! Stationary battery storage module with state-of-charge dynamics.

use crate::error::MicrogridError;
use crate::modules::types::{Action, Bounds, StepOutput};

/// A battery energy storage module.
///
/// State is the absolute stored energy `charge_level`, kept within
/// `[min_capacity, max_capacity]` after every step. Actions use production
/// convention: positive = discharge (energy delivered to the microgrid),
/// negative = charge (energy absorbed).
///
/// Charging by `a` stores `a * efficiency`; discharging by `a` draws
/// `a / efficiency` from the stored energy. Actions exceeding the remaining
/// headroom or available energy are bounds violations, never silently
/// clipped.
#[derive(Debug, Clone)]
pub struct BatteryModule {
    /// Lowest allowed stored energy.
    pub min_capacity: f64,
    /// Highest allowed stored energy.
    pub max_capacity: f64,
    /// Maximum energy absorbed in one step (positive magnitude).
    pub max_charge: f64,
    /// Maximum energy delivered in one step (positive magnitude).
    pub max_discharge: f64,
    /// Round-trip split efficiency, applied on both charge and discharge.
    pub efficiency: f64,
    /// Cost per unit of throughput (charge or discharge).
    pub marginal_cost: f64,
    charge_level: f64,
    current_step: usize,
}

impl BatteryModule {
    /// Creates a battery with `init_soc` given as a fraction of the usable
    /// capacity range.
    ///
    /// # Panics
    ///
    /// Panics on inverted capacities, negative rate limits, an efficiency
    /// outside `(0, 1]`, or an `init_soc` outside `[0, 1]`.
    pub fn new(
        min_capacity: f64,
        max_capacity: f64,
        max_charge: f64,
        max_discharge: f64,
        efficiency: f64,
        init_soc: f64,
    ) -> Self {
        assert!(min_capacity >= 0.0 && max_capacity > min_capacity);
        assert!(max_charge >= 0.0 && max_discharge >= 0.0);
        assert!(efficiency > 0.0 && efficiency <= 1.0);
        assert!((0.0..=1.0).contains(&init_soc));

        Self {
            min_capacity,
            max_capacity,
            max_charge,
            max_discharge,
            efficiency,
            marginal_cost: 0.0,
            charge_level: min_capacity + init_soc * (max_capacity - min_capacity),
            current_step: 0,
        }
    }

    /// Sets a per-unit throughput cost.
    pub fn with_marginal_cost(mut self, marginal_cost: f64) -> Self {
        assert!(marginal_cost >= 0.0);
        self.marginal_cost = marginal_cost;
        self
    }

    /// Current stored energy.
    pub fn charge_level(&self) -> f64 {
        self.charge_level
    }

    /// State of charge as a fraction of the usable capacity range.
    pub fn soc(&self) -> f64 {
        (self.charge_level - self.min_capacity) / (self.max_capacity - self.min_capacity)
    }

    pub fn current_step(&self) -> usize {
        self.current_step
    }

    /// Feasible action range: charge limited by rate and headroom, discharge
    /// limited by rate and available energy.
    pub fn bounds(&self) -> Bounds {
        let headroom = (self.max_capacity - self.charge_level) / self.efficiency;
        let available = (self.charge_level - self.min_capacity) * self.efficiency;
        Bounds::new(
            -self.max_charge.min(headroom.max(0.0)),
            self.max_discharge.min(available.max(0.0)),
        )
    }

    /// Applies a signed power action and updates the charge level.
    pub fn step(&mut self, action: Action) -> Result<StepOutput, MicrogridError> {
        let power = action.as_power("battery")?;
        let bounds = self.bounds();
        if !bounds.contains(power) {
            return Err(MicrogridError::InfeasibleAction {
                module: "battery".to_string(),
                reason: format!(
                    "action {power:.6} outside bounds [{:.6}, {:.6}]",
                    bounds.low, bounds.high
                ),
            });
        }
        let power = bounds.clip(power);

        let (charge_amount, discharge_amount) = if power >= 0.0 {
            self.charge_level -= power / self.efficiency;
            (0.0, power)
        } else {
            self.charge_level += -power * self.efficiency;
            (-power, 0.0)
        };
        // Bounds validation allows tolerance-sized overshoot only.
        self.charge_level = self.charge_level.clamp(self.min_capacity, self.max_capacity);
        self.current_step += 1;

        Ok(StepOutput {
            fields: vec![
                ("charge_amount", charge_amount),
                ("discharge_amount", discharge_amount),
                ("current_charge", self.charge_level),
                ("soc", self.soc()),
            ],
            provided: discharge_amount,
            absorbed: charge_amount,
            cost: self.marginal_cost * (charge_amount + discharge_amount),
        })
    }
}
