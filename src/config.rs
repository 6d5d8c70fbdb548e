//! TOML-based scenario configuration and the default module catalog.

use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::error::MicrogridError;
use crate::modules::{
    BatteryModule, GensetModule, GridModule, LoadModule, Module, RenewableModule, UnbalancedModule,
};
use crate::sim::microgrid::{MicrogridBuilder, NamedModule};
use crate::timeseries::TimeSeries;

/// Top-level scenario configuration parsed from TOML.
///
/// All fields have defaults matching the baseline scenario: a genset,
/// battery, constant renewable, constant load, and an import-only grid over
/// a 100-step horizon of data. Load from TOML with
/// [`ScenarioConfig::from_toml_str`] or use `ScenarioConfig::default()`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScenarioConfig {
    /// Simulation timing and MPC parameters.
    pub simulation: SimulationConfig,
    /// Genset parameters.
    pub genset: GensetConfig,
    /// Battery storage parameters.
    pub battery: BatteryConfig,
    /// Renewable availability profile.
    pub renewable: ProfileConfig,
    /// Load demand profile.
    pub load: LoadProfileConfig,
    /// Grid interconnection parameters.
    pub grid: GridConfig,
    /// Slack module penalties.
    pub unbalanced: UnbalancedConfig,
}

/// Simulation timing and MPC parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimulationConfig {
    /// Length of every generated time series (must be > 0).
    pub timeseries_length: usize,
    /// MPC lookahead horizon (must be > 0).
    pub horizon: usize,
    /// Per-offset objective discount in `(0, 1]`.
    pub discount: f64,
    /// Master random seed for synthetic profiles.
    pub seed: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            timeseries_length: 100,
            horizon: 1,
            discount: 1.0,
            seed: 42,
        }
    }
}

/// Genset parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GensetConfig {
    pub running_min_production: f64,
    pub running_max_production: f64,
    pub genset_cost: f64,
    pub start_up_cost: f64,
}

impl Default for GensetConfig {
    fn default() -> Self {
        Self {
            running_min_production: 10.0,
            running_max_production: 50.0,
            genset_cost: 0.5,
            start_up_cost: 0.0,
        }
    }
}

/// Battery storage parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BatteryConfig {
    pub min_capacity: f64,
    pub max_capacity: f64,
    pub max_charge: f64,
    pub max_discharge: f64,
    pub efficiency: f64,
    pub init_soc: f64,
    pub marginal_cost: f64,
}

impl Default for BatteryConfig {
    fn default() -> Self {
        Self {
            min_capacity: 0.0,
            max_capacity: 100.0,
            max_charge: 50.0,
            max_discharge: 50.0,
            efficiency: 1.0,
            init_soc: 0.5,
            marginal_cost: 0.0,
        }
    }
}

/// A constant or noisy-sinusoid generation profile.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProfileConfig {
    /// Mean value of the profile.
    pub mean: f64,
    /// Sinusoidal amplitude (0 for a constant profile).
    pub amplitude: f64,
    /// Gaussian noise standard deviation (0 for a deterministic profile).
    pub noise_std: f64,
    /// Sinusoid period in steps.
    pub period: usize,
}

impl Default for ProfileConfig {
    fn default() -> Self {
        Self {
            mean: 50.0,
            amplitude: 0.0,
            noise_std: 0.0,
            period: 24,
        }
    }
}

impl ProfileConfig {
    fn build(&self, len: usize, seed: u64) -> TimeSeries {
        if self.amplitude == 0.0 && self.noise_std == 0.0 {
            TimeSeries::constant(len, self.mean)
        } else {
            TimeSeries::noisy_profile(len, self.period, self.mean, self.amplitude, self.noise_std, seed)
        }
    }
}

/// Load demand profile (same shape as [`ProfileConfig`], different default).
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoadProfileConfig {
    pub mean: f64,
    pub amplitude: f64,
    pub noise_std: f64,
    pub period: usize,
}

impl Default for LoadProfileConfig {
    fn default() -> Self {
        Self {
            mean: 60.0,
            amplitude: 0.0,
            noise_std: 0.0,
            period: 24,
        }
    }
}

impl LoadProfileConfig {
    fn build(&self, len: usize, seed: u64) -> TimeSeries {
        let profile = ProfileConfig {
            mean: self.mean,
            amplitude: self.amplitude,
            noise_std: self.noise_std,
            period: self.period,
        };
        profile.build(len, seed)
    }
}

/// Grid interconnection parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GridConfig {
    pub max_import: f64,
    pub max_export: f64,
    pub import_price: f64,
    pub export_price: f64,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            max_import: 100.0,
            max_export: 0.0,
            import_price: 1.0,
            export_price: 1.0,
        }
    }
}

/// Slack module penalties.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct UnbalancedConfig {
    pub loss_load_cost: f64,
    pub overgeneration_cost: f64,
}

impl Default for UnbalancedConfig {
    fn default() -> Self {
        Self {
            loss_load_cost: 10.0,
            overgeneration_cost: 10.0,
        }
    }
}

impl ScenarioConfig {
    /// Parses a scenario from a TOML string.
    pub fn from_toml_str(input: &str) -> Result<Self, MicrogridError> {
        let config: Self = toml::from_str(input)
            .map_err(|e| MicrogridError::Configuration(format!("bad scenario TOML: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Parses a scenario from a TOML file.
    pub fn from_toml_file(path: &Path) -> Result<Self, MicrogridError> {
        let input = fs::read_to_string(path).map_err(|e| {
            MicrogridError::Configuration(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&input)
    }

    /// Checks value ranges before any module is constructed.
    pub fn validate(&self) -> Result<(), MicrogridError> {
        let fail = |msg: &str| Err(MicrogridError::Configuration(msg.to_string()));
        if self.simulation.timeseries_length == 0 {
            return fail("timeseries_length must be > 0");
        }
        if self.simulation.horizon == 0 {
            return fail("horizon must be > 0");
        }
        if !(self.simulation.discount > 0.0 && self.simulation.discount <= 1.0) {
            return fail("discount must be in (0, 1]");
        }
        if self.genset.running_min_production < 0.0
            || self.genset.running_max_production < self.genset.running_min_production
        {
            return fail("genset production band must satisfy 0 <= min <= max");
        }
        if self.battery.max_capacity <= self.battery.min_capacity {
            return fail("battery max_capacity must exceed min_capacity");
        }
        if !(self.battery.efficiency > 0.0 && self.battery.efficiency <= 1.0) {
            return fail("battery efficiency must be in (0, 1]");
        }
        if !(0.0..=1.0).contains(&self.battery.init_soc) {
            return fail("battery init_soc must be in [0, 1]");
        }
        if self.grid.max_import < 0.0 || self.grid.max_export < 0.0 {
            return fail("grid caps must be non-negative");
        }
        Ok(())
    }

    /// Builds the default module catalog described by this scenario.
    pub fn build_catalog(&self) -> Vec<NamedModule> {
        let len = self.simulation.timeseries_length;
        let seed = self.simulation.seed;
        vec![
            NamedModule::auto(Module::Genset(
                GensetModule::new(
                    self.genset.running_min_production,
                    self.genset.running_max_production,
                    self.genset.genset_cost,
                )
                .with_start_up_cost(self.genset.start_up_cost),
            )),
            NamedModule::auto(Module::Battery(
                BatteryModule::new(
                    self.battery.min_capacity,
                    self.battery.max_capacity,
                    self.battery.max_charge,
                    self.battery.max_discharge,
                    self.battery.efficiency,
                    self.battery.init_soc,
                )
                .with_marginal_cost(self.battery.marginal_cost),
            )),
            NamedModule::auto(Module::Renewable(RenewableModule::new(
                self.renewable.build(len, seed),
            ))),
            NamedModule::auto(Module::Load(LoadModule::new(
                self.load.build(len, seed.wrapping_add(1)),
            ))),
            NamedModule::auto(Module::Grid(GridModule::new(
                self.grid.max_import,
                self.grid.max_export,
                TimeSeries::constant(len, self.grid.import_price),
                TimeSeries::constant(len, self.grid.export_price),
            ))),
        ]
    }

    /// Starts a microgrid builder over this scenario's catalog.
    ///
    /// The scenario's slack module rides along as an additional module so
    /// its configured penalties apply instead of the built-in defaults.
    pub fn builder(&self) -> MicrogridBuilder {
        MicrogridBuilder::new(self.build_catalog()).additional_modules(vec![NamedModule::auto(
            Module::Unbalanced(self.unbalanced_module()),
        )])
    }

    /// The slack module described by this scenario.
    pub fn unbalanced_module(&self) -> UnbalancedModule {
        UnbalancedModule::new(
            self.unbalanced.loss_load_cost,
            self.unbalanced.overgeneration_cost,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = ScenarioConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.simulation.timeseries_length, 100);
        assert_eq!(config.simulation.horizon, 1);
        assert_eq!(config.load.mean, 60.0);
    }

    #[test]
    fn empty_toml_yields_defaults() {
        let config = ScenarioConfig::from_toml_str("").unwrap();
        assert_eq!(config.genset.genset_cost, 0.5);
        assert_eq!(config.battery.max_capacity, 100.0);
    }

    #[test]
    fn partial_toml_overrides_defaults() {
        let toml = r#"
            [simulation]
            timeseries_length = 24
            horizon = 4

            [battery]
            max_capacity = 200.0
            init_soc = 0.8
        "#;
        let config = ScenarioConfig::from_toml_str(toml).unwrap();
        assert_eq!(config.simulation.timeseries_length, 24);
        assert_eq!(config.simulation.horizon, 4);
        assert_eq!(config.battery.max_capacity, 200.0);
        assert_eq!(config.battery.init_soc, 0.8);
        // Untouched sections keep defaults.
        assert_eq!(config.load.mean, 60.0);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let toml = r#"
            [simulation]
            not_a_field = 1
        "#;
        assert!(ScenarioConfig::from_toml_str(toml).is_err());
    }

    #[test]
    fn invalid_ranges_are_rejected() {
        let toml = r#"
            [battery]
            efficiency = 1.5
        "#;
        let err = ScenarioConfig::from_toml_str(toml).unwrap_err();
        assert!(matches!(err, MicrogridError::Configuration(_)));

        let toml = r#"
            [simulation]
            horizon = 0
        "#;
        assert!(ScenarioConfig::from_toml_str(toml).is_err());
    }

    #[test]
    fn catalog_contains_the_five_default_modules() {
        let config = ScenarioConfig::default();
        let catalog = config.build_catalog();
        let names: Vec<&str> = catalog.iter().map(|m| m.effective_name()).collect();
        assert_eq!(
            names,
            vec!["genset", "battery", "renewable", "load", "grid"]
        );
    }

    #[test]
    fn builder_produces_a_microgrid_with_slack() {
        let config = ScenarioConfig::default();
        let mg = config.builder().build().unwrap();
        assert!(mg.has_slack());
        assert_eq!(mg.episode_len(), 100);
    }

    #[test]
    fn configured_slack_penalties_apply() {
        let toml = r#"
            [unbalanced]
            loss_load_cost = 3.0
        "#;
        let config = ScenarioConfig::from_toml_str(toml).unwrap();
        let mg = config.builder().build().unwrap();
        let Some(Module::Unbalanced(slack)) = mg.module("unbalanced", 0) else {
            panic!("slack module missing");
        };
        assert_eq!(slack.loss_load_cost, 3.0);
        assert_eq!(slack.overgeneration_cost, 10.0);
    }

    #[test]
    fn noisy_profiles_come_from_the_seed() {
        let toml = r#"
            [renewable]
            amplitude = 10.0
            noise_std = 2.0
        "#;
        let a = ScenarioConfig::from_toml_str(toml).unwrap();
        let b = ScenarioConfig::from_toml_str(toml).unwrap();
        let series_a = a.renewable.build(48, a.simulation.seed);
        let series_b = b.renewable.build(48, b.simulation.seed);
        assert_eq!(series_a, series_b);
    }
}
