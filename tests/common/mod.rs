//! Shared test fixtures for integration tests.

use microgrid_sim::config::ScenarioConfig;
use microgrid_sim::modules::{LoadModule, Module, RenewableModule};
use microgrid_sim::sim::{Microgrid, MicrogridBuilder, NamedModule};
use microgrid_sim::timeseries::TimeSeries;

/// Constant renewable availability used across scenarios.
pub const PV_CONST: f64 = 50.0;
/// Constant load demand used across scenarios.
pub const LOAD_CONST: f64 = 60.0;
/// Length of every fixture time series.
pub const SERIES_LEN: usize = 100;

/// Builder over the baseline catalog: genset (10-50 @ 0.5), battery
/// (0-100, 50/50, eff 1.0, SOC 0.5), constant renewable 50, constant load
/// 60, import-only grid (100 @ 1.0).
pub fn default_builder() -> MicrogridBuilder {
    ScenarioConfig::default().builder()
}

/// The full baseline microgrid with slack.
pub fn modular_microgrid() -> Microgrid {
    default_builder().build().expect("baseline microgrid builds")
}

/// Baseline microgrid with modules removed and extras merged in.
pub fn microgrid_without(remove: &[&str], additional: Vec<NamedModule>) -> Microgrid {
    default_builder()
        .remove_modules(remove.iter().copied())
        .additional_modules(additional)
        .build()
        .expect("modified microgrid builds")
}

/// A fresh constant-availability renewable module.
pub fn pv_module() -> Module {
    Module::Renewable(RenewableModule::new(TimeSeries::constant(
        SERIES_LEN, PV_CONST,
    )))
}

/// A fresh constant-demand load module.
pub fn load_module() -> Module {
    Module::Load(LoadModule::new(TimeSeries::constant(SERIES_LEN, LOAD_CONST)))
}
