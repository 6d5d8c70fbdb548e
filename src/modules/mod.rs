//! Microgrid module catalog: heterogeneous devices behind one capability
//! surface.

/// Battery storage with state-of-charge dynamics.
pub mod battery;
/// Dispatchable generator with an off-or-running production band.
pub mod genset;
/// Grid interconnection with priced import/export.
pub mod grid;
/// Fixed demand driven by a time series.
pub mod load;
/// Curtailable renewable generation.
pub mod renewable;
pub mod types;
/// Slack module absorbing residual imbalance.
pub mod unbalanced;

// Re-export the main types for convenience
pub use battery::BatteryModule;
pub use genset::GensetModule;
pub use grid::GridModule;
pub use load::LoadModule;
pub use renewable::RenewableModule;
pub use types::{Action, Bounds, Module, ModuleKey, StepOutput};
pub use unbalanced::UnbalancedModule;
