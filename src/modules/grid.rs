//! External grid connection with import/export caps and price series.

use crate::error::MicrogridError;
use crate::forecast::Lookahead;
use crate::modules::types::{Action, Bounds, StepOutput};
use crate::timeseries::TimeSeries;

/// A grid interconnection with independent non-negative import and export
/// decision components.
///
/// Import costs `import_price(step)` per unit; export earns
/// `export_price(step)` per unit. With `raise_errors` enabled (the default)
/// a request beyond either cap fails with an infeasible-action error;
/// otherwise it is clamped onto the cap.
#[derive(Debug, Clone)]
pub struct GridModule {
    pub max_import: f64,
    pub max_export: f64,
    import_price: TimeSeries,
    export_price: TimeSeries,
    pub raise_errors: bool,
    current_step: usize,
}

impl GridModule {
    /// # Panics
    ///
    /// Panics on negative caps.
    pub fn new(
        max_import: f64,
        max_export: f64,
        import_price: TimeSeries,
        export_price: TimeSeries,
    ) -> Self {
        assert!(max_import >= 0.0 && max_export >= 0.0);

        Self {
            max_import,
            max_export,
            import_price,
            export_price,
            raise_errors: true,
            current_step: 0,
        }
    }

    /// Clamp out-of-cap requests instead of failing.
    pub fn with_clipping(mut self) -> Self {
        self.raise_errors = false;
        self
    }

    pub fn series_len(&self) -> usize {
        self.import_price.len().min(self.export_price.len())
    }

    pub fn current_step(&self) -> usize {
        self.current_step
    }

    /// Net exchange envelope (positive = import).
    pub fn bounds(&self) -> Bounds {
        Bounds::new(-self.max_export, self.max_import)
    }

    pub fn import_price_forecast(&self, horizon: usize) -> Vec<f64> {
        Lookahead::window(&self.import_price, self.current_step, horizon)
    }

    pub fn export_price_forecast(&self, horizon: usize) -> Vec<f64> {
        Lookahead::window(&self.export_price, self.current_step, horizon)
    }

    fn check_component(&self, label: &str, value: f64, cap: f64) -> Result<f64, MicrogridError> {
        let bounds = Bounds::new(0.0, cap);
        if bounds.contains(value) {
            Ok(bounds.clip(value))
        } else if self.raise_errors {
            Err(MicrogridError::InfeasibleAction {
                module: "grid".to_string(),
                reason: format!("{label} {value:.6} outside [0, {cap:.6}]"),
            })
        } else {
            Ok(bounds.clip(value))
        }
    }

    pub fn step(&mut self, action: Action) -> Result<StepOutput, MicrogridError> {
        let (import, export) = action.as_exchange("grid")?;
        let import = self.check_component("import", import, self.max_import)?;
        let export = self.check_component("export", export, self.max_export)?;

        let import_price = self.import_price.get(self.current_step).unwrap_or(0.0);
        let export_price = self.export_price.get(self.current_step).unwrap_or(0.0);
        self.current_step += 1;

        Ok(StepOutput {
            fields: vec![("grid_import", import), ("grid_export", export)],
            provided: import,
            absorbed: export,
            cost: import_price * import - export_price * export,
        })
    }
}
