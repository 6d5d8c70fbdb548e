//! Forecastable time-series source backing exogenous modules.

use std::f64::consts::PI;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::MicrogridError;

/// A fixed-length series of forecastable values.
///
/// Renewable availability, load demand, and grid prices are all backed by a
/// `TimeSeries`. Lookahead queries are side-effect-free; the series never
/// advances on its own — consuming modules track their own step position.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeSeries {
    values: Vec<f64>,
}

impl TimeSeries {
    /// Wraps an owned vector of values.
    pub fn from_values(values: Vec<f64>) -> Self {
        Self { values }
    }

    /// A series of `len` copies of `value`.
    pub fn constant(len: usize, value: f64) -> Self {
        Self {
            values: vec![value; len],
        }
    }

    /// A sinusoidal profile with Gaussian noise, clamped at zero.
    ///
    /// Produces `base + amplitude * sin(2π t / period) + noise` for each step,
    /// seeded for reproducibility.
    pub fn noisy_profile(
        len: usize,
        period: usize,
        base: f64,
        amplitude: f64,
        noise_std: f64,
        seed: u64,
    ) -> Self {
        assert!(period > 0, "period must be > 0");
        let mut rng = StdRng::seed_from_u64(seed);
        let values = (0..len)
            .map(|t| {
                let phase = 2.0 * PI * (t % period) as f64 / period as f64;
                let v = base + amplitude * phase.sin() + gaussian_noise(&mut rng, noise_std);
                v.max(0.0)
            })
            .collect();
        Self { values }
    }

    /// Reads a single-column CSV (no header) into a series.
    pub fn from_csv_reader(reader: impl Read) -> Result<Self, MicrogridError> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(false)
            .from_reader(reader);
        let mut values = Vec::new();
        for record in rdr.records() {
            let record =
                record.map_err(|e| MicrogridError::Configuration(format!("bad CSV row: {e}")))?;
            let cell = record.get(0).ok_or_else(|| {
                MicrogridError::Configuration("empty CSV row in time series".into())
            })?;
            let value: f64 = cell.trim().parse().map_err(|_| {
                MicrogridError::Configuration(format!("non-numeric time-series value '{cell}'"))
            })?;
            values.push(value);
        }
        Ok(Self { values })
    }

    /// Reads a single-column CSV file into a series.
    pub fn from_csv_path(path: &Path) -> Result<Self, MicrogridError> {
        let file = File::open(path).map_err(|e| {
            MicrogridError::Configuration(format!("cannot open {}: {e}", path.display()))
        })?;
        Self::from_csv_reader(file)
    }

    /// Number of steps covered by the series.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// `true` when the series holds no values.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Value at `step`, or `None` past the end of the series.
    pub fn get(&self, step: usize) -> Option<f64> {
        self.values.get(step).copied()
    }

    /// Up to `horizon` values starting at `start`, clipped at the series end.
    pub fn window(&self, start: usize, horizon: usize) -> &[f64] {
        let start = start.min(self.values.len());
        let end = start.saturating_add(horizon).min(self.values.len());
        &self.values[start..end]
    }
}

/// Gaussian noise via the Box-Muller transform (mean 0).
fn gaussian_noise(rng: &mut StdRng, std_dev: f64) -> f64 {
    if std_dev <= 0.0 {
        return 0.0;
    }

    let u1: f64 = rng.random::<f64>().clamp(1e-12, 1.0);
    let u2: f64 = rng.random::<f64>();
    let z0 = (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos();
    z0 * std_dev
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_series_values() {
        let ts = TimeSeries::constant(5, 3.5);
        assert_eq!(ts.len(), 5);
        assert_eq!(ts.get(0), Some(3.5));
        assert_eq!(ts.get(4), Some(3.5));
        assert_eq!(ts.get(5), None);
    }

    #[test]
    fn window_is_clipped_at_series_end() {
        let ts = TimeSeries::from_values(vec![1.0, 2.0, 3.0]);
        assert_eq!(ts.window(0, 2), &[1.0, 2.0]);
        assert_eq!(ts.window(2, 5), &[3.0]);
        assert_eq!(ts.window(3, 5), &[] as &[f64]);
    }

    #[test]
    fn window_does_not_advance_the_series() {
        let ts = TimeSeries::constant(10, 1.0);
        let _ = ts.window(0, 4);
        let _ = ts.window(0, 4);
        assert_eq!(ts.len(), 10);
        assert_eq!(ts.get(0), Some(1.0));
    }

    #[test]
    fn noisy_profile_is_reproducible_for_fixed_seed() {
        let a = TimeSeries::noisy_profile(48, 24, 50.0, 10.0, 2.0, 7);
        let b = TimeSeries::noisy_profile(48, 24, 50.0, 10.0, 2.0, 7);
        assert_eq!(a, b);
    }

    #[test]
    fn noisy_profile_is_non_negative() {
        let ts = TimeSeries::noisy_profile(100, 24, 1.0, 5.0, 3.0, 11);
        assert!(ts.window(0, 100).iter().all(|v| *v >= 0.0));
    }

    #[test]
    fn csv_single_column_parses() {
        let data = "50.0\n60.5\n70\n";
        let ts = TimeSeries::from_csv_reader(data.as_bytes()).unwrap();
        assert_eq!(ts.window(0, 3), &[50.0, 60.5, 70.0]);
    }

    #[test]
    fn csv_non_numeric_is_a_configuration_error() {
        let data = "50.0\nabc\n";
        let err = TimeSeries::from_csv_reader(data.as_bytes()).unwrap_err();
        assert!(matches!(err, MicrogridError::Configuration(_)));
    }
}
