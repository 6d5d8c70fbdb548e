//! Horizon lookahead windowing over time series.

use crate::timeseries::TimeSeries;

/// Fixed-horizon lookahead over a [`TimeSeries`].
///
/// The MPC path uses [`Lookahead::window`], which shrinks at the end of the
/// data so the horizon problem never sees fabricated values. Callers that
/// need a fixed-length vector regardless of remaining data can use
/// [`Lookahead::padded`], which holds the last known value.
#[derive(Debug, Default, Clone, Copy)]
pub struct Lookahead;

impl Lookahead {
    /// The next `horizon` values from `start`, clipped at the series end.
    pub fn window(series: &TimeSeries, start: usize, horizon: usize) -> Vec<f64> {
        series.window(start, horizon).to_vec()
    }

    /// The next `horizon` values from `start`, padded by holding the last
    /// available value when the series runs out.
    pub fn padded(series: &TimeSeries, start: usize, horizon: usize) -> Vec<f64> {
        let mut out = Self::window(series, start, horizon);
        if out.len() < horizon {
            let fill = out
                .last()
                .copied()
                .or_else(|| {
                    if series.is_empty() {
                        None
                    } else {
                        series.get(series.len() - 1)
                    }
                })
                .unwrap_or(0.0);
            out.resize(horizon, fill);
        }
        out
    }
}
