//! Bin edges and bin lookup.
//!
//! Edges are laid out linearly in *scaled* space: the raw value on a linear
//! axis, `log10` of it on a log axis. Lookups happen in scaled space too, so
//! an auto-ranged maximum always lands in the last bin instead of being lost
//! to `10^log10(x) != x` round-off.

use ap_core::{Error, Result};
use serde::{Deserialize, Serialize};

/// Spacing of bin edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BinScale {
    /// Edges evenly spaced in value.
    #[default]
    Linear,
    /// Edges evenly spaced in `log10(value)`; non-positive values are unbinnable.
    Log,
}

impl BinScale {
    /// `true` for [`BinScale::Log`].
    pub fn is_log(self) -> bool {
        self == BinScale::Log
    }

    /// Value → scaled coordinate. `NaN` when the value is not representable.
    #[inline]
    pub fn forward(self, v: f64) -> f64 {
        match self {
            BinScale::Linear => v,
            BinScale::Log if v > 0.0 => v.log10(),
            BinScale::Log => f64::NAN,
        }
    }

    /// Scaled coordinate → value.
    #[inline]
    pub fn inverse(self, s: f64) -> f64 {
        match self {
            BinScale::Linear => s,
            BinScale::Log => 10f64.powf(s),
        }
    }
}

/// Evenly spaced edges between `lo` and `hi` (already in scaled space).
///
/// Each edge is computed independently from its index, never by repeated
/// addition, and the last edge is exactly `hi`.
fn spaced_edges(n_bins: usize, lo: f64, hi: f64) -> Result<Vec<f64>> {
    if n_bins == 0 {
        return Err(Error::Configuration("n_bins must be at least 1".into()));
    }
    if !(lo.is_finite() && hi.is_finite() && lo < hi) {
        return Err(Error::Configuration(format!("invalid bin range [{lo}, {hi}]")));
    }
    let n = n_bins as f64;
    // Interpolated rather than `lo + width * t`, which overflows for ranges wider than f64::MAX.
    let mut edges: Vec<f64> = (0..=n_bins)
        .map(|i| {
            let t = i as f64 / n;
            lo * (1.0 - t) + hi * t
        })
        .collect();
    edges[n_bins] = hi;
    if edges.windows(2).any(|w| w[1] <= w[0]) {
        return Err(Error::Configuration(format!(
            "range [{lo}, {hi}] is too narrow for {n_bins} distinct bins"
        )));
    }
    Ok(edges)
}

/// Compute `n_bins + 1` strictly increasing edges for a physical range.
///
/// On a log scale both bounds must be positive; edges are returned in
/// physical units (`10^e`).
pub fn compute_edges(n_bins: usize, lo: f64, hi: f64, scale: BinScale) -> Result<Vec<f64>> {
    if scale.is_log() && !(lo > 0.0 && hi > 0.0) {
        return Err(Error::Configuration(format!(
            "log-scaled range [{lo}, {hi}] must be strictly positive"
        )));
    }
    let scaled = spaced_edges(n_bins, scale.forward(lo), scale.forward(hi))?;
    Ok(scaled.into_iter().map(|e| scale.inverse(e)).collect())
}

/// Find the bin index for a value given sorted edges.
///
/// Bin `i` covers `[edges[i], edges[i + 1])`; the last bin also includes its
/// upper edge. Returns `None` for values outside the edges and for NaN.
pub fn find_bin(edges: &[f64], value: f64) -> Option<usize> {
    let last = edges.len().checked_sub(1)?;
    if last == 0 || value.is_nan() || value < edges[0] || value > edges[last] {
        return None;
    }
    if value == edges[last] {
        return Some(last - 1);
    }
    // First edge strictly greater than `value`; edges[0] <= value guarantees >= 1.
    let upper = edges.partition_point(|&e| e <= value);
    Some(upper - 1)
}

/// One binning axis of a profile.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BinAxis {
    field: String,
    scale: BinScale,
    edges: Vec<f64>,
    #[serde(skip)]
    scaled_edges: Vec<f64>,
}

impl BinAxis {
    /// Build an axis from bounds in scaled space.
    pub fn from_scaled_range(
        field: impl Into<String>,
        scale: BinScale,
        n_bins: usize,
        lo: f64,
        hi: f64,
    ) -> Result<Self> {
        let scaled_edges = spaced_edges(n_bins, lo, hi)?;
        let edges = scaled_edges.iter().map(|&e| scale.inverse(e)).collect();
        Ok(Self { field: field.into(), scale, edges, scaled_edges })
    }

    /// Build an axis from a physical range.
    pub fn new(
        field: impl Into<String>,
        scale: BinScale,
        n_bins: usize,
        lo: f64,
        hi: f64,
    ) -> Result<Self> {
        if scale.is_log() && !(lo > 0.0 && hi > 0.0) {
            return Err(Error::Configuration(format!(
                "log-scaled range [{lo}, {hi}] must be strictly positive"
            )));
        }
        Self::from_scaled_range(field, scale, n_bins, scale.forward(lo), scale.forward(hi))
    }

    /// Binning field name.
    pub fn field(&self) -> &str {
        &self.field
    }

    /// Edge spacing.
    pub fn scale(&self) -> BinScale {
        self.scale
    }

    /// Number of bins.
    pub fn n_bins(&self) -> usize {
        self.edges.len() - 1
    }

    /// Physical bin edges (`n_bins + 1` values).
    pub fn edges(&self) -> &[f64] {
        &self.edges
    }

    /// Left edge of every bin (`n_bins` values), the x-coordinates for line plots.
    pub fn left_edges(&self) -> &[f64] {
        &self.edges[..self.n_bins()]
    }

    /// Bin centres: arithmetic midpoints on linear axes, geometric on log axes.
    pub fn centers(&self) -> Vec<f64> {
        self.scaled_edges.windows(2).map(|w| self.scale.inverse(0.5 * (w[0] + w[1]))).collect()
    }

    /// `(first edge, last edge)` in physical units.
    pub fn range(&self) -> (f64, f64) {
        (self.edges[0], self.edges[self.n_bins()])
    }

    /// Bin index of a physical value, or `None` when it cannot be binned.
    #[inline]
    pub fn locate(&self, value: f64) -> Option<usize> {
        find_bin(&self.scaled_edges, self.scale.forward(value))
    }
}
