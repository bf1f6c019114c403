//! Profile result type.

use ap_core::{Error, Result};
use serde::Serialize;

use crate::accumulate::cumulative_sum;
use crate::binning::BinAxis;

/// Per-bin values of one dependent field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldValues {
    /// Field name.
    pub name: String,
    /// Row-major values, one per bin.
    pub values: Vec<f64>,
}

/// A 1D or 2D binned aggregate.
///
/// All per-bin arrays are row-major over [`Profile::shape`]: bin `(ix, iy)`
/// lives at `ix * ny + iy`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Profile {
    pub(crate) axes: Vec<BinAxis>,
    pub(crate) fields: Vec<FieldValues>,
    pub(crate) weight_field: Option<String>,
    pub(crate) counts: Vec<u64>,
    pub(crate) weight_sums: Vec<f64>,
    pub(crate) used: Vec<bool>,
    pub(crate) dropped: u64,
    pub(crate) accumulated: Vec<bool>,
}

impl Profile {
    /// Number of binning axes (1 or 2).
    pub fn ndim(&self) -> usize {
        self.axes.len()
    }

    /// Bins per axis.
    pub fn shape(&self) -> Vec<usize> {
        self.axes.iter().map(BinAxis::n_bins).collect()
    }

    /// Total number of bins.
    pub fn n_bins(&self) -> usize {
        self.counts.len()
    }

    /// Binning axes.
    pub fn axes(&self) -> &[BinAxis] {
        &self.axes
    }

    /// One binning axis.
    pub fn axis(&self, axis: usize) -> Option<&BinAxis> {
        self.axes.get(axis)
    }

    /// Physical edges of `axis`.
    ///
    /// # Panics
    ///
    /// When `axis >= ndim()`.
    pub fn bin_edges(&self, axis: usize) -> &[f64] {
        self.axes[axis].edges()
    }

    /// Per-bin values of a dependent field.
    pub fn field(&self, name: &str) -> Option<&[f64]> {
        self.fields.iter().find(|f| f.name == name).map(|f| f.values.as_slice())
    }

    /// Like [`Profile::field`], but a missing name is an error.
    pub fn try_field(&self, name: &str) -> Result<&[f64]> {
        self.field(name).ok_or_else(|| Error::FieldNotFound(name.to_string()))
    }

    /// Dependent field names, in request order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    /// Dependent field values, in request order.
    pub fn fields(&self) -> &[FieldValues] {
        &self.fields
    }

    /// Weight field, `None` for plain sums.
    pub fn weight_field(&self) -> Option<&str> {
        self.weight_field.as_deref()
    }

    /// Elements per bin.
    pub fn counts(&self) -> &[u64] {
        &self.counts
    }

    /// Sum of weights per bin (the element count when unweighted).
    pub fn weight_sums(&self) -> &[f64] {
        &self.weight_sums
    }

    /// Bins that received a nonzero total weight.
    pub fn used(&self) -> &[bool] {
        &self.used
    }

    /// Elements that fell outside every axis range or could not be binned.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Axes along which values have been accumulated.
    pub fn accumulated(&self) -> &[bool] {
        &self.accumulated
    }

    /// Value of `field` at a multi-dimensional bin index.
    pub fn value(&self, field: &str, index: &[usize]) -> Option<f64> {
        let flat = self.flat_index(index)?;
        self.field(field).map(|v| v[flat])
    }

    /// Sum of a field over all bins. For accumulated profiles this is not the
    /// grand total; use the last bin instead.
    pub fn total(&self, field: &str) -> Option<f64> {
        self.field(field).map(|v| v.iter().sum())
    }

    fn flat_index(&self, index: &[usize]) -> Option<usize> {
        if index.len() != self.axes.len() {
            return None;
        }
        let mut flat = 0;
        for (axis, &i) in self.axes.iter().zip(index) {
            if i >= axis.n_bins() {
                return None;
            }
            flat = flat * axis.n_bins() + i;
        }
        Some(flat)
    }

    /// Replace every field's values with running sums along each flagged axis.
    ///
    /// Axes already accumulated are skipped, so repeated calls are no-ops.
    /// Counts, weight sums and `used` are left per-bin.
    pub fn accumulate(&mut self, axes: &[bool]) -> Result<()> {
        if axes.len() != self.axes.len() {
            return Err(Error::Configuration(format!(
                "{} accumulation flags given for a {}-dimensional profile",
                axes.len(),
                self.axes.len()
            )));
        }
        let shape = self.shape();
        for (axis, &on) in axes.iter().enumerate() {
            if !on || self.accumulated[axis] {
                continue;
            }
            for f in &mut self.fields {
                cumulative_sum(&mut f.values, &shape, axis)?;
            }
            self.accumulated[axis] = true;
        }
        Ok(())
    }
}
