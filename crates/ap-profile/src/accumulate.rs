//! Cumulative sums along one axis of a row-major grid.

use ap_core::{Error, Result};

/// Replace every value with the running sum of itself and all lower-indexed
/// values along `axis`. `values` is row-major with the given `shape`.
pub fn cumulative_sum(values: &mut [f64], shape: &[usize], axis: usize) -> Result<()> {
    if axis >= shape.len() {
        return Err(Error::Configuration(format!(
            "accumulation axis {axis} out of range for {}-dimensional data",
            shape.len()
        )));
    }
    let total: usize = shape.iter().product();
    if total != values.len() {
        return Err(Error::Configuration(format!(
            "shape {shape:?} does not match {} values",
            values.len()
        )));
    }
    let stride: usize = shape[axis + 1..].iter().product();
    let len = shape[axis];
    for i in 0..values.len() {
        // Increasing `i` means the predecessor along `axis` is already a running sum.
        if !(i / stride).is_multiple_of(len) {
            values[i] += values[i - stride];
        }
    }
    Ok(())
}
