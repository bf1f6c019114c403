//! Particle deposition onto a uniform mesh.
//!
//! A [`DepositGrid`] is checked against the [`Domain`] it samples when it is
//! built; a grid whose cells are wildly anisotropic or that reaches outside
//! the domain is a [`Error::BoundsDefinition`]. Particles that fall outside a
//! valid grid are simply skipped.

use ap_core::{Error, Result};
use serde::{Deserialize, Serialize};

/// Default upper bound on `max cell width / min cell width`.
pub const DEFAULT_MAX_CELL_ASPECT: f64 = 64.0;

/// Simulation domain a grid may sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Domain {
    /// Lower corner.
    pub left_edge: [f64; 3],
    /// Upper corner.
    pub right_edge: [f64; 3],
    /// Largest allowed ratio of the widest to the narrowest cell dimension.
    pub max_cell_aspect: f64,
}

impl Default for Domain {
    fn default() -> Self {
        Self::unit()
    }
}

impl Domain {
    /// Domain spanning `left..right`.
    pub fn new(left_edge: [f64; 3], right_edge: [f64; 3]) -> Self {
        Self { left_edge, right_edge, max_cell_aspect: DEFAULT_MAX_CELL_ASPECT }
    }

    /// The unit cube.
    pub fn unit() -> Self {
        Self::new([0.0; 3], [1.0; 3])
    }

    /// Override the cell aspect limit.
    pub fn with_max_cell_aspect(mut self, aspect: f64) -> Self {
        self.max_cell_aspect = aspect;
        self
    }
}

/// Deposition kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DepositKernel {
    /// Whole value into the containing cell.
    #[default]
    #[serde(rename = "ngp")]
    NearestGridPoint,
    /// Value shared among the 8 nearest cell centres with trilinear weights.
    #[serde(rename = "cic")]
    CloudInCell,
}

/// Uniform mesh over a box.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DepositGrid {
    left_edge: [f64; 3],
    right_edge: [f64; 3],
    dims: [usize; 3],
}

impl DepositGrid {
    /// Validate a grid against `domain`.
    pub fn new(
        left_edge: [f64; 3],
        right_edge: [f64; 3],
        dims: [usize; 3],
        domain: &Domain,
    ) -> Result<Self> {
        for axis in 0..3 {
            if dims[axis] == 0 {
                return Err(Error::Configuration(format!("grid dims[{axis}] must be at least 1")));
            }
            let (l, r) = (left_edge[axis], right_edge[axis]);
            if !(l.is_finite() && r.is_finite() && l < r) {
                return Err(Error::Configuration(format!(
                    "grid axis {axis} needs left < right, got [{l}, {r}]"
                )));
            }
            if l < domain.left_edge[axis] || r > domain.right_edge[axis] {
                return Err(Error::BoundsDefinition(format!(
                    "grid axis {axis} [{l}, {r}] extends outside domain [{}, {}]",
                    domain.left_edge[axis], domain.right_edge[axis]
                )));
            }
        }
        let grid = Self { left_edge, right_edge, dims };
        let widths = grid.cell_widths();
        let widest = widths.iter().copied().fold(f64::MIN, f64::max);
        let narrowest = widths.iter().copied().fold(f64::MAX, f64::min);
        let aspect = widest / narrowest;
        if aspect > domain.max_cell_aspect {
            return Err(Error::BoundsDefinition(format!(
                "cell widths {widths:?} for dims {dims:?} give aspect ratio {aspect:.1}, \
                 limit is {}",
                domain.max_cell_aspect
            )));
        }
        Ok(grid)
    }

    /// Lower corner.
    pub fn left_edge(&self) -> [f64; 3] {
        self.left_edge
    }

    /// Upper corner.
    pub fn right_edge(&self) -> [f64; 3] {
        self.right_edge
    }

    /// Cells per axis.
    pub fn dims(&self) -> [usize; 3] {
        self.dims
    }

    /// Cell width per axis.
    pub fn cell_widths(&self) -> [f64; 3] {
        std::array::from_fn(|a| (self.right_edge[a] - self.left_edge[a]) / self.dims[a] as f64)
    }

    /// Total number of cells.
    pub fn n_cells(&self) -> usize {
        self.dims.iter().product()
    }

    /// Row-major index of cell `(i, j, k)`.
    #[inline]
    pub fn index(&self, i: usize, j: usize, k: usize) -> usize {
        (i * self.dims[1] + j) * self.dims[2] + k
    }

    fn contains(&self, p: [f64; 3]) -> bool {
        (0..3).all(|a| p[a] >= self.left_edge[a] && p[a] <= self.right_edge[a])
    }

    /// Containing cell on one axis; the upper face belongs to the last cell.
    fn cell(&self, axis: usize, x: f64, width: f64) -> usize {
        let i = ((x - self.left_edge[axis]) / width).floor() as usize;
        i.min(self.dims[axis] - 1)
    }
}

/// Deposit `values` at particle `positions` onto `grid`.
///
/// Returns one value per cell, row-major over `dims`.
pub fn deposit(
    grid: &DepositGrid,
    positions: [&[f64]; 3],
    values: &[f64],
    kernel: DepositKernel,
) -> Result<Vec<f64>> {
    let n = values.len();
    if let Some(a) = (0..3).find(|&a| positions[a].len() != n) {
        return Err(Error::Configuration(format!(
            "position axis {a} has {} values, expected {n}",
            positions[a].len()
        )));
    }

    let widths = grid.cell_widths();
    let mut out = vec![0.0; grid.n_cells()];
    let mut skipped = 0u64;

    for (idx, &v) in values.iter().enumerate() {
        let p = [positions[0][idx], positions[1][idx], positions[2][idx]];
        if !grid.contains(p) {
            skipped += 1;
            continue;
        }
        match kernel {
            DepositKernel::NearestGridPoint => {
                let [i, j, k] = std::array::from_fn(|a| grid.cell(a, p[a], widths[a]));
                out[grid.index(i, j, k)] += v;
            }
            DepositKernel::CloudInCell => cic(grid, &widths, p, v, &mut out),
        }
    }

    if skipped > 0 {
        log::debug!("deposit: skipped {skipped} of {n} particles outside the grid");
    }
    Ok(out)
}

fn cic(grid: &DepositGrid, widths: &[f64; 3], p: [f64; 3], v: f64, out: &mut [f64]) {
    // Position in cell units, measured from the first cell centre.
    let mut lower = [0i64; 3];
    let mut frac = [0.0; 3];
    for a in 0..3 {
        let u = (p[a] - grid.left_edge[a]) / widths[a] - 0.5;
        let f = u.floor();
        lower[a] = f as i64;
        frac[a] = u - f;
    }
    for corner in 0..8 {
        let mut cell = [0usize; 3];
        let mut w = v;
        let mut inside = true;
        for a in 0..3 {
            let upper = (corner >> a) & 1 == 1;
            let i = lower[a] + i64::from(upper);
            if i < 0 || i >= grid.dims[a] as i64 {
                inside = false;
                break;
            }
            cell[a] = i as usize;
            w *= if upper { frac[a] } else { 1.0 - frac[a] };
        }
        if inside {
            out[grid.index(cell[0], cell[1], cell[2])] += w;
        }
    }
}
