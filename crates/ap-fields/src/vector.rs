//! Component layout of vector-valued raw fields.
//!
//! Particle files store vector quantities (positions, velocities, magnetic
//! field, multi-group photon energies) as interleaved `N × k` arrays. The
//! layout records `k` per field name so readers can split them into
//! scalar components.

use std::collections::BTreeMap;

use ap_core::{Error, Result};

/// Field name → number of components.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VectorLayout {
    sizes: BTreeMap<String, usize>,
}

impl VectorLayout {
    /// Layout with no vector fields.
    pub fn new() -> Self {
        Self::default()
    }

    /// Layout used by meshless hydro snapshot files.
    pub fn meshless_snapshot() -> Self {
        Self::new()
            .with("Coordinates", 3)
            .with("Velocity", 3)
            .with("Velocities", 3)
            .with("MagneticField", 3)
            .with("FourMetalFractions", 4)
            .with("PhotonEnergy", 5)
    }

    /// Add or override a vector field.
    pub fn with(mut self, name: impl Into<String>, components: usize) -> Self {
        self.sizes.insert(name.into(), components);
        self
    }

    /// Number of components for `name` (1 for scalars).
    pub fn components(&self, name: &str) -> usize {
        self.sizes.get(name).copied().unwrap_or(1)
    }

    /// Component field names for `name`: `name_0 .. name_{k-1}`, or `[name]` for scalars.
    pub fn component_names(&self, name: &str) -> Vec<String> {
        match self.components(name) {
            1 => vec![name.to_string()],
            k => (0..k).map(|i| format!("{name}_{i}")).collect(),
        }
    }

    /// De-interleave `flat` (row-major `N × k`) into per-component columns.
    pub fn split(&self, name: &str, flat: &[f64]) -> Result<Vec<(String, Vec<f64>)>> {
        let k = self.components(name);
        if k == 0 || !flat.len().is_multiple_of(k) {
            return Err(Error::Configuration(format!(
                "vector field '{name}' has {} values, not a multiple of {k} components",
                flat.len()
            )));
        }
        let names = self.component_names(name);
        Ok(names
            .into_iter()
            .enumerate()
            .map(|(c, n)| (n, flat.iter().skip(c).step_by(k).copied().collect()))
            .collect())
    }
}
