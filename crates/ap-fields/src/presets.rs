//! Derived-field presets for particle snapshot formats.
//!
//! A preset inspects which raw fields a registry holds and registers the
//! aliases and derived fields those raw fields make possible. Nothing is
//! registered whose inputs are absent, and the order of registration never
//! changes a result because derived fields are evaluated lazily.

use ap_core::{FieldInfo, Result};
use serde::{Deserialize, Serialize};

use crate::registry::FieldRegistry;

/// Metal elements tracked by `GFM_Metals_01 ..= GFM_Metals_08` (index 00 is hydrogen).
pub const METAL_ELEMENTS: [&str; 8] = ["He", "C", "N", "O", "Ne", "Mg", "Si", "Fe"];

/// Standard atomic weights (in atomic mass units).
fn atomic_weight(element: &str) -> f64 {
    match element {
        "H" => 1.008,
        "He" => 4.002602,
        "C" => 12.011,
        "N" => 14.007,
        "O" => 15.999,
        "Ne" => 20.1797,
        "Mg" => 24.305,
        "Si" => 28.085,
        "Fe" => 55.845,
        _ => 1.0,
    }
}

/// Gas-particle fields of moving-mesh hydro snapshots (`PartType0`).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MovingMeshGas {
    /// Adiabatic index used for `pressure`.
    pub gamma: f64,
    /// Atomic mass unit in the mass unit of `density` (default: grams).
    pub atomic_mass_unit: f64,
}

impl Default for MovingMeshGas {
    fn default() -> Self {
        Self { gamma: 5.0 / 3.0, atomic_mass_unit: 1.660_539_066_60e-24 }
    }
}

/// What a preset found and registered.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SpeciesSummary {
    /// Elements with a mass-fraction field.
    pub nuclei: Vec<String>,
    /// Species with `_fraction`, `_density` and `_number_density` fields.
    pub species: Vec<String>,
    /// Every name the preset added, in registration order.
    pub registered: Vec<String>,
}

impl MovingMeshGas {
    /// Register every alias and derived field whose prerequisites are present.
    pub fn register(&self, reg: &mut FieldRegistry) -> Result<SpeciesSummary> {
        let mut out = SpeciesSummary::default();

        for (alias, raw) in [
            ("density", "Density"),
            ("metallicity", "GFM_Metallicity"),
            ("magnetic_divergence", "MagneticFieldDivergence"),
            ("smoothing_length", "SmoothingLength"),
        ] {
            if reg.alias_if_available(alias, raw) {
                out.registered.push(alias.to_string());
            }
        }
        for (i, axis) in ["x", "y", "z"].iter().enumerate() {
            let alias = format!("particle_magnetic_field_{axis}");
            if reg.alias_if_available(&alias, &format!("MagneticField_{i}")) {
                out.registered.push(alias);
            }
        }

        let pressure = format!("({:e} - 1.0) * density * InternalEnergy", self.gamma);
        self.derive(reg, &mut out, FieldInfo::new("pressure").take_log(true), &pressure)?;

        // Element mass fractions: GFM_Metals_00 is hydrogen, then the metals in order.
        let elements = std::iter::once("H").chain(METAL_ELEMENTS);
        for (i, element) in elements.enumerate() {
            let alias = format!("{element}_fraction");
            if reg.alias_if_available(&alias, &format!("GFM_Metals_{i:02}")) {
                out.nuclei.push(element.to_string());
                out.registered.push(alias);
            }
        }
        if out.nuclei.is_empty() {
            return Ok(out);
        }

        out.species.push("H".to_string());
        if reg.contains("NeutralHydrogenAbundance") {
            self.derive(
                reg,
                &mut out,
                FieldInfo::new("H_p0_fraction"),
                "H_fraction * NeutralHydrogenAbundance",
            )?;
            self.derive(
                reg,
                &mut out,
                FieldInfo::new("H_p1_fraction"),
                "H_fraction * (1.0 - NeutralHydrogenAbundance)",
            )?;
            out.species.extend(["H_p0".to_string(), "H_p1".to_string()]);
        }
        out.species.extend(out.nuclei.iter().filter(|n| *n != "H").cloned());

        let species = out.species.clone();
        for s in &species {
            let element = s.split('_').next().unwrap_or(s);
            let mass = atomic_weight(element) * self.atomic_mass_unit;
            self.derive(
                reg,
                &mut out,
                FieldInfo::new(format!("{s}_density")).take_log(true),
                &format!("density * {s}_fraction"),
            )?;
            self.derive(
                reg,
                &mut out,
                FieldInfo::new(format!("{s}_number_density")).take_log(true),
                &format!("{s}_density / {mass:e}"),
            )?;
        }

        if reg.alias_if_available("H_nuclei_density", "H_number_density") {
            out.registered.push("H_nuclei_density".to_string());
        }
        self.derive(
            reg,
            &mut out,
            FieldInfo::new("El_number_density").take_log(true),
            "ElectronAbundance * H_number_density",
        )?;

        log::debug!(
            "moving-mesh gas preset: {} nuclei, {} species, {} fields registered",
            out.nuclei.len(),
            out.species.len(),
            out.registered.len()
        );
        Ok(out)
    }

    fn derive(
        &self,
        reg: &mut FieldRegistry,
        out: &mut SpeciesSummary,
        info: FieldInfo,
        expression: &str,
    ) -> Result<()> {
        let name = info.name.clone();
        if reg.add_derived_if_available(info, expression)? {
            out.registered.push(name);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ColumnSource;
    use ap_core::DataSource;
    use approx::assert_relative_eq;

    fn gas(with_abundances: bool) -> ColumnSource {
        let mut src = ColumnSource::new();
        src.insert("Density", vec![2.0, 4.0]).unwrap();
        src.insert("InternalEnergy", vec![3.0, 1.5]).unwrap();
        src.insert("GFM_Metals_00", vec![0.75, 0.7]).unwrap();
        src.insert("GFM_Metals_01", vec![0.24, 0.28]).unwrap();
        if with_abundances {
            src.insert("NeutralHydrogenAbundance", vec![0.5, 1.0]).unwrap();
            src.insert("ElectronAbundance", vec![1.1, 0.0]).unwrap();
        }
        src
    }

    #[test]
    fn registers_only_what_prerequisites_allow() {
        let mut src = gas(false);
        let preset = MovingMeshGas::default();
        let summary = preset.register(src.registry_mut()).unwrap();

        assert_eq!(summary.nuclei, vec!["H", "He"]);
        assert_eq!(summary.species, vec!["H", "He"]);
        assert!(src.has_field("pressure"));
        assert!(src.has_field("He_number_density"));
        assert!(!src.has_field("H_p0_fraction"));
        assert!(!src.has_field("El_number_density"));
        assert!(!src.has_field("metallicity"));

        let p = src.field("pressure").unwrap();
        assert_relative_eq!(p[0], (5.0 / 3.0 - 1.0) * 2.0 * 3.0, epsilon = 1e-12);
    }

    #[test]
    fn raw_columns_win_over_derived_definitions() {
        let mut src = gas(false);
        src.insert("pressure", vec![7.0, 7.0]).unwrap();
        src.insert("H_density", vec![0.5, 0.25]).unwrap();
        let summary = MovingMeshGas::default().register(src.registry_mut()).unwrap();

        assert!(!summary.registered.iter().any(|n| n == "pressure" || n == "H_density"));
        assert!(summary.registered.iter().any(|n| n == "He_density"));
        assert_eq!(&*src.field("pressure").unwrap(), &[7.0, 7.0]);
        assert_eq!(&*src.field("H_density").unwrap(), &[0.5, 0.25]);
    }

    #[test]
    fn ionization_species() {
        let mut src = gas(true);
        let preset = MovingMeshGas { gamma: 1.4, atomic_mass_unit: 1.0 };
        let summary = preset.register(src.registry_mut()).unwrap();

        assert_eq!(summary.species, vec!["H", "H_p0", "H_p1", "He"]);
        let p0 = src.field("H_p0_fraction").unwrap();
        let p1 = src.field("H_p1_fraction").unwrap();
        assert_relative_eq!(p0[0], 0.375, epsilon = 1e-12);
        assert_relative_eq!(p1[0], 0.375, epsilon = 1e-12);
        assert_relative_eq!(p1[1], 0.0, epsilon = 1e-12);

        let nh = src.field("H_nuclei_density").unwrap();
        assert_relative_eq!(nh[0], 2.0 * 0.75 / 1.008, epsilon = 1e-12);
        let ne = src.field("El_number_density").unwrap();
        assert_relative_eq!(ne[0], 1.1 * 2.0 * 0.75 / 1.008, epsilon = 1e-12);

        let pressure = src.field("pressure").unwrap();
        assert_relative_eq!(pressure[1], 0.4 * 4.0 * 1.5, epsilon = 1e-12);
    }
}
