//! In-memory data source: raw columns plus a [`FieldRegistry`].

use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use ap_core::{DataSource, Error, FieldInfo, Result};
use serde::Deserialize;

use crate::registry::{FieldEntry, FieldRegistry};
use crate::vector::VectorLayout;

/// On-disk JSON column file.
///
/// ```json
/// {
///   "fields": {"density": [1.0, 2.0], "InternalEnergy": [3.0, 4.0]},
///   "vectors": {"Coordinates": [0.1, 0.2, 0.3, 0.4, 0.5, 0.6]},
///   "derived": {"pressure": "(5/3 - 1) * density * InternalEnergy"},
///   "units": {"density": "g/cm**3"},
///   "log_fields": ["density"]
/// }
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ColumnFile {
    /// Raw columns (all the same length).
    pub fields: BTreeMap<String, Vec<f64>>,
    /// Interleaved vector columns, split into `name_0 .. name_{k-1}`.
    pub vectors: BTreeMap<String, Vec<f64>>,
    /// Component counts for vector fields missing from the default layout.
    pub components: BTreeMap<String, usize>,
    /// Derived fields as `name → expression`.
    pub derived: BTreeMap<String, String>,
    /// Unit labels by field name.
    pub units: BTreeMap<String, String>,
    /// Fields that prefer a logarithmic axis.
    pub log_fields: Vec<String>,
    /// Alias → target.
    pub aliases: BTreeMap<String, String>,
}

/// Data source holding raw columns in memory.
///
/// Derived fields are evaluated each time they are requested.
#[derive(Debug, Clone, Default)]
pub struct ColumnSource {
    n_elements: Option<usize>,
    columns: HashMap<String, Vec<f64>>,
    registry: FieldRegistry,
}

impl ColumnSource {
    /// Empty source; the element count is fixed by the first inserted column.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a JSON column file.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let file: ColumnFile = serde_json::from_str(json)?;
        Self::from_column_file(file)
    }

    /// Load a JSON column file from disk.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let src = Self::from_json_str(&text)?;
        log::debug!(
            "loaded {} elements, {} raw fields from {}",
            src.len(),
            src.columns.len(),
            path.display()
        );
        Ok(src)
    }

    /// Build from an already-parsed column file.
    pub fn from_column_file(file: ColumnFile) -> Result<Self> {
        let mut src = Self::new();
        for (name, values) in file.fields {
            src.insert(name, values)?;
        }
        let layout = file
            .components
            .into_iter()
            .fold(VectorLayout::meshless_snapshot(), |layout, (name, k)| layout.with(name, k));
        for (name, flat) in &file.vectors {
            src.insert_vector(&layout, name, flat)?;
        }
        for (name, expr) in &file.derived {
            src.add_derived(name, expr)?;
        }
        for (alias, target) in file.aliases {
            src.registry.alias(alias, target);
        }
        for (name, units) in file.units {
            src.update_info(&name, |fi| fi.units = units)?;
        }
        for name in &file.log_fields {
            src.update_info(name, |fi| fi.take_log = true)?;
        }
        Ok(src)
    }

    /// Add (or replace) a raw column.
    pub fn insert(&mut self, name: impl Into<String>, values: Vec<f64>) -> Result<()> {
        let name = name.into();
        match self.n_elements {
            Some(n) if n != values.len() => {
                return Err(Error::Configuration(format!(
                    "column '{name}' has {} values, source has {n} elements",
                    values.len()
                )));
            }
            _ => self.n_elements = Some(values.len()),
        }
        if self.registry.info(&name).is_none() {
            self.registry.add_raw(FieldInfo::new(name.clone()));
        }
        self.columns.insert(name, values);
        Ok(())
    }

    /// Add a raw column with explicit metadata.
    pub fn insert_with_info(&mut self, info: FieldInfo, values: Vec<f64>) -> Result<()> {
        self.insert(info.name.clone(), values)?;
        self.registry.add_raw(info);
        Ok(())
    }

    /// Split an interleaved vector column into its components and insert them
    /// as `name_0 .. name_{k-1}`.
    pub fn insert_vector(&mut self, layout: &VectorLayout, name: &str, flat: &[f64]) -> Result<()> {
        for (component, values) in layout.split(name, flat)? {
            self.insert(component, values)?;
        }
        Ok(())
    }

    /// Register a derived field (no prerequisite check).
    pub fn add_derived(&mut self, name: &str, expression: &str) -> Result<()> {
        self.registry.add_derived(FieldInfo::new(name), expression)
    }

    /// Field registry.
    pub fn registry(&self) -> &FieldRegistry {
        &self.registry
    }

    /// Mutable field registry, for presets and aliases.
    pub fn registry_mut(&mut self) -> &mut FieldRegistry {
        &mut self.registry
    }

    fn update_info(&mut self, name: &str, f: impl FnOnce(&mut FieldInfo)) -> Result<()> {
        let canonical = self.registry.resolve(name)?.name.to_string();
        let mut info = self.registry.info(&canonical).cloned().unwrap_or_default();
        f(&mut info);
        info.name = canonical;
        self.registry.set_info(info)
    }

    fn evaluate(&self, name: &str, stack: &mut Vec<String>) -> Result<Cow<'_, [f64]>> {
        let resolved = self.registry.resolve(name)?;
        match resolved.entry {
            FieldEntry::Raw => self
                .columns
                .get(resolved.name)
                .map(|v| Cow::Borrowed(v.as_slice()))
                .ok_or_else(|| Error::FieldNotFound(name.to_string())),
            FieldEntry::Derived(expr) => {
                if stack.iter().any(|s| s == resolved.name) {
                    return Err(Error::Expression(format!(
                        "derived field '{}' depends on itself",
                        resolved.name
                    )));
                }
                stack.push(resolved.name.to_string());
                let inputs = expr
                    .required_fields
                    .iter()
                    .map(|dep| self.evaluate(dep, stack))
                    .collect::<Result<Vec<_>>>()?;
                stack.pop();
                let cols: Vec<&[f64]> = inputs.iter().map(|c| c.as_ref()).collect();
                Ok(Cow::Owned(expr.eval_columns(&cols, self.len())))
            }
            FieldEntry::Alias(_) => unreachable!("resolve() never returns aliases"),
        }
    }
}

impl DataSource for ColumnSource {
    fn len(&self) -> usize {
        self.n_elements.unwrap_or(0)
    }

    fn field(&self, name: &str) -> Result<Cow<'_, [f64]>> {
        self.evaluate(name, &mut Vec::new())
    }

    fn has_field(&self, name: &str) -> bool {
        match self.registry.raw_prerequisites(name) {
            Ok(raw) => raw.iter().all(|f| self.columns.contains_key(f)),
            Err(_) => false,
        }
    }

    fn field_info(&self, name: &str) -> Option<FieldInfo> {
        self.registry.info(name).cloned()
    }
}
