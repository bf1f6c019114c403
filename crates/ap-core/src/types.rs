//! Field metadata shared between the field registry and presentation layers.

use serde::{Deserialize, Serialize};

/// Descriptive metadata for a raw or derived field.
///
/// Units are display labels only; no conversion is ever performed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldInfo {
    /// Canonical field name.
    pub name: String,
    /// Unit label (empty for dimensionless quantities).
    pub units: String,
    /// Optional display name (may contain LaTeX).
    pub display_name: Option<String>,
    /// Whether the field is best shown on a logarithmic axis.
    pub take_log: bool,
    /// Alternative names that resolve to this field.
    pub aliases: Vec<String>,
}

impl FieldInfo {
    /// Create metadata for `name` with no units and linear scaling.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), ..Self::default() }
    }

    /// Set the unit label.
    pub fn units(mut self, units: impl Into<String>) -> Self {
        self.units = units.into();
        self
    }

    /// Set the display name.
    pub fn display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = Some(display_name.into());
        self
    }

    /// Set the default log-scale preference.
    pub fn take_log(mut self, take_log: bool) -> Self {
        self.take_log = take_log;
        self
    }

    /// Add an alias.
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    /// Axis label: display name (or field name) followed by `(units)` when units are set.
    pub fn label(&self) -> String {
        let base = self.display_name.as_deref().unwrap_or(&self.name);
        if self.units.is_empty() { base.to_string() } else { format!("{base} ({})", self.units) }
    }
}
