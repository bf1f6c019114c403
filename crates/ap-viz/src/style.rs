use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Line properties handed to the renderer as-is (`color`, `linestyle`,
/// `linewidth`, `alpha`, ...).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LineStyle(BTreeMap<String, Value>);

impl LineStyle {
    /// No properties set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`LineStyle::set`].
    pub fn with(mut self, property: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(property, value);
        self
    }

    /// Set one property, replacing any previous value.
    pub fn set(&mut self, property: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(property.into(), value.into());
    }

    /// Current value of a property.
    pub fn get(&self, property: &str) -> Option<&Value> {
        self.0.get(property)
    }

    /// `true` when nothing is set.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
