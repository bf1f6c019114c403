//! Core traits for astroprof
//!
//! The profile engine, deposition and plot models only ever see a
//! [`DataSource`]: a fixed set of elements (particles or cells) exposing
//! named numeric fields of equal length. Whether a field is read from disk,
//! held in memory or derived on demand is the implementor's business.

use std::borrow::Cow;
use std::collections::HashMap;

use crate::{Error, FieldInfo, Result};

/// Provider of named `f64` fields over a fixed number of elements.
pub trait DataSource {
    /// Number of elements. Every field has exactly this length.
    fn len(&self) -> usize;

    /// `true` when the source holds no elements.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Values of a raw or derived field.
    ///
    /// Returns [`Error::FieldNotFound`] for unknown names.
    fn field(&self, name: &str) -> Result<Cow<'_, [f64]>>;

    /// Whether `name` resolves to a raw or derived field.
    fn has_field(&self, name: &str) -> bool;

    /// Metadata for `name`, if known.
    fn field_info(&self, _name: &str) -> Option<FieldInfo> {
        None
    }
}

/// Plain column maps act as sources; the element count is taken from any column.
impl DataSource for HashMap<String, Vec<f64>> {
    fn len(&self) -> usize {
        self.values().next().map(|v| v.len()).unwrap_or(0)
    }

    fn field(&self, name: &str) -> Result<Cow<'_, [f64]>> {
        self.get(name)
            .map(|v| Cow::Borrowed(v.as_slice()))
            .ok_or_else(|| Error::FieldNotFound(name.to_string()))
    }

    fn has_field(&self, name: &str) -> bool {
        self.contains_key(name)
    }
}
