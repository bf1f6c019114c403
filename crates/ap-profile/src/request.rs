//! Profile request configuration.

use std::collections::BTreeMap;

use ap_core::{Error, FieldInfo, Result};
use serde::{Deserialize, Serialize};

use crate::binning::BinScale;

/// Default number of bins per axis.
pub const DEFAULT_N_BINS: usize = 64;

/// Bin counts: one value for every axis, or one per axis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NBins {
    /// Same count on every axis.
    Uniform(usize),
    /// One count per binning field, in order.
    PerAxis(Vec<usize>),
}

impl Default for NBins {
    fn default() -> Self {
        NBins::Uniform(DEFAULT_N_BINS)
    }
}

impl NBins {
    /// Expand to one count per axis, validating length and positivity.
    pub fn per_axis(&self, ndim: usize) -> Result<Vec<usize>> {
        let counts = match self {
            NBins::Uniform(n) => vec![*n; ndim],
            NBins::PerAxis(v) if v.len() == ndim => v.clone(),
            NBins::PerAxis(v) => {
                return Err(Error::Configuration(format!(
                    "{} bin counts given for {ndim} bin fields",
                    v.len()
                )));
            }
        };
        if let Some(i) = counts.iter().position(|&n| n == 0) {
            return Err(Error::Configuration(format!("n_bins for axis {i} must be at least 1")));
        }
        Ok(counts)
    }
}

/// Cumulative-sum post-processing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Accumulation {
    /// `false`: none. `true`: along the last binning axis.
    Flag(bool),
    /// One flag per binning axis.
    PerAxis(Vec<bool>),
}

impl Default for Accumulation {
    fn default() -> Self {
        Accumulation::Flag(false)
    }
}

impl Accumulation {
    /// Expand to one flag per axis.
    pub fn per_axis(&self, ndim: usize) -> Result<Vec<bool>> {
        match self {
            Accumulation::Flag(on) => {
                let mut flags = vec![false; ndim];
                if let Some(last) = flags.last_mut() {
                    *last = *on;
                }
                Ok(flags)
            }
            Accumulation::PerAxis(v) if v.len() == ndim => Ok(v.clone()),
            Accumulation::PerAxis(v) => Err(Error::Configuration(format!(
                "{} accumulation flags given for {ndim} bin fields",
                v.len()
            ))),
        }
    }
}

/// Log/linear choice for binning fields.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LogScale {
    /// Use each field's `take_log` metadata (linear when unknown).
    #[default]
    Auto,
    /// Same choice for every binning field.
    All(bool),
    /// Per-field choice; unlisted fields fall back to `Auto`.
    PerField(BTreeMap<String, bool>),
}

impl LogScale {
    /// Scale for `field` given its metadata.
    pub fn scale_for(&self, field: &str, info: Option<&FieldInfo>) -> BinScale {
        let auto = || info.map(|fi| fi.take_log).unwrap_or(false);
        let log = match self {
            LogScale::Auto => auto(),
            LogScale::All(b) => *b,
            LogScale::PerField(m) => m.get(field).copied().unwrap_or_else(auto),
        };
        if log { BinScale::Log } else { BinScale::Linear }
    }
}

/// Everything [`crate::create_profile`] needs besides the data source.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileRequest {
    /// One or two binning fields.
    pub bin_fields: Vec<String>,
    /// Dependent fields to aggregate (duplicates are collapsed).
    pub fields: Vec<String>,
    /// Bins per axis.
    pub n_bins: NBins,
    /// Weight field; `None` sums values per bin.
    pub weight_field: Option<String>,
    /// Cumulative-sum post-processing.
    pub accumulation: Accumulation,
    /// Log/linear edge spacing.
    pub log_scale: LogScale,
    /// Explicit physical `[min, max]` per binning field.
    pub ranges: BTreeMap<String, [f64; 2]>,
    /// Aggregate in parallel chunks of this many elements.
    pub chunk_size: Option<usize>,
}

/// A validated request, expanded per axis.
#[derive(Debug, Clone)]
pub(crate) struct Plan {
    pub n_bins: Vec<usize>,
    pub fields: Vec<String>,
    pub accumulate: Vec<bool>,
}

impl ProfileRequest {
    /// Request binning `fields` by `bin_fields` with default settings (64 bins, unweighted).
    pub fn new<B, F>(bin_fields: B, fields: F) -> Self
    where
        B: IntoIterator,
        B::Item: Into<String>,
        F: IntoIterator,
        F::Item: Into<String>,
    {
        Self {
            bin_fields: bin_fields.into_iter().map(Into::into).collect(),
            fields: fields.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Same bin count on every axis.
    pub fn n_bins(mut self, n: usize) -> Self {
        self.n_bins = NBins::Uniform(n);
        self
    }

    /// One bin count per axis.
    pub fn n_bins_per_axis(mut self, n: Vec<usize>) -> Self {
        self.n_bins = NBins::PerAxis(n);
        self
    }

    /// Weighted mean by `field`.
    pub fn weight(mut self, field: impl Into<String>) -> Self {
        self.weight_field = Some(field.into());
        self
    }

    /// Plain per-bin sums.
    pub fn unweighted(mut self) -> Self {
        self.weight_field = None;
        self
    }

    /// Accumulate along the last axis.
    pub fn accumulate(mut self, on: bool) -> Self {
        self.accumulation = Accumulation::Flag(on);
        self
    }

    /// Accumulate along each flagged axis.
    pub fn accumulate_axes(mut self, flags: Vec<bool>) -> Self {
        self.accumulation = Accumulation::PerAxis(flags);
        self
    }

    /// Force log (or linear) spacing for every axis.
    pub fn log_all(mut self, log: bool) -> Self {
        self.log_scale = LogScale::All(log);
        self
    }

    /// Force log (or linear) spacing for one binning field.
    pub fn log(mut self, field: impl Into<String>, log: bool) -> Self {
        let mut map = match std::mem::take(&mut self.log_scale) {
            LogScale::PerField(m) => m,
            LogScale::All(b) => {
                self.bin_fields.iter().map(|f| (f.clone(), b)).collect::<BTreeMap<_, _>>()
            }
            LogScale::Auto => BTreeMap::new(),
        };
        map.insert(field.into(), log);
        self.log_scale = LogScale::PerField(map);
        self
    }

    /// Explicit physical range for one binning field.
    pub fn range(mut self, field: impl Into<String>, min: f64, max: f64) -> Self {
        self.ranges.insert(field.into(), [min, max]);
        self
    }

    /// Aggregate in parallel chunks.
    pub fn chunk_size(mut self, n: usize) -> Self {
        self.chunk_size = Some(n);
        self
    }

    pub(crate) fn plan(&self) -> Result<Plan> {
        let ndim = self.bin_fields.len();
        match ndim {
            0 => return Err(Error::Configuration("at least one bin field is required".into())),
            1 | 2 => {}
            n => return Err(Error::Dimensionality(n)),
        }
        let n_bins = self.n_bins.per_axis(ndim)?;

        if self.fields.is_empty() {
            return Err(Error::Configuration("at least one dependent field is required".into()));
        }
        let mut fields: Vec<String> = Vec::with_capacity(self.fields.len());
        for f in &self.fields {
            if !fields.contains(f) {
                fields.push(f.clone());
            }
        }

        let accumulate = self.accumulation.per_axis(ndim)?;

        if let Some(name) = self.ranges.keys().find(|k| !self.bin_fields.contains(*k)) {
            let msg = format!("range given for non-binning field '{name}'");
            return Err(Error::Configuration(msg));
        }
        for (name, [lo, hi]) in &self.ranges {
            if !(lo.is_finite() && hi.is_finite() && lo < hi) {
                return Err(Error::Configuration(format!(
                    "range for '{name}' must satisfy min < max, got [{lo}, {hi}]"
                )));
            }
        }
        if self.chunk_size == Some(0) {
            return Err(Error::Configuration("chunk_size must be at least 1".into()));
        }

        Ok(Plan { n_bins, fields, accumulate })
    }
}
