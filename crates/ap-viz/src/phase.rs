use std::collections::BTreeMap;

use ap_core::{DataSource, Error, FieldInfo, Result};
use ap_profile::{Profile, ProfileRequest, create_profile};
use serde::{Deserialize, Serialize};

use crate::artifact::{ArtifactMeta, PHASE_PLOT_SCHEMA, PhasePanel, PhasePlotArtifact};
use crate::cache::FigureCache;
use crate::plot::{requested_field_info, scale};
use crate::state::PlotState;

/// Colormap used when none is set.
pub const DEFAULT_CMAP: &str = "algae";

/// Settings for [`PhasePlot::new`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhasePlotOptions {
    /// Bins along x.
    pub x_bins: usize,
    /// Bins along y.
    pub y_bins: usize,
    /// Weight field for weighted means; `None` plots per-bin sums.
    pub weight_field: Option<String>,
}

impl Default for PhasePlotOptions {
    fn default() -> Self {
        Self { x_bins: 128, y_bins: 128, weight_field: Some("cell_mass".to_string()) }
    }
}

impl PhasePlotOptions {
    /// Bins per axis.
    pub fn bins(mut self, x_bins: usize, y_bins: usize) -> Self {
        self.x_bins = x_bins;
        self.y_bins = y_bins;
        self
    }

    /// Weighted means by `field`.
    pub fn weight(mut self, field: impl Into<String>) -> Self {
        self.weight_field = Some(field.into());
        self
    }

    /// Per-bin sums.
    pub fn unweighted(mut self) -> Self {
        self.weight_field = None;
        self
    }
}

/// Colour-mapped 2D profile, one panel per dependent field.
#[derive(Debug, Clone)]
pub struct PhasePlot {
    profile: Profile,
    field_info: BTreeMap<String, FieldInfo>,
    x_log: Option<bool>,
    y_log: Option<bool>,
    z_log: BTreeMap<String, bool>,
    x_title: Option<String>,
    y_title: Option<String>,
    z_title: BTreeMap<String, String>,
    cmap: BTreeMap<String, String>,
    zlim: BTreeMap<String, [f64; 2]>,
    state: PlotState,
    panels: FigureCache<String, PhasePanel>,
}

impl PhasePlot {
    /// Profile `z_fields` on an `x_field` × `y_field` grid and plot the result.
    pub fn new<S, I>(
        source: &S,
        x_field: &str,
        y_field: &str,
        z_fields: I,
        options: PhasePlotOptions,
    ) -> Result<Self>
    where
        S: DataSource + ?Sized,
        I: IntoIterator,
        I::Item: Into<String>,
    {
        let z_fields: Vec<String> = z_fields.into_iter().map(Into::into).collect();
        let mut request = ProfileRequest::new([x_field, y_field], z_fields.iter().cloned())
            .n_bins_per_axis(vec![options.x_bins, options.y_bins]);
        request.weight_field = options.weight_field;
        let profile = create_profile(source, &request)?;

        let mut plot = Self::from_profile(profile)?;
        plot.field_info = [x_field, y_field]
            .into_iter()
            .chain(z_fields.iter().map(String::as_str))
            .filter_map(|f| requested_field_info(source, f).map(|fi| (f.to_string(), fi)))
            .collect();
        plot.rebuild();
        Ok(plot)
    }

    /// Plot an existing 2D profile.
    pub fn from_profile(profile: Profile) -> Result<Self> {
        if profile.ndim() != 2 {
            return Err(Error::Dimensionality(profile.ndim()));
        }
        let mut plot = Self {
            profile,
            field_info: BTreeMap::new(),
            x_log: None,
            y_log: None,
            z_log: BTreeMap::new(),
            x_title: None,
            y_title: None,
            z_title: BTreeMap::new(),
            cmap: BTreeMap::new(),
            zlim: BTreeMap::new(),
            state: PlotState::Invalid,
            panels: FigureCache::new(|f: &String| PhasePanel::empty(f)),
        };
        plot.rebuild();
        Ok(plot)
    }

    /// Attach metadata used for default scales and titles.
    pub fn with_field_info(mut self, info: FieldInfo) -> Self {
        self.field_info.insert(info.name.clone(), info);
        self.state.invalidate();
        self
    }

    /// Current state.
    pub fn state(&self) -> PlotState {
        self.state
    }

    /// Plotted profile.
    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    /// Force the colorbar scale of one field.
    pub fn set_log(&mut self, field: &str, log: bool) -> Result<&mut Self> {
        self.check_field(field)?;
        self.z_log.insert(field.to_string(), log);
        self.state.invalidate();
        Ok(self)
    }

    /// Force the x scale.
    pub fn set_x_log(&mut self, log: bool) -> &mut Self {
        self.x_log = Some(log);
        self.state.invalidate();
        self
    }

    /// Force the y scale.
    pub fn set_y_log(&mut self, log: bool) -> &mut Self {
        self.y_log = Some(log);
        self.state.invalidate();
        self
    }

    /// Colormap of one field.
    pub fn set_cmap(&mut self, field: &str, cmap: impl Into<String>) -> Result<&mut Self> {
        self.check_field(field)?;
        self.cmap.insert(field.to_string(), cmap.into());
        self.state.invalidate();
        Ok(self)
    }

    /// Colour limits of one field.
    pub fn set_zlim(&mut self, field: &str, min: f64, max: f64) -> Result<&mut Self> {
        self.check_field(field)?;
        if !(min.is_finite() && max.is_finite() && min < max) {
            return Err(Error::Configuration(format!(
                "zlim for '{field}' must satisfy min < max, got [{min}, {max}]"
            )));
        }
        self.zlim.insert(field.to_string(), [min, max]);
        self.state.invalidate();
        Ok(self)
    }

    /// Colorbar title of one field.
    pub fn set_title(&mut self, field: &str, title: impl Into<String>) -> Result<&mut Self> {
        self.check_field(field)?;
        self.z_title.insert(field.to_string(), title.into());
        self.state.invalidate();
        Ok(self)
    }

    /// X axis title.
    pub fn set_x_title(&mut self, title: impl Into<String>) -> &mut Self {
        self.x_title = Some(title.into());
        self.state.invalidate();
        self
    }

    /// Y axis title.
    pub fn set_y_title(&mut self, title: impl Into<String>) -> &mut Self {
        self.y_title = Some(title.into());
        self.state.invalidate();
        self
    }

    /// Plot-friendly artifact; rebuilds the panels first when invalid.
    pub fn artifact(&mut self) -> Result<PhasePlotArtifact> {
        if !self.state.is_valid() {
            self.rebuild();
        }
        let [x_axis, y_axis] = [&self.profile.axes()[0], &self.profile.axes()[1]];
        let x_scale = self.x_log.map_or(x_axis.scale(), scale);
        let y_scale = self.y_log.map_or(y_axis.scale(), scale);
        Ok(PhasePlotArtifact {
            schema_version: PHASE_PLOT_SCHEMA.to_string(),
            meta: ArtifactMeta::now()?,
            x_field: x_axis.field().to_string(),
            y_field: y_axis.field().to_string(),
            x_edges: x_axis.edges().to_vec(),
            y_edges: y_axis.edges().to_vec(),
            x_scale,
            y_scale,
            x_title: self.x_title.clone().unwrap_or_else(|| self.title(x_axis.field())),
            y_title: self.y_title.clone().unwrap_or_else(|| self.title(y_axis.field())),
            used: rows(self.profile.used(), y_axis.n_bins()),
            panels: self.panels.values().cloned().collect(),
        })
    }

    fn check_field(&self, field: &str) -> Result<()> {
        match self.profile.field(field) {
            Some(_) => Ok(()),
            None => Err(Error::FieldNotFound(field.to_string())),
        }
    }

    fn title(&self, field: &str) -> String {
        self.field_info.get(field).cloned().unwrap_or_else(|| FieldInfo::new(field)).label()
    }

    fn rebuild(&mut self) {
        self.panels.clear();
        let ny = self.profile.axes()[1].n_bins();
        let used = self.profile.used();
        for fv in self.profile.fields() {
            let log = self
                .z_log
                .get(&fv.name)
                .copied()
                .unwrap_or_else(|| self.field_info.get(&fv.name).is_none_or(|fi| fi.take_log));
            let z_range =
                self.zlim.get(&fv.name).copied().or_else(|| z_range(&fv.values, used, log));
            let title = self.z_title.get(&fv.name).cloned().unwrap_or_else(|| self.title(&fv.name));
            let cmap = self.cmap.get(&fv.name).cloned().unwrap_or_else(|| DEFAULT_CMAP.to_string());

            let panel = self.panels.get_or_create(&fv.name);
            panel.title = title;
            panel.cmap = cmap;
            panel.norm = if log { "log10" } else { "linear" }.to_string();
            panel.z_range = z_range;
            panel.z = rows(&fv.values, ny);
        }
        log::debug!("phase plot rebuilt: {} panels", self.panels.len());
        self.state.validate();
    }
}

/// `[min, max]` over used bins; log panels only consider positive values.
fn z_range(values: &[f64], used: &[bool], log: bool) -> Option<[f64; 2]> {
    values
        .iter()
        .zip(used)
        .filter(|&(&v, &u)| u && v.is_finite() && (!log || v > 0.0))
        .map(|(&v, _)| v)
        .fold(None, |acc, v| match acc {
            None => Some([v, v]),
            Some([lo, hi]) => Some([lo.min(v), hi.max(v)]),
        })
}

fn rows<T: Clone>(flat: &[T], ny: usize) -> Vec<Vec<T>> {
    flat.chunks(ny).map(<[T]>::to_vec).collect()
}
