use std::collections::BTreeMap;

use ap_core::{DataSource, Error, FieldInfo, Result};
use ap_profile::{BinScale, Profile, ProfileRequest, create_profile};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::artifact::{
    ArtifactMeta, PROFILE_PLOT_SCHEMA, ProfilePanel, ProfilePlotArtifact, ProfileSeries,
};
use crate::cache::FigureCache;
use crate::state::PlotState;
use crate::style::LineStyle;

/// Settings for [`ProfilePlot::new`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfilePlotOptions {
    /// Weight field for weighted means; `None` plots per-bin sums.
    pub weight_field: Option<String>,
    /// Number of bins.
    pub n_bins: usize,
    /// Plot cumulative sums.
    pub accumulation: bool,
    /// Legend label.
    pub label: Option<String>,
    /// Line properties.
    pub line_style: LineStyle,
}

impl Default for ProfilePlotOptions {
    fn default() -> Self {
        Self {
            weight_field: Some("cell_mass".to_string()),
            n_bins: ap_profile::request::DEFAULT_N_BINS,
            accumulation: false,
            label: None,
            line_style: LineStyle::default(),
        }
    }
}

impl ProfilePlotOptions {
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

    /// Number of bins.
    pub fn n_bins(mut self, n: usize) -> Self {
        self.n_bins = n;
        self
    }

    /// Plot cumulative sums.
    pub fn accumulation(mut self, on: bool) -> Self {
        self.accumulation = on;
        self
    }

    /// Legend label.
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Line properties.
    pub fn line_style(mut self, style: LineStyle) -> Self {
        self.line_style = style;
        self
    }
}

/// Line plots of one or more 1D profiles sharing their dependent fields.
///
/// Overrides set through the mutators win over field metadata. Every mutator
/// invalidates the plot; [`ProfilePlot::artifact`] rebuilds the panels when
/// needed.
#[derive(Debug, Clone)]
pub struct ProfilePlot {
    profiles: Vec<Profile>,
    labels: Vec<Option<String>>,
    styles: Vec<LineStyle>,
    field_info: BTreeMap<String, FieldInfo>,
    x_log: Option<bool>,
    y_log: BTreeMap<String, bool>,
    x_title: Option<String>,
    y_title: BTreeMap<String, String>,
    state: PlotState,
    panels: FigureCache<String, ProfilePanel>,
}

impl ProfilePlot {
    /// Profile `y_fields` against `x_field` and plot the result.
    pub fn new<S, I>(
        source: &S,
        x_field: &str,
        y_fields: I,
        options: ProfilePlotOptions,
    ) -> Result<Self>
    where
        S: DataSource + ?Sized,
        I: IntoIterator,
        I::Item: Into<String>,
    {
        let y_fields: Vec<String> = y_fields.into_iter().map(Into::into).collect();
        let mut request =
            ProfileRequest::new([x_field], y_fields.iter().cloned()).n_bins(options.n_bins);
        request.weight_field = options.weight_field.clone();
        let profile = create_profile(source, &request)?;

        let field_info = std::iter::once(x_field)
            .chain(y_fields.iter().map(String::as_str))
            .filter_map(|f| requested_field_info(source, f).map(|fi| (f.to_string(), fi)))
            .collect();

        let mut plot = Self::build(
            vec![profile],
            vec![options.label],
            vec![options.line_style],
            options.accumulation,
        )?;
        plot.field_info = field_info;
        plot.rebuild();
        Ok(plot)
    }

    /// Overplot already-built 1D profiles.
    ///
    /// `labels` and `styles`, when given, must have one entry per profile.
    pub fn from_profiles(
        profiles: Vec<Profile>,
        labels: Option<Vec<String>>,
        styles: Option<Vec<LineStyle>>,
    ) -> Result<Self> {
        let n = profiles.len();
        let labels = match labels {
            Some(l) if l.len() != n => {
                return Err(Error::Configuration(format!(
                    "{} labels given for {n} profiles",
                    l.len()
                )));
            }
            Some(l) => l.into_iter().map(Some).collect(),
            None => vec![None; n],
        };
        let styles = match styles {
            Some(s) if s.len() != n => {
                return Err(Error::Configuration(format!(
                    "{} line styles given for {n} profiles",
                    s.len()
                )));
            }
            Some(s) => s,
            None => vec![LineStyle::default(); n],
        };
        let mut plot = Self::build(profiles, labels, styles, false)?;
        plot.rebuild();
        Ok(plot)
    }

    fn build(
        mut profiles: Vec<Profile>,
        labels: Vec<Option<String>>,
        styles: Vec<LineStyle>,
        accumulation: bool,
    ) -> Result<Self> {
        if profiles.is_empty() {
            return Err(Error::Configuration("at least one profile is required".into()));
        }
        if let Some(p) = profiles.iter().find(|p| p.ndim() != 1) {
            return Err(Error::Dimensionality(p.ndim()));
        }
        if accumulation {
            for p in &mut profiles {
                p.accumulate(&[true])?;
            }
        }
        Ok(Self {
            profiles,
            labels,
            styles,
            field_info: BTreeMap::new(),
            x_log: None,
            y_log: BTreeMap::new(),
            x_title: None,
            y_title: BTreeMap::new(),
            state: PlotState::Invalid,
            panels: FigureCache::new(|f: &String| ProfilePanel::empty(f)),
        })
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

    /// Plotted profiles.
    pub fn profiles(&self) -> &[Profile] {
        &self.profiles
    }

    /// Set a line property on one profile's line, or on all of them when
    /// `index` is `None`.
    pub fn set_line_property(
        &mut self,
        property: &str,
        value: impl Into<Value>,
        index: Option<usize>,
    ) -> Result<&mut Self> {
        let value = value.into();
        match index {
            Some(i) => {
                let n = self.styles.len();
                let style = self.styles.get_mut(i).ok_or_else(|| {
                    Error::Configuration(format!("line index {i} out of range for {n} profiles"))
                })?;
                style.set(property, value);
            }
            None => {
                for style in &mut self.styles {
                    style.set(property, value.clone());
                }
            }
        }
        self.state.invalidate();
        Ok(self)
    }

    /// Force the y scale of one field's panel.
    pub fn set_log(&mut self, field: &str, log: bool) -> Result<&mut Self> {
        self.check_field(field)?;
        self.y_log.insert(field.to_string(), log);
        self.state.invalidate();
        Ok(self)
    }

    /// Force the x scale of every panel.
    pub fn set_x_log(&mut self, log: bool) -> &mut Self {
        self.x_log = Some(log);
        self.state.invalidate();
        self
    }

    /// Override the y title of one field's panel.
    pub fn set_title(&mut self, field: &str, title: impl Into<String>) -> Result<&mut Self> {
        self.check_field(field)?;
        self.y_title.insert(field.to_string(), title.into());
        self.state.invalidate();
        Ok(self)
    }

    /// Override the x title of every panel.
    pub fn set_x_title(&mut self, title: impl Into<String>) -> &mut Self {
        self.x_title = Some(title.into());
        self.state.invalidate();
        self
    }

    /// Plot-friendly artifact; rebuilds the panels first when invalid.
    pub fn artifact(&mut self) -> Result<ProfilePlotArtifact> {
        if !self.state.is_valid() {
            self.rebuild();
        }
        Ok(ProfilePlotArtifact {
            schema_version: PROFILE_PLOT_SCHEMA.to_string(),
            meta: ArtifactMeta::now()?,
            panels: self.panels.values().cloned().collect(),
        })
    }

    fn check_field(&self, field: &str) -> Result<()> {
        if self.profiles.iter().any(|p| p.field(field).is_some()) {
            Ok(())
        } else {
            Err(Error::FieldNotFound(field.to_string()))
        }
    }

    fn title(&self, field: &str) -> String {
        self.field_info.get(field).cloned().unwrap_or_else(|| FieldInfo::new(field)).label()
    }

    fn rebuild(&mut self) {
        self.panels.clear();
        for ((profile, label), style) in self.profiles.iter().zip(&self.labels).zip(&self.styles) {
            let axis = &profile.axes()[0];
            for fv in profile.fields() {
                let panel = self.panels.get_or_create(&fv.name);
                panel.series.push(ProfileSeries {
                    label: label.clone(),
                    style: style.clone(),
                    x: axis.left_edges().to_vec(),
                    y: fv.values.clone(),
                    used: profile.used().to_vec(),
                });
            }
        }

        // Axis settings follow the first profile's binning axis.
        let x_axis = &self.profiles[0].axes()[0];
        let x_field = x_axis.field().to_string();
        let x_scale = match self.x_log {
            Some(log) => scale(log),
            None => x_axis.scale(),
        };
        let x_title = self.x_title.clone().unwrap_or_else(|| self.title(&x_field));

        let mut settings = Vec::with_capacity(self.panels.len());
        for (name, _) in self.panels.iter() {
            let y_log = self
                .y_log
                .get(name)
                .copied()
                .unwrap_or_else(|| self.field_info.get(name).is_some_and(|fi| fi.take_log));
            let y_title = self.y_title.get(name).cloned().unwrap_or_else(|| self.title(name));
            settings.push((scale(y_log), y_title));
        }
        for ((_, panel), (y_scale, y_title)) in self.panels.iter_mut().zip(settings) {
            panel.x_field = x_field.clone();
            panel.x_title = x_title.clone();
            panel.x_scale = x_scale;
            panel.y_scale = y_scale;
            panel.y_title = y_title;
        }

        log::debug!(
            "profile plot rebuilt: {} panels, {} profiles",
            self.panels.len(),
            self.profiles.len()
        );
        self.state.validate();
    }
}

/// Metadata of `name` as the source reports it, keyed by `name` itself.
///
/// `name` may be an alias; titles then show the requested name rather than
/// the canonical one.
pub fn requested_field_info<S>(source: &S, name: &str) -> Option<FieldInfo>
where
    S: DataSource + ?Sized,
{
    let mut info = source.field_info(name)?;
    info.name = name.to_string();
    Some(info)
}

pub(crate) fn scale(log: bool) -> BinScale {
    if log { BinScale::Log } else { BinScale::Linear }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn source() -> HashMap<String, Vec<f64>> {
        let mut cols = HashMap::new();
        cols.insert("radius".to_string(), vec![0.1, 0.2, 0.6, 0.9]);
        cols.insert("density".to_string(), vec![4.0, 3.0, 2.0, 1.0]);
        cols.insert("temperature".to_string(), vec![10.0, 20.0, 30.0, 40.0]);
        cols.insert("cell_mass".to_string(), vec![1.0, 1.0, 2.0, 2.0]);
        cols
    }

    #[test]
    fn test_state_transitions() {
        let src = source();
        let mut plot = ProfilePlot::new(
            &src,
            "radius",
            ["density", "temperature"],
            ProfilePlotOptions::default().n_bins(2),
        )
        .unwrap();
        assert_eq!(plot.state(), PlotState::Valid);

        plot.set_line_property("color", "red", None).unwrap();
        assert_eq!(plot.state(), PlotState::Invalid);
        plot.set_x_log(true);
        assert_eq!(plot.state(), PlotState::Invalid);

        let art = plot.artifact().unwrap();
        assert_eq!(plot.state(), PlotState::Valid);
        assert_eq!(art.schema_version, PROFILE_PLOT_SCHEMA);
        assert_eq!(art.panels.len(), 2);
        assert_eq!(art.panels[0].x_scale, BinScale::Log);
        assert_eq!(art.panels[0].series[0].style.get("color"), Some(&Value::from("red")));

        plot.set_title("density", "rho").unwrap();
        assert!(!plot.state().is_valid());
        plot.artifact().unwrap();
        assert!(plot.state().is_valid());
    }

    #[test]
    fn test_series_use_left_edges() {
        let src = source();
        let opts = ProfilePlotOptions::default().n_bins(2).unweighted();
        let mut plot = ProfilePlot::new(&src, "radius", ["density"], opts).unwrap();
        let art = plot.artifact().unwrap();
        let series = &art.panels[0].series[0];
        let edges = plot.profiles()[0].bin_edges(0);
        assert_eq!(series.x, edges[..2].to_vec());
        assert_eq!(series.y, vec![7.0, 3.0]);
        assert_eq!(art.panels[0].x_field, "radius");
    }

    #[test]
    fn test_accumulation_at_construction() {
        let src = source();
        let opts = ProfilePlotOptions::default().n_bins(2).unweighted().accumulation(true);
        let plot = ProfilePlot::new(&src, "radius", ["density"], opts).unwrap();
        assert_eq!(plot.profiles()[0].field("density").unwrap(), &[7.0, 10.0]);
    }

    #[test]
    fn test_from_profiles_length_checks() {
        let src = source();
        let req = ProfileRequest::new(["radius"], ["density"]).n_bins(2);
        let a = create_profile(&src, &req).unwrap();
        let b = create_profile(&src, &req.clone().unweighted()).unwrap();

        let labels = Some(vec!["a".into()]);
        let err = ProfilePlot::from_profiles(vec![a.clone(), b.clone()], labels, None).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
        let err = ProfilePlot::from_profiles(vec![a.clone()], None, Some(vec![])).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));

        let labels = Some(vec!["z=1".into(), "z=0".into()]);
        let mut plot = ProfilePlot::from_profiles(vec![a, b], labels, None).unwrap();
        plot.set_line_property("linewidth", 3, Some(1)).unwrap();
        assert!(plot.set_line_property("linewidth", 3, Some(2)).is_err());
        let art = plot.artifact().unwrap();
        let series = &art.panels[0].series;
        assert_eq!(series.len(), 2);
        assert_eq!(series[1].label.as_deref(), Some("z=0"));
        assert!(series[0].style.is_empty());
        assert_eq!(series[1].style.get("linewidth"), Some(&Value::from(3)));
    }

    #[test]
    fn test_phase_profile_rejected() {
        let src = source();
        let req = ProfileRequest::new(["radius", "density"], ["temperature"]).n_bins(2);
        let p = create_profile(&src, &req).unwrap();
        let err = ProfilePlot::from_profiles(vec![p], None, None).unwrap_err();
        assert!(matches!(err, Error::Dimensionality(2)));
    }

    #[test]
    fn test_titles_and_scales_from_metadata() {
        let src = source();
        let req = ProfileRequest::new(["radius"], ["density"]).n_bins(2);
        let p = create_profile(&src, &req).unwrap();
        let mut plot = ProfilePlot::from_profiles(vec![p], None, None)
            .unwrap()
            .with_field_info(FieldInfo::new("density").units("g/cm**3").take_log(true))
            .with_field_info(FieldInfo::new("radius").display_name("r").units("kpc"));
        let art = plot.artifact().unwrap();
        let panel = &art.panels[0];
        assert_eq!(panel.y_title, "density (g/cm**3)");
        assert_eq!(panel.x_title, "r (kpc)");
        assert_eq!(panel.y_scale, BinScale::Log);
        assert_eq!(panel.x_scale, BinScale::Linear);

        plot.set_log("density", false).unwrap().set_x_title("radius");
        assert!(plot.set_log("pressure", true).is_err());
        let art = plot.artifact().unwrap();
        assert_eq!(art.panels[0].y_scale, BinScale::Linear);
        assert_eq!(art.panels[0].x_title, "radius");
    }
}
