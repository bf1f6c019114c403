use std::time::{SystemTime, UNIX_EPOCH};

use ap_core::{Error, Result};
use ap_profile::BinScale;
use serde::Serialize;

use crate::style::LineStyle;

/// Schema tag of [`ProfilePlotArtifact`].
pub const PROFILE_PLOT_SCHEMA: &str = "astroprof_profile_plot_v1";
/// Schema tag of [`PhasePlotArtifact`].
pub const PHASE_PLOT_SCHEMA: &str = "astroprof_phase_plot_v1";

/// Provenance block shared by all artifacts.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArtifactMeta {
    /// Producing tool.
    pub tool: String,
    /// Producing tool version.
    pub tool_version: String,
    /// Creation time (milliseconds since the Unix epoch).
    pub created_unix_ms: u128,
}

impl ArtifactMeta {
    /// Metadata stamped with the current time.
    pub fn now() -> Result<Self> {
        Ok(Self {
            tool: "astroprof".to_string(),
            tool_version: ap_core::VERSION.to_string(),
            created_unix_ms: now_unix_ms()?,
        })
    }
}

fn now_unix_ms() -> Result<u128> {
    let d = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| Error::Io(std::io::Error::other(format!("system time error: {e}"))))?;
    Ok(d.as_millis())
}

/// Line plots of one or more 1D profiles, one panel per dependent field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProfilePlotArtifact {
    /// Always [`PROFILE_PLOT_SCHEMA`].
    pub schema_version: String,
    /// Provenance.
    pub meta: ArtifactMeta,
    /// Panels in field-name order.
    pub panels: Vec<ProfilePanel>,
}

/// One dependent field plotted against the binning field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProfilePanel {
    /// Dependent field.
    pub field: String,
    /// Binning field.
    pub x_field: String,
    /// X axis label.
    pub x_title: String,
    /// Y axis label.
    pub y_title: String,
    /// X axis scale.
    pub x_scale: BinScale,
    /// Y axis scale.
    pub y_scale: BinScale,
    /// One line per profile, in profile order.
    pub series: Vec<ProfileSeries>,
}

impl ProfilePanel {
    pub(crate) fn empty(field: &str) -> Self {
        Self {
            field: field.to_string(),
            x_field: String::new(),
            x_title: String::new(),
            y_title: String::new(),
            x_scale: BinScale::Linear,
            y_scale: BinScale::Linear,
            series: Vec::new(),
        }
    }
}

/// One profile's line in a panel.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProfileSeries {
    /// Legend label.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Renderer line properties.
    pub style: LineStyle,
    /// Left bin edges.
    pub x: Vec<f64>,
    /// Bin values aligned with `x`.
    pub y: Vec<f64>,
    /// Bins that received weight.
    pub used: Vec<bool>,
}

/// Colour-mapped images of one 2D profile, one panel per dependent field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PhasePlotArtifact {
    /// Always [`PHASE_PLOT_SCHEMA`].
    pub schema_version: String,
    /// Provenance.
    pub meta: ArtifactMeta,
    /// X binning field.
    pub x_field: String,
    /// Y binning field.
    pub y_field: String,
    /// X bin edges (`nx + 1`).
    pub x_edges: Vec<f64>,
    /// Y bin edges (`ny + 1`).
    pub y_edges: Vec<f64>,
    /// X axis scale.
    pub x_scale: BinScale,
    /// Y axis scale.
    pub y_scale: BinScale,
    /// X axis label.
    pub x_title: String,
    /// Y axis label.
    pub y_title: String,
    /// Per-bin usage mask, `used[ix][iy]`.
    pub used: Vec<Vec<bool>>,
    /// Panels in field-name order.
    pub panels: Vec<PhasePanel>,
}

/// One dependent field as an image.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PhasePanel {
    /// Dependent field.
    pub field: String,
    /// Colorbar label.
    pub title: String,
    /// Colormap name.
    pub cmap: String,
    /// Colorbar normalisation: `"log10"` or `"linear"`.
    pub norm: String,
    /// Colour limits; `None` when no bin has a plottable value.
    pub z_range: Option<[f64; 2]>,
    /// Values, `z[ix][iy]`.
    pub z: Vec<Vec<f64>>,
}

impl PhasePanel {
    pub(crate) fn empty(field: &str) -> Self {
        Self {
            field: field.to_string(),
            title: String::new(),
            cmap: String::new(),
            norm: String::new(),
            z_range: None,
            z: Vec::new(),
        }
    }
}
