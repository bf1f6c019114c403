//! # ap-viz
//!
//! Plot models for astroprof profiles.
//!
//! Nothing here draws pixels. A [`ProfilePlot`] or [`PhasePlot`] keeps the
//! profiles plus any user overrides (scales, titles, line styles, colormaps)
//! and emits a plot-friendly JSON artifact for an external renderer.

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Serializable plot artifacts.
pub mod artifact;
/// Create-on-missing panel storage.
pub mod cache;
/// 2D phase plots.
pub mod phase;
/// 1D line plots.
pub mod plot;
/// Valid/invalid plot state.
pub mod state;
/// Free-form line style properties.
pub mod style;

pub use artifact::{
    ArtifactMeta, PhasePanel, PhasePlotArtifact, ProfilePanel, ProfilePlotArtifact, ProfileSeries,
};
pub use cache::FigureCache;
pub use phase::{PhasePlot, PhasePlotOptions};
pub use plot::{ProfilePlot, ProfilePlotOptions, requested_field_info};
pub use state::PlotState;
pub use style::LineStyle;
