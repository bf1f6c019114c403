use serde::Serialize;

/// Whether a plot's panels reflect its current settings.
///
/// Every mutator moves a plot to `Invalid`. Only a rebuild moves it back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PlotState {
    /// Panels are up to date.
    Valid,
    /// Panels must be rebuilt before they are read.
    #[default]
    Invalid,
}

impl PlotState {
    /// `true` when panels are up to date.
    pub fn is_valid(self) -> bool {
        self == PlotState::Valid
    }

    /// Mark stale.
    pub fn invalidate(&mut self) {
        *self = PlotState::Invalid;
    }

    /// Mark rebuilt.
    pub(crate) fn validate(&mut self) {
        *self = PlotState::Valid;
    }
}
