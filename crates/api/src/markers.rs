use crate::models::Marker;
use std::path::Path;

/// Which markers a bulk delete applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerFilter {
    All,
    Problems,
    References,
}

impl MarkerFilter {
    pub fn accepts(&self, marker: &Marker) -> bool {
        match self {
            MarkerFilter::All => true,
            MarkerFilter::Problems => marker.is_problem(),
            MarkerFilter::References => !marker.is_problem(),
        }
    }
}

/// Receives problem and reference markers produced by builds.
pub trait MarkerSink: Send + Sync {
    fn create(&self, marker: Marker);

    /// Deletes markers owned by `owner` that pass `filter`.
    fn delete_by_owner(&self, owner: &Path, filter: MarkerFilter);

    /// Deletes every marker placed on `resource`, whoever owns it.
    fn delete_on_resource(&self, resource: &Path);

    /// Markers currently placed on `resource`.
    fn markers_on(&self, resource: &Path) -> Vec<Marker>;
}
