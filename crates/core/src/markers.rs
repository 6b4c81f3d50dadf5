//! In-process marker sink used by the CLI and tests.

use dashmap::DashMap;
use std::path::{Path, PathBuf};
use weavescope_api::{Marker, MarkerFilter, MarkerSink};

#[derive(Default)]
pub struct InMemoryMarkerSink {
    by_resource: DashMap<PathBuf, Vec<Marker>>,
}

impl InMemoryMarkerSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every marker, ordered by resource then line.
    pub fn all(&self) -> Vec<Marker> {
        let mut all: Vec<Marker> = self
            .by_resource
            .iter()
            .flat_map(|e| e.value().clone())
            .collect();
        all.sort_by(|a, b| {
            (&a.resource, a.line, &a.message).cmp(&(&b.resource, b.line, &b.message))
        });
        all
    }

    pub fn problems(&self) -> Vec<Marker> {
        self.all().into_iter().filter(Marker::is_problem).collect()
    }
}

impl MarkerSink for InMemoryMarkerSink {
    /// Identical markers are stored once.
    fn create(&self, marker: Marker) {
        let mut markers = self.by_resource.entry(marker.resource.clone()).or_default();
        if !markers.contains(&marker) {
            markers.push(marker);
        }
    }

    fn delete_by_owner(&self, owner: &Path, filter: MarkerFilter) {
        for mut entry in self.by_resource.iter_mut() {
            entry
                .value_mut()
                .retain(|m| !(m.owner == owner && filter.accepts(m)));
        }
        self.by_resource.retain(|_, markers| !markers.is_empty());
    }

    fn delete_on_resource(&self, resource: &Path) {
        self.by_resource.remove(resource);
    }

    fn markers_on(&self, resource: &Path) -> Vec<Marker> {
        self.by_resource
            .get(resource)
            .map(|m| m.value().clone())
            .unwrap_or_default()
    }
}
