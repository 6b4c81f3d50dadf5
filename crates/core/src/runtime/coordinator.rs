use super::scheduler::BuildScheduler;
use crate::builder::{BuildKind, BuildRequest, ReferenceModelBuilder};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};
use weavescope_api::ProjectId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeltaKind {
    Added,
    Changed,
    Removed,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ResourceDelta {
    pub path: PathBuf,
    pub kind: DeltaKind,
}

impl ResourceDelta {
    pub fn new(path: impl Into<PathBuf>, kind: DeltaKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }

    /// Classifies a path reported by the watcher by whether it still exists.
    pub fn observed(path: PathBuf, created: bool) -> Self {
        let kind = if !path.exists() {
            DeltaKind::Removed
        } else if created {
            DeltaKind::Added
        } else {
            DeltaKind::Changed
        };
        Self { path, kind }
    }
}

/// Turns resource deltas into per-project build requests.
#[derive(Clone)]
pub struct IncrementalBuildCoordinator {
    builder: Arc<ReferenceModelBuilder>,
    scheduler: Arc<BuildScheduler>,
}

impl IncrementalBuildCoordinator {
    pub fn new(builder: Arc<ReferenceModelBuilder>, scheduler: Arc<BuildScheduler>) -> Self {
        Self { builder, scheduler }
    }

    pub fn is_relevant(&self, path: &Path) -> bool {
        self.builder.config().is_relevant(path)
    }

    /// Groups relevant deltas by the project with the deepest root that
    /// contains them. Deltas outside every project are dropped.
    pub fn affected_resources(
        &self,
        deltas: &[ResourceDelta],
    ) -> BTreeMap<ProjectId, BTreeSet<PathBuf>> {
        let projects = self.builder.projects();
        let mut affected: BTreeMap<ProjectId, BTreeSet<PathBuf>> = BTreeMap::new();
        for delta in deltas {
            if !self.is_relevant(&delta.path) {
                continue;
            }
            // Directory events carry no resource of their own.
            if delta.kind != DeltaKind::Removed && delta.path.is_dir() {
                continue;
            }
            let owner = projects
                .iter()
                .filter(|(_, root)| delta.path.starts_with(root))
                .max_by_key(|(_, root)| root.components().count());
            match owner {
                Some((project, _)) => {
                    affected.entry(project.clone()).or_default().insert(delta.path.clone());
                }
                None => debug!("No project owns {}", delta.path.display()),
            }
        }
        affected
    }

    /// Schedules builds for a batch of deltas and returns how many projects
    /// were submitted. Full and clean builds cover every registered project.
    pub fn on_resource_changes(&self, kind: BuildKind, deltas: &[ResourceDelta]) -> usize {
        match kind {
            BuildKind::Full | BuildKind::Clean => {
                let projects = self.builder.projects();
                for (project, _) in &projects {
                    self.submit(kind, project.clone());
                }
                projects.len()
            }
            BuildKind::Incremental => {
                let affected = self.affected_resources(deltas);
                for (project, paths) in &affected {
                    info!(
                        project = %project,
                        resources = paths.len(),
                        "Scheduling incremental build"
                    );
                    self.scheduler
                        .submit(BuildRequest::incremental(project.clone(), paths.iter().cloned()));
                }
                affected.len()
            }
        }
    }

    pub fn submit(&self, kind: BuildKind, project: ProjectId) {
        let request = match kind {
            BuildKind::Full => BuildRequest::full(project),
            BuildKind::Clean => BuildRequest::clean(project),
            BuildKind::Incremental => BuildRequest::incremental(project, Vec::new()),
        };
        self.scheduler.submit(request);
    }
}
