use super::project::AopProject;
use dashmap::DashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tracing::{debug, info, warn};
use weavescope_api::{AopModelListener, AopModelQuery, AopReference, ElementId, ProjectId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Process-wide reference model: one immutable [`AopProject`] per project,
/// swapped whole on commit.
///
/// Readers clone the partition `Arc` and work on that snapshot, so a build
/// committing concurrently is observed either entirely or not at all.
#[derive(Default)]
pub struct AopReferenceModel {
    projects: DashMap<ProjectId, Arc<AopProject>>,
    listeners: DashMap<ListenerId, Arc<dyn AopModelListener>>,
    next_listener: AtomicU64,
    started: AtomicBool,
}

impl AopReferenceModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn startup(&self) {
        if self.started.swap(true, Ordering::SeqCst) {
            return;
        }
        self.projects.clear();
        info!("Reference model started");
    }

    pub fn shutdown(&self) {
        self.started.store(false, Ordering::SeqCst);
        self.projects.clear();
        self.listeners.clear();
        info!("Reference model shut down");
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    /// Registers an empty partition unless the project already has one.
    pub fn add_project(&self, id: ProjectId, root: impl Into<PathBuf>) -> Arc<AopProject> {
        self.projects
            .entry(id.clone())
            .or_insert_with(|| Arc::new(AopProject::empty(id, root)))
            .clone()
    }

    pub fn remove_project(&self, id: &ProjectId) -> Option<Arc<AopProject>> {
        let removed = self.projects.remove(id).map(|(_, p)| p);
        if removed.is_some() {
            debug!(project = %id, "Removed project partition");
        }
        removed
    }

    pub fn get_project(&self, id: &ProjectId) -> Option<Arc<AopProject>> {
        self.projects.get(id).map(|p| Arc::clone(p.value()))
    }

    pub fn get_projects(&self) -> Vec<Arc<AopProject>> {
        let mut projects: Vec<Arc<AopProject>> =
            self.projects.iter().map(|p| Arc::clone(p.value())).collect();
        projects.sort_by(|a, b| a.id().cmp(b.id()));
        projects
    }

    /// Replaces the project's partition in a single swap. Notification is
    /// left to the caller so that one build yields one event.
    pub fn commit(&self, project: AopProject) -> Arc<AopProject> {
        let project = Arc::new(project);
        self.projects.insert(project.id().clone(), Arc::clone(&project));
        debug!(
            project = %project.id(),
            version = project.version(),
            references = project.references().len(),
            "Committed project partition"
        );
        project
    }

    pub fn clear_projects(&self) {
        self.projects.clear();
    }

    pub fn register_listener(&self, listener: Arc<dyn AopModelListener>) -> ListenerId {
        let id = ListenerId(self.next_listener.fetch_add(1, Ordering::Relaxed));
        self.listeners.insert(id, listener);
        id
    }

    pub fn unregister_listener(&self, id: ListenerId) -> bool {
        self.listeners.remove(&id).is_some()
    }

    pub fn fire_model_changed(&self) {
        // Snapshot first so listeners may (un)register from the callback.
        let listeners: Vec<Arc<dyn AopModelListener>> =
            self.listeners.iter().map(|l| Arc::clone(l.value())).collect();
        for listener in listeners {
            let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                listener.on_model_changed()
            }));
            if outcome.is_err() {
                warn!("Model listener panicked during change notification");
            }
        }
    }
}

impl AopModelQuery for AopReferenceModel {
    fn project_ids(&self) -> Vec<ProjectId> {
        self.get_projects().iter().map(|p| p.id().clone()).collect()
    }

    fn get_all_references(&self) -> Vec<AopReference> {
        self.get_projects()
            .iter()
            .flat_map(|p| p.references().iter().cloned())
            .collect()
    }

    fn get_all_references_for_resource(&self, resource: &Path) -> Vec<AopReference> {
        self.get_projects()
            .iter()
            .flat_map(|p| p.references_for_resource(resource).cloned().collect::<Vec<_>>())
            .collect()
    }

    fn get_advice_definition(&self, element: &ElementId) -> Vec<AopReference> {
        self.get_projects()
            .iter()
            .flat_map(|p| p.references_from(element).cloned().collect::<Vec<_>>())
            .collect()
    }

    fn is_advice(&self, element: &ElementId) -> bool {
        self.projects.iter().any(|p| p.is_advice(element))
    }

    fn is_advised(&self, element: &ElementId) -> bool {
        self.projects.iter().any(|p| p.is_advised(element))
    }
}
