//! Engine facade: owns the reference model and the build machinery around it.
//!
//! Readers take `Arc<AopProject>` snapshots from [`WeaveEngine::model`] and
//! never wait for builds; writers only ever go through the scheduler.

use crate::builder::{BuildKind, BuildReport, BuildRequest, ReferenceModelBuilder};
use crate::config::EngineConfig;
use crate::error::{Result, WeavescopeError};
use crate::model::{AopProject, AopReferenceModel};
use crate::runtime::{BuildScheduler, IncrementalBuildCoordinator, ResourceDelta, start_watch};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::info;
use weavescope_api::{MarkerSink, ProjectId};

pub struct WeaveEngine {
    config: EngineConfig,
    model: Arc<AopReferenceModel>,
    markers: Arc<dyn MarkerSink>,
    builder: Arc<ReferenceModelBuilder>,
    scheduler: Arc<BuildScheduler>,
    coordinator: IncrementalBuildCoordinator,

    /// Cancellation token for background tasks (like the watcher)
    cancel_token: CancellationToken,
}

impl WeaveEngine {
    pub fn new(config: EngineConfig, markers: Arc<dyn MarkerSink>) -> Result<Self> {
        let model = Arc::new(AopReferenceModel::new());
        let builder = Arc::new(ReferenceModelBuilder::new(
            Arc::clone(&model),
            Arc::clone(&markers),
            config.clone(),
        )?);
        let scheduler = BuildScheduler::new(Arc::clone(&builder), config.workers);
        let coordinator =
            IncrementalBuildCoordinator::new(Arc::clone(&builder), Arc::clone(&scheduler));
        Ok(Self {
            config,
            model,
            markers,
            builder,
            scheduler,
            coordinator,
            cancel_token: CancellationToken::new(),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn model(&self) -> &Arc<AopReferenceModel> {
        &self.model
    }

    pub fn markers(&self) -> &Arc<dyn MarkerSink> {
        &self.markers
    }

    pub fn scheduler(&self) -> &Arc<BuildScheduler> {
        &self.scheduler
    }

    pub fn coordinator(&self) -> IncrementalBuildCoordinator {
        self.coordinator.clone()
    }

    pub fn startup(&self) {
        self.model.startup();
    }

    /// Stops the watcher and pending builds, then drops all model state.
    pub fn shutdown(&self) {
        self.cancel_token.cancel();
        self.scheduler.shutdown();
        self.model.shutdown();
    }

    /// Registers a project without building it.
    pub fn add_project(&self, id: ProjectId, root: impl Into<PathBuf>) -> Arc<AopProject> {
        let root = root.into();
        self.builder.register(id.clone(), root.clone());
        self.model.add_project(id, root)
    }

    /// Registers a project and schedules its first full build.
    pub fn open_project(&self, id: ProjectId, root: impl Into<PathBuf>) -> Arc<AopProject> {
        let project = self.add_project(id.clone(), root);
        self.scheduler.submit(BuildRequest::full(id));
        project
    }

    /// Cancels the project's builds, clears its markers and partition, and
    /// forgets it.
    pub async fn close_project(&self, id: &ProjectId) -> Result<()> {
        self.scheduler.cancel(id);
        if self.builder.root(id).is_some() {
            // A clean run takes the build lock, so it waits out a cancelled run.
            self.run_blocking(BuildRequest::clean(id.clone())).await?;
        }
        self.builder.unregister(id);
        if self.model.remove_project(id).is_some() {
            self.model.fire_model_changed();
        }
        info!(project = %id, "Closed project");
        Ok(())
    }

    /// Schedules a build of `kind` for `project`.
    pub fn build(&self, project: ProjectId, kind: BuildKind) {
        self.coordinator.submit(kind, project);
    }

    /// Schedules `kind` for every registered project.
    pub fn build_all(&self, kind: BuildKind) -> usize {
        if kind == BuildKind::Full {
            self.model.clear_projects();
            for (project, root) in self.builder.projects() {
                self.model.add_project(project, root);
            }
        }
        self.coordinator.on_resource_changes(kind, &[])
    }

    /// Routes resource deltas to incremental builds; returns the number of
    /// projects scheduled.
    pub fn apply_deltas(&self, deltas: &[ResourceDelta]) -> usize {
        self.coordinator.on_resource_changes(BuildKind::Incremental, deltas)
    }

    /// Runs a build on the blocking pool and waits for its report, bypassing
    /// the queue.
    pub async fn build_now(&self, project: ProjectId, kind: BuildKind) -> Result<BuildReport> {
        let request = match kind {
            BuildKind::Full => BuildRequest::full(project),
            BuildKind::Clean => BuildRequest::clean(project),
            BuildKind::Incremental => BuildRequest::incremental(project, Vec::new()),
        };
        self.run_blocking(request).await
    }

    async fn run_blocking(&self, request: BuildRequest) -> Result<BuildReport> {
        let builder = Arc::clone(&self.builder);
        let token = self.cancel_token.child_token();
        tokio::task::spawn_blocking(move || builder.run(&request, &token))
            .await
            .map_err(|e| WeavescopeError::Internal(e.to_string()))?
    }

    pub async fn wait_idle(&self) {
        self.scheduler.wait_idle().await;
    }

    /// Watches `root` until the engine shuts down.
    pub fn watch(&self, root: &Path) -> Result<()> {
        self.watch_with_token(root, self.cancel_token.child_token())
    }

    pub fn watch_with_token(&self, root: &Path, cancel_token: CancellationToken) -> Result<()> {
        start_watch(
            root,
            self.coordinator(),
            Duration::from_millis(self.config.debounce_ms),
            cancel_token,
        )
    }
}

impl Drop for WeaveEngine {
    fn drop(&mut self) {
        self.cancel_token.cancel();
    }
}
