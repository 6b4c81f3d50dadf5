//! Per-project build queue.
//!
//! Each project owns a slot with at most one pending request. Submitting
//! while a request is pending replaces it, so a burst of submissions costs
//! one run. A driver task per busy project drains the slot; a semaphore caps
//! how many projects build at once, and the builder's per-project lock keeps
//! runs of one project strictly sequential.

use crate::builder::{BuildReport, BuildRequest, ReferenceModelBuilder};
use crate::error::WeavescopeError;
use dashmap::DashMap;
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{Notify, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};
use weavescope_api::ProjectId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildState {
    Idle,
    Scheduled,
    Running,
    /// The run committed; the slot is handing over to the next request.
    Committing,
    Cancelled,
}

struct Slot {
    state: BuildState,
    pending: Option<BuildRequest>,
    token: CancellationToken,
    driver_active: bool,
    runs: usize,
    last_report: Option<BuildReport>,
}

impl Default for Slot {
    fn default() -> Self {
        Self {
            state: BuildState::Idle,
            pending: None,
            token: CancellationToken::new(),
            driver_active: false,
            runs: 0,
            last_report: None,
        }
    }
}

type SharedSlot = Arc<Mutex<Slot>>;

fn lock(slot: &SharedSlot) -> MutexGuard<'_, Slot> {
    slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

pub struct BuildScheduler {
    builder: Arc<ReferenceModelBuilder>,
    permits: Arc<Semaphore>,
    slots: DashMap<ProjectId, SharedSlot>,
    idle: Arc<Notify>,
    shutdown: CancellationToken,
}

impl BuildScheduler {
    pub fn new(builder: Arc<ReferenceModelBuilder>, workers: usize) -> Arc<Self> {
        Arc::new(Self {
            builder,
            permits: Arc::new(Semaphore::new(workers.max(1))),
            slots: DashMap::new(),
            idle: Arc::new(Notify::new()),
            shutdown: CancellationToken::new(),
        })
    }

    fn slot(&self, project: &ProjectId) -> SharedSlot {
        Arc::clone(self.slots.entry(project.clone()).or_default().value())
    }

    /// Queues `request`, superseding any request of the same project that
    /// has not started yet. Must be called within a tokio runtime.
    pub fn submit(self: &Arc<Self>, request: BuildRequest) {
        if self.shutdown.is_cancelled() {
            debug!(project = %request.project, "Scheduler shut down, dropping request");
            return;
        }
        let project = request.project.clone();
        let slot = self.slot(&project);
        let spawn_driver = {
            let mut s = lock(&slot);
            if s.pending.replace(request).is_some() {
                debug!(project = %project, "Superseded pending build request");
            }
            if matches!(s.state, BuildState::Idle | BuildState::Cancelled) {
                s.state = BuildState::Scheduled;
            }
            !std::mem::replace(&mut s.driver_active, true)
        };
        if spawn_driver {
            let scheduler = Arc::clone(self);
            tokio::spawn(async move { scheduler.drive(project, slot).await });
        }
    }

    async fn drive(self: Arc<Self>, project: ProjectId, slot: SharedSlot) {
        loop {
            let permit = tokio::select! {
                permit = Arc::clone(&self.permits).acquire_owned() => permit.ok(),
                _ = self.shutdown.cancelled() => None,
            };
            // Taken only once a worker is free, so requests submitted while
            // waiting coalesce into this run.
            let next = {
                let mut s = lock(&slot);
                match (permit.is_some(), s.pending.take()) {
                    (true, Some(request)) => {
                        s.state = BuildState::Running;
                        s.runs += 1;
                        Some((request, s.token.clone()))
                    }
                    _ => {
                        s.driver_active = false;
                        if s.state != BuildState::Cancelled {
                            s.state = BuildState::Idle;
                        }
                        None
                    }
                }
            };
            let Some((request, token)) = next else {
                self.idle.notify_waiters();
                return;
            };

            let builder = Arc::clone(&self.builder);
            let result = tokio::task::spawn_blocking(move || builder.run(&request, &token)).await;
            drop(permit);

            let mut s = lock(&slot);
            match result {
                Ok(Ok(report)) => {
                    s.state = BuildState::Committing;
                    s.last_report = Some(report);
                }
                Ok(Err(WeavescopeError::Cancelled(_))) => {
                    info!(project = %project, "Build cancelled");
                    s.state = BuildState::Cancelled;
                }
                Ok(Err(e)) => {
                    error!(project = %project, "Build failed: {}", e);
                    s.state = BuildState::Idle;
                }
                Err(e) => {
                    error!(project = %project, "Build task panicked: {}", e);
                    s.state = BuildState::Idle;
                }
            }
        }
    }

    /// Cancels the running build and drops the pending one.
    pub fn cancel(&self, project: &ProjectId) {
        let Some(slot) = self.slots.get(project).map(|s| Arc::clone(s.value())) else {
            return;
        };
        let mut s = lock(&slot);
        s.token.cancel();
        s.token = CancellationToken::new();
        if s.pending.take().is_some() || s.state == BuildState::Scheduled {
            s.state = BuildState::Cancelled;
        }
    }

    /// Cancels everything and refuses further submissions.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
        for slot in self.slots.iter() {
            let mut s = lock(slot.value());
            s.token.cancel();
            s.pending = None;
        }
    }

    pub fn state(&self, project: &ProjectId) -> BuildState {
        self.slots
            .get(project)
            .map(|s| lock(s.value()).state)
            .unwrap_or(BuildState::Idle)
    }

    /// Number of runs started for `project`.
    pub fn runs(&self, project: &ProjectId) -> usize {
        self.slots.get(project).map(|s| lock(s.value()).runs).unwrap_or(0)
    }

    pub fn last_report(&self, project: &ProjectId) -> Option<BuildReport> {
        self.slots
            .get(project)
            .and_then(|s| lock(s.value()).last_report.clone())
    }

    fn is_idle(&self) -> bool {
        self.slots.iter().all(|s| !lock(s.value()).driver_active)
    }

    /// Resolves once no project has queued or running builds.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.is_idle() {
                return;
            }
            notified.await;
        }
    }
}
