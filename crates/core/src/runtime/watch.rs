use super::coordinator::{IncrementalBuildCoordinator, ResourceDelta};
use crate::builder::BuildKind;
use crate::error::Result;
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher as NotifyWatcher};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

struct FsWatcher {
    _watcher: RecommendedWatcher,
    rx: mpsc::UnboundedReceiver<notify::Result<Event>>,
}

impl FsWatcher {
    fn new(root: &Path) -> notify::Result<Self> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut watcher = RecommendedWatcher::new(
            move |res| {
                let _ = tx.send(res);
            },
            Config::default(),
        )?;
        watcher.watch(root, RecursiveMode::Recursive)?;
        Ok(Self { _watcher: watcher, rx })
    }

    async fn next_event_async(&mut self) -> Option<Event> {
        loop {
            match self.rx.recv().await? {
                Ok(event) => return Some(event),
                Err(e) => tracing::warn!("File watcher error: {}", e),
            }
        }
    }
}

/// Collapses a burst of events into one delta per path.
fn collect_deltas(
    events: &[Event],
    coordinator: &IncrementalBuildCoordinator,
) -> Vec<ResourceDelta> {
    let mut created: HashMap<PathBuf, bool> = HashMap::new();
    for event in events {
        if matches!(event.kind, EventKind::Access(_)) {
            continue;
        }
        let is_create = matches!(event.kind, EventKind::Create(_));
        for path in &event.paths {
            *created.entry(path.clone()).or_default() |= is_create;
        }
    }
    let mut deltas: Vec<ResourceDelta> = created
        .into_iter()
        .map(|(path, is_create)| ResourceDelta::observed(path, is_create))
        .collect();
    deltas.sort_by(|a, b| a.path.cmp(&b.path));
    deltas.retain(|d| coordinator.is_relevant(&d.path));
    deltas
}

/// Watches `root` and feeds debounced deltas to the coordinator until
/// `cancel_token` is cancelled.
pub fn start_watch(
    root: &Path,
    coordinator: IncrementalBuildCoordinator,
    debounce: Duration,
    cancel_token: CancellationToken,
) -> Result<()> {
    let root = root.to_path_buf();
    let mut watcher = FsWatcher::new(&root)?;

    tokio::spawn(async move {
        tracing::info!("Started watching {}", root.display());
        let mut pending_events: Vec<Event> = Vec::new();

        loop {
            tokio::select! {
                _ = cancel_token.cancelled() => {
                    break;
                }
                event = watcher.next_event_async() => {
                    match event {
                        Some(e) => pending_events.push(e),
                        None => break,
                    }
                }
                _ = tokio::time::sleep(debounce), if !pending_events.is_empty() => {
                    let deltas = collect_deltas(&pending_events, &coordinator);
                    pending_events.clear();
                    if !deltas.is_empty() {
                        tracing::info!("Detected changes in {} files. Updating...", deltas.len());
                        coordinator.on_resource_changes(BuildKind::Incremental, &deltas);
                    }
                }
            }
        }
        tracing::info!("File watcher task ended for {}", root.display());
    });

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::engine::WeaveEngine;
    use crate::markers::InMemoryMarkerSink;
    use notify::event::{CreateKind, ModifyKind, RemoveKind};
    use std::sync::Arc;

    #[tokio::test]
    async fn bursts_collapse_into_one_delta_per_path() {
        let dir = tempfile::tempdir().unwrap();
        let kept = dir.path().join("Kept.java");
        std::fs::write(&kept, "class Kept {}").unwrap();
        let gone = dir.path().join("Gone.java");
        let markers = Arc::new(InMemoryMarkerSink::new());
        let engine = WeaveEngine::new(EngineConfig::default(), markers).unwrap();

        let events = vec![
            Event::new(EventKind::Create(CreateKind::File)).add_path(kept.clone()),
            Event::new(EventKind::Modify(ModifyKind::Any)).add_path(kept.clone()),
            Event::new(EventKind::Remove(RemoveKind::File)).add_path(gone.clone()),
            Event::new(EventKind::Modify(ModifyKind::Any)).add_path(dir.path().join("notes.txt")),
        ];
        let deltas = collect_deltas(&events, &engine.coordinator());
        assert_eq!(
            deltas,
            vec![
                ResourceDelta::new(gone, crate::runtime::DeltaKind::Removed),
                ResourceDelta::new(kept, crate::runtime::DeltaKind::Added),
            ]
        );
    }
}
