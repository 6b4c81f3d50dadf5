use crate::Session;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use weavescope_api::{AopModelListener, AopModelQuery};
use weavescope_core::AopReferenceModel;

/// Logs the reference count after every commit.
struct CommitLogger {
    model: std::sync::Weak<AopReferenceModel>,
}

impl AopModelListener for CommitLogger {
    fn on_model_changed(&self) {
        if let Some(model) = self.model.upgrade() {
            info!("Model updated: {} references", model.get_all_references().len());
        }
    }
}

pub async fn run(path: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let session = Session::open(&path)?;
    let engine = &session.engine;
    engine.model().register_listener(Arc::new(CommitLogger {
        model: Arc::downgrade(engine.model()),
    }));

    info!("Initializing: Indexing project at: {}...", session.root.display());
    engine.build(session.project.clone(), weavescope_core::BuildKind::Full);
    engine.wait_idle().await;
    info!("Initial indexing complete.");

    engine.watch(&session.root)?;
    info!("File watcher started. Ready for changes.");
    info!("Press Ctrl+C to stop.");

    tokio::signal::ctrl_c().await?;
    engine.shutdown();
    info!("Watcher stopped.");

    Ok(())
}
