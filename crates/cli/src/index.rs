use crate::Session;
use crate::view::ReferenceView;
use std::path::PathBuf;
use tabled::Table;
use tracing::info;
use weavescope_api::AopModelQuery;
use weavescope_core::BuildKind;

pub async fn run(path: PathBuf, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let session = Session::open(&path)?;

    info!("Indexing project at: {}...", session.root.display());
    let report = session
        .engine
        .build_now(session.project.clone(), BuildKind::Full)
        .await?;
    info!(
        "Indexing complete: {} definitions, {} references, {} diagnostics in {:?}",
        report.definitions, report.references, report.diagnostics, report.elapsed
    );

    let references = session.engine.model().get_all_references();
    if json {
        println!("{}", serde_json::to_string_pretty(&references)?);
        return Ok(());
    }
    if references.is_empty() {
        println!("No advice references found.");
        return Ok(());
    }
    let rows: Vec<ReferenceView> = references
        .iter()
        .map(|r| ReferenceView::from_reference(r, &session.root))
        .collect();
    println!("{}", Table::new(rows));
    Ok(())
}
