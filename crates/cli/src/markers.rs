use crate::Session;
use crate::view::MarkerView;
use std::path::PathBuf;
use tabled::Table;
use weavescope_core::BuildKind;

pub async fn run(path: PathBuf, problems_only: bool) -> Result<(), Box<dyn std::error::Error>> {
    let session = Session::open(&path)?;
    session
        .engine
        .build_now(session.project.clone(), BuildKind::Full)
        .await?;

    let markers = if problems_only {
        session.markers.problems()
    } else {
        session.markers.all()
    };
    if markers.is_empty() {
        println!("No markers.");
        return Ok(());
    }
    let rows: Vec<MarkerView> = markers
        .iter()
        .map(|m| MarkerView::from_marker(m, &session.root))
        .collect();
    println!("{}", Table::new(rows));
    Ok(())
}
