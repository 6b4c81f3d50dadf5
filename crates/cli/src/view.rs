use std::path::Path;
use tabled::Tabled;
use weavescope_api::{AopReference, Marker};

/// A terminal view of one advice reference.
#[derive(Tabled)]
pub struct ReferenceView {
    pub kind: String,
    pub advice: String,
    pub target: String,
    pub bean: String,
    pub declared_in: String,
}

impl ReferenceView {
    pub fn from_reference(reference: &AopReference, root: &Path) -> Self {
        Self {
            kind: reference.kind.to_string(),
            advice: reference.source.qualified_name(),
            target: reference.target.id.to_string(),
            bean: reference.target_bean_id().unwrap_or("-").to_string(),
            declared_in: relative(&reference.resource, root),
        }
    }
}

#[derive(Tabled)]
pub struct MarkerView {
    pub severity: String,
    pub location: String,
    pub message: String,
}

impl MarkerView {
    pub fn from_marker(marker: &Marker, root: &Path) -> Self {
        Self {
            severity: marker.severity.to_string(),
            location: format!("{}:{}", relative(&marker.resource, root), marker.line),
            message: marker.message.clone(),
        }
    }
}

fn relative(path: &Path, root: &Path) -> String {
    path.strip_prefix(root).unwrap_or(path).display().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use weavescope_api::{MarkerKind, Severity};

    #[test]
    fn marker_location_is_relative_to_root() {
        let marker = Marker {
            resource: "/work/shop/src/aop.xml".into(),
            message: "advises Service.doWork()".to_string(),
            severity: Severity::Info,
            line: 4,
            kind: MarkerKind::Problem,
            owner: "/work/shop/src/aop.xml".into(),
        };
        let view = MarkerView::from_marker(&marker, Path::new("/work/shop"));
        assert_eq!(view.location, "src/aop.xml:4");
        assert_eq!(view.severity, "info");
    }
}
