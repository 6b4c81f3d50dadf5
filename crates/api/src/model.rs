use crate::models::{AopReference, ElementId, ProjectId};
use std::path::Path;

/// Change notification without payload; listeners re-query what they need.
pub trait AopModelListener: Send + Sync {
    fn on_model_changed(&self);
}

/// Read side of the reference model.
///
/// Every method returns the last committed state and never blocks on a
/// running build. Unknown projects or elements yield empty results.
pub trait AopModelQuery: Send + Sync {
    fn project_ids(&self) -> Vec<ProjectId>;

    fn get_all_references(&self) -> Vec<AopReference>;

    fn get_all_references_for_resource(&self, resource: &Path) -> Vec<AopReference>;

    /// References whose source is `element`.
    fn get_advice_definition(&self, element: &ElementId) -> Vec<AopReference>;

    fn is_advice(&self, element: &ElementId) -> bool;

    fn is_advised(&self, element: &ElementId) -> bool;
}
