use super::advice::AdviceKind;
use super::definition::DefinitionId;
use super::element::{ElementId, JavaElement};
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::path::{Path, PathBuf};

/// The bean through which a target was discovered.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct BeanRef {
    pub id: SmolStr,
    pub resource: PathBuf,
    pub line: usize,
}

/// One resolved advice → target edge.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct AopReference {
    pub kind: AdviceKind,
    pub source: JavaElement,
    pub target: JavaElement,
    /// Owning definition, looked up through the project's definition arena.
    pub definition: DefinitionId,
    /// Resource declaring the definition.
    pub resource: PathBuf,
    pub target_bean: Option<BeanRef>,
}

impl AopReference {
    pub fn target_bean_id(&self) -> Option<&str> {
        self.target_bean.as_ref().map(|b| b.id.as_str())
    }

    pub fn target_resource(&self) -> Option<&Path> {
        self.target.resource.as_deref()
    }

    /// Total order used to keep committed reference sets independent of
    /// matching order.
    pub fn sort_key(&self) -> (&Path, DefinitionId, &ElementId, &ElementId, Option<&str>) {
        (
            self.resource.as_path(),
            self.definition,
            &self.source.id,
            &self.target.id,
            self.target_bean_id(),
        )
    }

    /// True when either endpoint, or the bean that exposed the target, lives in `resource`.
    pub fn touches(&self, resource: &Path) -> bool {
        self.resource == resource
            || self.target.resource.as_deref() == Some(resource)
            || self.source.resource.as_deref() == Some(resource)
            || self
                .target_bean
                .as_ref()
                .is_some_and(|b| b.resource == resource)
    }
}
