//! Immutable per-project partition of the reference model.
//!
//! Definitions and references live in plain vectors; every lookup goes
//! through integer-indexed hash indexes built once at construction.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;
use weavescope_api::{AopReference, AspectDefinition, DefinitionId, ElementId, ProjectId};

#[derive(Debug)]
pub struct AopProject {
    id: ProjectId,
    root: PathBuf,
    version: u64,
    built_at: SystemTime,
    definitions: Vec<Arc<AspectDefinition>>,
    references: Vec<AopReference>,
    by_resource: HashMap<PathBuf, Vec<usize>>,
    by_source: HashMap<ElementId, Vec<usize>>,
    by_target: HashMap<ElementId, Vec<usize>>,
    definition_index: HashMap<DefinitionId, usize>,
}

impl AopProject {
    /// An empty partition, as created by explicit registration.
    pub fn empty(id: ProjectId, root: impl Into<PathBuf>) -> Self {
        Self::new(id, root, 0, Vec::new(), Vec::new())
    }

    /// `references` must already be sorted and deduplicated.
    pub fn new(
        id: ProjectId,
        root: impl Into<PathBuf>,
        version: u64,
        definitions: Vec<Arc<AspectDefinition>>,
        references: Vec<AopReference>,
    ) -> Self {
        let mut by_resource: HashMap<PathBuf, Vec<usize>> = HashMap::new();
        let mut by_source: HashMap<ElementId, Vec<usize>> = HashMap::new();
        let mut by_target: HashMap<ElementId, Vec<usize>> = HashMap::new();

        for (idx, reference) in references.iter().enumerate() {
            let mut resources: Vec<&Path> = vec![reference.resource.as_path()];
            resources.extend(reference.source.resource.as_deref());
            resources.extend(reference.target.resource.as_deref());
            resources.extend(reference.target_bean.as_ref().map(|b| b.resource.as_path()));
            resources.sort();
            resources.dedup();
            for resource in resources {
                by_resource.entry(resource.to_path_buf()).or_default().push(idx);
            }
            by_source.entry(reference.source.id.clone()).or_default().push(idx);
            by_target.entry(reference.target.id.clone()).or_default().push(idx);
        }

        let definition_index = definitions
            .iter()
            .enumerate()
            .map(|(idx, d)| (d.id(), idx))
            .collect();

        Self {
            id,
            root: root.into(),
            version,
            built_at: SystemTime::now(),
            definitions,
            references,
            by_resource,
            by_source,
            by_target,
            definition_index,
        }
    }

    pub fn id(&self) -> &ProjectId {
        &self.id
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn built_at(&self) -> SystemTime {
        self.built_at
    }

    pub fn definitions(&self) -> &[Arc<AspectDefinition>] {
        &self.definitions
    }

    pub fn definition(&self, id: DefinitionId) -> Option<&Arc<AspectDefinition>> {
        self.definition_index.get(&id).map(|&idx| &self.definitions[idx])
    }

    pub fn references(&self) -> &[AopReference] {
        &self.references
    }

    pub fn is_empty(&self) -> bool {
        self.references.is_empty()
    }

    /// References declared in, targeting, or exposed through `resource`.
    pub fn references_for_resource(&self, resource: &Path) -> impl Iterator<Item = &AopReference> {
        self.indexed(self.by_resource.get(resource))
    }

    pub fn references_from(&self, source: &ElementId) -> impl Iterator<Item = &AopReference> {
        self.indexed(self.by_source.get(source))
    }

    pub fn is_advice(&self, element: &ElementId) -> bool {
        self.by_source.contains_key(element)
    }

    pub fn is_advised(&self, element: &ElementId) -> bool {
        self.by_target.contains_key(element)
    }

    fn indexed<'a>(
        &'a self,
        slots: Option<&'a Vec<usize>>,
    ) -> impl Iterator<Item = &'a AopReference> + 'a {
        slots
            .into_iter()
            .flatten()
            .map(move |&idx| &self.references[idx])
    }
}
