//! Reference Model Builder.
//!
//! A run parses the affected resources, decides how much of the project to
//! re-enumerate, matches every definition against the candidates, and swaps
//! the project's partition in one commit. The per-project state mutex is the
//! build rule: two runs for the same project never overlap. Runs work on a
//! copy of the cached state and store it back only when they commit, so a
//! cancelled run leaves nothing behind.

use crate::advisor::resolve_advisors;
use crate::config::EngineConfig;
use crate::enumerate::{CandidateEnumerator, ChangeScope};
use crate::error::{Result, WeavescopeError};
use crate::matcher::{AspectDefinitionMatcher, MatchContext};
use crate::model::{AopProject, AopReferenceModel};
use crate::pointcut::{AspectJEvaluator, NamedPointcuts};
use crate::scanner::{Scanner, SourceText};
use crate::source::XmlAspectSource;
use crate::universe::TypeUniverse;
use dashmap::DashMap;
use rayon::prelude::*;
use regex::Regex;
use serde::Serialize;
use smol_str::SmolStr;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use weavescope_api::{
    AdviceKind, AopReference, AspectDefinition, AspectDefinitionSource, AutoProxyConfig,
    BeanDefinition, DefinitionOrigin, Diagnostic, DiagnosticKind, Marker, MarkerFilter, MarkerKind,
    MarkerSink, ParsedAspects, ProjectId, Severity,
};
use weavescope_java::{AnnotationAspectSource, JavaCompilationUnit, JavaParser};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildKind {
    Full,
    Incremental,
    Clean,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildRequest {
    pub project: ProjectId,
    pub kind: BuildKind,
    /// Resources to re-examine; ignored by full and clean builds.
    pub affected: Vec<PathBuf>,
}

impl BuildRequest {
    pub fn full(project: ProjectId) -> Self {
        Self {
            project,
            kind: BuildKind::Full,
            affected: Vec::new(),
        }
    }

    pub fn incremental(project: ProjectId, affected: impl IntoIterator<Item = PathBuf>) -> Self {
        Self {
            project,
            kind: BuildKind::Incremental,
            affected: affected.into_iter().collect(),
        }
    }

    pub fn clean(project: ProjectId) -> Self {
        Self {
            project,
            kind: BuildKind::Clean,
            affected: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BuildReport {
    pub project: ProjectId,
    pub kind: BuildKind,
    pub version: u64,
    pub resources_parsed: usize,
    pub definitions: usize,
    pub references: usize,
    pub diagnostics: usize,
    /// Whether every candidate was re-matched.
    pub full_rematch: bool,
    pub elapsed: Duration,
}

/// Everything a project's previous runs learned about its resources.
#[derive(Default, Clone)]
struct ProjectState {
    hashes: HashMap<PathBuf, u64>,
    units: HashMap<PathBuf, Arc<JavaCompilationUnit>>,
    aspects: HashMap<PathBuf, Arc<ParsedAspects>>,
    /// Java resources declaring the classes behind the last committed
    /// definitions: aspect beans, advisor advice and introduction types.
    backing: HashSet<PathBuf>,
}

impl ProjectState {
    fn resources(&self) -> impl Iterator<Item = &PathBuf> {
        self.hashes.keys()
    }

    fn remove(&mut self, path: &Path) -> bool {
        self.units.remove(path);
        self.aspects.remove(path);
        self.hashes.remove(path).is_some()
    }

    fn declares_aspects(&self, path: &Path) -> bool {
        self.aspects.get(path).is_some_and(|a| a.has_declarations())
    }
}

struct ProjectSlot {
    root: PathBuf,
    state: Mutex<ProjectState>,
}

/// Result of parsing one resource.
struct ParsedResource {
    path: PathBuf,
    hash: u64,
    unit: Option<Arc<JavaCompilationUnit>>,
    aspects: Arc<ParsedAspects>,
}

impl ParsedResource {
    /// Stands in for a resource that exists but cannot be read. Its previous
    /// declarations are dropped and the failure is reported on it.
    fn unreadable(path: &Path, error: &std::io::Error) -> Self {
        Self {
            path: path.to_path_buf(),
            hash: 0,
            unit: None,
            aspects: Arc::new(ParsedAspects {
                diagnostics: vec![Diagnostic::error(
                    DiagnosticKind::Parse,
                    path,
                    0,
                    format!("Cannot read resource: {}", error),
                )],
                ..Default::default()
            }),
        }
    }
}

pub struct ReferenceModelBuilder {
    model: Arc<AopReferenceModel>,
    markers: Arc<dyn MarkerSink>,
    config: EngineConfig,
    parser: JavaParser,
    xml: XmlAspectSource,
    projects: DashMap<ProjectId, Arc<ProjectSlot>>,
}

impl ReferenceModelBuilder {
    pub fn new(
        model: Arc<AopReferenceModel>,
        markers: Arc<dyn MarkerSink>,
        config: EngineConfig,
    ) -> Result<Self> {
        Ok(Self {
            model,
            markers,
            config,
            parser: JavaParser::new()?,
            xml: XmlAspectSource,
            projects: DashMap::new(),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn register(&self, project: ProjectId, root: impl Into<PathBuf>) {
        let root = root.into();
        self.projects.entry(project).or_insert_with(|| {
            Arc::new(ProjectSlot {
                root,
                state: Mutex::new(ProjectState::default()),
            })
        });
    }

    /// Forgets the project's cached state. A run already holding the state
    /// finds the project gone before committing and aborts.
    pub fn unregister(&self, project: &ProjectId) -> bool {
        self.projects.remove(project).is_some()
    }

    pub fn root(&self, project: &ProjectId) -> Option<PathBuf> {
        self.projects.get(project).map(|s| s.root.clone())
    }

    pub fn projects(&self) -> Vec<(ProjectId, PathBuf)> {
        let mut out: Vec<(ProjectId, PathBuf)> = self
            .projects
            .iter()
            .map(|e| (e.key().clone(), e.value().root.clone()))
            .collect();
        out.sort();
        out
    }

    pub fn run(&self, request: &BuildRequest, cancel: &CancellationToken) -> Result<BuildReport> {
        let slot = self
            .projects
            .get(&request.project)
            .map(|s| Arc::clone(s.value()))
            .ok_or_else(|| WeavescopeError::ProjectNotFound(request.project.clone()))?;
        let mut guard = slot.state.lock().map_err(|_| {
            WeavescopeError::Internal(format!("build state of {} is poisoned", request.project))
        })?;

        let start = Instant::now();
        info!(
            project = %request.project,
            kind = ?request.kind,
            affected = request.affected.len(),
            "Starting build"
        );
        let report = match request.kind {
            BuildKind::Clean => self.clean(&request.project, &slot.root, &mut guard, start),
            _ => self.build(request, &slot.root, &mut guard, cancel, start)?,
        };
        info!(
            project = %request.project,
            version = report.version,
            references = report.references,
            diagnostics = report.diagnostics,
            "Build processing took {:?}",
            report.elapsed
        );
        Ok(report)
    }

    fn clean(
        &self,
        project: &ProjectId,
        root: &Path,
        state: &mut ProjectState,
        start: Instant,
    ) -> BuildReport {
        let previous = self.model.remove_project(project);
        let mut owners: BTreeSet<PathBuf> = state.resources().cloned().collect();
        if let Some(previous) = &previous {
            owners.extend(previous.references().iter().map(|r| r.resource.clone()));
        }
        for owner in &owners {
            self.markers.delete_by_owner(owner, MarkerFilter::All);
        }
        *state = ProjectState::default();
        self.model.fire_model_changed();
        debug!(project = %project, root = %root.display(), "Cleaned project");
        BuildReport {
            project: project.clone(),
            kind: BuildKind::Clean,
            version: 0,
            resources_parsed: 0,
            definitions: 0,
            references: 0,
            diagnostics: 0,
            full_rematch: false,
            elapsed: start.elapsed(),
        }
    }

    fn build(
        &self,
        request: &BuildRequest,
        root: &Path,
        guard: &mut ProjectState,
        cancel: &CancellationToken,
        start: Instant,
    ) -> Result<BuildReport> {
        let project = &request.project;
        let cancelled = || WeavescopeError::Cancelled(project.clone());
        let full = request.kind == BuildKind::Full;
        let mut state = if full { ProjectState::default() } else { guard.clone() };
        let previous_state = &*guard;

        // Phase 1: parse.
        let paths: Vec<PathBuf> = if full {
            Scanner::collect_paths(root, &self.config)
        } else {
            let mut affected: Vec<PathBuf> = request
                .affected
                .iter()
                .filter(|p| self.config.is_relevant(p))
                .cloned()
                .collect();
            affected.sort();
            affected.dedup();
            affected
        };
        let (present, missing): (Vec<PathBuf>, Vec<PathBuf>) =
            paths.into_iter().partition(|p| p.is_file());
        let parsed: Vec<ParsedResource> = present
            .par_iter()
            .filter_map(|path| match Scanner::read(path) {
                Ok(text) => {
                    if !full && state.hashes.get(path) == Some(&text.hash) {
                        return None;
                    }
                    Some(self.parse_resource(path, &text))
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Cannot read resource");
                    Some(ParsedResource::unreadable(path, &e))
                }
            })
            .collect();
        if cancel.is_cancelled() {
            return Err(cancelled());
        }

        let mut changed: BTreeSet<PathBuf> = BTreeSet::new();
        let mut removed: BTreeSet<PathBuf> = BTreeSet::new();
        for path in missing {
            if state.remove(&path) {
                removed.insert(path);
            }
        }
        if full {
            let scanned: HashSet<&PathBuf> = present.iter().collect();
            removed.extend(
                previous_state
                    .resources()
                    .filter(|p| !scanned.contains(p))
                    .cloned(),
            );
        }
        let resources_parsed = parsed.len();
        for resource in parsed {
            state.hashes.insert(resource.path.clone(), resource.hash);
            match resource.unit {
                Some(unit) => state.units.insert(resource.path.clone(), unit),
                None => state.units.remove(&resource.path),
            };
            state.aspects.insert(resource.path.clone(), resource.aspects);
            changed.insert(resource.path);
        }

        // Phase 2: project-wide inputs and candidates.
        let universe = TypeUniverse::build(state.units.values().map(|u| u.as_ref()));
        let mut diagnostics: Vec<Diagnostic> = Vec::new();
        let inputs = ProjectInputs::collect(&state, &universe, &mut diagnostics);
        state.backing = backing_resources(&inputs, &universe);

        // Definitions depend on their own resource and on the classes
        // behind them; a change to either re-matches the whole project.
        let aspect_changed = changed.iter().chain(removed.iter()).any(|p| {
            previous_state.declares_aspects(p)
                || state.declares_aspects(p)
                || previous_state.backing.contains(p)
                || state.backing.contains(p)
        });
        let full_rematch = full || aspect_changed;
        debug!(
            project = %project,
            changed = changed.len(),
            removed = removed.len(),
            full_rematch,
            "Parsed resources"
        );

        let scope = if full_rematch {
            ChangeScope::Full
        } else {
            let declared = changed
                .iter()
                .flat_map(|p| universe.types_in(p))
                .map(|t| t.fqn.clone());
            ChangeScope::Types(universe.subtype_closure(declared))
        };
        let mut enumerator = CandidateEnumerator::new(&universe, &inputs.bean_list);
        let xml_defined = inputs
            .definitions
            .iter()
            .filter(|d| d.origin() != DefinitionOrigin::Annotation);
        for definition in xml_defined {
            if let Some(bean) = definition.aspect_name() {
                enumerator = enumerator.exclude_bean(bean);
            }
            if let Some(class) = definition.aspect_class_name() {
                enumerator = enumerator.exclude_type(class);
            }
        }
        let candidates = enumerator.enumerate(&scope, &mut diagnostics);
        if cancel.is_cancelled() {
            return Err(cancelled());
        }

        // Phase 3: match.
        let matcher = AspectDefinitionMatcher::new(AspectJEvaluator);
        let ctx = MatchContext {
            universe: &universe,
            named: &inputs.named,
            beans: &inputs.beans,
        };
        let matched: Vec<(Vec<AopReference>, Vec<Diagnostic>)> = inputs
            .definitions
            .par_iter()
            .map(|definition| {
                let mut local = Vec::new();
                if cancel.is_cancelled() {
                    return (Vec::new(), local);
                }
                let refs = matcher.match_definition(definition, &candidates, &ctx, &mut local);
                (refs, local)
            })
            .collect();
        if cancel.is_cancelled() {
            return Err(cancelled());
        }

        let previous = self.model.get_project(project);
        let mut references: Vec<AopReference> = Vec::new();
        if let (ChangeScope::Types(types), Some(previous)) = (&scope, &previous) {
            let invalidated: Vec<&PathBuf> = changed.iter().chain(removed.iter()).collect();
            references.extend(
                previous
                    .references()
                    .iter()
                    .filter(|r| !invalidated.iter().any(|p| r.touches(p)))
                    .filter(|r| !types.contains(&r.target.declaring_type))
                    .cloned(),
            );
        }
        for (refs, local) in matched {
            references.extend(refs);
            diagnostics.extend(local);
        }
        references.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
        references.dedup();

        // Phase 4: commit.
        if cancel.is_cancelled() || !self.projects.contains_key(project) {
            return Err(cancelled());
        }
        let version = previous.as_ref().map(|p| p.version()).unwrap_or(0) + 1;
        let definitions: Vec<Arc<AspectDefinition>> =
            inputs.definitions.into_iter().map(Arc::new).collect();
        let definition_count = definitions.len();
        let committed = self.model.commit(AopProject::new(
            project.clone(),
            root,
            version,
            definitions,
            references,
        ));
        *guard = state;

        // Every run recomputes all diagnostics, so problems are replaced
        // project-wide even when only some targets were re-matched.
        let report_scope: BTreeSet<PathBuf> = guard
            .resources()
            .cloned()
            .chain(removed.iter().cloned())
            .chain(diagnostics.iter().map(|d| d.resource.clone()))
            .collect();
        self.update_markers(
            &report_scope,
            &removed,
            &diagnostics,
            previous.as_deref().map(|p| p.references()).unwrap_or_default(),
            committed.references(),
        );
        self.model.fire_model_changed();

        Ok(BuildReport {
            project: project.clone(),
            kind: request.kind,
            version,
            resources_parsed,
            definitions: definition_count,
            references: committed.references().len(),
            diagnostics: diagnostics.len(),
            full_rematch,
            elapsed: start.elapsed(),
        })
    }

    fn parse_resource(&self, path: &Path, text: &SourceText) -> ParsedResource {
        let content = text.content.as_str();
        let (unit, mut aspects) = if self.config.is_source(path) {
            match self.parser.parse(content, path) {
                Ok(unit) => {
                    let aspects = AnnotationAspectSource::from_unit(&unit);
                    (Some(Arc::new(unit)), aspects)
                }
                Err(e) => (
                    None,
                    ParsedAspects {
                        diagnostics: vec![Diagnostic::error(
                            DiagnosticKind::Parse,
                            path,
                            0,
                            e.to_string(),
                        )],
                        ..Default::default()
                    },
                ),
            }
        } else if self.xml.supports(path) {
            (None, self.xml.parse(path, content))
        } else {
            (None, ParsedAspects::default())
        };
        if text.lossy {
            aspects.diagnostics.push(Diagnostic::warning(
                DiagnosticKind::Parse,
                path,
                0,
                "Resource is not valid UTF-8; undecodable bytes were replaced",
            ));
        }
        ParsedResource {
            path: path.to_path_buf(),
            hash: text.hash,
            unit,
            aspects: Arc::new(aspects),
        }
    }

    fn update_markers(
        &self,
        report_scope: &BTreeSet<PathBuf>,
        removed: &BTreeSet<PathBuf>,
        diagnostics: &[Diagnostic],
        previous: &[AopReference],
        current: &[AopReference],
    ) {
        for resource in removed {
            self.markers.delete_on_resource(resource);
            self.markers.delete_by_owner(resource, MarkerFilter::All);
        }
        for resource in report_scope {
            self.markers.delete_by_owner(resource, MarkerFilter::Problems);
        }
        for diagnostic in diagnostics.iter().filter(|d| report_scope.contains(&d.resource)) {
            self.markers.create(Marker::problem(diagnostic));
        }

        if !self.config.create_reference_markers {
            return;
        }
        let owners: BTreeSet<&Path> = previous
            .iter()
            .chain(current.iter())
            .map(|r| r.resource.as_path())
            .collect();
        for owner in owners {
            self.markers.delete_by_owner(owner, MarkerFilter::References);
        }
        for reference in current {
            for marker in reference_markers(reference) {
                self.markers.create(marker);
            }
        }
    }
}

/// Project-wide aspect inputs gathered from every parsed resource.
struct ProjectInputs {
    definitions: Vec<AspectDefinition>,
    beans: HashMap<SmolStr, BeanDefinition>,
    bean_list: Vec<BeanDefinition>,
    named: NamedPointcuts,
}

impl ProjectInputs {
    fn collect(
        state: &ProjectState,
        universe: &TypeUniverse,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Self {
        let mut resources: Vec<(&PathBuf, &Arc<ParsedAspects>)> = state.aspects.iter().collect();
        resources.sort_by(|a, b| a.0.cmp(b.0));

        let mut definitions = Vec::new();
        let mut beans: HashMap<SmolStr, BeanDefinition> = HashMap::new();
        let mut bean_list = Vec::new();
        let mut advisors = Vec::new();
        let mut named = Vec::new();
        let mut auto_proxy: Option<AutoProxyConfig> = None;
        for (_, parsed) in &resources {
            diagnostics.extend(parsed.diagnostics.iter().cloned());
            definitions.extend(parsed.definitions.iter().cloned());
            for bean in &parsed.beans {
                if !beans.contains_key(&bean.id) {
                    beans.insert(bean.id.clone(), bean.clone());
                    bean_list.push(bean.clone());
                }
            }
            advisors.extend(parsed.advisors.iter());
            named.extend(parsed.named_pointcuts.iter());
            if let Some(config) = &parsed.auto_proxy {
                auto_proxy.get_or_insert_with(AutoProxyConfig::default).merge(config);
            }
        }

        if let Some(config) = &auto_proxy {
            let includes: Vec<Regex> = config
                .include_patterns
                .iter()
                .filter_map(|p| Regex::new(p).ok())
                .collect();
            definitions = definitions
                .into_iter()
                .filter(|d| {
                    d.origin() != DefinitionOrigin::Annotation
                        || includes.is_empty()
                        || d
                            .aspect_name()
                            .is_some_and(|n| includes.iter().any(|r| r.is_match(n)))
                })
                .map(|d| {
                    if d.origin() == DefinitionOrigin::Annotation && config.proxy_target_class {
                        d.with_proxy_target_class(true)
                    } else {
                        d
                    }
                })
                .collect();
        }
        definitions.extend(resolve_advisors(&advisors, &beans, universe, diagnostics));

        Self {
            definitions,
            beans,
            bean_list,
            named: NamedPointcuts::new(named),
        }
    }
}

/// Resources declaring the Java classes the definitions are read from,
/// together with their supertypes.
fn backing_resources(inputs: &ProjectInputs, universe: &TypeUniverse) -> HashSet<PathBuf> {
    let mut classes: BTreeSet<&str> = BTreeSet::new();
    for definition in &inputs.definitions {
        if let Some(class) = definition.aspect_class_name() {
            classes.insert(class);
        }
        let bean_class = definition
            .aspect_name()
            .and_then(|name| inputs.beans.get(name))
            .and_then(|bean| bean.class_name.as_deref());
        classes.extend(bean_class);
        if let Some(introduction) = definition.introduction() {
            classes.insert(introduction.implement_interface.as_str());
            classes.extend(introduction.default_impl.as_deref());
        }
    }
    let mut resources = HashSet::new();
    for class in classes {
        let supertypes = universe.supertypes(class);
        let names = std::iter::once(class).chain(supertypes.iter().map(|s| s.as_str()));
        resources.extend(names.filter_map(|n| universe.get(n)).map(|t| t.resource.clone()));
    }
    resources
}

fn reference_markers(reference: &AopReference) -> Vec<Marker> {
    let introduction = reference.kind == AdviceKind::DeclareParents;
    let owner = reference.resource.clone();
    let source_message = if introduction {
        format!("declared on {}", reference.target.link_name())
    } else {
        format!("advises {}", reference.target.link_name())
    };
    let target_message = if introduction {
        format!("aspect declarations {}", reference.source.link_name())
    } else {
        format!("advised by {}", reference.source.link_name())
    };

    let mut markers = vec![Marker {
        resource: reference
            .source
            .resource
            .clone()
            .unwrap_or_else(|| reference.resource.clone()),
        message: source_message,
        severity: Severity::Info,
        line: reference.source.line,
        kind: MarkerKind::Source(reference.kind),
        owner: owner.clone(),
    }];
    if let Some(resource) = &reference.target.resource {
        markers.push(Marker {
            resource: resource.clone(),
            message: target_message.clone(),
            severity: Severity::Info,
            line: reference.target.line,
            kind: MarkerKind::Target(reference.kind),
            owner: owner.clone(),
        });
    } else {
        warn!(target = %reference.target.id, "Advised element has no resource");
    }
    if let Some(bean) = &reference.target_bean {
        markers.push(Marker {
            resource: bean.resource.clone(),
            message: target_message,
            severity: Severity::Info,
            line: bean.line,
            kind: MarkerKind::Target(reference.kind),
            owner,
        });
    }
    markers
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn unreadable_resource_drops_declarations_and_reports() {
        let path = Path::new("/project/src/aop.xml");
        let error = io::Error::from(io::ErrorKind::PermissionDenied);
        let resource = ParsedResource::unreadable(path, &error);
        assert!(resource.unit.is_none());
        assert!(!resource.aspects.has_declarations());
        assert_eq!(resource.aspects.diagnostics.len(), 1);
        let diagnostic = &resource.aspects.diagnostics[0];
        assert_eq!(diagnostic.severity, Severity::Error);
        assert_eq!(diagnostic.kind, DiagnosticKind::Parse);
        assert_eq!(diagnostic.resource, path);
        assert!(diagnostic.message.starts_with("Cannot read resource"));
    }
}
