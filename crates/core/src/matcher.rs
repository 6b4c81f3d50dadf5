//! Pointcut Matching Engine: pairs definitions with candidates and shapes
//! the outcome into references.

use crate::enumerate::CandidateElement;
use crate::pointcut::{
    CompileContext, MethodJoinPoint, NamedPointcuts, PointcutError, PointcutEvaluator,
};
use crate::universe::TypeUniverse;
use dashmap::DashMap;
use smol_str::SmolStr;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::trace;
use weavescope_api::{
    AdviceKind, AopReference, AspectDefinition, BeanDefinition, DefinitionId, Diagnostic,
    DiagnosticKind, ElementId, ElementKind, JavaElement,
};
use weavescope_java::{JavaMethod, JavaType};

/// Interfaces that do not make a class JDK-proxied on their own.
const MARKER_INTERFACES: &[&str] = &[
    "java.io.Serializable",
    "java.lang.Cloneable",
    "java.io.Closeable",
    "java.lang.AutoCloseable",
    "org.springframework.beans.factory.InitializingBean",
    "org.springframework.beans.factory.DisposableBean",
    "org.springframework.beans.factory.Aware",
];

const JOIN_POINT_TYPES: &[&str] = &[
    "org.aspectj.lang.JoinPoint",
    "org.aspectj.lang.ProceedingJoinPoint",
    "org.aspectj.lang.JoinPoint.StaticPart",
];

/// Project-wide state a definition is matched against.
pub struct MatchContext<'a> {
    pub universe: &'a TypeUniverse,
    pub named: &'a NamedPointcuts,
    pub beans: &'a HashMap<SmolStr, BeanDefinition>,
}

pub struct AspectDefinitionMatcher<E: PointcutEvaluator> {
    evaluator: E,
    compiled: DashMap<DefinitionId, Arc<Result<E::Compiled, PointcutError>>>,
}

impl<E: PointcutEvaluator> AspectDefinitionMatcher<E> {
    pub fn new(evaluator: E) -> Self {
        Self {
            evaluator,
            compiled: DashMap::new(),
        }
    }

    /// Number of expressions compiled in this pass.
    pub fn cached(&self) -> usize {
        self.compiled.len()
    }

    /// All references `definition` yields over `candidates`. Problems are
    /// reported through `diagnostics` and never abort other definitions.
    pub fn match_definition(
        &self,
        definition: &AspectDefinition,
        candidates: &[CandidateElement],
        ctx: &MatchContext,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Vec<AopReference> {
        let source = match self.source_element(definition, ctx) {
            Ok(source) => source,
            Err(diagnostic) => {
                diagnostics.push(diagnostic);
                return Vec::new();
            }
        };

        let compiled = self
            .compiled
            .entry(definition.id())
            .or_insert_with(|| {
                let mut context = CompileContext::new(source.owner.as_deref(), ctx.named);
                context.bindings = source.bindings.clone();
                Arc::new(self.evaluator.compile(definition, &context))
            })
            .clone();
        let compiled = match compiled.as_ref() {
            Ok(compiled) => compiled,
            Err(e) => {
                let expression = match definition.introduction() {
                    Some(introduction) => introduction.types_matching.as_str(),
                    None => definition.pointcut_expression(),
                };
                diagnostics.push(Diagnostic::error(
                    DiagnosticKind::Matching,
                    definition.resource(),
                    definition.start_line(),
                    format!("Invalid pointcut '{}': {}", expression, e),
                ));
                return Vec::new();
            }
        };

        let mut out = Vec::new();
        for candidate in candidates {
            if definition.kind() == AdviceKind::DeclareParents {
                if self.evaluator.matches_type(compiled, &candidate.ty, ctx.universe) {
                    let target = type_element(&candidate.ty);
                    out.push(self.reference(definition, &source.element, target, candidate));
                }
                continue;
            }
            for method in candidate.methods() {
                if !self.is_proxyable(definition, &candidate.ty, method, ctx.universe) {
                    continue;
                }
                let join_point = MethodJoinPoint {
                    ty: &candidate.ty,
                    method,
                    bean_name: candidate.bean_name.as_deref(),
                };
                if self.evaluator.matches_method(compiled, &join_point, ctx.universe) {
                    let target = method_element(&candidate.ty, method);
                    out.push(self.reference(definition, &source.element, target, candidate));
                }
            }
        }
        trace!(definition = %definition, matched = out.len(), "Matched definition");
        out
    }

    fn reference(
        &self,
        definition: &AspectDefinition,
        source: &JavaElement,
        target: JavaElement,
        candidate: &CandidateElement,
    ) -> AopReference {
        AopReference {
            kind: definition.kind(),
            source: source.clone(),
            target,
            definition: definition.id(),
            resource: definition.resource().to_path_buf(),
            target_bean: candidate.bean.clone(),
        }
    }

    /// Cheap checks that rule a method out before the expression runs.
    fn is_proxyable(
        &self,
        definition: &AspectDefinition,
        ty: &JavaType,
        method: &JavaMethod,
        universe: &TypeUniverse,
    ) -> bool {
        if method.is_constructor || !method.is_public() || method.is_static() {
            return false;
        }
        if definition.is_proxy_target_class() {
            return true;
        }
        let interfaces: Vec<SmolStr> = universe
            .interfaces_of(&ty.fqn)
            .into_iter()
            .filter(|i| !MARKER_INTERFACES.contains(&i.as_str()))
            .collect();
        if interfaces.is_empty() {
            // No usable interface: proxied by subclass.
            return true;
        }
        // JDK proxy: only methods visible through an interface are advised.
        if interfaces.iter().any(|i| universe.get(i).is_none()) {
            return true;
        }
        let interfaces: HashSet<&str> = interfaces.iter().map(SmolStr::as_str).collect();
        universe
            .declaring_supertypes(&ty.fqn, method)
            .iter()
            .any(|s| interfaces.contains(s.fqn.as_str()))
    }

    fn source_element(
        &self,
        definition: &AspectDefinition,
        ctx: &MatchContext,
    ) -> Result<Source, Diagnostic> {
        let class_name: Option<SmolStr> = definition
            .aspect_class_name()
            .map(SmolStr::new)
            .or_else(|| {
                definition
                    .aspect_name()
                    .and_then(|name| ctx.beans.get(name))
                    .and_then(|bean| bean.class_name.clone())
            });
        let declaring = class_name
            .clone()
            .unwrap_or_else(|| SmolStr::new(definition.display_aspect()));
        let ty = class_name.as_deref().and_then(|c| ctx.universe.get(c));

        if let Some(introduction) = definition.introduction() {
            let element = match (&introduction.defining_field, ty) {
                (Some(field), ty) => JavaElement {
                    id: ElementId::for_field(&declaring, field),
                    kind: ElementKind::Field,
                    declaring_type: declaring.clone(),
                    name: field.clone(),
                    resource: Some(
                        ty.map(|t| t.resource.clone())
                            .unwrap_or_else(|| definition.resource().to_path_buf()),
                    ),
                    line: ty
                        .and_then(|t| t.fields.iter().find(|f| f.name == *field))
                        .map(|f| f.line)
                        .unwrap_or(definition.start_line()),
                },
                (None, Some(ty)) => type_element(ty),
                (None, None) => JavaElement {
                    id: ElementId::for_type(&declaring),
                    kind: ElementKind::Type,
                    declaring_type: declaring.clone(),
                    name: declaring.clone(),
                    resource: Some(definition.resource().to_path_buf()),
                    line: definition.start_line(),
                },
            };
            return Ok(Source {
                element,
                owner: class_name,
                bindings: HashMap::new(),
            });
        }

        let advice = definition.advice_method();
        let Some(ty) = ty else {
            // Class unknown or outside the project: identify the advice by name.
            return Ok(Source {
                element: JavaElement {
                    id: ElementId::for_method(&declaring, &advice.name, &advice.parameter_types),
                    kind: ElementKind::Method,
                    declaring_type: declaring,
                    name: advice.name.clone(),
                    resource: Some(definition.resource().to_path_buf()),
                    line: definition.start_line(),
                },
                owner: class_name,
                bindings: bindings(definition, &advice.parameter_names, &advice.parameter_types),
            });
        };

        let found = ctx
            .universe
            .find_method(&ty.fqn, &advice.name, &advice.parameter_types)
            .or_else(|| ctx.universe.find_method(&ty.fqn, &advice.name, &[]));
        let Some((declaring_ty, idx)) = found else {
            return Err(Diagnostic::error(
                DiagnosticKind::Resolution,
                definition.resource(),
                definition.start_line(),
                format!("Advice method '{}' not found on '{}'", advice.name, ty.fqn),
            ));
        };
        let method = &declaring_ty.methods[idx];
        Ok(Source {
            element: method_element(&declaring_ty, method),
            owner: Some(ty.fqn.clone()),
            bindings: bindings(definition, &method.parameter_names(), &method.parameter_types()),
        })
    }
}

struct Source {
    element: JavaElement,
    owner: Option<SmolStr>,
    bindings: HashMap<SmolStr, Option<SmolStr>>,
}

/// Binding names come from `argNames` when given, else the parameter names;
/// a leading join point parameter takes no part in binding.
fn bindings(
    definition: &AspectDefinition,
    names: &[SmolStr],
    types: &[SmolStr],
) -> HashMap<SmolStr, Option<SmolStr>> {
    let names: &[SmolStr] = if definition.arg_names().is_empty() {
        names
    } else {
        definition.arg_names()
    };
    let skip_join_point = types
        .first()
        .is_some_and(|t| {
            JOIN_POINT_TYPES.contains(&t.as_str()) || t == "JoinPoint" || t == "ProceedingJoinPoint"
        });
    let (names, types) = match (skip_join_point, names.first()) {
        (true, _) if names.len() < types.len() => (names, &types[1..]),
        (true, Some(_)) => (&names[1..], &types[1..]),
        _ => (names, types),
    };
    let excluded = [definition.returning(), definition.throwing()];
    names
        .iter()
        .enumerate()
        .filter(|(_, n)| !excluded.contains(&Some(n.as_str())))
        .map(|(i, n)| (n.clone(), types.get(i).cloned()))
        .collect()
}

fn method_element(ty: &JavaType, method: &JavaMethod) -> JavaElement {
    JavaElement {
        id: method.element_id(&ty.fqn),
        kind: if method.is_constructor {
            ElementKind::Constructor
        } else {
            ElementKind::Method
        },
        declaring_type: ty.fqn.clone(),
        name: method.name.clone(),
        resource: Some(ty.resource.clone()),
        line: method.start_line,
    }
}

fn type_element(ty: &JavaType) -> JavaElement {
    JavaElement {
        id: ty.element_id(),
        kind: ElementKind::Type,
        declaring_type: ty.fqn.clone(),
        name: ty.simple_name.clone(),
        resource: Some(ty.resource.clone()),
        line: ty.start_line,
    }
}
