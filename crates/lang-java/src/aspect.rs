//! Annotation-style (`@Aspect`) aspect definitions.

use crate::model::{JavaAnnotation, JavaCompilationUnit, JavaMethod, JavaType};
use crate::naming::{TypeNameResolver, decapitalize};
use crate::parser::JavaParser;
use smol_str::SmolStr;
use std::path::Path;
use weavescope_api::{
    AdviceKind, AdviceMethod, AspectDefinition, AspectDefinitionSource, AutoProxyConfig,
    DefinitionOrigin, Diagnostic, DiagnosticKind, Introduction, NamedPointcut, ParsedAspects,
    ResultBinding,
};

const STEREOTYPES: &[&str] = &["Component", "Service", "Repository", "Controller"];

pub struct AnnotationAspectSource {
    parser: JavaParser,
}

impl AnnotationAspectSource {
    pub fn new(parser: JavaParser) -> Self {
        Self { parser }
    }

    /// Extracts aspect definitions from an already parsed unit.
    pub fn from_unit(unit: &JavaCompilationUnit) -> ParsedAspects {
        let mut out = ParsedAspects::default();
        if unit.has_syntax_errors {
            out.diagnostics.push(Diagnostic::warning(
                DiagnosticKind::Parse,
                &unit.path,
                0,
                "Compilation unit contains syntax errors; declarations may be incomplete",
            ));
        }

        let mut resolver = TypeNameResolver::new(unit.package.clone(), &unit.imports);
        for ty in &unit.types {
            resolver.declare(&ty.simple_name, &ty.fqn);
        }

        let mut ordinal = 0;
        for ty in &unit.types {
            if let Some(enable) = ty.annotation("EnableAspectJAutoProxy") {
                let config = AutoProxyConfig {
                    proxy_target_class: enable
                        .value("proxyTargetClass")
                        .and_then(|v| v.as_bool())
                        .unwrap_or(false),
                    include_patterns: Vec::new(),
                };
                out.auto_proxy
                    .get_or_insert_with(AutoProxyConfig::default)
                    .merge(&config);
            }

            let Some(aspect) = ty.annotation("Aspect") else {
                continue;
            };
            if ty.is_abstract() {
                continue;
            }
            let instantiation = aspect.string("value").unwrap_or_default().trim();
            if instantiation.starts_with("percflow") {
                out.diagnostics.push(Diagnostic::warning(
                    DiagnosticKind::Parse,
                    &unit.path,
                    aspect.line,
                    format!(
                        "Aspect '{}' uses percflow instantiation, \
                         which proxy-based AOP does not support",
                        ty.fqn
                    ),
                ));
                continue;
            }

            let bean_name = bean_name(ty);
            for method in &ty.methods {
                if let Some(pointcut) = method.annotation("Pointcut") {
                    out.named_pointcuts.push(NamedPointcut {
                        owner: ty.fqn.clone(),
                        name: method.name.clone(),
                        expression: SmolStr::new(pointcut_expression(pointcut).unwrap_or_default()),
                        parameter_names: method.parameter_names(),
                    });
                    continue;
                }
                if let Some((kind, annotation)) = advice_annotation(method) {
                    let definition =
                        advice_definition(unit, ty, &bean_name, method, kind, annotation, ordinal);
                    match definition {
                        Ok(def) => out.definitions.push(def),
                        Err(e) => out.diagnostics.push(Diagnostic::error(
                            DiagnosticKind::Parse,
                            &unit.path,
                            method.start_line,
                            e.to_string(),
                        )),
                    }
                    ordinal += 1;
                }
            }

            for field in &ty.fields {
                let Some(declare) = field.annotation("DeclareParents") else {
                    continue;
                };
                let introduction = Introduction {
                    types_matching: SmolStr::new(pointcut_expression(declare).unwrap_or_default()),
                    implement_interface: field.type_name.clone(),
                    default_impl: declare
                        .value("defaultImpl")
                        .and_then(|v| v.as_class_literal())
                        .map(|c| resolver.resolve(c)),
                    defining_field: Some(field.name.clone()),
                };
                let result = AspectDefinition::builder(
                    AdviceKind::DeclareParents,
                    DefinitionOrigin::Annotation,
                    &unit.path,
                )
                .ordinal(ordinal)
                .aspect_name(Some(bean_name.as_str()))
                .aspect_class_name(Some(ty.fqn.clone()))
                .advice_method(AdviceMethod::named(field.name.clone()))
                .introduction(introduction)
                .lines(field.line, field.line)
                .build();
                match result {
                    Ok(def) => out.definitions.push(def),
                    Err(e) => out.diagnostics.push(Diagnostic::error(
                        DiagnosticKind::Parse,
                        &unit.path,
                        field.line,
                        e.to_string(),
                    )),
                }
                ordinal += 1;
            }
        }
        out
    }
}

impl AspectDefinitionSource for AnnotationAspectSource {
    fn name(&self) -> &'static str {
        "annotation"
    }

    fn supports(&self, path: &Path) -> bool {
        path.extension().is_some_and(|e| e == "java")
    }

    fn parse(&self, path: &Path, content: &str) -> ParsedAspects {
        match self.parser.parse(content, path) {
            Ok(unit) => Self::from_unit(&unit),
            Err(e) => ParsedAspects {
                diagnostics: vec![Diagnostic::error(
                    DiagnosticKind::Parse,
                    path,
                    0,
                    e.to_string(),
                )],
                ..Default::default()
            },
        }
    }
}

/// Bean name of an annotated class: an explicit stereotype value, otherwise
/// the decapitalized simple name.
pub fn bean_name(ty: &JavaType) -> String {
    STEREOTYPES
        .iter()
        .filter_map(|s| ty.annotation(s))
        .find_map(|a| a.string("value").filter(|v| !v.is_empty()))
        .map(str::to_string)
        .unwrap_or_else(|| decapitalize(&ty.simple_name))
}

fn advice_annotation(method: &JavaMethod) -> Option<(AdviceKind, &JavaAnnotation)> {
    method.annotations.iter().find_map(|a| {
        let kind = AdviceKind::from_annotation(a.simple_name())?;
        (!kind.is_introduction()).then_some((kind, a))
    })
}

/// `pointcut` takes precedence over `value`, as in the annotation contract.
fn pointcut_expression(annotation: &JavaAnnotation) -> Option<&str> {
    annotation
        .string("pointcut")
        .filter(|p| !p.trim().is_empty())
        .or_else(|| annotation.string("value"))
}

fn advice_definition(
    unit: &JavaCompilationUnit,
    ty: &JavaType,
    bean_name: &str,
    method: &JavaMethod,
    kind: AdviceKind,
    annotation: &JavaAnnotation,
    ordinal: usize,
) -> weavescope_api::ApiResult<AspectDefinition> {
    let arg_names: Vec<SmolStr> = annotation
        .string("argNames")
        .map(|names| {
            names
                .split(',')
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .map(SmolStr::new)
                .collect()
        })
        .unwrap_or_default();
    let binding = match (annotation.string("returning"), annotation.string("throwing")) {
        (Some(r), _) if !r.is_empty() => ResultBinding::Returning(SmolStr::new(r)),
        (_, Some(t)) if !t.is_empty() => ResultBinding::Throwing(SmolStr::new(t)),
        _ => ResultBinding::None,
    };

    AspectDefinition::builder(kind, DefinitionOrigin::Annotation, &unit.path)
        .ordinal(ordinal)
        .aspect_name(Some(bean_name))
        .aspect_class_name(Some(ty.fqn.clone()))
        .advice_method(AdviceMethod {
            name: method.name.clone(),
            parameter_types: method.parameter_types(),
            parameter_names: method.parameter_names(),
        })
        .pointcut(pointcut_expression(annotation).unwrap_or_default())
        .arg_names(arg_names)
        .binding(binding)
        .lines(method.start_line, method.end_line)
        .build()
}
