//! Turns `<aop:advisor>` declarations into definitions once the advice bean's
//! class can be looked up in the type universe.

use crate::universe::TypeUniverse;
use smol_str::SmolStr;
use std::collections::HashMap;
use weavescope_api::{
    AdviceKind, AdviceMethod, AdvisorDeclaration, AspectDefinition, BeanDefinition,
    DefinitionOrigin, Diagnostic, DiagnosticKind,
};

struct AdviceInterface {
    fqn: &'static str,
    kind: AdviceKind,
    method: &'static str,
    parameters: &'static [&'static str],
}

/// Checked in order; a bean implementing several uses the first.
const ADVICE_INTERFACES: &[AdviceInterface] = &[
    AdviceInterface {
        fqn: "org.aopalliance.intercept.MethodInterceptor",
        kind: AdviceKind::Around,
        method: "invoke",
        parameters: &["org.aopalliance.intercept.MethodInvocation"],
    },
    AdviceInterface {
        fqn: "org.springframework.aop.MethodBeforeAdvice",
        kind: AdviceKind::Before,
        method: "before",
        parameters: &["java.lang.reflect.Method", "java.lang.Object[]", "java.lang.Object"],
    },
    AdviceInterface {
        fqn: "org.springframework.aop.AfterReturningAdvice",
        kind: AdviceKind::AfterReturning,
        method: "afterReturning",
        parameters: &[
            "java.lang.Object",
            "java.lang.reflect.Method",
            "java.lang.Object[]",
            "java.lang.Object",
        ],
    },
    AdviceInterface {
        fqn: "org.springframework.aop.ThrowsAdvice",
        kind: AdviceKind::AfterThrowing,
        method: "afterThrowing",
        parameters: &[
            "java.lang.reflect.Method",
            "java.lang.Object[]",
            "java.lang.Object",
            "java.lang.Exception",
        ],
    },
];

pub fn resolve_advisors(
    advisors: &[&AdvisorDeclaration],
    beans: &HashMap<SmolStr, BeanDefinition>,
    universe: &TypeUniverse,
    diagnostics: &mut Vec<Diagnostic>,
) -> Vec<AspectDefinition> {
    let mut out = Vec::new();
    for advisor in advisors {
        let Some(class_name) = beans
            .get(&advisor.advice_ref)
            .and_then(|b| b.class_name.clone())
            .filter(|c| universe.get(c).is_some())
        else {
            diagnostics.push(Diagnostic::warning(
                DiagnosticKind::Resolution,
                &advisor.resource,
                advisor.start_line,
                format!("Advice bean '{}' cannot be resolved", advisor.advice_ref),
            ));
            continue;
        };
        let Some(advice) = ADVICE_INTERFACES
            .iter()
            .find(|a| universe.is_subtype(&class_name, a.fqn))
        else {
            diagnostics.push(Diagnostic::error(
                DiagnosticKind::Resolution,
                &advisor.resource,
                advisor.start_line,
                format!(
                    "Advice bean '{}' ({}) does not implement a supported advice interface",
                    advisor.advice_ref, class_name
                ),
            ));
            continue;
        };

        // ThrowsAdvice is a tag interface; the implemented overload decides the signature.
        let declared = universe.find_method(&class_name, advice.method, &[]);
        let parameter_types: Vec<SmolStr> = match declared {
            Some((ty, idx)) if advice.kind == AdviceKind::AfterThrowing => {
                ty.methods[idx].parameter_types()
            }
            _ => advice.parameters.iter().map(|p| SmolStr::new(*p)).collect(),
        };

        let result =
            AspectDefinition::builder(advice.kind, DefinitionOrigin::Advisor, &advisor.resource)
                .ordinal(advisor.ordinal)
                .aspect_name(Some(advisor.advice_ref.clone()))
                .aspect_class_name(Some(class_name))
                .advice_method(AdviceMethod {
                    name: SmolStr::new(advice.method),
                    parameter_types,
                    parameter_names: Vec::new(),
                })
                .pointcut(advisor.pointcut.clone())
                .proxy_target_class(advisor.proxy_target_class)
                .lines(advisor.start_line, advisor.end_line)
                .build();
        match result {
            Ok(def) => out.push(def),
            Err(e) => diagnostics.push(Diagnostic::error(
                DiagnosticKind::Parse,
                &advisor.resource,
                advisor.start_line,
                e.to_string(),
            )),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::{Path, PathBuf};
    use weavescope_java::JavaParser;

    #[test]
    fn interceptor_bean_becomes_around_advice() {
        let unit = JavaParser::new()
            .unwrap()
            .parse(
                "package com.acme; import org.aopalliance.intercept.*; \
                 public class Timing implements MethodInterceptor { \
                   public Object invoke(MethodInvocation invocation) { return null; } }",
                Path::new("Timing.java"),
            )
            .unwrap();
        let universe = TypeUniverse::build([&unit]);
        let beans = HashMap::from([(
            SmolStr::new("timing"),
            BeanDefinition {
                id: "timing".into(),
                class_name: Some("com.acme.Timing".into()),
                resource: PathBuf::from("aop.xml"),
                line: 3,
                is_abstract: false,
            },
        )]);
        let declared = |advice_ref: &str| AdvisorDeclaration {
            advice_ref: advice_ref.into(),
            pointcut: "execution(* *(..))".into(),
            proxy_target_class: false,
            resource: PathBuf::from("aop.xml"),
            ordinal: 0,
            start_line: 5,
            end_line: 5,
        };
        let (good, missing) = (declared("timing"), declared("nope"));

        let mut diagnostics = Vec::new();
        let defs = resolve_advisors(&[&good, &missing], &beans, &universe, &mut diagnostics);
        assert_eq!(defs.len(), 1);
        assert_eq!(defs[0].kind(), AdviceKind::Around);
        assert_eq!(
            defs[0].advice_method().parameter_types,
            ["org.aopalliance.intercept.MethodInvocation"]
        );
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].line, 5);
    }
}
