use super::ast::{MethodPattern, PointcutExpr, TypeArg};
use super::pattern::{ArgPattern, TypePattern, match_sequence};
use super::{CompileContext, MethodJoinPoint, PointcutError, PointcutEvaluator, parser};
use crate::universe::TypeUniverse;
use smol_str::SmolStr;
use std::collections::HashMap;
use weavescope_api::{AspectDefinition, NamedPointcut};
use weavescope_java::{JavaAnnotation, JavaType};

const OBJECT: &str = "java.lang.Object";

#[derive(Debug, Clone)]
pub enum CompiledPointcut {
    Expression(PointcutExpr),
    Introduction {
        types: TypePattern,
        interface: SmolStr,
    },
}

#[derive(Debug, Default, Clone, Copy)]
pub struct AspectJEvaluator;

impl PointcutEvaluator for AspectJEvaluator {
    type Compiled = CompiledPointcut;

    fn compile(
        &self,
        definition: &AspectDefinition,
        context: &CompileContext,
    ) -> Result<CompiledPointcut, PointcutError> {
        if let Some(introduction) = definition.introduction() {
            return Ok(CompiledPointcut::Introduction {
                types: TypePattern::parse(introduction.types_matching.trim(), 0)?,
                interface: introduction.implement_interface.clone(),
            });
        }
        let expr = parser::parse(definition.pointcut_expression())?;
        let mut resolver = Resolver {
            context,
            stack: Vec::new(),
        };
        let expr = resolver.resolve(expr, context.owner, &context.bindings)?;
        Ok(CompiledPointcut::Expression(expr))
    }

    fn matches_method(
        &self,
        compiled: &CompiledPointcut,
        join_point: &MethodJoinPoint,
        universe: &TypeUniverse,
    ) -> bool {
        match compiled {
            CompiledPointcut::Expression(expr) => Matcher { universe }.expr(expr, join_point),
            CompiledPointcut::Introduction { .. } => false,
        }
    }

    fn matches_type(
        &self,
        compiled: &CompiledPointcut,
        ty: &JavaType,
        universe: &TypeUniverse,
    ) -> bool {
        match compiled {
            CompiledPointcut::Introduction { types, interface } => {
                ty.fqn != *interface
                    && types.matches(&ty.fqn, universe)
                    && !universe.is_subtype(&ty.fqn, interface)
            }
            CompiledPointcut::Expression(_) => false,
        }
    }
}

type Bindings = HashMap<SmolStr, Option<SmolStr>>;

/// Turns identifiers into bound parameters and inlines named pointcut references.
struct Resolver<'c, 'a> {
    context: &'c CompileContext<'a>,
    stack: Vec<(SmolStr, SmolStr)>,
}

impl Resolver<'_, '_> {
    fn resolve(
        &mut self,
        expr: PointcutExpr,
        owner: Option<&str>,
        bindings: &Bindings,
    ) -> Result<PointcutExpr, PointcutError> {
        let type_arg = |arg: TypeArg| match arg {
            TypeArg::Type(pattern) => match pattern.as_identifier().and_then(|n| bindings.get(n)) {
                Some(bound) => TypeArg::Bound(bound.clone()),
                None => TypeArg::Type(pattern),
            },
            bound => bound,
        };
        let arg_list = |args: Vec<ArgPattern>| -> Vec<ArgPattern> {
            args.into_iter()
                .map(|arg| match arg {
                    ArgPattern::Type(pattern) => {
                        match pattern.as_identifier().and_then(|n| bindings.get(n)) {
                            Some(bound) => ArgPattern::Bound(bound.clone()),
                            None => ArgPattern::Type(pattern),
                        }
                    }
                    other => other,
                })
                .collect()
        };

        Ok(match expr {
            PointcutExpr::And(a, b) => PointcutExpr::And(
                Box::new(self.resolve(*a, owner, bindings)?),
                Box::new(self.resolve(*b, owner, bindings)?),
            ),
            PointcutExpr::Or(a, b) => PointcutExpr::Or(
                Box::new(self.resolve(*a, owner, bindings)?),
                Box::new(self.resolve(*b, owner, bindings)?),
            ),
            PointcutExpr::Not(inner) => {
                PointcutExpr::Not(Box::new(self.resolve(*inner, owner, bindings)?))
            }
            PointcutExpr::This(arg) => PointcutExpr::This(type_arg(arg)),
            PointcutExpr::Target(arg) => PointcutExpr::Target(type_arg(arg)),
            PointcutExpr::AtAnnotation(arg) => PointcutExpr::AtAnnotation(type_arg(arg)),
            PointcutExpr::AtWithin(arg) => PointcutExpr::AtWithin(type_arg(arg)),
            PointcutExpr::AtTarget(arg) => PointcutExpr::AtTarget(type_arg(arg)),
            PointcutExpr::Args(args) => PointcutExpr::Args(arg_list(args)),
            PointcutExpr::AtArgs(args) => PointcutExpr::AtArgs(arg_list(args)),
            PointcutExpr::Reference {
                owner: written,
                name,
                args,
                position,
            } => {
                let table = self.context.named;
                let named = table
                    .lookup(written.as_deref(), owner, &name)
                    .ok_or_else(|| {
                        PointcutError::new(format!("unknown pointcut '{}'", name), position)
                    })?;
                self.inline(named, &args, bindings, position)?
            }
            other => other,
        })
    }

    fn inline(
        &mut self,
        named: &NamedPointcut,
        args: &[SmolStr],
        outer: &Bindings,
        position: usize,
    ) -> Result<PointcutExpr, PointcutError> {
        let key = (named.owner.clone(), named.name.clone());
        if self.stack.contains(&key) {
            return Err(PointcutError::new(
                format!("circular pointcut reference '{}'", named.name),
                position,
            ));
        }
        if args.len() != named.parameter_names.len() {
            return Err(PointcutError::new(
                format!(
                    "pointcut '{}' expects {} argument(s) but got {}",
                    named.name,
                    named.parameter_names.len(),
                    args.len()
                ),
                position,
            ));
        }
        let inner: Bindings = named
            .parameter_names
            .iter()
            .zip(args)
            .map(|(param, arg)| {
                let bound = outer.get(arg).cloned().unwrap_or_else(|| Some(arg.clone()));
                (param.clone(), bound)
            })
            .collect();
        let expr = parser::parse(&named.expression).map_err(|e| {
            PointcutError::new(format!("in pointcut '{}': {}", named.name, e.message), position)
        })?;

        self.stack.push(key);
        let resolved = self.resolve(expr, Some(named.owner.as_str()), &inner);
        self.stack.pop();
        resolved
    }
}

struct Matcher<'u> {
    universe: &'u TypeUniverse,
}

impl Matcher<'_> {
    fn expr(&self, expr: &PointcutExpr, jp: &MethodJoinPoint) -> bool {
        match expr {
            PointcutExpr::And(a, b) => self.expr(a, jp) && self.expr(b, jp),
            PointcutExpr::Or(a, b) => self.expr(a, jp) || self.expr(b, jp),
            PointcutExpr::Not(inner) => !self.expr(inner, jp),
            PointcutExpr::Execution(pattern) => self.execution(pattern, jp),
            PointcutExpr::Within(pattern) => pattern.matches(&jp.ty.fqn, self.universe),
            PointcutExpr::This(arg) | PointcutExpr::Target(arg) => {
                self.instance_of(arg, &jp.ty.fqn)
            }
            PointcutExpr::Args(patterns) => {
                let types = jp.method.parameter_types();
                match_sequence(patterns, &types, &|p, v: &SmolStr| self.arg(p, v))
            }
            PointcutExpr::Bean(matcher) => jp.bean_name.is_some_and(|b| matcher.is_match(b)),
            PointcutExpr::AtAnnotation(arg) => self.annotated(arg, &jp.method.annotations),
            PointcutExpr::AtWithin(arg) | PointcutExpr::AtTarget(arg) => {
                self.annotated(arg, &jp.ty.annotations)
            }
            PointcutExpr::AtArgs(patterns) => {
                let types = jp.method.parameter_types();
                match_sequence(patterns, &types, &|p, v: &SmolStr| self.annotated_arg(p, v))
            }
            // Inlined during compilation.
            PointcutExpr::Reference { .. } => false,
        }
    }

    fn execution(&self, pattern: &MethodPattern, jp: &MethodJoinPoint) -> bool {
        let method = jp.method;
        if method.is_constructor || !pattern.name.is_match(&method.name) {
            return false;
        }
        if pattern
            .modifiers
            .iter()
            .any(|m| method.has_modifier(&m.modifier) == m.negated)
        {
            return false;
        }
        let return_type = method.return_type.as_deref().unwrap_or("void");
        if !pattern.return_type.matches(return_type, self.universe) {
            return false;
        }
        let types = method.parameter_types();
        let params_match = match_sequence(&pattern.params, &types, &|p, v: &SmolStr| match p {
            ArgPattern::Type(t) => t.matches(v, self.universe),
            other => self.arg(other, v),
        });
        if !params_match {
            return false;
        }
        match &pattern.declaring_type {
            None => true,
            Some(declaring) => {
                declaring.matches(&jp.ty.fqn, self.universe)
                    || self
                        .universe
                        .declaring_supertypes(&jp.ty.fqn, method)
                        .iter()
                        .any(|s| declaring.matches(&s.fqn, self.universe))
            }
        }
    }

    fn instance_of(&self, arg: &TypeArg, fqn: &str) -> bool {
        match arg {
            TypeArg::Type(pattern) => pattern.matches_assignable(fqn, self.universe),
            TypeArg::Bound(Some(bound)) => self.assignable(fqn, bound),
            TypeArg::Bound(None) => true,
        }
    }

    fn assignable(&self, value: &str, to: &str) -> bool {
        to == OBJECT || value == to || self.universe.is_subtype(value, to)
    }

    fn arg(&self, pattern: &ArgPattern, value: &SmolStr) -> bool {
        match pattern {
            ArgPattern::AnySequence | ArgPattern::Any | ArgPattern::Bound(None) => true,
            ArgPattern::Type(t) => t.matches_assignable(value, self.universe),
            ArgPattern::Bound(Some(bound)) => self.assignable(value, bound),
        }
    }

    fn annotated(&self, arg: &TypeArg, annotations: &[JavaAnnotation]) -> bool {
        match arg {
            TypeArg::Type(pattern) => annotations
                .iter()
                .any(|a| pattern.matches(&a.name, self.universe)),
            TypeArg::Bound(Some(bound)) => annotations.iter().any(|a| {
                a.name == *bound || (!bound.contains('.') && a.simple_name() == bound.as_str())
            }),
            TypeArg::Bound(None) => !annotations.is_empty(),
        }
    }

    fn annotated_arg(&self, pattern: &ArgPattern, value: &SmolStr) -> bool {
        let annotations = self
            .universe
            .get(value)
            .map(|ty| ty.annotations.as_slice())
            .unwrap_or_default();
        match pattern {
            ArgPattern::AnySequence | ArgPattern::Any => true,
            ArgPattern::Type(t) => self.annotated(&TypeArg::Type(t.clone()), annotations),
            ArgPattern::Bound(bound) => self.annotated(&TypeArg::Bound(bound.clone()), annotations),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::NamedPointcuts;
    use super::*;
    use std::path::Path;
    use weavescope_api::{AdviceKind, AdviceMethod, DefinitionOrigin};
    use weavescope_java::JavaParser;

    const SOURCE: &str = r#"
package com.acme;

public interface Api { String find(Long id); }

@Audited
class Service implements Api {
    @Tx
    public String find(Long id) { return null; }
    public void save(String name, int count) {}
    private void hidden() {}
}
"#;

    fn universe() -> TypeUniverse {
        let unit = JavaParser::new().unwrap().parse(SOURCE, Path::new("Service.java")).unwrap();
        TypeUniverse::build([&unit])
    }

    fn def(expression: &str) -> AspectDefinition {
        let resource = Path::new("A.java");
        AspectDefinition::builder(AdviceKind::Before, DefinitionOrigin::Annotation, resource)
            .aspect_class_name(Some("com.acme.Aspect"))
            .advice_method(AdviceMethod::named("advise"))
            .pointcut(expression)
            .build()
            .unwrap()
    }

    fn matching(
        expression: &str,
        named: &NamedPointcuts,
        bindings: &[(&str, Option<&str>)],
    ) -> Vec<String> {
        let universe = universe();
        let mut context = CompileContext::new(Some("com.acme.Aspect"), named);
        for (name, ty) in bindings {
            context.bindings.insert(SmolStr::new(*name), ty.map(SmolStr::new));
        }
        let evaluator = AspectJEvaluator;
        let compiled = evaluator.compile(&def(expression), &context).unwrap();
        let ty = universe.get("com.acme.Service").unwrap().clone();
        ty.methods
            .iter()
            .filter(|m| {
                let jp = MethodJoinPoint {
                    ty: &ty,
                    method: m,
                    bean_name: Some("service"),
                };
                evaluator.matches_method(&compiled, &jp, &universe)
            })
            .map(|m| m.name.to_string())
            .collect()
    }

    #[test]
    fn execution_through_interface_declaration() {
        let named = NamedPointcuts::default();
        assert_eq!(matching("execution(* com.acme.Api.*(..))", &named, &[]), ["find"]);
        assert_eq!(matching("execution(void save(String, *))", &named, &[]), ["save"]);
        assert_eq!(matching("execution(private * *(..))", &named, &[]), ["hidden"]);
        assert!(matching("execution(* *(String))", &named, &[]).is_empty());
    }

    #[test]
    fn designators_and_bindings() {
        let named = NamedPointcuts::default();
        assert_eq!(matching("@annotation(com.acme.Tx)", &named, &[]), ["find"]);
        assert_eq!(matching("@within(Audited) && args(Long)", &named, &[]), ["find"]);
        let name = [("name", Some("java.lang.String"))];
        assert_eq!(matching("bean(serv*) && args(name, ..)", &named, &name), ["save"]);
        assert_eq!(
            matching("target(Api) && !execution(* find(..))", &named, &[]).len(),
            2
        );
    }

    #[test]
    fn named_references_inline_with_parameters() {
        let pointcuts = [
            NamedPointcut {
                owner: "com.acme.Aspect".into(),
                name: "writes".into(),
                expression: "execution(* save(..)) && args(value, ..)".into(),
                parameter_names: vec!["value".into()],
            },
            NamedPointcut {
                owner: "com.acme.Aspect".into(),
                name: "loop".into(),
                expression: "loop()".into(),
                parameter_names: vec![],
            },
        ];
        let named = NamedPointcuts::new(&pointcuts);
        assert_eq!(matching("writes(s)", &named, &[("s", Some("java.lang.String"))]), ["save"]);
        assert!(matching("writes(s)", &named, &[("s", Some("java.lang.Long"))]).is_empty());

        let context = CompileContext::new(Some("com.acme.Aspect"), &named);
        let err = AspectJEvaluator.compile(&def("loop()"), &context).unwrap_err();
        assert!(err.message.contains("circular"));
        let err = AspectJEvaluator.compile(&def("missing()"), &context).unwrap_err();
        assert!(err.message.contains("unknown pointcut"));
    }
}
