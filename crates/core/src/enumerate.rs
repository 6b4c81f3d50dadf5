//! Candidate join point enumeration.
//!
//! Candidates come from two places: bean definitions whose class resolves in
//! the type universe (carrying the bean as the proxy target), and a raw scan
//! of every remaining concrete type.

use crate::universe::TypeUniverse;
use smol_str::SmolStr;
use std::collections::HashSet;
use std::sync::Arc;
use weavescope_api::{BeanDefinition, BeanRef, Diagnostic, DiagnosticKind};
use weavescope_java::{JavaMethod, JavaType, JavaTypeKind};

/// Types that are part of the proxy machinery and never advised themselves.
const INFRASTRUCTURE: &[&str] = &[
    "org.springframework.beans.factory.FactoryBean",
    "org.aopalliance.aop.Advice",
    "org.springframework.aop.Advisor",
    "org.springframework.aop.Pointcut",
    "org.springframework.aop.framework.AopInfrastructureBean",
];

/// Which types a build pass re-enumerates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeScope {
    Full,
    Types(HashSet<SmolStr>),
}

impl ChangeScope {
    pub fn includes(&self, fqn: &str) -> bool {
        match self {
            ChangeScope::Full => true,
            ChangeScope::Types(types) => types.contains(fqn),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CandidateElement {
    pub ty: Arc<JavaType>,
    /// Set when the candidate was found through a bean definition.
    pub bean: Option<BeanRef>,
    pub bean_name: Option<SmolStr>,
}

impl CandidateElement {
    pub fn methods(&self) -> impl Iterator<Item = &JavaMethod> {
        self.ty.methods.iter().filter(|m| !m.is_constructor)
    }
}

pub struct CandidateEnumerator<'a> {
    universe: &'a TypeUniverse,
    beans: &'a [BeanDefinition],
    excluded_types: HashSet<SmolStr>,
    excluded_beans: HashSet<SmolStr>,
}

impl<'a> CandidateEnumerator<'a> {
    pub fn new(universe: &'a TypeUniverse, beans: &'a [BeanDefinition]) -> Self {
        Self {
            universe,
            beans,
            excluded_types: HashSet::new(),
            excluded_beans: HashSet::new(),
        }
    }

    /// Aspect beans are not targets of their own or other aspects.
    pub fn exclude_bean(mut self, bean: impl Into<SmolStr>) -> Self {
        self.excluded_beans.insert(bean.into());
        self
    }

    pub fn exclude_type(mut self, fqn: impl Into<SmolStr>) -> Self {
        self.excluded_types.insert(fqn.into());
        self
    }

    pub fn enumerate(
        &self,
        scope: &ChangeScope,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Vec<CandidateElement> {
        let mut out = Vec::new();
        let mut bean_backed: HashSet<SmolStr> = HashSet::new();

        for bean in self.beans {
            if bean.is_abstract || self.excluded_beans.contains(&bean.id) {
                continue;
            }
            let Some(class_name) = &bean.class_name else {
                continue;
            };
            let Some(ty) = self.universe.get(class_name) else {
                if self.is_project_package(class_name) {
                    diagnostics.push(Diagnostic::warning(
                        DiagnosticKind::Resolution,
                        &bean.resource,
                        bean.line,
                        format!("Class '{}' of bean '{}' cannot be resolved", class_name, bean.id),
                    ));
                }
                continue;
            };
            bean_backed.insert(ty.fqn.clone());
            if !scope.includes(&ty.fqn) || !self.is_advisable(ty) {
                continue;
            }
            out.push(CandidateElement {
                ty: Arc::clone(ty),
                bean: Some(BeanRef {
                    id: bean.id.clone(),
                    resource: bean.resource.clone(),
                    line: bean.line,
                }),
                bean_name: Some(bean.id.clone()),
            });
        }

        let mut raw: Vec<&Arc<JavaType>> = self
            .universe
            .types()
            .filter(|ty| !bean_backed.contains(&ty.fqn))
            .filter(|ty| scope.includes(&ty.fqn) && self.is_advisable(ty))
            .collect();
        raw.sort_by(|a, b| a.fqn.cmp(&b.fqn));
        out.extend(raw.into_iter().map(|ty| CandidateElement {
            ty: Arc::clone(ty),
            bean: None,
            bean_name: Some(SmolStr::new(weavescope_java::aspect::bean_name(ty))),
        }));
        out
    }

    fn is_advisable(&self, ty: &JavaType) -> bool {
        ty.kind != JavaTypeKind::Interface
            && ty.kind != JavaTypeKind::Enum
            && ty.kind != JavaTypeKind::Annotation
            && !ty.is_abstract()
            && ty.annotation("Aspect").is_none()
            && !self.excluded_types.contains(&ty.fqn)
            && !INFRASTRUCTURE
                .iter()
                .any(|infra| self.universe.is_subtype(&ty.fqn, infra))
    }

    /// Classes outside every package the project declares belong to libraries
    /// and are expected not to resolve.
    fn is_project_package(&self, class_name: &str) -> bool {
        let Some((package, _)) = class_name.rsplit_once('.') else {
            return false;
        };
        self.universe.types().any(|ty| ty.package() == package)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::{Path, PathBuf};
    use weavescope_java::JavaParser;

    fn universe(sources: &[(&str, &str)]) -> TypeUniverse {
        let parser = JavaParser::new().unwrap();
        let units: Vec<_> = sources
            .iter()
            .map(|(path, src)| parser.parse(src, Path::new(path)).unwrap())
            .collect();
        TypeUniverse::build(&units)
    }

    fn bean(id: &str, class: &str) -> BeanDefinition {
        BeanDefinition {
            id: id.into(),
            class_name: Some(class.into()),
            resource: PathBuf::from("beans.xml"),
            line: 4,
            is_abstract: false,
        }
    }

    #[test]
    fn filters_unadvisable_types_and_prefers_beans() {
        let universe = universe(&[
            ("Api.java", "package com.acme; public interface Api {}"),
            ("Base.java", "package com.acme; public abstract class Base {}"),
            (
                "Service.java",
                "package com.acme; \
                 public class Service extends Base implements Api { public void run() {} }",
            ),
            ("Audit.java", "package com.acme; @Aspect public class Audit {}"),
            ("Mode.java", "package com.acme; public enum Mode { A }"),
            (
                "Factory.java",
                "package com.acme; import org.springframework.beans.factory.FactoryBean; \
                 public class Factory implements FactoryBean {}",
            ),
            ("Plain.java", "package com.acme; public class Plain {}"),
        ]);
        let beans = vec![
            bean("svc", "com.acme.Service"),
            bean("ghost", "com.acme.Ghost"),
            bean("ds", "org.lib.DataSource"),
        ];
        let mut diagnostics = Vec::new();
        let candidates = CandidateEnumerator::new(&universe, &beans)
            .enumerate(&ChangeScope::Full, &mut diagnostics);

        let names: Vec<(&str, Option<&str>)> = candidates
            .iter()
            .map(|c| (c.ty.fqn.as_str(), c.bean.as_ref().map(|b| b.id.as_str())))
            .collect();
        assert_eq!(names, [("com.acme.Service", Some("svc")), ("com.acme.Plain", None)]);
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].message.contains("com.acme.Ghost"));
        assert_eq!(candidates[1].bean_name.as_deref(), Some("plain"));
    }

    #[test]
    fn scope_limits_types() {
        let universe = universe(&[
            ("A.java", "package p; public class A {}"),
            ("B.java", "package p; public class B {}"),
        ]);
        let scope = ChangeScope::Types(HashSet::from([SmolStr::new("p.B")]));
        let candidates =
            CandidateEnumerator::new(&universe, &[]).enumerate(&scope, &mut Vec::new());
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].ty.fqn, "p.B");
    }
}
