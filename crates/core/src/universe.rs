//! Project-wide type universe: every type declared in the project's sources,
//! indexed by FQN and resource, with supertype navigation.

use smol_str::SmolStr;
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use weavescope_java::{JavaCompilationUnit, JavaMethod, JavaType};

#[derive(Default, Clone)]
pub struct TypeUniverse {
    types: HashMap<SmolStr, Arc<JavaType>>,
    by_resource: HashMap<PathBuf, Vec<SmolStr>>,
    direct_subtypes: HashMap<SmolStr, Vec<SmolStr>>,
}

impl TypeUniverse {
    pub fn build<'u>(units: impl IntoIterator<Item = &'u JavaCompilationUnit>) -> Self {
        let units: Vec<&JavaCompilationUnit> = units.into_iter().collect();
        let known: HashSet<SmolStr> = units
            .iter()
            .flat_map(|u| u.types.iter().map(|t| t.fqn.clone()))
            .collect();

        let mut universe = TypeUniverse::default();
        for unit in units {
            let linker = Linker::new(unit, &known);
            for ty in &unit.types {
                let ty = linker.link(ty);
                for parent in ty.superclass.iter().chain(ty.interfaces.iter()) {
                    universe
                        .direct_subtypes
                        .entry(parent.clone())
                        .or_default()
                        .push(ty.fqn.clone());
                }
                universe
                    .by_resource
                    .entry(unit.path.clone())
                    .or_default()
                    .push(ty.fqn.clone());
                // First declaration wins on duplicate FQNs.
                universe.types.entry(ty.fqn.clone()).or_insert(Arc::new(ty));
            }
        }
        universe
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub fn get(&self, fqn: &str) -> Option<&Arc<JavaType>> {
        self.types.get(fqn)
    }

    pub fn types(&self) -> impl Iterator<Item = &Arc<JavaType>> {
        self.types.values()
    }

    pub fn types_in(&self, resource: &Path) -> impl Iterator<Item = &Arc<JavaType>> {
        self.by_resource
            .get(resource)
            .into_iter()
            .flatten()
            .filter_map(|fqn| self.types.get(fqn))
    }

    /// All transitive supertypes of `fqn`, nearest first. Names outside the
    /// universe are included but not expanded further.
    pub fn supertypes(&self, fqn: &str) -> Vec<SmolStr> {
        let mut seen: HashSet<SmolStr> = HashSet::new();
        let mut out = Vec::new();
        let mut queue: VecDeque<SmolStr> = VecDeque::new();
        if let Some(ty) = self.types.get(fqn) {
            queue.extend(ty.superclass.iter().cloned());
            queue.extend(ty.interfaces.iter().cloned());
        }
        while let Some(next) = queue.pop_front() {
            if next == fqn || !seen.insert(next.clone()) {
                continue;
            }
            if let Some(ty) = self.types.get(&next) {
                queue.extend(ty.superclass.iter().cloned());
                queue.extend(ty.interfaces.iter().cloned());
            }
            out.push(next);
        }
        out
    }

    /// Interfaces implemented by `fqn`, directly or through superclasses and
    /// superinterfaces. Unresolvable supertypes count as interfaces only when
    /// listed in an `implements`/`extends` interface clause.
    pub fn interfaces_of(&self, fqn: &str) -> Vec<SmolStr> {
        let mut out: Vec<SmolStr> = Vec::new();
        let mut current = self.types.get(fqn).cloned();
        let mut visited = HashSet::new();
        while let Some(ty) = current {
            if !visited.insert(ty.fqn.clone()) {
                break;
            }
            for iface in &ty.interfaces {
                if !out.contains(iface) {
                    out.push(iface.clone());
                }
                for sup in self.supertypes(iface) {
                    if !out.contains(&sup) {
                        out.push(sup);
                    }
                }
            }
            current = ty.superclass.as_ref().and_then(|s| self.types.get(s)).cloned();
        }
        out
    }

    pub fn is_subtype(&self, fqn: &str, of: &str) -> bool {
        fqn == of || of == "java.lang.Object" || self.supertypes(fqn).iter().any(|s| s == of)
    }

    /// Types that transitively extend or implement any of `roots`, roots included.
    pub fn subtype_closure(&self, roots: impl IntoIterator<Item = SmolStr>) -> HashSet<SmolStr> {
        let mut out = HashSet::new();
        let mut queue: VecDeque<SmolStr> = roots.into_iter().collect();
        while let Some(next) = queue.pop_front() {
            if !out.insert(next.clone()) {
                continue;
            }
            if let Some(children) = self.direct_subtypes.get(&next) {
                queue.extend(children.iter().cloned());
            }
        }
        out
    }

    /// Looks `name(parameter_types)` up on `fqn` and then its supertypes.
    /// Empty `parameter_types` matches by name only.
    pub fn find_method(
        &self,
        fqn: &str,
        name: &str,
        parameter_types: &[SmolStr],
    ) -> Option<(Arc<JavaType>, usize)> {
        std::iter::once(SmolStr::new(fqn))
            .chain(self.supertypes(fqn))
            .filter_map(|t| self.types.get(&t).cloned())
            .find_map(|ty| {
                let idx = ty.methods.iter().position(|m| {
                    !m.is_constructor
                        && m.name == name
                        && (parameter_types.is_empty() || m.parameter_types() == parameter_types)
                })?;
                Some((ty, idx))
            })
    }

    /// Supertypes of `fqn` that declare a method with the same signature as `method`.
    pub fn declaring_supertypes(&self, fqn: &str, method: &JavaMethod) -> Vec<Arc<JavaType>> {
        let signature = method.parameter_types();
        self.supertypes(fqn)
            .into_iter()
            .filter_map(|s| self.types.get(&s).cloned())
            .filter(|ty| {
                ty.methods
                    .iter()
                    .any(|m| m.name == method.name && m.parameter_types() == signature)
            })
            .collect()
    }
}

/// Re-resolves names the parser could only guess from a single file: a
/// same-package guess that does not exist in the project is retried against
/// the unit's on-demand imports.
struct Linker<'a> {
    package: Option<&'a str>,
    wildcards: Vec<&'a str>,
    known: &'a HashSet<SmolStr>,
}

impl<'a> Linker<'a> {
    fn new(unit: &'a JavaCompilationUnit, known: &'a HashSet<SmolStr>) -> Self {
        Self {
            package: unit.package.as_deref(),
            wildcards: unit.wildcard_packages().collect(),
            known,
        }
    }

    fn fix(&self, name: &SmolStr) -> SmolStr {
        if self.wildcards.is_empty() {
            return name.clone();
        }
        let dims = name.matches("[]").count();
        let base = name.trim_end_matches("[]");
        if self.known.contains(base) {
            return name.clone();
        }
        let simple = match self.package {
            Some(p) => match base.strip_prefix(p).and_then(|r| r.strip_prefix('.')) {
                Some(simple) if !simple.contains('.') => simple,
                _ => return name.clone(),
            },
            None if !base.contains('.') => base,
            None => return name.clone(),
        };
        for package in &self.wildcards {
            let candidate = format!("{}.{}", package, simple);
            if self.known.contains(candidate.as_str()) {
                return SmolStr::from(format!("{}{}", candidate, "[]".repeat(dims)));
            }
        }
        name.clone()
    }

    fn link(&self, ty: &JavaType) -> JavaType {
        let mut ty = ty.clone();
        if self.wildcards.is_empty() {
            return ty;
        }
        ty.superclass = ty.superclass.as_ref().map(|s| self.fix(s));
        ty.interfaces = ty.interfaces.iter().map(|i| self.fix(i)).collect();
        for a in ty.annotations.iter_mut() {
            a.name = self.fix(&a.name);
        }
        for m in ty.methods.iter_mut() {
            m.return_type = m.return_type.as_ref().map(|r| self.fix(r));
            for p in m.parameters.iter_mut() {
                p.type_name = self.fix(&p.type_name);
            }
            for a in m.annotations.iter_mut() {
                a.name = self.fix(&a.name);
            }
        }
        for f in ty.fields.iter_mut() {
            f.type_name = self.fix(&f.type_name);
            for a in f.annotations.iter_mut() {
                a.name = self.fix(&a.name);
            }
        }
        ty
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use weavescope_java::JavaParser;

    fn unit(path: &str, src: &str) -> JavaCompilationUnit {
        JavaParser::new().unwrap().parse(src, Path::new(path)).unwrap()
    }

    #[test]
    fn navigates_hierarchy_across_units() {
        let units = vec![
            unit("Api.java", "package com.acme; public interface Api { void call(); }"),
            unit("Base.java", "package com.acme; public abstract class Base implements Api {}"),
            unit(
                "Impl.java",
                "package com.acme.impl; import com.acme.*; \
                 public class Impl extends Base { public void call() {} }",
            ),
        ];
        let universe = TypeUniverse::build(&units);

        let impl_ty = universe.get("com.acme.impl.Impl").unwrap();
        assert_eq!(impl_ty.superclass.as_deref(), Some("com.acme.Base"));
        assert!(universe.is_subtype("com.acme.impl.Impl", "com.acme.Api"));
        assert_eq!(universe.interfaces_of("com.acme.impl.Impl"), vec!["com.acme.Api"]);

        let closure = universe.subtype_closure([SmolStr::new("com.acme.Api")]);
        assert!(closure.contains("com.acme.impl.Impl"));

        let call = &impl_ty.methods[0];
        let declaring = universe.declaring_supertypes("com.acme.impl.Impl", call);
        assert_eq!(declaring.len(), 1);
        assert_eq!(declaring[0].fqn, "com.acme.Api");
        assert_eq!(universe.types_in(Path::new("Impl.java")).count(), 1);
    }
}
