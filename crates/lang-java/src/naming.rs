use crate::model::ImportDecl;
use smol_str::SmolStr;
use std::collections::HashMap;

pub const PRIMITIVES: &[&str] = &[
    "boolean", "byte", "char", "short", "int", "long", "float", "double", "void",
];

/// `java.lang` members that show up in signatures often enough to matter.
const JAVA_LANG: &[&str] = &[
    "Object", "String", "Class", "Boolean", "Byte", "Character", "Short", "Integer", "Long",
    "Float", "Double", "Number", "Void", "Enum", "Iterable", "Runnable", "Comparable",
    "CharSequence", "Throwable", "Exception", "RuntimeException", "Error",
    "IllegalArgumentException", "IllegalStateException", "NullPointerException",
    "UnsupportedOperationException", "Override", "Deprecated", "FunctionalInterface",
    "SuppressWarnings", "AutoCloseable", "Thread", "StringBuilder", "Math", "System",
];

/// Library types resolvable through on-demand imports without their sources.
pub const WELL_KNOWN_TYPES: &[&str] = &[
    "java.lang.reflect.Method",
    "java.util.List",
    "java.util.Map",
    "java.util.Set",
    "java.util.Collection",
    "java.util.Optional",
    "org.aopalliance.intercept.MethodInterceptor",
    "org.aopalliance.intercept.MethodInvocation",
    "org.springframework.aop.MethodBeforeAdvice",
    "org.springframework.aop.AfterReturningAdvice",
    "org.springframework.aop.ThrowsAdvice",
    "org.springframework.beans.factory.FactoryBean",
    "org.springframework.stereotype.Component",
    "org.springframework.stereotype.Service",
    "org.springframework.stereotype.Repository",
    "org.springframework.stereotype.Controller",
    "org.springframework.context.annotation.EnableAspectJAutoProxy",
    "org.aspectj.lang.JoinPoint",
    "org.aspectj.lang.ProceedingJoinPoint",
    "org.aspectj.lang.annotation.Aspect",
    "org.aspectj.lang.annotation.Pointcut",
    "org.aspectj.lang.annotation.Before",
    "org.aspectj.lang.annotation.After",
    "org.aspectj.lang.annotation.Around",
    "org.aspectj.lang.annotation.AfterReturning",
    "org.aspectj.lang.annotation.AfterThrowing",
    "org.aspectj.lang.annotation.DeclareParents",
];

/// Resolves type names written in one compilation unit.
///
/// Lookup order follows Java's scoping: types declared in the unit, single
/// type imports, `java.lang`, well-known library types reachable through an
/// on-demand import, and finally the unit's own package.
pub struct TypeNameResolver {
    package: Option<SmolStr>,
    declared: HashMap<SmolStr, SmolStr>,
    single: HashMap<SmolStr, SmolStr>,
    on_demand: Vec<SmolStr>,
}

impl TypeNameResolver {
    pub fn new(package: Option<SmolStr>, imports: &[ImportDecl]) -> Self {
        let mut single = HashMap::new();
        let mut on_demand = Vec::new();
        for import in imports.iter().filter(|i| !i.is_static) {
            if import.wildcard {
                on_demand.push(import.path.clone());
            } else if let Some(simple) = import.path.rsplit('.').next() {
                single.insert(SmolStr::new(simple), import.path.clone());
            }
        }
        Self {
            package,
            declared: HashMap::new(),
            single,
            on_demand,
        }
    }

    /// Registers a type declared in the unit, keyed by its name relative to
    /// the package (`Outer.Inner`) and by its simple name.
    pub fn declare(&mut self, simple_name: &str, fqn: &str) {
        let relative = match &self.package {
            Some(p) => fqn.strip_prefix(p.as_str()).map(|r| r.trim_start_matches('.')),
            None => Some(fqn),
        };
        if let Some(relative) = relative {
            self.declared
                .entry(SmolStr::new(relative))
                .or_insert_with(|| SmolStr::new(fqn));
        }
        self.declared
            .entry(SmolStr::new(simple_name))
            .or_insert_with(|| SmolStr::new(fqn));
    }

    pub fn qualify(&self, simple_name: &str) -> SmolStr {
        match &self.package {
            Some(p) => SmolStr::from(format!("{}.{}", p, simple_name)),
            None => SmolStr::new(simple_name),
        }
    }

    /// Resolves a written type (`List<String>`, `Foo[]`, `Outer.Inner`) to an
    /// erased, qualified name.
    pub fn resolve(&self, written: &str) -> SmolStr {
        let erased = erase_generics(written);
        let trimmed = erased.trim();
        let dims = trimmed.matches("[]").count();
        let base = trimmed.trim_end_matches("[]").trim();
        let resolved = self.resolve_base(base);
        if dims == 0 {
            resolved
        } else {
            SmolStr::from(format!("{}{}", resolved, "[]".repeat(dims)))
        }
    }

    fn resolve_base(&self, name: &str) -> SmolStr {
        if PRIMITIVES.contains(&name) {
            return SmolStr::new(name);
        }
        if let Some(fqn) = self.declared.get(name) {
            return fqn.clone();
        }
        if let Some((head, rest)) = name.split_once('.') {
            // `Outer.Inner` where `Outer` is itself imported or declared.
            if let Some(prefix) = self.declared.get(head).or_else(|| self.single.get(head)) {
                return SmolStr::from(format!("{}.{}", prefix, rest));
            }
            return SmolStr::new(name);
        }
        if let Some(fqn) = self.single.get(name) {
            return fqn.clone();
        }
        if JAVA_LANG.contains(&name) {
            return SmolStr::from(format!("java.lang.{}", name));
        }
        for package in &self.on_demand {
            let candidate = format!("{}.{}", package, name);
            if WELL_KNOWN_TYPES.contains(&candidate.as_str()) {
                return SmolStr::from(candidate);
            }
        }
        self.qualify(name)
    }
}

/// Drops type arguments: `Map<String, List<Foo>>` becomes `Map`.
pub fn erase_generics(written: &str) -> String {
    let mut out = String::with_capacity(written.len());
    let mut depth = 0usize;
    for c in written.chars() {
        match c {
            '<' => depth += 1,
            '>' => depth = depth.saturating_sub(1),
            c if depth == 0 && !c.is_whitespace() => out.push(c),
            _ => {}
        }
    }
    out
}

/// Default bean name for a class: `MyService` becomes `myService`, while
/// names starting with two capitals (`URLService`) stay unchanged.
pub fn decapitalize(simple_name: &str) -> String {
    let mut chars = simple_name.chars();
    match (chars.next(), chars.next()) {
        (Some(a), Some(b)) if a.is_uppercase() && b.is_uppercase() => simple_name.to_string(),
        (Some(a), _) => {
            let mut out: String = a.to_lowercase().collect();
            out.push_str(&simple_name[a.len_utf8()..]);
            out
        }
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver() -> TypeNameResolver {
        let imports = vec![
            ImportDecl {
                path: "java.util.List".into(),
                wildcard: false,
                is_static: false,
            },
            ImportDecl {
                path: "org.aspectj.lang.annotation".into(),
                wildcard: true,
                is_static: false,
            },
        ];
        let mut r = TypeNameResolver::new(Some("com.acme".into()), &imports);
        r.declare("Inner", "com.acme.Service.Inner");
        r
    }

    #[test]
    fn resolves_in_java_scoping_order() {
        let r = resolver();
        assert_eq!(r.resolve("List<String>"), "java.util.List");
        assert_eq!(r.resolve("String[]"), "java.lang.String[]");
        assert_eq!(r.resolve("int"), "int");
        assert_eq!(r.resolve("Inner"), "com.acme.Service.Inner");
        assert_eq!(r.resolve("Service.Inner"), "com.acme.Service.Inner");
        assert_eq!(r.resolve("Aspect"), "org.aspectj.lang.annotation.Aspect");
        assert_eq!(r.resolve("Helper"), "com.acme.Helper");
        assert_eq!(r.resolve("org.other.Type"), "org.other.Type");
    }

    #[test]
    fn decapitalizes_like_bean_naming() {
        assert_eq!(decapitalize("MyService"), "myService");
        assert_eq!(decapitalize("URLService"), "URLService");
        assert_eq!(decapitalize("A"), "a");
    }
}
