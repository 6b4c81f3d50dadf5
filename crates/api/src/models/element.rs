use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::fmt;
use std::path::PathBuf;

/// Opaque handle of a program element.
///
/// Types are identified by their FQN (`com.acme.Service`), methods by
/// `Type.name(ParamType,...)` with fully qualified parameter types, and
/// constructors by `Type.<init>(...)`. Handles are plain strings so the
/// registry can index them without holding on to parsed syntax.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementId(SmolStr);

impl ElementId {
    pub fn new(raw: impl Into<SmolStr>) -> Self {
        Self(raw.into())
    }

    pub fn for_type(fqn: &str) -> Self {
        Self(SmolStr::new(fqn))
    }

    pub fn for_method<S: AsRef<str>>(type_fqn: &str, name: &str, parameter_types: &[S]) -> Self {
        let params: Vec<&str> = parameter_types.iter().map(|p| p.as_ref()).collect();
        Self(SmolStr::from(format!("{}.{}({})", type_fqn, name, params.join(","))))
    }

    pub fn for_constructor<S: AsRef<str>>(type_fqn: &str, parameter_types: &[S]) -> Self {
        Self::for_method(type_fqn, "<init>", parameter_types)
    }

    pub fn for_field(type_fqn: &str, name: &str) -> Self {
        Self(SmolStr::from(format!("{}#{}", type_fqn, name)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ElementId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum ElementKind {
    Type,
    Method,
    Constructor,
    Field,
}

/// A resolved endpoint of an [`AopReference`](super::AopReference).
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct JavaElement {
    pub id: ElementId,
    pub kind: ElementKind,
    /// FQN of the declaring type, or the aspect bean name when the advice
    /// backing class is only known through an XML `ref`.
    pub declaring_type: SmolStr,
    pub name: SmolStr,
    pub resource: Option<PathBuf>,
    /// 1-based line of the element's declaration, 0 when unknown.
    pub line: usize,
}

impl JavaElement {
    /// `Type.member` without parameter list, or the type FQN for type elements.
    pub fn qualified_name(&self) -> String {
        match self.kind {
            ElementKind::Type => self.declaring_type.to_string(),
            _ => format!("{}.{}", self.declaring_type, self.name),
        }
    }

    /// Short label used in marker messages (`Service.doWork()`).
    pub fn link_name(&self) -> String {
        let simple_type = self
            .declaring_type
            .rsplit('.')
            .next()
            .unwrap_or(self.declaring_type.as_str());
        match self.kind {
            ElementKind::Type => simple_type.to_string(),
            ElementKind::Field => format!("{}.{}", simple_type, self.name),
            ElementKind::Method | ElementKind::Constructor => {
                format!("{}.{}()", simple_type, self.name)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_ids_include_parameter_types() {
        let id = ElementId::for_method("com.acme.Service", "doWork", &["java.lang.String", "int"]);
        assert_eq!(id.as_str(), "com.acme.Service.doWork(java.lang.String,int)");

        let empty: [&str; 0] = [];
        let id = ElementId::for_method("com.acme.Service", "doWork", &empty);
        assert_eq!(id.as_str(), "com.acme.Service.doWork()");
    }

    #[test]
    fn qualified_and_link_names() {
        let element = JavaElement {
            id: ElementId::for_method("com.acme.Service", "doWork", &[] as &[&str]),
            kind: ElementKind::Method,
            declaring_type: "com.acme.Service".into(),
            name: "doWork".into(),
            resource: None,
            line: 3,
        };
        assert_eq!(element.qualified_name(), "com.acme.Service.doWork");
        assert_eq!(element.link_name(), "Service.doWork()");
    }
}
