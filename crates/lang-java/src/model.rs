use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::path::PathBuf;
use weavescope_api::ElementId;

/// The declarations of one `.java` file with type names resolved as far as
/// the file itself allows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JavaCompilationUnit {
    pub path: PathBuf,
    pub package: Option<SmolStr>,
    pub imports: Vec<ImportDecl>,
    /// Top level and nested types, outer types first.
    pub types: Vec<JavaType>,
    pub has_syntax_errors: bool,
}

impl JavaCompilationUnit {
    /// Packages imported on demand (`import a.b.*;`).
    pub fn wildcard_packages(&self) -> impl Iterator<Item = &str> {
        self.imports
            .iter()
            .filter(|i| i.wildcard && !i.is_static)
            .map(|i| i.path.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportDecl {
    /// Imported name without the trailing `.*`.
    pub path: SmolStr,
    pub wildcard: bool,
    pub is_static: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JavaTypeKind {
    Class,
    Interface,
    Enum,
    Annotation,
    Record,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JavaType {
    pub fqn: SmolStr,
    pub simple_name: SmolStr,
    pub kind: JavaTypeKind,
    pub modifiers: Vec<SmolStr>,
    pub annotations: Vec<JavaAnnotation>,
    pub superclass: Option<SmolStr>,
    /// Implemented interfaces, or extended interfaces for an interface.
    pub interfaces: Vec<SmolStr>,
    pub methods: Vec<JavaMethod>,
    pub fields: Vec<JavaField>,
    pub resource: PathBuf,
    pub start_line: usize,
    pub end_line: usize,
}

impl JavaType {
    pub fn package(&self) -> &str {
        let nested_prefix = self.fqn.len() - self.simple_name.len();
        let outer = self.fqn[..nested_prefix].trim_end_matches('.');
        // Walk outward past enclosing types, whose names start upper case by convention.
        let mut package = outer;
        while let Some((head, tail)) = package.rsplit_once('.') {
            if tail.chars().next().is_some_and(|c| c.is_uppercase()) {
                package = head;
            } else {
                break;
            }
        }
        if package.chars().next().is_some_and(|c| c.is_uppercase()) {
            ""
        } else {
            package
        }
    }

    pub fn has_modifier(&self, modifier: &str) -> bool {
        self.modifiers.iter().any(|m| m == modifier)
    }

    pub fn is_abstract(&self) -> bool {
        self.has_modifier("abstract")
    }

    pub fn is_interface(&self) -> bool {
        self.kind == JavaTypeKind::Interface
    }

    pub fn annotation(&self, simple_name: &str) -> Option<&JavaAnnotation> {
        find_annotation(&self.annotations, simple_name)
    }

    pub fn element_id(&self) -> ElementId {
        ElementId::for_type(&self.fqn)
    }

    pub fn find_method(&self, name: &str, parameter_types: &[SmolStr]) -> Option<&JavaMethod> {
        self.methods
            .iter()
            .filter(|m| !m.is_constructor && m.name == name)
            .find(|m| parameter_types.is_empty() || m.parameter_types() == parameter_types)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JavaParameter {
    pub name: SmolStr,
    /// Resolved, generics erased, `[]` appended per dimension (varargs included).
    pub type_name: SmolStr,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JavaMethod {
    pub name: SmolStr,
    pub parameters: Vec<JavaParameter>,
    /// `None` for constructors.
    pub return_type: Option<SmolStr>,
    pub modifiers: Vec<SmolStr>,
    pub annotations: Vec<JavaAnnotation>,
    pub is_constructor: bool,
    pub start_line: usize,
    pub end_line: usize,
}

impl JavaMethod {
    pub fn parameter_types(&self) -> Vec<SmolStr> {
        self.parameters.iter().map(|p| p.type_name.clone()).collect()
    }

    pub fn parameter_names(&self) -> Vec<SmolStr> {
        self.parameters.iter().map(|p| p.name.clone()).collect()
    }

    pub fn has_modifier(&self, modifier: &str) -> bool {
        self.modifiers.iter().any(|m| m == modifier)
    }

    pub fn is_public(&self) -> bool {
        self.has_modifier("public")
    }

    pub fn is_static(&self) -> bool {
        self.has_modifier("static")
    }

    pub fn annotation(&self, simple_name: &str) -> Option<&JavaAnnotation> {
        find_annotation(&self.annotations, simple_name)
    }

    pub fn element_id(&self, declaring_type: &str) -> ElementId {
        if self.is_constructor {
            ElementId::for_constructor(declaring_type, &self.parameter_types())
        } else {
            ElementId::for_method(declaring_type, &self.name, &self.parameter_types())
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JavaField {
    pub name: SmolStr,
    pub type_name: SmolStr,
    pub modifiers: Vec<SmolStr>,
    pub annotations: Vec<JavaAnnotation>,
    pub line: usize,
}

impl JavaField {
    pub fn annotation(&self, simple_name: &str) -> Option<&JavaAnnotation> {
        find_annotation(&self.annotations, simple_name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnnotationValue {
    Str(String),
    List(Vec<AnnotationValue>),
    /// Any other expression, kept as source text (`true`, `Foo.class`, constants).
    Expr(String),
}

impl AnnotationValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AnnotationValue::Str(s) => Some(s),
            AnnotationValue::List(items) if items.len() == 1 => items[0].as_str(),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AnnotationValue::Expr(e) if e == "true" => Some(true),
            AnnotationValue::Expr(e) if e == "false" => Some(false),
            _ => None,
        }
    }

    /// Class literal (`Foo.class`) without the `.class` suffix.
    pub fn as_class_literal(&self) -> Option<&str> {
        match self {
            AnnotationValue::Expr(e) => e.strip_suffix(".class").map(str::trim),
            _ => None,
        }
    }

    pub fn as_strings(&self) -> Vec<String> {
        match self {
            AnnotationValue::Str(s) => vec![s.clone()],
            AnnotationValue::List(items) => items.iter().flat_map(|i| i.as_strings()).collect(),
            AnnotationValue::Expr(_) => Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JavaAnnotation {
    /// Resolved annotation type name.
    pub name: SmolStr,
    /// `(element, value)` pairs. A single unnamed argument is stored under `value`.
    pub values: Vec<(SmolStr, AnnotationValue)>,
    pub line: usize,
}

impl JavaAnnotation {
    pub fn simple_name(&self) -> &str {
        self.name.rsplit('.').next().unwrap_or(&self.name)
    }

    pub fn value(&self, element: &str) -> Option<&AnnotationValue> {
        self.values
            .iter()
            .find(|(k, _)| k == element)
            .map(|(_, v)| v)
    }

    pub fn string(&self, element: &str) -> Option<&str> {
        self.value(element).and_then(AnnotationValue::as_str)
    }
}

fn find_annotation<'a>(
    annotations: &'a [JavaAnnotation],
    simple_name: &str,
) -> Option<&'a JavaAnnotation> {
    annotations.iter().find(|a| a.simple_name() == simple_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ty(fqn: &str, simple: &str) -> JavaType {
        JavaType {
            fqn: fqn.into(),
            simple_name: simple.into(),
            kind: JavaTypeKind::Class,
            modifiers: vec![],
            annotations: vec![],
            superclass: None,
            interfaces: vec![],
            methods: vec![],
            fields: vec![],
            resource: PathBuf::from("A.java"),
            start_line: 1,
            end_line: 1,
        }
    }

    #[test]
    fn package_skips_enclosing_types() {
        assert_eq!(ty("com.acme.Outer.Inner", "Inner").package(), "com.acme");
        assert_eq!(ty("com.acme.Service", "Service").package(), "com.acme");
        assert_eq!(ty("Service", "Service").package(), "");
    }

    #[test]
    fn single_element_list_reads_as_string() {
        let v = AnnotationValue::List(vec![AnnotationValue::Str("a".into())]);
        assert_eq!(v.as_str(), Some("a"));
        assert_eq!(
            AnnotationValue::Expr("Impl.class".into()).as_class_literal(),
            Some("Impl")
        );
    }
}
