//! Aspect definitions: one declared piece of advice, normalized from either
//! XML `aop:config` declarations or `@Aspect` annotated classes.

use super::advice::AdviceKind;
use crate::error::{ApiError, ApiResult};
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::fmt;
use std::hash::Hasher;
use std::path::{Path, PathBuf};
use xxhash_rust::xxh3::Xxh3;

/// Identity of an [`AspectDefinition`].
///
/// Derived from the definition's declaring resource, its ordinal within that
/// resource and its content, so re-parsing an unchanged resource reproduces
/// the same ids while any edit yields new ones.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DefinitionId(pub u64);

impl fmt::Display for DefinitionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum DefinitionOrigin {
    /// `<aop:aspect>` child elements.
    Xml,
    /// `<aop:advisor>` backed by a Spring advice interface implementation.
    Advisor,
    /// Methods and fields of an `@Aspect` class.
    Annotation,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct AdviceMethod {
    pub name: SmolStr,
    /// Parameter type names in declaration order. Fully qualified where the
    /// declaring source allowed resolution, empty when not yet known.
    pub parameter_types: Vec<SmolStr>,
    pub parameter_names: Vec<SmolStr>,
}

impl AdviceMethod {
    pub fn named(name: impl Into<SmolStr>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

/// `returning`/`throwing` binding. Encoding it per kind keeps the
/// advice kind and binding consistent by construction.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum ResultBinding {
    #[default]
    None,
    Returning(SmolStr),
    Throwing(SmolStr),
}

/// `declare-parents` details.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct Introduction {
    pub types_matching: SmolStr,
    pub implement_interface: SmolStr,
    pub default_impl: Option<SmolStr>,
    /// Field carrying `@DeclareParents` in annotation style aspects.
    pub defining_field: Option<SmolStr>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct AspectDefinition {
    id: DefinitionId,
    origin: DefinitionOrigin,
    aspect_name: Option<SmolStr>,
    aspect_class_name: Option<SmolStr>,
    advice_method: AdviceMethod,
    kind: AdviceKind,
    pointcut: SmolStr,
    arg_names: Vec<SmolStr>,
    binding: ResultBinding,
    introduction: Option<Introduction>,
    proxy_target_class: bool,
    resource: PathBuf,
    start_line: usize,
    end_line: usize,
}

impl AspectDefinition {
    pub fn builder(
        kind: AdviceKind,
        origin: DefinitionOrigin,
        resource: &Path,
    ) -> DefinitionBuilder {
        DefinitionBuilder {
            kind,
            origin,
            resource: resource.to_path_buf(),
            ordinal: 0,
            aspect_name: None,
            aspect_class_name: None,
            advice_method: AdviceMethod::default(),
            pointcut: SmolStr::default(),
            arg_names: Vec::new(),
            binding: ResultBinding::None,
            introduction: None,
            proxy_target_class: false,
            start_line: 0,
            end_line: 0,
        }
    }

    pub fn id(&self) -> DefinitionId {
        self.id
    }

    pub fn origin(&self) -> DefinitionOrigin {
        self.origin
    }

    /// Bean name of the aspect, if declared through a bean.
    pub fn aspect_name(&self) -> Option<&str> {
        self.aspect_name.as_deref()
    }

    pub fn aspect_class_name(&self) -> Option<&str> {
        self.aspect_class_name.as_deref()
    }

    pub fn advice_method(&self) -> &AdviceMethod {
        &self.advice_method
    }

    pub fn kind(&self) -> AdviceKind {
        self.kind
    }

    pub fn pointcut_expression(&self) -> &str {
        &self.pointcut
    }

    pub fn arg_names(&self) -> &[SmolStr] {
        &self.arg_names
    }

    pub fn returning(&self) -> Option<&str> {
        match &self.binding {
            ResultBinding::Returning(name) => Some(name),
            _ => None,
        }
    }

    pub fn throwing(&self) -> Option<&str> {
        match &self.binding {
            ResultBinding::Throwing(name) => Some(name),
            _ => None,
        }
    }

    pub fn introduction(&self) -> Option<&Introduction> {
        self.introduction.as_ref()
    }

    pub fn is_proxy_target_class(&self) -> bool {
        self.proxy_target_class
    }

    pub fn resource(&self) -> &Path {
        &self.resource
    }

    pub fn start_line(&self) -> usize {
        self.start_line
    }

    pub fn end_line(&self) -> usize {
        self.end_line
    }

    /// Name used to identify the aspect in messages: bean name, then class name.
    pub fn display_aspect(&self) -> &str {
        self.aspect_name
            .as_deref()
            .or(self.aspect_class_name.as_deref())
            .unwrap_or("<anonymous>")
    }

    /// Returns a copy with the proxy mode replaced. Used when auto-proxy
    /// settings declared elsewhere in the project apply to this definition.
    pub fn with_proxy_target_class(&self, proxy_target_class: bool) -> Self {
        let mut copy = self.clone();
        copy.proxy_target_class = proxy_target_class;
        copy
    }
}

impl fmt::Display for AspectDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}.{} [{}] ({}:{})",
            self.kind,
            self.display_aspect(),
            self.advice_method.name,
            self.pointcut,
            self.resource.display(),
            self.start_line
        )
    }
}

pub struct DefinitionBuilder {
    kind: AdviceKind,
    origin: DefinitionOrigin,
    resource: PathBuf,
    ordinal: usize,
    aspect_name: Option<SmolStr>,
    aspect_class_name: Option<SmolStr>,
    advice_method: AdviceMethod,
    pointcut: SmolStr,
    arg_names: Vec<SmolStr>,
    binding: ResultBinding,
    introduction: Option<Introduction>,
    proxy_target_class: bool,
    start_line: usize,
    end_line: usize,
}

impl DefinitionBuilder {
    /// Position of the definition among all definitions of its resource.
    pub fn ordinal(mut self, ordinal: usize) -> Self {
        self.ordinal = ordinal;
        self
    }

    pub fn aspect_name(mut self, name: Option<impl Into<SmolStr>>) -> Self {
        self.aspect_name = name.map(Into::into);
        self
    }

    pub fn aspect_class_name(mut self, class_name: Option<impl Into<SmolStr>>) -> Self {
        self.aspect_class_name = class_name.map(Into::into);
        self
    }

    pub fn advice_method(mut self, method: AdviceMethod) -> Self {
        self.advice_method = method;
        self
    }

    pub fn pointcut(mut self, expression: impl Into<SmolStr>) -> Self {
        self.pointcut = expression.into();
        self
    }

    pub fn arg_names(mut self, names: Vec<SmolStr>) -> Self {
        self.arg_names = names;
        self
    }

    pub fn binding(mut self, binding: ResultBinding) -> Self {
        self.binding = binding;
        self
    }

    pub fn introduction(mut self, introduction: Introduction) -> Self {
        self.introduction = Some(introduction);
        self
    }

    pub fn proxy_target_class(mut self, value: bool) -> Self {
        self.proxy_target_class = value;
        self
    }

    pub fn lines(mut self, start: usize, end: usize) -> Self {
        self.start_line = start;
        self.end_line = end.max(start);
        self
    }

    pub fn build(self) -> ApiResult<AspectDefinition> {
        match (&self.binding, self.kind) {
            (ResultBinding::Returning(_), kind) if kind != AdviceKind::AfterReturning => {
                return Err(ApiError::InvalidDefinition(format!(
                    "'returning' is only valid for AFTER_RETURNING advice, not {}",
                    kind
                )));
            }
            (ResultBinding::Throwing(_), kind) if kind != AdviceKind::AfterThrowing => {
                return Err(ApiError::InvalidDefinition(format!(
                    "'throwing' is only valid for AFTER_THROWING advice, not {}",
                    kind
                )));
            }
            _ => {}
        }
        if self.kind.is_introduction() != self.introduction.is_some() {
            return Err(ApiError::InvalidDefinition(
                "declare-parents details must accompany exactly the DECLARE_PARENTS kind".into(),
            ));
        }
        if !self.kind.is_introduction() && self.pointcut.trim().is_empty() {
            return Err(ApiError::InvalidDefinition(format!(
                "{} advice '{}' declares no pointcut",
                self.kind, self.advice_method.name
            )));
        }

        let id = self.compute_id();
        Ok(AspectDefinition {
            id,
            origin: self.origin,
            aspect_name: self.aspect_name,
            aspect_class_name: self.aspect_class_name,
            advice_method: self.advice_method,
            kind: self.kind,
            pointcut: self.pointcut,
            arg_names: self.arg_names,
            binding: self.binding,
            introduction: self.introduction,
            proxy_target_class: self.proxy_target_class,
            resource: self.resource,
            start_line: self.start_line,
            end_line: self.end_line,
        })
    }

    fn compute_id(&self) -> DefinitionId {
        let mut hasher = Xxh3::new();
        hasher.write(self.resource.to_string_lossy().as_bytes());
        hasher.write_usize(self.ordinal);
        hasher.write(self.kind.as_str().as_bytes());
        hasher.write(self.advice_method.name.as_bytes());
        for p in &self.advice_method.parameter_types {
            hasher.write(p.as_bytes());
        }
        hasher.write(self.pointcut.as_bytes());
        if let Some(name) = &self.aspect_name {
            hasher.write(name.as_bytes());
        }
        if let Some(class) = &self.aspect_class_name {
            hasher.write(class.as_bytes());
        }
        if let Some(intro) = &self.introduction {
            hasher.write(intro.types_matching.as_bytes());
            hasher.write(intro.implement_interface.as_bytes());
        }
        hasher.write_usize(self.start_line);
        DefinitionId(hasher.finish())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn before(resource: &str) -> DefinitionBuilder {
        AspectDefinition::builder(AdviceKind::Before, DefinitionOrigin::Xml, Path::new(resource))
            .aspect_name(Some("logger"))
            .advice_method(AdviceMethod::named("log"))
            .pointcut("execution(* *(..))")
            .lines(4, 4)
    }

    #[test]
    fn rejects_returning_on_non_after_returning_advice() {
        let err = before("beans.xml")
            .binding(ResultBinding::Returning("ret".into()))
            .build();
        assert!(err.is_err());
    }

    #[test]
    fn accepts_throwing_on_after_throwing_advice() {
        let def = AspectDefinition::builder(
            AdviceKind::AfterThrowing,
            DefinitionOrigin::Xml,
            Path::new("beans.xml"),
        )
        .advice_method(AdviceMethod::named("onError"))
        .pointcut("execution(* *(..))")
        .binding(ResultBinding::Throwing("ex".into()))
        .build()
        .unwrap();
        assert_eq!(def.throwing(), Some("ex"));
        assert_eq!(def.returning(), None);
    }

    #[test]
    fn ids_are_stable_for_identical_content() {
        let a = before("beans.xml").build().unwrap();
        let b = before("beans.xml").build().unwrap();
        let c = before("beans.xml").ordinal(1).build().unwrap();
        assert_eq!(a.id(), b.id());
        assert_ne!(a.id(), c.id());
    }

    #[test]
    fn declare_parents_requires_introduction() {
        let res = AspectDefinition::builder(
            AdviceKind::DeclareParents,
            DefinitionOrigin::Xml,
            Path::new("beans.xml"),
        )
        .build();
        assert!(res.is_err());
    }
}
