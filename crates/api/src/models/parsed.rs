use super::definition::AspectDefinition;
use super::diagnostic::Diagnostic;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::path::PathBuf;

/// A `<bean>` declaration.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct BeanDefinition {
    pub id: SmolStr,
    pub class_name: Option<SmolStr>,
    pub resource: PathBuf,
    pub line: usize,
    pub is_abstract: bool,
}

/// An `<aop:advisor>` whose advice kind depends on the Spring advice
/// interface implemented by the referenced bean, so it can only be turned
/// into an [`AspectDefinition`] once the type universe is known.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct AdvisorDeclaration {
    pub advice_ref: SmolStr,
    pub pointcut: SmolStr,
    pub proxy_target_class: bool,
    pub resource: PathBuf,
    pub ordinal: usize,
    pub start_line: usize,
    pub end_line: usize,
}

/// A `@Pointcut` method, referenced from other expressions as `name()` or
/// `pkg.Type.name()`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct NamedPointcut {
    pub owner: SmolStr,
    pub name: SmolStr,
    pub expression: SmolStr,
    pub parameter_names: Vec<SmolStr>,
}

/// `aspectj-autoproxy` style settings.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct AutoProxyConfig {
    pub proxy_target_class: bool,
    /// Regular expressions an annotation aspect's bean name must match.
    /// Empty means every aspect is included.
    pub include_patterns: Vec<String>,
}

impl AutoProxyConfig {
    pub fn merge(&mut self, other: &AutoProxyConfig) {
        self.proxy_target_class |= other.proxy_target_class;
        for pattern in &other.include_patterns {
            if !self.include_patterns.contains(pattern) {
                self.include_patterns.push(pattern.clone());
            }
        }
    }
}

/// Everything one resource contributes to the model.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct ParsedAspects {
    pub definitions: Vec<AspectDefinition>,
    pub diagnostics: Vec<Diagnostic>,
    pub beans: Vec<BeanDefinition>,
    pub advisors: Vec<AdvisorDeclaration>,
    pub named_pointcuts: Vec<NamedPointcut>,
    pub auto_proxy: Option<AutoProxyConfig>,
}

impl ParsedAspects {
    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
            && self.diagnostics.is_empty()
            && self.beans.is_empty()
            && self.advisors.is_empty()
            && self.named_pointcuts.is_empty()
            && self.auto_proxy.is_none()
    }

    /// True when the resource contributes to matching, i.e. declares more
    /// than diagnostics.
    pub fn has_declarations(&self) -> bool {
        !self.definitions.is_empty()
            || !self.beans.is_empty()
            || !self.advisors.is_empty()
            || !self.named_pointcuts.is_empty()
            || self.auto_proxy.is_some()
    }

    pub fn extend(&mut self, other: ParsedAspects) {
        self.definitions.extend(other.definitions);
        self.diagnostics.extend(other.diagnostics);
        self.beans.extend(other.beans);
        self.advisors.extend(other.advisors);
        self.named_pointcuts.extend(other.named_pointcuts);
        if let Some(auto) = other.auto_proxy {
            self.auto_proxy
                .get_or_insert_with(AutoProxyConfig::default)
                .merge(&auto);
        }
    }
}
