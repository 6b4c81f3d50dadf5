//! Pointcut compilation and matching.
//!
//! [`PointcutEvaluator`] is the seam between the reference builder and the
//! pointcut language; [`AspectJEvaluator`] implements the AspectJ subset that
//! proxy-based AOP supports (method execution join points only).

pub mod ast;
mod eval;
pub mod parser;
pub mod pattern;

pub use eval::{AspectJEvaluator, CompiledPointcut};

use crate::universe::TypeUniverse;
use smol_str::SmolStr;
use std::collections::HashMap;
use weavescope_api::{AspectDefinition, NamedPointcut};
use weavescope_java::{JavaMethod, JavaType};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message} at position {position}")]
pub struct PointcutError {
    pub message: String,
    /// Byte offset into the expression.
    pub position: usize,
}

impl PointcutError {
    pub fn new(message: impl Into<String>, position: usize) -> Self {
        Self {
            message: message.into(),
            position,
        }
    }
}

/// A method execution join point on a candidate bean.
#[derive(Clone, Copy)]
pub struct MethodJoinPoint<'a> {
    pub ty: &'a JavaType,
    pub method: &'a JavaMethod,
    pub bean_name: Option<&'a str>,
}

/// Named pointcuts (`@Pointcut` methods) visible to a project, by owner type.
#[derive(Debug, Default, Clone)]
pub struct NamedPointcuts {
    by_key: HashMap<(SmolStr, SmolStr), NamedPointcut>,
    by_name: HashMap<SmolStr, Vec<(SmolStr, SmolStr)>>,
}

impl NamedPointcuts {
    pub fn new<'p>(pointcuts: impl IntoIterator<Item = &'p NamedPointcut>) -> Self {
        let mut table = Self::default();
        for pointcut in pointcuts {
            let key = (pointcut.owner.clone(), pointcut.name.clone());
            if table.by_key.contains_key(&key) {
                continue;
            }
            table
                .by_name
                .entry(pointcut.name.clone())
                .or_default()
                .push(key.clone());
            table.by_key.insert(key, pointcut.clone());
        }
        table
    }

    pub fn len(&self) -> usize {
        self.by_key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }

    /// Resolves `name` as written in an expression of `current_owner`.
    ///
    /// A written owner may be fully qualified or a simple type name. Without
    /// one, the current owner is tried first, then a project-wide unique name.
    pub fn lookup(
        &self,
        written_owner: Option<&str>,
        current_owner: Option<&str>,
        name: &str,
    ) -> Option<&NamedPointcut> {
        let candidates = self.by_name.get(name)?;
        let unique = |filter: &dyn Fn(&str) -> bool| {
            let mut found = candidates.iter().filter(|(owner, _)| filter(owner.as_str()));
            match (found.next(), found.next()) {
                (Some(key), None) => self.by_key.get(key),
                _ => None,
            }
        };
        match written_owner {
            Some(owner) => self
                .by_key
                .get(&(SmolStr::new(owner), SmolStr::new(name)))
                .or_else(|| {
                    let suffix = format!(".{}", owner);
                    unique(&|candidate: &str| candidate.ends_with(&suffix))
                }),
            None => current_owner
                .and_then(|owner| self.by_key.get(&(SmolStr::new(owner), SmolStr::new(name))))
                .or_else(|| unique(&|_: &str| true)),
        }
    }
}

/// What a definition's expression is compiled against.
pub struct CompileContext<'a> {
    /// Type declaring the expression; scopes unqualified pointcut references.
    pub owner: Option<&'a str>,
    pub named: &'a NamedPointcuts,
    /// Advice parameter names and their resolved types, when known.
    pub bindings: HashMap<SmolStr, Option<SmolStr>>,
}

impl<'a> CompileContext<'a> {
    pub fn new(owner: Option<&'a str>, named: &'a NamedPointcuts) -> Self {
        Self {
            owner,
            named,
            bindings: HashMap::new(),
        }
    }
}

pub trait PointcutEvaluator: Send + Sync {
    type Compiled: Send + Sync;

    fn compile(
        &self,
        definition: &AspectDefinition,
        context: &CompileContext,
    ) -> Result<Self::Compiled, PointcutError>;

    fn matches_method(
        &self,
        compiled: &Self::Compiled,
        join_point: &MethodJoinPoint,
        universe: &TypeUniverse,
    ) -> bool;

    /// Type-level matching, used for introductions.
    fn matches_type(
        &self,
        compiled: &Self::Compiled,
        ty: &JavaType,
        universe: &TypeUniverse,
    ) -> bool;
}
