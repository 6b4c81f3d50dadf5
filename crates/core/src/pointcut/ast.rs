use super::pattern::{ArgPattern, NameMatcher, TypePattern};
use smol_str::SmolStr;

#[derive(Debug, Clone)]
pub enum PointcutExpr {
    And(Box<PointcutExpr>, Box<PointcutExpr>),
    Or(Box<PointcutExpr>, Box<PointcutExpr>),
    Not(Box<PointcutExpr>),
    Execution(MethodPattern),
    Within(TypePattern),
    This(TypeArg),
    Target(TypeArg),
    Args(Vec<ArgPattern>),
    Bean(NameMatcher),
    AtAnnotation(TypeArg),
    AtWithin(TypeArg),
    AtTarget(TypeArg),
    AtArgs(Vec<ArgPattern>),
    /// `name(args)` or `pkg.Type.name(args)`; replaced by the referenced
    /// expression during compilation.
    Reference {
        owner: Option<SmolStr>,
        name: SmolStr,
        args: Vec<SmolStr>,
        position: usize,
    },
}

/// Operand of `this`, `target` and the annotation designators.
#[derive(Debug, Clone)]
pub enum TypeArg {
    Type(TypePattern),
    /// A bound advice parameter; `None` when its type is unknown.
    Bound(Option<SmolStr>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModifierPattern {
    pub negated: bool,
    pub modifier: SmolStr,
}

/// `execution([modifiers] ret [declaring.]name(params) [throws ...])`
#[derive(Debug, Clone)]
pub struct MethodPattern {
    pub modifiers: Vec<ModifierPattern>,
    pub return_type: TypePattern,
    pub declaring_type: Option<TypePattern>,
    pub name: NameMatcher,
    pub params: Vec<ArgPattern>,
}
