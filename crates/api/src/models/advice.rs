use serde::{Deserialize, Serialize};
use std::fmt;

/// The kind of advice an aspect definition declares.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AdviceKind {
    Before,
    Around,
    After,
    AfterReturning,
    AfterThrowing,
    DeclareParents,
}

impl AdviceKind {
    /// Maps an `aop` namespace element (`before`, `after-returning`, ...) to its kind.
    pub fn from_xml_element(local_name: &str) -> Option<Self> {
        match local_name {
            "before" => Some(AdviceKind::Before),
            "around" => Some(AdviceKind::Around),
            "after" => Some(AdviceKind::After),
            "after-returning" => Some(AdviceKind::AfterReturning),
            "after-throwing" => Some(AdviceKind::AfterThrowing),
            "declare-parents" => Some(AdviceKind::DeclareParents),
            _ => None,
        }
    }

    /// Maps an advice annotation's simple name (`Before`, `AfterReturning`, ...) to its kind.
    pub fn from_annotation(simple_name: &str) -> Option<Self> {
        match simple_name {
            "Before" => Some(AdviceKind::Before),
            "Around" => Some(AdviceKind::Around),
            "After" => Some(AdviceKind::After),
            "AfterReturning" => Some(AdviceKind::AfterReturning),
            "AfterThrowing" => Some(AdviceKind::AfterThrowing),
            "DeclareParents" => Some(AdviceKind::DeclareParents),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AdviceKind::Before => "BEFORE",
            AdviceKind::Around => "AROUND",
            AdviceKind::After => "AFTER",
            AdviceKind::AfterReturning => "AFTER_RETURNING",
            AdviceKind::AfterThrowing => "AFTER_THROWING",
            AdviceKind::DeclareParents => "DECLARE_PARENTS",
        }
    }

    pub fn is_introduction(&self) -> bool {
        matches!(self, AdviceKind::DeclareParents)
    }
}

impl fmt::Display for AdviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
