use super::advice::AdviceKind;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Info => "info",
        };
        f.write_str(s)
    }
}

/// Which stage produced a diagnostic.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticKind {
    Parse,
    Matching,
    Resolution,
    Build,
}

/// A recoverable problem found while building the model.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct Diagnostic {
    pub resource: PathBuf,
    pub message: String,
    pub severity: Severity,
    /// 1-based, 0 when the problem is not tied to a line.
    pub line: usize,
    pub kind: DiagnosticKind,
}

impl Diagnostic {
    pub fn error(
        kind: DiagnosticKind,
        resource: impl Into<PathBuf>,
        line: usize,
        message: impl Into<String>,
    ) -> Self {
        Self {
            resource: resource.into(),
            message: message.into(),
            severity: Severity::Error,
            line,
            kind,
        }
    }

    pub fn warning(
        kind: DiagnosticKind,
        resource: impl Into<PathBuf>,
        line: usize,
        message: impl Into<String>,
    ) -> Self {
        Self {
            severity: Severity::Warning,
            ..Self::error(kind, resource, line, message)
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}: {}: {}",
            self.resource.display(),
            self.line,
            self.severity,
            self.message
        )
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case", tag = "type", content = "advice")]
pub enum MarkerKind {
    Problem,
    /// Placed on the resource declaring the advice.
    Source(AdviceKind),
    /// Placed on the advised element's resource.
    Target(AdviceKind),
}

/// An entry written to the marker sink.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct Marker {
    pub resource: PathBuf,
    pub message: String,
    pub severity: Severity,
    pub line: usize,
    pub kind: MarkerKind,
    /// Resource whose rebuild invalidates this marker.
    pub owner: PathBuf,
}

impl Marker {
    pub fn problem(diagnostic: &Diagnostic) -> Self {
        Self {
            resource: diagnostic.resource.clone(),
            message: diagnostic.message.clone(),
            severity: diagnostic.severity,
            line: diagnostic.line,
            kind: MarkerKind::Problem,
            owner: diagnostic.resource.clone(),
        }
    }

    pub fn is_problem(&self) -> bool {
        matches!(self.kind, MarkerKind::Problem)
    }
}
