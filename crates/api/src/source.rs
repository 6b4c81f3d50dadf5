use crate::models::ParsedAspects;
use std::path::Path;

/// Turns one resource into normalized aspect definitions.
///
/// Implementations are pure: the same `(path, content)` always yields the
/// same output. Malformed input never fails the call; problems are reported
/// through [`ParsedAspects::diagnostics`] next to whatever could be read.
pub trait AspectDefinitionSource: Send + Sync {
    fn name(&self) -> &'static str;

    fn supports(&self, path: &Path) -> bool;

    fn parse(&self, path: &Path, content: &str) -> ParsedAspects;
}
