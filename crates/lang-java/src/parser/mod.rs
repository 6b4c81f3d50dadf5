use crate::error::{JavaParseError, Result};
use crate::model::{ImportDecl, JavaCompilationUnit};
use crate::naming::TypeNameResolver;
use smol_str::SmolStr;
use std::path::Path;
use tree_sitter::{Node, Parser, Tree};

mod annotations;
mod declarations;
mod types;

/// Reads Java sources into [`JavaCompilationUnit`]s.
///
/// The parser itself is stateless and cheap to share; a fresh tree-sitter
/// parser is created per call so one instance can serve parallel workers.
#[derive(Clone)]
pub struct JavaParser {
    pub language: tree_sitter::Language,
}

impl JavaParser {
    pub fn new() -> Result<Self> {
        let language: tree_sitter::Language = tree_sitter_java::LANGUAGE.into();
        // Fail early on an ABI mismatch rather than on the first file.
        Parser::new().set_language(&language)?;
        Ok(Self { language })
    }

    pub fn parse_tree(&self, source: &str, path: &Path) -> Result<Tree> {
        let mut parser = Parser::new();
        parser.set_language(&self.language)?;
        parser
            .parse(source, None)
            .ok_or_else(|| JavaParseError::NoTree(path.display().to_string()))
    }

    pub fn parse(&self, source: &str, path: &Path) -> Result<JavaCompilationUnit> {
        let tree = self.parse_tree(source, path)?;
        let root = tree.root_node();

        let (package, imports) = extract_package_and_imports(root, source);
        let mut resolver = TypeNameResolver::new(package.clone(), &imports);
        let prefix = package.as_deref().unwrap_or_default();
        declarations::declare_types(root, source, prefix, &mut resolver);

        let mut types = Vec::new();
        let mut cursor = root.walk();
        for child in root.named_children(&mut cursor) {
            declarations::collect_type(child, source, prefix, path, &resolver, &mut types);
        }

        Ok(JavaCompilationUnit {
            path: path.to_path_buf(),
            package,
            imports,
            types,
            has_syntax_errors: root.has_error(),
        })
    }
}

pub(crate) fn text<'a>(node: Node, source: &'a str) -> &'a str {
    node.utf8_text(source.as_bytes()).unwrap_or_default()
}

pub(crate) fn line_range(node: Node) -> (usize, usize) {
    (node.start_position().row + 1, node.end_position().row + 1)
}

fn extract_package_and_imports(root: Node, source: &str) -> (Option<SmolStr>, Vec<ImportDecl>) {
    let mut package = None;
    let mut imports = Vec::new();
    let mut cursor = root.walk();
    for child in root.named_children(&mut cursor) {
        match child.kind() {
            "package_declaration" => {
                let mut inner = child.walk();
                package = child
                    .named_children(&mut inner)
                    .find(|n| matches!(n.kind(), "scoped_identifier" | "identifier"))
                    .map(|n| SmolStr::new(text(n, source)));
            }
            "import_declaration" => {
                let mut inner = child.walk();
                let mut is_static = false;
                let mut wildcard = false;
                let mut path = None;
                for part in child.children(&mut inner) {
                    match part.kind() {
                        "static" => is_static = true,
                        "asterisk" => wildcard = true,
                        "scoped_identifier" | "identifier" => {
                            path = Some(SmolStr::new(text(part, source)))
                        }
                        _ => {}
                    }
                }
                if let Some(path) = path {
                    imports.push(ImportDecl {
                        path,
                        wildcard,
                        is_static,
                    });
                }
            }
            _ => {}
        }
    }
    (package, imports)
}
