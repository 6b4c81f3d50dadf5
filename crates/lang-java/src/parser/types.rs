use super::text;
use crate::model::JavaParameter;
use crate::naming::TypeNameResolver;
use smol_str::SmolStr;
use tree_sitter::Node;

/// Resolved name of a type node. Type annotations are dropped and generics erased.
pub(super) fn type_name(node: Node, source: &str, resolver: &TypeNameResolver) -> SmolStr {
    match node.kind() {
        "annotated_type" => {
            let mut cursor = node.walk();
            let inner = node
                .named_children(&mut cursor)
                .filter(|c| !c.kind().contains("annotation"))
                .last();
            match inner {
                Some(inner) => type_name(inner, source, resolver),
                None => resolver.resolve(text(node, source)),
            }
        }
        "array_type" => {
            let element = node
                .child_by_field_name("element")
                .map(|e| type_name(e, source, resolver))
                .unwrap_or_default();
            let dims = node
                .child_by_field_name("dimensions")
                .map(|d| text(d, source).matches('[').count())
                .unwrap_or(1);
            SmolStr::from(format!("{}{}", element, "[]".repeat(dims)))
        }
        _ => resolver.resolve(text(node, source)),
    }
}

pub(super) fn parameters(
    declaration: Node,
    source: &str,
    resolver: &TypeNameResolver,
) -> Vec<JavaParameter> {
    let Some(params_node) = declaration.child_by_field_name("parameters") else {
        return vec![];
    };

    let mut result = Vec::new();
    let mut cursor = params_node.walk();
    for child in params_node.children(&mut cursor) {
        match child.kind() {
            "formal_parameter" => {
                let Some(type_node) = child.child_by_field_name("type") else {
                    continue;
                };
                let mut type_name = type_name(type_node, source, resolver);
                // C-style `String args[]`
                if let Some(dims) = child.child_by_field_name("dimensions") {
                    let count = text(dims, source).matches('[').count();
                    type_name = SmolStr::from(format!("{}{}", type_name, "[]".repeat(count)));
                }
                let name = child
                    .child_by_field_name("name")
                    .map(|n| text(n, source))
                    .unwrap_or("arg");
                result.push(JavaParameter {
                    name: SmolStr::new(name),
                    type_name,
                });
            }
            "spread_parameter" => {
                let mut name = SmolStr::new("arg");
                let mut element = SmolStr::default();
                let mut inner = child.walk();
                for gc in child.children(&mut inner) {
                    if gc.kind() == "variable_declarator" {
                        if let Some(n) = gc.child_by_field_name("name") {
                            name = SmolStr::new(text(n, source));
                        }
                    } else if gc.is_named() && gc.kind() != "modifiers" {
                        element = type_name(gc, source, resolver);
                    }
                }
                result.push(JavaParameter {
                    name,
                    type_name: SmolStr::from(format!("{}[]", element)),
                });
            }
            _ => {}
        }
    }
    result
}
