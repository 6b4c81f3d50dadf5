use super::{line_range, text};
use crate::model::{AnnotationValue, JavaAnnotation};
use crate::naming::TypeNameResolver;
use smol_str::SmolStr;
use tree_sitter::Node;

/// Keywords and annotations of a declaration's `modifiers` child.
pub(super) fn modifiers(
    declaration: Node,
    source: &str,
    resolver: &TypeNameResolver,
) -> (Vec<SmolStr>, Vec<JavaAnnotation>) {
    let mut keywords = Vec::new();
    let mut annotations = Vec::new();
    let mut cursor = declaration.walk();
    let Some(mods) = declaration
        .children(&mut cursor)
        .find(|c| c.kind() == "modifiers")
    else {
        return (keywords, annotations);
    };

    let mut inner = mods.walk();
    for child in mods.children(&mut inner) {
        match child.kind() {
            "marker_annotation" | "annotation" => {
                if let Some(a) = annotation(child, source, resolver) {
                    annotations.push(a);
                }
            }
            "line_comment" | "block_comment" => {}
            _ => keywords.push(SmolStr::new(text(child, source))),
        }
    }
    (keywords, annotations)
}

fn annotation(node: Node, source: &str, resolver: &TypeNameResolver) -> Option<JavaAnnotation> {
    let name = node.child_by_field_name("name")?;
    let mut values = Vec::new();
    if let Some(args) = node.child_by_field_name("arguments") {
        let mut cursor = args.walk();
        for arg in args.named_children(&mut cursor) {
            match arg.kind() {
                "element_value_pair" => {
                    let key = arg.child_by_field_name("key").map(|k| text(k, source));
                    let value = arg.child_by_field_name("value");
                    if let (Some(key), Some(value)) = (key, value) {
                        values.push((SmolStr::new(key), element_value(value, source)));
                    }
                }
                "line_comment" | "block_comment" => {}
                _ => values.push((SmolStr::new("value"), element_value(arg, source))),
            }
        }
    }
    Some(JavaAnnotation {
        name: resolver.resolve(text(name, source)),
        values,
        line: line_range(node).0,
    })
}

fn element_value(node: Node, source: &str) -> AnnotationValue {
    match node.kind() {
        "string_literal" => AnnotationValue::Str(string_literal(node, source)),
        "element_value_array_initializer" => {
            let mut cursor = node.walk();
            let items = node
                .named_children(&mut cursor)
                .filter(|c| !c.kind().ends_with("comment"))
                .map(|c| element_value(c, source))
                .collect();
            AnnotationValue::List(items)
        }
        "parenthesized_expression" => match node.named_child(0) {
            Some(inner) => element_value(inner, source),
            None => AnnotationValue::Expr(text(node, source).to_string()),
        },
        "binary_expression" => match concatenation(node, source) {
            Some(s) => AnnotationValue::Str(s),
            None => AnnotationValue::Expr(text(node, source).to_string()),
        },
        _ => AnnotationValue::Expr(text(node, source).trim().to_string()),
    }
}

/// `"a" + "b"` folded into one string; `None` when an operand is not a literal.
fn concatenation(node: Node, source: &str) -> Option<String> {
    match node.kind() {
        "string_literal" => Some(string_literal(node, source)),
        "parenthesized_expression" => concatenation(node.named_child(0)?, source),
        "binary_expression" => {
            let op = node.child_by_field_name("operator")?;
            if text(op, source) != "+" {
                return None;
            }
            let left = concatenation(node.child_by_field_name("left")?, source)?;
            let right = concatenation(node.child_by_field_name("right")?, source)?;
            Some(left + &right)
        }
        _ => None,
    }
}

fn string_literal(node: Node, source: &str) -> String {
    let raw = text(node, source);
    let body = if let Some(block) = raw.strip_prefix("\"\"\"") {
        block.strip_suffix("\"\"\"").unwrap_or(block).trim()
    } else {
        raw.strip_prefix('"')
            .and_then(|r| r.strip_suffix('"'))
            .unwrap_or(raw)
    };
    unescape(body)
}

fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::unescape;

    #[test]
    fn unescapes_quotes_and_backslashes() {
        assert_eq!(unescape(r#"a\"b\\c"#), "a\"b\\c");
    }
}
