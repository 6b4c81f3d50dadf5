use super::annotations::modifiers;
use super::types::{parameters, type_name};
use super::{line_range, text};
use crate::model::{JavaField, JavaMethod, JavaType, JavaTypeKind};
use crate::naming::TypeNameResolver;
use smol_str::SmolStr;
use std::path::Path;
use tree_sitter::Node;

fn type_kind(kind: &str) -> Option<JavaTypeKind> {
    match kind {
        "class_declaration" => Some(JavaTypeKind::Class),
        "interface_declaration" => Some(JavaTypeKind::Interface),
        "enum_declaration" => Some(JavaTypeKind::Enum),
        "annotation_type_declaration" => Some(JavaTypeKind::Annotation),
        "record_declaration" => Some(JavaTypeKind::Record),
        _ => None,
    }
}

fn join(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", prefix, name)
    }
}

/// Members of a type body, flattening `enum_body_declarations`.
fn body_members<'t>(declaration: Node<'t>) -> Vec<Node<'t>> {
    let Some(body) = declaration.child_by_field_name("body") else {
        return vec![];
    };
    let mut members = Vec::new();
    let mut cursor = body.walk();
    for child in body.named_children(&mut cursor) {
        if child.kind() == "enum_body_declarations" {
            let mut inner = child.walk();
            members.extend(child.named_children(&mut inner));
        } else {
            members.push(child);
        }
    }
    members
}

/// First pass: registers every declared type so references inside the unit
/// resolve to it regardless of declaration order.
pub(super) fn declare_types(
    node: Node,
    source: &str,
    prefix: &str,
    resolver: &mut TypeNameResolver,
) {
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        if type_kind(child.kind()).is_none() {
            continue;
        }
        let Some(name) = child.child_by_field_name("name") else {
            continue;
        };
        let simple = text(name, source);
        let fqn = join(prefix, simple);
        resolver.declare(simple, &fqn);
        if let Some(body) = child.child_by_field_name("body") {
            declare_types(body, source, &fqn, resolver);
            let mut inner = body.walk();
            for decls in body
                .named_children(&mut inner)
                .filter(|c| c.kind() == "enum_body_declarations")
            {
                declare_types(decls, source, &fqn, resolver);
            }
        }
    }
}

pub(super) fn collect_type(
    node: Node,
    source: &str,
    prefix: &str,
    path: &Path,
    resolver: &TypeNameResolver,
    out: &mut Vec<JavaType>,
) {
    let Some(kind) = type_kind(node.kind()) else {
        return;
    };
    let Some(name_node) = node.child_by_field_name("name") else {
        return;
    };
    let simple_name = SmolStr::new(text(name_node, source));
    let fqn = SmolStr::from(join(prefix, &simple_name));
    let (mut modifiers, annotations) = modifiers(node, source, resolver);
    if kind == JavaTypeKind::Interface && !modifiers.iter().any(|m| m == "abstract") {
        modifiers.push(SmolStr::new("abstract"));
    }

    let mut superclass = None;
    let mut interfaces = Vec::new();
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        match child.kind() {
            "superclass" => {
                let mut inner = child.walk();
                superclass = child
                    .named_children(&mut inner)
                    .next()
                    .map(|t| type_name(t, source, resolver));
            }
            "super_interfaces" | "extends_interfaces" => {
                let mut inner = child.walk();
                for list in child
                    .named_children(&mut inner)
                    .filter(|c| c.kind() == "type_list")
                {
                    let mut types = list.walk();
                    interfaces.extend(
                        list.named_children(&mut types)
                            .map(|t| type_name(t, source, resolver)),
                    );
                }
            }
            _ => {}
        }
    }

    let in_interface = matches!(kind, JavaTypeKind::Interface | JavaTypeKind::Annotation);
    let mut methods = Vec::new();
    let mut fields = Vec::new();
    let mut nested = Vec::new();
    for member in body_members(node) {
        match member.kind() {
            "method_declaration"
            | "constructor_declaration"
            | "compact_constructor_declaration" => {
                methods.push(method(member, source, resolver, in_interface));
            }
            "field_declaration" | "constant_declaration" => {
                fields.extend(field(member, source, resolver, in_interface));
            }
            k if type_kind(k).is_some() => nested.push(member),
            _ => {}
        }
    }

    let (start_line, end_line) = line_range(node);
    out.push(JavaType {
        fqn: fqn.clone(),
        simple_name,
        kind,
        modifiers,
        annotations,
        superclass,
        interfaces,
        methods,
        fields,
        resource: path.to_path_buf(),
        start_line,
        end_line,
    });

    for member in nested {
        collect_type(member, source, &fqn, path, resolver, out);
    }
}

fn method(node: Node, source: &str, resolver: &TypeNameResolver, in_interface: bool) -> JavaMethod {
    let is_constructor = node.kind() != "method_declaration";
    let (mut modifiers, annotations) = modifiers(node, source, resolver);
    if in_interface {
        let has = |m: &str, mods: &[SmolStr]| mods.iter().any(|x| x == m);
        if !has("private", &modifiers) && !has("public", &modifiers) {
            modifiers.push(SmolStr::new("public"));
        }
        let has_body = node.child_by_field_name("body").is_some();
        if !has_body && !has("abstract", &modifiers) {
            modifiers.push(SmolStr::new("abstract"));
        }
    }
    let name = node
        .child_by_field_name("name")
        .map(|n| text(n, source))
        .unwrap_or_default();
    let return_type = if is_constructor {
        None
    } else {
        node.child_by_field_name("type")
            .map(|t| type_name(t, source, resolver))
    };
    let (start_line, end_line) = line_range(node);
    JavaMethod {
        name: SmolStr::new(name),
        parameters: if node.kind() == "compact_constructor_declaration" {
            Vec::new()
        } else {
            parameters(node, source, resolver)
        },
        return_type,
        modifiers,
        annotations,
        is_constructor,
        start_line,
        end_line,
    }
}

fn field(
    node: Node,
    source: &str,
    resolver: &TypeNameResolver,
    in_interface: bool,
) -> Vec<JavaField> {
    let (mut modifiers, annotations) = modifiers(node, source, resolver);
    if in_interface {
        for implied in ["public", "static", "final"] {
            if !modifiers.iter().any(|m| m == implied) {
                modifiers.push(SmolStr::new(implied));
            }
        }
    }
    let Some(type_node) = node.child_by_field_name("type") else {
        return vec![];
    };
    let type_name = type_name(type_node, source, resolver);
    let mut out = Vec::new();
    let mut cursor = node.walk();
    for declarator in node.children_by_field_name("declarator", &mut cursor) {
        let Some(name) = declarator.child_by_field_name("name") else {
            continue;
        };
        out.push(JavaField {
            name: SmolStr::new(text(name, source)),
            type_name: type_name.clone(),
            modifiers: modifiers.clone(),
            annotations: annotations.clone(),
            line: line_range(declarator).0,
        });
    }
    out
}
