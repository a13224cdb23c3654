//! Symbol extraction
//!
//! Walks top-level program statements only; nested declarations inside
//! function bodies are not symbols. Class, interface and enum members come
//! back nested under their container and are flattened by the indexer.

use crate::extract::docs::doc_for_statement;
use crate::extract::types::*;
use crate::extract::{has_token, is_function_value, node_text, span_of, type_text};
use crate::parse::ParsedSource;
use tree_sitter::Node;

pub fn extract_symbols(parsed: &ParsedSource) -> Vec<SymbolInfo> {
    let root = parsed.tree.root_node();
    let source = parsed.source.as_str();

    let mut cursor = root.walk();
    let statements: Vec<Node> = root.named_children(&mut cursor).collect();
    let stmt_starts: Vec<usize> = statements.iter().map(|n| n.start_byte()).collect();

    let mut symbols = Vec::new();
    for stmt in &statements {
        let mut extracted = classify_statement(*stmt, source);
        if extracted.is_empty() {
            continue;
        }
        let doc = doc_for_statement(stmt.start_byte(), &stmt_starts, &parsed.comments, source);
        for symbol in &mut extracted {
            symbol.doc = doc.clone();
        }
        symbols.extend(extracted);
    }
    symbols
}

fn classify_statement(stmt: Node, source: &str) -> Vec<SymbolInfo> {
    if stmt.kind() != "export_statement" {
        return classify_declaration(stmt, stmt, source);
    }

    let is_default = has_token(stmt, "default");

    if let Some(decl) = stmt.child_by_field_name("declaration") {
        let mut symbols = classify_declaration(decl, stmt, source);
        for symbol in &mut symbols {
            symbol.is_exported = true;
            if symbol.name.is_empty() && is_default {
                symbol.name = "default".to_string();
            }
        }
        return symbols;
    }

    // `export default <expression>` — only function values become symbols
    if let Some(value) = stmt.child_by_field_name("value") {
        if is_default && is_function_value(value) {
            let mut symbol = function_symbol("default".to_string(), value, stmt, source);
            symbol.is_exported = true;
            return vec![symbol];
        }
    }

    Vec::new()
}

fn classify_declaration(decl: Node, span_node: Node, source: &str) -> Vec<SymbolInfo> {
    match decl.kind() {
        "function_declaration" | "generator_function_declaration" | "function_signature" => {
            let name = decl
                .child_by_field_name("name")
                .map(|n| node_text(n, source).to_string())
                .unwrap_or_default();
            vec![function_symbol(name, decl, span_node, source)]
        }
        "class_declaration" | "abstract_class_declaration" | "class" => {
            vec![class_symbol(decl, span_node, source)]
        }
        "interface_declaration" => vec![interface_symbol(decl, span_node, source)],
        "enum_declaration" => vec![enum_symbol(decl, span_node, source)],
        "type_alias_declaration" => {
            let name = decl
                .child_by_field_name("name")
                .map(|n| node_text(n, source).to_string())
                .unwrap_or_default();
            let mut symbol = SymbolInfo::new(name, SymbolKind::Type, span_of(span_node));
            symbol.type_params = type_params_of(decl, source);
            vec![symbol]
        }
        "lexical_declaration" | "variable_declaration" => {
            variable_symbols(decl, source)
        }
        // `declare ...` wraps an inner declaration
        "ambient_declaration" => {
            let mut cursor = decl.walk();
            let inner: Vec<Node> = decl.named_children(&mut cursor).collect();
            let mut symbols = Vec::new();
            for node in inner {
                for mut symbol in classify_declaration(node, span_node, source) {
                    symbol.modifiers.push("declare".to_string());
                    symbols.push(symbol);
                }
            }
            symbols
        }
        _ => Vec::new(),
    }
}

// ---------------------------------------------------------------------------
// Functions
// ---------------------------------------------------------------------------

fn function_symbol(name: String, fn_node: Node, span_node: Node, source: &str) -> SymbolInfo {
    let mut symbol = SymbolInfo::new(name, SymbolKind::Function, span_of(span_node));
    symbol.is_async = has_token(fn_node, "async");
    if symbol.is_async {
        symbol.modifiers.push("async".to_string());
    }
    symbol.params = Some(params_of(fn_node, source));
    symbol.return_type = fn_node
        .child_by_field_name("return_type")
        .map(|t| type_text(t, source));
    symbol.type_params = type_params_of(fn_node, source);
    symbol.decorators = decorators_of(span_node, source);
    symbol
}

fn params_of(fn_node: Node, source: &str) -> Vec<ParamInfo> {
    if let Some(params) = fn_node.child_by_field_name("parameters") {
        let mut cursor = params.walk();
        return params
            .named_children(&mut cursor)
            .filter(|n| n.kind() != "comment")
            .map(|p| parse_param(p, source))
            .collect();
    }
    // Arrow shorthand: single identifier parameter without parentheses
    if let Some(param) = fn_node.child_by_field_name("parameter") {
        return vec![parse_param(param, source)];
    }
    Vec::new()
}

fn parse_param(node: Node, source: &str) -> ParamInfo {
    match node.kind() {
        "required_parameter" | "optional_parameter" => {
            let name = node
                .child_by_field_name("pattern")
                .map(|p| pattern_text(p, source))
                .unwrap_or_default();
            let type_ann = node
                .child_by_field_name("type")
                .map(|t| type_text(t, source));
            let default_value = node
                .child_by_field_name("value")
                .map(|v| node_text(v, source).to_string());
            let mut cursor = node.walk();
            let decorators = node
                .named_children(&mut cursor)
                .filter(|c| c.kind() == "decorator")
                .map(|c| node_text(c, source).trim_start_matches('@').to_string())
                .collect();
            ParamInfo {
                name,
                type_ann,
                is_optional: node.kind() == "optional_parameter" || default_value.is_some(),
                default_value,
                decorators,
            }
        }
        "assignment_pattern" => {
            let name = node
                .child_by_field_name("left")
                .map(|l| pattern_text(l, source))
                .unwrap_or_default();
            let default_value = node
                .child_by_field_name("right")
                .map(|r| node_text(r, source).to_string());
            ParamInfo {
                name,
                type_ann: None,
                is_optional: true,
                default_value,
                decorators: Vec::new(),
            }
        }
        _ => ParamInfo {
            name: pattern_text(node, source),
            type_ann: None,
            is_optional: false,
            default_value: None,
            decorators: Vec::new(),
        },
    }
}

/// Render a parameter pattern as its declared name; rest parameters keep
/// their `...` prefix, destructuring patterns keep their source form.
fn pattern_text(node: Node, source: &str) -> String {
    if node.kind() == "rest_pattern" {
        let inner = node
            .named_child(0)
            .map(|n| node_text(n, source).to_string())
            .unwrap_or_default();
        return format!("...{}", inner);
    }
    node_text(node, source).to_string()
}

fn type_params_of(node: Node, source: &str) -> Option<Vec<String>> {
    let params = node.child_by_field_name("type_parameters")?;
    let mut cursor = params.walk();
    let names: Vec<String> = params
        .named_children(&mut cursor)
        .map(|p| node_text(p, source).to_string())
        .collect();
    if names.is_empty() {
        None
    } else {
        Some(names)
    }
}

fn decorators_of(node: Node, source: &str) -> Vec<String> {
    let mut cursor = node.walk();
    node.named_children(&mut cursor)
        .filter(|c| c.kind() == "decorator")
        .map(|c| node_text(c, source).trim_start_matches('@').to_string())
        .collect()
}

fn modifiers_of(node: Node, source: &str) -> Vec<String> {
    let mut modifiers = Vec::new();
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.is_named() {
            if child.kind() == "accessibility_modifier" {
                modifiers.push(node_text(child, source).to_string());
            }
        } else if matches!(
            child.kind(),
            "static" | "async" | "readonly" | "abstract" | "override" | "get" | "set"
        ) {
            modifiers.push(child.kind().to_string());
        }
    }
    modifiers
}

// ---------------------------------------------------------------------------
// Variables
// ---------------------------------------------------------------------------

fn variable_symbols(decl: Node, source: &str) -> Vec<SymbolInfo> {
    let decl_keyword = decl
        .child(0)
        .filter(|c| !c.is_named())
        .map(|c| c.kind().to_string());

    let mut symbols = Vec::new();
    let mut cursor = decl.walk();
    for declarator in decl.named_children(&mut cursor) {
        if declarator.kind() != "variable_declarator" {
            continue;
        }
        let Some(name_node) = declarator.child_by_field_name("name") else {
            continue;
        };
        let value = declarator.child_by_field_name("value");

        match name_node.kind() {
            "identifier" => {
                let name = node_text(name_node, source).to_string();
                let mut symbol = match value {
                    // A function initializer upgrades the kind
                    Some(v) if is_function_value(v) => {
                        function_symbol(name, v, declarator, source)
                    }
                    _ => {
                        let mut s =
                            SymbolInfo::new(name, SymbolKind::Variable, span_of(declarator));
                        s.return_type = declarator
                            .child_by_field_name("type")
                            .map(|t| type_text(t, source));
                        s
                    }
                };
                if let Some(kw) = &decl_keyword {
                    symbol.modifiers.push(kw.clone());
                }
                symbols.push(symbol);
            }
            "object_pattern" | "array_pattern" => {
                let mut names = Vec::new();
                flatten_pattern(name_node, source, &mut names);
                for (name, node) in names {
                    let mut symbol = SymbolInfo::new(name, SymbolKind::Variable, span_of(node));
                    if let Some(kw) = &decl_keyword {
                        symbol.modifiers.push(kw.clone());
                    }
                    symbols.push(symbol);
                }
            }
            _ => {}
        }
    }
    symbols
}

/// Flatten a destructuring pattern to its bound identifiers, in source
/// order. Holes and rest elements yield nothing.
fn flatten_pattern<'t>(node: Node<'t>, source: &str, out: &mut Vec<(String, Node<'t>)>) {
    let mut cursor = node.walk();
    match node.kind() {
        "object_pattern" => {
            for child in node.named_children(&mut cursor) {
                match child.kind() {
                    "shorthand_property_identifier_pattern" => {
                        out.push((node_text(child, source).to_string(), child));
                    }
                    "pair_pattern" => {
                        if let Some(value) = child.child_by_field_name("value") {
                            flatten_pattern(value, source, out);
                        }
                    }
                    "object_assignment_pattern" => {
                        if let Some(left) = child.child_by_field_name("left") {
                            flatten_pattern(left, source, out);
                        }
                    }
                    "rest_pattern" => {}
                    _ => {}
                }
            }
        }
        "array_pattern" => {
            for child in node.named_children(&mut cursor) {
                match child.kind() {
                    "identifier" => out.push((node_text(child, source).to_string(), child)),
                    "assignment_pattern" => {
                        if let Some(left) = child.child_by_field_name("left") {
                            flatten_pattern(left, source, out);
                        }
                    }
                    "object_pattern" | "array_pattern" => flatten_pattern(child, source, out),
                    "rest_pattern" => {}
                    _ => {}
                }
            }
        }
        "identifier" | "shorthand_property_identifier_pattern" => {
            out.push((node_text(node, source).to_string(), node));
        }
        _ => {}
    }
}

// ---------------------------------------------------------------------------
// Classes
// ---------------------------------------------------------------------------

fn class_symbol(decl: Node, span_node: Node, source: &str) -> SymbolInfo {
    let name = decl
        .child_by_field_name("name")
        .map(|n| node_text(n, source).to_string())
        .unwrap_or_default();
    let mut symbol = SymbolInfo::new(name, SymbolKind::Class, span_of(span_node));
    symbol.type_params = type_params_of(decl, source);
    symbol.decorators = decorators_of(decl, source);
    if span_node.kind() == "export_statement" {
        // `@dec export class ...` hangs the decorator off the wrapper
        symbol.decorators.extend(decorators_of(span_node, source));
    }
    if decl.kind() == "abstract_class_declaration" || has_token(decl, "abstract") {
        symbol.modifiers.push("abstract".to_string());
    }

    let mut cursor = decl.walk();
    for child in decl.named_children(&mut cursor) {
        if child.kind() == "class_heritage" {
            collect_class_heritage(child, source, &mut symbol.heritage);
        }
    }

    if let Some(body) = decl.child_by_field_name("body") {
        let mut body_cursor = body.walk();
        for member in body.named_children(&mut body_cursor) {
            match member.kind() {
                "method_definition" | "abstract_method_signature" | "method_signature" => {
                    symbol.members.push(method_member(member, source));
                }
                "public_field_definition" | "field_definition" | "property_signature" => {
                    symbol.members.push(property_member(member, source));
                }
                _ => {}
            }
        }
    }

    symbol
}

fn collect_class_heritage(heritage: Node, source: &str, out: &mut Vec<HeritageRef>) {
    let mut cursor = heritage.walk();
    for child in heritage.named_children(&mut cursor) {
        match child.kind() {
            "extends_clause" => {
                let mut value_cursor = child.walk();
                for value in child.children_by_field_name("value", &mut value_cursor) {
                    out.push(HeritageRef {
                        kind: HeritageKind::Extends,
                        name: node_text(value, source).to_string(),
                    });
                }
            }
            "implements_clause" => {
                let mut type_cursor = child.walk();
                for ty in child.named_children(&mut type_cursor) {
                    out.push(HeritageRef {
                        kind: HeritageKind::Implements,
                        name: node_text(ty, source).to_string(),
                    });
                }
            }
            // JS grammar: `class_heritage` holds the extends expression itself
            _ => out.push(HeritageRef {
                kind: HeritageKind::Extends,
                name: node_text(child, source).to_string(),
            }),
        }
    }
}

fn method_member(member: Node, source: &str) -> SymbolInfo {
    let name = member
        .child_by_field_name("name")
        .map(|n| node_text(n, source).to_string())
        .unwrap_or_default();

    let method_kind = if name == "constructor" {
        MethodKind::Constructor
    } else if has_token(member, "get") {
        MethodKind::Getter
    } else if has_token(member, "set") {
        MethodKind::Setter
    } else {
        MethodKind::Method
    };

    let mut symbol = SymbolInfo::new(name, SymbolKind::Method, span_of(member));
    symbol.method_kind = Some(method_kind);
    symbol.is_async = has_token(member, "async");
    symbol.params = Some(params_of(member, source));
    symbol.return_type = member
        .child_by_field_name("return_type")
        .map(|t| type_text(t, source));
    symbol.modifiers = modifiers_of(member, source);
    symbol.decorators = decorators_of(member, source);
    if member.kind() == "abstract_method_signature"
        && !symbol.modifiers.iter().any(|m| m == "abstract")
    {
        symbol.modifiers.push("abstract".to_string());
    }
    symbol
}

fn property_member(member: Node, source: &str) -> SymbolInfo {
    let name = member
        .child_by_field_name("name")
        .map(|n| node_text(n, source).to_string())
        .unwrap_or_default();
    let mut symbol = SymbolInfo::new(name, SymbolKind::Property, span_of(member));
    symbol.return_type = member
        .child_by_field_name("type")
        .map(|t| type_text(t, source));
    symbol.modifiers = modifiers_of(member, source);
    symbol.decorators = decorators_of(member, source);
    symbol
}

// ---------------------------------------------------------------------------
// Interfaces & enums
// ---------------------------------------------------------------------------

fn interface_symbol(decl: Node, span_node: Node, source: &str) -> SymbolInfo {
    let name = decl
        .child_by_field_name("name")
        .map(|n| node_text(n, source).to_string())
        .unwrap_or_default();
    let mut symbol = SymbolInfo::new(name, SymbolKind::Interface, span_of(span_node));
    symbol.type_params = type_params_of(decl, source);

    let mut cursor = decl.walk();
    for child in decl.named_children(&mut cursor) {
        if child.kind() == "extends_type_clause" {
            let mut type_cursor = child.walk();
            for ty in child.children_by_field_name("type", &mut type_cursor) {
                symbol.heritage.push(HeritageRef {
                    kind: HeritageKind::Extends,
                    name: node_text(ty, source).to_string(),
                });
            }
        }
    }

    if let Some(body) = decl.child_by_field_name("body") {
        let mut body_cursor = body.walk();
        for member in body.named_children(&mut body_cursor) {
            match member.kind() {
                "property_signature" => symbol.members.push(property_member(member, source)),
                "method_signature" => symbol.members.push(method_member(member, source)),
                _ => {}
            }
        }
    }

    symbol
}

fn enum_symbol(decl: Node, span_node: Node, source: &str) -> SymbolInfo {
    let name = decl
        .child_by_field_name("name")
        .map(|n| node_text(n, source).to_string())
        .unwrap_or_default();
    let mut symbol = SymbolInfo::new(name, SymbolKind::Enum, span_of(span_node));
    if has_token(decl, "const") {
        symbol.modifiers.push("const".to_string());
    }

    if let Some(body) = decl.child_by_field_name("body") {
        let mut cursor = body.walk();
        for member in body.named_children(&mut cursor) {
            let entry = match member.kind() {
                "enum_assignment" => member.child_by_field_name("name"),
                "property_identifier" | "string" => Some(member),
                _ => None,
            };
            if let Some(entry) = entry {
                let text = node_text(entry, source)
                    .trim_matches(|c| c == '"' || c == '\'')
                    .to_string();
                let mut m = SymbolInfo::new(text, SymbolKind::Property, span_of(member));
                m.modifiers = Vec::new();
                symbol.members.push(m);
            }
        }
    }

    symbol
}
