//! Heritage relation extraction
//!
//! `extends` for class→superclass and interface→base, `implements` for
//! class→interface. Destination resolution mirrors calls, except namespace
//! and regular imports carry their own metadata shapes.

use crate::extract::types::*;
use crate::extract::node_text;
use crate::parse::ParsedSource;
use std::path::Path;
use tree_sitter::Node;

pub fn extract_heritage(
    parsed: &ParsedSource,
    abs_path: &Path,
    import_map: &ImportMap,
) -> Vec<RelationDraft> {
    let root = parsed.tree.root_node();
    let source = parsed.source.as_str();
    let mut relations = Vec::new();

    let mut cursor = root.walk();
    for stmt in root.named_children(&mut cursor) {
        let decl = if stmt.kind() == "export_statement" {
            match stmt.child_by_field_name("declaration") {
                Some(decl) => decl,
                None => continue,
            }
        } else {
            stmt
        };

        match decl.kind() {
            "class_declaration" | "abstract_class_declaration" | "class" => {
                let class_name = decl
                    .child_by_field_name("name")
                    .map(|n| node_text(n, source).to_string())
                    .unwrap_or_else(|| "default".to_string());
                collect_class_clauses(decl, source, &class_name, import_map, abs_path, &mut relations);
            }
            "interface_declaration" => {
                let interface_name = decl
                    .child_by_field_name("name")
                    .map(|n| node_text(n, source).to_string())
                    .unwrap_or_default();
                collect_interface_clauses(
                    decl,
                    source,
                    &interface_name,
                    import_map,
                    abs_path,
                    &mut relations,
                );
            }
            _ => {}
        }
    }

    relations
}

fn collect_class_clauses(
    decl: Node,
    source: &str,
    class_name: &str,
    import_map: &ImportMap,
    abs_path: &Path,
    relations: &mut Vec<RelationDraft>,
) {
    let mut cursor = decl.walk();
    for heritage in decl.named_children(&mut cursor) {
        if heritage.kind() != "class_heritage" {
            continue;
        }
        let mut clause_cursor = heritage.walk();
        for clause in heritage.named_children(&mut clause_cursor) {
            match clause.kind() {
                "extends_clause" => {
                    let mut value_cursor = clause.walk();
                    for value in clause.children_by_field_name("value", &mut value_cursor) {
                        emit(
                            RelationKind::Extends,
                            class_name,
                            value,
                            source,
                            import_map,
                            abs_path,
                            relations,
                        );
                    }
                }
                "implements_clause" => {
                    let mut type_cursor = clause.walk();
                    for ty in clause.named_children(&mut type_cursor) {
                        emit(
                            RelationKind::Implements,
                            class_name,
                            ty,
                            source,
                            import_map,
                            abs_path,
                            relations,
                        );
                    }
                }
                // JS grammar: the heritage node wraps the expression directly
                _ => emit(
                    RelationKind::Extends,
                    class_name,
                    clause,
                    source,
                    import_map,
                    abs_path,
                    relations,
                ),
            }
        }
    }
}

fn collect_interface_clauses(
    decl: Node,
    source: &str,
    interface_name: &str,
    import_map: &ImportMap,
    abs_path: &Path,
    relations: &mut Vec<RelationDraft>,
) {
    let mut cursor = decl.walk();
    for clause in decl.named_children(&mut cursor) {
        if clause.kind() != "extends_type_clause" {
            continue;
        }
        let mut type_cursor = clause.walk();
        for ty in clause.children_by_field_name("type", &mut type_cursor) {
            emit(
                RelationKind::Extends,
                interface_name,
                ty,
                source,
                import_map,
                abs_path,
                relations,
            );
        }
    }
}

fn emit(
    kind: RelationKind,
    src_symbol: &str,
    target: Node,
    source: &str,
    import_map: &ImportMap,
    abs_path: &Path,
    relations: &mut Vec<RelationDraft>,
) {
    let Some(qn) = heritage_name(target, source) else {
        return;
    };

    let (dst_path, dst_symbol, meta) = match import_map.get(&qn.root) {
        Some(import) if import.is_namespace() => (
            import.resolved_path.clone(),
            qn.parts.last().cloned().unwrap_or_else(|| qn.root.clone()),
            RelationMeta {
                is_namespace_import: Some(true),
                ..Default::default()
            },
        ),
        Some(import) => {
            let dst_symbol = if qn.parts.is_empty() {
                import.imported_name.clone()
            } else {
                qn.full()
            };
            (import.resolved_path.clone(), dst_symbol, RelationMeta::default())
        }
        None => (
            abs_path.to_path_buf(),
            qn.full(),
            RelationMeta {
                is_local: Some(true),
                ..Default::default()
            },
        ),
    };

    relations.push(RelationDraft {
        kind,
        src_symbol: Some(src_symbol.to_string()),
        dst_path,
        dst_symbol: Some(dst_symbol),
        meta: Some(meta).filter(|m| !m.is_empty()),
    });
}

/// Qualified name of a heritage target: an expression chain for classes, a
/// (possibly nested, possibly generic) type name for interfaces.
fn heritage_name(node: Node, source: &str) -> Option<QualifiedName> {
    let node = match node.kind() {
        "generic_type" => node.child_by_field_name("name").unwrap_or(node),
        _ => node,
    };

    match node.kind() {
        "identifier" | "type_identifier" => Some(QualifiedName {
            root: node_text(node, source).to_string(),
            parts: Vec::new(),
        }),
        "member_expression" | "nested_type_identifier" => {
            qualified_from_text(node_text(node, source))
        }
        _ => None,
    }
}

fn qualified_from_text(text: &str) -> Option<QualifiedName> {
    let mut segments = text.split('.').map(str::trim);
    let root = segments.next()?.to_string();
    if root.is_empty() || !is_identifier(&root) {
        return None;
    }
    let mut parts = Vec::new();
    for segment in segments {
        if !is_identifier(segment) {
            return None;
        }
        parts.push(segment.to_string());
    }
    Some(QualifiedName { root, parts })
}

fn is_identifier(s: &str) -> bool {
    !s.is_empty()
        && s.chars()
            .all(|c| c.is_alphanumeric() || c == '_' || c == '$')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::imports::extract_imports;
    use crate::extract::resolve::FirstCandidateResolver;
    use crate::parse::SourceParser;
    use std::path::PathBuf;

    fn run(source: &str) -> Vec<RelationDraft> {
        let path = Path::new("/proj/src/a.ts");
        let parsed = SourceParser::parse(path, source.to_string()).unwrap();
        let resolver = FirstCandidateResolver { aliases: None };
        let (import_map, _) = extract_imports(&parsed, path, &resolver);
        extract_heritage(&parsed, path, &import_map)
    }

    #[test]
    fn test_local_extends() {
        let relations = run("class Base {}\nclass Child extends Base {}\n");
        assert_eq!(relations.len(), 1);
        let rel = &relations[0];
        assert_eq!(rel.kind, RelationKind::Extends);
        assert_eq!(rel.src_symbol.as_deref(), Some("Child"));
        assert_eq!(rel.dst_symbol.as_deref(), Some("Base"));
        assert_eq!(rel.dst_path, PathBuf::from("/proj/src/a.ts"));
        assert_eq!(rel.meta.as_ref().unwrap().is_local, Some(true));
    }

    #[test]
    fn test_imported_extends() {
        let relations =
            run("import { Base } from \"./base\";\nexport class Child extends Base {}\n");
        assert_eq!(relations.len(), 1);
        let rel = &relations[0];
        assert_eq!(rel.dst_path, PathBuf::from("/proj/src/base.ts"));
        assert_eq!(rel.dst_symbol.as_deref(), Some("Base"));
        assert!(rel.meta.is_none());
    }

    #[test]
    fn test_namespace_extends() {
        let relations = run("import * as ns from \"./m\";\nclass C extends ns.Base {}\n");
        assert_eq!(relations.len(), 1);
        let rel = &relations[0];
        assert_eq!(rel.dst_path, PathBuf::from("/proj/src/m.ts"));
        assert_eq!(rel.dst_symbol.as_deref(), Some("Base"));
        assert_eq!(rel.meta.as_ref().unwrap().is_namespace_import, Some(true));
    }

    #[test]
    fn test_implements() {
        let relations = run(
            "import { Runnable } from \"./run\";\ninterface Local {}\nclass C implements Runnable, Local {}\n",
        );
        assert_eq!(relations.len(), 2);
        assert!(relations.iter().all(|r| r.kind == RelationKind::Implements));
        assert_eq!(relations[0].dst_path, PathBuf::from("/proj/src/run.ts"));
        assert_eq!(relations[1].dst_symbol.as_deref(), Some("Local"));
        assert_eq!(relations[1].meta.as_ref().unwrap().is_local, Some(true));
    }

    #[test]
    fn test_interface_extends() {
        let relations = run("interface Big extends Small, Wide<number> {}\n");
        assert_eq!(relations.len(), 2);
        assert_eq!(relations[0].dst_symbol.as_deref(), Some("Small"));
        // Generic arguments are stripped from the heritage name
        assert_eq!(relations[1].dst_symbol.as_deref(), Some("Wide"));
    }

    #[test]
    fn test_mixin_expression_skipped() {
        let relations = run("class C extends mixin(Base) {}\n");
        assert!(relations.is_empty());
    }
}
