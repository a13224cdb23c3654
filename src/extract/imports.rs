//! Import map and import/re-export relations
//!
//! Top-level `import`/`export ... from` statements only; dynamic `import()`
//! is picked up during the call walk. Locals are keyed by their bound name,
//! so a later binding shadows an earlier one.

use crate::extract::resolve::SpecifierResolver;
use crate::extract::types::*;
use crate::extract::{has_token, node_text};
use crate::parse::ParsedSource;
use std::path::Path;
use tree_sitter::Node;

pub fn extract_imports(
    parsed: &ParsedSource,
    abs_path: &Path,
    resolver: &dyn SpecifierResolver,
) -> (ImportMap, Vec<RelationDraft>) {
    let root = parsed.tree.root_node();
    let source = parsed.source.as_str();

    let mut map = ImportMap::new();
    let mut relations = Vec::new();

    let mut cursor = root.walk();
    for stmt in root.named_children(&mut cursor) {
        match stmt.kind() {
            "import_statement" => {
                import_statement(stmt, source, abs_path, resolver, &mut map, &mut relations);
            }
            "export_statement" if stmt.child_by_field_name("source").is_some() => {
                reexport_statement(stmt, source, abs_path, resolver, &mut relations);
            }
            _ => {}
        }
    }

    (map, relations)
}

fn specifier_of(stmt: Node, source: &str) -> Option<String> {
    let string = stmt.child_by_field_name("source")?;
    Some(string_value(string, source))
}

fn string_value(string: Node, source: &str) -> String {
    string
        .named_child(0)
        .map(|f| node_text(f, source).to_string())
        .unwrap_or_else(|| {
            node_text(string, source)
                .trim_matches(|c| c == '"' || c == '\'' || c == '`')
                .to_string()
        })
}

fn import_statement(
    stmt: Node,
    source: &str,
    abs_path: &Path,
    resolver: &dyn SpecifierResolver,
    map: &mut ImportMap,
    relations: &mut Vec<RelationDraft>,
) {
    let Some(specifier) = specifier_of(stmt, source) else {
        return;
    };
    let Some(dst_path) = resolver.resolve(&specifier, abs_path) else {
        // Unresolvable (external package) or filtered by the known-files set
        return;
    };

    // `import type ...` at statement level becomes a type reference
    let is_type = has_token(stmt, "type");
    let kind = if is_type {
        RelationKind::TypeReferences
    } else {
        RelationKind::Imports
    };
    let type_meta = || RelationMeta {
        is_type: is_type.then_some(true),
        ..Default::default()
    };

    let mut clause = None;
    let mut clause_cursor = stmt.walk();
    for child in stmt.named_children(&mut clause_cursor) {
        if child.kind() == "import_clause" {
            clause = Some(child);
        }
    }

    let Some(clause) = clause else {
        // Side-effect import: exactly one relation with null symbols
        relations.push(RelationDraft {
            kind,
            src_symbol: None,
            dst_path,
            dst_symbol: None,
            meta: Some(type_meta()).filter(|m| !m.is_empty()),
        });
        return;
    };

    let mut cursor = clause.walk();
    for item in clause.named_children(&mut cursor) {
        match item.kind() {
            "identifier" => {
                // Default import
                let local = node_text(item, source).to_string();
                map.insert(
                    local.clone(),
                    ImportRef {
                        resolved_path: dst_path.clone(),
                        imported_name: "default".to_string(),
                    },
                );
                let mut meta = type_meta();
                meta.dst_symbol_name = Some("default".to_string());
                meta.src_symbol_name = Some(local);
                relations.push(RelationDraft {
                    kind,
                    src_symbol: None,
                    dst_path: dst_path.clone(),
                    dst_symbol: Some("default".to_string()),
                    meta: Some(meta),
                });
            }
            "namespace_import" => {
                let Some(local_node) = item.named_child(0) else {
                    continue;
                };
                let local = node_text(local_node, source).to_string();
                map.insert(
                    local.clone(),
                    ImportRef {
                        resolved_path: dst_path.clone(),
                        imported_name: "*".to_string(),
                    },
                );
                let mut meta = type_meta();
                meta.import_kind = Some("namespace".to_string());
                meta.src_symbol_name = Some(local);
                relations.push(RelationDraft {
                    kind,
                    src_symbol: None,
                    dst_path: dst_path.clone(),
                    dst_symbol: Some("*".to_string()),
                    meta: Some(meta),
                });
            }
            "named_imports" => {
                let mut spec_cursor = item.walk();
                for spec in item.named_children(&mut spec_cursor) {
                    if spec.kind() != "import_specifier" {
                        continue;
                    }
                    let Some(name_node) = spec.child_by_field_name("name") else {
                        continue;
                    };
                    let imported = node_text(name_node, source).to_string();
                    let local = spec
                        .child_by_field_name("alias")
                        .map(|a| node_text(a, source).to_string())
                        .unwrap_or_else(|| imported.clone());

                    map.insert(
                        local.clone(),
                        ImportRef {
                            resolved_path: dst_path.clone(),
                            imported_name: imported.clone(),
                        },
                    );

                    let mut meta = type_meta();
                    meta.dst_symbol_name = Some(imported.clone());
                    if local != imported {
                        meta.src_symbol_name = Some(local);
                    }
                    relations.push(RelationDraft {
                        kind,
                        src_symbol: None,
                        dst_path: dst_path.clone(),
                        dst_symbol: Some(imported),
                        meta: Some(meta),
                    });
                }
            }
            _ => {}
        }
    }
}

fn reexport_statement(
    stmt: Node,
    source: &str,
    abs_path: &Path,
    resolver: &dyn SpecifierResolver,
    relations: &mut Vec<RelationDraft>,
) {
    let Some(specifier) = specifier_of(stmt, source) else {
        return;
    };
    let Some(dst_path) = resolver.resolve(&specifier, abs_path) else {
        return;
    };

    let is_type = has_token(stmt, "type");
    let kind = if is_type {
        RelationKind::TypeReferences
    } else {
        RelationKind::ReExports
    };

    let mut meta = RelationMeta {
        is_re_export: Some(true),
        is_type: is_type.then_some(true),
        ..Default::default()
    };

    let mut cursor = stmt.walk();
    for child in stmt.named_children(&mut cursor) {
        match child.kind() {
            // `export * as ns from "./m"`
            "namespace_export" => {
                meta.import_kind = Some("namespace".to_string());
                if let Some(local) = child.named_child(0) {
                    meta.src_symbol_name = Some(node_text(local, source).to_string());
                }
            }
            // `export { a, b as c } from "./m"`
            "export_clause" => {
                let mut spec_cursor = child.walk();
                let specifiers: Vec<ReExportSpecifier> = child
                    .named_children(&mut spec_cursor)
                    .filter(|s| s.kind() == "export_specifier")
                    .filter_map(|s| {
                        let name = s.child_by_field_name("name")?;
                        let local = node_text(name, source).to_string();
                        let exported = s
                            .child_by_field_name("alias")
                            .map(|a| node_text(a, source).to_string())
                            .unwrap_or_else(|| local.clone());
                        Some(ReExportSpecifier { local, exported })
                    })
                    .collect();
                if !specifiers.is_empty() {
                    meta.specifiers = Some(specifiers);
                }
            }
            _ => {}
        }
    }

    relations.push(RelationDraft {
        kind,
        src_symbol: None,
        dst_path,
        dst_symbol: None,
        meta: Some(meta),
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::resolve::FirstCandidateResolver;
    use crate::parse::SourceParser;
    use std::path::PathBuf;

    fn run(source: &str) -> (ImportMap, Vec<RelationDraft>) {
        let parsed = SourceParser::parse(Path::new("/proj/src/a.ts"), source.to_string()).unwrap();
        let resolver = FirstCandidateResolver { aliases: None };
        extract_imports(&parsed, Path::new("/proj/src/a.ts"), &resolver)
    }

    fn dst(path: &str) -> PathBuf {
        PathBuf::from(path)
    }

    #[test]
    fn test_named_and_default_imports() {
        let (map, relations) = run(
            "import Default, { one, two as alias } from \"./m\";\nimport * as ns from \"./n\";\n",
        );

        assert_eq!(map.get("Default").unwrap().imported_name, "default");
        assert_eq!(map.get("one").unwrap().imported_name, "one");
        assert_eq!(map.get("alias").unwrap().imported_name, "two");
        assert!(map.get("two").is_none());
        assert!(map.get("ns").unwrap().is_namespace());
        assert_eq!(map.get("one").unwrap().resolved_path, dst("/proj/src/m.ts"));

        assert_eq!(relations.len(), 4);
        assert!(relations.iter().all(|r| r.kind == RelationKind::Imports));
        let alias_rel = relations
            .iter()
            .find(|r| r.dst_symbol.as_deref() == Some("two"))
            .unwrap();
        let meta = alias_rel.meta.as_ref().unwrap();
        assert_eq!(meta.src_symbol_name.as_deref(), Some("alias"));
        assert_eq!(meta.dst_symbol_name.as_deref(), Some("two"));

        let ns_rel = relations
            .iter()
            .find(|r| r.dst_path == dst("/proj/src/n.ts"))
            .unwrap();
        assert_eq!(
            ns_rel.meta.as_ref().unwrap().import_kind.as_deref(),
            Some("namespace")
        );
    }

    #[test]
    fn test_side_effect_import() {
        let (map, relations) = run("import \"./setup\";\n");
        assert!(map.is_empty());
        assert_eq!(relations.len(), 1);
        assert!(relations[0].src_symbol.is_none());
        assert!(relations[0].dst_symbol.is_none());
        assert!(relations[0].meta.is_none());
    }

    #[test]
    fn test_type_only_import() {
        let (_, relations) = run("import type { Config } from \"./config\";\n");
        assert_eq!(relations.len(), 1);
        assert_eq!(relations[0].kind, RelationKind::TypeReferences);
        assert_eq!(relations[0].meta.as_ref().unwrap().is_type, Some(true));
    }

    #[test]
    fn test_reexport_specifiers() {
        let (map, relations) = run("export { x, y as z } from \"./a\";\n");
        assert!(map.is_empty());
        assert_eq!(relations.len(), 1);
        let rel = &relations[0];
        assert_eq!(rel.kind, RelationKind::ReExports);
        let meta = rel.meta.as_ref().unwrap();
        assert_eq!(meta.is_re_export, Some(true));
        assert_eq!(
            meta.specifiers.as_ref().unwrap(),
            &vec![
                ReExportSpecifier {
                    local: "x".into(),
                    exported: "x".into()
                },
                ReExportSpecifier {
                    local: "y".into(),
                    exported: "z".into()
                },
            ]
        );
    }

    #[test]
    fn test_export_star() {
        let (_, relations) = run("export * from \"./all\";\nexport * as ns from \"./named\";\n");
        assert_eq!(relations.len(), 2);
        assert_eq!(relations[0].kind, RelationKind::ReExports);
        assert!(relations[0].meta.as_ref().unwrap().specifiers.is_none());
        assert_eq!(
            relations[1].meta.as_ref().unwrap().import_kind.as_deref(),
            Some("namespace")
        );
    }

    #[test]
    fn test_unresolvable_bare_specifier_skipped() {
        let (map, relations) = run("import { useState } from \"react\";\n");
        assert!(map.is_empty());
        assert!(relations.is_empty());
    }

    #[test]
    fn test_later_binding_shadows_earlier() {
        let (map, _) = run("import { x } from \"./first\";\nimport { x } from \"./second\";\n");
        assert_eq!(
            map.get("x").unwrap().resolved_path,
            dst("/proj/src/second.ts")
        );
    }
}
