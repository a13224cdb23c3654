//! Call relation extraction
//!
//! Depth-first walk over the whole tree carrying two stacks: the enclosing
//! named callable (caller attribution) and the enclosing class. Dynamic
//! `import()` expressions are collected here too, since they may appear at
//! any depth.

use crate::extract::resolve::SpecifierResolver;
use crate::extract::types::*;
use crate::extract::{is_function_value, node_text};
use crate::parse::ParsedSource;
use std::path::{Path, PathBuf};
use tree_sitter::Node;

struct CallWalk<'a> {
    source: &'a str,
    abs_path: &'a Path,
    import_map: &'a ImportMap,
    resolver: &'a dyn SpecifierResolver,
    function_stack: Vec<String>,
    class_stack: Vec<String>,
    relations: Vec<RelationDraft>,
}

pub fn extract_calls(
    parsed: &ParsedSource,
    abs_path: &Path,
    import_map: &ImportMap,
    resolver: &dyn SpecifierResolver,
) -> Vec<RelationDraft> {
    let mut walk = CallWalk {
        source: parsed.source.as_str(),
        abs_path,
        import_map,
        resolver,
        function_stack: Vec::new(),
        class_stack: Vec::new(),
        relations: Vec::new(),
    };
    walk.visit(parsed.tree.root_node());
    walk.relations
}

impl<'a> CallWalk<'a> {
    fn visit(&mut self, node: Node) {
        match node.kind() {
            "class_declaration" | "abstract_class_declaration" | "class" => {
                let name = node
                    .child_by_field_name("name")
                    .map(|n| node_text(n, self.source).to_string())
                    .unwrap_or_else(|| "<anonymous>".to_string());
                self.class_stack.push(name);
                self.visit_children(node);
                self.class_stack.pop();
            }
            "method_definition" | "abstract_method_signature" => {
                let method = node
                    .child_by_field_name("name")
                    .map(|n| node_text(n, self.source).to_string())
                    .unwrap_or_else(|| "<anonymous>".to_string());
                let qualified = match self.class_stack.last() {
                    Some(class) => format!("{}.{}", class, method),
                    None => method,
                };
                self.function_stack.push(qualified);
                self.visit_children(node);
                self.function_stack.pop();
            }
            "function_declaration" | "generator_function_declaration" => {
                let name = node
                    .child_by_field_name("name")
                    .map(|n| node_text(n, self.source).to_string())
                    .unwrap_or_else(|| "<anonymous>".to_string());
                self.function_stack.push(name);
                self.visit_children(node);
                self.function_stack.pop();
            }
            "variable_declarator" => {
                let name = node.child_by_field_name("name");
                let value = node.child_by_field_name("value");
                match (name, value) {
                    (Some(name), Some(value))
                        if name.kind() == "identifier" && is_function_value(value) =>
                    {
                        self.function_stack
                            .push(node_text(name, self.source).to_string());
                        self.visit_children(value);
                        self.function_stack.pop();
                    }
                    _ => self.visit_children(node),
                }
            }
            // A function value reached directly is anonymous
            "arrow_function" | "function_expression" | "function" | "generator_function" => {
                let name = match self.function_stack.last() {
                    Some(parent) => format!("{}.<anonymous>", parent),
                    None => "<anonymous>".to_string(),
                };
                self.function_stack.push(name);
                self.visit_children(node);
                self.function_stack.pop();
            }
            "call_expression" => {
                if let Some(callee) = node.child_by_field_name("function") {
                    if callee.kind() == "import" {
                        self.dynamic_import(node);
                    } else {
                        self.emit_call(callee, false);
                    }
                }
                self.visit_children(node);
            }
            "new_expression" => {
                if let Some(callee) = node.child_by_field_name("constructor") {
                    self.emit_call(callee, true);
                }
                self.visit_children(node);
            }
            _ => self.visit_children(node),
        }
    }

    fn visit_children(&mut self, node: Node) {
        let mut cursor = node.walk();
        let children: Vec<Node> = node.children(&mut cursor).collect();
        for child in children {
            self.visit(child);
        }
    }

    fn emit_call(&mut self, callee: Node, is_new: bool) {
        let Some(qn) = qualified_name(callee, self.source) else {
            return;
        };
        let (dst_path, dst_symbol, _class) =
            resolve_call_target(&qn, self.import_map, self.abs_path);

        let src_symbol = self.function_stack.last().cloned();
        let meta = RelationMeta {
            is_new: is_new.then_some(true),
            scope: src_symbol.is_none().then(|| "module".to_string()),
            ..Default::default()
        };

        self.relations.push(RelationDraft {
            kind: RelationKind::Calls,
            src_symbol,
            dst_path,
            dst_symbol: Some(dst_symbol),
            meta: Some(meta).filter(|m| !m.is_empty()),
        });
    }

    fn dynamic_import(&mut self, call: Node) {
        let Some(args) = call.child_by_field_name("arguments") else {
            return;
        };
        let Some(first) = args.named_child(0) else {
            return;
        };
        // Only literal specifiers are resolvable
        if first.kind() != "string" {
            return;
        }
        let specifier = node_text(first, self.source)
            .trim_matches(|c| c == '"' || c == '\'' || c == '`')
            .to_string();
        let Some(dst_path) = self.resolver.resolve(&specifier, self.abs_path) else {
            return;
        };

        self.relations.push(RelationDraft {
            kind: RelationKind::Imports,
            src_symbol: self.function_stack.last().cloned(),
            dst_path,
            dst_symbol: None,
            meta: Some(RelationMeta {
                is_dynamic: Some(true),
                ..Default::default()
            }),
        });
    }
}

/// Longest `identifier`/`member_expression` chain of a callee, or `None`
/// when the callee is not a plain chain (computed access, call results).
pub(crate) fn qualified_name(node: Node, source: &str) -> Option<QualifiedName> {
    let mut node = node;
    loop {
        match node.kind() {
            "parenthesized_expression" | "non_null_expression" | "as_expression" => {
                node = node.named_child(0)?;
            }
            _ => break,
        }
    }

    let mut parts_rev: Vec<String> = Vec::new();
    loop {
        match node.kind() {
            "identifier" => {
                let mut parts = parts_rev;
                parts.reverse();
                return Some(QualifiedName {
                    root: node_text(node, source).to_string(),
                    parts,
                });
            }
            "member_expression" => {
                let property = node.child_by_field_name("property")?;
                if property.kind() != "property_identifier" {
                    return None;
                }
                parts_rev.push(node_text(property, source).to_string());
                node = node.child_by_field_name("object")?;
            }
            _ => return None,
        }
    }
}

/// The four resolution classes of §destination computation.
pub(crate) fn resolve_call_target(
    qn: &QualifiedName,
    import_map: &ImportMap,
    current_file: &Path,
) -> (PathBuf, String, ResolutionClass) {
    if qn.parts.is_empty() {
        if let Some(import) = import_map.get(&qn.root) {
            return (
                import.resolved_path.clone(),
                import.imported_name.clone(),
                ResolutionClass::Import,
            );
        }
        return (
            current_file.to_path_buf(),
            qn.root.clone(),
            ResolutionClass::Local,
        );
    }

    if let Some(import) = import_map.get(&qn.root) {
        if import.is_namespace() {
            return (
                import.resolved_path.clone(),
                qn.parts.last().cloned().unwrap_or_default(),
                ResolutionClass::Namespace,
            );
        }
    }

    (
        current_file.to_path_buf(),
        qn.full(),
        ResolutionClass::LocalMember,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::imports::extract_imports;
    use crate::extract::resolve::FirstCandidateResolver;
    use crate::parse::SourceParser;

    fn run(source: &str) -> Vec<RelationDraft> {
        let path = Path::new("/proj/src/a.ts");
        let parsed = SourceParser::parse(path, source.to_string()).unwrap();
        let resolver = FirstCandidateResolver { aliases: None };
        let (import_map, _) = extract_imports(&parsed, path, &resolver);
        extract_calls(&parsed, path, &import_map, &resolver)
    }

    #[test]
    fn test_local_call_attribution() {
        let relations = run("function main() { helper(); }\nfunction helper() {}\n");
        assert_eq!(relations.len(), 1);
        let rel = &relations[0];
        assert_eq!(rel.src_symbol.as_deref(), Some("main"));
        assert_eq!(rel.dst_symbol.as_deref(), Some("helper"));
        assert_eq!(rel.dst_path, PathBuf::from("/proj/src/a.ts"));
        assert!(rel.meta.is_none());
    }

    #[test]
    fn test_module_scope_call() {
        let relations = run("setup();\n");
        assert_eq!(relations.len(), 1);
        assert!(relations[0].src_symbol.is_none());
        assert_eq!(
            relations[0].meta.as_ref().unwrap().scope.as_deref(),
            Some("module")
        );
    }

    #[test]
    fn test_imported_call() {
        let relations = run("import { helper as h } from \"./util\";\nfunction go() { h(); }\n");
        let rel = relations
            .iter()
            .find(|r| r.src_symbol.as_deref() == Some("go"))
            .unwrap();
        assert_eq!(rel.dst_path, PathBuf::from("/proj/src/util.ts"));
        // The imported (original) name, not the local alias
        assert_eq!(rel.dst_symbol.as_deref(), Some("helper"));
    }

    #[test]
    fn test_namespace_member_call() {
        let relations = run("import * as ns from \"./m\";\nfunction go() { ns.deep.fire(); }\n");
        let rel = relations
            .iter()
            .find(|r| r.src_symbol.as_deref() == Some("go"))
            .unwrap();
        assert_eq!(rel.dst_path, PathBuf::from("/proj/src/m.ts"));
        assert_eq!(rel.dst_symbol.as_deref(), Some("fire"));
    }

    #[test]
    fn test_local_member_call() {
        let relations = run("function go() { obj.method(); }\n");
        assert_eq!(relations[0].dst_symbol.as_deref(), Some("obj.method"));
        assert_eq!(relations[0].dst_path, PathBuf::from("/proj/src/a.ts"));
    }

    #[test]
    fn test_new_expression_meta() {
        let relations = run("import { Service } from \"./svc\";\nconst s = new Service();\n");
        let rel = relations
            .iter()
            .find(|r| r.dst_symbol.as_deref() == Some("Service"))
            .unwrap();
        assert_eq!(rel.meta.as_ref().unwrap().is_new, Some(true));
        // Variable declarator with a non-function value stays module scope
        assert!(rel.src_symbol.is_none());
    }

    #[test]
    fn test_method_attribution() {
        let relations = run("class Svc {\n  run() { this.helperCall(); go(); }\n}\n");
        let rel = relations
            .iter()
            .find(|r| r.dst_symbol.as_deref() == Some("go"))
            .unwrap();
        assert_eq!(rel.src_symbol.as_deref(), Some("Svc.run"));
    }

    #[test]
    fn test_anonymous_function_attribution() {
        let relations = run("const handler = () => { inner(); };\nitems.forEach(function () { each(); });\n");
        let inner = relations
            .iter()
            .find(|r| r.dst_symbol.as_deref() == Some("inner"))
            .unwrap();
        assert_eq!(inner.src_symbol.as_deref(), Some("handler"));

        let each = relations
            .iter()
            .find(|r| r.dst_symbol.as_deref() == Some("each"))
            .unwrap();
        assert_eq!(each.src_symbol.as_deref(), Some("<anonymous>"));
    }

    #[test]
    fn test_nested_calls_all_emit() {
        let relations = run("function go() { outer(inner()); }\n");
        let names: Vec<&str> = relations
            .iter()
            .filter_map(|r| r.dst_symbol.as_deref())
            .collect();
        assert!(names.contains(&"outer"));
        assert!(names.contains(&"inner"));
    }

    #[test]
    fn test_dynamic_import() {
        let relations =
            run("async function load() { const m = await import(\"./lazy\"); }\nimport(name);\n");
        let dynamic: Vec<_> = relations
            .iter()
            .filter(|r| r.kind == RelationKind::Imports)
            .collect();
        // Non-literal argument is skipped
        assert_eq!(dynamic.len(), 1);
        assert_eq!(dynamic[0].dst_path, PathBuf::from("/proj/src/lazy.ts"));
        assert_eq!(dynamic[0].meta.as_ref().unwrap().is_dynamic, Some(true));
        assert_eq!(dynamic[0].src_symbol.as_deref(), Some("load"));
    }
}
