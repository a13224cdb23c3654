//! AST extraction
//!
//! Turns a parsed source file into symbol records and relation drafts.
//! Symbol extraction walks top-level statements only; relation extraction
//! walks the whole tree with caller-attribution stacks.

pub mod calls;
pub mod docs;
pub mod heritage;
pub mod imports;
pub mod resolve;
pub mod symbols;
pub mod types;

pub use resolve::{FirstCandidateResolver, KnownFilesResolver, SpecifierResolver};
pub use types::*;

use crate::parse::ParsedSource;
use std::path::Path;
use tree_sitter::Node;

/// Run every extraction pass over one parsed file.
///
/// `abs_path` is the absolute path of the file being extracted; `resolver`
/// maps import specifiers to destination paths (see [`resolve`]).
pub fn extract_file(
    parsed: &ParsedSource,
    abs_path: &Path,
    resolver: &dyn SpecifierResolver,
) -> FileExtraction {
    let symbols = symbols::extract_symbols(parsed);
    let (import_map, mut relations) = imports::extract_imports(parsed, abs_path, resolver);
    relations.extend(calls::extract_calls(parsed, abs_path, &import_map, resolver));
    relations.extend(heritage::extract_heritage(parsed, abs_path, &import_map));

    FileExtraction {
        symbols,
        relations,
        import_map,
    }
}

pub(crate) fn node_text<'a>(node: Node, source: &'a str) -> &'a str {
    node.utf8_text(source.as_bytes()).unwrap_or("")
}

pub(crate) fn span_of(node: Node) -> Span {
    Span {
        start: Position {
            line: node.start_position().row as u32 + 1,
            column: node.start_position().column as u32,
        },
        end: Position {
            line: node.end_position().row as u32 + 1,
            column: node.end_position().column as u32,
        },
    }
}

/// Whether `node` carries an anonymous keyword token like `async` or
/// `default` among its direct children.
pub(crate) fn has_token(node: Node, token: &str) -> bool {
    let mut cursor = node.walk();
    let result = node.children(&mut cursor)
        .any(|c| !c.is_named() && c.kind() == token);
    result
}

/// Text of a `type_annotation` node without the leading `:`.
pub(crate) fn type_text(annotation: Node, source: &str) -> String {
    match annotation.named_child(0) {
        Some(ty) => node_text(ty, source).to_string(),
        None => node_text(annotation, source)
            .trim_start_matches(':')
            .trim()
            .to_string(),
    }
}

/// Whether a node is a function-valued expression.
pub(crate) fn is_function_value(node: Node) -> bool {
    matches!(
        node.kind(),
        "arrow_function" | "function_expression" | "function" | "generator_function"
    )
}
