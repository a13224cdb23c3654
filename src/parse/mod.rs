//! Tree-sitter parser adaptor
//!
//! Produces an AST plus comment list and source text for the extractor and
//! the semantic layer. Parsing is side-effect-free; callers own the result.

pub mod cache;

use crate::core::error::{Error, Result};
use std::path::Path;
use tree_sitter::{Language, Parser, Tree};

/// A comment token with its byte span in the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommentToken {
    pub start_byte: usize,
    pub end_byte: usize,
}

impl CommentToken {
    /// Slice the comment text out of the file it came from.
    pub fn text<'a>(&self, source: &'a str) -> &'a str {
        &source[self.start_byte..self.end_byte]
    }

    /// Whether this is a `/** ... */` doc block.
    pub fn is_doc(&self, source: &str) -> bool {
        self.text(source).starts_with("/**")
    }
}

/// Parse result: the tree, the text it was parsed from, and every comment.
pub struct ParsedSource {
    pub tree: Tree,
    pub source: String,
    pub comments: Vec<CommentToken>,
    /// Tree-sitter recovered from syntax errors somewhere in the file
    pub had_errors: bool,
}

impl ParsedSource {
    pub fn line_count(&self) -> u32 {
        self.source.lines().count() as u32
    }
}

fn language_for(path: &Path) -> Language {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "tsx" => tree_sitter_typescript::LANGUAGE_TSX.into(),
        "ts" | "mts" | "cts" => tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
        "jsx" => tree_sitter_javascript::LANGUAGE.into(),
        // Plain JS parses fine under the TS grammar too, but the JS grammar
        // is stricter about JSX-free sources
        "js" | "mjs" | "cjs" => tree_sitter_javascript::LANGUAGE.into(),
        _ => tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
    }
}

/// Stateless parser front-end; grammar chosen from the file extension.
pub struct SourceParser;

impl SourceParser {
    /// Parse `source` as the language implied by `path`.
    pub fn parse(path: &Path, source: String) -> Result<ParsedSource> {
        let mut parser = Parser::new();
        parser
            .set_language(&language_for(path))
            .map_err(|e| Error::Parse {
                file: path.to_path_buf(),
                message: e.to_string(),
            })?;

        let tree = parser.parse(&source, None).ok_or_else(|| Error::Parse {
            file: path.to_path_buf(),
            message: "parser returned no tree".to_string(),
        })?;

        let had_errors = tree.root_node().has_error();
        let comments = collect_comments(&tree);

        Ok(ParsedSource {
            tree,
            source,
            comments,
            had_errors,
        })
    }

    /// Read and parse a file from disk.
    pub fn parse_file(path: &Path) -> Result<ParsedSource> {
        let source = std::fs::read_to_string(path)?;
        Self::parse(path, source)
    }
}

fn collect_comments(tree: &Tree) -> Vec<CommentToken> {
    let mut comments = Vec::new();
    let mut cursor = tree.walk();
    let mut done = false;

    while !done {
        let node = cursor.node();
        if node.kind() == "comment" {
            comments.push(CommentToken {
                start_byte: node.start_byte(),
                end_byte: node.end_byte(),
            });
        }

        if cursor.goto_first_child() {
            continue;
        }
        loop {
            if cursor.goto_next_sibling() {
                break;
            }
            if !cursor.goto_parent() {
                done = true;
                break;
            }
        }
    }

    comments
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_typescript() {
        let parsed = SourceParser::parse(
            Path::new("a.ts"),
            "export function hi(name: string): void {}\n".to_string(),
        )
        .unwrap();
        assert!(!parsed.had_errors);
        assert_eq!(parsed.tree.root_node().kind(), "program");
        assert_eq!(parsed.line_count(), 1);
    }

    #[test]
    fn test_collect_comments() {
        let source = "// line\n/** doc */\nfunction f() {}\n/* block */\n".to_string();
        let parsed = SourceParser::parse(Path::new("a.ts"), source).unwrap();
        assert_eq!(parsed.comments.len(), 3);
        assert!(parsed.comments[1].is_doc(&parsed.source));
        assert!(!parsed.comments[0].is_doc(&parsed.source));
        assert_eq!(parsed.comments[0].text(&parsed.source), "// line");
    }

    #[test]
    fn test_parse_tsx() {
        let parsed = SourceParser::parse(
            Path::new("a.tsx"),
            "export const App = () => <div>hi</div>;\n".to_string(),
        )
        .unwrap();
        assert!(!parsed.had_errors);
    }

    #[test]
    fn test_error_recovery_flag() {
        let parsed =
            SourceParser::parse(Path::new("a.ts"), "function {{{".to_string()).unwrap();
        assert!(parsed.had_errors);
    }
}
