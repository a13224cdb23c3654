//! JSDoc attachment and parsing
//!
//! A doc block belongs to the next top-level statement unless another
//! statement starts between the comment's end and that statement.

use crate::extract::types::{DocBlock, DocTag};
use crate::parse::CommentToken;

/// Find the doc block for a top-level statement starting at `stmt_start`.
///
/// Chooses the latest `/** ... */` comment ending at or before the statement,
/// rejected if any other top-level statement begins in between.
pub fn doc_for_statement(
    stmt_start: usize,
    stmt_starts: &[usize],
    comments: &[CommentToken],
    source: &str,
) -> Option<DocBlock> {
    let candidate = comments
        .iter()
        .filter(|c| c.is_doc(source) && c.end_byte <= stmt_start)
        .max_by_key(|c| c.end_byte)?;

    let blocked = stmt_starts
        .iter()
        .any(|&s| s > candidate.end_byte && s < stmt_start);
    if blocked {
        return None;
    }

    Some(parse_jsdoc(candidate.text(source)))
}

/// Parse a `/** ... */` block into a description and `@tag` entries.
pub fn parse_jsdoc(raw: &str) -> DocBlock {
    let body = raw
        .trim_start_matches("/**")
        .trim_end_matches("*/")
        .trim();

    let mut description_lines: Vec<String> = Vec::new();
    let mut tags: Vec<DocTag> = Vec::new();

    for line in body.lines() {
        let line = line.trim().trim_start_matches('*').trim_start();
        if let Some(rest) = line.strip_prefix('@') {
            let (tag, text) = match rest.split_once(char::is_whitespace) {
                Some((tag, text)) => (tag.to_string(), text.trim().to_string()),
                None => (rest.to_string(), String::new()),
            };
            tags.push(DocTag { tag, text });
        } else if let Some(last) = tags.last_mut() {
            // Continuation of the previous tag
            if !line.is_empty() {
                if !last.text.is_empty() {
                    last.text.push(' ');
                }
                last.text.push_str(line);
            }
        } else if !(line.is_empty() && description_lines.is_empty()) {
            description_lines.push(line.to_string());
        }
    }

    while description_lines.last().map(|l| l.is_empty()).unwrap_or(false) {
        description_lines.pop();
    }

    DocBlock {
        description: description_lines.join("\n"),
        tags,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_jsdoc_description_and_tags() {
        let doc = parse_jsdoc(
            "/**\n * Formats a user name.\n *\n * @param name - raw name\n * @returns the label\n */",
        );
        assert_eq!(doc.description, "Formats a user name.");
        assert_eq!(doc.tags.len(), 2);
        assert_eq!(doc.tags[0].tag, "param");
        assert_eq!(doc.tags[0].text, "name - raw name");
        assert_eq!(doc.tags[1].tag, "returns");
    }

    #[test]
    fn test_parse_jsdoc_tag_continuation() {
        let doc = parse_jsdoc("/**\n * @remarks first line\n * second line\n */");
        assert_eq!(doc.tags[0].text, "first line second line");
    }

    #[test]
    fn test_parse_jsdoc_single_line() {
        let doc = parse_jsdoc("/** Just a summary. */");
        assert_eq!(doc.description, "Just a summary.");
        assert!(doc.tags.is_empty());
    }

    #[test]
    fn test_doc_attachment_interleaving() {
        // /** one */ fnA  /** two */ fnB — each statement takes the nearest
        let source = "/** one */\nfunction a() {}\n/** two */\nfunction b() {}\n";
        let comments = vec![
            CommentToken {
                start_byte: 0,
                end_byte: 10,
            },
            CommentToken {
                start_byte: 27,
                end_byte: 37,
            },
        ];
        let stmt_starts = vec![11, 38];

        let a = doc_for_statement(11, &stmt_starts, &comments, source).unwrap();
        assert_eq!(a.description, "one");
        let b = doc_for_statement(38, &stmt_starts, &comments, source).unwrap();
        assert_eq!(b.description, "two");
    }

    #[test]
    fn test_doc_not_attached_across_statement() {
        // /** doc */ fnA fnB — fnB must not steal fnA's doc
        let source = "/** doc */\nfunction a() {}\nfunction b() {}\n";
        let comments = vec![CommentToken {
            start_byte: 0,
            end_byte: 10,
        }];
        let stmt_starts = vec![11, 27];

        assert!(doc_for_statement(11, &stmt_starts, &comments, source).is_some());
        assert!(doc_for_statement(27, &stmt_starts, &comments, source).is_none());
    }

    #[test]
    fn test_line_comment_not_doc() {
        let source = "// plain\nfunction a() {}\n";
        let comments = vec![CommentToken {
            start_byte: 0,
            end_byte: 8,
        }];
        assert!(doc_for_statement(9, &[9], &comments, source).is_none());
    }
}
