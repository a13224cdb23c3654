//! Extraction data model
//!
//! Plain data produced by the extractor walks, consumed by the per-file
//! indexer. Serde shapes here define the on-disk JSON dialects (symbol
//! detail payloads and relation metadata), so field names are camelCase.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

// ---------------------------------------------------------------------------
// Symbols
// ---------------------------------------------------------------------------

/// Classification of symbol definitions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SymbolKind {
    Function,
    Method,
    Class,
    Variable,
    Type,
    Interface,
    Enum,
    Property,
}

impl SymbolKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Function => "function",
            Self::Method => "method",
            Self::Class => "class",
            Self::Variable => "variable",
            Self::Type => "type",
            Self::Interface => "interface",
            Self::Enum => "enum",
            Self::Property => "property",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "function" => Some(Self::Function),
            "method" => Some(Self::Method),
            "class" => Some(Self::Class),
            "variable" => Some(Self::Variable),
            "type" => Some(Self::Type),
            "interface" => Some(Self::Interface),
            "enum" => Some(Self::Enum),
            "property" => Some(Self::Property),
            _ => None,
        }
    }

    /// Callables carry a `params:N|async:B` signature; other kinds none.
    pub fn is_callable(&self) -> bool {
        matches!(self, Self::Function | Self::Method)
    }
}

/// Sub-kind for class members
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MethodKind {
    Constructor,
    Getter,
    Setter,
    Method,
}

/// 1-based line, 0-based column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub line: u32,
    pub column: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start: Position,
    pub end: Position,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParamInfo {
    pub name: String,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none", default)]
    pub type_ann: Option<String>,
    #[serde(default)]
    pub is_optional: bool,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub default_value: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub decorators: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HeritageKind {
    Extends,
    Implements,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeritageRef {
    pub kind: HeritageKind,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocTag {
    pub tag: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocBlock {
    pub description: String,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub tags: Vec<DocTag>,
}

/// A symbol definition extracted from one top-level statement (or a member
/// of one; members are nested here and flattened by the indexer).
#[derive(Debug, Clone)]
pub struct SymbolInfo {
    pub name: String,
    pub kind: SymbolKind,
    pub is_exported: bool,
    pub is_async: bool,
    pub span: Span,
    pub params: Option<Vec<ParamInfo>>,
    pub return_type: Option<String>,
    pub modifiers: Vec<String>,
    pub type_params: Option<Vec<String>>,
    pub decorators: Vec<String>,
    pub heritage: Vec<HeritageRef>,
    pub members: Vec<SymbolInfo>,
    pub method_kind: Option<MethodKind>,
    pub doc: Option<DocBlock>,
}

impl SymbolInfo {
    pub fn new(name: String, kind: SymbolKind, span: Span) -> Self {
        Self {
            name,
            kind,
            is_exported: false,
            is_async: false,
            span,
            params: None,
            return_type: None,
            modifiers: Vec::new(),
            type_params: None,
            decorators: Vec::new(),
            heritage: Vec::new(),
            members: Vec::new(),
            method_kind: None,
            doc: None,
        }
    }
}

/// The persisted detail payload; every field optional, unset fields omitted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SymbolDetail {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub params: Option<Vec<ParamInfo>>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub return_type: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub modifiers: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub heritage: Vec<HeritageRef>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub decorators: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub members: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub type_params: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub method_kind: Option<MethodKind>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub js_doc: Option<DocBlock>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub is_async: Option<bool>,
}

// ---------------------------------------------------------------------------
// Imports & qualified names
// ---------------------------------------------------------------------------

/// Where a local binding came from: the resolved module path and the name it
/// had there (`default` and `*` are sentinel imported names).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportRef {
    pub resolved_path: PathBuf,
    pub imported_name: String,
}

impl ImportRef {
    pub fn is_namespace(&self) -> bool {
        self.imported_name == "*"
    }
}

/// Local identifier -> import reference, in top-level statement order
/// (a later binding shadows an earlier one).
pub type ImportMap = HashMap<String, ImportRef>;

/// A root identifier plus a chain of member accesses, e.g. `ns.foo.bar`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QualifiedName {
    pub root: String,
    pub parts: Vec<String>,
}

impl QualifiedName {
    pub fn full(&self) -> String {
        if self.parts.is_empty() {
            self.root.clone()
        } else {
            let mut s = self.root.clone();
            for part in &self.parts {
                s.push('.');
                s.push_str(part);
            }
            s
        }
    }
}

// ---------------------------------------------------------------------------
// Relations
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelationKind {
    Imports,
    TypeReferences,
    ReExports,
    Calls,
    Extends,
    Implements,
}

impl RelationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Imports => "imports",
            Self::TypeReferences => "type-references",
            Self::ReExports => "re-exports",
            Self::Calls => "calls",
            Self::Extends => "extends",
            Self::Implements => "implements",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "imports" => Some(Self::Imports),
            "type-references" => Some(Self::TypeReferences),
            "re-exports" => Some(Self::ReExports),
            "calls" => Some(Self::Calls),
            "extends" => Some(Self::Extends),
            "implements" => Some(Self::Implements),
            _ => None,
        }
    }

    /// Edge types the dependency graph is built from.
    pub fn is_module_edge(&self) -> bool {
        matches!(self, Self::Imports | Self::TypeReferences | Self::ReExports)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReExportSpecifier {
    pub local: String,
    pub exported: String,
}

/// Relation metadata dialect. Unset keys are omitted from the JSON string;
/// readers parse defensively.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationMeta {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub is_type: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub is_re_export: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub is_dynamic: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub is_new: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub is_local: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub is_namespace_import: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub scope: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub import_kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub specifiers: Option<Vec<ReExportSpecifier>>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub dst_symbol_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub src_symbol_name: Option<String>,
}

impl RelationMeta {
    pub fn is_empty(&self) -> bool {
        self == &RelationMeta::default()
    }
}

/// How a call/heritage destination was computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionClass {
    Import,
    Local,
    Namespace,
    LocalMember,
}

/// A relation as the extractor sees it: destination still an absolute path,
/// project assignment left to the indexer.
#[derive(Debug, Clone)]
pub struct RelationDraft {
    pub kind: RelationKind,
    pub src_symbol: Option<String>,
    pub dst_path: PathBuf,
    pub dst_symbol: Option<String>,
    pub meta: Option<RelationMeta>,
}

/// Everything extracted from one file.
#[derive(Debug, Default)]
pub struct FileExtraction {
    pub symbols: Vec<SymbolInfo>,
    pub relations: Vec<RelationDraft>,
    pub import_map: ImportMap,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_qualified_name_full() {
        let plain = QualifiedName {
            root: "foo".into(),
            parts: vec![],
        };
        assert_eq!(plain.full(), "foo");

        let chained = QualifiedName {
            root: "ns".into(),
            parts: vec!["foo".into(), "bar".into()],
        };
        assert_eq!(chained.full(), "ns.foo.bar");
    }

    #[test]
    fn test_relation_kind_roundtrip() {
        for kind in [
            RelationKind::Imports,
            RelationKind::TypeReferences,
            RelationKind::ReExports,
            RelationKind::Calls,
            RelationKind::Extends,
            RelationKind::Implements,
        ] {
            assert_eq!(RelationKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(RelationKind::parse("unknown"), None);
        assert!(RelationKind::ReExports.is_module_edge());
        assert!(!RelationKind::Calls.is_module_edge());
    }

    #[test]
    fn test_relation_meta_omits_unset_keys() {
        let meta = RelationMeta {
            is_new: Some(true),
            ..Default::default()
        };
        let json = serde_json::to_string(&meta).unwrap();
        assert_eq!(json, r#"{"isNew":true}"#);
    }

    #[test]
    fn test_specifiers_serialization() {
        let meta = RelationMeta {
            is_re_export: Some(true),
            specifiers: Some(vec![ReExportSpecifier {
                local: "x".into(),
                exported: "y".into(),
            }]),
            ..Default::default()
        };
        let json = serde_json::to_string(&meta).unwrap();
        assert!(json.contains(r#""specifiers":[{"local":"x","exported":"y"}]"#));
    }

    #[test]
    fn test_symbol_detail_omits_empty() {
        let detail = SymbolDetail::default();
        assert_eq!(serde_json::to_string(&detail).unwrap(), "{}");

        let detail = SymbolDetail {
            return_type: Some("void".into()),
            ..Default::default()
        };
        assert_eq!(
            serde_json::to_string(&detail).unwrap(),
            r#"{"returnType":"void"}"#
        );
    }
}
