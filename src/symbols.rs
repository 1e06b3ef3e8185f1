//! Tree-sitter symbol extraction.
//!
//! Converts a parsed source file into a flat list of [`SymbolRecord`]s.
//! Each language carries a query whose captures follow one convention:
//! `@name` is the symbol's identifier, `@params` (optional) its parameter
//! list, and exactly one other capture names the symbol kind (`@function`,
//! `@method`, `@struct`, …) while spanning the whole declaration. The
//! extractor takes the first non-name/params capture as the kind, so
//! keeping the one-kind-capture convention is a property of the query
//! text, not of this module.
//!
//! The signature `kind:name(normalizedParams)` is the stable identity key
//! across edits: line numbers may shift and parameter lists may re-wrap
//! without changing it, but adding, removing, or renaming a parameter
//! does.

use std::path::Path;

use streaming_iterator::StreamingIterator;
use tree_sitter::{Language, Parser, Query, QueryCursor};

use crate::error::{IndexError, Result};
use crate::models::SymbolRecord;

/// Languages the structural indexer understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceLanguage {
    Rust,
    TypeScript,
    Tsx,
    JavaScript,
    Python,
    Go,
}

impl SourceLanguage {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "rs" => Some(SourceLanguage::Rust),
            "ts" => Some(SourceLanguage::TypeScript),
            "tsx" => Some(SourceLanguage::Tsx),
            "js" | "mjs" | "cjs" | "jsx" => Some(SourceLanguage::JavaScript),
            "py" => Some(SourceLanguage::Python),
            "go" => Some(SourceLanguage::Go),
            _ => None,
        }
    }

    fn language(&self) -> Language {
        match self {
            SourceLanguage::Rust => tree_sitter_rust::LANGUAGE.into(),
            SourceLanguage::TypeScript => tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
            SourceLanguage::Tsx => tree_sitter_typescript::LANGUAGE_TSX.into(),
            SourceLanguage::JavaScript => tree_sitter_javascript::LANGUAGE.into(),
            SourceLanguage::Python => tree_sitter_python::LANGUAGE.into(),
            SourceLanguage::Go => tree_sitter_go::LANGUAGE.into(),
        }
    }

    fn symbol_query(&self) -> &'static str {
        match self {
            SourceLanguage::Rust => RUST_QUERY,
            SourceLanguage::TypeScript | SourceLanguage::Tsx | SourceLanguage::JavaScript => {
                TS_QUERY
            }
            SourceLanguage::Python => PY_QUERY,
            SourceLanguage::Go => GO_QUERY,
        }
    }
}

const TS_QUERY: &str = r#"
(method_definition
    name: (property_identifier) @name
    parameters: (formal_parameters) @params
) @method
(function_declaration
    name: (identifier) @name
    parameters: (formal_parameters) @params
) @function
"#;

const PY_QUERY: &str = r#"
(function_definition
    name: (identifier) @name
    parameters: (parameters) @params
) @function
"#;

const RUST_QUERY: &str = r#"
(function_item
    name: (identifier) @name
    parameters: (parameters) @params
) @function
(struct_item name: (type_identifier) @name) @struct
(enum_item name: (type_identifier) @name) @enum
(trait_item name: (type_identifier) @name) @trait
"#;

const GO_QUERY: &str = r#"
(function_declaration
    name: (identifier) @name
    parameters: (parameter_list) @params
) @function
(method_declaration
    name: (field_identifier) @name
    parameters: (parameter_list) @params
) @method
"#;

/// Look up the language for a file path by extension.
pub fn language_for(path: &Path) -> Option<SourceLanguage> {
    path.extension()
        .and_then(|e| e.to_str())
        .and_then(SourceLanguage::from_extension)
}

/// True when the path's extension is a recognized source type.
pub fn is_source_file(path: &Path) -> bool {
    language_for(path).is_some()
}

/// Extract symbol records from `source`.
///
/// A match that lacks a resolvable name or kind capture is skipped. A
/// file the parser cannot produce a tree for yields
/// [`IndexError::ParseFailure`] so the caller can preserve the file's
/// existing structural rows instead of ghost-deleting them.
pub fn extract_symbols(path: &Path, source: &str) -> Result<Vec<SymbolRecord>> {
    let lang = language_for(path).ok_or_else(|| IndexError::UnsupportedFileType(path.into()))?;
    let ts_lang = lang.language();

    let mut parser = Parser::new();
    parser
        .set_language(&ts_lang)
        .map_err(|e| IndexError::ParseFailure {
            path: path.into(),
            reason: e.to_string(),
        })?;

    let tree = parser
        .parse(source, None)
        .ok_or_else(|| IndexError::ParseFailure {
            path: path.into(),
            reason: "parser produced no tree".to_string(),
        })?;

    let query = Query::new(&ts_lang, lang.symbol_query()).map_err(|e| IndexError::ParseFailure {
        path: path.into(),
        reason: format!("query compile failed: {e}"),
    })?;

    let bytes = source.as_bytes();
    let mut cursor = QueryCursor::new();
    let mut matches = cursor.matches(&query, tree.root_node(), bytes);

    let mut symbols = Vec::new();

    while let Some(m) = matches.next() {
        let mut name_text: Option<&str> = None;
        let mut params_text: Option<&str> = None;
        let mut kind: Option<(&str, tree_sitter::Node)> = None;

        for capture in m.captures {
            let capture_name = query.capture_names()[capture.index as usize];
            match capture_name {
                "name" => name_text = capture.node.utf8_text(bytes).ok(),
                "params" => params_text = capture.node.utf8_text(bytes).ok(),
                // First non-name/params capture wins as the kind.
                other => {
                    if kind.is_none() {
                        kind = Some((other, capture.node));
                    }
                }
            }
        }

        let (Some(name), Some((kind_name, kind_node))) = (name_text, kind) else {
            continue;
        };

        let params = normalize_params(params_text.unwrap_or(""));
        let signature = format!("{}:{}({})", kind_name, name, params);

        symbols.push(SymbolRecord {
            kind: kind_name.to_string(),
            name: name.to_string(),
            start_line: kind_node.start_position().row as i64 + 1,
            end_line: kind_node.end_position().row as i64 + 1,
            signature,
        });
    }

    Ok(symbols)
}

/// Strip parentheses and all whitespace from a parameter list, making
/// signatures tolerant to line-wrapping and whitespace-only reformats.
fn normalize_params(params: &str) -> String {
    params
        .chars()
        .filter(|c| *c != '(' && *c != ')' && !c.is_whitespace())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_normalize_params_strips_parens_and_whitespace() {
        assert_eq!(normalize_params("(id, name)"), "id,name");
        assert_eq!(normalize_params("(\n    a: i32,\n    b: i32,\n)"), "a:i32,b:i32,");
        assert_eq!(normalize_params(""), "");
    }

    #[test]
    fn test_language_for_extension() {
        assert_eq!(language_for(Path::new("a.rs")), Some(SourceLanguage::Rust));
        assert_eq!(language_for(Path::new("a.ts")), Some(SourceLanguage::TypeScript));
        assert_eq!(language_for(Path::new("a.jsx")), Some(SourceLanguage::JavaScript));
        assert_eq!(language_for(Path::new("a.py")), Some(SourceLanguage::Python));
        assert_eq!(language_for(Path::new("a.go")), Some(SourceLanguage::Go));
        assert_eq!(language_for(Path::new("a.png")), None);
        assert_eq!(language_for(Path::new("Makefile")), None);
    }

    #[test]
    fn test_extract_typescript_functions_and_methods() {
        let source = r#"
function deleteUser(id) {
    return db.remove(id);
}

class Store {
    save(record, flush) {
        return this.db.put(record, flush);
    }
}
"#;
        let symbols = extract_symbols(&PathBuf::from("app.ts"), source).unwrap();
        assert_eq!(symbols.len(), 2);

        let del = symbols.iter().find(|s| s.name == "deleteUser").unwrap();
        assert_eq!(del.kind, "function");
        assert_eq!(del.signature, "function:deleteUser(id)");
        assert_eq!(del.start_line, 2);
        assert_eq!(del.end_line, 4);

        let save = symbols.iter().find(|s| s.name == "save").unwrap();
        assert_eq!(save.kind, "method");
        assert_eq!(save.signature, "method:save(record,flush)");
    }

    #[test]
    fn test_extract_python_functions() {
        let source = "def calculate(x, y):\n    return x + y\n";
        let symbols = extract_symbols(&PathBuf::from("calc.py"), source).unwrap();
        assert_eq!(symbols.len(), 1);
        assert_eq!(symbols[0].signature, "function:calculate(x,y)");
        assert_eq!(symbols[0].start_line, 1);
        assert_eq!(symbols[0].end_line, 2);
    }

    #[test]
    fn test_extract_rust_items() {
        let source = r#"
pub struct Player {
    name: String,
}

fn score(player: &Player, bonus: u32) -> u32 {
    bonus
}
"#;
        let symbols = extract_symbols(&PathBuf::from("game.rs"), source).unwrap();

        let player = symbols.iter().find(|s| s.name == "Player").unwrap();
        assert_eq!(player.kind, "struct");
        assert_eq!(player.signature, "struct:Player()");

        let score = symbols.iter().find(|s| s.name == "score").unwrap();
        assert_eq!(score.signature, "function:score(player:&Player,bonus:u32)");
    }

    #[test]
    fn test_signature_stable_across_rewrapping() {
        let one_line = "def f(a, b):\n    pass\n";
        let wrapped = "def f(\n    a,\n    b\n):\n    pass\n";
        let a = extract_symbols(&PathBuf::from("m.py"), one_line).unwrap();
        let b = extract_symbols(&PathBuf::from("m.py"), wrapped).unwrap();
        assert_eq!(a[0].signature, b[0].signature);
        // Line ranges differ even though the identity key does not.
        assert_ne!(a[0].end_line, b[0].end_line);
    }

    #[test]
    fn test_unsupported_extension_is_classified() {
        let err = extract_symbols(&PathBuf::from("notes.txt"), "hello").unwrap_err();
        assert!(matches!(err, IndexError::UnsupportedFileType(_)));
    }
}
