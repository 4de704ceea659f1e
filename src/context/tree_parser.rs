use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use tree_sitter::{Node, Parser, Query, QueryCursor};
// For tree-sitter 0.24, we need StreamingIterator
use streaming_iterator::StreamingIterator;

use crate::cache::Payload;

/// Languages with a structural parser
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Rust,
    Python,
    JavaScript,
    TypeScript,
    Tsx,
    Go,
}

impl Language {
    pub fn from_path(path: &Path) -> Option<Self> {
        let extension = path.extension()?.to_str()?;
        match extension {
            "rs" => Some(Language::Rust),
            "py" => Some(Language::Python),
            "js" | "mjs" | "cjs" | "jsx" => Some(Language::JavaScript),
            "ts" | "mts" => Some(Language::TypeScript),
            "tsx" => Some(Language::Tsx),
            "go" => Some(Language::Go),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Language::Rust => "rust",
            Language::Python => "python",
            Language::JavaScript => "javascript",
            Language::TypeScript => "typescript",
            Language::Tsx => "tsx",
            Language::Go => "go",
        }
    }

    fn grammar(self) -> tree_sitter::Language {
        match self {
            Language::Rust => tree_sitter_rust::LANGUAGE.into(),
            Language::Python => tree_sitter_python::LANGUAGE.into(),
            Language::JavaScript => tree_sitter_javascript::LANGUAGE.into(),
            Language::TypeScript => tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
            Language::Tsx => tree_sitter_typescript::LANGUAGE_TSX.into(),
            Language::Go => tree_sitter_go::LANGUAGE.into(),
        }
    }

    fn symbol_query(self) -> &'static str {
        match self {
            Language::Rust => {
                r#"
            (function_item name: (identifier) @function.name)
            (impl_item
              body: (declaration_list
                (function_item name: (identifier) @method.name)))
            (trait_item
              body: (declaration_list
                (function_item name: (identifier) @method.name)))
            (struct_item name: (type_identifier) @struct.name)
            (enum_item name: (type_identifier) @enum.name)
            (trait_item name: (type_identifier) @trait.name)
            (use_declaration argument: (_) @import.path)
            "#
            }
            Language::Python => {
                r#"
            (function_definition name: (identifier) @function.name)
            (class_definition name: (identifier) @class.name)
            (class_definition
              body: (block
                (function_definition name: (identifier) @method.name)))
            (class_definition
              body: (block
                (decorated_definition
                  definition: (function_definition name: (identifier) @method.name))))
            (import_statement name: (dotted_name) @import.name)
            (import_from_statement module_name: (dotted_name) @import.module)
            "#
            }
            Language::JavaScript => {
                r#"
            (function_declaration name: (_) @function.name)
            (variable_declarator
              name: (identifier) @function.name
              value: (arrow_function))
            (class_declaration name: (_) @class.name)
            (method_definition name: (_) @method.name)
            (import_statement source: (string) @import.source)
            "#
            }
            Language::TypeScript | Language::Tsx => {
                r#"
            (function_declaration name: (_) @function.name)
            (variable_declarator
              name: (identifier) @function.name
              value: (arrow_function))
            (class_declaration name: (_) @class.name)
            (method_definition name: (_) @method.name)
            (interface_declaration name: (_) @interface.name)
            (type_alias_declaration name: (_) @type.name)
            (import_statement source: (string) @import.source)
            "#
            }
            Language::Go => {
                r#"
            (function_declaration name: (identifier) @function.name)
            (method_declaration name: (_) @method.name)
            (type_spec name: (_) @type.name)
            (import_spec path: (_) @import.path)
            "#
            }
        }
    }

    /// Node kinds that add a branch to the cyclomatic complexity
    fn is_decision_point(self, node: &Node) -> bool {
        let kind = node.kind();
        let branch = match self {
            Language::Rust => matches!(
                kind,
                "if_expression" | "while_expression" | "for_expression" | "match_arm"
            ),
            Language::Python => matches!(
                kind,
                "if_statement"
                    | "elif_clause"
                    | "while_statement"
                    | "for_statement"
                    | "except_clause"
                    | "conditional_expression"
                    | "boolean_operator"
            ),
            Language::JavaScript | Language::TypeScript | Language::Tsx => matches!(
                kind,
                "if_statement"
                    | "while_statement"
                    | "do_statement"
                    | "for_statement"
                    | "for_in_statement"
                    | "catch_clause"
                    | "ternary_expression"
                    | "switch_case"
            ),
            Language::Go => matches!(
                kind,
                "if_statement"
                    | "for_statement"
                    | "expression_case"
                    | "type_case"
                    | "communication_case"
            ),
        };
        branch || (kind == "binary_expression" && is_short_circuit(node))
    }

    fn is_function(self, kind: &str) -> bool {
        match self {
            Language::Rust => kind == "function_item",
            Language::Python => kind == "function_definition",
            Language::JavaScript | Language::TypeScript | Language::Tsx => matches!(
                kind,
                "function_declaration" | "generator_function_declaration" | "method_definition"
            ),
            Language::Go => matches!(kind, "function_declaration" | "method_declaration"),
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn is_short_circuit(node: &Node) -> bool {
    node.child_by_field_name("operator")
        .is_some_and(|op| matches!(op.kind(), "&&" | "||" | "??"))
}

/// Symbol types we extract from code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SymbolKind {
    Function,
    Class,
    Method,
    Interface,
    Type,
    Import,
}

impl SymbolKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SymbolKind::Function => "function",
            SymbolKind::Class => "class",
            SymbolKind::Method => "method",
            SymbolKind::Interface => "interface",
            SymbolKind::Type => "type",
            SymbolKind::Import => "import",
        }
    }
}

/// A code symbol extracted from the AST
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Symbol {
    pub name: String,
    pub kind: SymbolKind,
    pub line: usize,
    pub signature: Option<String>,
}

/// Cyclomatic complexity of one function: 1 plus one per branch point
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FunctionComplexity {
    pub name: String,
    pub line: usize,
    pub complexity: usize,
}

/// Parsed structure of one file, the payload of the structure tier
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileStructure {
    pub path: PathBuf,
    pub language: Language,
    pub line_count: usize,
    /// The parser recovered from syntax errors
    pub has_errors: bool,
    pub symbols: Vec<Symbol>,
    pub functions: Vec<FunctionComplexity>,
}

impl FileStructure {
    pub fn count(&self, kind: SymbolKind) -> usize {
        self.symbols.iter().filter(|s| s.kind == kind).count()
    }

    pub fn imports(&self) -> impl Iterator<Item = &str> {
        self.symbols
            .iter()
            .filter(|s| s.kind == SymbolKind::Import)
            .map(|s| s.name.as_str())
    }

    pub fn average_complexity(&self) -> f64 {
        if self.functions.is_empty() {
            return 0.0;
        }
        let total: usize = self.functions.iter().map(|f| f.complexity).sum();
        total as f64 / self.functions.len() as f64
    }

    pub fn max_complexity(&self) -> Option<&FunctionComplexity> {
        self.functions.iter().max_by_key(|f| f.complexity)
    }
}

impl Payload for FileStructure {
    fn size_estimate(&self) -> usize {
        let symbols: usize = self
            .symbols
            .iter()
            .map(|s| {
                std::mem::size_of::<Symbol>()
                    + s.name.len()
                    + s.signature.as_ref().map_or(0, String::len)
            })
            .sum();
        let functions: usize = self
            .functions
            .iter()
            .map(|f| std::mem::size_of::<FunctionComplexity>() + f.name.len())
            .sum();
        std::mem::size_of::<Self>() + self.path.as_os_str().len() + symbols + functions
    }
}

/// Tree-sitter based code parser
pub struct TreeParser {
    parsers: HashMap<Language, Parser>,
    queries: HashMap<Language, Query>,
}

impl TreeParser {
    pub fn new() -> Result<Self> {
        let mut parsers = HashMap::new();
        let mut queries = HashMap::new();

        for language in [
            Language::Rust,
            Language::Python,
            Language::JavaScript,
            Language::TypeScript,
            Language::Tsx,
            Language::Go,
        ] {
            let grammar = language.grammar();
            let mut parser = Parser::new();
            parser
                .set_language(&grammar)
                .with_context(|| format!("Failed to load {} grammar", language))?;
            let query = Query::new(&grammar, language.symbol_query())
                .with_context(|| format!("Invalid symbol query for {}", language))?;
            parsers.insert(language, parser);
            queries.insert(language, query);
        }

        Ok(Self { parsers, queries })
    }

    /// Detect language from file extension
    pub fn detect_language(path: &Path) -> Result<Language> {
        Language::from_path(path).with_context(|| {
            format!(
                "Unsupported file type for structural analysis: {}",
                path.display()
            )
        })
    }

    /// Parse a file into its symbols and per-function complexity
    pub fn parse_file(&mut self, path: &Path, content: &str) -> Result<FileStructure> {
        let language = Self::detect_language(path)?;

        let parser = self
            .parsers
            .get_mut(&language)
            .context(format!("No parser for language: {}", language))?;

        let tree = parser
            .parse(content, None)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        let root = tree.root_node();

        let query = self
            .queries
            .get(&language)
            .context(format!("No query for language: {}", language))?;

        let symbols = extract_symbols(content, &root, query)?;
        let mut functions = Vec::new();
        collect_functions(language, root, content.as_bytes(), &mut functions)?;

        Ok(FileStructure {
            path: path.to_path_buf(),
            language,
            line_count: content.lines().count(),
            has_errors: root.has_error(),
            symbols,
            functions,
        })
    }
}

/// Extract symbols from parsed AST
fn extract_symbols(source: &str, root: &Node, query: &Query) -> Result<Vec<Symbol>> {
    let mut symbols: Vec<Symbol> = Vec::new();
    // A method also matches the plain function pattern; keep the more specific kind
    let mut seen: HashMap<(usize, usize), usize> = HashMap::new();
    let mut cursor = QueryCursor::new();

    // Use StreamingIterator for tree-sitter 0.24
    let mut matches = cursor.matches(query, *root, source.as_bytes());
    while let Some(m) = matches.next() {
        for capture in m.captures {
            let node = capture.node;
            let capture_name = query.capture_names()[capture.index as usize];

            let kind = match capture_name {
                name if name.starts_with("function") => SymbolKind::Function,
                name if name.starts_with("class") => SymbolKind::Class,
                name if name.starts_with("struct") => SymbolKind::Class,
                name if name.starts_with("method") => SymbolKind::Method,
                name if name.starts_with("enum") => SymbolKind::Type,
                name if name.starts_with("type") => SymbolKind::Type,
                name if name.starts_with("trait") => SymbolKind::Interface,
                name if name.starts_with("interface") => SymbolKind::Interface,
                name if name.starts_with("import") => SymbolKind::Import,
                _ => continue,
            };

            let text = node.utf8_text(source.as_bytes())?;
            let name = if kind == SymbolKind::Import {
                text.trim_matches(|c| c == '"' || c == '\'' || c == '`')
                    .to_string()
            } else {
                text.to_string()
            };

            let slot = (node.start_byte(), node.end_byte());
            if let Some(&index) = seen.get(&slot) {
                if kind == SymbolKind::Method {
                    symbols[index].kind = SymbolKind::Method;
                }
                continue;
            }

            seen.insert(slot, symbols.len());
            symbols.push(Symbol {
                name,
                kind,
                line: node.start_position().row + 1,
                signature: extract_signature(&node, source),
            });
        }
    }

    symbols.sort_by_key(|s| s.line);
    Ok(symbols)
}

/// First line of the enclosing function definition, if the name belongs to one
fn extract_signature(node: &Node, source: &str) -> Option<String> {
    let parent = node.parent()?;
    if !matches!(
        parent.kind(),
        "function_item"
            | "function_declaration"
            | "function_definition"
            | "method_definition"
            | "method_declaration"
    ) {
        return None;
    }

    let start_byte = parent.start_byte();
    let end_byte = source[start_byte..]
        .find('\n')
        .map(|i| start_byte + i)
        .unwrap_or(parent.end_byte());

    Some(source[start_byte..end_byte].trim().to_string())
}

/// Recursively record every function with its complexity
fn collect_functions(
    language: Language,
    node: Node,
    source: &[u8],
    out: &mut Vec<FunctionComplexity>,
) -> Result<()> {
    if let Some(name) = function_name(language, &node, source)? {
        out.push(FunctionComplexity {
            name,
            line: node.start_position().row + 1,
            complexity: 1 + count_decisions(language, node),
        });
    }

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        collect_functions(language, child, source, out)?;
    }
    Ok(())
}

fn function_name(language: Language, node: &Node, source: &[u8]) -> Result<Option<String>> {
    let name_node = if language.is_function(node.kind()) {
        node.child_by_field_name("name")
    } else if node.kind() == "arrow_function"
        && matches!(
            language,
            Language::JavaScript | Language::TypeScript | Language::Tsx
        )
    {
        node.parent()
            .filter(|parent| parent.kind() == "variable_declarator")
            .and_then(|parent| parent.child_by_field_name("name"))
    } else {
        None
    };

    match name_node {
        Some(name) => Ok(Some(name.utf8_text(source)?.to_string())),
        None => Ok(None),
    }
}

fn count_decisions(language: Language, node: Node) -> usize {
    let mut cursor = node.walk();
    node.children(&mut cursor)
        .map(|child| usize::from(language.is_decision_point(&child)) + count_decisions(language, child))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn names(structure: &FileStructure, kind: SymbolKind) -> Vec<&str> {
        structure
            .symbols
            .iter()
            .filter(|s| s.kind == kind)
            .map(|s| s.name.as_str())
            .collect()
    }

    #[test]
    fn test_python_structure_and_complexity() {
        let source = r#"import os
from collections import defaultdict

class Greeter:
    def greet(self, name):
        if name and name.strip():
            return "hi " + name
        elif name is None:
            return "nobody"
        return ""

def loop(items):
    for item in items:
        try:
            print(item)
        except ValueError:
            pass
"#;
        let mut parser = TreeParser::new().unwrap();
        let structure = parser.parse_file(Path::new("greeter.py"), source).unwrap();

        assert_eq!(structure.language, Language::Python);
        assert!(!structure.has_errors);
        assert_eq!(names(&structure, SymbolKind::Class), vec!["Greeter"]);
        assert_eq!(names(&structure, SymbolKind::Method), vec!["greet"]);
        assert_eq!(names(&structure, SymbolKind::Function), vec!["loop"]);
        assert_eq!(
            structure.imports().collect::<Vec<_>>(),
            vec!["os", "collections"]
        );

        let complexities: Vec<(&str, usize)> = structure
            .functions
            .iter()
            .map(|f| (f.name.as_str(), f.complexity))
            .collect();
        // greet: if + `and` + elif; loop: for + except
        assert_eq!(complexities, vec![("greet", 4), ("loop", 3)]);
        assert_eq!(structure.max_complexity().unwrap().name, "greet");
        assert_eq!(structure.average_complexity(), 3.5);
    }

    #[test]
    fn test_rust_symbols_and_methods() {
        let source = r#"use std::collections::HashMap;

pub struct Counter {
    counts: HashMap<String, usize>,
}

impl Counter {
    pub fn bump(&mut self, key: &str) -> usize {
        let count = self.counts.entry(key.to_string()).or_insert(0);
        *count += 1;
        if *count > 10 || key.is_empty() {
            return 0;
        }
        *count
    }
}

fn classify(n: i32) -> &'static str {
    match n {
        0 => "zero",
        x if x < 0 => "negative",
        _ => "positive",
    }
}
"#;
        let mut parser = TreeParser::new().unwrap();
        let structure = parser.parse_file(Path::new("src/counter.rs"), source).unwrap();

        assert_eq!(names(&structure, SymbolKind::Class), vec!["Counter"]);
        assert_eq!(names(&structure, SymbolKind::Method), vec!["bump"]);
        assert_eq!(names(&structure, SymbolKind::Function), vec!["classify"]);
        assert_eq!(
            structure.imports().collect::<Vec<_>>(),
            vec!["std::collections::HashMap"]
        );

        let bump = &structure.functions[0];
        assert_eq!((bump.name.as_str(), bump.complexity), ("bump", 3));
        let classify = &structure.functions[1];
        assert_eq!((classify.name.as_str(), classify.complexity), ("classify", 4));
        assert_eq!(
            structure.symbols.iter().find(|s| s.name == "classify").unwrap().signature.as_deref(),
            Some("fn classify(n: i32) -> &'static str {")
        );
    }

    #[test]
    fn test_javascript_arrow_functions_count() {
        let source = r#"import fs from "fs";

const check = (x) => x > 1 ? "big" : "small";

function main(args) {
    while (args.length && args[0] !== "--") {
        args.shift();
    }
}
"#;
        let mut parser = TreeParser::new().unwrap();
        let structure = parser.parse_file(Path::new("app.js"), source).unwrap();

        assert_eq!(names(&structure, SymbolKind::Function), vec!["check", "main"]);
        assert_eq!(structure.imports().collect::<Vec<_>>(), vec!["fs"]);
        let complexities: Vec<usize> = structure.functions.iter().map(|f| f.complexity).collect();
        assert_eq!(complexities, vec![2, 3]);
    }

    #[test]
    fn test_typescript_and_go_parse() {
        let mut parser = TreeParser::new().unwrap();

        let ts = parser
            .parse_file(
                Path::new("types.ts"),
                "interface Point { x: number }\ntype Id = string;\nclass Shape {}\n",
            )
            .unwrap();
        assert_eq!(names(&ts, SymbolKind::Interface), vec!["Point"]);
        assert_eq!(names(&ts, SymbolKind::Type), vec!["Id"]);
        assert_eq!(names(&ts, SymbolKind::Class), vec!["Shape"]);

        let go = parser
            .parse_file(
                Path::new("main.go"),
                "package main\n\nimport \"fmt\"\n\nfunc main() {\n\tif true {\n\t\tfmt.Println(1)\n\t}\n}\n",
            )
            .unwrap();
        assert_eq!(go.imports().collect::<Vec<_>>(), vec!["fmt"]);
        assert_eq!(go.functions[0].complexity, 2);
    }

    #[test]
    fn test_decorated_and_trait_methods() {
        let mut parser = TreeParser::new().unwrap();

        let py = parser
            .parse_file(
                Path::new("shapes.py"),
                "class A:\n    @property\n    def size(self): ...\n    def plain(self): pass\n\n@cache\ndef helper():\n    pass\n",
            )
            .unwrap();
        assert_eq!(names(&py, SymbolKind::Class), vec!["A"]);
        assert_eq!(names(&py, SymbolKind::Method), vec!["size", "plain"]);
        assert_eq!(names(&py, SymbolKind::Function), vec!["helper"]);

        let rs = parser
            .parse_file(
                Path::new("shape.rs"),
                "trait Shape {\n    fn area(&self) -> f64;\n    fn describe(&self) -> String {\n        String::new()\n    }\n}\n",
            )
            .unwrap();
        assert_eq!(names(&rs, SymbolKind::Interface), vec!["Shape"]);
        assert_eq!(names(&rs, SymbolKind::Method), vec!["describe"]);
        assert!(names(&rs, SymbolKind::Function).is_empty());
    }

    #[test]
    fn test_tsx_components() {
        let mut parser = TreeParser::new().unwrap();
        let source = "export function Badge({ label }: { label: string }) {\n  return label ? <span>{label}</span> : null;\n}\n";
        let structure = parser.parse_file(Path::new("Badge.tsx"), source).unwrap();

        assert_eq!(structure.language, Language::Tsx);
        assert!(!structure.has_errors);
        assert_eq!(names(&structure, SymbolKind::Function), vec!["Badge"]);
        assert_eq!(structure.functions[0].complexity, 2);
    }

    #[test]
    fn test_unsupported_extension() {
        let mut parser = TreeParser::new().unwrap();
        assert!(parser.parse_file(Path::new("notes.txt"), "hello").is_err());
        assert_eq!(Language::from_path(Path::new("lib.rs")), Some(Language::Rust));
        assert_eq!(Language::from_path(Path::new("Makefile")), None);
    }
}
