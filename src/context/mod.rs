// Gateway module for context - follows the Train Station Pattern
// All external access must go through this gateway

// Private submodules - not directly accessible from outside
mod analyzer;
mod issues;
mod project;
mod tree_parser;

// Public re-exports - the ONLY way to access context functionality
pub use analyzer::{AnalyzerConfig, CodeAnalyzer, ComplexityReport, PromptTask};
pub use issues::{format_issues, scan_lines, Issue, IssueKind};
pub use project::{
    detect_file_type, format_size, is_code_file, scan_project, FileInfo, ProjectSummary,
};
pub use tree_parser::{
    FileStructure, FunctionComplexity, Language, Symbol, SymbolKind, TreeParser,
};
