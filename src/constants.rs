/// Constants module to avoid magic numbers in the codebase

// Cache limits
pub const DEFAULT_TIER_MAX_ENTRIES: usize = 100;
pub const DEFAULT_PROJECT_SUMMARY_MAX_ENTRIES: usize = 16;
pub const DEFAULT_PROJECT_SUMMARY_TTL_SECS: u64 = 300; // 5 minutes

// Analysis
pub const DEFAULT_MAX_FILE_SIZE: usize = 1024 * 1024; // 1MB
pub const LONG_LINE_LIMIT: usize = 120;
pub const COMPLEXITY_REFACTOR_THRESHOLD: usize = 10;
pub const MAX_PROMPT_CONTENT_CHARS: usize = 2000;
pub const MAX_ISSUES_SHOWN_PER_KIND: usize = 5;

// Files that count as code for issue scanning
pub const CODE_EXTENSIONS: &[&str] = &[
    "rs", "py", "js", "mjs", "jsx", "ts", "tsx", "go", "java", "c", "h", "cpp", "hpp", "cc",
    "html", "css", "json", "md", "yml", "yaml", "toml",
];

// Directories never walked
pub const SKIP_DIRS: &[&str] = &[
    "node_modules",
    "target",
    "dist",
    "build",
    ".git",
    ".svn",
    ".hg",
    "venv",
    ".venv",
    "__pycache__",
    ".pytest_cache",
    ".mypy_cache",
    ".tox",
    "vendor",
    ".idea",
    ".vscode",
    "coverage",
];
