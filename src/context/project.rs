use anyhow::{Context, Result};
use ignore::{DirEntry, WalkBuilder};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use crate::cache::Payload;
use crate::constants::{CODE_EXTENSIONS, SKIP_DIRS};

/// One file seen while walking a project
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileInfo {
    /// Path relative to the project root
    pub path: PathBuf,
    pub size: u64,
    pub file_type: &'static str,
}

/// Aggregate layout of a project, the payload of the project-summary tier
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProjectSummary {
    pub root: PathBuf,
    pub files: Vec<FileInfo>,
    pub directories: Vec<PathBuf>,
    pub code_files: Vec<PathBuf>,
    pub total_size: u64,
    /// File count per detected type
    pub languages: BTreeMap<&'static str, usize>,
    pub config_files: Vec<PathBuf>,
    pub documentation: Vec<PathBuf>,
    pub tests: Vec<PathBuf>,
}

impl ProjectSummary {
    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    /// Top-level directories that contain files
    pub fn main_directories(&self) -> Vec<String> {
        let dirs: BTreeSet<String> = self
            .files
            .iter()
            .filter_map(|file| {
                let mut components = file.path.components();
                let first = components.next()?;
                components.next()?;
                Some(first.as_os_str().to_string_lossy().into_owned())
            })
            .collect();
        dirs.into_iter().collect()
    }

    /// Languages sorted by file count, most common first
    pub fn top_languages(&self, limit: usize) -> Vec<(&'static str, usize)> {
        let mut languages: Vec<(&'static str, usize)> =
            self.languages.iter().map(|(&lang, &count)| (lang, count)).collect();
        languages.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));
        languages.truncate(limit);
        languages
    }

    /// Plain-text overview used when no model is involved
    pub fn format(&self) -> String {
        let name = self
            .root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.root.display().to_string());

        let mut out = format!("Project '{}':\n", name);
        out.push_str(&format!(
            "  {} files, {} total, {} code files\n",
            self.file_count(),
            format_size(self.total_size),
            self.code_files.len()
        ));

        let languages = self.top_languages(5);
        if !languages.is_empty() {
            out.push_str("  Languages:\n");
            for (lang, count) in languages {
                out.push_str(&format!("    - {}: {} files\n", lang, count));
            }
        }

        let dirs = self.main_directories();
        if !dirs.is_empty() {
            let shown: Vec<&str> = dirs.iter().take(8).map(String::as_str).collect();
            out.push_str(&format!("  Main directories: {}\n", shown.join(", ")));
        }

        out.push_str(&presence_line("documentation", self.documentation.len()));
        out.push_str(&presence_line("tests", self.tests.len()));
        out.push_str(&presence_line("config files", self.config_files.len()));
        out
    }
}

fn presence_line(label: &str, count: usize) -> String {
    if count > 0 {
        format!("  [OK] {} ({} files)\n", label, count)
    } else {
        format!("  [WARNING] no {} found\n", label)
    }
}

impl Payload for ProjectSummary {
    fn size_estimate(&self) -> usize {
        let paths = self
            .files
            .iter()
            .map(|f| f.path.as_os_str().len() + std::mem::size_of::<FileInfo>())
            .chain(self.directories.iter().map(|d| d.as_os_str().len()))
            .chain(self.code_files.iter().map(|p| p.as_os_str().len()))
            .chain(self.config_files.iter().map(|p| p.as_os_str().len()))
            .chain(self.documentation.iter().map(|p| p.as_os_str().len()))
            .chain(self.tests.iter().map(|p| p.as_os_str().len()));
        std::mem::size_of::<Self>() + paths.sum::<usize>()
    }
}

/// Detect file type from its extension
pub fn detect_file_type(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "rs" => "rust",
        "py" => "python",
        "js" | "mjs" | "cjs" | "jsx" => "javascript",
        "ts" | "mts" | "tsx" => "typescript",
        "go" => "go",
        "java" => "java",
        "c" | "h" => "c",
        "cpp" | "cc" | "cxx" | "hpp" => "cpp",
        "html" => "html",
        "css" => "css",
        "json" => "json",
        "md" => "markdown",
        "yml" | "yaml" => "yaml",
        "toml" => "toml",
        "txt" => "text",
        _ => "unknown",
    }
}

pub fn is_code_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| CODE_EXTENSIONS.contains(&e.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Walk `root` and summarize its layout
pub fn scan_project(root: &Path, extra_skip_dirs: &[String]) -> Result<ProjectSummary> {
    let mut summary = ProjectSummary {
        root: root.to_path_buf(),
        ..ProjectSummary::default()
    };

    let skip: Vec<String> = SKIP_DIRS
        .iter()
        .map(|dir| dir.to_string())
        .chain(extra_skip_dirs.iter().cloned())
        .collect();

    let mut walker = WalkBuilder::new(root);
    walker
        .standard_filters(true) // Respect .gitignore, .ignore, etc.
        .hidden(true) // Dotfiles and dot-directories stay out of the summary
        .require_git(false)
        .filter_entry(move |entry| !should_skip_entry(entry, &skip));

    for result in walker.build() {
        let entry = result.with_context(|| format!("Failed to walk {}", root.display()))?;
        if entry.depth() == 0 {
            continue;
        }

        let Ok(relative) = entry.path().strip_prefix(root) else {
            continue;
        };
        let relative = relative.to_path_buf();

        let Some(file_type) = entry.file_type() else {
            continue;
        };
        if file_type.is_dir() {
            summary.directories.push(relative);
            continue;
        }
        if !file_type.is_file() {
            continue;
        }

        // Files can vanish mid-walk; skip them like unreadable ones
        let Ok(metadata) = entry.metadata() else {
            continue;
        };

        let detected = detect_file_type(&relative);
        let lowered = relative.to_string_lossy().to_lowercase();

        if matches!(detected, "json" | "yaml" | "toml") || lowered.contains("config") {
            summary.config_files.push(relative.clone());
        } else if detected == "markdown" || lowered.contains("readme") {
            summary.documentation.push(relative.clone());
        } else if lowered.contains("test") {
            summary.tests.push(relative.clone());
        }

        if is_code_file(&relative) {
            summary.code_files.push(relative.clone());
        }

        *summary.languages.entry(detected).or_insert(0) += 1;
        summary.total_size += metadata.len();
        summary.files.push(FileInfo {
            path: relative,
            size: metadata.len(),
            file_type: detected,
        });
    }

    summary.files.sort_by(|a, b| a.path.cmp(&b.path));
    summary.directories.sort();
    summary.code_files.sort();
    summary.config_files.sort();
    summary.documentation.sort();
    summary.tests.sort();

    Ok(summary)
}

/// Check if a directory entry should be pruned from the walk
fn should_skip_entry(entry: &DirEntry, skip: &[String]) -> bool {
    let is_dir = entry.file_type().is_some_and(|t| t.is_dir());
    if !is_dir || entry.depth() == 0 {
        return false;
    }
    let name = entry.file_name().to_string_lossy();
    skip.iter().any(|dir| *dir == name)
}

/// Format a byte count for display
pub fn format_size(size: u64) -> String {
    if size < 1024 {
        format!("{}B", size)
    } else if size < 1024 * 1024 {
        format!("{:.1}KB", size as f64 / 1024.0)
    } else {
        format!("{:.1}MB", size as f64 / (1024.0 * 1024.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::TempDir;

    fn project() -> TempDir {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::create_dir_all(root.join("src")).unwrap();
        fs::create_dir_all(root.join("tests")).unwrap();
        fs::create_dir_all(root.join("node_modules/left-pad")).unwrap();
        fs::create_dir_all(root.join(".git")).unwrap();
        fs::write(root.join("src/main.py"), "print('hi')\n").unwrap();
        fs::write(root.join("tests/test_main.py"), "def test(): pass\n").unwrap();
        fs::write(root.join("README.md"), "# demo\n").unwrap();
        fs::write(root.join("pyproject.toml"), "[project]\n").unwrap();
        fs::write(root.join("logo.png"), [0u8, 1, 2]).unwrap();
        fs::write(root.join("node_modules/left-pad/index.js"), "module.exports = 1\n").unwrap();
        fs::write(root.join(".git/HEAD"), "ref: refs/heads/main\n").unwrap();
        temp_dir
    }

    #[test]
    fn test_scan_project_categorizes_files() {
        let temp_dir = project();
        let summary = scan_project(temp_dir.path(), &[]).unwrap();

        let files: Vec<PathBuf> = summary.files.iter().map(|f| f.path.clone()).collect();
        assert_eq!(
            files,
            vec![
                PathBuf::from("README.md"),
                PathBuf::from("logo.png"),
                PathBuf::from("pyproject.toml"),
                PathBuf::from("src/main.py"),
                PathBuf::from("tests/test_main.py"),
            ]
        );
        assert_eq!(
            summary.directories,
            vec![PathBuf::from("src"), PathBuf::from("tests")]
        );
        assert_eq!(summary.code_files.len(), 4);
        assert_eq!(summary.languages.get("python"), Some(&2));
        assert_eq!(summary.config_files, vec![PathBuf::from("pyproject.toml")]);
        assert_eq!(summary.documentation, vec![PathBuf::from("README.md")]);
        assert_eq!(summary.tests, vec![PathBuf::from("tests/test_main.py")]);
        assert_eq!(summary.main_directories(), vec!["src", "tests"]);
        assert_eq!(summary.total_size, 12 + 17 + 7 + 10 + 3);
    }

    #[test]
    fn test_extra_skip_dirs() {
        let temp_dir = project();
        let summary = scan_project(temp_dir.path(), &["tests".to_string()]).unwrap();
        assert!(summary.tests.is_empty());
        assert!(summary.format().contains("[WARNING] no tests found"));
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "512B");
        assert_eq!(format_size(2048), "2.0KB");
        assert_eq!(format_size(3 * 1024 * 1024), "3.0MB");
    }
}
