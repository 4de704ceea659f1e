use anyhow::{bail, Context, Result};
use parking_lot::Mutex;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use crate::cache::{CacheCoordinator, FileError, Lookup, Target, Tier};
use crate::constants::{
    COMPLEXITY_REFACTOR_THRESHOLD, DEFAULT_MAX_FILE_SIZE, LONG_LINE_LIMIT,
    MAX_PROMPT_CONTENT_CHARS,
};
use crate::models::Model;

use super::issues::{scan_lines, Issue};
use super::project::{scan_project, ProjectSummary};
use super::tree_parser::{FileStructure, FunctionComplexity, Language, SymbolKind, TreeParser};

/// Limits applied while analyzing files
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    /// Files larger than this are refused
    pub max_file_size: usize,
    pub long_line_limit: usize,
    /// Directory names skipped on top of the built-in list
    pub skip_dirs: Vec<String>,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            long_line_limit: LONG_LINE_LIMIT,
            skip_dirs: Vec::new(),
        }
    }
}

/// Complexity overview of one file, derived from its cached structure
#[derive(Debug, Clone, Serialize)]
pub struct ComplexityReport {
    pub path: PathBuf,
    pub language: Language,
    pub lines: usize,
    pub functions: usize,
    pub classes: usize,
    pub imports: usize,
    pub average_complexity: f64,
    pub most_complex: Option<FunctionComplexity>,
    pub needs_refactor: bool,
    /// The structure came from the cache
    pub cached: bool,
}

impl ComplexityReport {
    fn from_structure(lookup: &Lookup<FileStructure>) -> Self {
        let structure = &lookup.value;
        let most_complex = structure.max_complexity().cloned();
        let needs_refactor = most_complex
            .as_ref()
            .is_some_and(|f| f.complexity > COMPLEXITY_REFACTOR_THRESHOLD);

        Self {
            path: structure.path.clone(),
            language: structure.language,
            lines: structure.line_count,
            functions: structure.functions.len(),
            classes: structure.count(SymbolKind::Class),
            imports: structure.count(SymbolKind::Import),
            average_complexity: structure.average_complexity(),
            most_complex,
            needs_refactor,
            cached: lookup.hit,
        }
    }

    pub fn format(&self) -> String {
        let mut out = format!(
            "Complexity of {} ({}{}):\n",
            self.path.display(),
            self.language,
            if self.cached { ", cached" } else { "" }
        );
        out.push_str(&format!("  Lines: {}\n", self.lines));
        out.push_str(&format!("  Functions: {}\n", self.functions));
        out.push_str(&format!("  Classes: {}\n", self.classes));
        out.push_str(&format!("  Imports: {}\n", self.imports));
        out.push_str(&format!(
            "  Average complexity: {:.1}\n",
            self.average_complexity
        ));
        if let Some(function) = &self.most_complex {
            out.push_str(&format!(
                "  Most complex: {} (line {}, complexity {})\n",
                function.name, function.line, function.complexity
            ));
        }
        if self.needs_refactor {
            out.push_str(&format!(
                "  [WARNING] functions above complexity {} should be refactored\n",
                COMPLEXITY_REFACTOR_THRESHOLD
            ));
        }
        out
    }
}

/// Model-assisted tasks over a single file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptTask {
    Analyze,
    DetectIssues,
    SuggestImprovements,
}

impl PromptTask {
    fn render(self, path: &Path, content: &str) -> String {
        let excerpt: String = content.chars().take(MAX_PROMPT_CONTENT_CHARS).collect();
        let ask = match self {
            PromptTask::Analyze => {
                "Explain what this file does, its main components, and anything notable about its design."
            }
            PromptTask::DetectIssues => {
                "List bugs, security problems, and risky patterns in this file. Give a line reference for each."
            }
            PromptTask::SuggestImprovements => {
                "Suggest concrete improvements to readability and performance for this file."
            }
        };
        format!(
            "{}\n\nFile: {}\n```\n{}\n```",
            ask,
            path.display(),
            excerpt
        )
    }
}

/// Code analysis routed through the shared cache.
///
/// The model-backed tasks (`analyze_file`, `detect_issues`,
/// `suggest_improvements`) need a backend attached with `with_model`. The
/// `localpair` binary ships without one, so its model-result tier stays empty
/// and `cache-stats` reports zero entries there.
pub struct CodeAnalyzer {
    cache: Arc<CacheCoordinator>,
    model: Option<Arc<dyn Model>>,
    parser: Mutex<TreeParser>,
    config: AnalyzerConfig,
}

impl CodeAnalyzer {
    pub fn new(cache: Arc<CacheCoordinator>, config: AnalyzerConfig) -> Result<Self> {
        Ok(Self {
            cache,
            model: None,
            parser: Mutex::new(TreeParser::new()?),
            config,
        })
    }

    pub fn with_model(mut self, model: Arc<dyn Model>) -> Self {
        self.model = Some(model);
        self
    }

    pub fn cache(&self) -> &Arc<CacheCoordinator> {
        &self.cache
    }

    /// Read a text file through the content tier
    pub fn read_file(&self, path: &Path) -> Result<Lookup<String>> {
        let max_size = self.config.max_file_size;
        self.cache
            .get_or_compute(Tier::Content, &Target::path(path), |target| {
                load_text(target_path(target)?, max_size)
            })
    }

    /// Parse a file through the structure tier
    pub fn file_structure(&self, path: &Path) -> Result<Lookup<FileStructure>> {
        TreeParser::detect_language(path)?;
        self.cache
            .get_or_compute(Tier::Structure, &Target::path(path), |target| {
                let path = target_path(target)?;
                let content = self.read_file(path)?.into_value();
                self.parser.lock().parse_file(path, &content)
            })
    }

    pub fn complexity(&self, path: &Path) -> Result<ComplexityReport> {
        let lookup = self.file_structure(path)?;
        Ok(ComplexityReport::from_structure(&lookup))
    }

    /// Line-level issues for one file, kept in the structure tier
    pub fn file_issues(&self, path: &Path) -> Result<Lookup<Vec<Issue>>> {
        let limit = self.config.long_line_limit;
        self.cache
            .get_or_compute(Tier::Structure, &Target::path(path), |target| {
                let path = target_path(target)?;
                let content = self.read_file(path)?.into_value();
                Ok(scan_lines(path, &content, limit))
            })
    }

    /// Summarize a project directory through the project-summary tier
    pub fn project_summary(&self, root: &Path) -> Result<Lookup<ProjectSummary>> {
        if !root.is_dir() {
            bail!("{} is not a directory", root.display());
        }
        let skip_dirs = &self.config.skip_dirs;
        self.cache
            .get_or_compute(Tier::ProjectSummary, &Target::path(root), |target| {
                let root = target_path(target)?;
                info!(root = %root.display(), "scanning project");
                scan_project(root, skip_dirs)
            })
    }

    /// Scan every code file under `root` for line-level issues
    pub fn find_issues(&self, root: &Path) -> Result<Vec<Issue>> {
        let summary = self.project_summary(root)?.into_value();

        let mut issues: Vec<Issue> = summary
            .code_files
            .par_iter()
            .flat_map_iter(|relative| {
                let path = root.join(relative);
                match self.file_issues(&path) {
                    Ok(found) => found
                        .value
                        .iter()
                        .map(|issue| Issue {
                            file: relative.clone(),
                            ..issue.clone()
                        })
                        .collect::<Vec<_>>(),
                    Err(err) => {
                        debug!(file = %path.display(), error = %err, "skipping file");
                        Vec::new()
                    }
                }
            })
            .collect();

        issues.sort_by(|a, b| a.file.cmp(&b.file).then(a.line.cmp(&b.line)));
        Ok(issues)
    }

    pub async fn analyze_file(&self, path: &Path) -> Result<Lookup<String>> {
        self.ask_model(path, PromptTask::Analyze).await
    }

    pub async fn detect_issues(&self, path: &Path) -> Result<Lookup<String>> {
        self.ask_model(path, PromptTask::DetectIssues).await
    }

    pub async fn suggest_improvements(&self, path: &Path) -> Result<Lookup<String>> {
        self.ask_model(path, PromptTask::SuggestImprovements).await
    }

    /// Run a prompt task through the model-result tier
    async fn ask_model(&self, path: &Path, task: PromptTask) -> Result<Lookup<String>> {
        let model = Arc::clone(self.model.as_ref().context("No model configured")?);
        let content = self.read_file(path)?.into_value();
        let prompt = task.render(path, &content);
        let target = Target::prompt(
            content.as_str(),
            format!("model={}\n{}", model.name(), prompt),
        );

        self.cache
            .get_or_compute_async(Tier::ModelResult, &target, |_| async move {
                debug!(model = model.name(), ?task, "querying model");
                model.complete(&prompt).await
            })
            .await
    }
}

fn target_path(target: &Target) -> Result<&Path> {
    target
        .as_path()
        .with_context(|| format!("Expected a file target, got {}", target))
}

fn load_text(path: &Path, max_size: usize) -> Result<String> {
    let size = fs::metadata(path)
        .map_err(|err| FileError::from_io(path, err))?
        .len();
    if size > max_size as u64 {
        bail!(
            "{} is too large to analyze ({} bytes, limit {})",
            path.display(),
            size,
            max_size
        );
    }

    let bytes = fs::read(path).map_err(|err| FileError::from_io(path, err))?;
    String::from_utf8(bytes)
        .with_context(|| format!("{} appears to be binary or non UTF-8", path.display()))
}
