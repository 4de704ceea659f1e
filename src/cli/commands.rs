use anyhow::Result;
use clap::{error::ErrorKind, Parser};
use colored::Colorize;
use serde::Serialize;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::{
    app::init_config,
    cache::Tier,
    context::{format_issues, CodeAnalyzer, FileStructure, SymbolKind},
};

use super::{Commands, OutputFormat, ShellCommand, ShellLine};

/// What one shell line produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellOutcome {
    Output(String),
    /// The line did not parse; carries clap's message and usage
    Invalid(String),
    Empty,
    Quit,
}

/// Analyzer bound to a project root and an output format
pub struct Workspace {
    analyzer: CodeAnalyzer,
    root: PathBuf,
    format: OutputFormat,
}

impl Workspace {
    pub fn new(analyzer: CodeAnalyzer, root: PathBuf, format: OutputFormat) -> Self {
        Self {
            analyzer,
            root,
            format,
        }
    }

    pub fn structure(&self, file: &Path) -> Result<String> {
        let lookup = self.analyzer.file_structure(file)?;
        match self.format {
            OutputFormat::Json => to_json(&*lookup.value),
            OutputFormat::Text => Ok(render_structure(&lookup.value, lookup.hit)),
        }
    }

    pub fn complexity(&self, file: &Path) -> Result<String> {
        let report = self.analyzer.complexity(file)?;
        match self.format {
            OutputFormat::Json => to_json(&report),
            OutputFormat::Text => Ok(report.format()),
        }
    }

    pub fn issues(&self, dir: Option<&Path>) -> Result<String> {
        let dir = dir.unwrap_or(&self.root);
        let issues = self.analyzer.find_issues(dir)?;
        match self.format {
            OutputFormat::Json => to_json(&issues),
            OutputFormat::Text => Ok(format_issues(&issues)),
        }
    }

    pub fn project(&self) -> Result<String> {
        let lookup = self.analyzer.project_summary(&self.root)?;
        match self.format {
            OutputFormat::Json => to_json(&*lookup.value),
            OutputFormat::Text if lookup.hit => Ok(format!("{}  (cached)", lookup.value.format())),
            OutputFormat::Text => Ok(lookup.value.format()),
        }
    }

    pub fn stats(&self) -> Result<String> {
        let stats = self.analyzer.cache().stats();
        match self.format {
            OutputFormat::Json => to_json(&stats),
            OutputFormat::Text => Ok(stats.format()),
        }
    }

    pub fn clear(&self, tier: Option<Tier>) -> Result<String> {
        let removed = self.analyzer.cache().clear(tier);
        Ok(match tier {
            Some(tier) => format!("Cleared {} entries from the {} tier", removed, tier),
            None => format!("Cleared {} entries from all tiers", removed),
        })
    }

    pub fn invalidate(&self, file: &Path) -> Result<String> {
        let removed = self.analyzer.cache().invalidate_path(file);
        Ok(format!(
            "Invalidated {} entries for {}",
            removed,
            file.display()
        ))
    }

    /// Parse and run one line typed into the shell
    pub fn run_shell_line(&self, line: &str) -> Result<ShellOutcome> {
        let words: Vec<&str> = line.split_whitespace().collect();
        if words.is_empty() {
            return Ok(ShellOutcome::Empty);
        }

        let parsed = match ShellLine::try_parse_from(words) {
            Ok(parsed) => parsed,
            Err(err) if err.kind() == ErrorKind::DisplayHelp => {
                return Ok(ShellOutcome::Output(err.to_string()))
            }
            Err(err) => return Ok(ShellOutcome::Invalid(err.to_string())),
        };

        let output = match parsed.command {
            ShellCommand::Structure { file } => self.structure(&file)?,
            ShellCommand::Complexity { file } => self.complexity(&file)?,
            ShellCommand::Issues { dir } => self.issues(dir.as_deref())?,
            ShellCommand::Project => self.project()?,
            ShellCommand::Stats => self.stats()?,
            ShellCommand::Clear { tier } => self.clear(tier)?,
            ShellCommand::Invalidate { file } => self.invalidate(&file)?,
            ShellCommand::Quit => return Ok(ShellOutcome::Quit),
        };
        Ok(ShellOutcome::Output(output))
    }
}

/// Handle CLI subcommands
pub async fn handle_command(command: &Commands, workspace: &Workspace) -> Result<()> {
    let output = match command {
        Commands::Structure { file } => workspace.structure(file)?,
        Commands::Complexity { file } => workspace.complexity(file)?,
        Commands::Issues { dir } => workspace.issues(dir.as_deref())?,
        Commands::Project => workspace.project()?,
        Commands::CacheStats => workspace.stats()?,
        Commands::CacheClear { tier } => workspace.clear(*tier)?.green().to_string(),
        Commands::Init => match init_config()? {
            Some(path) => format!("Created default configuration at: {}", path.display())
                .green()
                .to_string(),
            None => "Configuration already exists; nothing to do".to_string(),
        },
        Commands::Shell => return run_shell(workspace).await,
    };
    println!("{}", output);
    Ok(())
}

/// Read commands from stdin until EOF or `quit`
pub async fn run_shell(workspace: &Workspace) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    show_prompt()?;
    while let Some(line) = lines.next_line().await? {
        match workspace.run_shell_line(&line) {
            Ok(ShellOutcome::Output(text)) => println!("{}", text),
            Ok(ShellOutcome::Invalid(message)) => eprintln!("{}", message),
            Ok(ShellOutcome::Empty) => {}
            Ok(ShellOutcome::Quit) => break,
            Err(err) => eprintln!("{} {:#}", "error:".red(), err),
        }
        show_prompt()?;
    }
    Ok(())
}

fn show_prompt() -> Result<()> {
    print!("{} ", ">".cyan());
    io::stdout().flush()?;
    Ok(())
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

fn render_structure(structure: &FileStructure, cached: bool) -> String {
    let mut out = format!(
        "{} ({}, {} lines{})\n",
        structure.path.display(),
        structure.language,
        structure.line_count,
        if cached { ", cached" } else { "" }
    );

    for kind in [
        SymbolKind::Import,
        SymbolKind::Class,
        SymbolKind::Interface,
        SymbolKind::Type,
        SymbolKind::Function,
        SymbolKind::Method,
    ] {
        for symbol in structure.symbols.iter().filter(|s| s.kind == kind) {
            out.push_str(&format!(
                "  {:<9} {} (line {})\n",
                kind.as_str(),
                symbol.name,
                symbol.line
            ));
        }
    }

    if structure.has_errors {
        out.push_str("  [WARNING] syntax errors; results may be partial\n");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheCoordinator;
    use crate::context::AnalyzerConfig;
    use pretty_assertions::assert_eq;
    use std::fs;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn workspace(root: &Path, format: OutputFormat) -> Workspace {
        let cache = Arc::new(CacheCoordinator::with_defaults());
        let analyzer = CodeAnalyzer::new(cache, AnalyzerConfig::default()).unwrap();
        Workspace::new(analyzer, root.to_path_buf(), format)
    }

    fn output(outcome: ShellOutcome) -> String {
        match outcome {
            ShellOutcome::Output(text) => text,
            other => panic!("expected output, got {:?}", other),
        }
    }

    #[test]
    fn test_structure_marks_cached_results() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("main.go");
        fs::write(&file, "package main\n\nfunc main() {}\n").unwrap();
        let workspace = workspace(temp_dir.path(), OutputFormat::Text);

        let first = workspace.structure(&file).unwrap();
        assert!(first.contains("function  main (line 3)"));
        assert!(!first.contains("cached"));
        assert!(workspace.structure(&file).unwrap().contains("cached"));
    }

    #[test]
    fn test_shell_lines() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("a.py");
        fs::write(&file, "def f():\n    return 1\n").unwrap();
        let workspace = workspace(temp_dir.path(), OutputFormat::Text);
        let file_arg = file.display().to_string();

        assert_eq!(workspace.run_shell_line("   ").unwrap(), ShellOutcome::Empty);
        output(workspace.run_shell_line(&format!("structure {}", file_arg)).unwrap());

        let stats = output(workspace.run_shell_line("stats").unwrap());
        assert!(stats.starts_with("Cache Statistics:"));

        assert_eq!(
            output(workspace.run_shell_line(&format!("invalidate {}", file_arg)).unwrap()),
            format!("Invalidated 2 entries for {}", file_arg)
        );
        assert_eq!(
            output(workspace.run_shell_line("clear structure").unwrap()),
            "Cleared 0 entries from the structure tier"
        );
        assert_eq!(workspace.run_shell_line("quit").unwrap(), ShellOutcome::Quit);
        assert_eq!(workspace.run_shell_line("exit").unwrap(), ShellOutcome::Quit);
    }

    #[test]
    fn test_shell_reports_bad_input_without_failing() {
        let temp_dir = TempDir::new().unwrap();
        let workspace = workspace(temp_dir.path(), OutputFormat::Text);

        assert!(matches!(
            workspace.run_shell_line("frobnicate").unwrap(),
            ShellOutcome::Invalid(_)
        ));
        assert!(matches!(
            workspace.run_shell_line("clear bogus").unwrap(),
            ShellOutcome::Invalid(_)
        ));
        assert!(output(workspace.run_shell_line("help").unwrap()).contains("invalidate"));

        // Analysis errors surface as errors, the shell keeps going
        assert!(workspace.run_shell_line("structure missing.py").is_err());
    }

    #[test]
    fn test_json_output() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("lib.rs"), "// TODO: docs\npub fn x() {}\n").unwrap();
        let workspace = workspace(temp_dir.path(), OutputFormat::Json);

        let project: serde_json::Value = serde_json::from_str(&workspace.project().unwrap()).unwrap();
        assert_eq!(project["code_files"][0], "lib.rs");

        let issues: serde_json::Value =
            serde_json::from_str(&workspace.issues(None).unwrap()).unwrap();
        assert_eq!(issues[0]["kind"], "todo");
        assert_eq!(issues[0]["line"], 1);

        let stats: serde_json::Value = serde_json::from_str(&workspace.stats().unwrap()).unwrap();
        assert_eq!(stats["tiers"][3]["tier"], "project-summary");
        assert_eq!(stats["tiers"][3]["hits"], 1);
    }
}
