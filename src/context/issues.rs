use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::cache::Payload;
use crate::constants::MAX_ISSUES_SHOWN_PER_KIND;

/// Category of a statically detected issue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueKind {
    Style,
    Todo,
    Debug,
}

impl IssueKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            IssueKind::Style => "style",
            IssueKind::Todo => "todo",
            IssueKind::Debug => "debug",
        }
    }
}

impl fmt::Display for IssueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Issue {
    pub kind: IssueKind,
    pub file: PathBuf,
    /// 1-based line number
    pub line: usize,
    pub message: String,
}

impl Payload for Issue {
    fn size_estimate(&self) -> usize {
        std::mem::size_of::<Self>() + self.file.as_os_str().len() + self.message.len()
    }
}

/// Line-level checks over one file's text
pub fn scan_lines(path: &Path, content: &str, long_line_limit: usize) -> Vec<Issue> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default()
        .to_lowercase();

    let mut issues = Vec::new();
    let mut push = |kind, line, message: String| {
        issues.push(Issue {
            kind,
            file: path.to_path_buf(),
            line,
            message,
        })
    };

    for (index, line) in content.lines().enumerate() {
        let number = index + 1;
        let trimmed_end = line.trim_end();

        let width = trimmed_end.chars().count();
        if width > long_line_limit {
            push(
                IssueKind::Style,
                number,
                format!("Line too long ({} > {} characters)", width, long_line_limit),
            );
        }

        if trimmed_end.len() != line.len() && !trimmed_end.is_empty() {
            push(IssueKind::Style, number, "Trailing whitespace".to_string());
        }

        if line.contains("TODO") || line.contains("FIXME") {
            push(IssueKind::Todo, number, line.trim().to_string());
        }

        if let Some(call) = debug_call(&extension, line) {
            push(
                IssueKind::Debug,
                number,
                format!("Debug output left in code: {}", call),
            );
        }
    }

    issues
}

fn debug_call(extension: &str, line: &str) -> Option<&'static str> {
    let calls: &[&'static str] = match extension {
        "py" => &["print("],
        "js" | "mjs" | "jsx" | "ts" | "tsx" => &["console.log("],
        "rs" => &["dbg!(", "println!("],
        _ => &[],
    };
    calls.iter().copied().find(|call| line.contains(call))
}

/// Render issues grouped by kind, a few examples per group
pub fn format_issues(issues: &[Issue]) -> String {
    if issues.is_empty() {
        return "No obvious issues found".to_string();
    }

    let mut by_kind: BTreeMap<IssueKind, Vec<&Issue>> = BTreeMap::new();
    for issue in issues {
        by_kind.entry(issue.kind).or_default().push(issue);
    }

    let mut out = format!("Found {} potential issues:\n", issues.len());
    for (kind, group) in by_kind {
        out.push_str(&format!("\n{} ({}):\n", kind.as_str().to_uppercase(), group.len()));
        for issue in group.iter().take(MAX_ISSUES_SHOWN_PER_KIND) {
            out.push_str(&format!(
                "  - {}:{}: {}\n",
                issue.file.display(),
                issue.line,
                issue.message
            ));
        }
        if group.len() > MAX_ISSUES_SHOWN_PER_KIND {
            out.push_str(&format!(
                "  ... and {} more\n",
                group.len() - MAX_ISSUES_SHOWN_PER_KIND
            ));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_scan_python_lines() {
        let long = format!("x = '{}'", "a".repeat(130));
        let content = format!("import os  \n# TODO: split this\nprint(os.name)\n{}\n", long);
        let issues = scan_lines(Path::new("app.py"), &content, 120);

        let summary: Vec<(IssueKind, usize)> = issues.iter().map(|i| (i.kind, i.line)).collect();
        assert_eq!(
            summary,
            vec![
                (IssueKind::Style, 1),
                (IssueKind::Todo, 2),
                (IssueKind::Debug, 3),
                (IssueKind::Style, 4),
            ]
        );
        assert_eq!(issues[1].message, "# TODO: split this");
    }

    #[test]
    fn test_debug_calls_depend_on_language() {
        let rust = scan_lines(Path::new("lib.rs"), "dbg!(x);\nprint(x)\n", 120);
        assert_eq!(rust.len(), 1);
        assert_eq!(rust[0].line, 1);

        let markdown = scan_lines(Path::new("notes.md"), "console.log(1)\n", 120);
        assert!(markdown.is_empty());
    }

    #[test]
    fn test_format_issues_caps_each_kind() {
        let issues: Vec<Issue> = (1..=7)
            .map(|line| Issue {
                kind: IssueKind::Todo,
                file: PathBuf::from("a.py"),
                line,
                message: "TODO".to_string(),
            })
            .collect();

        let text = format_issues(&issues);
        assert!(text.starts_with("Found 7 potential issues:"));
        assert!(text.contains("TODO (7):"));
        assert!(text.contains("a.py:5: TODO"));
        assert!(!text.contains("a.py:6: TODO"));
        assert!(text.contains("... and 2 more"));
        assert_eq!(format_issues(&[]), "No obvious issues found");
    }
}
