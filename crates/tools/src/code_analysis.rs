//! Code analysis tool — heuristic static checks over a single file.
//!
//! Reports size, nesting, function count, TODO/FIXME markers and likely
//! hard-coded secrets, then rates complexity. Nothing is executed or
//! compiled; every check is line based.

use async_trait::async_trait;
use codecouncil_core::error::ToolError;
use codecouncil_core::tool::{Tool, ToolResult};
use regex_lite::Regex;
use serde::Serialize;

const SECRET_PATTERNS: &[(&str, &str)] = &[
    ("AWS access key id", r"AKIA[0-9A-Z]{16}"),
    (
        "hard-coded credential",
        r#"(?i)(api[_-]?key|secret|passw(or)?d|token)\s*[:=]\s*["'][^"']{6,}["']"#,
    ),
    ("private key block", r"-----BEGIN ([A-Z]+ )?PRIVATE KEY-----"),
];

const FUNCTION_PATTERN: &str = r"\b(fn|def|func|function)\s+[A-Za-z_][A-Za-z0-9_]*";

pub struct CodeAnalysisTool {
    secrets: Vec<(&'static str, Regex)>,
    functions: Option<Regex>,
}

impl CodeAnalysisTool {
    pub fn new() -> Self {
        Self {
            secrets: SECRET_PATTERNS
                .iter()
                .filter_map(|(label, pattern)| Regex::new(pattern).ok().map(|re| (*label, re)))
                .collect(),
            functions: Regex::new(FUNCTION_PATTERN).ok(),
        }
    }

    fn analyze(&self, language: Language, code: &str) -> Report {
        let mut report = Report {
            language: language.name(),
            ..Report::default()
        };
        let mut depth: i64 = 0;

        for (index, line) in code.lines().enumerate() {
            report.lines += 1;
            let trimmed = line.trim();

            if trimmed.is_empty() {
                report.blank_lines += 1;
                continue;
            }
            if language.is_comment(trimmed) {
                report.comment_lines += 1;
            }
            if trimmed.contains("TODO") || trimmed.contains("FIXME") {
                report.markers += 1;
            }
            if let Some(re) = &self.functions {
                report.functions += re.find_iter(line).count();
            }
            for (label, re) in &self.secrets {
                if re.is_match(line) {
                    report.secrets.push(SecretFinding {
                        kind: *label,
                        line: index + 1,
                    });
                }
            }

            if language.uses_braces() {
                for c in line.chars() {
                    match c {
                        '{' => {
                            depth += 1;
                            report.max_depth = report.max_depth.max(depth as usize);
                        }
                        '}' => depth = (depth - 1).max(0),
                        _ => {}
                    }
                }
            } else {
                let indent = line.len() - line.trim_start().len();
                report.max_depth = report.max_depth.max(indent / 4);
            }
        }

        report.complexity = rate(&report);
        report.suggestions = suggest(&report);
        report
    }
}

impl Default for CodeAnalysisTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for CodeAnalysisTool {
    fn name(&self) -> &str {
        "code_analysis"
    }

    fn description(&self) -> &str {
        "Analyze specific files or code snippets from the provided context."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "filename": {
                    "type": "string",
                    "description": "The name of the file to analyze from the provided context."
                },
                "query": {
                    "type": "string",
                    "description": "Specific question or aspect to analyze in the code."
                },
                "code": {
                    "type": "string",
                    "description": "The source text to analyze. Without it only file metadata is reported."
                }
            },
            "required": ["filename", "query"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let filename = arguments["filename"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'filename' argument".into()))?;
        let query = arguments["query"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'query' argument".into()))?;
        let language = Language::from_filename(filename);

        let Some(code) = arguments["code"].as_str() else {
            let output = format!(
                "Analysis of {filename} for \"{query}\":\n\
                 - Language: {}\n\
                 - No source supplied; pass `code` for a structural analysis.",
                language.name()
            );
            return Ok(ToolResult::ok(output)
                .with_data(serde_json::json!({ "language": language.name() })));
        };

        let report = self.analyze(language, code);
        let output = report.render(filename, query);
        let data = serde_json::to_value(&report).map_err(|e| ToolError::ExecutionFailed {
            tool_name: "code_analysis".into(),
            reason: e.to_string(),
        })?;
        Ok(ToolResult::ok(output).with_data(data))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Language {
    Rust,
    TypeScript,
    JavaScript,
    Python,
    Go,
    Java,
    C,
    Cpp,
    Ruby,
    Shell,
    Sql,
    Unknown,
}

impl Language {
    fn from_filename(filename: &str) -> Self {
        let ext = filename
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "rs" => Self::Rust,
            "ts" | "tsx" => Self::TypeScript,
            "js" | "jsx" | "mjs" | "cjs" => Self::JavaScript,
            "py" => Self::Python,
            "go" => Self::Go,
            "java" | "kt" => Self::Java,
            "c" | "h" => Self::C,
            "cc" | "cpp" | "cxx" | "hpp" => Self::Cpp,
            "rb" => Self::Ruby,
            "sh" | "bash" => Self::Shell,
            "sql" => Self::Sql,
            _ => Self::Unknown,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::Rust => "Rust",
            Self::TypeScript => "TypeScript",
            Self::JavaScript => "JavaScript",
            Self::Python => "Python",
            Self::Go => "Go",
            Self::Java => "Java",
            Self::C => "C",
            Self::Cpp => "C++",
            Self::Ruby => "Ruby",
            Self::Shell => "Shell",
            Self::Sql => "SQL",
            Self::Unknown => "Unknown",
        }
    }

    fn is_comment(self, trimmed: &str) -> bool {
        match self {
            Self::Python | Self::Ruby | Self::Shell => trimmed.starts_with('#'),
            Self::Sql => trimmed.starts_with("--"),
            _ => {
                trimmed.starts_with("//") || trimmed.starts_with("/*") || trimmed.starts_with('*')
            }
        }
    }

    fn uses_braces(self) -> bool {
        !matches!(self, Self::Python | Self::Ruby | Self::Sql)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
enum Complexity {
    Low,
    Moderate,
    High,
}

impl Complexity {
    fn label(self) -> &'static str {
        match self {
            Self::Low => "Low",
            Self::Moderate => "Moderate",
            Self::High => "High",
        }
    }
}

#[derive(Debug, Serialize)]
struct SecretFinding {
    kind: &'static str,
    line: usize,
}

#[derive(Debug, Serialize)]
struct Report {
    language: &'static str,
    lines: usize,
    blank_lines: usize,
    comment_lines: usize,
    functions: usize,
    max_depth: usize,
    markers: usize,
    secrets: Vec<SecretFinding>,
    complexity: Complexity,
    suggestions: Vec<String>,
}

impl Default for Report {
    fn default() -> Self {
        Self {
            language: Language::Unknown.name(),
            lines: 0,
            blank_lines: 0,
            comment_lines: 0,
            functions: 0,
            max_depth: 0,
            markers: 0,
            secrets: Vec::new(),
            complexity: Complexity::Low,
            suggestions: Vec::new(),
        }
    }
}

impl Report {
    fn render(&self, filename: &str, query: &str) -> String {
        let security = if self.secrets.is_empty() {
            "No obvious hardcoded secrets found (heuristic check)".to_string()
        } else {
            let found: Vec<String> = self
                .secrets
                .iter()
                .map(|s| format!("{} (line {})", s.kind, s.line))
                .collect();
            format!("Possible hard-coded secrets: {}", found.join(", "))
        };

        let mut out = format!(
            "Analysis of {filename} for \"{query}\":\n\
             - Language: {}\n\
             - Lines: {} ({} blank, {} comment)\n\
             - Functions: {}\n\
             - Max nesting depth: {}\n\
             - TODO/FIXME markers: {}\n\
             - Security: {security}\n\
             - Complexity: {}",
            self.language,
            self.lines,
            self.blank_lines,
            self.comment_lines,
            self.functions,
            self.max_depth,
            self.markers,
            self.complexity.label(),
        );
        for suggestion in &self.suggestions {
            out.push_str("\n- Suggestion: ");
            out.push_str(suggestion);
        }
        out
    }
}

fn rate(report: &Report) -> Complexity {
    let code_lines = report.lines - report.blank_lines - report.comment_lines;
    if code_lines > 800 || report.max_depth >= 6 {
        Complexity::High
    } else if code_lines > 200 || report.max_depth >= 4 {
        Complexity::Moderate
    } else {
        Complexity::Low
    }
}

fn suggest(report: &Report) -> Vec<String> {
    let mut suggestions = Vec::new();
    if !report.secrets.is_empty() {
        suggestions.push("Move hard-coded secrets into environment configuration and rotate them.".into());
    }
    if report.max_depth >= 4 {
        suggestions.push("Reduce nesting with early returns or helper functions.".into());
    }
    let code_lines = report.lines - report.blank_lines - report.comment_lines;
    if report.functions > 0 && code_lines / report.functions > 50 {
        suggestions.push("Consider splitting large functions.".into());
    }
    if report.markers > 0 {
        suggestions.push(format!("Resolve {} outstanding TODO/FIXME marker(s).", report.markers));
    }
    if code_lines > 50 && report.comment_lines * 20 < code_lines {
        suggestions.push("Document the non-obvious parts; comment coverage is under 5%.".into());
    }
    suggestions
}
