//! Prompt builder — serializes loop state into one text prompt.
//!
//! Sections appear in a fixed order: role/goal preamble, tool listing (one
//! JSON definition per line), file context, step history, then the output
//! format instructions. Building is a pure function of its inputs.

use codecouncil_core::session::{ContextFile, Session};
use codecouncil_core::tool::ToolDefinition;
use std::fmt::Write;

/// Default per-file character budget for the FILES section.
pub const DEFAULT_FILE_CONTEXT_CHARS: usize = 2000;

const INSTRUCTIONS: &str = r#"INSTRUCTIONS:
1. Analyze the goal and files.
2. Decide on the next step.
3. You MUST respond in JSON format ONLY.
4. Format:
{
  "thought": "your reasoning here",
  "action": "tool_name" or "FINAL_ANSWER",
  "actionInput": { ...tool_params } or { "answer": "final response" }
}"#;

#[derive(Debug, Clone)]
pub struct PromptBuilder {
    file_context_chars: usize,
}

impl PromptBuilder {
    pub fn new(file_context_chars: usize) -> Self {
        Self { file_context_chars }
    }

    pub fn file_context_chars(&self) -> usize {
        self.file_context_chars
    }

    pub fn build(&self, session: &Session, tools: &[ToolDefinition], files: &[ContextFile]) -> String {
        let mut prompt = String::new();

        let _ = writeln!(prompt, "You are an AI Agent with the role: {}.", session.role);
        let _ = writeln!(prompt, "Your Goal: {}", session.goal);

        prompt.push_str("\nAVAILABLE TOOLS:\n");
        for tool in tools {
            // ToolDefinition holds only strings and JSON values.
            let line = serde_json::to_string(tool).unwrap_or_default();
            prompt.push_str(&line);
            prompt.push('\n');
        }

        prompt.push_str("\nFILES:\n");
        for file in files {
            let excerpt = truncate_chars(&file.content, self.file_context_chars);
            let _ = write!(prompt, "--- {} ---\n{}\n\n", file.name, excerpt);
        }

        prompt.push_str("\nHISTORY:\n");
        for (i, step) in session.steps.iter().enumerate() {
            let action = step.action.as_ref().map_or("none", |a| a.as_str());
            let observation = step.observation.as_deref().unwrap_or("none");
            let _ = write!(
                prompt,
                "Step {}:\nThought: {}\nAction: {}\nObservation: {}\n\n",
                i + 1,
                step.thought,
                action,
                observation
            );
        }

        prompt.push('\n');
        prompt.push_str(INSTRUCTIONS);
        prompt.push_str("\n\nNext Step JSON:\n");
        prompt
    }
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_FILE_CONTEXT_CHARS)
    }
}

/// First `max` characters of `s`, never splitting a code point.
fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((byte_index, _)) => &s[..byte_index],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use codecouncil_core::session::{Step, StepAction};

    fn tool(name: &str) -> ToolDefinition {
        ToolDefinition {
            name: name.into(),
            description: format!("{name} tool"),
            parameters: serde_json::json!({"type": "object", "properties": {}}),
        }
    }

    fn running_session() -> Session {
        let mut session = Session::new("Find SQL injection", "Security Auditor");
        session.start().unwrap();
        session
    }

    #[test]
    fn sections_appear_in_fixed_order() {
        let session = running_session();
        let prompt = PromptBuilder::default().build(
            &session,
            &[tool("web_search")],
            &[ContextFile::new("db.ts", "query(sql)")],
        );

        let positions: Vec<usize> = [
            "You are an AI Agent with the role: Security Auditor.",
            "Your Goal: Find SQL injection",
            "AVAILABLE TOOLS:",
            "FILES:",
            "HISTORY:",
            "INSTRUCTIONS:",
            "Next Step JSON:",
        ]
        .iter()
        .map(|needle| prompt.find(needle).unwrap_or_else(|| panic!("missing {needle}")))
        .collect();

        assert!(positions.windows(2).all(|w| w[0] < w[1]), "{positions:?}");
        assert!(prompt.ends_with("Next Step JSON:\n"));
    }

    #[test]
    fn every_tool_is_listed_as_json() {
        let session = running_session();
        let prompt = PromptBuilder::default().build(&session, &[tool("a"), tool("b")], &[]);

        let listed: Vec<ToolDefinition> = prompt
            .lines()
            .filter(|l| l.starts_with('{') && l.contains("\"name\""))
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(listed, vec![tool("a"), tool("b")]);
    }

    #[test]
    fn file_content_is_truncated_per_file() {
        let session = running_session();
        let long = "x".repeat(50);
        let prompt = PromptBuilder::new(10).build(
            &session,
            &[],
            &[ContextFile::new("a.rs", long.clone()), ContextFile::new("b.rs", "short")],
        );

        assert!(prompt.contains("--- a.rs ---\nxxxxxxxxxx\n\n"));
        assert!(!prompt.contains(&long));
        assert!(prompt.contains("--- b.rs ---\nshort\n"));
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("abc", 10), "abc");
        assert_eq!(truncate_chars("abc", 0), "");
    }

    #[test]
    fn history_lists_steps_in_order() {
        let mut session = running_session();
        session
            .push_step(Step::structured(
                "search first",
                Some(StepAction::Tool("web_search".into())),
                Some(serde_json::json!({"query": "sqli"})),
            ))
            .unwrap();
        session.observe(0, "3 results").unwrap();
        session.push_step(Step::structured("thinking", None, None)).unwrap();

        let prompt = PromptBuilder::default().build(&session, &[], &[]);
        let first = prompt
            .find("Step 1:\nThought: search first\nAction: web_search\nObservation: 3 results")
            .unwrap();
        let second = prompt
            .find("Step 2:\nThought: thinking\nAction: none\nObservation: none")
            .unwrap();
        assert!(first < second);
    }

    #[test]
    fn building_is_deterministic() {
        let session = running_session();
        let files = [ContextFile::new("f", "c")];
        let builder = PromptBuilder::default();
        assert_eq!(
            builder.build(&session, &[tool("t")], &files),
            builder.build(&session, &[tool("t")], &files)
        );
    }
}
