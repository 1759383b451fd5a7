//! `codecouncil agent` — Run one session in-process and follow it to the end.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use codecouncil_agent::{AgentRunner, SessionStore};
use codecouncil_config::AppConfig;
use codecouncil_core::error::InputError;
use codecouncil_core::provider::{Credential, Provider};
use codecouncil_core::session::{AgentStatus, ContextFile, Session, Step};

const POLL_INTERVAL: Duration = Duration::from_millis(250);

pub async fn run(
    goal: String,
    role: Option<String>,
    files: Vec<PathBuf>,
    api_key: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    let context = read_context_files(&files)?;
    let store = build_store(&config, super::default_provider(&config)?);

    let credential = api_key.and_then(Credential::new);
    let started = match store.start_agent(&goal, role.as_deref(), context, credential) {
        Ok(session) => session,
        Err(InputError::MissingCredential) => {
            print_key_help(&config);
            return Err("No API key found. See above for setup instructions.".into());
        }
        Err(e) => return Err(e.into()),
    };

    println!();
    println!("  Session:   {}", started.id);
    println!("  Role:      {}", started.role);
    println!("  Goal:      {}", started.goal);
    println!("  Provider:  {}", config.default_provider);
    println!("  Files:     {}", files.len());
    println!();

    let mut printed = 0;
    let session = loop {
        let session = store
            .get_session(&started.id)
            .ok_or("Session disappeared from the store")?;

        let ready = settled_steps(&session);
        for (index, step) in session.steps.iter().enumerate().take(ready).skip(printed) {
            print!("{}", render_step(index + 1, step));
        }
        printed = printed.max(ready);

        if session.is_terminal() {
            break session;
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    };

    println!("  Status:    {}", session.status.as_str());
    println!("  Model calls: {}", session.iterations);
    println!();
    if let Some(result) = &session.result {
        for line in result.lines() {
            println!("  {line}");
        }
        println!();
    }

    if session.status == AgentStatus::Error {
        return Err("Agent run failed".into());
    }
    Ok(())
}

fn build_store(config: &AppConfig, provider: Arc<dyn Provider>) -> SessionStore {
    let tools = Arc::new(codecouncil_tools::registry_with_search(
        config.tools.search_endpoint.clone(),
    ));
    let runner = AgentRunner::from_config(config, provider, tools);
    SessionStore::from_config(config, runner)
}

fn print_key_help(config: &AppConfig) {
    eprintln!();
    eprintln!("  ERROR: No API key configured!");
    eprintln!();
    eprintln!("  Pass --api-key, or set one of these environment variables:");
    eprintln!("    CODECOUNCIL_API_KEY");
    eprintln!("    GEMINI_API_KEY");
    eprintln!();
    eprintln!("  Or add it to your config file, at the top level or under");
    eprintln!("  [providers.{}]:", config.default_provider);
    eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
    eprintln!();
}

/// Read each path into a context file named after its file name.
fn read_context_files(paths: &[PathBuf]) -> Result<Vec<ContextFile>, Box<dyn std::error::Error>> {
    paths
        .iter()
        .map(|path| {
            let content = std::fs::read_to_string(path)
                .map_err(|e| format!("Failed to read {}: {e}", path.display()))?;
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string());
            Ok(ContextFile::new(name, content))
        })
        .collect()
}

/// Number of leading steps that will not change any more. A running
/// session's newest step may still be waiting for its tool observation.
fn settled_steps(session: &Session) -> usize {
    match session.steps.last() {
        Some(last) if !session.is_terminal() && last.action.is_some() && last.observation.is_none() => {
            session.steps.len() - 1
        }
        _ => session.steps.len(),
    }
}

fn render_step(number: usize, step: &Step) -> String {
    let mut out = format!("  Step {number}\n    Thought:     {}\n", step.thought);
    if let Some(action) = &step.action {
        out.push_str(&format!("    Action:      {}\n", action.as_str()));
    }
    if let Some(input) = &step.action_input {
        out.push_str(&format!("    Input:       {input}\n"));
    }
    if let Some(observation) = &step.observation {
        let mut lines = observation.lines();
        if let Some(first) = lines.next() {
            out.push_str(&format!("    Observation: {first}\n"));
        }
        for line in lines {
            out.push_str(&format!("                 {line}\n"));
        }
    }
    out.push('\n');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use codecouncil_core::session::StepAction;

    #[test]
    fn render_includes_action_and_multiline_observation() {
        let mut step = Step::structured(
            "look it up",
            Some(StepAction::Tool("web_search".into())),
            Some(serde_json::json!({"query": "cve"})),
        );
        step.observation = Some("line one\nline two".into());

        let text = render_step(2, &step);
        assert!(text.starts_with("  Step 2\n"));
        assert!(text.contains("Action:      web_search"));
        assert!(text.contains(r#"Input:       {"query":"cve"}"#));
        assert!(text.contains("Observation: line one\n                 line two\n"));
    }

    #[test]
    fn pending_tool_step_is_not_settled() {
        let mut session = Session::new("goal", "role");
        session.start().unwrap();
        session
            .push_step(Step::structured(
                "t",
                Some(StepAction::Tool("web_search".into())),
                None,
            ))
            .unwrap();
        assert_eq!(settled_steps(&session), 0);

        session.observe(0, "done").unwrap();
        assert_eq!(settled_steps(&session), 1);
    }

    fn config_from(toml: &str) -> AppConfig {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, toml).unwrap();
        AppConfig::load_from(&path).unwrap()
    }

    #[tokio::test]
    async fn provider_table_key_is_enough_to_start() {
        let config = config_from(
            r#"
[providers.gemini]
api_key = "provider-key"
api_url = "http://127.0.0.1:9"
"#,
        );
        assert!(config.api_key.is_none());

        let store = build_store(&config, crate::commands::default_provider(&config).unwrap());
        let started = store.start_agent("audit", None, vec![], None);
        assert!(started.is_ok());
    }

    #[tokio::test]
    async fn no_key_anywhere_is_rejected() {
        let config = config_from("default_provider = \"gemini\"\n");
        let store = build_store(&config, crate::commands::default_provider(&config).unwrap());
        let err = store.start_agent("audit", None, vec![], None).unwrap_err();
        assert_eq!(err, InputError::MissingCredential);
    }

    #[test]
    fn missing_file_is_reported() {
        let err = read_context_files(&[PathBuf::from("/definitely/not/here.rs")]).unwrap_err();
        assert!(err.to_string().contains("/definitely/not/here.rs"));
    }
}
