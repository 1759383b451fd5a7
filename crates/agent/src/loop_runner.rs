//! The agent reasoning loop implementation.
//!
//! Each iteration builds a prompt from the session, asks the model for one
//! JSON step, records it, and then either dispatches a tool or concludes.
//! A provider failure ends the run in `ERROR`; reaching the iteration
//! ceiling ends it in `COMPLETED` with a partial result.

use codecouncil_core::error::SessionError;
use codecouncil_core::provider::{Credential, Provider};
use codecouncil_core::session::{AgentStatus, ContextFile, SessionId, StepAction, StepOutcome};
use codecouncil_core::tool::{ToolDefinition, ToolRegistry};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::client::ModelClient;
use crate::parser::parse_response;
use crate::prompt::PromptBuilder;
use crate::store::SessionHandle;

/// Default ceiling on model calls per run.
pub const DEFAULT_MAX_ITERATIONS: u32 = 5;

/// Prefix of the result recorded when the iteration ceiling is reached.
pub const PARTIAL_RESULT_PREFIX: &str = "Task limit reached. Partial result: ";

/// How a run ended.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub session_id: SessionId,
    pub status: AgentStatus,
    /// Model calls made.
    pub iterations: u32,
    /// Tool dispatches to registered tools.
    pub tool_calls: u32,
}

/// Drives sessions through the Thought, Action, Observation loop.
pub struct AgentRunner {
    client: ModelClient,
    tools: Arc<ToolRegistry>,
    prompt: PromptBuilder,
    max_iterations: u32,
}

impl AgentRunner {
    pub fn new(client: ModelClient, tools: Arc<ToolRegistry>) -> Self {
        Self {
            client,
            tools,
            prompt: PromptBuilder::default(),
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }

    /// Build a runner with the model, sampling and agent settings from `config`.
    pub fn from_config(
        config: &codecouncil_config::AppConfig,
        provider: Arc<dyn Provider>,
        tools: Arc<ToolRegistry>,
    ) -> Self {
        let model = config
            .providers
            .get(&config.default_provider)
            .and_then(|p| p.default_model.clone())
            .unwrap_or_else(|| config.default_model.clone());

        let client = ModelClient::new(provider, model)
            .with_temperature(config.default_temperature)
            .with_max_tokens(config.default_max_tokens);

        Self::new(client, tools)
            .with_max_iterations(config.agent.max_iterations)
            .with_prompt_builder(PromptBuilder::new(config.agent.file_context_chars))
    }

    /// Set the maximum number of model calls per run.
    pub fn with_max_iterations(mut self, max: u32) -> Self {
        self.max_iterations = max;
        self
    }

    pub fn with_prompt_builder(mut self, prompt: PromptBuilder) -> Self {
        self.prompt = prompt;
        self
    }

    pub fn max_iterations(&self) -> u32 {
        self.max_iterations
    }

    pub fn client(&self) -> &ModelClient {
        &self.client
    }

    pub fn tool_definitions(&self) -> Vec<ToolDefinition> {
        self.tools.definitions()
    }

    /// Run `handle`'s session to a terminal state.
    ///
    /// The session must be `IDLE`. Nothing is returned as an error: every
    /// outcome is recorded on the session itself.
    pub async fn run(
        &self,
        handle: &SessionHandle,
        files: &[ContextFile],
        credential: Option<&Credential>,
    ) -> RunSummary {
        let mut tool_calls = 0;

        if let Err(e) = self.drive(handle, files, credential, &mut tool_calls).await {
            warn!(session_id = %handle.id(), error = %e, "Session rejected a loop update");
            handle.update(|s| {
                if s.status == AgentStatus::Running {
                    let _ = s.fail(format!("Error: {e}"));
                }
            });
        }

        let session = handle.snapshot();
        info!(
            session_id = %session.id,
            status = %session.status,
            iterations = session.iterations,
            tool_calls,
            steps = session.steps.len(),
            "Agent run finished"
        );

        RunSummary {
            session_id: session.id,
            status: session.status,
            iterations: session.iterations,
            tool_calls,
        }
    }

    async fn drive(
        &self,
        handle: &SessionHandle,
        files: &[ContextFile],
        credential: Option<&Credential>,
        tool_calls: &mut u32,
    ) -> Result<(), SessionError> {
        let session_id = handle.id();
        handle.update(|s| s.start())?;
        info!(%session_id, model = self.client.model(), "Agent run started");

        let definitions = self.tools.definitions();

        loop {
            let prompt = {
                let session = handle.snapshot();
                if session.status != AgentStatus::Running
                    || session.iterations >= self.max_iterations
                {
                    break;
                }
                self.prompt.build(&session, &definitions, files)
            };

            let iteration = handle.update(|s| s.record_iteration())?;
            debug!(%session_id, iteration, prompt_chars = prompt.len(), "Agent loop iteration");

            let reply = match self.client.generate(&prompt, credential).await {
                Ok(reply) => reply,
                Err(e) => {
                    error!(%session_id, iteration, error = %e, "Model call failed");
                    handle.update(|s| s.fail(format!("Error: {e}")))?;
                    return Ok(());
                }
            };

            let step = parse_response(&reply, &self.tools);
            let outcome = step.outcome;
            let action = step.action.clone();
            let action_input = step.action_input.clone();
            let thought = step.thought.clone();
            let index = handle.update(|s| s.push_step(step))?;

            match (outcome, action) {
                (StepOutcome::Malformed, _) => {
                    warn!(%session_id, iteration, "Model reply was not valid JSON; concluding");
                    handle.update(|s| s.complete(thought))?;
                }
                (StepOutcome::Structured, None) => {
                    handle.update(|s| s.complete(thought))?;
                }
                (StepOutcome::Structured, Some(StepAction::FinalAnswer)) => {
                    let result = final_answer(action_input.as_ref(), &thought);
                    handle.update(|s| s.complete(result))?;
                }
                (StepOutcome::Structured, Some(StepAction::Tool(name))) => {
                    *tool_calls += 1;
                    let arguments = action_input.unwrap_or_else(|| serde_json::json!({}));
                    let observation = self.dispatch(session_id, &name, arguments).await;
                    handle.update(|s| s.observe(index, observation))?;
                }
                (StepOutcome::Structured, Some(StepAction::Unrecognized(name))) => {
                    warn!(%session_id, tool = %name, "Model asked for an unknown tool");
                    handle.update(|s| s.observe(index, format!("Error: Tool '{name}' not found.")))?;
                }
            }
        }

        handle.update(|s| {
            if s.status != AgentStatus::Running {
                return Ok(());
            }
            warn!(%session_id, iterations = s.iterations, "Iteration limit reached");
            let last = s.last_thought().unwrap_or_default().to_string();
            s.complete(format!("{PARTIAL_RESULT_PREFIX}{last}"))
        })
    }

    async fn dispatch(&self, session_id: SessionId, name: &str, arguments: serde_json::Value) -> String {
        debug!(%session_id, tool = name, "Executing tool");
        match self.tools.execute(name, arguments).await {
            Ok(result) => result.output,
            Err(e) => {
                warn!(%session_id, tool = name, error = %e, "Tool execution failed");
                format!("Error: {e}")
            }
        }
    }
}

/// The answer for a `FINAL_ANSWER` step: `actionInput.answer` when it holds
/// something, else the step's thought.
fn final_answer(action_input: Option<&serde_json::Value>, thought: &str) -> String {
    use serde_json::Value;
    match action_input.and_then(|input| input.get("answer")) {
        Some(Value::String(answer)) if !answer.is_empty() => answer.clone(),
        None | Some(Value::Null) | Some(Value::String(_)) | Some(Value::Bool(false)) => {
            thought.to_string()
        }
        Some(other) => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::ScriptedProvider;
    use codecouncil_core::session::Session;

    fn runner(provider: Arc<ScriptedProvider>) -> AgentRunner {
        let tools = Arc::new(codecouncil_tools::default_registry());
        AgentRunner::new(ModelClient::new(provider, "mock-model"), tools)
    }

    fn idle_handle() -> SessionHandle {
        SessionHandle::new(Session::new("Audit auth.ts", "Security Auditor"))
    }

    #[tokio::test]
    async fn final_answer_completes_in_one_iteration() {
        let provider = Arc::new(ScriptedProvider::replies(&[
            r#"{"thought":"t","action":"FINAL_ANSWER","actionInput":{"answer":"a"}}"#,
        ]));
        let handle = idle_handle();

        let summary = runner(provider.clone()).run(&handle, &[], None).await;

        assert_eq!(summary.status, AgentStatus::Completed);
        assert_eq!(summary.iterations, 1);
        assert_eq!(provider.calls(), 1);
        let session = handle.snapshot();
        assert_eq!(session.result.as_deref(), Some("a"));
        assert_eq!(session.steps.len(), 1);
    }

    #[tokio::test]
    async fn tool_observation_feeds_next_prompt() {
        let provider = Arc::new(ScriptedProvider::replies(&[
            r#"{"thought":"check the file","action":"code_analysis","actionInput":{"filename":"auth.ts","query":"secrets"}}"#,
            r#"{"thought":"done","action":"FINAL_ANSWER","actionInput":{"answer":"clean"}}"#,
        ]));
        let handle = idle_handle();

        let summary = runner(provider.clone()).run(&handle, &[], None).await;

        assert_eq!(summary.tool_calls, 1);
        assert_eq!(summary.iterations, 2);
        let session = handle.snapshot();
        let observation = session.steps[0].observation.as_deref().unwrap();
        assert!(observation.starts_with("Analysis of auth.ts"));

        let prompts = provider.prompts();
        assert!(!prompts[0].contains("Step 1:"));
        assert!(prompts[1].contains("Step 1:\nThought: check the file\nAction: code_analysis"));
        assert!(prompts[1].contains(observation));
    }

    #[tokio::test]
    async fn tool_argument_errors_become_observations() {
        let provider = Arc::new(ScriptedProvider::replies(&[
            r#"{"thought":"search","action":"web_search","actionInput":{}}"#,
            r#"{"thought":"give up"}"#,
        ]));
        let handle = idle_handle();

        runner(provider).run(&handle, &[], None).await;

        let session = handle.snapshot();
        assert_eq!(session.status, AgentStatus::Completed);
        assert_eq!(
            session.steps[0].observation.as_deref(),
            Some("Error: Invalid tool arguments: Missing 'query' argument")
        );
        assert_eq!(session.result.as_deref(), Some("give up"));
    }

    #[tokio::test]
    async fn blank_action_name_is_observed_as_unknown_tool() {
        let provider = Arc::new(ScriptedProvider::replies(&[
            r#"{"thought":"hmm","action":"  "}"#,
            r#"{"thought":"done","action":"FINAL_ANSWER","actionInput":{"answer":"ok"}}"#,
        ]));
        let handle = idle_handle();

        let summary = runner(provider).run(&handle, &[], None).await;

        assert_eq!(summary.iterations, 2);
        let session = handle.snapshot();
        assert_eq!(
            session.steps[0].observation.as_deref(),
            Some("Error: Tool '  ' not found.")
        );
        assert_eq!(session.result.as_deref(), Some("ok"));
    }

    #[tokio::test]
    async fn action_less_step_concludes_with_thought() {
        let provider = Arc::new(ScriptedProvider::replies(&[r#"{"thought":"nothing to do"}"#]));
        let handle = idle_handle();

        runner(provider).run(&handle, &[], None).await;
        let session = handle.snapshot();
        assert_eq!(session.status, AgentStatus::Completed);
        assert_eq!(session.result.as_deref(), Some("nothing to do"));
    }

    #[tokio::test]
    async fn custom_iteration_ceiling_is_honoured() {
        let provider = Arc::new(ScriptedProvider::always(
            r#"{"thought":"again","action":"web_search","actionInput":{"query":"q"}}"#,
        ));
        let handle = idle_handle();

        let summary = runner(provider.clone())
            .with_max_iterations(2)
            .run(&handle, &[], None)
            .await;

        assert_eq!(summary.iterations, 2);
        assert_eq!(provider.calls(), 2);
        assert_eq!(
            handle.snapshot().result.as_deref(),
            Some("Task limit reached. Partial result: again")
        );
    }

    #[tokio::test]
    async fn running_session_is_not_restarted() {
        let provider = Arc::new(ScriptedProvider::replies(&[]));
        let mut session = Session::new("g", "r");
        session.start().unwrap();
        let handle = SessionHandle::new(session);

        let summary = runner(provider.clone()).run(&handle, &[], None).await;
        assert_eq!(provider.calls(), 0);
        assert_eq!(summary.status, AgentStatus::Error);
    }

    #[test]
    fn final_answer_falls_back_to_thought() {
        let thought = "the thought";
        assert_eq!(final_answer(None, thought), thought);
        assert_eq!(final_answer(Some(&serde_json::json!({})), thought), thought);
        assert_eq!(final_answer(Some(&serde_json::json!({"answer": ""})), thought), thought);
        assert_eq!(final_answer(Some(&serde_json::json!({"answer": "x"})), thought), "x");
        assert_eq!(final_answer(Some(&serde_json::json!({"answer": 3})), thought), "3");
    }

    #[test]
    fn from_config_applies_agent_settings() {
        let mut config = codecouncil_config::AppConfig::default();
        config.agent.max_iterations = 3;
        let runner = AgentRunner::from_config(
            &config,
            Arc::new(ScriptedProvider::replies(&[])),
            Arc::new(ToolRegistry::new()),
        );
        assert_eq!(runner.max_iterations(), 3);
        assert_eq!(runner.client().model(), "gemini-2.5-flash");
        assert!(runner.tool_definitions().is_empty());
    }
}
