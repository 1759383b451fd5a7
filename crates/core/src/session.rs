//! Sessions, steps, and the agent status state machine.
//!
//! A [`Session`] is the record of one agent run. Its status only moves
//! forward (`IDLE → RUNNING → {COMPLETED | ERROR}`) and its step sequence
//! only grows while the run is live; both rules are enforced by the methods
//! here rather than by convention, so the record can be handed to pollers
//! as a plain snapshot.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::SessionError;

/// Unique, unguessable session identifier (random v4 UUID).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for SessionId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AgentStatus {
    /// Created, loop not yet iterating
    Idle,
    /// Loop actively iterating
    Running,
    /// Reserved for human-in-the-loop continuation. No transition produces it.
    WaitingForAction,
    /// A result was produced (possibly partial)
    Completed,
    /// An unrecoverable fault ended the run
    Error,
}

impl AgentStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Error | Self::WaitingForAction)
    }

    /// Whether the state machine permits `self → next`.
    pub fn can_transition_to(self, next: AgentStatus) -> bool {
        match (self, next) {
            (Self::Idle, Self::Running) => true,
            (Self::Running, next) => next.is_terminal(),
            _ => false,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "IDLE",
            Self::Running => "RUNNING",
            Self::WaitingForAction => "WAITING_FOR_ACTION",
            Self::Completed => "COMPLETED",
            Self::Error => "ERROR",
        }
    }
}

impl fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the model asked to do next, resolved against the tool registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepAction {
    /// The final-answer sentinel
    FinalAnswer,
    /// A registered tool
    Tool(String),
    /// A name that no registered tool answers to
    Unrecognized(String),
}

impl StepAction {
    /// The sentinel action name the model uses to conclude.
    pub const FINAL_ANSWER: &'static str = "FINAL_ANSWER";

    /// Resolve a raw action name. `is_registered` answers whether a tool
    /// with that name exists.
    pub fn resolve(name: &str, is_registered: impl Fn(&str) -> bool) -> Self {
        if name == Self::FINAL_ANSWER {
            Self::FinalAnswer
        } else if is_registered(name) {
            Self::Tool(name.to_string())
        } else {
            Self::Unrecognized(name.to_string())
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::FinalAnswer => Self::FINAL_ANSWER,
            Self::Tool(name) | Self::Unrecognized(name) => name,
        }
    }
}

impl fmt::Display for StepAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for StepAction {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// How the model reply behind a step was decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepOutcome {
    /// The reply decoded into thought/action/actionInput
    Structured,
    /// The reply could not be decoded; the step carries a diagnostic thought
    Malformed,
}

/// One iteration of the loop: thought, chosen action, and its observation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Step {
    pub thought: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<StepAction>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub action_input: Option<serde_json::Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub observation: Option<String>,

    pub outcome: StepOutcome,

    pub timestamp: DateTime<Utc>,
}

impl Step {
    pub fn structured(
        thought: impl Into<String>,
        action: Option<StepAction>,
        action_input: Option<serde_json::Value>,
    ) -> Self {
        Self {
            thought: thought.into(),
            action,
            action_input,
            observation: None,
            outcome: StepOutcome::Structured,
            timestamp: Utc::now(),
        }
    }

    /// A thought-only step standing in for a reply that failed to decode.
    pub fn malformed(diagnostic: impl Into<String>) -> Self {
        Self {
            thought: diagnostic.into(),
            action: None,
            action_input: None,
            observation: None,
            outcome: StepOutcome::Malformed,
            timestamp: Utc::now(),
        }
    }
}

/// An input artifact supplied by the caller. Never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "RawContextFile")]
pub struct ContextFile {
    pub name: String,
    pub content: String,
    /// Byte size as reported by the caller; derived from `content` if absent.
    pub size: usize,
}

/// Wire shape of [`ContextFile`], where `size` is optional.
#[derive(Deserialize)]
struct RawContextFile {
    name: String,
    content: String,
    #[serde(default)]
    size: Option<usize>,
}

impl From<RawContextFile> for ContextFile {
    fn from(raw: RawContextFile) -> Self {
        Self {
            size: raw.size.unwrap_or(raw.content.len()),
            name: raw.name,
            content: raw.content,
        }
    }
}

impl ContextFile {
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        let content = content.into();
        Self {
            name: name.into(),
            size: content.len(),
            content,
        }
    }
}

/// The record of one agent run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: SessionId,
    pub goal: String,
    pub role: String,
    pub status: AgentStatus,
    pub steps: Vec<Step>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    /// Model calls made so far.
    pub iterations: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    pub fn new(goal: impl Into<String>, role: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: SessionId::new(),
            goal: goal.into(),
            role: role.into(),
            status: AgentStatus::Idle,
            steps: Vec::new(),
            result: None,
            iterations: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    fn transition(&mut self, next: AgentStatus) -> Result<(), SessionError> {
        if !self.status.can_transition_to(next) {
            return Err(SessionError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        self.touch();
        Ok(())
    }

    fn ensure_running(&self) -> Result<(), SessionError> {
        if self.status == AgentStatus::Running {
            Ok(())
        } else {
            Err(SessionError::Frozen {
                status: self.status,
            })
        }
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// `IDLE → RUNNING`.
    pub fn start(&mut self) -> Result<(), SessionError> {
        self.transition(AgentStatus::Running)
    }

    /// Count one model call.
    pub fn record_iteration(&mut self) -> Result<u32, SessionError> {
        self.ensure_running()?;
        self.iterations += 1;
        self.touch();
        Ok(self.iterations)
    }

    /// Append a step; returns its index.
    pub fn push_step(&mut self, step: Step) -> Result<usize, SessionError> {
        self.ensure_running()?;
        self.steps.push(step);
        self.touch();
        Ok(self.steps.len() - 1)
    }

    /// Attach the observation produced for step `index`.
    pub fn observe(&mut self, index: usize, observation: impl Into<String>) -> Result<(), SessionError> {
        self.ensure_running()?;
        let len = self.steps.len();
        let step = self
            .steps
            .get_mut(index)
            .ok_or(SessionError::StepOutOfRange { index, len })?;
        step.observation = Some(observation.into());
        self.touch();
        Ok(())
    }

    /// `RUNNING → COMPLETED` with a result.
    pub fn complete(&mut self, result: impl Into<String>) -> Result<(), SessionError> {
        self.transition(AgentStatus::Completed)?;
        self.result = Some(result.into());
        Ok(())
    }

    /// `RUNNING → ERROR` with a message.
    pub fn fail(&mut self, message: impl Into<String>) -> Result<(), SessionError> {
        self.transition(AgentStatus::Error)?;
        self.result = Some(message.into());
        Ok(())
    }

    pub fn last_thought(&self) -> Option<&str> {
        self.steps.last().map(|s| s.thought.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn running() -> Session {
        let mut session = Session::new("audit the repo", "Architect");
        session.start().unwrap();
        session
    }

    #[test]
    fn new_session_is_idle_and_empty() {
        let session = Session::new("goal", "role");
        assert_eq!(session.status, AgentStatus::Idle);
        assert!(session.steps.is_empty());
        assert!(session.result.is_none());
        assert_eq!(session.iterations, 0);
    }

    #[test]
    fn session_ids_are_unique_and_parse_back() {
        let a = SessionId::new();
        let b = SessionId::new();
        assert_ne!(a, b);
        assert_eq!(a.to_string().parse::<SessionId>().unwrap(), a);
        assert!("not-a-uuid".parse::<SessionId>().is_err());
    }

    #[test]
    fn status_only_moves_forward() {
        let mut session = running();
        session.complete("done").unwrap();
        assert_eq!(session.status, AgentStatus::Completed);

        assert!(session.start().is_err());
        assert!(session.fail("late").is_err());
        assert_eq!(session.result.as_deref(), Some("done"));
    }

    #[test]
    fn idle_cannot_skip_to_terminal() {
        let mut session = Session::new("g", "r");
        let err = session.complete("x").unwrap_err();
        assert_eq!(
            err,
            SessionError::InvalidTransition {
                from: AgentStatus::Idle,
                to: AgentStatus::Completed
            }
        );
    }

    #[test]
    fn steps_freeze_once_terminal() {
        let mut session = running();
        let index = session.push_step(Step::structured("t", None, None)).unwrap();
        session.fail("Error: boom").unwrap();

        assert!(matches!(
            session.push_step(Step::structured("late", None, None)),
            Err(SessionError::Frozen { .. })
        ));
        assert!(session.observe(index, "late observation").is_err());
        assert_eq!(session.steps.len(), 1);
        assert!(session.steps[0].observation.is_none());
    }

    #[test]
    fn observe_rejects_unknown_index() {
        let mut session = running();
        assert_eq!(
            session.observe(3, "x").unwrap_err(),
            SessionError::StepOutOfRange { index: 3, len: 0 }
        );
    }

    #[test]
    fn waiting_for_action_is_terminal() {
        assert!(AgentStatus::WaitingForAction.is_terminal());
        assert!(!AgentStatus::WaitingForAction.can_transition_to(AgentStatus::Running));
    }

    #[test]
    fn action_resolution() {
        let registered = |name: &str| name == "web_search";
        assert_eq!(StepAction::resolve("FINAL_ANSWER", registered), StepAction::FinalAnswer);
        assert_eq!(
            StepAction::resolve("web_search", registered),
            StepAction::Tool("web_search".into())
        );
        assert_eq!(
            StepAction::resolve("teleport", registered),
            StepAction::Unrecognized("teleport".into())
        );
    }

    #[test]
    fn session_serializes_camel_case_with_plain_actions() {
        let mut session = running();
        session
            .push_step(Step::structured(
                "look it up",
                Some(StepAction::Tool("web_search".into())),
                Some(serde_json::json!({"query": "rust"})),
            ))
            .unwrap();

        let json = serde_json::to_value(&session).unwrap();
        assert_eq!(json["status"], "RUNNING");
        assert_eq!(json["steps"][0]["action"], "web_search");
        assert_eq!(json["steps"][0]["actionInput"]["query"], "rust");
        assert_eq!(json["steps"][0]["outcome"], "structured");
        assert!(json.get("createdAt").is_some());
        assert!(json.get("result").is_none());
    }

    #[test]
    fn context_file_derives_size() {
        let file = ContextFile::new("main.rs", "fn main() {}");
        assert_eq!(file.size, 12);
    }

    #[test]
    fn deserialized_context_file_fills_missing_size() {
        let file: ContextFile =
            serde_json::from_str(r#"{"name":"a.ts","content":"export {}"}"#).unwrap();
        assert_eq!(file.size, 9);

        let file: ContextFile =
            serde_json::from_str(r#"{"name":"a.ts","content":"x","size":4096}"#).unwrap();
        assert_eq!(file.size, 4096);
    }
}
