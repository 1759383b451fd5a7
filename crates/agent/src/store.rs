//! Session store — owns every session record and launches their runs.
//!
//! Each session lives behind its own lock so one run's writes never block
//! another session's readers. The map itself is locked only to insert,
//! look up, or evict a handle.

use codecouncil_core::error::InputError;
use codecouncil_core::provider::Credential;
use codecouncil_core::session::{ContextFile, Session, SessionId};
use codecouncil_core::tool::ToolDefinition;
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard};
use tracing::{Instrument, debug, info, info_span, warn};

use crate::loop_runner::AgentRunner;

/// Default role when the caller supplies none.
pub const DEFAULT_ROLE: &str = "Assistant";

/// Default cap on retained sessions.
pub const DEFAULT_MAX_SESSIONS: usize = 1000;

/// Shared handle to one session record.
///
/// The loop driving the session is its only writer; readers take cloned
/// snapshots.
#[derive(Clone)]
pub struct SessionHandle {
    id: SessionId,
    inner: Arc<RwLock<Session>>,
}

impl SessionHandle {
    pub fn new(session: Session) -> Self {
        Self {
            id: session.id,
            inner: Arc::new(RwLock::new(session)),
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    fn read(&self) -> RwLockReadGuard<'_, Session> {
        self.inner
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// A point-in-time copy of the session.
    pub fn snapshot(&self) -> Session {
        self.read().clone()
    }

    /// Apply `f` under the write lock.
    pub fn update<T>(&self, f: impl FnOnce(&mut Session) -> T) -> T {
        let mut guard = self
            .inner
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut guard)
    }
}

impl std::fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandle").field("id", &self.id).finish()
    }
}

/// In-memory registry of sessions plus the runner that drives them.
pub struct SessionStore {
    sessions: RwLock<HashMap<SessionId, SessionHandle>>,
    runner: Arc<AgentRunner>,
    default_role: String,
    max_sessions: usize,
}

impl SessionStore {
    pub fn new(runner: AgentRunner) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            runner: Arc::new(runner),
            default_role: DEFAULT_ROLE.to_string(),
            max_sessions: DEFAULT_MAX_SESSIONS,
        }
    }

    /// Build a store from the agent section of `config`.
    pub fn from_config(config: &codecouncil_config::AppConfig, runner: AgentRunner) -> Self {
        Self::new(runner)
            .with_default_role(config.agent.default_role.clone())
            .with_max_sessions(config.agent.max_sessions)
    }

    pub fn with_default_role(mut self, role: impl Into<String>) -> Self {
        self.default_role = role.into();
        self
    }

    pub fn with_max_sessions(mut self, max: usize) -> Self {
        self.max_sessions = max.max(1);
        self
    }

    /// Create a session and start its run in the background.
    ///
    /// Returns the snapshot taken before the run begins, so its status is
    /// `IDLE`. Must be called from within a Tokio runtime.
    pub fn start_agent(
        &self,
        goal: &str,
        role: Option<&str>,
        files: Vec<ContextFile>,
        credential: Option<Credential>,
    ) -> Result<Session, InputError> {
        let goal = goal.trim();
        if goal.is_empty() {
            return Err(InputError::MissingGoal);
        }
        if !self.runner.client().can_authenticate(credential.as_ref()) {
            return Err(InputError::MissingCredential);
        }

        let role = role
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .unwrap_or(self.default_role.as_str());

        let session = Session::new(goal, role);
        let snapshot = session.clone();
        let handle = SessionHandle::new(session);
        self.insert(handle.clone());

        info!(
            session_id = %snapshot.id,
            role = %snapshot.role,
            files = files.len(),
            "Session created"
        );

        let runner = Arc::clone(&self.runner);
        let span = info_span!("agent_run", session_id = %snapshot.id);
        tokio::spawn(
            async move {
                runner.run(&handle, &files, credential.as_ref()).await;
            }
            .instrument(span),
        );

        Ok(snapshot)
    }

    /// Snapshot of the session with `id`, if one was ever issued and is
    /// still retained.
    pub fn get_session(&self, id: &SessionId) -> Option<Session> {
        let handle = self.read_map().get(id).cloned()?;
        Some(handle.snapshot())
    }

    pub fn len(&self) -> usize {
        self.read_map().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read_map().is_empty()
    }

    pub fn tool_definitions(&self) -> Vec<ToolDefinition> {
        self.runner.tool_definitions()
    }

    fn read_map(&self) -> RwLockReadGuard<'_, HashMap<SessionId, SessionHandle>> {
        self.sessions
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn insert(&self, handle: SessionHandle) {
        let mut sessions = self
            .sessions
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if sessions.len() >= self.max_sessions {
            let oldest_terminal = sessions
                .values()
                .filter_map(|h| {
                    let session = h.read();
                    session.is_terminal().then_some((session.updated_at, h.id))
                })
                .min_by_key(|(updated_at, _)| *updated_at)
                .map(|(_, id)| id);

            match oldest_terminal {
                Some(id) => {
                    sessions.remove(&id);
                    debug!(session_id = %id, "Evicted oldest finished session");
                }
                None => warn!(
                    retained = sessions.len(),
                    max_sessions = self.max_sessions,
                    "Session store is full of running sessions; growing past the cap"
                ),
            }
        }

        sessions.insert(handle.id(), handle);
    }
}
