//! Error types for the CodeCouncil domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error enum.

use thiserror::Error;

use crate::session::AgentStatus;

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("No credential available for provider '{0}'")]
    MissingCredential(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Tool execution failed: {tool_name} — {reason}")]
    ExecutionFailed { tool_name: String, reason: String },

    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),
}

/// Violations of the session state machine.
///
/// The agent loop is the only writer, so these indicate a bug rather than
/// a runtime condition; they are logged and never surfaced to pollers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("Illegal status transition {from} -> {to}")]
    InvalidTransition { from: AgentStatus, to: AgentStatus },

    #[error("Session is {status}; its steps are frozen")]
    Frozen { status: AgentStatus },

    #[error("No step at index {index} (session has {len})")]
    StepOutOfRange { index: usize, len: usize },
}

/// Requests rejected before a session is created.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InputError {
    #[error("Goal is required")]
    MissingGoal,

    #[error("An API credential is required: supply one or configure a default")]
    MissingCredential,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_error_displays_correctly() {
        let err = ProviderError::ApiError {
            status_code: 429,
            message: "Too many requests".into(),
        };
        assert!(err.to_string().contains("429"));
        assert!(err.to_string().contains("Too many requests"));
    }

    #[test]
    fn session_error_names_both_states() {
        let err = SessionError::InvalidTransition {
            from: AgentStatus::Completed,
            to: AgentStatus::Running,
        };
        let text = err.to_string();
        assert!(text.contains("COMPLETED"));
        assert!(text.contains("RUNNING"));
    }
}
