//! # CodeCouncil Core
//!
//! Domain types, traits, and error definitions for the CodeCouncil agent
//! runtime. This crate has **no framework dependencies**: it defines the
//! model that the provider, tool, agent and gateway crates implement against.
//!
//! ## Layout
//!
//! - [`tool`]: the capability contract and the name-keyed registry
//! - [`provider`]: the model-generation contract and credentials
//! - [`session`]: sessions, steps and the status state machine
//! - [`error`]: one error enum per bounded context

pub mod error;
pub mod provider;
pub mod session;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use error::{InputError, ProviderError, SessionError, ToolError};
pub use provider::{Credential, GenerationRequest, GenerationResponse, Provider, Usage};
pub use session::{AgentStatus, ContextFile, Session, SessionId, Step, StepAction, StepOutcome};
pub use tool::{Tool, ToolDefinition, ToolRegistry, ToolResult};
