//! The autonomous audit agent — the heart of CodeCouncil.
//!
//! The agent follows a **Thought → Action → Observation** cycle:
//!
//! 1. **Build a prompt** from the session's role, goal, tools, files and history
//! 2. **Ask the model** for one JSON step (`thought`, `action`, `actionInput`)
//! 3. **Parse** the reply into a step and append it to the session
//! 4. **If a tool was named**: run it, record the observation, loop back to 1
//! 5. **If `FINAL_ANSWER` or no action**: record the result and stop
//!
//! A run stops after a fixed number of model calls with a partial result.
//! Sessions live in a [`SessionStore`], which starts runs in the background
//! and serves read-only snapshots to pollers.

pub mod client;
pub mod loop_runner;
pub mod parser;
pub mod prompt;
pub mod store;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use client::ModelClient;
pub use loop_runner::{AgentRunner, RunSummary};
pub use parser::parse_response;
pub use prompt::PromptBuilder;
pub use store::{SessionHandle, SessionStore};
