use serde::Serialize;
use tokio::sync::oneshot;

use crate::actors::supervisor::TurnOutcome;
use crate::turn_log::StressStatistics;

/// Defines errors that can occur within the actor system.
#[derive(Debug, thiserror::Error, Serialize, Clone)]
pub enum ActorError {
    /// An error originating from the LLM backend (network, rate limit, bad payload).
    #[error("LLM request failed: {0}")]
    LlmError(String),
    /// A generic internal error within an actor.
    #[error("Internal system error: {0}")]
    Internal(String),
    /// An error indicating that an actor operation timed out.
    #[error("Operation timed out: {0}")]
    Timeout(String),
}

impl From<tokio::time::error::Elapsed> for ActorError {
    fn from(err: tokio::time::error::Elapsed) -> Self {
        ActorError::Timeout(format!("Actor operation timed out: {}", err))
    }
}

// Re-export AppError for convenience
pub use crate::error::AppError;

/// Messages that can be sent to the LLM actor.
#[derive(Debug)]
pub enum LlmMessage {
    /// A request for one completion.
    GenerateWithParams {
        prompt: String,
        /// Overrides the configured system prompt.
        system_prompt: Option<String>,
        /// Overrides the configured temperature.
        temperature: Option<f32>,
        responder: oneshot::Sender<Result<String, AppError>>,
    },
}

/// Messages that can be sent to the `SupervisorActor`.
#[derive(Debug)]
pub enum SupervisorMessage {
    /// A request to process a user's message from a specific session.
    ProcessUserMessage {
        session_id: String,
        content: String,
        /// A channel to send the composed turn back.
        responder: oneshot::Sender<Result<TurnOutcome, AppError>>,
    },
    /// A request for aggregate statistics over the turn log.
    Statistics {
        responder: oneshot::Sender<Result<StressStatistics, AppError>>,
    },
    /// A request to drop a session's in-memory state.
    EndSession {
        session_id: String,
        responder: oneshot::Sender<()>,
    },
    /// A command to stop the supervisor loop.
    Shutdown,
}
