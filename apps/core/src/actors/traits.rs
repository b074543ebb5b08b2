use crate::actors::messages::AppError;
use crate::turn_log::{StressStatistics, TurnRecord};
use async_trait::async_trait;

/// Defines the public interface for an LLM (Large Language Model) backend.
///
/// This trait abstracts the specific implementation of the LLM, allowing a hosted
/// OpenAI-compatible API or a test double to be used interchangeably.
#[async_trait]
pub trait LlmActor: Send + Sync + 'static {
    /// Generates a complete text response based on a prompt and optional parameters.
    async fn generate_with_params(
        &self,
        prompt: String,
        system_prompt: Option<String>,
        temperature: Option<f32>,
    ) -> Result<String, AppError>;
}

/// Where completed turns are recorded and read back from.
#[async_trait]
pub trait TurnSink: Send + Sync + 'static {
    /// Appends one turn. Failures are reported but never block the reply.
    async fn append(&self, record: &TurnRecord) -> Result<(), AppError>;

    /// The last `limit` turns of a session, oldest first.
    async fn session_records(&self, session_id: &str, limit: usize) -> Result<Vec<TurnRecord>, AppError>;

    async fn statistics(&self) -> Result<StressStatistics, AppError>;
}
