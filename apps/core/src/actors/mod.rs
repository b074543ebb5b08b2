//! Actor layer: the supervisor owning turn orchestration and the LLM actor
//! talking to the hosted completion API.

pub mod llm;
pub mod messages;
pub mod supervisor;
pub mod traits;
