use crate::actors::messages::{ActorError, AppError, LlmMessage};
use crate::actors::traits::LlmActor;
use crate::config::{LlmBackend, LlmConfig};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

/// A handle to the LLM actor.
///
/// This struct provides a public, cloneable interface for sending messages to the
/// running LLM actor. It abstracts away the `mpsc::Sender`.
#[derive(Clone)]
pub struct LlmActorHandle {
    sender: mpsc::Sender<LlmMessage>,
}

impl LlmActorHandle {
    /// Builds the HTTP client and spawns the `LlmActorRunner` in a new Tokio task.
    pub fn spawn(config: LlmConfig) -> Result<Self, AppError> {
        let client = LlmClient::new(config)?;
        let (sender, receiver) = mpsc::channel(32);
        let actor = LlmActorRunner { receiver, client };
        tokio::spawn(async move { actor.run().await });
        Ok(Self { sender })
    }
}

#[async_trait]
impl LlmActor for LlmActorHandle {
    async fn generate_with_params(
        &self,
        prompt: String,
        system_prompt: Option<String>,
        temperature: Option<f32>,
    ) -> Result<String, AppError> {
        let (send, recv) = oneshot::channel();
        let msg = LlmMessage::GenerateWithParams {
            prompt,
            system_prompt,
            temperature,
            responder: send,
        };

        self.sender
            .send(msg)
            .await
            .map_err(|e| ActorError::Internal(format!("LLM actor is gone: {}", e)))?;
        recv.await
            .map_err(|e| ActorError::Internal(format!("LLM actor dropped the request: {}", e)))?
    }
}

// --- Actor Runner (Internal Logic) ---
struct LlmActorRunner {
    receiver: mpsc::Receiver<LlmMessage>,
    client: LlmClient,
}

impl LlmActorRunner {
    async fn run(mut self) {
        info!("LlmActor started");
        while let Some(msg) = self.receiver.recv().await {
            self.handle_message(msg);
        }
        info!("LlmActor stopped");
    }

    /// Each request runs in its own task so slow completions for one session
    /// don't hold up the others.
    fn handle_message(&self, msg: LlmMessage) {
        match msg {
            LlmMessage::GenerateWithParams {
                prompt,
                system_prompt,
                temperature,
                responder,
            } => {
                let client = self.client.clone();
                tokio::spawn(async move {
                    let result = client.complete(&prompt, system_prompt, temperature).await;
                    let _ = responder.send(result);
                });
            }
        }
    }
}

/// Stateless client for OpenAI-compatible completion APIs.
#[derive(Clone)]
pub struct LlmClient {
    client: Client,
    config: LlmConfig,
}

impl LlmClient {
    pub fn new(config: LlmConfig) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { client, config })
    }

    /// Full endpoint URL for the configured backend. A base URL that already
    /// ends in `/v1` is not given a second one.
    pub fn endpoint(&self) -> String {
        let base = self.config.base_url.trim_end_matches('/');
        let base = base.strip_suffix("/v1").unwrap_or(base);
        match self.config.backend {
            LlmBackend::OpenAi => format!("{}/v1/chat/completions", base),
            LlmBackend::Completions => format!("{}/v1/completions", base),
        }
    }

    /// Request body. The system prompt appears exactly once: as the chat
    /// `system` message, or as a `System:` header on a plain completion prompt.
    pub fn payload(&self, prompt: &str, system_prompt: Option<String>, temperature: Option<f32>) -> Value {
        let temperature = temperature.unwrap_or(self.config.temperature);
        let system = system_prompt.unwrap_or_else(|| self.config.system_prompt.clone());
        let system = system.trim();
        match self.config.backend {
            LlmBackend::OpenAi => json!({
                "model": self.config.model,
                "messages": [
                    {"role": "system", "content": system},
                    {"role": "user", "content": prompt}
                ],
                "max_tokens": self.config.max_tokens,
                "temperature": temperature,
                "top_p": self.config.top_p,
            }),
            LlmBackend::Completions => json!({
                "prompt": with_system_header(system, prompt),
                "max_tokens": self.config.max_tokens,
                "temperature": temperature,
                "top_p": self.config.top_p,
            }),
        }
    }

    pub async fn complete(
        &self,
        prompt: &str,
        system_prompt: Option<String>,
        temperature: Option<f32>,
    ) -> Result<String, AppError> {
        let url = self.endpoint();
        debug!("LLM request to {} ({} prompt chars)", url, prompt.chars().count());

        let mut request = self
            .client
            .post(&url)
            .json(&self.payload(prompt, system_prompt, temperature));
        if !self.config.api_key.is_empty() {
            request = request.bearer_auth(&self.config.api_key);
        }

        let res = request.send().await?;
        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            warn!("LLM request failed with status {}", status);
            return Err(ActorError::LlmError(format!(
                "Completion request failed with status {}: {}",
                status, body
            ))
            .into());
        }

        let body: Value = res
            .json()
            .await
            .map_err(|e| ActorError::LlmError(format!("Response is not JSON: {}", e)))?;
        extract_text(&body, self.config.backend)
    }
}

fn with_system_header(system: &str, prompt: &str) -> String {
    if system.is_empty() {
        prompt.to_string()
    } else {
        format!("System: {}\n\n{}", system, prompt)
    }
}

/// Pulls the generated text out of a completion response.
pub fn extract_text(body: &Value, backend: LlmBackend) -> Result<String, AppError> {
    let choices = body
        .get("choices")
        .and_then(Value::as_array)
        .ok_or_else(|| ActorError::LlmError("Malformed response: 'choices' not found".to_string()))?;
    let first = choices
        .first()
        .ok_or_else(|| ActorError::LlmError("Malformed response: 'choices' is empty".to_string()))?;

    let text = match backend {
        LlmBackend::OpenAi => first.pointer("/message/content").and_then(Value::as_str),
        LlmBackend::Completions => first.get("text").and_then(Value::as_str),
    }
    .ok_or_else(|| ActorError::LlmError("Malformed response: no text in first choice".to_string()))?;

    let text = text.trim();
    if text.is_empty() {
        return Err(ActorError::LlmError("Empty completion".to_string()).into());
    }
    Ok(text.to_string())
}
