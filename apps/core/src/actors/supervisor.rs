use crate::actors::llm::LlmActorHandle;
use crate::actors::messages::{ActorError, AppError, SupervisorMessage};
use crate::actors::traits::{LlmActor, TurnSink};
use crate::brain::trend::HISTORY_CAPACITY;
use crate::brain::{StressAnalyzer, StressReport};
use crate::character::CharacterCard;
use crate::composer::{compose, FALLBACK_REPLY};
use crate::config::AppConfig;
use crate::models::{Exchange, UserTurn};
use crate::prompt::{build_prompt, PromptContext, MAX_CONTEXT_EXCHANGES};
use crate::turn_log::{StressStatistics, TurnLog, TurnRecord};
use chrono::Local;
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, oneshot, Mutex as AsyncMutex};
use tokio::time::{timeout, Duration};
use tracing::{error, info, instrument, warn};
use validator::Validate;

/// Extra time the handle waits on top of the LLM timeout before giving up on a turn.
const TURN_TIMEOUT_MARGIN: Duration = Duration::from_secs(30);
const STATISTICS_TIMEOUT: Duration = Duration::from_secs(30);

/// Everything produced by one turn.
#[derive(Debug, Clone, Serialize)]
pub struct TurnOutcome {
    pub session_id: String,
    /// Final text for the user: crisis banner, reply and resources.
    pub text: String,
    /// The LLM reply alone, or the fallback.
    pub reply: String,
    pub report: StressReport,
    pub used_fallback: bool,
    /// False when the turn could not be written to the log.
    pub persisted: bool,
}

/// Settings the companion needs on every turn.
#[derive(Debug, Clone)]
pub struct CompanionSettings {
    pub user_name: String,
    pub system_prompt: String,
    pub instruction_prompt: String,
    pub llm_timeout: Duration,
}

impl CompanionSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            user_name: config.user_name.clone(),
            system_prompt: config.llm.system_prompt.clone(),
            instruction_prompt: config.llm.instruction_prompt.clone(),
            llm_timeout: Duration::from_secs(config.llm.timeout_secs),
        }
    }
}

#[derive(Debug, Default)]
struct SessionContext {
    /// Set once the session has been restored from the turn log.
    seeded: bool,
    exchanges: VecDeque<Exchange>,
}

/// Turn handling for all sessions.
///
/// Shared state (lexicon, resources, character) is read-only. Each session has
/// its own async lock, held for the whole turn, so turns of one session are
/// strictly ordered while different sessions proceed in parallel.
pub struct Companion<L, S>
where
    L: LlmActor,
    S: TurnSink,
{
    analyzer: StressAnalyzer,
    character: CharacterCard,
    llm: Arc<L>,
    sink: Arc<S>,
    settings: CompanionSettings,
    sessions: Mutex<HashMap<String, Arc<AsyncMutex<SessionContext>>>>,
}

impl<L, S> Companion<L, S>
where
    L: LlmActor,
    S: TurnSink,
{
    pub fn new(
        analyzer: StressAnalyzer,
        character: CharacterCard,
        llm: Arc<L>,
        sink: Arc<S>,
        settings: CompanionSettings,
    ) -> Self {
        Self {
            analyzer,
            character,
            llm,
            sink,
            settings,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    fn session(&self, session_id: &str) -> Arc<AsyncMutex<SessionContext>> {
        let mut sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
        sessions
            .entry(session_id.to_string())
            .or_default()
            .clone()
    }

    /// Restores stress history and recent exchanges from the turn log.
    async fn seed(&self, session_id: &str, ctx: &mut SessionContext) {
        match self.sink.session_records(session_id, HISTORY_CAPACITY).await {
            Ok(records) => {
                if !records.is_empty() {
                    info!(
                        "Restored {} previous turns for session {}",
                        records.len(),
                        session_id
                    );
                }
                self.analyzer
                    .seed_history(session_id, records.iter().map(TurnRecord::history_entry).collect());
                let skip = records.len().saturating_sub(MAX_CONTEXT_EXCHANGES);
                ctx.exchanges = records[skip..].iter().map(TurnRecord::exchange).collect();
            }
            Err(e) => warn!("Could not restore session {}: {}", session_id, e),
        }
        ctx.seeded = true;
    }

    async fn generate_reply(&self, prompt: String) -> (String, bool) {
        let request = self.llm.generate_with_params(
            prompt,
            Some(self.settings.system_prompt.clone()),
            None,
        );
        match timeout(self.settings.llm_timeout, request).await {
            Ok(Ok(reply)) => (reply, false),
            Ok(Err(e)) => {
                warn!("LLM unavailable, using fallback reply: {}", e);
                (FALLBACK_REPLY.to_string(), true)
            }
            Err(_) => {
                warn!(
                    "LLM did not answer within {}s, using fallback reply",
                    self.settings.llm_timeout.as_secs()
                );
                (FALLBACK_REPLY.to_string(), true)
            }
        }
    }

    /// Runs one turn: validate, analyze, prompt, generate, compose, persist.
    #[instrument(skip(self, content))]
    pub async fn handle_turn(&self, session_id: &str, content: &str) -> Result<TurnOutcome, AppError> {
        UserTurn::new(session_id, content).validate()?;

        let session = self.session(session_id);
        let mut ctx = session.lock().await;
        if !ctx.seeded {
            self.seed(session_id, &mut ctx).await;
        }

        let report = self.analyzer.analyze(session_id, content);

        let history: Vec<Exchange> = ctx.exchanges.iter().cloned().collect();
        let prompt = build_prompt(
            &PromptContext {
                instruction_prompt: &self.settings.instruction_prompt,
                user_name: &self.settings.user_name,
                character: &self.character,
                history: &history,
                report: Some(&report),
                now: Local::now(),
            },
            content,
        );

        let (reply, used_fallback) = self.generate_reply(prompt).await;
        let text = compose(&reply, &report.assessment, &report.resources);

        let record = TurnRecord::new(session_id, content, &reply, &report.assessment);
        let persisted = match self.sink.append(&record).await {
            Ok(()) => true,
            Err(e) => {
                error!("Failed to persist turn for session {}: {}", session_id, e);
                false
            }
        };

        ctx.exchanges.push_back(record.exchange());
        while ctx.exchanges.len() > MAX_CONTEXT_EXCHANGES {
            ctx.exchanges.pop_front();
        }

        Ok(TurnOutcome {
            session_id: session_id.to_string(),
            text,
            reply,
            report,
            used_fallback,
            persisted,
        })
    }

    pub async fn statistics(&self) -> Result<StressStatistics, AppError> {
        self.sink.statistics().await
    }

    /// Drops the in-memory state of a session once its current turn, if any,
    /// has finished. The turn log keeps the history, so a later turn of the
    /// same session restores it.
    pub async fn end_session(&self, session_id: &str) {
        let session = self
            .sessions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(session_id)
            .cloned();
        let Some(session) = session else {
            return;
        };

        let mut ctx = session.lock().await;
        // A turn already waiting on this context re-seeds instead of reusing it.
        ctx.seeded = false;
        ctx.exchanges.clear();
        self.analyzer.clear_history(session_id);

        let mut sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
        if sessions
            .get(session_id)
            .is_some_and(|current| Arc::ptr_eq(current, &session))
        {
            sessions.remove(session_id);
        }
        info!("Session {} ended", session_id);
    }

    #[cfg(test)]
    pub fn session_count(&self) -> usize {
        self.sessions.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

/// A handle to the supervisor actor.
///
/// This is the primary entry point for all business logic in the application.
#[derive(Clone)]
pub struct SupervisorHandle {
    sender: mpsc::Sender<SupervisorMessage>,
    turn_timeout: Duration,
}

impl SupervisorHandle {
    /// Spawns the supervisor runner around `companion` and returns a handle to it.
    pub fn spawn<L, S>(companion: Companion<L, S>) -> Self
    where
        L: LlmActor,
        S: TurnSink,
    {
        let turn_timeout = companion.settings.llm_timeout + TURN_TIMEOUT_MARGIN;
        let (sender, receiver) = mpsc::channel(32);
        let runner = SupervisorRunner {
            receiver,
            companion: Arc::new(companion),
        };
        tokio::spawn(async move { runner.run().await });
        Self {
            sender,
            turn_timeout,
        }
    }

    /// Production wiring: hosted LLM and the JSON-lines turn log.
    pub fn start(
        config: &AppConfig,
        analyzer: StressAnalyzer,
        character: CharacterCard,
    ) -> Result<Self, AppError> {
        let llm = Arc::new(LlmActorHandle::spawn(config.llm.clone())?);
        let sink = Arc::new(TurnLog::in_dir(&config.memory_dir));
        let companion = Companion::new(
            analyzer,
            character,
            llm,
            sink,
            CompanionSettings::from_config(config),
        );
        Ok(Self::spawn(companion))
    }

    /// Processes a user message from a specific session.
    #[instrument(skip(self, content))]
    pub async fn process_message(
        &self,
        session_id: String,
        content: String,
    ) -> Result<TurnOutcome, AppError> {
        let (send, recv) = oneshot::channel();
        let msg = SupervisorMessage::ProcessUserMessage {
            session_id,
            content,
            responder: send,
        };
        self.sender
            .send(msg)
            .await
            .map_err(|e| ActorError::Internal(format!("Supervisor is gone: {}", e)))?;
        timeout(self.turn_timeout, recv)
            .await?
            .map_err(|e| ActorError::Internal(format!("Supervisor dropped the turn: {}", e)))?
    }

    #[instrument(skip(self))]
    pub async fn statistics(&self) -> Result<StressStatistics, AppError> {
        let (send, recv) = oneshot::channel();
        self.sender
            .send(SupervisorMessage::Statistics { responder: send })
            .await
            .map_err(|e| ActorError::Internal(format!("Supervisor is gone: {}", e)))?;
        timeout(STATISTICS_TIMEOUT, recv)
            .await?
            .map_err(|e| ActorError::Internal(format!("Supervisor dropped the request: {}", e)))?
    }

    /// Ends a session, waiting for its in-flight turn to finish first.
    #[instrument(skip(self))]
    pub async fn end_session(&self, session_id: String) -> Result<(), AppError> {
        let (send, recv) = oneshot::channel();
        self.sender
            .send(SupervisorMessage::EndSession {
                session_id,
                responder: send,
            })
            .await
            .map_err(|e| ActorError::Internal(format!("Supervisor is gone: {}", e)))?;
        timeout(self.turn_timeout, recv)
            .await?
            .map_err(|e| ActorError::Internal(format!("Supervisor dropped the request: {}", e)))?;
        Ok(())
    }

    pub async fn shutdown(&self) {
        let _ = self.sender.send(SupervisorMessage::Shutdown).await;
    }
}

// --- Actor Runner ---
struct SupervisorRunner<L, S>
where
    L: LlmActor,
    S: TurnSink,
{
    receiver: mpsc::Receiver<SupervisorMessage>,
    companion: Arc<Companion<L, S>>,
}

impl<L, S> SupervisorRunner<L, S>
where
    L: LlmActor,
    S: TurnSink,
{
    async fn run(mut self) {
        info!("Supervisor started");
        while let Some(msg) = self.receiver.recv().await {
            if matches!(msg, SupervisorMessage::Shutdown) {
                info!("Supervisor shutting down...");
                break;
            }
            self.handle_message(msg);
        }
        info!("Supervisor stopped");
    }

    /// One task per request; the loop never waits on a turn.
    fn handle_message(&self, msg: SupervisorMessage) {
        let companion = Arc::clone(&self.companion);
        match msg {
            SupervisorMessage::ProcessUserMessage {
                session_id,
                content,
                responder,
            } => {
                tokio::spawn(async move {
                    let result = companion.handle_turn(&session_id, &content).await;
                    if let Err(e) = &result {
                        error!("Error processing user message: {}", e);
                    }
                    let _ = responder.send(result);
                });
            }
            SupervisorMessage::Statistics { responder } => {
                tokio::spawn(async move {
                    let _ = responder.send(companion.statistics().await);
                });
            }
            SupervisorMessage::EndSession {
                session_id,
                responder,
            } => {
                tokio::spawn(async move {
                    companion.end_session(&session_id).await;
                    let _ = responder.send(());
                });
            }
            SupervisorMessage::Shutdown => {}
        }
    }
}
