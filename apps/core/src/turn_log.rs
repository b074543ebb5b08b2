//! Turn Log
//!
//! Append-only JSON-lines record of every turn, one object per line. The file
//! is read back only to seed a session's stress history and conversation
//! context, and to compute statistics. Reads are best-effort: a missing file is
//! an empty log and lines that fail to parse are skipped with a warning.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::actors::traits::TurnSink;
use crate::brain::{Assessment, Category, HistoryEntry};
use crate::error::AppError;
use crate::models::Exchange;

/// Name of the turn log inside the memory directory
pub const TURN_LOG_FILENAME: &str = "turns.jsonl";

/// Levels kept in `StressStatistics::recent_levels`
const RECENT_LEVELS: usize = 10;

/// One persisted turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnRecord {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub session_id: String,
    pub input: String,
    pub output: String,
    pub stress_level: u8,
    pub category: Category,
    pub is_crisis: bool,
}

impl TurnRecord {
    pub fn new(session_id: &str, input: &str, output: &str, assessment: &Assessment) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            session_id: session_id.to_string(),
            input: input.to_string(),
            output: output.to_string(),
            stress_level: assessment.stress_level,
            category: assessment.category,
            is_crisis: assessment.is_crisis,
        }
    }

    pub fn history_entry(&self) -> HistoryEntry {
        HistoryEntry {
            timestamp: self.timestamp,
            stress_level: self.stress_level,
            category: self.category,
        }
    }

    pub fn exchange(&self) -> Exchange {
        Exchange {
            timestamp: self.timestamp,
            user: self.input.clone(),
            reply: self.output.clone(),
        }
    }
}

/// Aggregates over the whole log.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StressStatistics {
    pub total_turns: usize,
    pub crisis_turns: usize,
    pub average_stress: f32,
    pub by_category: BTreeMap<Category, usize>,
    /// Oldest first.
    pub recent_levels: Vec<u8>,
}

impl StressStatistics {
    pub fn from_records(records: &[TurnRecord]) -> Self {
        if records.is_empty() {
            return Self::default();
        }

        let mut by_category = BTreeMap::new();
        for record in records {
            *by_category.entry(record.category).or_insert(0) += 1;
        }

        let total: u32 = records.iter().map(|r| u32::from(r.stress_level)).sum();
        let skip = records.len().saturating_sub(RECENT_LEVELS);

        Self {
            total_turns: records.len(),
            crisis_turns: records.iter().filter(|r| r.is_crisis).count(),
            average_stress: total as f32 / records.len() as f32,
            by_category,
            recent_levels: records[skip..].iter().map(|r| r.stress_level).collect(),
        }
    }

    /// Multi-line text for the CLI `stats` command.
    pub fn render(&self) -> String {
        if self.total_turns == 0 {
            return "No conversations recorded yet.".to_string();
        }
        let categories = self
            .by_category
            .iter()
            .map(|(category, count)| format!("{}: {}", category, count))
            .collect::<Vec<_>>()
            .join(", ");
        let recent = self
            .recent_levels
            .iter()
            .map(u8::to_string)
            .collect::<Vec<_>>()
            .join(" ");
        format!(
            "Turns: {}\nCrisis turns: {}\nAverage stress: {:.1}/10\nBy category: {}\nRecent levels: {}",
            self.total_turns, self.crisis_turns, self.average_stress, categories, recent
        )
    }
}

/// JSON-lines turn log on disk.
pub struct TurnLog {
    path: PathBuf,
    /// Serializes appends so lines from concurrent turns never interleave.
    write_lock: Mutex<()>,
}

impl TurnLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Log at `<dir>/turns.jsonl`.
    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join(TURN_LOG_FILENAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn append(&self, record: &TurnRecord) -> Result<(), AppError> {
        let mut line = serde_json::to_string(record)
            .map_err(|e| AppError::Persistence(format!("Failed to serialize turn: {}", e)))?;
        line.push('\n');

        let _guard = self.write_lock.lock().await;
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| {
                AppError::Persistence(format!("Cannot create {}: {}", parent.display(), e))
            })?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| AppError::Persistence(format!("Cannot open {}: {}", self.path.display(), e)))?;
        file.write_all(line.as_bytes())
            .await
            .map_err(|e| AppError::Persistence(format!("Write to {} failed: {}", self.path.display(), e)))?;
        file.flush()
            .await
            .map_err(|e| AppError::Persistence(format!("Flush of {} failed: {}", self.path.display(), e)))?;

        debug!("Turn {} appended to {:?}", record.id, self.path);
        Ok(())
    }

    /// Every readable record in file order.
    pub async fn read_all(&self) -> Result<Vec<TurnRecord>, AppError> {
        let raw = match fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(AppError::Persistence(format!(
                    "Cannot read {}: {}",
                    self.path.display(),
                    e
                )))
            }
        };

        let mut records = Vec::new();
        for (number, line) in raw.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            match serde_json::from_str::<TurnRecord>(trimmed) {
                Ok(record) => records.push(record),
                Err(e) => warn!(
                    "Skipping corrupt turn log line {} in {:?}: {}",
                    number + 1,
                    self.path,
                    e
                ),
            }
        }
        Ok(records)
    }

    /// The last `limit` records of one session, oldest first.
    pub async fn session_records(&self, session_id: &str, limit: usize) -> Result<Vec<TurnRecord>, AppError> {
        let mut records: Vec<TurnRecord> = self
            .read_all()
            .await?
            .into_iter()
            .filter(|r| r.session_id == session_id)
            .collect();
        let skip = records.len().saturating_sub(limit);
        Ok(records.split_off(skip))
    }

    pub async fn statistics(&self) -> Result<StressStatistics, AppError> {
        Ok(StressStatistics::from_records(&self.read_all().await?))
    }
}

#[async_trait]
impl TurnSink for TurnLog {
    async fn append(&self, record: &TurnRecord) -> Result<(), AppError> {
        TurnLog::append(self, record).await
    }

    async fn session_records(&self, session_id: &str, limit: usize) -> Result<Vec<TurnRecord>, AppError> {
        TurnLog::session_records(self, session_id, limit).await
    }

    async fn statistics(&self) -> Result<StressStatistics, AppError> {
        TurnLog::statistics(self).await
    }
}
