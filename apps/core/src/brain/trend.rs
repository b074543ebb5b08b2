//! Trend Tracker - per-session stress history and short-term direction.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::Mutex;

use super::assessment::Category;

pub const HISTORY_CAPACITY: usize = 10;
const RECENT_WINDOW: usize = 3;
const PREVIOUS_WINDOW: usize = 5;
const TREND_THRESHOLD: f32 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Improving,
    Worsening,
    Stable,
}

impl fmt::Display for Trend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Trend::Improving => write!(f, "improving"),
            Trend::Worsening => write!(f, "worsening"),
            Trend::Stable => write!(f, "stable"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub timestamp: DateTime<Utc>,
    pub stress_level: u8,
    pub category: Category,
}

impl HistoryEntry {
    pub fn new(stress_level: u8, category: Category) -> Self {
        Self {
            timestamp: Utc::now(),
            stress_level,
            category,
        }
    }
}

/// Bounded ring buffer; the oldest entry is evicted first.
#[derive(Debug, Clone, Default)]
pub struct StressHistory {
    entries: VecDeque<HistoryEntry>,
}

impl StressHistory {
    pub fn push(&mut self, entry: HistoryEntry) {
        if self.entries.len() == HISTORY_CAPACITY {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn levels(&self) -> Vec<u8> {
        self.entries.iter().map(|e| e.stress_level).collect()
    }

    pub fn entries(&self) -> Vec<HistoryEntry> {
        self.entries.iter().cloned().collect()
    }

    pub fn trend(&self) -> Trend {
        classify_trend(&self.levels())
    }
}

fn mean(levels: &[u8]) -> f32 {
    levels.iter().map(|l| f32::from(*l)).sum::<f32>() / levels.len() as f32
}

/// Compares the mean of the last few levels with the mean of the ones before.
pub fn classify_trend(levels: &[u8]) -> Trend {
    let n = levels.len();
    if n < 2 {
        // Not enough data to call a direction.
        return Trend::Stable;
    }

    let recent_len = RECENT_WINDOW.min(n - 1);
    let split = n - recent_len;
    let recent = &levels[split..];
    let previous = &levels[split.saturating_sub(PREVIOUS_WINDOW)..split];

    let delta = mean(recent) - mean(previous);
    if delta <= -TREND_THRESHOLD {
        Trend::Improving
    } else if delta >= TREND_THRESHOLD {
        Trend::Worsening
    } else {
        Trend::Stable
    }
}

/// Stress histories keyed by session id.
///
/// The lock is never held across an await point.
#[derive(Debug, Default)]
pub struct TrendTracker {
    sessions: Mutex<HashMap<String, StressHistory>>,
}

impl TrendTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a turn and returns the session's trend including it.
    pub fn record_and_classify(&self, session_id: &str, stress_level: u8, category: Category) -> Trend {
        let mut sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
        let history = sessions.entry(session_id.to_string()).or_default();
        history.push(HistoryEntry::new(stress_level, category));
        history.trend()
    }

    /// Replaces a session's history with previously persisted entries.
    pub fn seed(&self, session_id: &str, entries: Vec<HistoryEntry>) {
        let mut history = StressHistory::default();
        for entry in entries {
            history.push(entry);
        }
        let mut sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
        sessions.insert(session_id.to_string(), history);
    }

    pub fn history(&self, session_id: &str) -> Vec<HistoryEntry> {
        let sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
        sessions
            .get(session_id)
            .map(StressHistory::entries)
            .unwrap_or_default()
    }

    /// Drops a session's history entirely.
    pub fn clear(&self, session_id: &str) {
        let mut sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
        sessions.remove(session_id);
    }

    #[cfg(test)]
    pub fn session_count(&self) -> usize {
        self.sessions.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}
