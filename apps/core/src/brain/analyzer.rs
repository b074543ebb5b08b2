//! Stress Analyzer - orchestrator for the brain module.
//!
//! Runs the scanner with the session's history, routes resources and records
//! the turn in the trend tracker. Everything here is synchronous and fast; it
//! runs before the LLM is called so the prompt can carry the assessment.

use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

use super::assessment::Assessment;
use super::lexicon::Lexicon;
use super::router::ResourceRouter;
use super::scanner::SignalScanner;
use super::trend::{HistoryEntry, Trend, TrendTracker};
use crate::error::AppError;
use crate::resources::{ResourceEntry, ResourceTables};

pub const LEXICON_FILE: &str = "lexicon.json";

/// Everything the analyzer knows about one turn.
#[derive(Debug, Clone, Serialize)]
pub struct StressReport {
    pub assessment: Assessment,
    pub resources: Vec<ResourceEntry>,
    pub trend: Trend,
    pub processing_time_ms: u64,
}

impl StressReport {
    /// Assessment summary plus trend, as handed to the LLM prompt.
    pub fn prompt_summary(&self) -> String {
        format!("{}, Trend: {}", self.assessment.summary(), self.trend)
    }
}

pub struct StressAnalyzer {
    scanner: SignalScanner,
    router: ResourceRouter,
    trends: TrendTracker,
}

impl StressAnalyzer {
    pub fn new(lexicon: Arc<Lexicon>, tables: Arc<ResourceTables>) -> Self {
        Self {
            scanner: SignalScanner::new(lexicon),
            router: ResourceRouter::new(tables),
            trends: TrendTracker::new(),
        }
    }

    /// Loads the lexicon and resource tables from `resources_dir`.
    pub fn load(resources_dir: &Path) -> Result<Self, AppError> {
        let lexicon = Lexicon::load(&resources_dir.join(LEXICON_FILE))?;
        let tables = ResourceTables::load(resources_dir)?;
        Ok(Self::new(Arc::new(lexicon), Arc::new(tables)))
    }

    /// Analyzes one message of `session_id` and records it in the session history.
    pub fn analyze(&self, session_id: &str, text: &str) -> StressReport {
        let start = Instant::now();

        let history = self.trends.history(session_id);
        let assessment = self.scanner.scan(text, &history);
        let resources = self.router.route(&assessment);
        let trend =
            self.trends
                .record_and_classify(session_id, assessment.stress_level, assessment.category);

        let report = StressReport {
            assessment,
            resources,
            trend,
            processing_time_ms: start.elapsed().as_millis() as u64,
        };

        if report.assessment.has_signal() {
            info!(
                session_id = %session_id,
                "Stress signal: {} -> {} resources",
                report.prompt_summary(),
                report.resources.len()
            );
        }
        report
    }

    /// Restores a session's history from persisted turns.
    pub fn seed_history(&self, session_id: &str, entries: Vec<HistoryEntry>) {
        self.trends.seed(session_id, entries);
    }

    /// Forgets a session's history.
    pub fn clear_history(&self, session_id: &str) {
        self.trends.clear(session_id);
    }
}
