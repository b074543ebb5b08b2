//! Preflight Check System
//!
//! Loads and verifies every static asset before the REPL starts. Malformed
//! lexicon, resource or character data is fatal; a missing API key or an
//! unreadable turn log only produces warnings.

use crate::brain::analyzer::LEXICON_FILE;
use crate::brain::{Lexicon, StressAnalyzer};
use crate::character::CharacterCard;
use crate::config::{AppConfig, LlmBackend};
use crate::resources::ResourceTables;
use crate::turn_log::TurnLog;
use serde::{Deserialize, Serialize};
use std::fs;
use std::sync::Arc;
use tracing::{info, warn};

/// Result of a single check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckResult {
    pub name: String,
    pub passed: bool,
    pub message: String,
    pub details: Option<String>,
}

impl CheckResult {
    fn pass(name: &str, message: &str) -> Self {
        Self {
            name: name.to_string(),
            passed: true,
            message: message.to_string(),
            details: None,
        }
    }

    fn fail(name: &str, message: &str, details: Option<String>) -> Self {
        Self {
            name: name.to_string(),
            passed: false,
            message: message.to_string(),
            details,
        }
    }
}

/// Complete preflight check report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreflightReport {
    pub all_passed: bool,
    pub checks: Vec<CheckResult>,
    pub ready_to_start: bool,
    pub summary: String,
}

impl PreflightReport {
    /// The first failed critical check, if any.
    pub fn first_critical_failure(&self) -> Option<&CheckResult> {
        self.checks
            .iter()
            .find(|c| !c.passed && is_critical_check(&c.name))
    }
}

/// Assets loaded while checking, handed to the supervisor.
pub struct StartupAssets {
    pub analyzer: StressAnalyzer,
    pub character: CharacterCard,
}

fn is_critical_check(name: &str) -> bool {
    matches!(name, "directories" | "lexicon" | "resources" | "character")
}

fn check_directories(config: &AppConfig) -> CheckResult {
    if !config.resources_dir.is_dir() {
        return CheckResult::fail(
            "directories",
            "Resources directory not found",
            Some(config.resources_dir.display().to_string()),
        );
    }
    match fs::create_dir_all(&config.memory_dir) {
        Ok(()) => CheckResult::pass("directories", "Resources and memory directories present"),
        Err(e) => CheckResult::fail(
            "directories",
            "Memory directory cannot be created",
            Some(format!("{}: {}", config.memory_dir.display(), e)),
        ),
    }
}

fn check_lexicon(config: &AppConfig) -> (CheckResult, Option<Lexicon>) {
    match Lexicon::load(&config.resources_dir.join(LEXICON_FILE)) {
        Ok(lexicon) => {
            let message = format!("{} terms loaded", lexicon.lookup().len());
            (CheckResult::pass("lexicon", &message), Some(lexicon))
        }
        Err(e) => (
            CheckResult::fail("lexicon", "Lexicon failed to load", Some(e.to_string())),
            None,
        ),
    }
}

fn check_resources(config: &AppConfig) -> (CheckResult, Option<ResourceTables>) {
    match ResourceTables::load(&config.resources_dir) {
        Ok(tables) => {
            let message = format!("{} resources loaded", tables.entry_count());
            (CheckResult::pass("resources", &message), Some(tables))
        }
        Err(e) => (
            CheckResult::fail("resources", "Resource tables failed to load", Some(e.to_string())),
            None,
        ),
    }
}

fn check_character(config: &AppConfig) -> (CheckResult, Option<CharacterCard>) {
    match CharacterCard::load(&config.character_card, &config.user_name) {
        Ok(card) => {
            let message = format!("Character '{}' loaded", card.name);
            (CheckResult::pass("character", &message), Some(card))
        }
        Err(e) => (
            CheckResult::fail("character", "Character card failed to load", Some(e.to_string())),
            None,
        ),
    }
}

fn check_llm_config(config: &AppConfig) -> CheckResult {
    if config.llm.backend == LlmBackend::OpenAi && config.llm.api_key.trim().is_empty() {
        return CheckResult::fail(
            "llm_config",
            "No API key set; replies will fall back until OPENAI_API_KEY is provided",
            None,
        );
    }
    let message = format!("{} backend at {}", config.llm.backend, config.llm.base_url);
    CheckResult::pass("llm_config", &message)
}

async fn check_turn_log(config: &AppConfig) -> CheckResult {
    let log = TurnLog::in_dir(&config.memory_dir);
    match log.read_all().await {
        Ok(records) => {
            let message = format!("{} previous turns on record", records.len());
            CheckResult::pass("turn_log", &message)
        }
        Err(e) => CheckResult::fail(
            "turn_log",
            "Turn log unreadable; history will start empty",
            Some(e.to_string()),
        ),
    }
}

/// Performs all preflight checks. Assets are returned only when every
/// critical check passed.
pub async fn run_preflight_checks(config: &AppConfig) -> (PreflightReport, Option<StartupAssets>) {
    info!("Running preflight checks");

    let mut checks = vec![check_directories(config)];

    let (lexicon_check, lexicon) = check_lexicon(config);
    checks.push(lexicon_check);
    let (resources_check, tables) = check_resources(config);
    checks.push(resources_check);
    let (character_check, character) = check_character(config);
    checks.push(character_check);

    checks.push(check_llm_config(config));
    checks.push(check_turn_log(config).await);

    let all_passed = checks.iter().all(|c| c.passed);
    let critical_passed = checks
        .iter()
        .filter(|c| is_critical_check(&c.name))
        .all(|c| c.passed);

    let summary = if all_passed {
        "All checks passed. System ready.".to_string()
    } else if critical_passed {
        "Some non-critical checks failed. System can start with warnings.".to_string()
    } else {
        "Critical checks failed. System cannot start.".to_string()
    };

    for check in &checks {
        if check.passed {
            info!("  [ok] {}: {}", check.name, check.message);
        } else {
            warn!("  [!!] {}: {}", check.name, check.message);
            if let Some(details) = &check.details {
                warn!("      Details: {}", details);
            }
        }
    }
    info!("{}", summary);

    let assets = match (critical_passed, lexicon, tables, character) {
        (true, Some(lexicon), Some(tables), Some(character)) => Some(StartupAssets {
            analyzer: StressAnalyzer::new(Arc::new(lexicon), Arc::new(tables)),
            character,
        }),
        _ => None,
    };

    let report = PreflightReport {
        all_passed,
        checks,
        ready_to_start: assets.is_some(),
        summary,
    };
    (report, assets)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn shipped_config(memory_dir: PathBuf) -> AppConfig {
        let root = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
        AppConfig {
            resources_dir: root.join("resources"),
            character_card: root.join("character").join("beedu.json"),
            memory_dir,
            ..AppConfig::default()
        }
    }

    #[tokio::test]
    async fn test_shipped_assets_pass() {
        let dir = tempfile::tempdir().unwrap();
        let (report, assets) = run_preflight_checks(&shipped_config(dir.path().join("memory"))).await;
        assert!(report.ready_to_start, "{:?}", report.first_critical_failure());
        assert!(report.first_critical_failure().is_none());
        assert_eq!(assets.unwrap().character.name, "Beedu");
    }

    #[tokio::test]
    async fn test_missing_resources_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = shipped_config(dir.path().join("memory"));
        config.resources_dir = dir.path().join("nowhere");
        let (report, assets) = run_preflight_checks(&config).await;
        assert!(!report.ready_to_start);
        assert!(assets.is_none());
        assert_eq!(report.first_critical_failure().unwrap().name, "directories");
    }

    #[tokio::test]
    async fn test_missing_api_key_is_only_a_warning() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = shipped_config(dir.path().join("memory"));
        config.llm.api_key.clear();
        let (report, assets) = run_preflight_checks(&config).await;
        assert!(!report.all_passed);
        assert!(report.ready_to_start);
        assert!(assets.is_some());
    }
}
