//! Static support-resource tables.
//!
//! Four JSON files under the resources directory, each a flat array of records.
//! The table a record comes from decides its `ResourceCategory`; files never
//! carry it themselves.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;
use tracing::info;

use crate::error::AppError;

pub const CRISIS_FILE: &str = "crisis_resources.json";
pub const MENTAL_HEALTH_FILE: &str = "mental_health_resources.json";
pub const FINANCIAL_FILE: &str = "financial_resources.json";
pub const COPING_FILE: &str = "coping_strategies.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceCategory {
    Crisis,
    MentalHealth,
    Financial,
    Coping,
}

impl ResourceCategory {
    pub fn heading(&self) -> &'static str {
        match self {
            ResourceCategory::Crisis => "Crisis support",
            ResourceCategory::MentalHealth => "Mental health support",
            ResourceCategory::Financial => "Financial help",
            ResourceCategory::Coping => "Things you can try right now",
        }
    }
}

impl fmt::Display for ResourceCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceCategory::Crisis => write!(f, "crisis"),
            ResourceCategory::MentalHealth => write!(f, "mental_health"),
            ResourceCategory::Financial => write!(f, "financial"),
            ResourceCategory::Coping => write!(f, "coping"),
        }
    }
}

/// A support resource: a hotline, a service or a coping technique.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceEntry {
    pub name: String,
    pub category: ResourceCategory,
    /// Sub-group inside the table, e.g. `helplines` or `housing_assistance`.
    pub group: String,
    pub contact: Option<String>,
    pub website: Option<String>,
    pub priority: u8,
    pub tags: Vec<String>,
    pub best_for: Vec<String>,
    pub description: Option<String>,
    pub instructions: Option<String>,
    pub available: Option<String>,
    pub cost: Option<String>,
}

impl ResourceEntry {
    /// Phone number when there is one, otherwise the website.
    pub fn contact_or_link(&self) -> Option<&str> {
        self.contact.as_deref().or(self.website.as_deref())
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }
}

#[derive(Debug, Deserialize)]
struct ResourceRecord {
    name: String,
    #[serde(default)]
    group: String,
    #[serde(default, alias = "number", alias = "phone")]
    contact: Option<String>,
    #[serde(default, alias = "url")]
    website: Option<String>,
    #[serde(default)]
    priority: u8,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    best_for: Vec<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    instructions: Option<String>,
    #[serde(default)]
    available: Option<String>,
    #[serde(default)]
    cost: Option<String>,
}

impl ResourceRecord {
    fn into_entry(self, category: ResourceCategory) -> ResourceEntry {
        let lower = |values: Vec<String>| -> Vec<String> {
            values.into_iter().map(|v| v.trim().to_lowercase()).collect()
        };
        ResourceEntry {
            name: self.name.trim().to_string(),
            category,
            group: self.group,
            contact: self.contact.filter(|c| !c.trim().is_empty()),
            website: self.website.filter(|w| !w.trim().is_empty()),
            priority: self.priority,
            tags: lower(self.tags),
            best_for: lower(self.best_for),
            description: self.description,
            instructions: self.instructions,
            available: self.available,
            cost: self.cost,
        }
    }
}

/// The four resource tables, immutable after load.
#[derive(Debug, Clone, Default)]
pub struct ResourceTables {
    pub crisis: Vec<ResourceEntry>,
    pub mental_health: Vec<ResourceEntry>,
    pub financial: Vec<ResourceEntry>,
    pub coping: Vec<ResourceEntry>,
}

impl ResourceTables {
    pub fn load(dir: &Path) -> Result<Self, AppError> {
        let tables = Self {
            crisis: load_table(&dir.join(CRISIS_FILE), ResourceCategory::Crisis)?,
            mental_health: load_table(&dir.join(MENTAL_HEALTH_FILE), ResourceCategory::MentalHealth)?,
            financial: load_table(&dir.join(FINANCIAL_FILE), ResourceCategory::Financial)?,
            coping: load_table(&dir.join(COPING_FILE), ResourceCategory::Coping)?,
        };
        tables.validate()?;
        info!(
            "Resources loaded: {} crisis, {} mental health, {} financial, {} coping",
            tables.crisis.len(),
            tables.mental_health.len(),
            tables.financial.len(),
            tables.coping.len()
        );
        Ok(tables)
    }

    /// Crisis routing must always have something to show.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.crisis.is_empty() {
            return Err(AppError::DataLoad("Crisis resource table is empty".to_string()));
        }
        if let Some(entry) = self.crisis.iter().find(|e| e.contact_or_link().is_none()) {
            return Err(AppError::DataLoad(format!(
                "Crisis resource '{}' has neither a contact nor a website",
                entry.name
            )));
        }
        Ok(())
    }

    pub fn entry_count(&self) -> usize {
        self.crisis.len() + self.mental_health.len() + self.financial.len() + self.coping.len()
    }
}

/// Parses one table from JSON text.
pub fn parse_table(json: &str, category: ResourceCategory) -> Result<Vec<ResourceEntry>, AppError> {
    let records: Vec<ResourceRecord> = serde_json::from_str(json)
        .map_err(|e| AppError::DataLoad(format!("Malformed {} resources: {}", category, e)))?;

    records
        .into_iter()
        .map(|record| {
            if record.name.trim().is_empty() {
                return Err(AppError::DataLoad(format!(
                    "A {} resource has an empty name",
                    category
                )));
            }
            Ok(record.into_entry(category))
        })
        .collect()
}

fn load_table(path: &Path, category: ResourceCategory) -> Result<Vec<ResourceEntry>, AppError> {
    let raw = fs::read_to_string(path)
        .map_err(|e| AppError::DataLoad(format!("Cannot read {}: {}", path.display(), e)))?;
    parse_table(&raw, category).map_err(|e| match e {
        AppError::DataLoad(msg) => AppError::DataLoad(format!("{}: {}", path.display(), msg)),
        other => other,
    })
}
