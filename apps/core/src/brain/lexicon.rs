//! Lexicon Store.
//!
//! Weighted stress terms per category, the negation-word set, the intensity
//! modifiers and the urgency and desperation terms, loaded once from
//! `lexicon.json`. Anything malformed is a startup
//! error: the companion must not serve traffic with a partial lexicon.

use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::Path;
use tracing::info;

use super::assessment::{Category, Urgency};
use super::normalize::normalize_term;
use crate::error::AppError;

/// Categories every lexicon must define. `general` may be left out.
pub const REQUIRED_CATEGORIES: [Category; 5] = [
    Category::Crisis,
    Category::Depression,
    Category::Anxiety,
    Category::Financial,
    Category::Physical,
];

pub const MIN_WEIGHT: u8 = 1;
pub const MAX_WEIGHT: u8 = 10;

/// Ceiling for any intensity multiplier.
pub const MAX_INTENSITY: f32 = 2.0;

/// One weighted term.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LexiconEntry {
    pub category: Category,
    /// Normalized term, tokens joined by single spaces.
    pub term: String,
    pub tokens: Vec<String>,
    pub weight: u8,
    /// Finer sub-issue labels, e.g. `housing` or `debt`.
    pub tags: Vec<String>,
}

impl LexiconEntry {
    pub fn is_phrase(&self) -> bool {
        self.tokens.len() > 1
    }
}

/// An amplifier such as "extremely" or "too much".
#[derive(Debug, Clone, PartialEq)]
pub struct IntensityModifier {
    pub tokens: Vec<String>,
    pub multiplier: f32,
}

/// A term that marks how soon a money problem comes due, e.g. "this week".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrgencyTerm {
    pub tokens: Vec<String>,
    pub urgency: Urgency,
}

#[derive(Debug, Deserialize)]
struct LexiconFile {
    negation_words: Vec<String>,
    intensity_modifiers: BTreeMap<String, f32>,
    #[serde(default)]
    urgency: BTreeMap<Urgency, Vec<String>>,
    #[serde(default)]
    desperation_words: Vec<String>,
    categories: BTreeMap<Category, Vec<TermRecord>>,
}

#[derive(Debug, Deserialize)]
struct TermRecord {
    term: String,
    weight: u8,
    #[serde(default)]
    tags: Vec<String>,
}

/// Immutable lexicon, shared read-only between sessions.
#[derive(Debug, Clone)]
pub struct Lexicon {
    entries: Vec<LexiconEntry>,
    negation_words: HashSet<String>,
    intensity_modifiers: Vec<IntensityModifier>,
    urgency_terms: Vec<UrgencyTerm>,
    desperation_terms: Vec<Vec<String>>,
}

impl Lexicon {
    /// Loads and validates the lexicon file.
    pub fn load(path: &Path) -> Result<Self, AppError> {
        let raw = fs::read_to_string(path).map_err(|e| {
            AppError::DataLoad(format!("Cannot read lexicon {}: {}", path.display(), e))
        })?;
        let lexicon = Self::from_json_str(&raw).map_err(|e| match e {
            AppError::DataLoad(msg) => AppError::DataLoad(format!("{}: {}", path.display(), msg)),
            other => other,
        })?;
        info!(
            "Lexicon loaded: {} terms ({} phrases), {} negation words, {} intensity modifiers",
            lexicon.entries.len(),
            lexicon.phrases().count(),
            lexicon.negation_words.len(),
            lexicon.intensity_modifiers.len()
        );
        Ok(lexicon)
    }

    /// Parses and validates lexicon JSON.
    pub fn from_json_str(json: &str) -> Result<Self, AppError> {
        let file: LexiconFile = serde_json::from_str(json)
            .map_err(|e| AppError::DataLoad(format!("Malformed lexicon: {}", e)))?;

        for required in REQUIRED_CATEGORIES {
            match file.categories.get(&required) {
                Some(terms) if !terms.is_empty() => {}
                _ => {
                    return Err(AppError::DataLoad(format!(
                        "Lexicon is missing required category '{}'",
                        required
                    )))
                }
            }
        }

        let mut entries = Vec::new();
        for (category, terms) in &file.categories {
            for record in terms {
                if !(MIN_WEIGHT..=MAX_WEIGHT).contains(&record.weight) {
                    return Err(AppError::DataLoad(format!(
                        "Term '{}' in '{}' has weight {} outside {}-{}",
                        record.term, category, record.weight, MIN_WEIGHT, MAX_WEIGHT
                    )));
                }
                let tokens = normalize_term(&record.term);
                if tokens.is_empty() {
                    return Err(AppError::DataLoad(format!(
                        "Empty term in category '{}'",
                        category
                    )));
                }
                entries.push(LexiconEntry {
                    category: *category,
                    term: tokens.join(" "),
                    tokens,
                    weight: record.weight,
                    tags: record.tags.iter().map(|t| t.trim().to_lowercase()).collect(),
                });
            }
        }

        let negation_words: HashSet<String> = file
            .negation_words
            .iter()
            .flat_map(|w| normalize_term(w))
            .collect();
        if negation_words.is_empty() {
            return Err(AppError::DataLoad("Lexicon has no negation words".to_string()));
        }

        let mut intensity_modifiers = Vec::new();
        for (modifier, multiplier) in &file.intensity_modifiers {
            if !multiplier.is_finite() || *multiplier <= 0.0 || *multiplier > MAX_INTENSITY {
                return Err(AppError::DataLoad(format!(
                    "Intensity modifier '{}' has multiplier {} outside (0, {}]",
                    modifier, multiplier, MAX_INTENSITY
                )));
            }
            let tokens = normalize_term(modifier);
            if tokens.is_empty() {
                return Err(AppError::DataLoad("Empty intensity modifier".to_string()));
            }
            intensity_modifiers.push(IntensityModifier {
                tokens,
                multiplier: *multiplier,
            });
        }

        let mut urgency_terms = Vec::new();
        for (urgency, terms) in &file.urgency {
            if *urgency == Urgency::None {
                return Err(AppError::DataLoad(
                    "Urgency table cannot list terms for 'none'".to_string(),
                ));
            }
            for term in terms {
                let tokens = normalize_term(term);
                if tokens.is_empty() {
                    return Err(AppError::DataLoad(format!(
                        "Empty urgency term under '{}'",
                        urgency
                    )));
                }
                urgency_terms.push(UrgencyTerm {
                    tokens,
                    urgency: *urgency,
                });
            }
        }

        let mut desperation_terms = Vec::new();
        for term in &file.desperation_words {
            let tokens = normalize_term(term);
            if tokens.is_empty() {
                return Err(AppError::DataLoad("Empty desperation term".to_string()));
            }
            desperation_terms.push(tokens);
        }

        Ok(Self {
            entries,
            negation_words,
            intensity_modifiers,
            urgency_terms,
            desperation_terms,
        })
    }

    /// All entries, ordered by category priority then file order.
    pub fn lookup(&self) -> &[LexiconEntry] {
        &self.entries
    }

    pub fn phrases(&self) -> impl Iterator<Item = (usize, &LexiconEntry)> {
        self.entries.iter().enumerate().filter(|(_, e)| e.is_phrase())
    }

    pub fn keywords(&self) -> impl Iterator<Item = (usize, &LexiconEntry)> {
        self.entries.iter().enumerate().filter(|(_, e)| !e.is_phrase())
    }

    pub fn entry(&self, index: usize) -> Option<&LexiconEntry> {
        self.entries.get(index)
    }

    pub fn is_negation(&self, token: &str) -> bool {
        self.negation_words.contains(token)
    }

    pub fn intensity_modifiers(&self) -> &[IntensityModifier] {
        &self.intensity_modifiers
    }

    pub fn urgency_terms(&self) -> &[UrgencyTerm] {
        &self.urgency_terms
    }

    pub fn desperation_terms(&self) -> &[Vec<String>] {
        &self.desperation_terms
    }
}
