//! Assessment - output structure of one scan.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use crate::error::AppError;

/// Stress category.
///
/// Variants are declared in severity priority order, so the derived `Ord`
/// ranks `Crisis` lowest (highest priority) and `General` highest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Crisis,
    Financial,
    Depression,
    Anxiety,
    Physical,
    General,
}

impl Category {
    pub const ALL: [Category; 6] = [
        Category::Crisis,
        Category::Financial,
        Category::Depression,
        Category::Anxiety,
        Category::Physical,
        Category::General,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Category::Crisis => "crisis",
            Category::Financial => "financial",
            Category::Depression => "depression",
            Category::Anxiety => "anxiety",
            Category::Physical => "physical",
            Category::General => "general",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl FromStr for Category {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|c| c.label() == s.trim().to_lowercase())
            .ok_or_else(|| AppError::Validation(format!("Unknown category: {}", s)))
    }
}

/// How a term was matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchKind {
    /// Multi-token entry found as a contiguous token sequence.
    Phrase,
    /// Single-token entry found as a token.
    Keyword,
}

/// How soon a money problem comes due.
///
/// Ordered from least to most pressing, so `max()` picks the most pressing one.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    #[default]
    None,
    Soon,
    Urgent,
    Immediate,
}

impl Urgency {
    pub fn label(&self) -> &'static str {
        match self {
            Urgency::None => "none",
            Urgency::Soon => "soon",
            Urgency::Urgent => "urgent",
            Urgency::Immediate => "immediate",
        }
    }

    /// Whether emergency assistance should lead the financial resources.
    pub fn is_pressing(&self) -> bool {
        *self >= Urgency::Urgent
    }
}

impl fmt::Display for Urgency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Desperation {
    #[default]
    Low,
    Moderate,
    High,
}

impl Desperation {
    /// Two or more distinct desperation terms count as high.
    pub fn from_count(count: usize) -> Self {
        match count {
            0 => Desperation::Low,
            1 => Desperation::Moderate,
            _ => Desperation::High,
        }
    }
}

/// A lexicon term that survived negation filtering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchedTerm {
    pub term: String,
    pub weight: u8,
    pub category: Category,
    pub kind: MatchKind,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Structured result of scanning one message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assessment {
    /// 0-10, clamped.
    pub stress_level: u8,
    pub category: Category,
    pub matched_terms: Vec<MatchedTerm>,
    pub is_crisis: bool,
    /// 0.0-1.0
    pub confidence: f32,
    /// Intensity multiplier that was applied (1.0-2.0).
    pub intensity: f32,
    /// Change against the previous turn of the session, when there is one.
    pub level_change: Option<i8>,
    #[serde(default)]
    pub urgency: Urgency,
    #[serde(default)]
    pub desperation: Desperation,
}

impl Assessment {
    /// Assessment for input with no stress signal.
    pub fn calm() -> Self {
        Self {
            stress_level: 0,
            category: Category::General,
            matched_terms: vec![],
            is_crisis: false,
            confidence: 0.0,
            intensity: 1.0,
            level_change: None,
            urgency: Urgency::None,
            desperation: Desperation::Low,
        }
    }

    pub fn has_signal(&self) -> bool {
        self.is_crisis || !self.matched_terms.is_empty()
    }

    /// Sub-issue tags carried by the matched terms.
    pub fn tags(&self) -> BTreeSet<&str> {
        self.matched_terms
            .iter()
            .flat_map(|m| m.tags.iter().map(String::as_str))
            .collect()
    }

    pub fn terms(&self) -> Vec<&str> {
        self.matched_terms.iter().map(|m| m.term.as_str()).collect()
    }

    /// One-line summary for logging and for the LLM prompt.
    pub fn summary(&self) -> String {
        let change = match self.level_change {
            Some(delta) if delta > 0 => format!(", up {} since last message", delta),
            Some(delta) if delta < 0 => format!(", down {} since last message", -delta),
            _ => String::new(),
        };
        let urgency = if self.urgency == Urgency::None {
            String::new()
        } else {
            format!(", Urgency: {}", self.urgency)
        };
        format!(
            "Stress: {}/10 ({}{}), Crisis: {}, Confidence: {:.0}%, Signals: [{}]{}",
            self.stress_level,
            self.category,
            change,
            if self.is_crisis { "yes" } else { "no" },
            self.confidence * 100.0,
            self.terms().join(", "),
            urgency
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_order() {
        let mut categories = vec![Category::General, Category::Anxiety, Category::Crisis, Category::Financial];
        categories.sort();
        assert_eq!(
            categories,
            vec![Category::Crisis, Category::Financial, Category::Anxiety, Category::General]
        );
    }

    #[test]
    fn test_category_parse_round_trip_labels() {
        for category in Category::ALL {
            assert_eq!(category.label().parse::<Category>().unwrap(), category);
        }
        assert!("mental".parse::<Category>().is_err());
    }

    #[test]
    fn test_calm_assessment() {
        let calm = Assessment::calm();
        assert_eq!(calm.stress_level, 0);
        assert_eq!(calm.category, Category::General);
        assert!(!calm.has_signal());
        assert!(calm.summary().contains("Stress: 0/10"));
        assert!(!calm.summary().contains("Urgency"));
    }

    #[test]
    fn test_urgency_ordering() {
        assert!(Urgency::Immediate > Urgency::Urgent);
        assert!(Urgency::Urgent.is_pressing());
        assert!(!Urgency::Soon.is_pressing());
        assert_eq!([Urgency::Soon, Urgency::None].into_iter().max(), Some(Urgency::Soon));
    }

    #[test]
    fn test_desperation_from_count() {
        assert_eq!(Desperation::from_count(0), Desperation::Low);
        assert_eq!(Desperation::from_count(1), Desperation::Moderate);
        assert_eq!(Desperation::from_count(3), Desperation::High);
    }

    #[test]
    fn test_summary_mentions_urgency() {
        let assessment = Assessment {
            stress_level: 10,
            category: Category::Financial,
            urgency: Urgency::Immediate,
            ..Assessment::calm()
        };
        assert!(assessment.summary().ends_with("Urgency: immediate"));
    }

    #[test]
    fn test_records_without_urgency_still_parse() {
        let json = r#"{"stress_level": 3, "category": "anxiety", "matched_terms": [],
            "is_crisis": false, "confidence": 0.3, "intensity": 1.0, "level_change": null}"#;
        let assessment: Assessment = serde_json::from_str(json).unwrap();
        assert_eq!(assessment.urgency, Urgency::None);
        assert_eq!(assessment.desperation, Desperation::Low);
    }
}
