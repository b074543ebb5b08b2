//! Resource Router - maps an assessment to a short, ranked list of resources.

use std::cmp::Ordering;
use std::sync::Arc;

use super::assessment::{Assessment, Category};
use crate::resources::{ResourceEntry, ResourceTables};

/// Level from which professional mental-health services are suggested.
pub const PROFESSIONAL_THRESHOLD: u8 = 6;
pub const PROFESSIONAL_TAG: &str = "professional";
/// Financial group shown first when a money problem is pressing.
pub const EMERGENCY_GROUP: &str = "emergency_assistance";
pub const EMERGENCY_LIMIT: usize = 2;

/// Caps on how many entries a single reply carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouterLimits {
    pub total: usize,
    pub crisis: usize,
    pub financial: usize,
    pub professional: usize,
}

impl Default for RouterLimits {
    fn default() -> Self {
        Self {
            total: 4,
            crisis: 3,
            financial: 3,
            professional: 2,
        }
    }
}

fn by_priority(a: &ResourceEntry, b: &ResourceEntry) -> Ordering {
    b.priority.cmp(&a.priority).then_with(|| a.name.cmp(&b.name))
}

fn ranked<'a>(entries: impl Iterator<Item = &'a ResourceEntry>) -> Vec<&'a ResourceEntry> {
    let mut entries: Vec<&ResourceEntry> = entries.collect();
    entries.sort_by(|a, b| by_priority(a, b));
    entries
}

#[derive(Debug, Clone)]
pub struct ResourceRouter {
    tables: Arc<ResourceTables>,
    limits: RouterLimits,
}

impl ResourceRouter {
    pub fn new(tables: Arc<ResourceTables>) -> Self {
        Self::with_limits(tables, RouterLimits::default())
    }

    pub fn with_limits(tables: Arc<ResourceTables>, limits: RouterLimits) -> Self {
        Self { tables, limits }
    }

    /// Picks resources for `assessment`. Pure: same assessment, same list.
    pub fn route(&self, assessment: &Assessment) -> Vec<ResourceEntry> {
        if !assessment.has_signal() {
            return Vec::new();
        }

        let total = self.limits.total;
        let mut picked: Vec<&ResourceEntry> = if assessment.is_crisis {
            self.crisis_entries(self.limits.crisis.min(total))
        } else if assessment.category == Category::Financial {
            self.financial_entries(assessment, self.limits.financial.min(total))
        } else if assessment.stress_level >= PROFESSIONAL_THRESHOLD {
            self.professional_entries(self.limits.professional.min(total))
        } else {
            Vec::new()
        };

        let remaining = total.saturating_sub(picked.len());
        picked.extend(self.coping_entries(assessment.category, remaining));

        picked.into_iter().cloned().collect()
    }

    fn crisis_entries(&self, cap: usize) -> Vec<&ResourceEntry> {
        ranked(self.tables.crisis.iter()).into_iter().take(cap).collect()
    }

    /// Emergency assistance first when the problem is pressing, then the
    /// entries sharing the most tags with the matched terms.
    fn financial_entries(&self, assessment: &Assessment, cap: usize) -> Vec<&ResourceEntry> {
        let mut picked: Vec<&ResourceEntry> = if assessment.urgency.is_pressing() {
            ranked(self.tables.financial.iter().filter(|e| e.group == EMERGENCY_GROUP))
                .into_iter()
                .take(EMERGENCY_LIMIT.min(cap))
                .collect()
        } else {
            Vec::new()
        };

        let remaining = cap.saturating_sub(picked.len());
        let rest: Vec<&ResourceEntry> = self
            .tag_ranked_financial(assessment)
            .into_iter()
            .filter(|entry| !picked.iter().any(|p| p.name == entry.name))
            .take(remaining)
            .collect();
        picked.extend(rest);
        picked
    }

    /// Entries sharing the most tags with the matched terms; the whole table
    /// when nothing overlaps.
    fn tag_ranked_financial(&self, assessment: &Assessment) -> Vec<&ResourceEntry> {
        let wanted = assessment.tags();
        let overlap = |entry: &ResourceEntry| -> usize {
            entry
                .tags
                .iter()
                .filter(|t| wanted.contains(t.as_str()))
                .count()
        };

        let mut tagged: Vec<(usize, &ResourceEntry)> = self
            .tables
            .financial
            .iter()
            .map(|entry| (overlap(entry), entry))
            .filter(|(score, _)| *score > 0)
            .collect();

        if tagged.is_empty() {
            return ranked(self.tables.financial.iter());
        }

        tagged.sort_by(|(sa, a), (sb, b)| sb.cmp(sa).then_with(|| by_priority(a, b)));
        tagged.into_iter().map(|(_, entry)| entry).collect()
    }

    fn professional_entries(&self, cap: usize) -> Vec<&ResourceEntry> {
        ranked(
            self.tables
                .mental_health
                .iter()
                .filter(|e| e.has_tag(PROFESSIONAL_TAG)),
        )
        .into_iter()
        .take(cap)
        .collect()
    }

    fn coping_entries(&self, category: Category, cap: usize) -> Vec<&ResourceEntry> {
        if cap == 0 {
            return Vec::new();
        }
        let label = category.label();
        ranked(
            self.tables
                .coping
                .iter()
                .filter(|e| e.best_for.iter().any(|b| b == label)),
        )
        .into_iter()
        .take(cap)
        .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::brain::assessment::{Desperation, MatchKind, MatchedTerm, Urgency};
    use crate::resources::{parse_table, ResourceCategory};

    fn tables() -> Arc<ResourceTables> {
        let crisis = parse_table(
            r#"[
                {"name": "Tele-Crisis", "contact": "111", "priority": 8},
                {"name": "Hotline A", "contact": "222", "priority": 10},
                {"name": "Hotline B", "contact": "333", "priority": 10},
                {"name": "Emergency", "contact": "112", "priority": 9}
            ]"#,
            ResourceCategory::Crisis,
        )
        .unwrap();
        let mental_health = parse_table(
            r#"[
                {"name": "Therapist Finder", "priority": 7, "tags": ["professional"]},
                {"name": "Peer Group", "priority": 9, "tags": ["peer"]}
            ]"#,
            ResourceCategory::MentalHealth,
        )
        .unwrap();
        let financial = parse_table(
            r#"[
                {"name": "Relief Fund", "group": "emergency_assistance", "priority": 3, "tags": ["emergency"]},
                {"name": "Debt Relief", "priority": 5, "tags": ["debt"]},
                {"name": "Bill Help", "priority": 6, "tags": ["bills", "utilities"]},
                {"name": "Debt and Bills Desk", "priority": 4, "tags": ["debt", "bills"]},
                {"name": "Job Board", "priority": 9, "tags": ["income"]}
            ]"#,
            ResourceCategory::Financial,
        )
        .unwrap();
        let coping = parse_table(
            r#"[
                {"name": "Box Breathing", "priority": 8, "best_for": ["anxiety", "crisis"]},
                {"name": "Walk", "priority": 5, "best_for": ["depression"]},
                {"name": "Budget Sheet", "priority": 4, "best_for": ["financial"]}
            ]"#,
            ResourceCategory::Coping,
        )
        .unwrap();
        Arc::new(ResourceTables {
            crisis,
            mental_health,
            financial,
            coping,
        })
    }

    fn assessment(category: Category, level: u8, tags: &[&str]) -> Assessment {
        Assessment {
            stress_level: level,
            category,
            matched_terms: vec![MatchedTerm {
                term: "x".into(),
                weight: 5,
                category,
                kind: MatchKind::Keyword,
                tags: tags.iter().map(|t| t.to_string()).collect(),
            }],
            is_crisis: category == Category::Crisis,
            confidence: 0.3,
            intensity: 1.0,
            level_change: None,
            urgency: Urgency::None,
            desperation: Desperation::Low,
        }
    }

    fn names(entries: &[ResourceEntry]) -> Vec<&str> {
        entries.iter().map(|e| e.name.as_str()).collect()
    }

    #[test]
    fn test_crisis_first_and_capped() {
        let router = ResourceRouter::new(tables());
        let routed = router.route(&assessment(Category::Crisis, 10, &[]));
        assert_eq!(
            names(&routed),
            vec!["Hotline A", "Hotline B", "Emergency", "Box Breathing"]
        );
        assert_eq!(routed[0].category, ResourceCategory::Crisis);
    }

    #[test]
    fn test_financial_ranked_by_tag_overlap() {
        let router = ResourceRouter::new(tables());
        let routed = router.route(&assessment(Category::Financial, 10, &["debt", "bills"]));
        assert_eq!(
            names(&routed),
            vec!["Debt and Bills Desk", "Bill Help", "Debt Relief", "Budget Sheet"]
        );
    }

    #[test]
    fn test_financial_falls_back_to_whole_table() {
        let router = ResourceRouter::new(tables());
        let routed = router.route(&assessment(Category::Financial, 5, &[]));
        assert_eq!(routed[0].name, "Job Board");
        assert_eq!(
            routed.iter().filter(|e| e.category == ResourceCategory::Financial).count(),
            3
        );
    }

    #[test]
    fn test_pressing_urgency_puts_emergency_first() {
        let router = ResourceRouter::new(tables());
        let mut a = assessment(Category::Financial, 10, &["debt", "bills"]);
        a.urgency = Urgency::Immediate;
        let routed = router.route(&a);
        assert_eq!(
            names(&routed),
            vec!["Relief Fund", "Debt and Bills Desk", "Bill Help", "Budget Sheet"]
        );

        a.urgency = Urgency::Urgent;
        assert_eq!(router.route(&a)[0].name, "Relief Fund");

        a.urgency = Urgency::Soon;
        assert_eq!(router.route(&a)[0].name, "Debt and Bills Desk");
    }

    #[test]
    fn test_emergency_not_repeated_in_fallback() {
        let router = ResourceRouter::new(tables());
        let mut a = assessment(Category::Financial, 8, &[]);
        a.urgency = Urgency::Immediate;
        let routed = router.route(&a);
        assert_eq!(routed[0].name, "Relief Fund");
        assert_eq!(routed.iter().filter(|e| e.name == "Relief Fund").count(), 1);
    }

    #[test]
    fn test_professional_only_when_high() {
        let router = ResourceRouter::new(tables());
        let high = router.route(&assessment(Category::Depression, 7, &[]));
        assert_eq!(names(&high), vec!["Therapist Finder", "Walk"]);

        let low = router.route(&assessment(Category::Depression, 3, &[]));
        assert_eq!(names(&low), vec!["Walk"]);
    }

    #[test]
    fn test_no_signal_routes_nothing() {
        let router = ResourceRouter::new(tables());
        assert!(router.route(&Assessment::calm()).is_empty());
    }

    #[test]
    fn test_routing_is_idempotent() {
        let router = ResourceRouter::new(tables());
        let a = assessment(Category::Financial, 9, &["bills"]);
        assert_eq!(router.route(&a), router.route(&a));
    }

    #[test]
    fn test_custom_limits() {
        let limits = RouterLimits {
            total: 1,
            ..RouterLimits::default()
        };
        let router = ResourceRouter::with_limits(tables(), limits);
        let routed = router.route(&assessment(Category::Crisis, 10, &[]));
        assert_eq!(names(&routed), vec!["Hotline A"]);
    }
}
