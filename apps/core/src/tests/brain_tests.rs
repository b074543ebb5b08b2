//! Brain Module Tests
//!
//! Runs the stress pipeline against the shipped lexicon and resource tables.

use crate::brain::analyzer::LEXICON_FILE;
use crate::brain::router::EMERGENCY_GROUP;
use crate::brain::{
    Assessment, Category, Desperation, Lexicon, ResourceRouter, SignalScanner, StressAnalyzer,
    Trend, TrendTracker, Urgency,
};
use crate::resources::{ResourceCategory, ResourceTables};
use std::path::PathBuf;
use std::sync::Arc;

fn resources_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("resources")
}

fn shipped_lexicon() -> Arc<Lexicon> {
    Arc::new(Lexicon::load(&resources_dir().join(LEXICON_FILE)).expect("shipped lexicon"))
}

fn shipped_tables() -> Arc<ResourceTables> {
    Arc::new(ResourceTables::load(&resources_dir()).expect("shipped resources"))
}

fn scan(text: &str) -> Assessment {
    SignalScanner::new(shipped_lexicon()).scan(text, &[])
}

#[cfg(test)]
mod scanner_tests {
    use super::*;

    #[test]
    fn test_levels_stay_in_range() {
        let inputs = [
            "",
            "   ",
            "hello there",
            "I'm extremely anxious, completely overwhelmed and drowning in debt",
            "suicidal suicidal suicidal, extreme pain, can't breathe, evicted, hopeless",
            "not not not not",
            "🙂🙂🙂",
        ];
        for input in inputs {
            let assessment = scan(input);
            assert!(assessment.stress_level <= 10, "level out of range for '{}'", input);
            assert!(
                !assessment.is_crisis || assessment.category == Category::Crisis,
                "crisis must imply crisis category for '{}'",
                input
            );
        }
    }

    #[test]
    fn test_empty_input_is_calm() {
        for input in ["", "   \n\t "] {
            let assessment = scan(input);
            assert_eq!(assessment.stress_level, 0);
            assert_eq!(assessment.category, Category::General);
            assert!(assessment.matched_terms.is_empty());
            assert!(!assessment.is_crisis);
        }
    }

    #[test]
    fn test_scan_is_deterministic() {
        let text = "I'm really stressed about rent and I can't sleep";
        let first = scan(text);
        for _ in 0..5 {
            assert_eq!(scan(text), first);
        }
    }

    #[test]
    fn test_negated_crisis_term_is_not_crisis() {
        for text in ["I am not suicidal", "I would never hurt myself", "There is no suicide plan"] {
            let assessment = scan(text);
            assert!(!assessment.is_crisis, "'{}' should not be a crisis", text);
        }
    }

    #[test]
    fn test_crisis_phrases() {
        for text in [
            "I want to end my life",
            "Sometimes I think everyone is better off dead without me",
            "I don't want to be here anymore",
        ] {
            let assessment = scan(text);
            assert!(assessment.is_crisis, "'{}' should be a crisis", text);
            assert_eq!(assessment.category, Category::Crisis);
            assert_eq!(assessment.stress_level, 10);
        }
    }

    #[test]
    fn test_loose_negations_do_not_hide_crisis() {
        for text in [
            "why not end it all",
            "nothing matters, im suicidal",
            "nothing matters im suicidal",
            "nobody would care if I was better off dead",
            "I do not want to be here anymore",
            "I do not want to live like this",
            "I don't want to die",
            "I'm not sure I want to die",
        ] {
            let assessment = scan(text);
            assert!(assessment.is_crisis, "'{}' should be a crisis", text);
            assert_eq!(assessment.category, Category::Crisis);
            assert_eq!(assessment.stress_level, 10);
        }
    }

    #[test]
    fn test_intensity_raises_level() {
        let plain = scan("anxious");
        let intense = scan("really anxious");
        assert!(plain.stress_level < 10);
        assert!(intense.stress_level > plain.stress_level);
        assert!(intense.intensity > 1.0);
    }

    #[test]
    fn test_negation_with_intensity() {
        let assessment = scan("not anxious but really depressed");
        let terms = assessment.terms();
        assert!(!terms.contains(&"anxious"));
        assert!(terms.contains(&"depressed"));
        assert_eq!(assessment.category, Category::Depression);
        assert!(assessment.stress_level > scan("depressed").stress_level);
    }

    #[test]
    fn test_negation_stops_at_clause() {
        let assessment = scan("I'm not sure why. Hopeless.");
        assert!(assessment.terms().contains(&"hopeless"));
    }

    #[test]
    fn test_combination_boost() {
        let single = scan("tired");
        let combined = scan("tired and worried");
        assert_eq!(single.category, Category::Physical);
        assert_eq!(combined.stress_level, 3 + 1);
    }

    #[test]
    fn test_confidence_grows_with_matches() {
        let one = scan("sad");
        let three = scan("sad, lonely and exhausted");
        assert!((one.confidence - 0.3).abs() < 1e-6);
        assert!(three.confidence > one.confidence);
        assert!(three.confidence <= 1.0);
    }
}

#[cfg(test)]
mod scenario_tests {
    use super::*;

    #[test]
    fn test_crisis_scenario_routes_hotline_first() {
        let analyzer = StressAnalyzer::new(shipped_lexicon(), shipped_tables());
        let report = analyzer.analyze("s1", "I don't want to be here anymore");

        assert!(report.assessment.is_crisis);
        assert_eq!(report.assessment.category, Category::Crisis);
        assert!(!report.resources.is_empty());
        assert_eq!(report.resources[0].category, ResourceCategory::Crisis);
        assert!(report.resources[0].contact_or_link().is_some());
    }

    #[test]
    fn test_negated_depression_scenario() {
        let assessment = scan("I'm not depressed, just tired");
        let terms = assessment.terms();
        assert!(!terms.contains(&"depressed"));
        assert!(terms.contains(&"tired"));
        assert!(!assessment.is_crisis);
        assert_eq!(assessment.category, Category::Physical);
        assert!(assessment.stress_level <= 3);
    }

    #[test]
    fn test_financial_scenario() {
        let analyzer = StressAnalyzer::new(shipped_lexicon(), shipped_tables());
        let report = analyzer.analyze("s1", "I'm drowning in debt and can't pay bills");

        assert_eq!(report.assessment.category, Category::Financial);
        assert!(report.assessment.stress_level >= 7);
        assert!(!report.assessment.is_crisis);
        assert!(report
            .resources
            .iter()
            .any(|r| r.category == ResourceCategory::Financial));
        let first = &report.resources[0];
        assert!(first.has_tag("debt") || first.has_tag("bills"));
    }

    #[test]
    fn test_housing_terms_prefer_housing_help() {
        let analyzer = StressAnalyzer::new(shipped_lexicon(), shipped_tables());
        let report = analyzer.analyze("s1", "We are about to be evicted");
        assert_eq!(report.assessment.category, Category::Financial);
        assert!(report.resources[0].has_tag("housing"));
    }

    #[test]
    fn test_urgent_eviction_routes_emergency_help_first() {
        let analyzer = StressAnalyzer::new(shipped_lexicon(), shipped_tables());
        let report = analyzer.analyze("s1", "I'm about to be evicted today");

        assert_eq!(report.assessment.category, Category::Financial);
        assert_eq!(report.assessment.urgency, Urgency::Immediate);
        assert_eq!(report.assessment.stress_level, 10);
        assert_eq!(report.resources[0].group, EMERGENCY_GROUP);
        assert!(report
            .resources
            .iter()
            .any(|r| r.group != EMERGENCY_GROUP && r.has_tag("housing")));
    }

    #[test]
    fn test_eviction_without_date_is_not_urgent() {
        let analyzer = StressAnalyzer::new(shipped_lexicon(), shipped_tables());
        let report = analyzer.analyze("s1", "I was evicted");
        assert_eq!(report.assessment.urgency, Urgency::None);
        assert_eq!(report.assessment.stress_level, 8);

        let urgent = analyzer.analyze("s2", "I was evicted today");
        assert_eq!(urgent.assessment.stress_level, 10);
        assert_ne!(report.resources[0].group, EMERGENCY_GROUP);
    }

    #[test]
    fn test_desperation_raises_financial_level() {
        let plain = scan("I'm broke");
        let desperate = scan("I'm broke and desperate, I don't know what to do");
        assert_eq!(plain.category, Category::Financial);
        assert_eq!(desperate.desperation, Desperation::High);
        assert_eq!(desperate.stress_level, plain.stress_level + 1);
    }

    #[test]
    fn test_empty_scenario() {
        let analyzer = StressAnalyzer::new(shipped_lexicon(), shipped_tables());
        let report = analyzer.analyze("s1", "");
        assert_eq!(report.assessment.stress_level, 0);
        assert_eq!(report.assessment.category, Category::General);
        assert!(report.resources.is_empty());
    }

    #[test]
    fn test_high_stress_suggests_professionals() {
        let analyzer = StressAnalyzer::new(shipped_lexicon(), shipped_tables());
        let report = analyzer.analyze("s1", "I feel completely hopeless and worthless");
        assert!(report.assessment.stress_level >= 6);
        assert_eq!(report.resources[0].category, ResourceCategory::MentalHealth);
        assert!(report.resources.len() <= 4);
    }
}

#[cfg(test)]
mod router_tests {
    use super::*;

    #[test]
    fn test_crisis_first_regardless_of_category() {
        let router = ResourceRouter::new(shipped_tables());
        let mut assessment = scan("I want to end my life and I'm drowning in debt");
        assert!(assessment.is_crisis);

        let resources = router.route(&assessment);
        assert_eq!(resources[0].category, ResourceCategory::Crisis);

        assessment.category = Category::Financial;
        let resources = router.route(&assessment);
        assert_eq!(resources[0].category, ResourceCategory::Crisis);
    }

    #[test]
    fn test_routing_is_idempotent() {
        let router = ResourceRouter::new(shipped_tables());
        for text in ["I'm anxious about rent", "I want to die", "so tired", "hopeless"] {
            let assessment = scan(text);
            assert_eq!(router.route(&assessment), router.route(&assessment));
        }
    }

    #[test]
    fn test_crisis_list_is_ordered_by_priority() {
        let router = ResourceRouter::new(shipped_tables());
        let resources = router.route(&scan("I want to kill myself"));
        let crisis: Vec<u8> = resources
            .iter()
            .filter(|r| r.category == ResourceCategory::Crisis)
            .map(|r| r.priority)
            .collect();
        assert!(!crisis.is_empty());
        assert!(crisis.windows(2).all(|w| w[0] >= w[1]));
    }
}

#[cfg(test)]
mod trend_tests {
    use super::*;

    fn feed(tracker: &TrendTracker, session: &str, levels: &[u8]) -> Trend {
        let mut trend = Trend::Stable;
        for level in levels {
            trend = tracker.record_and_classify(session, *level, Category::General);
        }
        trend
    }

    #[test]
    fn test_improving_and_worsening() {
        let tracker = TrendTracker::new();
        feed(&tracker, "a", &[8, 7, 6]);
        assert_eq!(feed(&tracker, "a", &[3, 2, 1]), Trend::Improving);

        feed(&tracker, "b", &[2, 3, 4]);
        assert_eq!(feed(&tracker, "b", &[7, 8, 9]), Trend::Worsening);
    }

    #[test]
    fn test_analyzer_tracks_trend_and_level_change() {
        let analyzer = StressAnalyzer::new(shipped_lexicon(), shipped_tables());
        let first = analyzer.analyze("s", "I'm hopeless and worthless");
        assert_eq!(first.trend, Trend::Stable);
        assert_eq!(first.assessment.level_change, None);

        let second = analyzer.analyze("s", "feeling ok today");
        assert_eq!(second.trend, Trend::Improving);
        assert!(second.assessment.level_change.unwrap_or(0) < 0);
    }
}
