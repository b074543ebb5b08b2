//! Signal Scanner.
//!
//! normalize -> phrase pass -> keyword pass -> negation filter -> intensity ->
//! aggregate -> classify -> financial pressure. Every stage is a plain function over tokens and the
//! lexicon so it can be exercised on its own; `SignalScanner` only chains them.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;
use tracing::debug;

use super::assessment::{Assessment, Category, Desperation, MatchKind, MatchedTerm, Urgency};
use super::lexicon::{Lexicon, MAX_INTENSITY};
use super::normalize::{normalize, Token};
use super::trend::HistoryEntry;

/// Tokens checked before a match for a negation word.
pub const NEGATION_WINDOW: usize = 3;
pub const PHRASE_MULTIPLIER: u32 = 10;
pub const KEYWORD_MULTIPLIER: u32 = 1;
pub const MAX_LEVEL: u8 = 10;

/// Only these cancel a crisis term, and only right in front of it.
pub const CRISIS_NEGATORS: [&str; 3] = ["not", "never", "no"];
/// A negator after one of these is rhetorical: "why not end it all".
pub const RHETORICAL_WORDS: [&str; 1] = ["why"];

/// Added to a financial level when the problem is due right away.
pub const URGENCY_BOOST: u8 = 2;
/// Added to a financial level on high desperation.
pub const DESPERATION_BOOST: u8 = 1;

/// One occurrence of a lexicon entry in the token stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TermOccurrence {
    /// Index into `Lexicon::lookup()`.
    pub entry: usize,
    pub start: usize,
    pub len: usize,
}

impl TermOccurrence {
    fn positions(&self) -> std::ops::Range<usize> {
        self.start..self.start + self.len
    }
}

fn occurs_at(tokens: &[Token], start: usize, needle: &[String]) -> bool {
    let end = start + needle.len();
    if needle.is_empty() || end > tokens.len() {
        return false;
    }
    let window = &tokens[start..end];
    window.iter().zip(needle).all(|(t, n)| t.text == *n)
        && window.iter().all(|t| t.clause == window[0].clause)
}

/// Every occurrence of every multi-token entry. Phrases never span clauses.
pub fn find_phrase_matches(tokens: &[Token], lexicon: &Lexicon) -> Vec<TermOccurrence> {
    let mut found = Vec::new();
    for (entry, phrase) in lexicon.phrases() {
        for start in 0..tokens.len() {
            if occurs_at(tokens, start, &phrase.tokens) {
                found.push(TermOccurrence {
                    entry,
                    start,
                    len: phrase.tokens.len(),
                });
            }
        }
    }
    found
}

/// Every occurrence of every single-token entry outside the phrase matches.
pub fn find_keyword_matches(
    tokens: &[Token],
    lexicon: &Lexicon,
    phrase_matches: &[TermOccurrence],
) -> Vec<TermOccurrence> {
    let covered: HashSet<usize> = phrase_matches.iter().flat_map(|m| m.positions()).collect();

    let mut found = Vec::new();
    for (entry, keyword) in lexicon.keywords() {
        for (position, token) in tokens.iter().enumerate() {
            if !covered.contains(&position) && token.text == keyword.tokens[0] {
                found.push(TermOccurrence {
                    entry,
                    start: position,
                    len: 1,
                });
            }
        }
    }
    found
}

/// True when a negation word sits within `NEGATION_WINDOW` tokens before
/// `start`, inside the same clause.
pub fn is_negated(tokens: &[Token], start: usize, lexicon: &Lexicon) -> bool {
    let Some(clause) = tokens.get(start).map(|t| t.clause) else {
        return false;
    };
    tokens[start.saturating_sub(NEGATION_WINDOW)..start]
        .iter()
        .any(|t| t.clause == clause && lexicon.is_negation(&t.text))
}

/// Crisis terms are only cancelled by a plain negator directly before them,
/// so "nothing matters, im suicidal" and "why not end it all" still count.
pub fn is_crisis_negated(tokens: &[Token], start: usize) -> bool {
    let Some(clause) = tokens.get(start).map(|t| t.clause) else {
        return false;
    };
    let Some(before) = start.checked_sub(1).and_then(|i| tokens.get(i)) else {
        return false;
    };
    if before.clause != clause || !CRISIS_NEGATORS.contains(&before.text.as_str()) {
        return false;
    }
    let rhetorical = start
        .checked_sub(2)
        .and_then(|i| tokens.get(i))
        .is_some_and(|t| t.clause == clause && RHETORICAL_WORDS.contains(&t.text.as_str()));
    !rhetorical
}

/// Drops negated occurrences.
pub fn filter_negations(
    tokens: &[Token],
    occurrences: Vec<TermOccurrence>,
    lexicon: &Lexicon,
) -> Vec<TermOccurrence> {
    occurrences
        .into_iter()
        .filter(|o| {
            let crisis = lexicon
                .entry(o.entry)
                .is_some_and(|e| e.category == Category::Crisis);
            if crisis {
                !is_crisis_negated(tokens, o.start)
            } else {
                !is_negated(tokens, o.start, lexicon)
            }
        })
        .collect()
}

fn mentions(tokens: &[Token], needle: &[String], lexicon: &Lexicon) -> bool {
    (0..tokens.len())
        .any(|start| occurs_at(tokens, start, needle) && !is_negated(tokens, start, lexicon))
}

/// Most pressing un-negated urgency term in the message.
pub fn detect_urgency(tokens: &[Token], lexicon: &Lexicon) -> Urgency {
    lexicon
        .urgency_terms()
        .iter()
        .filter(|term| mentions(tokens, &term.tokens, lexicon))
        .map(|term| term.urgency)
        .max()
        .unwrap_or_default()
}

/// Desperation from the number of distinct un-negated desperation terms.
pub fn detect_desperation(tokens: &[Token], lexicon: &Lexicon) -> Desperation {
    let count = lexicon
        .desperation_terms()
        .iter()
        .filter(|term| mentions(tokens, term, lexicon))
        .count();
    Desperation::from_count(count)
}

/// Records urgency and desperation, and raises the level of a financial,
/// non-crisis assessment: immediate urgency adds `URGENCY_BOOST`, high
/// desperation adds `DESPERATION_BOOST`.
pub fn apply_financial_pressure(
    assessment: &mut Assessment,
    urgency: Urgency,
    desperation: Desperation,
) {
    assessment.urgency = urgency;
    assessment.desperation = desperation;
    if assessment.is_crisis || assessment.category != Category::Financial {
        return;
    }

    let mut boost = 0;
    if urgency == Urgency::Immediate {
        boost += URGENCY_BOOST;
    }
    if desperation == Desperation::High {
        boost += DESPERATION_BOOST;
    }
    assessment.stress_level = (assessment.stress_level + boost).min(MAX_LEVEL);
}

/// Strongest intensity modifier present anywhere in the message, 1.0 if none.
pub fn intensity_multiplier(tokens: &[Token], lexicon: &Lexicon) -> f32 {
    let mut multiplier = 1.0_f32;
    for modifier in lexicon.intensity_modifiers() {
        let present = (0..tokens.len()).any(|start| occurs_at(tokens, start, &modifier.tokens));
        if present {
            multiplier = multiplier.max(modifier.multiplier);
        }
    }
    multiplier.min(MAX_INTENSITY)
}

/// Collapses surviving occurrences into distinct matched terms, in lexicon order.
pub fn aggregate(occurrences: &[TermOccurrence], lexicon: &Lexicon) -> Vec<MatchedTerm> {
    let distinct: BTreeSet<usize> = occurrences.iter().map(|o| o.entry).collect();
    distinct
        .into_iter()
        .filter_map(|index| lexicon.entry(index))
        .map(|entry| MatchedTerm {
            term: entry.term.clone(),
            weight: entry.weight,
            category: entry.category,
            kind: if entry.is_phrase() {
                MatchKind::Phrase
            } else {
                MatchKind::Keyword
            },
            tags: entry.tags.clone(),
        })
        .collect()
}

/// Weighted sum per category: phrases count ten times their weight.
pub fn category_scores(terms: &[MatchedTerm]) -> BTreeMap<Category, u32> {
    let mut scores = BTreeMap::new();
    for term in terms {
        let factor = match term.kind {
            MatchKind::Phrase => PHRASE_MULTIPLIER,
            MatchKind::Keyword => KEYWORD_MULTIPLIER,
        };
        *scores.entry(term.category).or_insert(0) += u32::from(term.weight) * factor;
    }
    scores
}

/// Turns matched terms and the intensity multiplier into an assessment.
pub fn classify(terms: Vec<MatchedTerm>, intensity: f32) -> Assessment {
    if terms.is_empty() {
        return Assessment::calm();
    }

    let scores = category_scores(&terms);
    let top = scores.values().copied().max().unwrap_or(0);
    // BTreeMap iterates in priority order, so the first hit wins ties.
    let mut category = scores
        .iter()
        .find(|(_, score)| **score == top)
        .map(|(category, _)| *category)
        .unwrap_or(Category::General);

    let scaled = (top as f32 * intensity).round();
    let mut stress_level = scaled.clamp(0.0, f32::from(MAX_LEVEL)) as u8;

    let active = scores
        .keys()
        .filter(|c| **c != Category::General)
        .count();
    if active >= 2 {
        stress_level = (stress_level + 1).min(MAX_LEVEL);
    }

    let is_crisis = terms.iter().any(|t| t.category == Category::Crisis);
    if is_crisis {
        category = Category::Crisis;
        stress_level = MAX_LEVEL;
    }

    let confidence = (0.2 + 0.1 * terms.len() as f32).min(1.0);

    Assessment {
        stress_level,
        category,
        matched_terms: terms,
        is_crisis,
        confidence,
        intensity,
        level_change: None,
        urgency: Urgency::None,
        desperation: Desperation::Low,
    }
}

/// Runs the whole pipeline against a shared lexicon.
#[derive(Debug, Clone)]
pub struct SignalScanner {
    lexicon: Arc<Lexicon>,
}

impl SignalScanner {
    pub fn new(lexicon: Arc<Lexicon>) -> Self {
        Self { lexicon }
    }

    /// Scans one message. `history` only feeds `level_change`; the level
    /// itself depends on `text` alone.
    pub fn scan(&self, text: &str, history: &[HistoryEntry]) -> Assessment {
        let tokens = normalize(text);
        if tokens.is_empty() {
            return Assessment::calm();
        }

        let lexicon = self.lexicon.as_ref();
        let phrases = find_phrase_matches(&tokens, lexicon);
        let keywords = find_keyword_matches(&tokens, lexicon, &phrases);

        let mut surviving = filter_negations(&tokens, phrases, lexicon);
        surviving.extend(filter_negations(&tokens, keywords, lexicon));

        let terms = aggregate(&surviving, lexicon);
        let intensity = if terms.is_empty() {
            1.0
        } else {
            intensity_multiplier(&tokens, lexicon)
        };

        let mut assessment = classify(terms, intensity);
        if assessment.has_signal() {
            apply_financial_pressure(
                &mut assessment,
                detect_urgency(&tokens, lexicon),
                detect_desperation(&tokens, lexicon),
            );
        }
        assessment.level_change = history
            .last()
            .map(|last| assessment.stress_level as i8 - last.stress_level as i8);

        debug!(
            "Scanned {} tokens: level {} ({}), {} terms, crisis={}",
            tokens.len(),
            assessment.stress_level,
            assessment.category,
            assessment.matched_terms.len(),
            assessment.is_crisis
        );
        assessment
    }
}
