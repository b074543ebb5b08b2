//! Text normalization shared by the lexicon loader and the scanner.
//!
//! Lowercases, drops apostrophes (so "can't" becomes "cant" and matches lexicon
//! entries written either way) and splits into word tokens. Sentence punctuation
//! starts a new clause; the scanner never looks for negations across clauses.

use regex::Regex;
use std::sync::LazyLock;

// NOTE: expect() is acceptable here: the patterns are literals and compile or never ship.
static APOSTROPHES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"['’‘`]").expect("Invalid regex: apostrophes"));
static CLAUSE_BREAKS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[.,;:!?\n]+").expect("Invalid regex: clause breaks"));
static WORDS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\p{L}\p{N}]+").expect("Invalid regex: word tokens"));

/// One normalized word and the clause it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub text: String,
    pub clause: usize,
}

/// Normalizes `text` into lowercase word tokens, tagged with their clause index.
pub fn normalize(text: &str) -> Vec<Token> {
    let lowered = text.to_lowercase();
    let joined = APOSTROPHES.replace_all(&lowered, "");

    CLAUSE_BREAKS
        .split(&joined)
        .filter(|clause| WORDS.is_match(clause))
        .enumerate()
        .flat_map(|(clause, part)| {
            WORDS.find_iter(part).map(move |m| Token {
                text: m.as_str().to_string(),
                clause,
            })
        })
        .collect()
}

/// Normalizes a lexicon term into its token texts.
pub fn normalize_term(term: &str) -> Vec<String> {
    normalize(term).into_iter().map(|t| t.text).collect()
}
