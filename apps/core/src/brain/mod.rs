//! # Brain Module
//!
//! Fast, non-LLM stress analysis for TalkMate.
//! Scans user input BEFORE calling the LLM so the reply can be framed and
//! resources attached.
//!
//! ## Components
//! - `normalize`: lowercase word tokens tagged with their clause
//! - `lexicon`: weighted terms, negation words, intensity and urgency modifiers
//! - `scanner`: pure pipeline producing an `Assessment`
//! - `router`: assessment to ranked resources
//! - `trend`: per-session stress history
//! - `analyzer`: main orchestrator

pub mod analyzer;
pub mod assessment;
pub mod lexicon;
pub mod normalize;
pub mod router;
pub mod scanner;
pub mod trend;

pub use analyzer::{StressAnalyzer, StressReport};
pub use assessment::{Assessment, Category, Desperation, MatchKind, MatchedTerm, Urgency};
pub use lexicon::Lexicon;
pub use router::{ResourceRouter, RouterLimits};
pub use scanner::SignalScanner;
pub use trend::{HistoryEntry, Trend, TrendTracker};
