//! Response Composer - pure formatting of the text shown to the user.
//!
//! Layout: crisis banner, then the LLM reply, then the resource block grouped
//! by table, then a short note for high stress outside a crisis.

use std::fmt::Write as _;

use crate::brain::Assessment;
use crate::resources::{ResourceCategory, ResourceEntry};

pub const FALLBACK_REPLY: &str = "I'm having trouble processing that. Could you try again?";

pub const CRISIS_HEADLINE: &str =
    "IMMEDIATE HELP: Please reach out to crisis services right now. You don't have to go through this alone.";
pub const EMERGENCY_LINE: &str =
    "If you are in immediate danger, call 112 (India) or your local emergency number.";
pub const HIGH_STRESS_NOTE: &str =
    "Your stress level seems high. Professional support could really help.";

pub const HIGH_STRESS_THRESHOLD: u8 = 7;

const RULE: &str = "------------------------------------------------------------";

/// One resource on a single line, with a second indented line for details.
pub fn format_entry(entry: &ResourceEntry) -> String {
    let mut line = format!("  - {}", entry.name);
    if let Some(contact) = entry.contact_or_link() {
        let _ = write!(line, ": {}", contact);
    }
    if let Some(available) = &entry.available {
        let _ = write!(line, " ({})", available);
    }

    let detail = entry.instructions.as_ref().or(entry.description.as_ref());
    if let Some(detail) = detail {
        let _ = write!(line, "\n    {}", detail.trim());
    }
    line
}

/// Banner shown above the reply when the assessment is a crisis.
pub fn crisis_banner(resources: &[ResourceEntry]) -> String {
    let mut banner = format!("{}\n{}\n", RULE, CRISIS_HEADLINE);
    for entry in resources
        .iter()
        .filter(|e| e.category == ResourceCategory::Crisis)
    {
        let _ = writeln!(banner, "{}", format_entry(entry));
    }
    let _ = write!(banner, "{}\n{}", EMERGENCY_LINE, RULE);
    banner
}

/// Non-crisis resources grouped by table, in table order.
pub fn resource_block(resources: &[ResourceEntry]) -> Option<String> {
    let groups = [
        ResourceCategory::MentalHealth,
        ResourceCategory::Financial,
        ResourceCategory::Coping,
    ];

    let mut block = String::new();
    for group in groups {
        let entries: Vec<&ResourceEntry> =
            resources.iter().filter(|e| e.category == group).collect();
        if entries.is_empty() {
            continue;
        }
        if !block.is_empty() {
            block.push('\n');
        }
        let _ = writeln!(block, "{}:", group.heading());
        for entry in entries {
            let _ = writeln!(block, "{}", format_entry(entry));
        }
    }

    if block.is_empty() {
        None
    } else {
        Some(block.trim_end().to_string())
    }
}

/// Assembles the final text for one turn.
pub fn compose(reply: &str, assessment: &Assessment, resources: &[ResourceEntry]) -> String {
    let mut sections = Vec::new();

    if assessment.is_crisis {
        sections.push(crisis_banner(resources));
    }

    let reply = reply.trim();
    sections.push(if reply.is_empty() {
        FALLBACK_REPLY.to_string()
    } else {
        reply.to_string()
    });

    if let Some(block) = resource_block(resources) {
        sections.push(block);
    }

    if !assessment.is_crisis && assessment.stress_level >= HIGH_STRESS_THRESHOLD {
        sections.push(HIGH_STRESS_NOTE.to_string());
    }

    sections.join("\n\n")
}
