//! Prompt Builder - assembles the text sent to the LLM for one turn.
//!
//! The system prompt is not part of it; the LLM client places that once, in
//! the form its backend expects.

use chrono::{DateTime, Local};

use crate::brain::StressReport;
use crate::character::CharacterCard;
use crate::models::Exchange;

/// Most recent exchanges included as conversation context.
pub const MAX_CONTEXT_EXCHANGES: usize = 5;

const CRISIS_GUIDANCE: &str = "The user may be in crisis. Respond with warmth and calm, \
take what they said seriously, and encourage them to contact the crisis lines listed with your reply. \
Do not give advice about methods and do not argue.";
const HIGH_STRESS_GUIDANCE: &str = "The user seems under heavy stress. Validate their feelings first \
and keep suggestions small and concrete.";
const LOW_STRESS_GUIDANCE: &str = "Respond naturally and supportively.";

/// Inputs for one prompt, borrowed from the companion's state.
pub struct PromptContext<'a> {
    pub instruction_prompt: &'a str,
    pub user_name: &'a str,
    pub character: &'a CharacterCard,
    /// Oldest first; only the tail is used.
    pub history: &'a [Exchange],
    pub report: Option<&'a StressReport>,
    pub now: DateTime<Local>,
}

/// Undoes escaped sequences left in card text and removes `<END>` markers.
pub fn clean_text(text: &str) -> String {
    text.replace("\\\\", "\\")
        .replace("\\n", "\n")
        .replace("\\'", "'")
        .replace("\\\"", "\"")
        .replace("<END>", "")
        .trim()
        .to_string()
}

/// Fills `{{user}}`, `{{char}}`, `{user}` and `{char}`.
pub fn inject_dynamic_values(text: &str, user_name: &str, char_name: &str) -> String {
    text.replace("{{user}}", user_name)
        .replace("{{char}}", char_name)
        .replace("{user}", user_name)
        .replace("{char}", char_name)
}

fn stress_section(report: &StressReport) -> String {
    let assessment = &report.assessment;
    let guidance = if assessment.is_crisis {
        CRISIS_GUIDANCE
    } else if assessment.stress_level >= 6 {
        HIGH_STRESS_GUIDANCE
    } else {
        LOW_STRESS_GUIDANCE
    };
    format!("{}\n{}", report.prompt_summary(), guidance)
}

fn conversation_section(history: &[Exchange], user_name: &str, char_name: &str) -> String {
    let skip = history.len().saturating_sub(MAX_CONTEXT_EXCHANGES);
    history[skip..]
        .iter()
        .map(|exchange| {
            format!(
                "{}: {}\n{}: {}",
                user_name,
                exchange.user.trim(),
                char_name,
                exchange.reply.trim()
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Builds the full prompt ending with the character's turn marker.
pub fn build_prompt(ctx: &PromptContext<'_>, user_input: &str) -> String {
    let char_name = ctx.character.name.as_str();
    let user_name = ctx.user_name;

    let mut prompt = format!(
        "### Instruction:\n{}\n\n\
         ### Interaction Context:\n---\n\
         User: {}\n\
         Character: {}\n\
         Current Date: {}\n\
         Current Time: {}\n\
         ---\n\n\
         ### Character Details:\n---\n{}\n---\n\n",
        inject_dynamic_values(ctx.instruction_prompt, user_name, char_name),
        user_name,
        char_name,
        ctx.now.format("%m/%d/%Y"),
        ctx.now.format("%H:%M:%S"),
        ctx.character.details(),
    );

    if !ctx.character.traits.is_empty() {
        prompt.push_str(&format!(
            "### {} Settings:\n{}\n---\n\n",
            char_name,
            ctx.character.traits_block()
        ));
    }

    if let Some(report) = ctx.report {
        prompt.push_str(&format!(
            "### Emotional Context:\n---\n{}\n---\n\n",
            stress_section(report)
        ));
    }

    if !ctx.history.is_empty() {
        prompt.push_str(&format!(
            "### Relevant Past Conversations:\n---\n{}\n---\n\n",
            clean_text(&conversation_section(ctx.history, user_name, char_name))
        ));
    }

    if !ctx.character.example_dialogue.trim().is_empty() {
        prompt.push_str(&format!(
            "### Example Dialogue:\n---\n{}\n---\n\n",
            clean_text(&ctx.character.example_dialogue)
        ));
    }

    prompt.push_str(&format!(
        "### Current Conversation:\n{}: {}\n{}:",
        user_name, user_input, char_name
    ));

    clean_text(&inject_dynamic_values(&prompt, user_name, char_name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::brain::{Assessment, Category, Trend};
    use chrono::{TimeZone, Utc};
    use std::collections::BTreeMap;

    fn card() -> CharacterCard {
        CharacterCard {
            name: "Beedu".to_string(),
            description: "Listens to {{user}}.".to_string(),
            personality: "Gentle".to_string(),
            scenario: "A quiet room".to_string(),
            greeting: "Hi".to_string(),
            example_dialogue: "{{user}}: hi\\n{{char}}: hello<END>".to_string(),
            traits: BTreeMap::from([("empathy".to_string(), 90)]),
        }
    }

    fn exchange(n: usize) -> Exchange {
        Exchange {
            timestamp: Utc::now(),
            user: format!("message {}", n),
            reply: format!("reply {}", n),
        }
    }

    fn context<'a>(
        card: &'a CharacterCard,
        history: &'a [Exchange],
        report: Option<&'a StressReport>,
    ) -> PromptContext<'a> {
        PromptContext {
            instruction_prompt: "Talk to {user} as {char}.",
            user_name: "Asha",
            character: card,
            history,
            report,
            now: Local.with_ymd_and_hms(2024, 5, 1, 9, 30, 0).unwrap(),
        }
    }

    #[test]
    fn test_clean_text() {
        assert_eq!(clean_text("  a\\nb <END> "), "a\nb");
        assert_eq!(clean_text("it\\'s \\\"fine\\\""), "it's \"fine\"");
    }

    #[test]
    fn test_inject_double_braces_first() {
        assert_eq!(inject_dynamic_values("{{user}} {char}", "Asha", "Beedu"), "Asha Beedu");
    }

    #[test]
    fn test_prompt_sections() {
        let card = card();
        let prompt = build_prompt(&context(&card, &[], None), "I'm okay");
        assert!(prompt.starts_with("### Instruction:\nTalk to Asha as Beedu."));
        assert!(!prompt.contains("System:"));
        assert!(prompt.contains("Talk to Asha as Beedu."));
        assert!(prompt.contains("Current Date: 05/01/2024"));
        assert!(prompt.contains("Description: Listens to Asha."));
        assert!(prompt.contains("- empathy: 90"));
        assert!(prompt.contains("Asha: hi\nBeedu: hello"));
        assert!(!prompt.contains("<END>"));
        assert!(!prompt.contains("Emotional Context"));
        assert!(prompt.ends_with("Asha: I'm okay\nBeedu:"));
    }

    #[test]
    fn test_history_limited_to_recent() {
        let card = card();
        let history: Vec<Exchange> = (0..8).map(exchange).collect();
        let prompt = build_prompt(&context(&card, &history, None), "hi");
        assert!(!prompt.contains("message 2"));
        assert!(prompt.contains("message 3"));
        assert!(prompt.contains("Beedu: reply 7"));
    }

    #[test]
    fn test_crisis_guidance() {
        let card = card();
        let report = StressReport {
            assessment: Assessment {
                stress_level: 10,
                category: Category::Crisis,
                is_crisis: true,
                ..Assessment::calm()
            },
            resources: vec![],
            trend: Trend::Worsening,
            processing_time_ms: 0,
        };
        let prompt = build_prompt(&context(&card, &[], Some(&report)), "help");
        assert!(prompt.contains("Stress: 10/10 (crisis)"));
        assert!(prompt.contains("Trend: worsening"));
        assert!(prompt.contains(CRISIS_GUIDANCE));
    }
}
