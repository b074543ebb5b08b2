//! Character card: the companion's name, persona and greeting.

use chrono::{DateTime, Local};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::info;

use crate::error::AppError;

#[derive(Debug, Deserialize)]
struct CardFile {
    char_name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    personality: String,
    #[serde(default)]
    scenario: String,
    #[serde(default)]
    first_mes: String,
    #[serde(default)]
    mes_example: String,
    #[serde(default)]
    traits: BTreeMap<String, i32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CharacterCard {
    pub name: String,
    pub description: String,
    pub personality: String,
    pub scenario: String,
    /// First message, placeholders already filled.
    pub greeting: String,
    pub example_dialogue: String,
    /// Persona settings, e.g. `empathy: 95`.
    pub traits: BTreeMap<String, i32>,
}

impl CharacterCard {
    pub fn load(path: &Path, user_name: &str) -> Result<Self, AppError> {
        let raw = fs::read_to_string(path).map_err(|e| {
            AppError::DataLoad(format!("Cannot read character card {}: {}", path.display(), e))
        })?;
        let card = Self::from_json_str(&raw, user_name, Local::now())?;
        info!("Character loaded: {} ({} traits)", card.name, card.traits.len());
        Ok(card)
    }

    pub fn from_json_str(json: &str, user_name: &str, now: DateTime<Local>) -> Result<Self, AppError> {
        let file: CardFile = serde_json::from_str(json)
            .map_err(|e| AppError::DataLoad(format!("Malformed character card: {}", e)))?;

        let name = file.char_name.trim().to_string();
        if name.is_empty() {
            return Err(AppError::DataLoad("Character card has no char_name".to_string()));
        }

        let greeting = file
            .first_mes
            .replace("{{user}}", user_name)
            .replace("{{char}}", &name)
            .replace("{{time}}", &now.format("%Y-%m-%d %H:%M").to_string());

        Ok(Self {
            name,
            description: file.description,
            personality: file.personality,
            scenario: file.scenario,
            greeting,
            example_dialogue: file.mes_example,
            traits: file.traits,
        })
    }

    /// Description, personality and scenario as one prompt section.
    pub fn details(&self) -> String {
        format!(
            "Description: {}\n\nPersonality: {}\n\nWorld Scenario: {}",
            self.description.trim(),
            self.personality.trim(),
            self.scenario.trim()
        )
    }

    pub fn traits_block(&self) -> String {
        self.traits
            .iter()
            .map(|(trait_name, value)| format!("- {}: {}", trait_name, value))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const CARD: &str = r#"{
        "char_name": "Beedu",
        "description": "A calm listener.",
        "first_mes": "Hi {{user}}, I'm {{char}}. It's {{time}}.",
        "traits": {"empathy": 95, "humor": 30}
    }"#;

    #[test]
    fn test_greeting_placeholders() {
        let now = Local.with_ymd_and_hms(2024, 5, 1, 9, 30, 0).unwrap();
        let card = CharacterCard::from_json_str(CARD, "Asha", now).unwrap();
        assert_eq!(card.greeting, "Hi Asha, I'm Beedu. It's 2024-05-01 09:30.");
        assert_eq!(card.traits_block(), "- empathy: 95\n- humor: 30");
        assert!(card.details().starts_with("Description: A calm listener."));
    }

    #[test]
    fn test_missing_name_is_fatal() {
        let err = CharacterCard::from_json_str(r#"{"char_name": " "}"#, "Asha", Local::now()).unwrap_err();
        assert!(matches!(err, AppError::DataLoad(_)));
    }

    #[test]
    fn test_missing_file_is_fatal() {
        let err = CharacterCard::load(Path::new("/nope/card.json"), "Asha").unwrap_err();
        assert!(matches!(err, AppError::DataLoad(_)));
    }
}
