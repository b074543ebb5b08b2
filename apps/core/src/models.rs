use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

/// Longest message accepted from a caller, in characters.
pub const MAX_MESSAGE_CHARS: usize = 4000;

/// Rejects NUL and other control characters. Newlines and tabs are allowed.
fn no_control_chars(value: &str) -> Result<(), ValidationError> {
    if value
        .chars()
        .any(|c| c.is_control() && !matches!(c, '\n' | '\r' | '\t'))
    {
        let mut error = ValidationError::new("control_characters");
        error.message = Some("Message contains control characters".into());
        return Err(error);
    }
    Ok(())
}

/// One user message as it crosses the supervisor boundary.
#[derive(Debug, Serialize, Deserialize, Clone, Validate)]
pub struct UserTurn {
    /// The session this message belongs to.
    #[validate(length(min = 1, max = 128), custom(function = "no_control_chars"))]
    pub session_id: String,
    /// Raw message text. May be empty; an empty message scans as calm.
    #[validate(length(max = 4000), custom(function = "no_control_chars"))]
    pub content: String,
}

impl UserTurn {
    pub fn new(session_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            content: content.into(),
        }
    }
}

/// A completed user/companion exchange, used as conversation context.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Exchange {
    pub timestamp: DateTime<Utc>,
    pub user: String,
    pub reply: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_message_is_valid() {
        assert!(UserTurn::new("s1", "I feel okay today.\nMostly.").validate().is_ok());
        assert!(UserTurn::new("s1", "").validate().is_ok());
    }

    #[test]
    fn test_nul_rejected() {
        assert!(UserTurn::new("s1", "hello\0world").validate().is_err());
        assert!(UserTurn::new("s1", "bell\u{7}").validate().is_err());
    }

    #[test]
    fn test_length_limits() {
        let long = "a".repeat(MAX_MESSAGE_CHARS + 1);
        assert!(UserTurn::new("s1", long).validate().is_err());
        let exact = "é".repeat(MAX_MESSAGE_CHARS);
        assert!(UserTurn::new("s1", exact).validate().is_ok());
        assert!(UserTurn::new("", "hi").validate().is_err());
    }
}
