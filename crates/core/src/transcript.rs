use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One turn of the exam conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_url: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Append-only conversation log. Turns are never edited or removed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Transcript {
    turns: Vec<ChatMessage>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_user(&mut self, content: String, now: DateTime<Utc>) -> &ChatMessage {
        self.push(ChatMessage {
            role: Role::User,
            content,
            audio_url: None,
            timestamp: now,
        })
    }

    pub fn push_assistant(
        &mut self,
        content: String,
        audio_url: Option<String>,
        now: DateTime<Utc>,
    ) -> &ChatMessage {
        self.push(ChatMessage {
            role: Role::Assistant,
            content,
            audio_url,
            timestamp: now,
        })
    }

    fn push(&mut self, message: ChatMessage) -> &ChatMessage {
        self.turns.push(message);
        &self.turns[self.turns.len() - 1]
    }

    pub fn turns(&self) -> &[ChatMessage] {
        &self.turns
    }

    /// Turns appended at or after `index`, for incremental rendering.
    pub fn since(&self, index: usize) -> &[ChatMessage] {
        self.turns.get(index..).unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub(crate) fn clear(&mut self) {
        self.turns.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_append_order() {
        let now = Utc::now();
        let mut transcript = Transcript::new();
        transcript.push_assistant("Bonjour".into(), None, now);
        transcript.push_user("Je travaille au ministère".into(), now);
        transcript.push_assistant("Très bien".into(), Some("https://cdn/a.mp3".into()), now);

        let roles: Vec<Role> = transcript.turns().iter().map(|t| t.role).collect();
        assert_eq!(roles, vec![Role::Assistant, Role::User, Role::Assistant]);
        assert_eq!(transcript.since(2).len(), 1);
        assert!(transcript.since(7).is_empty());
    }
}
