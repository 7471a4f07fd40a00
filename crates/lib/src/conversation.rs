//! Append-only conversation log: a seeded welcome message plus one entry per
//! user turn and bot reply. Messages are never mutated or removed once added;
//! insertion order is display order.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// First message of every session. Local only — never sent to the backend.
pub const WELCOME_MESSAGE: &str = "Bienvenido al Asistente de Consulta del Plan de Desarrollo Estatal. Estoy aquí para ayudarte a encontrar información específica sobre políticas, programas, objetivos y estrategias del plan. ¿En qué puedo asistirte hoy?";

/// Fixed notice appended when a chat exchange fails. The underlying error is
/// logged for diagnostics, never shown verbatim to the user.
pub const ERROR_NOTICE: &str = "Disculpe, he tenido un problema técnico. Por favor, verifique que el sistema esté configurado correctamente.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Bot,
}

/// One turn in the conversation. Immutable once appended.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Per-conversation sequence number; stable display key.
    pub id: u64,
    pub role: Role,
    /// Bot content may carry lightweight markup; it is rendered, not parsed.
    pub content: String,
    /// Capture time; used for display formatting only.
    pub created_at: DateTime<Utc>,
    /// Bot messages only: source passages behind the answer. `None` means not reported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_count: Option<u32>,
    /// Bot messages only: true when this is a synthesized failure notice.
    #[serde(default)]
    pub is_error: bool,
}

/// Ordered message log for one session.
#[derive(Debug)]
pub struct Conversation {
    messages: Vec<Message>,
    next_id: u64,
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}

impl Conversation {
    /// New log, seeded with the welcome message.
    pub fn new() -> Self {
        let mut conversation = Self {
            messages: Vec::new(),
            next_id: 1,
        };
        conversation.push(Role::Bot, WELCOME_MESSAGE, None, false);
        conversation
    }

    fn push(
        &mut self,
        role: Role,
        content: impl Into<String>,
        reference_count: Option<u32>,
        is_error: bool,
    ) {
        let message = Message {
            id: self.next_id,
            role,
            content: content.into(),
            created_at: Utc::now(),
            reference_count,
            is_error,
        };
        self.next_id += 1;
        self.messages.push(message);
    }

    pub fn push_user(&mut self, content: impl Into<String>) {
        self.push(Role::User, content, None, false);
    }

    pub fn push_bot(&mut self, content: impl Into<String>, reference_count: Option<u32>) {
        self.push(Role::Bot, content, reference_count, false);
    }

    /// Append the fixed technical-difficulty notice as an error-flagged bot turn.
    pub fn push_error_notice(&mut self) {
        self.push(Role::Bot, ERROR_NOTICE, None, true);
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_conversation_is_seeded_with_welcome() {
        let conversation = Conversation::new();
        assert_eq!(conversation.len(), 1);
        let first = &conversation.messages()[0];
        assert_eq!(first.id, 1);
        assert_eq!(first.role, Role::Bot);
        assert_eq!(first.content, WELCOME_MESSAGE);
        assert!(!first.is_error);
        assert_eq!(first.reference_count, None);
    }

    #[test]
    fn appends_keep_insertion_order_and_monotonic_ids() {
        let mut conversation = Conversation::new();
        conversation.push_user("¿Cuáles son los objetivos?");
        conversation.push_bot("Los objetivos son...", Some(5));
        let ids: Vec<u64> = conversation.messages().iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(conversation.messages()[1].role, Role::User);
        assert_eq!(conversation.messages()[2].role, Role::Bot);
    }

    #[test]
    fn content_and_reference_count_survive_verbatim() {
        let mut conversation = Conversation::new();
        let answer = "**Objetivo 1**: reducir la pobreza.\n\nVer sección 3.2.";
        conversation.push_bot(answer, Some(7));
        let last = conversation.last().expect("last message");
        assert_eq!(last.content, answer);
        assert_eq!(last.reference_count, Some(7));
    }

    #[test]
    fn error_notice_is_flagged_and_fixed() {
        let mut conversation = Conversation::new();
        conversation.push_error_notice();
        let last = conversation.last().expect("last message");
        assert_eq!(last.role, Role::Bot);
        assert!(last.is_error);
        assert_eq!(last.content, ERROR_NOTICE);
        assert_eq!(last.reference_count, None);
    }

    #[test]
    fn message_serializes_with_camel_case_keys() {
        let mut conversation = Conversation::new();
        conversation.push_bot("ok", Some(2));
        let value = serde_json::to_value(conversation.last().expect("last")).expect("serialize");
        assert_eq!(value["referenceCount"], 2);
        assert_eq!(value["isError"], false);
        assert!(value.get("createdAt").is_some());
    }
}
