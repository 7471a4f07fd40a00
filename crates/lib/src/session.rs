//! One chat session: conversation log, submission gate, and the submit flow
//! against a [`PlanBackend`].

use crate::api::PlanBackend;
use crate::conversation::Conversation;
use crate::gate::SubmissionGate;
use std::sync::Arc;

/// Default result-count hint sent with every query.
pub const DEFAULT_TOP_K: u32 = 10;

/// Outcome of a [`ChatSession::submit`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// The backend answered; the conversation grew by a user and a bot message.
    Answered,
    /// The exchange failed; the conversation grew by a user message and the fixed error notice.
    Failed,
    /// Trimmed input was empty; nothing changed.
    IgnoredEmpty,
    /// A request is already outstanding; nothing changed.
    IgnoredBusy,
}

/// A single user-facing chat session. Owns its conversation and gate; state
/// lives here and is handed to presentation code by reference.
pub struct ChatSession<B> {
    id: String,
    backend: B,
    conversation: Conversation,
    gate: Arc<SubmissionGate>,
    top_k: u32,
}

impl<B: PlanBackend> ChatSession<B> {
    pub fn new(backend: B, top_k: u32) -> Self {
        let id = format!("sess-{}", uuid::Uuid::new_v4());
        log::info!("{}: session started (top_k={})", id, top_k);
        Self {
            id,
            backend,
            conversation: Conversation::new(),
            gate: Arc::new(SubmissionGate::new()),
            top_k,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    /// Shared handle for presentation code that wants to observe busyness.
    pub fn gate(&self) -> Arc<SubmissionGate> {
        Arc::clone(&self.gate)
    }

    /// Relay one user message to the backend.
    ///
    /// Empty input and submissions while a request is outstanding are silent
    /// no-ops. The user message is appended before the network round-trip, so
    /// display order is always user-then-bot; the gate permit is dropped on
    /// every exit path, so no outcome can leave the session stuck busy.
    pub async fn submit(&mut self, text: &str) -> SubmitOutcome {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return SubmitOutcome::IgnoredEmpty;
        }
        let Some(_permit) = self.gate.try_acquire() else {
            log::debug!("{}: submission ignored, request outstanding", self.id);
            return SubmitOutcome::IgnoredBusy;
        };
        self.conversation.push_user(trimmed);
        match self.backend.send_chat(trimmed, self.top_k).await {
            Ok(answer) => {
                self.conversation
                    .push_bot(answer.response, answer.passages_used);
                SubmitOutcome::Answered
            }
            Err(e) => {
                log::warn!("{}: chat request failed: {}", self.id, e);
                self.conversation.push_error_notice();
                SubmitOutcome::Failed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{ApiError, ChatAnswer, SystemStatus};
    use crate::conversation::{Role, ERROR_NOTICE};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::OnceLock;

    /// Canned answer or failure; records whether the gate was busy while the
    /// chat call was in flight.
    #[derive(Clone, Default)]
    struct StubBackend {
        inner: Arc<StubState>,
    }

    #[derive(Default)]
    struct StubState {
        answer: Option<ChatAnswer>,
        gate: OnceLock<Arc<SubmissionGate>>,
        busy_during_call: AtomicBool,
    }

    impl StubBackend {
        fn answering(response: &str, passages_used: Option<u32>) -> Self {
            Self {
                inner: Arc::new(StubState {
                    answer: Some(ChatAnswer {
                        response: response.to_string(),
                        passages_used,
                    }),
                    ..StubState::default()
                }),
            }
        }

        fn failing() -> Self {
            Self::default()
        }
    }

    #[async_trait]
    impl PlanBackend for StubBackend {
        async fn fetch_status(&self) -> Result<SystemStatus, ApiError> {
            unreachable!("submission path never checks status")
        }

        async fn trigger_initialize(&self) -> Result<bool, ApiError> {
            unreachable!("submission path never initializes")
        }

        async fn send_chat(&self, _query: &str, _top_k: u32) -> Result<ChatAnswer, ApiError> {
            if let Some(gate) = self.inner.gate.get() {
                self.inner
                    .busy_during_call
                    .store(gate.is_busy(), Ordering::SeqCst);
            }
            match &self.inner.answer {
                Some(answer) => Ok(answer.clone()),
                None => Err(ApiError::Status {
                    status: 500,
                    reason: "Internal Server Error".to_string(),
                }),
            }
        }
    }

    #[tokio::test]
    async fn answered_submit_appends_user_then_bot() {
        let backend = StubBackend::answering("Los objetivos son...", Some(5));
        let mut session = ChatSession::new(backend, DEFAULT_TOP_K);

        let outcome = session.submit("  ¿Cuáles son los objetivos?  ").await;
        assert_eq!(outcome, SubmitOutcome::Answered);

        let messages = session.conversation().messages();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[1].role, Role::User);
        assert_eq!(messages[1].content, "¿Cuáles son los objetivos?");
        assert_eq!(messages[2].role, Role::Bot);
        assert_eq!(messages[2].reference_count, Some(5));
        assert!(!messages[2].is_error);
    }

    #[tokio::test]
    async fn failed_submit_appends_error_notice() {
        let mut session = ChatSession::new(StubBackend::failing(), DEFAULT_TOP_K);

        let outcome = session.submit("¿Qué programas existen?").await;
        assert_eq!(outcome, SubmitOutcome::Failed);

        let messages = session.conversation().messages();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[1].role, Role::User);
        let notice = &messages[2];
        assert!(notice.is_error);
        assert_eq!(notice.content, ERROR_NOTICE);
        assert_eq!(notice.reference_count, None);
        assert!(!session.gate().is_busy());
    }

    #[tokio::test]
    async fn empty_and_whitespace_submissions_are_no_ops() {
        let mut session = ChatSession::new(StubBackend::failing(), DEFAULT_TOP_K);

        assert_eq!(session.submit("").await, SubmitOutcome::IgnoredEmpty);
        assert_eq!(session.submit("   ").await, SubmitOutcome::IgnoredEmpty);
        assert_eq!(session.conversation().len(), 1);
        assert!(!session.gate().is_busy());
    }

    #[tokio::test]
    async fn busy_gate_makes_submit_a_no_op() {
        let mut session =
            ChatSession::new(StubBackend::answering("no debería llegar", None), DEFAULT_TOP_K);
        let gate = session.gate();
        let _permit = gate.try_acquire().expect("acquire gate");

        assert_eq!(session.submit("hola").await, SubmitOutcome::IgnoredBusy);
        assert_eq!(session.conversation().len(), 1);
    }

    #[tokio::test]
    async fn gate_is_busy_during_the_call_and_released_after() {
        let backend = StubBackend::answering("ok", None);
        let probe = backend.clone();
        let mut session = ChatSession::new(backend, DEFAULT_TOP_K);
        probe
            .inner
            .gate
            .set(session.gate())
            .ok()
            .expect("set gate probe");

        assert!(!session.gate().is_busy());
        session.submit("hola").await;
        assert!(probe.inner.busy_during_call.load(Ordering::SeqCst));
        assert!(!session.gate().is_busy());
    }
}
