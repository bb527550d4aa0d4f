//! Transcript state and manual retry

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::consult::{Consultation, ConsultationSession, SessionOutcome};

/// Shown when a consultation fails
pub const ERROR_MESSAGE: &str = "I apologize, but an error occurred. Please try again.";

/// Shown when the service found no relevant specialty and gave no answer
pub const NOT_HEALTH_RELATED_MESSAGE: &str =
    "This question does not appear to be health related. Please ask about a health concern.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub consultations: Vec<Consultation>,
    /// Whether this is the failure notice (retry replaces it)
    #[serde(default)]
    pub is_error: bool,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            consultations: Vec::new(),
            is_error: false,
        }
    }

    pub fn assistant(content: impl Into<String>, consultations: Vec<Consultation>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            consultations,
            is_error: false,
        }
    }

    fn error() -> Self {
        Self {
            is_error: true,
            ..Self::assistant(ERROR_MESSAGE, Vec::new())
        }
    }
}

/// Ordered chat history plus the question available for retry
#[derive(Debug, Default, Clone)]
pub struct Transcript {
    messages: Vec<ChatMessage>,
    last_question: Option<String>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn last_question(&self) -> Option<&str> {
        self.last_question.as_deref()
    }

    /// Record a new question, returning the trimmed text to consult on
    ///
    /// Returns None for blank input.
    pub fn submit(&mut self, input: &str) -> Option<String> {
        let question = input.trim();
        if question.is_empty() {
            return None;
        }

        self.messages.push(ChatMessage::user(question));
        self.last_question = Some(question.to_string());
        Some(question.to_string())
    }

    /// Append the outcome of a finished session
    pub fn complete(&mut self, session: &ConsultationSession) {
        match session.outcome() {
            SessionOutcome::Failed { reason } => {
                debug!("Recording failed consultation: {}", reason);
                self.fail();
            }
            SessionOutcome::Streaming | SessionOutcome::Ended => {
                let content = if session.final_answer().is_empty()
                    && session.is_not_health_related()
                {
                    NOT_HEALTH_RELATED_MESSAGE.to_string()
                } else {
                    session.final_answer().to_string()
                };
                self.messages.push(ChatMessage::assistant(
                    content,
                    session.consultations().to_vec(),
                ));
            }
        }
    }

    /// Append the failure notice
    pub fn fail(&mut self) {
        self.messages.push(ChatMessage::error());
    }

    /// Question to resubmit, dropping a trailing failure notice
    pub fn retry(&mut self) -> Option<String> {
        let question = self.last_question.clone()?;
        if self.messages.last().is_some_and(|m| m.is_error) {
            self.messages.pop();
        }
        Some(question)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consult::ConsultEvent;

    #[test]
    fn test_submit_trims_and_rejects_blank() {
        let mut transcript = Transcript::new();
        assert!(transcript.submit("   ").is_none());
        assert!(transcript.messages().is_empty());

        let question = transcript.submit("  I have a rash  ").unwrap();
        assert_eq!(question, "I have a rash");
        assert_eq!(transcript.last_question(), Some("I have a rash"));
        assert_eq!(transcript.messages()[0].role, Role::User);
    }

    #[test]
    fn test_complete_records_answer_and_consultations() {
        let mut transcript = Transcript::new();
        let mut session = ConsultationSession::new(transcript.submit("rash").unwrap());
        session.apply(&ConsultEvent::SpecialtyResponseUpdated {
            specialty: "Dermatology".into(),
            text: "Likely contact dermatitis.".into(),
        });
        session.apply(&ConsultEvent::FinalAnswerUpdated {
            text: "Avoid the irritant.".into(),
        });
        session.apply(&ConsultEvent::StreamEnded);

        transcript.complete(&session);
        let reply = &transcript.messages()[1];
        assert_eq!(reply.role, Role::Assistant);
        assert_eq!(reply.content, "Avoid the irritant.");
        assert_eq!(reply.consultations.len(), 1);
        assert_eq!(reply.consultations[0].specialty, "Dermatology");
    }

    #[test]
    fn test_not_health_related_notice() {
        let mut transcript = Transcript::new();
        let question = transcript.submit("best pizza in town?").unwrap();
        let mut session = ConsultationSession::new(question);
        session.apply(&ConsultEvent::NoSpecialties);
        session.apply(&ConsultEvent::StreamEnded);

        transcript.complete(&session);
        assert_eq!(transcript.messages()[1].content, NOT_HEALTH_RELATED_MESSAGE);
    }

    #[test]
    fn test_retry_after_failure() {
        let mut transcript = Transcript::new();
        let mut session = ConsultationSession::new(transcript.submit("headache").unwrap());
        session.apply(&ConsultEvent::StreamFailed {
            reason: "timeout".into(),
        });
        transcript.complete(&session);
        assert_eq!(transcript.messages()[1].content, ERROR_MESSAGE);

        assert_eq!(transcript.retry().as_deref(), Some("headache"));
        assert_eq!(transcript.messages().len(), 1);
    }

    #[test]
    fn test_retry_without_question() {
        let mut transcript = Transcript::new();
        assert!(transcript.retry().is_none());
    }
}
