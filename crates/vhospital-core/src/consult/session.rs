//! Consultation session state
//!
//! A session is never mutated directly by the UI: the interpreter emits
//! events and the session folds them in with [`ConsultationSession::apply`].

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::events::{ConsultEvent, SpecialtyStatus, Stage};

/// Status entry for one specialty, in discovery order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecialtyEntry {
    pub specialty: String,
    pub status: SpecialtyStatus,
}

/// A specialty's response text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Consultation {
    pub specialty: String,
    pub response: String,
}

/// How the session's stream finished
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SessionOutcome {
    Streaming,
    Ended,
    Failed { reason: String },
}

/// State of one submitted question
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsultationSession {
    question: String,
    specialties: Vec<SpecialtyEntry>,
    consultations: Vec<Consultation>,
    final_answer: String,
    stage: Stage,
    not_health_related: bool,
    outcome: SessionOutcome,
}

impl ConsultationSession {
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            specialties: Vec::new(),
            consultations: Vec::new(),
            final_answer: String::new(),
            stage: Stage::InitialAnalysis,
            not_health_related: false,
            outcome: SessionOutcome::Streaming,
        }
    }

    pub fn question(&self) -> &str {
        &self.question
    }

    pub fn specialties(&self) -> &[SpecialtyEntry] {
        &self.specialties
    }

    pub fn consultations(&self) -> &[Consultation] {
        &self.consultations
    }

    pub fn final_answer(&self) -> &str {
        &self.final_answer
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn outcome(&self) -> &SessionOutcome {
        &self.outcome
    }

    pub fn is_not_health_related(&self) -> bool {
        self.not_health_related
    }

    /// Whether the stream has ended or failed
    pub fn is_finalized(&self) -> bool {
        self.outcome != SessionOutcome::Streaming
    }

    pub fn status_of(&self, specialty: &str) -> Option<SpecialtyStatus> {
        self.specialties
            .iter()
            .find(|entry| entry.specialty == specialty)
            .map(|entry| entry.status)
    }

    pub fn response_of(&self, specialty: &str) -> Option<&str> {
        self.consultations
            .iter()
            .find(|c| c.specialty == specialty)
            .map(|c| c.response.as_str())
    }

    /// Fold one event into the session
    ///
    /// Events arriving after the session is finalized are ignored.
    pub fn apply(&mut self, event: &ConsultEvent) {
        if self.is_finalized() {
            debug!("Ignoring event on finalized session: {:?}", event);
            return;
        }

        match event {
            ConsultEvent::StageChanged { stage } => {
                self.stage = *stage;
            }
            ConsultEvent::SpecialtiesDiscovered { specialties } => {
                for name in specialties {
                    self.entry_mut(name);
                }
            }
            ConsultEvent::NoSpecialties => {
                self.not_health_related = true;
            }
            ConsultEvent::SpecialtyStatusChanged { specialty, status } => {
                let entry = self.entry_mut(specialty);
                if *status < entry.status {
                    warn!(
                        "Refusing to move {} from {} back to {}",
                        specialty, entry.status, status
                    );
                } else {
                    entry.status = *status;
                }
            }
            ConsultEvent::SpecialtyResponseUpdated { specialty, text } => {
                self.entry_mut(specialty);
                match self
                    .consultations
                    .iter_mut()
                    .find(|c| &c.specialty == specialty)
                {
                    Some(existing) => existing.response = text.clone(),
                    None => self.consultations.push(Consultation {
                        specialty: specialty.clone(),
                        response: text.clone(),
                    }),
                }
            }
            ConsultEvent::FinalAnswerUpdated { text } => {
                self.final_answer = text.clone();
            }
            ConsultEvent::StreamEnded => {
                self.outcome = SessionOutcome::Ended;
            }
            ConsultEvent::StreamFailed { reason } => {
                self.stage = Stage::Error;
                self.outcome = SessionOutcome::Failed {
                    reason: reason.clone(),
                };
            }
        }
    }

    /// Status entry for a specialty, registering it as Pending when unseen
    fn entry_mut(&mut self, specialty: &str) -> &mut SpecialtyEntry {
        let idx = match self
            .specialties
            .iter()
            .position(|entry| entry.specialty == specialty)
        {
            Some(idx) => idx,
            None => {
                self.specialties.push(SpecialtyEntry {
                    specialty: specialty.to_string(),
                    status: SpecialtyStatus::Pending,
                });
                self.specialties.len() - 1
            }
        };
        &mut self.specialties[idx]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(specialty: &str, status: SpecialtyStatus) -> ConsultEvent {
        ConsultEvent::SpecialtyStatusChanged {
            specialty: specialty.to_string(),
            status,
        }
    }

    #[test]
    fn test_new_session_starts_in_initial_analysis() {
        let session = ConsultationSession::new("Why do I have headaches?");
        assert_eq!(session.question(), "Why do I have headaches?");
        assert_eq!(session.stage(), Stage::InitialAnalysis);
        assert!(session.final_answer().is_empty());
        assert!(!session.is_finalized());
    }

    #[test]
    fn test_discovery_keeps_order_and_pending() {
        let mut session = ConsultationSession::new("q");
        session.apply(&ConsultEvent::SpecialtiesDiscovered {
            specialties: vec!["Cardiology".into(), "Neurology".into()],
        });

        let names: Vec<_> = session
            .specialties()
            .iter()
            .map(|e| e.specialty.as_str())
            .collect();
        assert_eq!(names, vec!["Cardiology", "Neurology"]);
        assert!(session
            .specialties()
            .iter()
            .all(|e| e.status == SpecialtyStatus::Pending));
    }

    #[test]
    fn test_status_never_regresses() {
        let mut session = ConsultationSession::new("q");
        session.apply(&status("Cardiology", SpecialtyStatus::Consulting));
        session.apply(&status("Cardiology", SpecialtyStatus::Completed));
        session.apply(&status("Cardiology", SpecialtyStatus::Consulting));
        assert_eq!(
            session.status_of("Cardiology"),
            Some(SpecialtyStatus::Completed)
        );
    }

    #[test]
    fn test_response_registers_specialty_first() {
        let mut session = ConsultationSession::new("q");
        session.apply(&ConsultEvent::SpecialtyResponseUpdated {
            specialty: "Sleep".into(),
            text: "Keep a regular schedule.".into(),
        });
        assert_eq!(session.status_of("Sleep"), Some(SpecialtyStatus::Pending));
        assert_eq!(session.response_of("Sleep"), Some("Keep a regular schedule."));
    }

    #[test]
    fn test_failure_finalizes_without_completing() {
        let mut session = ConsultationSession::new("q");
        session.apply(&status("Cardiology", SpecialtyStatus::Consulting));
        session.apply(&ConsultEvent::StreamFailed {
            reason: "connection reset".into(),
        });
        session.apply(&status("Cardiology", SpecialtyStatus::Completed));

        assert_eq!(session.stage(), Stage::Error);
        assert_eq!(
            session.outcome(),
            &SessionOutcome::Failed {
                reason: "connection reset".into()
            }
        );
        assert_eq!(
            session.status_of("Cardiology"),
            Some(SpecialtyStatus::Consulting)
        );
    }
}
