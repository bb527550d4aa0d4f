//! Consultation events
//!
//! Events that occur while a consultation stream is consumed.

use serde::{Deserialize, Serialize};

/// Coarse phase of a consultation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    InitialAnalysis,
    SpecialistConsultation,
    FinalAnalysis,
    Completed,
    NotHealthRelated,
    Error,
}

impl Stage {
    /// Human-readable label shown next to the progress indicator
    pub fn label(&self) -> &'static str {
        match self {
            Stage::InitialAnalysis => "Initial Analysis",
            Stage::SpecialistConsultation => "Specialist Consultation",
            Stage::FinalAnalysis => "Final Analysis",
            Stage::Completed => "Consultation completed",
            Stage::NotHealthRelated => "Not Health Related",
            Stage::Error => "Error",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Progress of a single specialty within a session
///
/// Ordered so that a status may only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpecialtyStatus {
    Pending,
    Consulting,
    Completed,
}

impl std::fmt::Display for SpecialtyStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SpecialtyStatus::Pending => write!(f, "pending"),
            SpecialtyStatus::Consulting => write!(f, "consulting"),
            SpecialtyStatus::Completed => write!(f, "completed"),
        }
    }
}

/// Events emitted by the stream interpreter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ConsultEvent {
    /// The consultation moved to a new phase
    #[serde(rename = "stage_changed")]
    StageChanged { stage: Stage },

    /// The service picked the specialties it will consult, in order
    #[serde(rename = "specialties_discovered")]
    SpecialtiesDiscovered { specialties: Vec<String> },

    /// The service decided the question is not health related
    #[serde(rename = "no_specialties")]
    NoSpecialties,

    /// A specialty moved forward
    #[serde(rename = "specialty_status_changed")]
    SpecialtyStatusChanged {
        specialty: String,
        status: SpecialtyStatus,
    },

    /// Full response text of a specialty so far
    #[serde(rename = "specialty_response_updated")]
    SpecialtyResponseUpdated { specialty: String, text: String },

    /// Full final answer text so far
    #[serde(rename = "final_answer_updated")]
    FinalAnswerUpdated { text: String },

    /// The stream closed normally
    #[serde(rename = "stream_ended")]
    StreamEnded,

    /// The transport failed; nothing follows
    #[serde(rename = "stream_failed")]
    StreamFailed { reason: String },
}

impl ConsultEvent {
    /// Whether this event closes the stream
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ConsultEvent::StreamEnded | ConsultEvent::StreamFailed { .. }
        )
    }
}
