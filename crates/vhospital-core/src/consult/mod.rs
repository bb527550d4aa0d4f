//! Consultation stream processing
//!
//! The consultation service answers with a loosely formatted, line-oriented
//! text stream. This module turns it into typed events and a session model:
//! - `interpreter`: incremental line scanner and marker rules
//! - `events`: events emitted while the stream is consumed
//! - `session`: session state built by applying events
//! - `specialty`: catalog of specialties the service knows about

pub mod cancellation;
pub mod events;
pub mod interpreter;
pub mod session;
pub mod specialty;

pub use cancellation::ConsultCancellation;
pub use events::{ConsultEvent, SpecialtyStatus, Stage};
pub use interpreter::StreamInterpreter;
pub use session::{Consultation, ConsultationSession, SessionOutcome, SpecialtyEntry};
