//! Chat transcript
//!
//! Visible history of questions and consultation results for one user.

mod transcript;

pub use transcript::{ChatMessage, Role, Transcript, ERROR_MESSAGE, NOT_HEALTH_RELATED_MESSAGE};
