//! Consultation service client
//!
//! Sends the question, streams the plain-text response through a
//! [`StreamInterpreter`](crate::consult::StreamInterpreter), and publishes
//! every event to a subscriber channel while keeping the session current.

mod consultation;

pub use consultation::{
    create_event_channel, drive_stream, ClientError, ConsultationClient, ConsultationRequest,
};
