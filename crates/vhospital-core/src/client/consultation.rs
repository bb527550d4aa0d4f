//! Streaming consultation requests

use std::time::Duration;

use bytes::Bytes;
use futures::{Stream, StreamExt};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::ConsultationConfig;
use crate::consult::{ConsultEvent, ConsultationSession, StreamInterpreter};

/// Max characters of an error body quoted in a failure reason
const ERROR_BODY_EXCERPT: usize = 200;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("failed to build HTTP client: {0}")]
    Build(#[from] reqwest::Error),
    #[error("consultation cancelled")]
    Cancelled,
}

/// Body of a consultation request
#[derive(Debug, Clone, Serialize)]
pub struct ConsultationRequest<'a> {
    pub question: &'a str,
}

/// Create the channel consultation events are published on
pub fn create_event_channel() -> (
    mpsc::UnboundedSender<ConsultEvent>,
    mpsc::UnboundedReceiver<ConsultEvent>,
) {
    mpsc::unbounded_channel()
}

pub struct ConsultationClient {
    http: reqwest::Client,
    endpoint: String,
}

impl ConsultationClient {
    pub fn new(config: &ConsultationConfig) -> Result<Self, ClientError> {
        let mut builder = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs));
        if let Some(secs) = config.request_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }

        Ok(Self {
            http: builder.build()?,
            endpoint: config.endpoint.clone(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Submit a question and stream the consultation
    ///
    /// Transport problems do not return an error: they end the session with a
    /// `StreamFailed` event, and the failed session is returned. Only
    /// cancellation returns early, without emitting anything further.
    pub async fn consult(
        &self,
        question: &str,
        tx: &mpsc::UnboundedSender<ConsultEvent>,
        cancel: CancellationToken,
    ) -> Result<ConsultationSession, ClientError> {
        info!("Submitting consultation to {}", self.endpoint);

        let request = self
            .http
            .post(&self.endpoint)
            .json(&ConsultationRequest { question })
            .send();

        let response = tokio::select! {
            _ = cancel.cancelled() => {
                info!("Consultation cancelled before the service responded");
                return Err(ClientError::Cancelled);
            }
            response = request => response,
        };

        let response = match response {
            Ok(response) => response,
            Err(e) => {
                return Ok(fail_session(question, format!("request failed: {}", e), tx));
            }
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let excerpt: String = body.chars().take(ERROR_BODY_EXCERPT).collect();
            return Ok(fail_session(
                question,
                format!("HTTP {}: {}", status, excerpt.trim()),
                tx,
            ));
        }

        drive_stream(question, response.bytes_stream(), tx, cancel).await
    }
}

/// Feed a byte stream through a fresh interpreter and session
///
/// Every event is applied to the session before it is published.
pub async fn drive_stream<S, E>(
    question: &str,
    stream: S,
    tx: &mpsc::UnboundedSender<ConsultEvent>,
    cancel: CancellationToken,
) -> Result<ConsultationSession, ClientError>
where
    S: Stream<Item = Result<Bytes, E>>,
    E: std::fmt::Display,
{
    let mut session = ConsultationSession::new(question);
    let mut interpreter = StreamInterpreter::new();
    tokio::pin!(stream);

    while !interpreter.is_closed() {
        tokio::select! {
            _ = cancel.cancelled() => {
                info!("Consultation cancelled mid-stream, discarding session");
                return Err(ClientError::Cancelled);
            }
            next = stream.next() => match next {
                Some(Ok(chunk)) => {
                    publish(&mut session, interpreter.feed(&chunk), tx);
                }
                Some(Err(e)) => {
                    warn!("Consultation stream error: {}", e);
                    publish(&mut session, interpreter.fail(e.to_string()), tx);
                }
                None => {
                    publish(&mut session, interpreter.finish(), tx);
                }
            }
        }
    }

    Ok(session)
}

fn publish(
    session: &mut ConsultationSession,
    events: Vec<ConsultEvent>,
    tx: &mpsc::UnboundedSender<ConsultEvent>,
) {
    for event in events {
        session.apply(&event);
        if tx.send(event).is_err() {
            debug!("Event subscriber dropped");
        }
    }
}

fn fail_session(
    question: &str,
    reason: String,
    tx: &mpsc::UnboundedSender<ConsultEvent>,
) -> ConsultationSession {
    let mut session = ConsultationSession::new(question);
    let mut interpreter = StreamInterpreter::new();
    publish(&mut session, interpreter.fail(reason), tx);
    session
}
