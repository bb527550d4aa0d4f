//! Payment webhook
//!
//! The checkout provider calls this endpoint when an order completes. The
//! handler verifies the body signature, then credits the buyer's account.

pub mod handler;
pub mod order;
pub mod server;
pub mod signature;

pub use handler::{WebhookHandler, WebhookResponse};
pub use order::{OrderPayload, WebhookEvent, ORDER_CREATED};
pub use server::WebhookServer;
pub use signature::{sign, verify, SIGNATURE_HEADER};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum WebhookError {
    #[error("Webhook signing secret is not configured")]
    MissingSecret,

    #[error("Missing signature header")]
    MissingSignature,

    #[error("Invalid signature")]
    InvalidSignature,

    #[error("Malformed payload: {0}")]
    MalformedPayload(#[from] serde_json::Error),

    #[error("Order event without order data")]
    MissingOrder,

    #[error("Storage error: {0}")]
    Storage(#[from] anyhow::Error),
}

impl WebhookError {
    /// HTTP status returned to the caller
    pub fn status(&self) -> u16 {
        match self {
            WebhookError::MissingSecret
            | WebhookError::MissingSignature
            | WebhookError::InvalidSignature => 401,
            WebhookError::MalformedPayload(_) | WebhookError::MissingOrder => 400,
            WebhookError::Storage(_) => 500,
        }
    }
}
