//! Webhook request handling, independent of the HTTP listener

use std::collections::HashMap;

use parking_lot::Mutex;
use serde_json::{json, Value};
use tracing::{error, info, warn};

use super::order::{WebhookEvent, ORDER_CREATED};
use super::signature;
use super::WebhookError;
use crate::config::WebhookConfig;
use crate::credits::CreditStore;
use crate::storage::Database;

/// Status and JSON body sent back to the provider
#[derive(Debug, Clone, PartialEq)]
pub struct WebhookResponse {
    pub status: u16,
    pub body: Value,
}

impl WebhookResponse {
    fn ok(success: bool, message: impl Into<String>) -> Self {
        Self {
            status: 200,
            body: json!({ "success": success, "message": message.into() }),
        }
    }

    fn from_error(err: &WebhookError) -> Self {
        let status = err.status();
        let body = match err {
            WebhookError::MissingSecret | WebhookError::MissingSignature => {
                json!({ "success": false, "message": "Unauthorized" })
            }
            WebhookError::InvalidSignature => {
                json!({ "success": false, "message": "Invalid signature" })
            }
            WebhookError::MalformedPayload(_) | WebhookError::MissingOrder => {
                json!({ "success": false, "message": err.to_string() })
            }
            WebhookError::Storage(_) => {
                json!({ "success": false, "error": "Internal server error" })
            }
        };
        Self { status, body }
    }
}

/// Verifies and applies payment events to the credit store
pub struct WebhookHandler {
    secret: Option<String>,
    variant_credits: HashMap<String, u64>,
    db: Mutex<Database>,
}

impl WebhookHandler {
    pub fn new(config: &WebhookConfig, db: Database) -> Self {
        Self {
            secret: config.signing_secret.clone().filter(|s| !s.is_empty()),
            variant_credits: config.variant_credits.clone(),
            db: Mutex::new(db),
        }
    }

    /// Handle one delivery; never fails, errors map to status codes
    pub fn handle(&self, body: &[u8], signature: Option<&str>) -> WebhookResponse {
        match self.process(body, signature) {
            Ok(response) => response,
            Err(err) => {
                match &err {
                    WebhookError::Storage(e) => error!("Webhook storage failure: {:#}", e),
                    other => warn!("Rejected webhook: {}", other),
                }
                WebhookResponse::from_error(&err)
            }
        }
    }

    fn process(&self, body: &[u8], sig: Option<&str>) -> Result<WebhookResponse, WebhookError> {
        let secret = self.secret.as_deref().ok_or(WebhookError::MissingSecret)?;
        let sig = sig.ok_or(WebhookError::MissingSignature)?;
        signature::verify(secret, body, sig)?;

        let event: WebhookEvent = serde_json::from_slice(body)?;
        let event_name = event.meta.event_name.as_str();

        if event_name != ORDER_CREATED {
            info!("Ignoring webhook event {}", event_name);
            return Ok(WebhookResponse::ok(false, "Unhandled event"));
        }

        let order = event.order().ok_or(WebhookError::MissingOrder)?;
        let credits = order.credits(&self.variant_credits);

        let db = self.db.lock();
        let balance = CreditStore::new(db.conn()).add_credits(&order.user_id, credits)?;
        info!(
            "Order for {} granted {} credits (balance {})",
            order.user_id, credits, balance
        );

        Ok(WebhookResponse::ok(true, format!("Added {} credits", credits)))
    }

    /// Current balance for a user, read through the handler's connection
    pub fn balance(&self, uid: &str) -> anyhow::Result<u64> {
        let db = self.db.lock();
        CreditStore::new(db.conn()).balance(uid)
    }
}
