//! Checkout webhook payloads

use std::collections::HashMap;

use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Event that grants credits
pub const ORDER_CREATED: &str = "order_created";

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    pub meta: EventMeta,
    #[serde(default)]
    pub data: Option<EventData>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventMeta {
    pub event_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventData {
    #[serde(default)]
    pub order: Option<OrderPayload>,
}

/// Order fields needed to credit a purchase
#[derive(Debug, Clone, Deserialize)]
pub struct OrderPayload {
    #[serde(deserialize_with = "id_string")]
    pub user_id: String,
    #[serde(default, deserialize_with = "opt_id_string")]
    pub variant_id: Option<String>,
    /// Order total in cents
    #[serde(default)]
    pub total: u64,
}

impl WebhookEvent {
    pub fn order(&self) -> Option<&OrderPayload> {
        self.data.as_ref().and_then(|d| d.order.as_ref())
    }
}

impl OrderPayload {
    /// Credits granted for this order
    ///
    /// Known variants map to a fixed amount; anything else grants one credit
    /// per 100 of the order total.
    pub fn credits(&self, variant_credits: &HashMap<String, u64>) -> u64 {
        self.variant_id
            .as_ref()
            .and_then(|id| variant_credits.get(id))
            .copied()
            .unwrap_or(self.total / 100)
    }
}

/// Ids arrive as strings or numbers depending on the event
fn id_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number id, got {}",
            other
        ))),
    }
}

fn opt_id_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(None),
        Value::String(s) => Ok(Some(s)),
        Value::Number(n) => Ok(Some(n.to_string())),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number id, got {}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_order_created() {
        let event: WebhookEvent = serde_json::from_str(
            r#"{
                "meta": {"event_name": "order_created"},
                "data": {"order": {"user_id": 42, "variant_id": "starter", "total": 999}}
            }"#,
        )
        .unwrap();

        assert_eq!(event.meta.event_name, ORDER_CREATED);
        let order = event.order().unwrap();
        assert_eq!(order.user_id, "42");
        assert_eq!(order.variant_id.as_deref(), Some("starter"));
        assert_eq!(order.total, 999);
    }

    #[test]
    fn test_credit_mapping() {
        let variants = HashMap::from([("starter".to_string(), 100), ("pro".to_string(), 500)]);

        let order = |variant: Option<&str>, total| OrderPayload {
            user_id: "u".to_string(),
            variant_id: variant.map(str::to_string),
            total,
        };

        assert_eq!(order(Some("pro"), 0).credits(&variants), 500);
        assert_eq!(order(Some("unknown"), 2599).credits(&variants), 25);
        assert_eq!(order(None, 99).credits(&variants), 0);
    }

    #[test]
    fn test_subscription_event_has_no_order() {
        let event: WebhookEvent =
            serde_json::from_str(r#"{"meta": {"event_name": "subscription_created"}, "data": {}}"#)
                .unwrap();
        assert!(event.order().is_none());
    }
}
