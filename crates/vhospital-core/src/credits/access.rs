//! Access gate
//!
//! Users without an account go to sign-in, users without credits go to the
//! purchase page. Neither case is an error.

use serde::{Deserialize, Serialize};

/// Signed-in user as reported by the identity provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    pub uid: String,
    pub email: Option<String>,
}

impl UserIdentity {
    pub fn new(uid: impl Into<String>, email: Option<String>) -> Self {
        Self {
            uid: uid.into(),
            email,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum AccessDecision {
    Granted { credits: u64 },
    SignInRequired,
    PurchaseRequired,
}

impl AccessDecision {
    pub fn evaluate(user: Option<&UserIdentity>, credits: u64) -> Self {
        match user {
            None => AccessDecision::SignInRequired,
            Some(_) if credits == 0 => AccessDecision::PurchaseRequired,
            Some(_) => AccessDecision::Granted { credits },
        }
    }

    pub fn is_granted(&self) -> bool {
        matches!(self, AccessDecision::Granted { .. })
    }
}
