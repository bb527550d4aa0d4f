//! Account lookup and the access gate in front of consultations

use anyhow::{Context, Result};
use tracing::info;
use vhospital_core::credits::{checkout_url, AccessDecision, CreditStore, UserIdentity};
use vhospital_core::storage::Database;
use vhospital_core::AppConfig;

pub fn open_database(config: &AppConfig) -> Result<Database> {
    let path = config.storage.resolved_database_path();
    Database::open(&path).with_context(|| format!("Failed to open credit store {}", path.display()))
}

/// Decide whether `user` may start a consultation
///
/// A known user gets an account on first use, with zero credits.
pub fn check_access(config: &AppConfig, user: Option<&UserIdentity>) -> Result<AccessDecision> {
    let credits = match user {
        Some(user) => {
            let db = open_database(config)?;
            CreditStore::new(db.conn())
                .ensure_account(&user.uid, user.email.as_deref())?
                .credits
        }
        None => 0,
    };

    let decision = AccessDecision::evaluate(user, credits);
    info!("Access decision: {:?}", decision);
    Ok(decision)
}

/// What to tell a user who was turned away, None when access is granted
pub fn denial_message(
    config: &AppConfig,
    decision: AccessDecision,
    email: Option<&str>,
) -> Result<Option<String>> {
    Ok(match decision {
        AccessDecision::Granted { .. } => None,
        AccessDecision::SignInRequired => {
            Some("Sign in to start a consultation (pass --user <uid>).".to_string())
        }
        AccessDecision::PurchaseRequired => Some(format!(
            "You have no credits left. Buy more at:\n{}",
            checkout_url(&config.checkout.url, email)?
        )),
    })
}
