//! `webhook serve`

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};
use vhospital_core::webhook::{WebhookHandler, WebhookServer};
use vhospital_core::AppConfig;

use super::account::open_database;

/// Run the payment webhook listener until Ctrl-C
pub async fn serve(config: &AppConfig, listen: Option<&str>) -> Result<()> {
    let webhook = &config.webhook;
    if webhook.signing_secret.as_deref().unwrap_or_default().is_empty() {
        warn!("No signing secret configured; every delivery will be rejected");
    }

    let handler = Arc::new(WebhookHandler::new(webhook, open_database(config)?));
    let addr = listen.unwrap_or(webhook.listen_addr.as_str());
    let server = Arc::new(WebhookServer::bind(addr, &webhook.path, handler)?);
    if let Some(local) = server.local_addr() {
        println!("Listening for webhooks on http://{}{}", local, webhook.path);
    }

    let serving = server.clone();
    let listener = tokio::task::spawn_blocking(move || serving.serve());

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;
    info!("Shutting down webhook listener");
    server.unblock();
    listener.await.context("Webhook listener panicked")?;
    Ok(())
}
