//! Subcommand implementations

pub mod account;
pub mod consult;
pub mod credits;
pub mod webhook;

use anyhow::Result;
use vhospital_core::credits::checkout_url;
use vhospital_core::AppConfig;

/// Print the checkout link for buying credits
pub fn checkout(config: &AppConfig, email: Option<&str>) -> Result<()> {
    println!("{}", checkout_url(&config.checkout.url, email)?);
    Ok(())
}
