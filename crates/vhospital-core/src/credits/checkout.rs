//! Checkout links for buying credits

use anyhow::{Context, Result};
use url::Url;

/// Embedded checkout URL prefilled with the buyer's email
pub fn checkout_url(base: &str, email: Option<&str>) -> Result<Url> {
    let mut url = Url::parse(base).with_context(|| format!("Invalid checkout URL: {}", base))?;
    url.query_pairs_mut()
        .append_pair("embed", "1")
        .append_pair("media", "0")
        .append_pair("discount", "0")
        .append_pair("checkout[email]", email.unwrap_or_default());
    Ok(url)
}
