//! Credits and access
//!
//! - `store`: per-user credit balances in SQLite
//! - `access`: sign-in / purchase gate in front of consultations
//! - `checkout`: links to the hosted checkout for buying credits

pub mod access;
pub mod checkout;
pub mod store;

pub use access::{AccessDecision, UserIdentity};
pub use checkout::checkout_url;
pub use store::{CreditStore, UserAccount};
