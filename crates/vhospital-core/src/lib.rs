//! Core library for the virtual hospital client
//!
//! - Consultation stream interpretation and session state
//! - Streaming HTTP client for the consultation service
//! - Chat transcript with manual retry
//! - Credit accounts, access gating, and checkout links
//! - Payment webhook verification and crediting

pub mod chat;
pub mod client;
pub mod config;
pub mod consult;
pub mod credits;
pub mod storage;
pub mod webhook;

pub use config::AppConfig;
