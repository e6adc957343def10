//! # audiofetch common library
//!
//! Shared code for the audiofetch services:
//! - Common error type
//! - TOML bootstrap configuration
//! - Download event types and the broadcast EventBus
//! - SSE helpers

pub mod config;
pub mod error;
pub mod events;
pub mod sse;

pub use error::{Error, Result};
