//! # HomeClaw Core
//!
//! Shared foundation for the HomeClaw workspace: configuration loading
//! and the common error type. Everything else lives in `homeclaw-timer`.

pub mod config;
pub mod error;

pub use config::HomeClawConfig;
pub use error::{HomeClawError, Result};
