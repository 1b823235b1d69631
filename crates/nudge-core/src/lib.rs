//! # Nudge Core
//!
//! Shared configuration and error types for the reminder engine and its host binary.

pub mod config;
pub mod error;

pub use config::NudgeConfig;
pub use error::{NudgeError, Result};
