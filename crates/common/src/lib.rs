//! Reelsmith Common Utilities
//!
//! Shared infrastructure for all Reelsmith crates:
//! - Error types, stable error kinds, and diagnostics
//! - Tracing/logging initialization
//! - Configuration loading

pub mod config;
pub mod error;
pub mod logging;

pub use config::*;
pub use error::*;
