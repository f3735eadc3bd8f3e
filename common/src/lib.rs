//! Common Utilities and Types Library
//!
//! This crate provides shared types, configuration and fixed-point helpers
//! used across the downlink PHY workspace.

pub mod config;
pub mod types;
pub mod utils;

// Re-export commonly used items
pub use config::*;
pub use types::*;
pub use utils::*;
