//! Domain types
//!
//! This module contains the core domain types for Carelink:
//! - Bearer credentials and identity-provider accounts
//! - The request error taxonomy and configuration errors

pub mod credential;
pub mod errors;

// Re-export commonly used types
pub use credential::{Account, Credential};
pub use errors::{ApiError, ConfigError};
