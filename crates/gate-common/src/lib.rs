//! # Gate Common
//!
//! Shared types, errors, and constants used across Gatehouse components.
//!
//! ## Modules
//! - `types` - Geometry, target slots, verification and attempt records
//! - `error` - Common error types
//! - `constants` - Shared configuration constants

pub mod constants;
pub mod error;
pub mod types;

pub use error::GateError;
pub use types::*;
