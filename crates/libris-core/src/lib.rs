//! Libris core crate - configuration and the workspace error type.
//!
//! Every other Libris crate depends on this one for its TOML configuration
//! sections and the top-level `LibrisError`.

pub mod config;
pub mod error;

pub use config::LibrisConfig;
pub use error::{LibrisError, Result};
