//! Configuration Management
//!
//! Unified configuration system with hierarchical resolution:
//! 1. Built-in defaults
//! 2. Global config (~/.config/buildwright/config.toml)
//! 3. Project config (.buildwright/config.toml)
//! 4. Environment variables (BUILDWRIGHT_*)
//! 5. CLI arguments (highest priority)

mod loader;
mod types;

pub use loader::ConfigLoader;
pub use types::*;
