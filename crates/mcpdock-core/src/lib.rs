//! # McpDock Core Library
//!
//! Domain entities, repository traits, and configuration for McpDock.
//!
//! ## Modules
//!
//! - `config` - Engine configuration (explicit struct, no ambient globals)
//! - `domain` - Core entities (Connection, OAuthClient, OAuthToken, ServerTool, ApiKey)
//! - `repository` - Data access traits

pub mod config;
pub mod domain;
pub mod repository;

// Re-export commonly used types
pub use config::EngineConfig;
pub use domain::*;
pub use repository::*;
