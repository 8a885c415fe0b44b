//! Shared types, error model, and configuration for MoodleGet.
//!
//! This crate is the foundation depended on by all other MoodleGet crates.
//! It provides:
//! - [`MoodleGetError`]: the unified error type
//! - Domain types ([`Course`], [`Activity`])
//! - Configuration ([`AppConfig`], [`SessionConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, Credentials, CredentialsConfig, PortalConfig, SessionConfig, config_dir,
    config_file_path, init_config, load_config, load_config_from,
};
pub use error::{MoodleGetError, Result};
pub use types::{Activity, Course, DEFAULT_ACTIVITY_KIND, DEFAULT_PROGRESS, ZOOM_KIND, ZOOM_NAME};
