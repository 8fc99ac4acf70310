// drawio-updater - runs the draw.io UML generator for a project
//
// This is the library crate containing settings discovery, command building,
// process execution and hook installation.
// The binary crate (main.rs) provides the CLI entry point.

pub mod config;
pub mod logging;
pub mod models;
pub mod orchestrator;
pub mod services;

// Re-export commonly used types for convenience
pub use config::{AppSettings, MissingSettings, SettingsProvider, SettingsStore};
pub use models::{AnalyzerConfig, Asset, GeneratorConfig};
pub use orchestrator::{Orchestrator, OrchestratorError};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
