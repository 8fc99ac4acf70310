//! Data models for drawio-updater.
//!
//! - [`AnalyzerConfig`]: code analyzer settings (`kind: CodeAnalyzerSettings`), the
//!   namespaces to export and the XML output directory the generator reads from
//! - [`GeneratorConfig`]: UML generator settings (`kind: UMLSettings`), interpreter and
//!   script paths, output directory and cleanup flags
//! - [`Asset`]: a discovered configuration paired with the file it came from
//! - [`SettingsAsset`]: the type-tag contract used by [`SettingsStore`](crate::config::SettingsStore)
//!   to discover assets

pub mod config;

pub use config::{
    AnalyzerConfig, Asset, CombinedNamespaceFilter, GeneratorConfig, SettingsAsset,
};
