use camino::Utf8PathBuf;
use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// A configuration kind that can be discovered in the project asset index.
///
/// Asset files are YAML documents with a top-level `kind` key; a file belongs to
/// `T` when that key equals `T::TYPE_TAG`.
pub trait SettingsAsset: Serialize + DeserializeOwned {
    /// Type tag stored in the asset's `kind` field
    const TYPE_TAG: &'static str;
}

/// Code analyzer settings (`kind: CodeAnalyzerSettings`)
///
/// Describes which namespaces the analyzer exports and where its XML output is
/// written. The generator reads that output directory as its input.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzerConfig {
    /// Output directory for generated XML files
    #[serde(default)]
    pub output_directory: String,

    /// The analyzer only exports classes from these namespaces
    #[serde(default)]
    pub namespace_filters: Vec<String>,

    /// Classes from these namespaces are combined into a single XML file
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub combined_namespace_filters: Vec<CombinedNamespaceFilter>,

    /// Symbol name to analysis context
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub contexts: IndexMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CombinedNamespaceFilter {
    #[serde(default)]
    pub namespace_filters: Vec<String>,
    pub output_file_name: String,
}

impl AnalyzerConfig {
    /// Context string tagged onto a symbol, if any
    pub fn context_for(&self, symbol: &str) -> Option<&str> {
        self.contexts.get(symbol).map(String::as_str)
    }
}

impl SettingsAsset for AnalyzerConfig {
    const TYPE_TAG: &'static str = "CodeAnalyzerSettings";
}

/// UML generator settings (`kind: UMLSettings`)
///
/// Field names follow the asset schema with `cleanupClasses` and
/// `cleanupArrows` as the two cleanup flags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratorConfig {
    /// Path to the Python executable, or `python` when it is on PATH
    #[serde(default = "default_python_path")]
    pub python_path: String,

    /// Path to the generate_uml.py script
    #[serde(rename = "generateUMLPath", default)]
    pub generate_uml_path: String,

    /// Output directory for generated UML files
    #[serde(default = "default_output_directory")]
    pub output_directory: String,

    /// Remove classes that no longer exist in the codebase
    #[serde(default = "default_true")]
    pub cleanup_classes: bool,

    /// Remove arrows whose classes are gone
    #[serde(default = "default_true")]
    pub cleanup_arrows: bool,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            python_path: default_python_path(),
            generate_uml_path: String::new(),
            output_directory: default_output_directory(),
            cleanup_classes: true,
            cleanup_arrows: true,
        }
    }
}

impl GeneratorConfig {
    /// Whether the script path still needs to be resolved
    pub fn needs_script_path(&self) -> bool {
        self.generate_uml_path.trim().is_empty()
    }
}

impl SettingsAsset for GeneratorConfig {
    const TYPE_TAG: &'static str = "UMLSettings";
}

fn default_python_path() -> String {
    "python".to_string()
}

fn default_output_directory() -> String {
    "UML".to_string()
}

fn default_true() -> bool {
    true
}

/// A configuration object together with the file it was loaded from
#[derive(Debug, Clone, PartialEq)]
pub struct Asset<T> {
    pub path: Utf8PathBuf,
    pub settings: T,
}

impl<T> Asset<T> {
    pub fn new(path: impl Into<Utf8PathBuf>, settings: T) -> Self {
        Self {
            path: path.into(),
            settings,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generator_config_defaults() {
        let config = GeneratorConfig::default();
        assert_eq!(config.python_path, "python");
        assert_eq!(config.output_directory, "UML");
        assert!(config.cleanup_classes);
        assert!(config.cleanup_arrows);
        assert!(config.needs_script_path());
    }

    #[test]
    fn test_generator_config_partial_yaml_uses_defaults() {
        let yaml = "generateUMLPath: Packages/gen/generate_uml.py\ncleanupArrows: false\n";
        let config: GeneratorConfig = serde_yaml_ng::from_str(yaml).unwrap();

        assert_eq!(config.python_path, "python");
        assert_eq!(config.generate_uml_path, "Packages/gen/generate_uml.py");
        assert!(config.cleanup_classes);
        assert!(!config.cleanup_arrows);
        assert!(!config.needs_script_path());
    }

    #[test]
    fn test_whitespace_script_path_needs_resolution() {
        let config = GeneratorConfig {
            generate_uml_path: "   ".to_string(),
            ..GeneratorConfig::default()
        };
        assert!(config.needs_script_path());
    }

    #[test]
    fn test_analyzer_config_combined_filters_and_contexts() {
        let yaml = r#"
outputDirectory: CodeAnalysis
namespaceFilters: [Game.Core, Game.UI]
combinedNamespaceFilters:
  - namespaceFilters: [Game.Net, Game.Net.Packets]
    outputFileName: Networking
contexts:
  Game.Core.Player: gameplay
  Game.UI.Hud: presentation
"#;
        let config: AnalyzerConfig = serde_yaml_ng::from_str(yaml).unwrap();

        assert_eq!(config.output_directory, "CodeAnalysis");
        assert_eq!(config.namespace_filters, vec!["Game.Core", "Game.UI"]);
        assert_eq!(config.combined_namespace_filters.len(), 1);
        assert_eq!(
            config.combined_namespace_filters[0].output_file_name,
            "Networking"
        );
        assert_eq!(config.context_for("Game.Core.Player"), Some("gameplay"));
        assert_eq!(config.context_for("Game.Core.Enemy"), None);

        // Insertion order is kept
        let symbols: Vec<&str> = config.contexts.keys().map(String::as_str).collect();
        assert_eq!(symbols, vec!["Game.Core.Player", "Game.UI.Hud"]);
    }
}
