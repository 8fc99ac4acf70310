use crate::models::{AnalyzerConfig, Asset, GeneratorConfig, SettingsAsset};
use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;
use std::fmt;
use std::fs;
use thiserror::Error;
use walkdir::{DirEntry, WalkDir};

pub mod app;

pub use app::AppSettings;

/// Errors raised while reading or writing settings assets
#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("Failed to access {path}: {source}")]
    Io {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize {path}: {source}")]
    Yaml {
        path: Utf8PathBuf,
        #[source]
        source: serde_yaml_ng::Error,
    },
}

/// The two configuration kinds the generator needs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingsKind {
    Analyzer,
    Generator,
}

impl SettingsKind {
    pub fn type_tag(self) -> &'static str {
        match self {
            SettingsKind::Analyzer => AnalyzerConfig::TYPE_TAG,
            SettingsKind::Generator => GeneratorConfig::TYPE_TAG,
        }
    }
}

/// Which configuration assets could not be found
///
/// Both kinds are checked before this is returned, so a caller can report every
/// missing asset at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MissingSettings {
    pub analyzer: bool,
    pub generator: bool,
}

impl MissingSettings {
    pub fn kinds(&self) -> Vec<SettingsKind> {
        let mut kinds = Vec::new();
        if self.analyzer {
            kinds.push(SettingsKind::Analyzer);
        }
        if self.generator {
            kinds.push(SettingsKind::Generator);
        }
        kinds
    }
}

impl fmt::Display for MissingSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let message = self
            .kinds()
            .iter()
            .map(|kind| format!("{} not found", kind.type_tag()))
            .collect::<Vec<_>>()
            .join("; ");
        f.write_str(&message)
    }
}

impl std::error::Error for MissingSettings {}

/// Both configuration assets, resolved
#[derive(Debug, Clone)]
pub struct SettingsPair {
    pub analyzer: Asset<AnalyzerConfig>,
    pub generator: Asset<GeneratorConfig>,
}

/// Source of the analyzer and generator configuration.
///
/// [`SettingsStore`] is the file-backed implementation; the orchestrator only
/// depends on this trait.
#[cfg_attr(test, mockall::automock)]
pub trait SettingsProvider {
    fn find_analyzer(&self) -> Option<Asset<AnalyzerConfig>>;

    fn find_generator(&self) -> Option<Asset<GeneratorConfig>>;

    /// Persist a generator asset after its script path was filled in
    fn save_generator(&self, asset: &Asset<GeneratorConfig>) -> Result<(), SettingsError>;
}

/// Look up both configurations, reporting every missing kind
pub fn resolve_pair<P: SettingsProvider + ?Sized>(
    provider: &P,
) -> Result<SettingsPair, MissingSettings> {
    let analyzer = provider.find_analyzer();
    let generator = provider.find_generator();

    match (analyzer, generator) {
        (Some(analyzer), Some(generator)) => Ok(SettingsPair {
            analyzer,
            generator,
        }),
        (analyzer, generator) => Err(MissingSettings {
            analyzer: analyzer.is_none(),
            generator: generator.is_none(),
        }),
    }
}

/// Settings store backed by YAML assets in the project tree.
///
/// Every `*.yaml`/`*.yml` file below the assets directory is part of the index.
/// The index is sorted by path, so when several assets share a type tag the
/// lexicographically first one wins.
#[derive(Debug, Clone)]
pub struct SettingsStore {
    assets_dir: Utf8PathBuf,
}

impl SettingsStore {
    /// Create a store scanning the given assets directory.
    ///
    /// The directory does not have to exist; a missing directory simply
    /// yields no assets.
    pub fn new<P: AsRef<Utf8Path>>(assets_dir: P) -> Self {
        Self {
            assets_dir: assets_dir.as_ref().to_path_buf(),
        }
    }

    pub fn assets_dir(&self) -> &Utf8Path {
        &self.assets_dir
    }

    /// Find the first asset tagged with `T::TYPE_TAG`
    pub fn find<T: SettingsAsset>(&self) -> Option<Asset<T>> {
        let mut matches = self
            .index()
            .into_iter()
            .filter_map(|path| load_tagged::<T>(&path).map(|settings| Asset::new(path, settings)));

        let first = matches.next()?;

        let ignored: Vec<Utf8PathBuf> = matches.map(|asset| asset.path).collect();
        if !ignored.is_empty() {
            tracing::warn!(
                "Multiple {} assets found, using {} and ignoring {:?}",
                T::TYPE_TAG,
                first.path,
                ignored
            );
        }

        tracing::debug!("Found {} at {}", T::TYPE_TAG, first.path);
        Some(first)
    }

    /// Look up both configurations
    pub fn load_pair(&self) -> Result<SettingsPair, MissingSettings> {
        resolve_pair(self)
    }

    /// Write an asset back to the file it was loaded from
    pub fn save<T: SettingsAsset>(&self, asset: &Asset<T>) -> Result<(), SettingsError> {
        let yaml_string = serde_yaml_ng::to_string(&Tagged {
            kind: T::TYPE_TAG,
            settings: &asset.settings,
        })
        .map_err(|source| SettingsError::Yaml {
            path: asset.path.clone(),
            source,
        })?;

        fs::write(&asset.path, yaml_string).map_err(|source| SettingsError::Io {
            path: asset.path.clone(),
            source,
        })?;

        tracing::info!("Saved {} to {}", T::TYPE_TAG, asset.path);
        Ok(())
    }

    /// All candidate asset files, sorted by path
    fn index(&self) -> Vec<Utf8PathBuf> {
        if !self.assets_dir.is_dir() {
            tracing::warn!("Assets directory not found: {}", self.assets_dir);
            return Vec::new();
        }

        let mut files: Vec<Utf8PathBuf> = WalkDir::new(&self.assets_dir)
            .into_iter()
            .filter_entry(|entry| entry.depth() == 0 || !is_hidden(entry))
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    tracing::warn!("Skipping unreadable entry under {}: {}", self.assets_dir, e);
                    None
                }
            })
            .filter(is_asset_file)
            .filter_map(|entry| match Utf8PathBuf::from_path_buf(entry.into_path()) {
                Ok(path) => Some(path),
                Err(path) => {
                    tracing::warn!("Skipping non UTF-8 path {}", path.display());
                    None
                }
            })
            .filter(|path| matches!(path.extension(), Some("yaml" | "yml")))
            .collect();

        files.sort();
        files
    }
}

impl SettingsProvider for SettingsStore {
    fn find_analyzer(&self) -> Option<Asset<AnalyzerConfig>> {
        self.find()
    }

    fn find_generator(&self) -> Option<Asset<GeneratorConfig>> {
        self.find()
    }

    fn save_generator(&self, asset: &Asset<GeneratorConfig>) -> Result<(), SettingsError> {
        self.save(asset)
    }
}

#[derive(Serialize)]
struct Tagged<'a, T> {
    kind: &'static str,
    #[serde(flatten)]
    settings: &'a T,
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .is_some_and(|name| name.starts_with('.'))
}

/// Regular files, plus symlinks that point at one. Linked directories are
/// never descended into.
fn is_asset_file(entry: &DirEntry) -> bool {
    entry.file_type().is_file() || (entry.path_is_symlink() && entry.path().is_file())
}

/// Parse `path` as a `T` if its `kind` tag matches
fn load_tagged<T: SettingsAsset>(path: &Utf8Path) -> Option<T> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) => {
            tracing::warn!("Failed to read asset {}: {}", path, e);
            return None;
        }
    };

    let value: serde_yaml_ng::Value = match serde_yaml_ng::from_str(&contents) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!("Skipping unparseable asset {}: {}", path, e);
            return None;
        }
    };

    if value.get("kind").and_then(serde_yaml_ng::Value::as_str) != Some(T::TYPE_TAG) {
        return None;
    }

    match serde_yaml_ng::from_value(value) {
        Ok(settings) => Some(settings),
        Err(e) => {
            tracing::warn!("Invalid {} asset {}: {}", T::TYPE_TAG, path, e);
            None
        }
    }
}
