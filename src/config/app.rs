use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use serde::Deserialize;
use std::time::Duration;

/// Package identifier the generator script ships in
pub const DEFAULT_PACKAGE_NAME: &str = "com.expecto.drawio-updater";

/// Optional settings file looked up in the project root
pub const SETTINGS_FILE_NAME: &str = "drawio-updater.yaml";

/// Prefix for environment overrides, e.g. `DRAWIO_UPDATER_LOOKUP_TIMEOUT_SECS`
pub const ENV_PREFIX: &str = "DRAWIO_UPDATER";

/// Tool-level settings.
///
/// Layered, lowest precedence first:
/// 1. Built-in defaults
/// 2. `drawio-updater.yaml` in the project root, or an explicit `--config` file
/// 3. `DRAWIO_UPDATER_*` environment variables
///
/// Command-line flags are applied on top by the binary.
#[derive(Debug, Clone, Deserialize)]
pub struct AppSettings {
    /// Project root; also the git repository root the hook is installed into.
    /// Always the directory passed to [`AppSettings::load`], never read from a
    /// settings file or the environment.
    #[serde(skip)]
    pub project_root: Utf8PathBuf,

    /// Directory scanned for settings assets, relative to the project root
    pub assets_dir: Utf8PathBuf,

    /// Package providing generate_uml.py
    pub package_name: String,

    /// Give up on the package lookup after this many seconds
    pub lookup_timeout_secs: u64,

    /// Poll interval for the package lookup
    pub lookup_poll_ms: u64,

    /// Directory for rotating log files. Relative paths resolve against the
    /// project root; unset means console logging only.
    pub log_dir: Option<Utf8PathBuf>,

    pub debug: bool,
}

impl AppSettings {
    /// Load settings for a project.
    ///
    /// # Arguments
    /// * `project_root` - Project directory
    /// * `config_file` - Explicit settings file; must exist when given
    pub fn load(project_root: &Utf8Path, config_file: Option<&Utf8Path>) -> Result<Self> {
        let (file, required) = match config_file {
            Some(path) => (path.to_path_buf(), true),
            None => (project_root.join(SETTINGS_FILE_NAME), false),
        };

        let mut builder = ::config::Config::builder()
            .set_default("assets_dir", "Assets")?
            .set_default("package_name", DEFAULT_PACKAGE_NAME)?
            .set_default("lookup_timeout_secs", 10_i64)?
            .set_default("lookup_poll_ms", 50_i64)?
            .set_default("debug", false)?;

        if let Some(log_dir) = default_log_dir() {
            builder = builder.set_default("log_dir", log_dir.as_str())?;
        }

        let settings = builder
            .add_source(
                ::config::File::new(file.as_str(), ::config::FileFormat::Yaml).required(required),
            )
            .add_source(::config::Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()
            .with_context(|| format!("Failed to load settings from {}", file))?;

        let mut app_settings: AppSettings = settings
            .try_deserialize()
            .with_context(|| format!("Invalid settings in {}", file))?;
        app_settings.project_root = project_root.to_path_buf();

        tracing::debug!("Loaded app settings: {:?}", app_settings);
        Ok(app_settings)
    }

    /// Absolute assets directory
    pub fn assets_path(&self) -> Utf8PathBuf {
        self.project_root.join(&self.assets_dir)
    }

    /// Absolute log directory, if file logging is enabled
    pub fn log_path(&self) -> Option<Utf8PathBuf> {
        self.log_dir.as_ref().map(|dir| self.project_root.join(dir))
    }

    pub fn lookup_timeout(&self) -> Duration {
        Duration::from_secs(self.lookup_timeout_secs)
    }

    pub fn lookup_poll_interval(&self) -> Duration {
        Duration::from_millis(self.lookup_poll_ms.max(1))
    }
}

/// Per-user cache directory for log files, kept out of the project tree
fn default_log_dir() -> Option<Utf8PathBuf> {
    let base = dirs::cache_dir().unwrap_or_else(std::env::temp_dir);
    Utf8PathBuf::from_path_buf(base)
        .ok()
        .map(|base| base.join(crate::APP_NAME).join("logs"))
}
