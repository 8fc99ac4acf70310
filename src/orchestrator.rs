//! Generator workflow: resolve settings, build the command, then run it or
//! install it as a post-commit hook.
//!
//! Both entry points are single-shot. Failures are returned as
//! [`OrchestratorError`] for the caller to report; nothing is retried.

use crate::config::{MissingSettings, SettingsPair, SettingsProvider, resolve_pair};
use crate::config::app::{AppSettings, DEFAULT_PACKAGE_NAME};
use crate::models::{Asset, GeneratorConfig};
use crate::services::command::{self, CommandError, Invocation};
use crate::services::hook::{HookError, HookInstall, HookInstaller};
use crate::services::package::{
    LookupOutcome, PackageLookup, PackageRegistry, derive_script_path,
};
use crate::services::runner::{Launcher, ProcessResult, RunnerError};
use camino::{Utf8Path, Utf8PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Errors surfaced by a generator run or hook installation
#[derive(Error, Debug)]
pub enum OrchestratorError {
    #[error(transparent)]
    ConfigNotFound(#[from] MissingSettings),

    #[error(transparent)]
    Command(#[from] CommandError),

    #[error(transparent)]
    Runner(#[from] RunnerError),

    #[error(transparent)]
    Hook(#[from] HookError),

    #[error("No git repository found at {0}")]
    GitRepositoryNotFound(Utf8PathBuf),
}

/// Package lookup parameters for the script path self-heal
#[derive(Debug, Clone)]
pub struct LookupOptions {
    pub package_name: String,
    pub timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for LookupOptions {
    fn default() -> Self {
        Self {
            package_name: DEFAULT_PACKAGE_NAME.to_string(),
            timeout: Duration::from_secs(10),
            poll_interval: Duration::from_millis(50),
        }
    }
}

impl From<&AppSettings> for LookupOptions {
    fn from(settings: &AppSettings) -> Self {
        Self {
            package_name: settings.package_name.clone(),
            timeout: settings.lookup_timeout(),
            poll_interval: settings.lookup_poll_interval(),
        }
    }
}

/// A finished generator run
#[derive(Debug, Clone)]
pub struct GenerateReport {
    pub invocation: Invocation,
    pub result: ProcessResult,
}

/// Read-only view of what `generate` and `install-hook` would do
#[derive(Debug, Clone)]
pub struct StatusReport {
    pub analyzer: Option<Utf8PathBuf>,
    pub generator: Option<Utf8PathBuf>,
    pub invocation: Option<Result<Invocation, CommandError>>,
    pub hook_path: Utf8PathBuf,
    pub hook_installed: bool,
}

impl StatusReport {
    pub fn missing(&self) -> Option<MissingSettings> {
        let missing = MissingSettings {
            analyzer: self.analyzer.is_none(),
            generator: self.generator.is_none(),
        };
        (missing.analyzer || missing.generator).then_some(missing)
    }
}

/// Drives a generator run from settings discovery to process output
pub struct Orchestrator<S, L, R: ?Sized> {
    settings: S,
    launcher: L,
    registry: Arc<R>,
    hooks: HookInstaller,
    project_root: Utf8PathBuf,
    lookup: LookupOptions,
}

impl<S, L, R> Orchestrator<S, L, R>
where
    S: SettingsProvider,
    L: Launcher,
    R: PackageRegistry + ?Sized + 'static,
{
    /// Create an orchestrator for the project (and git repository) at `project_root`
    pub fn new<P: AsRef<Utf8Path>>(settings: S, launcher: L, registry: Arc<R>, project_root: P) -> Self {
        let project_root = project_root.as_ref().to_path_buf();
        Self {
            settings,
            launcher,
            registry,
            hooks: HookInstaller::for_repository(&project_root),
            project_root,
            lookup: LookupOptions::default(),
        }
    }

    pub fn with_lookup_options(mut self, lookup: LookupOptions) -> Self {
        self.lookup = lookup;
        self
    }

    /// Run the generator once and return its captured output
    pub async fn generate(&self) -> Result<GenerateReport, OrchestratorError> {
        let mut pair = self.load_settings()?;
        self.ensure_script_path(&mut pair.generator).await;

        let invocation =
            command::build_invocation(&pair.analyzer.settings, &pair.generator.settings)?;

        tracing::info!(
            "Running Python script with arguments: {}",
            invocation.command_line
        );

        let result = match self
            .launcher
            .launch(&invocation.program, &invocation.command_line)
            .await
        {
            Ok(result) => result,
            Err(e) => {
                if let RunnerError::Wait { stdout, stderr, .. } = &e {
                    log_lines(stdout, stderr);
                }
                return Err(e.into());
            }
        };

        log_output(&result);

        Ok(GenerateReport { invocation, result })
    }

    /// Install the post-commit hook unless one already exists
    pub async fn install_hook(&self) -> Result<HookInstall, OrchestratorError> {
        let mut pair = self.load_settings()?;

        if !self.project_root.join(".git").is_dir() {
            return Err(OrchestratorError::GitRepositoryNotFound(
                self.project_root.clone(),
            ));
        }

        if self.hooks.exists() {
            let hook_path = self.hooks.hook_path();
            tracing::warn!("Post-commit hook already exists at {}", hook_path);
            return Ok(HookInstall::AlreadyExists(hook_path));
        }

        self.ensure_script_path(&mut pair.generator).await;

        let invocation =
            command::build_invocation(&pair.analyzer.settings, &pair.generator.settings)?;

        Ok(self
            .hooks
            .install(&invocation.command_line, &invocation.program)?)
    }

    /// Report settings, command and hook state without side effects
    pub fn status(&self) -> StatusReport {
        let analyzer = self.settings.find_analyzer();
        let generator = self.settings.find_generator();

        let invocation = match (&analyzer, &generator) {
            (Some(analyzer), Some(generator)) => Some(command::build_invocation(
                &analyzer.settings,
                &generator.settings,
            )),
            _ => None,
        };

        StatusReport {
            analyzer: analyzer.map(|asset| asset.path),
            generator: generator.map(|asset| asset.path),
            invocation,
            hook_path: self.hooks.hook_path(),
            hook_installed: self.hooks.exists(),
        }
    }

    fn load_settings(&self) -> Result<SettingsPair, OrchestratorError> {
        resolve_pair(&self.settings).map_err(|missing| {
            for kind in missing.kinds() {
                tracing::error!("{} not found", kind.type_tag());
            }
            OrchestratorError::ConfigNotFound(missing)
        })
    }

    /// Fill in an empty script path from the installed package.
    ///
    /// Best effort: if the package cannot be found the path stays empty and the
    /// command build reports it.
    async fn ensure_script_path(&self, generator: &mut Asset<GeneratorConfig>) {
        if !generator.settings.needs_script_path() {
            return;
        }

        let lookup = PackageLookup::start(
            Arc::clone(&self.registry),
            self.lookup.package_name.clone(),
            self.lookup.timeout,
        );

        let LookupOutcome::Found(package) = lookup.settle(self.lookup.poll_interval).await else {
            return;
        };

        generator.settings.generate_uml_path =
            derive_script_path(&self.project_root, &package.resolved_path);

        if let Err(e) = self.settings.save_generator(generator) {
            tracing::warn!("Failed to persist resolved script path: {}", e);
        }
    }
}

fn log_lines(stdout: &[String], stderr: &[String]) {
    tracing::info!("Python script output: {}", stdout.join("\n"));

    if !stderr.is_empty() {
        tracing::error!("Python script error: {}", stderr.join("\n"));
    }
}

fn log_output(result: &ProcessResult) {
    log_lines(&result.stdout, &result.stderr);

    if !result.success() {
        tracing::warn!("Python script exited with code {:?}", result.exit_code);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MockSettingsProvider;
    use crate::models::AnalyzerConfig;
    use crate::services::command::CommandLine;
    use crate::services::package::{MockPackageRegistry, PackageInfo};
    use std::future::Future;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Records launches instead of spawning processes
    #[derive(Default)]
    struct RecordingLauncher {
        calls: Mutex<Vec<(String, Vec<String>)>>,
    }

    impl Launcher for RecordingLauncher {
        fn launch(
            &self,
            program: &str,
            command_line: &CommandLine,
        ) -> impl Future<Output = Result<ProcessResult, RunnerError>> + Send {
            self.calls
                .lock()
                .unwrap()
                .push((program.to_string(), command_line.tokens().to_vec()));
            async {
                Ok(ProcessResult {
                    completed: true,
                    exit_code: Some(0),
                    ..ProcessResult::default()
                })
            }
        }
    }

    fn temp_root() -> (TempDir, Utf8PathBuf) {
        let temp_dir = TempDir::new().unwrap();
        let root = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap();
        (temp_dir, root)
    }

    fn analyzer_asset() -> Asset<AnalyzerConfig> {
        Asset::new(
            "Assets/CodeAnalyzerSettings.yaml",
            AnalyzerConfig {
                output_directory: "src".to_string(),
                ..AnalyzerConfig::default()
            },
        )
    }

    fn generator_asset(script: &str) -> Asset<GeneratorConfig> {
        Asset::new(
            "Assets/UMLSettings.yaml",
            GeneratorConfig {
                generate_uml_path: script.to_string(),
                ..GeneratorConfig::default()
            },
        )
    }

    fn fast_lookup() -> LookupOptions {
        LookupOptions {
            timeout: Duration::from_secs(2),
            poll_interval: Duration::from_millis(5),
            ..LookupOptions::default()
        }
    }

    #[tokio::test]
    async fn test_generate_reports_both_missing_settings() {
        let (_temp_dir, root) = temp_root();
        let mut settings = MockSettingsProvider::new();
        settings.expect_find_analyzer().returning(|| None);
        settings.expect_find_generator().returning(|| None);

        let orchestrator = Orchestrator::new(
            settings,
            RecordingLauncher::default(),
            Arc::new(MockPackageRegistry::new()),
            &root,
        );

        let err = orchestrator.generate().await.unwrap_err();
        assert!(matches!(
            err,
            OrchestratorError::ConfigNotFound(MissingSettings {
                analyzer: true,
                generator: true
            })
        ));
        assert!(orchestrator.launcher.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_generate_resolves_and_persists_script_path() {
        let (_temp_dir, root) = temp_root();
        let package_path = root.join("Packages").join("com.expecto.drawio-updater");

        let mut settings = MockSettingsProvider::new();
        settings
            .expect_find_analyzer()
            .returning(|| Some(analyzer_asset()));
        settings
            .expect_find_generator()
            .returning(|| Some(generator_asset("")));
        settings
            .expect_save_generator()
            .withf(|asset| {
                asset.settings.generate_uml_path
                    == "Packages/com.expecto.drawio-updater/Python/generate_uml.py"
            })
            .times(1)
            .returning(|_| Ok(()));

        let mut registry = MockPackageRegistry::new();
        registry.expect_list().times(1).returning(move || {
            Ok(vec![PackageInfo {
                name: DEFAULT_PACKAGE_NAME.to_string(),
                resolved_path: package_path.clone(),
            }])
        });

        let orchestrator = Orchestrator::new(
            settings,
            RecordingLauncher::default(),
            Arc::new(registry),
            &root,
        )
        .with_lookup_options(fast_lookup());

        let report = orchestrator.generate().await.unwrap();
        assert_eq!(
            report.invocation.to_string(),
            "python Packages/com.expecto.drawio-updater/Python/generate_uml.py -i src -o UML --cleanup-classes --cleanup-arrows"
        );
        assert_eq!(orchestrator.launcher.calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_generate_without_package_reports_script_path() {
        let (_temp_dir, root) = temp_root();
        let mut settings = MockSettingsProvider::new();
        settings
            .expect_find_analyzer()
            .returning(|| Some(analyzer_asset()));
        settings
            .expect_find_generator()
            .returning(|| Some(generator_asset("")));
        settings.expect_save_generator().never();

        let mut registry = MockPackageRegistry::new();
        registry.expect_list().returning(|| Ok(Vec::new()));

        let orchestrator = Orchestrator::new(
            settings,
            RecordingLauncher::default(),
            Arc::new(registry),
            &root,
        )
        .with_lookup_options(fast_lookup());

        let err = orchestrator.generate().await.unwrap_err();
        assert!(matches!(
            err,
            OrchestratorError::Command(CommandError::ScriptPathNotConfigured)
        ));
    }

    #[tokio::test]
    async fn test_set_script_path_skips_lookup() {
        let (_temp_dir, root) = temp_root();
        let mut settings = MockSettingsProvider::new();
        settings
            .expect_find_analyzer()
            .returning(|| Some(analyzer_asset()));
        settings
            .expect_find_generator()
            .returning(|| Some(generator_asset("gen.py")));
        settings.expect_save_generator().never();

        let mut registry = MockPackageRegistry::new();
        registry.expect_list().never();

        let orchestrator = Orchestrator::new(
            settings,
            RecordingLauncher::default(),
            Arc::new(registry),
            &root,
        );

        orchestrator.generate().await.unwrap();
    }

    #[tokio::test]
    async fn test_install_hook_requires_git_repository() {
        let (_temp_dir, root) = temp_root();
        let mut settings = MockSettingsProvider::new();
        settings
            .expect_find_analyzer()
            .returning(|| Some(analyzer_asset()));
        settings
            .expect_find_generator()
            .returning(|| Some(generator_asset("gen.py")));

        let orchestrator = Orchestrator::new(
            settings,
            RecordingLauncher::default(),
            Arc::new(MockPackageRegistry::new()),
            &root,
        );

        let err = orchestrator.install_hook().await.unwrap_err();
        assert!(matches!(err, OrchestratorError::GitRepositoryNotFound(_)));
    }

    #[tokio::test]
    async fn test_existing_hook_skips_script_path_lookup() {
        let (_temp_dir, root) = temp_root();
        let hooks_dir = root.join(".git").join("hooks");
        std::fs::create_dir_all(&hooks_dir).unwrap();
        std::fs::write(hooks_dir.join("post-commit"), "#!/bin/sh\nmake docs\n").unwrap();

        let mut settings = MockSettingsProvider::new();
        settings
            .expect_find_analyzer()
            .returning(|| Some(analyzer_asset()));
        settings
            .expect_find_generator()
            .returning(|| Some(generator_asset("")));
        settings.expect_save_generator().never();

        let mut registry = MockPackageRegistry::new();
        registry.expect_list().never();

        let orchestrator = Orchestrator::new(
            settings,
            RecordingLauncher::default(),
            Arc::new(registry),
            &root,
        )
        .with_lookup_options(fast_lookup());

        let outcome = orchestrator.install_hook().await.unwrap();

        assert_eq!(
            outcome,
            HookInstall::AlreadyExists(hooks_dir.join("post-commit"))
        );
        assert_eq!(
            std::fs::read_to_string(hooks_dir.join("post-commit")).unwrap(),
            "#!/bin/sh\nmake docs\n"
        );
    }

    #[test]
    fn test_status_reports_missing_and_hook_state() {
        let (_temp_dir, root) = temp_root();
        let mut settings = MockSettingsProvider::new();
        settings
            .expect_find_analyzer()
            .returning(|| Some(analyzer_asset()));
        settings.expect_find_generator().returning(|| None);

        let orchestrator = Orchestrator::new(
            settings,
            RecordingLauncher::default(),
            Arc::new(MockPackageRegistry::new()),
            &root,
        );

        let status = orchestrator.status();
        assert_eq!(
            status.missing(),
            Some(MissingSettings {
                analyzer: false,
                generator: true
            })
        );
        assert!(status.invocation.is_none());
        assert!(!status.hook_installed);
        assert_eq!(status.hook_path, root.join(".git/hooks/post-commit"));
    }
}
