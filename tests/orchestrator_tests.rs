//! End-to-end tests for the Orchestrator
//!
//! These tests verify:
//! - `generate` launches the interpreter with the exact argument vector
//! - Missing settings are reported per asset and nothing is launched
//! - `install_hook` writes the template once and never overwrites it
//! - The script path self-heal resolves from the project's package folders

use camino::Utf8PathBuf;
use drawio_updater::orchestrator::{LookupOptions, OrchestratorError};
use drawio_updater::services::{
    CommandLine, HookInstall, Launcher, ProcessResult, ProcessRunner, ProjectPackageRegistry,
    RunnerError,
};
use drawio_updater::{MissingSettings, Orchestrator, SettingsStore};
use std::fs;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

/// Records every launch and reports a clean exit.
///
/// Clones share the same call log.
#[derive(Default, Clone)]
struct RecordingLauncher {
    calls: Arc<Mutex<Vec<Vec<String>>>>,
}

impl RecordingLauncher {
    fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().unwrap().clone()
    }
}

impl Launcher for RecordingLauncher {
    fn launch(
        &self,
        program: &str,
        command_line: &CommandLine,
    ) -> impl Future<Output = Result<ProcessResult, RunnerError>> + Send {
        let mut argv = vec![program.to_string()];
        argv.extend(command_line.tokens().iter().cloned());
        self.calls.lock().unwrap().push(argv);

        async {
            Ok(ProcessResult {
                completed: true,
                exit_code: Some(0),
                stdout: vec!["done".to_string()],
                ..ProcessResult::default()
            })
        }
    }
}

struct Project {
    _temp_dir: TempDir,
    root: Utf8PathBuf,
}

impl Project {
    fn new() -> Self {
        let temp_dir = TempDir::new().unwrap();
        let root = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap();
        fs::create_dir_all(root.join("Assets")).unwrap();
        Self {
            _temp_dir: temp_dir,
            root,
        }
    }

    fn with_git(self) -> Self {
        fs::create_dir_all(self.root.join(".git").join("hooks")).unwrap();
        self
    }

    fn write_asset(&self, name: &str, contents: &str) {
        fs::write(self.root.join("Assets").join(name), contents).unwrap();
    }

    fn write_default_assets(&self) {
        self.write_asset(
            "CodeAnalyzerSettings.yaml",
            "kind: CodeAnalyzerSettings\noutputDirectory: src\n",
        );
        self.write_asset(
            "UMLSettings.yaml",
            "kind: UMLSettings\n\
             pythonPath: python3\n\
             generateUMLPath: gen.py\n\
             outputDirectory: UML\n\
             cleanupClasses: true\n\
             cleanupArrows: false\n",
        );
    }

    fn orchestrator<L: Launcher>(
        &self,
        launcher: L,
    ) -> Orchestrator<SettingsStore, L, ProjectPackageRegistry> {
        Orchestrator::new(
            SettingsStore::new(self.root.join("Assets")),
            launcher,
            Arc::new(ProjectPackageRegistry::new(&self.root)),
            &self.root,
        )
        .with_lookup_options(LookupOptions {
            timeout: Duration::from_secs(5),
            poll_interval: Duration::from_millis(5),
            ..LookupOptions::default()
        })
    }
}

#[tokio::test]
async fn test_generate_invokes_exact_argument_vector() {
    let project = Project::new();
    project.write_default_assets();

    let launcher = RecordingLauncher::default();
    let orchestrator = project.orchestrator(launcher.clone());

    let report = orchestrator.generate().await.unwrap();

    assert_eq!(
        launcher.calls(),
        vec![vec!["python3", "gen.py", "-i", "src", "-o", "UML", "--cleanup-classes"]]
    );
    assert_eq!(report.result.stdout, vec!["done"]);
}

#[tokio::test]
async fn test_generate_reports_missing_generator_without_launching() {
    let project = Project::new();
    project.write_asset(
        "CodeAnalyzerSettings.yaml",
        "kind: CodeAnalyzerSettings\noutputDirectory: src\n",
    );

    let launcher = RecordingLauncher::default();
    let err = project
        .orchestrator(launcher.clone())
        .generate()
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        OrchestratorError::ConfigNotFound(MissingSettings {
            analyzer: false,
            generator: true
        })
    ));
    assert!(launcher.calls().is_empty());
}

#[tokio::test]
async fn test_generate_self_heals_script_path_from_package_cache() {
    let project = Project::new();
    project.write_asset(
        "CodeAnalyzerSettings.yaml",
        "kind: CodeAnalyzerSettings\noutputDirectory: src\n",
    );
    project.write_asset("UMLSettings.yaml", "kind: UMLSettings\n");
    fs::create_dir_all(
        project
            .root
            .join("Library/PackageCache/com.expecto.drawio-updater@1.0.3/Python"),
    )
    .unwrap();

    let launcher = RecordingLauncher::default();
    project
        .orchestrator(launcher.clone())
        .generate()
        .await
        .unwrap();

    let script = "Library/PackageCache/com.expecto.drawio-updater@1.0.3/Python/generate_uml.py";
    assert_eq!(
        launcher.calls(),
        vec![vec![
            "python",
            script,
            "-i",
            "src",
            "-o",
            "UML",
            "--cleanup-classes",
            "--cleanup-arrows"
        ]]
    );

    // The resolved path was persisted to the asset
    let saved = fs::read_to_string(project.root.join("Assets/UMLSettings.yaml")).unwrap();
    assert!(saved.contains(script));
}

#[tokio::test]
async fn test_install_hook_writes_template() {
    let project = Project::new().with_git();
    project.write_default_assets();

    let outcome = project
        .orchestrator(RecordingLauncher::default())
        .install_hook()
        .await
        .unwrap();

    let hook_path = project.root.join(".git/hooks/post-commit");
    assert!(matches!(outcome, HookInstall::Installed(_)));
    assert_eq!(
        fs::read_to_string(&hook_path).unwrap(),
        "#!/bin/bash\n\
         echo 'Git post commit hook started'\n\
         python3 gen.py -i src -o UML --cleanup-classes\n\
         echo 'Git post commit hook finished'\n"
    );
}

#[tokio::test]
async fn test_install_hook_twice_reports_already_exists() {
    let project = Project::new().with_git();
    project.write_default_assets();
    let orchestrator = project.orchestrator(RecordingLauncher::default());

    orchestrator.install_hook().await.unwrap();
    let hook_path = project.root.join(".git/hooks/post-commit");
    let before = fs::read(&hook_path).unwrap();

    let outcome = orchestrator.install_hook().await.unwrap();

    assert!(matches!(outcome, HookInstall::AlreadyExists(_)));
    assert_eq!(fs::read(&hook_path).unwrap(), before);
}

#[tokio::test]
async fn test_status_after_install() {
    let project = Project::new().with_git();
    project.write_default_assets();
    let orchestrator = project.orchestrator(RecordingLauncher::default());

    let before = orchestrator.status();
    assert!(before.missing().is_none());
    assert!(!before.hook_installed);
    assert_eq!(
        before.invocation.unwrap().unwrap().to_string(),
        "python3 gen.py -i src -o UML --cleanup-classes"
    );

    orchestrator.install_hook().await.unwrap();
    assert!(orchestrator.status().hook_installed);
}

#[cfg(unix)]
#[tokio::test]
async fn test_generate_runs_real_process() {
    let project = Project::new();
    project.write_asset(
        "CodeAnalyzerSettings.yaml",
        "kind: CodeAnalyzerSettings\noutputDirectory: src\n",
    );
    // `echo` stands in for the interpreter and prints the arguments it got
    project.write_asset(
        "UMLSettings.yaml",
        "kind: UMLSettings\npythonPath: echo\ngenerateUMLPath: gen.py\ncleanupArrows: false\n",
    );

    let runner = ProcessRunner::new().with_working_dir(&project.root);
    let report = project.orchestrator(runner).generate().await.unwrap();

    assert!(report.result.success());
    assert_eq!(
        report.result.stdout,
        vec!["gen.py -i src -o UML --cleanup-classes"]
    );
}

#[test]
fn test_generate_from_blocking_caller() {
    let project = Project::new();
    project.write_default_assets();

    let launcher = RecordingLauncher::default();
    let orchestrator = project.orchestrator(launcher.clone());

    // No surrounding runtime, like a synchronous caller
    tokio_test::block_on(orchestrator.generate()).unwrap();

    assert_eq!(launcher.calls().len(), 1);
}
