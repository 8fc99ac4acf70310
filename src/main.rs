//! drawio-updater - runs the draw.io UML generator for a project
//!
//! Main entry point for the CLI.
//!
//! # Overview
//!
//! The binary initializes:
//! - Tool settings ([`AppSettings`]: defaults, `drawio-updater.yaml`, `DRAWIO_UPDATER_*`)
//! - Logging infrastructure (file rotation in the user cache directory + console output on stderr)
//! - A tokio runtime for the subprocess and the package lookup
//! - The [`Orchestrator`] wired to the project's settings assets
//!
//! # Commands
//!
//! - `generate`: run `generate_uml.py` once with the project's settings
//! - `install-hook`: write `.git/hooks/post-commit` to run the generator after each commit
//! - `status`: show which settings were found, the command that would run, and the hook state
//!
//! # Settings Assets
//!
//! Expected as YAML files anywhere below `Assets/`:
//! - `kind: CodeAnalyzerSettings`: analyzer output directory and namespace filters
//! - `kind: UMLSettings`: Python path, script path, UML output directory, cleanup flags

use anyhow::{Context, Result};
use camino::Utf8PathBuf;
use clap::{Parser, Subcommand};
use drawio_updater::orchestrator::{LookupOptions, StatusReport};
use drawio_updater::services::{HookInstall, ProcessRunner, ProjectPackageRegistry, RunnerError};
use drawio_updater::{
    APP_NAME, AppSettings, Orchestrator, OrchestratorError, SettingsStore, VERSION,
};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

type ProjectOrchestrator = Orchestrator<SettingsStore, ProcessRunner, ProjectPackageRegistry>;

/// Runs the draw.io UML generator and manages its git post-commit hook.
#[derive(Debug, Parser)]
#[command(name = "drawio-updater", version, about)]
struct Cli {
    /// Project root; defaults to the current directory
    #[arg(long, global = true)]
    project: Option<Utf8PathBuf>,

    /// Settings file to use instead of <project>/drawio-updater.yaml
    #[arg(long, global = true)]
    config: Option<Utf8PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    /// Only write logs to the log file
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run the UML generator once
    Generate,
    /// Install a git post-commit hook that runs the generator
    InstallHook,
    /// Show discovered settings and hook state
    Status,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    let project_root = match cli.project {
        Some(path) => path,
        None => {
            let cwd = std::env::current_dir().context("Failed to read current directory")?;
            Utf8PathBuf::try_from(cwd).context("Current directory is not valid UTF-8")?
        }
    };

    let mut settings = AppSettings::load(&project_root, cli.config.as_deref())?;
    settings.debug |= cli.debug;

    // Keep the guard alive so buffered log lines are flushed on exit
    let log_path = settings.log_path();
    let _log_guard = drawio_updater::logging::setup_logging(
        log_path.as_deref(),
        APP_NAME,
        settings.debug,
        !cli.quiet,
    )?;

    tracing::info!("Starting {} v{}", APP_NAME, VERSION);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .worker_threads(2)
        .thread_name("drawio-updater-worker")
        .build()
        .context("Failed to create tokio runtime")?;

    let project_root = &settings.project_root;
    let orchestrator = Orchestrator::new(
        SettingsStore::new(settings.assets_path()),
        ProcessRunner::new().with_working_dir(project_root),
        Arc::new(ProjectPackageRegistry::new(project_root)),
        project_root,
    )
    .with_lookup_options(LookupOptions::from(&settings));

    let code = match cli.command {
        Commands::Generate => runtime.block_on(generate(&orchestrator)),
        Commands::InstallHook => runtime.block_on(install_hook(&orchestrator)),
        Commands::Status => print_status(&orchestrator.status()),
    };

    runtime.shutdown_timeout(Duration::from_secs(5));
    tracing::info!("{} finished", APP_NAME);

    Ok(code)
}

async fn generate(orchestrator: &ProjectOrchestrator) -> ExitCode {
    match orchestrator.generate().await {
        Ok(report) => {
            for line in &report.result.stdout {
                println!("{}", line);
            }
            if report.result.has_errors() {
                for line in &report.result.stderr {
                    eprintln!("{}", line);
                }
            }
            if report.result.success() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
        Err(e) => {
            if let OrchestratorError::Runner(RunnerError::Wait { stdout, .. }) = &e {
                for line in stdout {
                    println!("{}", line);
                }
            }
            tracing::error!("Generation failed: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn install_hook(orchestrator: &ProjectOrchestrator) -> ExitCode {
    match orchestrator.install_hook().await {
        Ok(HookInstall::Installed(path)) => {
            println!("Installed post-commit hook at {}", path);
            ExitCode::SUCCESS
        }
        Ok(HookInstall::AlreadyExists(path)) => {
            println!("A post-commit hook already exists at {}, leaving it unchanged", path);
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!("Hook installation failed: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn print_status(status: &StatusReport) -> ExitCode {
    let describe = |path: &Option<Utf8PathBuf>| match path {
        Some(path) => path.to_string(),
        None => "not found".to_string(),
    };

    println!("CodeAnalyzerSettings: {}", describe(&status.analyzer));
    println!("UMLSettings:          {}", describe(&status.generator));

    match &status.invocation {
        Some(Ok(invocation)) => println!("Command:              {}", invocation),
        Some(Err(e)) => println!("Command:              unavailable ({})", e),
        None => {}
    }

    let hook_state = if status.hook_installed { "installed" } else { "not installed" };
    println!("Post-commit hook:     {} ({})", hook_state, status.hook_path);

    if status.missing().is_some() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
