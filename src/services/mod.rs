//! Services module - the building blocks of a generator run.
//!
//! These services have no dependency on the CLI and take every input as an
//! explicit parameter, so the [`Orchestrator`](crate::orchestrator::Orchestrator)
//! and the tests can drive them directly.
//!
//! # Components
//!
//! - [`command`]: Builds the argument list for `generate_uml.py` from the analyzer and
//!   generator settings. Token order is fixed:
//!   `<script> -i <analyzer output> -o <generator output> [--cleanup-classes] [--cleanup-arrows]`
//!
//! - [`runner`]: [`ProcessRunner`] spawns the interpreter, forces UTF-8 I/O in the child and
//!   collects stdout/stderr line by line into a [`ProcessResult`]
//!
//! - [`hook`]: [`HookInstaller`] writes `.git/hooks/post-commit` so the generator runs after
//!   each commit; an existing hook is left untouched
//!
//! - [`package`]: Finds the package that ships `generate_uml.py` when the settings do not
//!   name the script yet
//!
//! # Usage Example
//!
//! ```ignore
//! use drawio_updater::services::{command, ProcessRunner};
//!
//! let invocation = command::build_invocation(&analyzer, &generator)?;
//! let result = ProcessRunner::new()
//!     .with_working_dir(&project_root)
//!     .run(&invocation.program, &invocation.command_line)
//!     .await?;
//!
//! for line in &result.stdout {
//!     println!("{line}");
//! }
//! ```

pub mod command;
pub mod hook;
pub mod package;
pub mod runner;

pub use command::{CommandError, CommandLine, Invocation};
pub use hook::{HookError, HookInstall, HookInstaller};
pub use package::{
    LookupOutcome, LookupPoll, PackageInfo, PackageLookup, PackageRegistry,
    ProjectPackageRegistry, RegistryError,
};
pub use runner::{Launcher, ProcessResult, ProcessRunner, RunnerError};
