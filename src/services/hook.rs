//! Git post-commit hook installation.
//!
//! The hook re-runs the generator after every commit. An existing hook is never
//! touched: the file may be user-managed, so installation stops at the
//! existence check. The check and the write are not atomic; two installers
//! racing on the same repository can both see "absent".

use crate::services::command::CommandLine;
use camino::{Utf8Path, Utf8PathBuf};
use std::fs;
use thiserror::Error;

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

/// Hook file name inside `.git/hooks`
pub const POST_COMMIT_HOOK: &str = "post-commit";

/// Outcome of an install attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookInstall {
    Installed(Utf8PathBuf),
    AlreadyExists(Utf8PathBuf),
}

#[derive(Error, Debug)]
pub enum HookError {
    #[error("Failed to create hooks directory {path}: {source}")]
    CreateDir {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write hook {path}: {source}")]
    Write {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Writes the post-commit script into a hooks directory
#[derive(Debug, Clone)]
pub struct HookInstaller {
    hooks_dir: Utf8PathBuf,
}

impl HookInstaller {
    pub fn new<P: AsRef<Utf8Path>>(hooks_dir: P) -> Self {
        Self {
            hooks_dir: hooks_dir.as_ref().to_path_buf(),
        }
    }

    /// Installer for `<repo_root>/.git/hooks`
    pub fn for_repository<P: AsRef<Utf8Path>>(repo_root: P) -> Self {
        Self::new(repo_root.as_ref().join(".git").join("hooks"))
    }

    pub fn hook_path(&self) -> Utf8PathBuf {
        self.hooks_dir.join(POST_COMMIT_HOOK)
    }

    pub fn exists(&self) -> bool {
        self.hook_path().exists()
    }

    /// Write the hook unless one is already present
    pub fn install(
        &self,
        command_line: &CommandLine,
        interpreter: &str,
    ) -> Result<HookInstall, HookError> {
        let hook_path = self.hook_path();

        if hook_path.exists() {
            tracing::warn!("Post-commit hook already exists at {}, not overwriting", hook_path);
            return Ok(HookInstall::AlreadyExists(hook_path));
        }

        fs::create_dir_all(&self.hooks_dir).map_err(|source| HookError::CreateDir {
            path: self.hooks_dir.clone(),
            source,
        })?;

        fs::write(&hook_path, render_hook(command_line, interpreter)).map_err(|source| {
            HookError::Write {
                path: hook_path.clone(),
                source,
            }
        })?;

        #[cfg(unix)]
        fs::set_permissions(&hook_path, fs::Permissions::from_mode(0o755)).map_err(|source| {
            HookError::Write {
                path: hook_path.clone(),
                source,
            }
        })?;

        tracing::info!("Git post commit hook created at {}", hook_path);
        Ok(HookInstall::Installed(hook_path))
    }
}

/// Hook script body
pub fn render_hook(command_line: &CommandLine, interpreter: &str) -> String {
    format!(
        "#!/bin/bash\n\
         echo 'Git post commit hook started'\n\
         {interpreter} {command_line}\n\
         echo 'Git post commit hook finished'\n"
    )
}
