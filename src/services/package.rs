//! Package registry lookup used to locate `generate_uml.py`.
//!
//! When the generator settings carry no script path, the script is looked up in
//! the package that ships it. The registry query is the only asynchronous step:
//! it runs on a blocking worker and the caller polls a [`PackageLookup`] handle
//! once per tick until it settles or its deadline passes. An expired deadline
//! counts as "not found".

use camino::{Utf8Path, Utf8PathBuf};
use indexmap::IndexMap;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::fs;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::oneshot;
use tokio::sync::oneshot::error::TryRecvError;

/// Script location inside the package
pub const SCRIPT_RELATIVE_PATH: [&str; 2] = ["Python", "generate_uml.py"];

/// An installed package and where it resolves to on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageInfo {
    pub name: String,
    pub resolved_path: Utf8PathBuf,
}

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("Failed to list packages in {path}: {source}")]
    Io {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Lists the packages installed in a project
#[cfg_attr(test, mockall::automock)]
pub trait PackageRegistry: Send + Sync {
    fn list(&self) -> Result<Vec<PackageInfo>, RegistryError>;
}

/// `package.json` at the root of every package
#[derive(Debug, Deserialize)]
struct PackageManifest {
    name: String,
}

/// `Packages/manifest.json`, the project's dependency list
#[derive(Debug, Default, Deserialize)]
struct ProjectManifest {
    #[serde(default)]
    dependencies: IndexMap<String, String>,
}

/// Registry backed by the project's package folders.
///
/// - `Packages/<dir>/` holds embedded packages
/// - `file:` dependencies in `Packages/manifest.json` point at local packages,
///   relative to `Packages/`
/// - `Library/PackageCache/<name>@<version>/` holds resolved registry packages
///
/// A package is named by the `name` in its `package.json`, falling back to the
/// folder name. Embedded packages shadow local ones, which shadow cached ones.
#[derive(Debug, Clone)]
pub struct ProjectPackageRegistry {
    project_root: Utf8PathBuf,
}

impl ProjectPackageRegistry {
    pub fn new<P: AsRef<Utf8Path>>(project_root: P) -> Self {
        Self {
            project_root: project_root.as_ref().to_path_buf(),
        }
    }

    fn embedded_dir(&self) -> Utf8PathBuf {
        self.project_root.join("Packages")
    }

    /// Packages referenced as `file:<path>` in the project manifest
    fn local_packages(&self) -> Vec<PackageInfo> {
        let manifest_path = self.embedded_dir().join("manifest.json");
        let Some(manifest) = read_json::<ProjectManifest>(&manifest_path) else {
            return Vec::new();
        };

        manifest
            .dependencies
            .into_iter()
            .filter_map(|(name, version)| {
                let path = version.strip_prefix("file:")?;
                let dir = self.embedded_dir().join(path);
                if !dir.is_dir() {
                    tracing::warn!("Local package {} not found at {}", name, dir);
                    return None;
                }
                Some(PackageInfo {
                    name: package_name(&dir).unwrap_or(name),
                    resolved_path: dir,
                })
            })
            .collect()
    }

    fn cache_dir(&self) -> Utf8PathBuf {
        self.project_root.join("Library").join("PackageCache")
    }
}

impl PackageRegistry for ProjectPackageRegistry {
    fn list(&self) -> Result<Vec<PackageInfo>, RegistryError> {
        let mut packages = Vec::new();

        for (dir, dir_name) in package_dirs(&self.embedded_dir())? {
            packages.push(PackageInfo {
                name: package_name(&dir).unwrap_or(dir_name),
                resolved_path: dir,
            });
        }

        packages.extend(self.local_packages());

        for (dir, dir_name) in package_dirs(&self.cache_dir())? {
            let name = package_name(&dir).unwrap_or_else(|| {
                dir_name
                    .split_once('@')
                    .map(|(name, _version)| name.to_string())
                    .unwrap_or(dir_name)
            });
            packages.push(PackageInfo {
                name,
                resolved_path: dir,
            });
        }

        tracing::debug!("Listed {} packages under {}", packages.len(), self.project_root);
        Ok(packages)
    }
}

/// Name declared in `<dir>/package.json`
fn package_name(dir: &Utf8Path) -> Option<String> {
    read_json::<PackageManifest>(&dir.join("package.json")).map(|manifest| manifest.name)
}

/// Parse a JSON file, `None` if it is absent or malformed
fn read_json<T: DeserializeOwned>(path: &Utf8Path) -> Option<T> {
    let contents = fs::read_to_string(path).ok()?;
    match serde_json::from_str(&contents) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!("Ignoring malformed {}: {}", path, e);
            None
        }
    }
}

/// Sorted `(path, directory name)` of the visible subdirectories of `dir`
fn package_dirs(dir: &Utf8Path) -> Result<Vec<(Utf8PathBuf, String)>, RegistryError> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    let io_error = |source: std::io::Error| RegistryError::Io {
        path: dir.to_path_buf(),
        source,
    };

    let mut dirs = Vec::new();
    for entry in dir.read_dir_utf8().map_err(io_error)? {
        let entry = entry.map_err(io_error)?;
        let name = entry.file_name().to_string();
        if name.starts_with('.') || !entry.path().is_dir() {
            continue;
        }
        dirs.push((entry.path().to_path_buf(), name));
    }

    dirs.sort();
    Ok(dirs)
}

/// How a package lookup ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupOutcome {
    Found(PackageInfo),
    NotFound,
    Failed(String),
    TimedOut,
}

/// Result of a single poll
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupPoll {
    Pending,
    Ready(LookupOutcome),
}

/// In-flight registry query for one package.
///
/// Must be started from within a tokio runtime. Dropping the handle abandons
/// the query; the worker finishes on its own and its result is discarded.
#[derive(Debug)]
pub struct PackageLookup {
    package_name: String,
    receiver: oneshot::Receiver<Result<Vec<PackageInfo>, RegistryError>>,
    deadline: Instant,
}

impl PackageLookup {
    pub fn start<R>(registry: Arc<R>, package_name: impl Into<String>, timeout: Duration) -> Self
    where
        R: PackageRegistry + ?Sized + 'static,
    {
        let package_name = package_name.into();
        let (sender, receiver) = oneshot::channel();

        tracing::debug!("Looking up package '{}'", package_name);
        tokio::task::spawn_blocking(move || {
            // The receiver may already be gone if the caller gave up
            let _ = sender.send(registry.list());
        });

        Self {
            package_name,
            receiver,
            deadline: Instant::now() + timeout,
        }
    }

    /// Check for a result without blocking
    pub fn poll(&mut self) -> LookupPoll {
        match self.receiver.try_recv() {
            Ok(Ok(packages)) => LookupPoll::Ready(
                packages
                    .into_iter()
                    .find(|package| package.name == self.package_name)
                    .map_or(LookupOutcome::NotFound, LookupOutcome::Found),
            ),
            Ok(Err(e)) => LookupPoll::Ready(LookupOutcome::Failed(e.to_string())),
            Err(TryRecvError::Empty) if Instant::now() >= self.deadline => {
                LookupPoll::Ready(LookupOutcome::TimedOut)
            }
            Err(TryRecvError::Empty) => LookupPoll::Pending,
            Err(TryRecvError::Closed) => LookupPoll::Ready(LookupOutcome::Failed(
                "package registry worker exited without a result".to_string(),
            )),
        }
    }

    /// Poll once per `tick` until the lookup settles
    pub async fn settle(mut self, tick: Duration) -> LookupOutcome {
        loop {
            if let LookupPoll::Ready(outcome) = self.poll() {
                match &outcome {
                    LookupOutcome::Found(package) => {
                        tracing::info!("Package '{}' is installed.", package.name);
                        tracing::info!("Resolved path: {}", package.resolved_path);
                    }
                    LookupOutcome::NotFound => {
                        tracing::warn!("Package '{}' is not installed", self.package_name);
                    }
                    LookupOutcome::Failed(message) => {
                        tracing::error!("Failed to list packages: {}", message);
                    }
                    LookupOutcome::TimedOut => {
                        tracing::warn!(
                            "Package lookup for '{}' timed out, treating it as not installed",
                            self.package_name
                        );
                    }
                }
                return outcome;
            }

            tokio::time::sleep(tick).await;
        }
    }
}

/// Script path inside a resolved package, relative to the project root when
/// the package lives below it, always with forward slashes
pub fn derive_script_path(project_root: &Utf8Path, package_path: &Utf8Path) -> String {
    let mut script = package_path.to_path_buf();
    for component in SCRIPT_RELATIVE_PATH {
        script.push(component);
    }

    let path = script
        .strip_prefix(project_root)
        .map(Utf8Path::to_path_buf)
        .unwrap_or(script);

    path.as_str().replace('\\', "/")
}
