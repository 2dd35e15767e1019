// SPDX-FileCopyrightText: 2026 Plinth Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Plinth plugin bootstrapper.
//!
//! Resolution failures ([`ResolverError`]) and per-plugin load failures
//! ([`LoadError`]) are deliberately separate classes: the former abort the
//! whole pass, the latter are scoped to one plugin. [`StartupError`] covers
//! everything that must stop the host from finishing its startup.

use std::fmt;
use std::path::PathBuf;

use semver::Version;
use thiserror::Error;
use uuid::Uuid;

use crate::types::{ModuleIdentity, PluginStatus};

/// The primary error type used across collaborator traits and the binary.
#[derive(Debug, Error)]
pub enum PlinthError {
    /// Configuration errors (invalid values, unusable paths).
    #[error("configuration error: {0}")]
    Config(String),

    /// A manifest could not be written or is structurally unusable.
    #[error("manifest error at {}: {message}", path.display())]
    Manifest {
        path: PathBuf,
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Package repository errors (unreachable URL, malformed package list).
    #[error("repository error: {message}")]
    Repository {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Package download, verification or extraction failed.
    #[error("installation of package {package} failed: {message}")]
    Install {
        package: String,
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error(transparent)]
    Resolver(#[from] ResolverError),

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Startup(#[from] StartupError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

/// One requester's accepted version set for a dependency.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionRequest {
    /// Display name of the requesting plugin.
    pub requester: String,
    pub versions: Vec<Version>,
}

/// One requester's repository URL for a dependency.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryRequest {
    /// Display name of the requesting plugin.
    pub requester: String,
    pub repository_url: String,
}

/// Errors that abort an entire resolution pass.
#[derive(Debug, Error)]
pub enum ResolverError {
    #[error(
        "could not resolve a satisfactory version for plugin {dependency_id}, its dependents have no overlapping versions:\n{}",
        format_version_requests(requests)
    )]
    EmptyVersionIntersection {
        dependency_id: Uuid,
        requests: Vec<VersionRequest>,
    },

    #[error(
        "could not resolve plugin {dependency_id}, its dependents specify differing repository URLs:\n{}",
        format_repository_requests(requests)
    )]
    ConflictingRepositories {
        dependency_id: Uuid,
        requests: Vec<RepositoryRequest>,
    },

    #[error("dependency plugin {name} ({dependency_id}) at {} was found, but is {status} instead of Active", path.display())]
    DependencyNotEnabled {
        dependency_id: Uuid,
        name: String,
        path: PathBuf,
        status: PluginStatus,
    },

    #[error(
        "dependency plugin {name} ({dependency_id}) is active at version {active_version}, while a different one was required:\n{}",
        format_version_requests(requests)
    )]
    ConflictingActiveVersion {
        dependency_id: Uuid,
        name: String,
        active_version: String,
        requests: Vec<VersionRequest>,
    },

    #[error("plugin {plugin} lists more than one version for dependency {dependency_id}; only a single version per dependency is supported")]
    MultipleVersionsDeclared { plugin: String, dependency_id: Uuid },

    #[error("plugin {plugin} lists an invalid version `{version}` for dependency {dependency_id}")]
    InvalidDependencyVersion {
        plugin: String,
        dependency_id: Uuid,
        version: String,
    },

    #[error("plugin {plugin} lists no acceptable version for dependency {dependency_id}")]
    NoAcceptableVersions { plugin: String, dependency_id: Uuid },

    #[error("circular dependency detected: {}", cycle.join(" -> "))]
    DependencyCycle { cycle: Vec<String> },

    #[error("plugin {plugin} depends on {dependency_id}, which has no active instance")]
    MissingActiveDependency { plugin: String, dependency_id: Uuid },

    #[error("package with id {dependency_id} not found in repository at {repository_url}")]
    PackageNotFound {
        dependency_id: Uuid,
        repository_url: String,
    },

    #[error(
        "none of versions \"{}\" of package {dependency_id} were found in repository at {repository_url}",
        join_versions(versions)
    )]
    VersionNotInRepository {
        dependency_id: Uuid,
        repository_url: String,
        versions: Vec<Version>,
    },

    #[error("failed to install dependency {dependency_id}: {source}")]
    InstallFailed {
        dependency_id: Uuid,
        #[source]
        source: Box<PlinthError>,
    },

    #[error("plugin {name} at {} was {status} immediately after installing", path.display())]
    InstalledPluginNotActive {
        name: String,
        path: PathBuf,
        status: PluginStatus,
    },

    #[error("plugin {name} was installed at version {version}, which none of its dependents accept")]
    UnexpectedInstalledVersion { name: String, version: String },

    #[error("dependency resolution did not settle after {rounds} rounds")]
    RoundLimitExceeded { rounds: usize },
}

/// Errors scoped to discovering the module files of a single plugin.
#[derive(Debug, Error)]
pub enum ModuleDiscoveryError {
    #[error("module path `{entry}` is not inside the plugin directory {}", plugin_dir.display())]
    OutsidePluginDirectory { entry: String, plugin_dir: PathBuf },

    #[error("plugin {plugin} lists module paths that were not found in its directory: {}", join_paths(missing))]
    MissingModules { plugin: String, missing: Vec<PathBuf> },

    #[error("plugin at {} lists the stub module inside its loader whitelist", plugin_dir.display())]
    StubInWhitelist { plugin_dir: PathBuf },

    #[error("plugin at {} must list exactly one stub module in its base manifest, found {found}", plugin_dir.display())]
    NoStubEntryPoint { plugin_dir: PathBuf, found: usize },

    #[error("failed to enumerate modules in {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Per-plugin load failures. The offending plugin is disabled, other pools
/// keep loading.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to load module {}: {message}", path.display())]
    ModuleLoad { path: PathBuf, message: String },

    #[error(transparent)]
    Discovery(#[from] ModuleDiscoveryError),

    #[error("plugin {plugin} was built against more than one version of the stub module at the same time ({})", module.display())]
    DuplicateStubReference { plugin: String, module: PathBuf },

    #[error("plugin {plugin} was built against stub `{expected}`, but the bundled stub is `{found}`")]
    StubIdentityMismatch {
        plugin: String,
        expected: ModuleIdentity,
        found: ModuleIdentity,
    },

    #[error("early-load registration of module {} failed: {message}", path.display())]
    Registration { path: PathBuf, message: String },
}

/// Errors that must prevent the host from completing startup.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("dependency resolution failed: {0}")]
    Resolver(#[from] ResolverError),

    #[error("plugin {plugin} at {} requests the Main load context, but it depends on at least one plugin that does not", path.display())]
    MainContextAfterIsolated { plugin: String, path: PathBuf },

    #[error("plugin {plugin} at {} loads into the Main context and failed during early load", path.display())]
    MainContextLoadFailed {
        plugin: String,
        path: PathBuf,
        #[source]
        source: LoadError,
    },

    #[error("dependency pool {pool} lists plugin {plugin_id}, which has no active instance")]
    InconsistentPool { pool: i32, plugin_id: Uuid },
}

fn format_version_requests(requests: &[VersionRequest]) -> String {
    requests
        .iter()
        .map(|r| format!("plugin {} requires any of: {}", r.requester, join_versions(&r.versions)))
        .collect::<Vec<_>>()
        .join("\n")
}

fn format_repository_requests(requests: &[RepositoryRequest]) -> String {
    requests
        .iter()
        .map(|r| format!("plugin {} specifies: {}", r.requester, r.repository_url))
        .collect::<Vec<_>>()
        .join("\n")
}

fn join_versions(versions: &[Version]) -> String {
    versions
        .iter()
        .map(Version::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

fn join_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

impl fmt::Display for VersionRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> [{}]", self.requester, join_versions(&self.versions))
    }
}
