// SPDX-FileCopyrightText: 2026 Plinth Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Requirement edges and version-set intersection.
//!
//! Every Active loader-aware plugin contributes one [`Requirement`] per
//! declared dependency. Requirements are grouped per dependency id in
//! first-seen order and classified against the installed registry: either
//! satisfied, a fatal conflict, or a [`MissingDependency`] to install.

use indexmap::IndexMap;
use plinth_core::{PluginId, RepositoryRequest, ResolverError, VersionRequest, parse_version};
use plinth_plugin::{InstalledPluginInfo, PluginRegistry};
use semver::Version;

/// One plugin's requirement on a dependency.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requirement {
    pub requester: String,
    pub requester_id: PluginId,
    pub repository_url: String,
    /// Acceptable versions, in declaration order.
    pub versions: Vec<Version>,
}

impl Requirement {
    pub fn accepts(&self, version: &Version) -> bool {
        self.versions.contains(version)
    }
}

/// Requirements grouped by dependency id, in first-seen order.
pub type RequirementSet = IndexMap<PluginId, Vec<Requirement>>;

/// A dependency that must be installed from a repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingDependency {
    pub id: PluginId,
    pub repository_url: String,
    /// Versions every requester accepts, in the first requester's order.
    pub candidates: Vec<Version>,
}

/// Collects the requirement edges of every Active loader-aware plugin.
///
/// Unless `allow_version_sets` is set, a dependency must name exactly one
/// version.
pub fn collect_requirements(
    registry: &PluginRegistry,
    allow_version_sets: bool,
) -> Result<RequirementSet, ResolverError> {
    let mut requirements = RequirementSet::new();
    for plugin in registry.active_plugins() {
        for dependency in plugin.dependencies() {
            if dependency.versions.is_empty() {
                return Err(ResolverError::NoAcceptableVersions {
                    plugin: plugin.name().to_string(),
                    dependency_id: dependency.id,
                });
            }
            if dependency.versions.len() > 1 && !allow_version_sets {
                return Err(ResolverError::MultipleVersionsDeclared {
                    plugin: plugin.name().to_string(),
                    dependency_id: dependency.id,
                });
            }

            let mut versions = Vec::with_capacity(dependency.versions.len());
            for raw in &dependency.versions {
                let version =
                    parse_version(raw).ok_or_else(|| ResolverError::InvalidDependencyVersion {
                        plugin: plugin.name().to_string(),
                        dependency_id: dependency.id,
                        version: raw.clone(),
                    })?;
                if !versions.contains(&version) {
                    versions.push(version);
                }
            }

            requirements.entry(dependency.id).or_default().push(Requirement {
                requester: plugin.name().to_string(),
                requester_id: plugin.id(),
                repository_url: dependency.repository_url.clone(),
                versions,
            });
        }
    }
    Ok(requirements)
}

/// Versions accepted by every requirement, in the first requirement's order.
pub fn intersect(requirements: &[Requirement]) -> Vec<Version> {
    let Some((first, rest)) = requirements.split_first() else {
        return Vec::new();
    };
    first
        .versions
        .iter()
        .filter(|v| rest.iter().all(|r| r.accepts(v)))
        .cloned()
        .collect()
}

fn satisfies_all(info: &InstalledPluginInfo, requirements: &[Requirement]) -> bool {
    info.version_valid && requirements.iter().all(|r| r.accepts(&info.version))
}

/// Decides whether `dependency_id` is satisfied, conflicting or missing.
pub fn classify(
    registry: &PluginRegistry,
    dependency_id: PluginId,
    requirements: &[Requirement],
) -> Result<Option<MissingDependency>, ResolverError> {
    let installed = registry.versions(&dependency_id);
    let satisfying: Vec<&InstalledPluginInfo> = installed
        .iter()
        .filter(|info| satisfies_all(info, requirements))
        .collect();

    if satisfying.iter().any(|info| info.is_active()) {
        return Ok(None);
    }
    if let Some(found) = satisfying.first() {
        return Err(ResolverError::DependencyNotEnabled {
            dependency_id,
            name: found.name().to_string(),
            path: found.path.clone(),
            status: found.status(),
        });
    }
    if let Some(active) = registry.active(&dependency_id) {
        return Err(ResolverError::ConflictingActiveVersion {
            dependency_id,
            name: active.name().to_string(),
            active_version: active.manifest.version.clone(),
            requests: version_requests(requirements),
        });
    }

    let candidates = intersect(requirements);
    if candidates.is_empty() {
        return Err(ResolverError::EmptyVersionIntersection {
            dependency_id,
            requests: version_requests(requirements),
        });
    }

    let repository_url = requirements
        .first()
        .map(|r| r.repository_url.clone())
        .unwrap_or_default();
    if requirements.iter().any(|r| r.repository_url != repository_url) {
        return Err(ResolverError::ConflictingRepositories {
            dependency_id,
            requests: requirements
                .iter()
                .map(|r| RepositoryRequest {
                    requester: r.requester.clone(),
                    repository_url: r.repository_url.clone(),
                })
                .collect(),
        });
    }

    Ok(Some(MissingDependency {
        id: dependency_id,
        repository_url,
        candidates,
    }))
}

/// Classifies every grouped dependency, returning the ones to install.
pub fn find_missing(
    registry: &PluginRegistry,
    requirements: &RequirementSet,
) -> Result<Vec<MissingDependency>, ResolverError> {
    let mut missing = Vec::new();
    for (dependency_id, group) in requirements {
        if let Some(dependency) = classify(registry, *dependency_id, group)? {
            missing.push(dependency);
        }
    }
    Ok(missing)
}

fn version_requests(requirements: &[Requirement]) -> Vec<VersionRequest> {
    requirements
        .iter()
        .map(|r| VersionRequest {
            requester: r.requester.clone(),
            versions: r.versions.clone(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use plinth_core::{DependencyDeclaration, LoaderManifest, PluginManifest, PluginStatus};
    use uuid::Uuid;

    const REPO: &str = "https://repo.example/manifest.json";

    fn v(s: &str) -> Version {
        parse_version(s).unwrap()
    }

    fn requirement(requester: &str, url: &str, versions: &[&str]) -> Requirement {
        Requirement {
            requester: requester.to_string(),
            requester_id: Uuid::new_v4(),
            repository_url: url.to_string(),
            versions: versions.iter().map(|s| v(s)).collect(),
        }
    }

    fn dependent(name: &str, dependency: Uuid, versions: &[&str]) -> InstalledPluginInfo {
        let loader = LoaderManifest {
            dependencies: vec![DependencyDeclaration {
                repository_url: REPO.to_string(),
                id: dependency,
                versions: versions.iter().map(|s| s.to_string()).collect(),
            }],
            ..Default::default()
        };
        InstalledPluginInfo::new(
            format!("/p/{name}"),
            PluginManifest::new(Uuid::new_v4(), name, "1.0.0"),
            Some(loader),
        )
    }

    fn installed(id: Uuid, version: &str, status: PluginStatus) -> InstalledPluginInfo {
        let mut manifest = PluginManifest::new(id, "Lib", version);
        manifest.status = status;
        InstalledPluginInfo::new(format!("/p/lib_{version}"), manifest, None)
    }

    #[test]
    fn intersection_keeps_common_versions_in_order() {
        let reqs = vec![
            requirement("A", REPO, &["1.0", "1.1"]),
            requirement("B", REPO, &["1.1", "1.2"]),
        ];
        assert_eq!(intersect(&reqs), vec![v("1.1")]);
        assert!(intersect(&[]).is_empty());
    }

    #[test]
    fn multiple_versions_require_opt_in() {
        let lib = Uuid::new_v4();
        let mut registry = PluginRegistry::new();
        registry.insert(dependent("A", lib, &["1.0", "1.1"]));

        let err = collect_requirements(&registry, false).unwrap_err();
        assert!(matches!(err, ResolverError::MultipleVersionsDeclared { .. }));

        let reqs = collect_requirements(&registry, true).unwrap();
        assert_eq!(reqs[&lib][0].versions, vec![v("1.0"), v("1.1")]);
    }

    #[test]
    fn invalid_dependency_version_is_rejected() {
        let mut registry = PluginRegistry::new();
        registry.insert(dependent("A", Uuid::new_v4(), &["latest"]));
        let err = collect_requirements(&registry, false).unwrap_err();
        assert!(matches!(
            err,
            ResolverError::InvalidDependencyVersion { ref version, .. } if version == "latest"
        ));
    }

    #[test]
    fn inactive_dependents_contribute_no_edges() {
        let mut registry = PluginRegistry::new();
        let mut a = dependent("A", Uuid::new_v4(), &["1.0"]);
        a.manifest.status = PluginStatus::Disabled;
        registry.insert(a);
        assert!(collect_requirements(&registry, false).unwrap().is_empty());
    }

    #[test]
    fn active_satisfying_version_is_not_missing() {
        let lib = Uuid::new_v4();
        let mut registry = PluginRegistry::new();
        registry.insert(installed(lib, "1.0", PluginStatus::Disabled));
        registry.insert(installed(lib, "1.1", PluginStatus::Active));
        let reqs = vec![requirement("A", REPO, &["1.0", "1.1"])];
        assert_eq!(classify(&registry, lib, &reqs).unwrap(), None);
    }

    #[test]
    fn disabled_satisfying_version_is_not_auto_enabled() {
        let lib = Uuid::new_v4();
        let mut registry = PluginRegistry::new();
        registry.insert(installed(lib, "1.0", PluginStatus::Disabled));
        let err = classify(&registry, lib, &[requirement("A", REPO, &["1.0"])]).unwrap_err();
        assert!(matches!(
            err,
            ResolverError::DependencyNotEnabled {
                status: PluginStatus::Disabled,
                ..
            }
        ));
    }

    #[test]
    fn different_active_version_conflicts() {
        let lib = Uuid::new_v4();
        let mut registry = PluginRegistry::new();
        registry.insert(installed(lib, "2.0", PluginStatus::Active));
        let err = classify(&registry, lib, &[requirement("A", REPO, &["1.0"])]).unwrap_err();
        match err {
            ResolverError::ConflictingActiveVersion {
                active_version,
                requests,
                ..
            } => {
                assert_eq!(active_version, "2.0");
                assert_eq!(requests[0].requester, "A");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn empty_intersection_lists_every_requester() {
        let lib = Uuid::new_v4();
        let registry = PluginRegistry::new();
        let reqs = vec![
            requirement("A", REPO, &["1.0"]),
            requirement("B", REPO, &["2.0"]),
        ];
        let err = classify(&registry, lib, &reqs).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("plugin A requires any of: 1.0.0"));
        assert!(message.contains("plugin B requires any of: 2.0.0"));
    }

    #[test]
    fn differing_repositories_conflict() {
        let lib = Uuid::new_v4();
        let registry = PluginRegistry::new();
        let reqs = vec![
            requirement("A", REPO, &["1.0"]),
            requirement("B", "https://mirror.example/manifest.json", &["1.0"]),
        ];
        let err = classify(&registry, lib, &reqs).unwrap_err();
        assert!(matches!(err, ResolverError::ConflictingRepositories { ref requests, .. } if requests.len() == 2));
    }

    #[test]
    fn missing_dependency_carries_candidates() {
        let lib = Uuid::new_v4();
        let registry = PluginRegistry::new();
        let reqs = vec![
            requirement("A", REPO, &["1.0", "1.1", "1.2"]),
            requirement("B", REPO, &["1.2", "1.1"]),
        ];
        let missing = classify(&registry, lib, &reqs).unwrap().unwrap();
        assert_eq!(missing.repository_url, REPO);
        assert_eq!(missing.candidates, vec![v("1.1"), v("1.2")]);
    }
}
