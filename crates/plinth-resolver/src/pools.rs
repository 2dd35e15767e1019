// SPDX-FileCopyrightText: 2026 Plinth Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Dependency pools.
//!
//! A pool is a set of Active plugins that share one isolation boundary and
//! one load order. Pools are the weakly connected components of the active
//! dependency graph, each ordered so that dependencies come before their
//! dependents.
//!
//! Pools are built with a union-find over [`PoolId`]s: each plugin is placed
//! into the pool of its first dependency, the pools of its other
//! dependencies are appended to that one and retired, and finally the
//! plugin itself is appended. Retired ids forward to their surviving pool.

use std::collections::{BTreeMap, HashMap, HashSet};

use plinth_core::{PluginId, PoolId, ResolverError};
use plinth_plugin::PluginRegistry;
use tracing::debug;

/// Pool assignment of every Active plugin.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyPools {
    pools: BTreeMap<PoolId, Vec<PluginId>>,
    assignment: HashMap<PluginId, PoolId>,
    parent: HashMap<PoolId, PoolId>,
    next_id: i32,
}

struct Frame {
    id: PluginId,
    dependencies: Vec<PluginId>,
    next: usize,
    pool: Option<PoolId>,
}

impl DependencyPools {
    /// Assigns every Active plugin of `registry`, in discovery order.
    pub fn build(registry: &PluginRegistry) -> Result<Self, ResolverError> {
        let mut pools = Self::default();
        for plugin in registry.active_plugins() {
            pools.assign(registry, plugin.id())?;
        }
        debug!(pools = pools.len(), "dependency pools built");
        Ok(pools)
    }

    /// Pools in id order.
    pub fn iter(&self) -> impl Iterator<Item = (PoolId, &[PluginId])> {
        self.pools.iter().map(|(id, members)| (*id, members.as_slice()))
    }

    pub fn members(&self, pool: PoolId) -> Option<&[PluginId]> {
        self.pools.get(&pool).map(Vec::as_slice)
    }

    /// The surviving pool holding `plugin`.
    pub fn pool_of(&self, plugin: &PluginId) -> Option<PoolId> {
        self.assignment.get(plugin).map(|pool| self.root(*pool))
    }

    pub fn len(&self) -> usize {
        self.pools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pools.is_empty()
    }

    /// Places `root` and, first, everything it depends on.
    fn assign(&mut self, registry: &PluginRegistry, root: PluginId) -> Result<PoolId, ResolverError> {
        if let Some(pool) = self.pool_of(&root) {
            return Ok(pool);
        }

        let mut stack = vec![Frame {
            id: root,
            dependencies: dependencies_of(registry, root, None)?,
            next: 0,
            pool: None,
        }];
        let mut visiting = HashSet::from([root]);

        loop {
            let Some(frame) = stack.last_mut() else {
                // Only reachable if the root frame vanished without a result.
                return Err(ResolverError::MissingActiveDependency {
                    plugin: registry.display_name(&root),
                    dependency_id: root,
                });
            };

            if frame.next < frame.dependencies.len() {
                let dependency = frame.dependencies[frame.next];
                frame.next += 1;

                if let Some(pool) = self.pool_of(&dependency) {
                    frame.pool = Some(self.merge(frame.pool, pool));
                    continue;
                }
                if visiting.contains(&dependency) {
                    let start = stack
                        .iter()
                        .position(|f| f.id == dependency)
                        .unwrap_or_default();
                    let mut cycle: Vec<String> = stack[start..]
                        .iter()
                        .map(|f| registry.display_name(&f.id))
                        .collect();
                    cycle.push(registry.display_name(&dependency));
                    return Err(ResolverError::DependencyCycle { cycle });
                }

                let requester = frame.id;
                let dependencies = dependencies_of(registry, dependency, Some(requester))?;
                visiting.insert(dependency);
                stack.push(Frame {
                    id: dependency,
                    dependencies,
                    next: 0,
                    pool: None,
                });
                continue;
            }

            let Some(done) = stack.pop() else { continue };
            let pool = match done.pool {
                Some(pool) => self.root(pool),
                None => self.new_pool(),
            };
            self.pools.entry(pool).or_default().push(done.id);
            self.assignment.insert(done.id, pool);
            visiting.remove(&done.id);

            match stack.last_mut() {
                Some(parent) => parent.pool = Some(self.merge(parent.pool, pool)),
                None => return Ok(pool),
            }
        }
    }

    fn new_pool(&mut self) -> PoolId {
        let id = PoolId(self.next_id);
        self.next_id += 1;
        self.pools.insert(id, Vec::new());
        id
    }

    /// Follows retired ids to the surviving pool.
    fn root(&self, mut pool: PoolId) -> PoolId {
        while let Some(next) = self.parent.get(&pool) {
            pool = *next;
        }
        pool
    }

    /// Appends the members of `incoming` to `current` and retires
    /// `incoming`. With no current pool, `incoming` becomes current.
    fn merge(&mut self, current: Option<PoolId>, incoming: PoolId) -> PoolId {
        let incoming = self.root(incoming);
        let Some(current) = current else {
            return incoming;
        };
        let current = self.root(current);
        if current == incoming {
            return current;
        }

        let moved = self.pools.remove(&incoming).unwrap_or_default();
        self.pools.entry(current).or_default().extend(moved);
        self.parent.insert(incoming, current);
        self.compress();
        current
    }

    /// Points every retired id and every assignment straight at its root.
    fn compress(&mut self) {
        let retired: Vec<PoolId> = self.parent.keys().copied().collect();
        for pool in retired {
            let root = self.root(pool);
            self.parent.insert(pool, root);
        }
        let roots: Vec<(PluginId, PoolId)> = self
            .assignment
            .iter()
            .map(|(plugin, pool)| (*plugin, self.root(*pool)))
            .collect();
        self.assignment.extend(roots);
    }
}

fn dependencies_of(
    registry: &PluginRegistry,
    plugin: PluginId,
    requester: Option<PluginId>,
) -> Result<Vec<PluginId>, ResolverError> {
    match registry.active(&plugin) {
        Some(info) => Ok(info.dependencies().iter().map(|d| d.id).collect()),
        None => Err(ResolverError::MissingActiveDependency {
            plugin: registry.display_name(&requester.unwrap_or(plugin)),
            dependency_id: plugin,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use plinth_core::{DependencyDeclaration, LoaderManifest, PluginManifest, PluginStatus};
    use plinth_plugin::InstalledPluginInfo;
    use uuid::Uuid;

    fn plugin(name: &str, id: Uuid, deps: &[Uuid]) -> InstalledPluginInfo {
        let loader = LoaderManifest {
            dependencies: deps
                .iter()
                .map(|d| DependencyDeclaration {
                    repository_url: "https://repo.example/manifest.json".into(),
                    id: *d,
                    versions: vec!["1.0.0".into()],
                })
                .collect(),
            ..Default::default()
        };
        InstalledPluginInfo::new(
            format!("/p/{name}"),
            PluginManifest::new(id, name, "1.0.0"),
            Some(loader),
        )
    }

    fn ids(n: usize) -> Vec<Uuid> {
        (0..n).map(|_| Uuid::new_v4()).collect()
    }

    #[test]
    fn independent_plugins_get_singleton_pools() {
        let id = ids(2);
        let mut registry = PluginRegistry::new();
        registry.insert(plugin("A", id[0], &[]));
        registry.insert(plugin("B", id[1], &[]));

        let pools = DependencyPools::build(&registry).unwrap();
        assert_eq!(pools.len(), 2);
        assert_eq!(pools.members(PoolId(0)), Some(&[id[0]][..]));
        assert_eq!(pools.members(PoolId(1)), Some(&[id[1]][..]));
    }

    #[test]
    fn dependents_follow_their_dependencies() {
        // C -> B -> A, discovered dependent-first.
        let id = ids(3);
        let mut registry = PluginRegistry::new();
        registry.insert(plugin("C", id[2], &[id[1]]));
        registry.insert(plugin("B", id[1], &[id[0]]));
        registry.insert(plugin("A", id[0], &[]));

        let pools = DependencyPools::build(&registry).unwrap();
        assert_eq!(pools.len(), 1);
        let (pool, members) = pools.iter().next().unwrap();
        assert_eq!(members, &[id[0], id[1], id[2]]);
        assert_eq!(pools.pool_of(&id[2]), Some(pool));
    }

    #[test]
    fn shared_dependency_merges_pools() {
        // B -> A, C -> X, D -> [X, A]
        let id = ids(5);
        let (a, b, c, x, d) = (id[0], id[1], id[2], id[3], id[4]);
        let mut registry = PluginRegistry::new();
        registry.insert(plugin("A", a, &[]));
        registry.insert(plugin("B", b, &[a]));
        registry.insert(plugin("X", x, &[]));
        registry.insert(plugin("C", c, &[x]));
        registry.insert(plugin("D", d, &[x, a]));

        let pools = DependencyPools::build(&registry).unwrap();
        assert_eq!(pools.len(), 1);
        let (_, members) = pools.iter().next().unwrap();
        assert_eq!(members, &[x, c, a, b, d]);
        for plugin in [a, b, c, x, d] {
            assert_eq!(pools.pool_of(&plugin), pools.pool_of(&d));
        }
    }

    #[test]
    fn cycle_fails_fast_with_path() {
        let id = ids(2);
        let mut registry = PluginRegistry::new();
        registry.insert(plugin("A", id[0], &[id[1]]));
        registry.insert(plugin("B", id[1], &[id[0]]));

        let err = DependencyPools::build(&registry).unwrap_err();
        match err {
            ResolverError::DependencyCycle { cycle } => assert_eq!(cycle, vec!["A", "B", "A"]),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn self_dependency_is_a_cycle() {
        let id = Uuid::new_v4();
        let mut registry = PluginRegistry::new();
        registry.insert(plugin("A", id, &[id]));
        assert!(matches!(
            DependencyPools::build(&registry),
            Err(ResolverError::DependencyCycle { .. })
        ));
    }

    #[test]
    fn inactive_dependency_is_reported() {
        let id = ids(2);
        let mut registry = PluginRegistry::new();
        registry.insert(plugin("A", id[0], &[id[1]]));
        let mut dep = plugin("B", id[1], &[]);
        dep.manifest.status = PluginStatus::Disabled;
        registry.insert(dep);

        let err = DependencyPools::build(&registry).unwrap_err();
        assert!(matches!(
            err,
            ResolverError::MissingActiveDependency { ref plugin, .. } if plugin == "A"
        ));
    }
}
