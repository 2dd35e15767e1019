// SPDX-FileCopyrightText: 2026 Plinth Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Collaborator traits at the boundary between the orchestrator and the host.
//!
//! The resolver and loader only ever reach manifests, package repositories and
//! the host's module machinery through these traits. Async collaborators use
//! `#[async_trait]` for dynamic dispatch compatibility.

pub mod early_load;
pub mod host;
pub mod manifest_store;
pub mod repository;

// Re-export all traits at the traits module level for convenience.
pub use early_load::{EarlyLoadPlugin, EarlyLoadRegistrar};
pub use host::{HostAdapter, LoadedModule, ModuleHost, ModuleLoadHook, ServerStartHook};
pub use manifest_store::ManifestStore;
pub use repository::PackageRepository;
