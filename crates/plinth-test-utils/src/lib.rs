// SPDX-FileCopyrightText: 2026 Plinth Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Plinth integration tests.
//!
//! Provides mock collaborators and on-disk fixtures for fast,
//! deterministic tests without HTTP servers or real dynamic libraries.
//!
//! # Components
//!
//! - [`PluginFixture`] - Builder writing plugin directories and manifests
//! - [`MockPackageRepository`] - In-memory repository installing fixtures
//! - [`MockModuleHost`] - Module host recording loads and boundaries
//! - [`TestHarness`] - Temporary plugins root wiring all of the above

pub mod fixture;
pub mod harness;
pub mod mock_host;
pub mod mock_repository;

pub use fixture::{FIXTURE_EXTENSION, FIXTURE_STUB, PluginFixture, fixture_layout};
pub use harness::TestHarness;
pub use mock_host::{
    MockHostAdapter, MockModule, MockModuleHost, RecordingPlugin, ServerStartCallback,
    ServerStartLog,
};
pub use mock_repository::MockPackageRepository;
