// SPDX-FileCopyrightText: 2026 Plinth Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP package repository for the Plinth bootstrapper.
//!
//! Provides [`HttpPackageRepository`], which fetches JSON package listings
//! and installs zip packages into the plugins directory.

pub mod archive;
pub mod client;

pub use archive::{extract_package, install_target, verify_checksum};
pub use client::HttpPackageRepository;
