// SPDX-FileCopyrightText: 2026 Plinth Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end tests for the complete bootstrap pipeline.
//!
//! Each test creates an isolated TestHarness with a temp plugins directory,
//! a mock package repository and a mock module host, attaches the
//! bootstrapper to a mock host adapter, and drives it through the hooks the
//! way a host would. Tests are independent and order-insensitive.

use std::sync::Arc;

use plinth_core::{Boundary, PluginStatus, PoolId};
use plinth_loader::Bootstrapper;
use plinth_resolver::BootstrapContext;
use plinth_test_utils::{MockModule, PluginFixture, ServerStartLog, TestHarness};
use uuid::Uuid;

const REPO: &str = "https://repo.example/manifest.json";

fn context(harness: &TestHarness) -> BootstrapContext {
    BootstrapContext::new(
        harness.config(),
        harness.store.clone(),
        harness.repository.clone(),
    )
    .unwrap()
}

// ---- Test 1: Install, early load, host load ----

#[tokio::test]
async fn test_missing_dependency_is_installed_and_early_loaded() {
    let harness = TestHarness::new().unwrap();
    let log = ServerStartLog::default();
    let (lib, app) = (Uuid::new_v4(), Uuid::new_v4());

    harness.repository.publish(
        REPO,
        PluginFixture::new(lib, "Lib", "1.1.0").aware().early(),
    );
    harness.repository.publish(
        REPO,
        PluginFixture::new(lib, "Lib", "1.2.0").aware().early(),
    );
    let app_dir = harness
        .install(
            &PluginFixture::new(app, "App", "1.0.0")
                .aware()
                .early()
                .depends_on(REPO, lib, &["1.0.0", "1.1.0"]),
        )
        .unwrap();
    harness.host.define_file(
        "lib.so",
        MockModule::new("lib", "1.1.0.0").references("plinth_stub", "1.0.0.0"),
    );
    harness.host.define(
        app_dir.join("app.so"),
        MockModule::new("app", "1.0.0.0")
            .references("plinth_stub", "1.0.0.0")
            .early_load_handler("app", &log),
    );

    let mut config = harness.config();
    config.resolver.allow_version_sets = true;
    let ctx = BootstrapContext::new(config, harness.store.clone(), harness.repository.clone())
        .unwrap();
    let adapter = harness.adapter();
    let bootstrapper = Bootstrapper::attach(ctx, &adapter);

    adapter.start_hook().unwrap().on_server_start().await.unwrap();

    let installs = harness.repository.installs();
    assert_eq!(installs.len(), 1);
    assert_eq!(installs[0].version, "1.1.0");
    let lib_dir = harness.plugins_dir().join("Lib_1.1.0");
    assert_eq!(harness.status_of(&lib_dir), Some(PluginStatus::Active));

    let summary = bootstrapper.last_summary().unwrap();
    assert_eq!(summary.early_loaded, vec![lib, app]);
    assert_eq!(*log.lock(), vec![("app".to_string(), true)]);

    // One canonical stub for the pool: loaded from the first plugin only.
    assert_eq!(harness.host.load_count(&lib_dir.join("plinth_stub.so")), 1);
    assert_eq!(harness.host.load_count(&app_dir.join("plinth_stub.so")), 0);

    // The host now asks for each plugin's entry module.
    let hook = adapter.load_hook().unwrap();
    let stub = hook
        .load_from_path(&app_dir.join("plinth_stub.so"))
        .unwrap()
        .unwrap();
    assert_eq!(stub.boundary, Boundary::Pool(PoolId(0)));
    let early = hook.load_from_path(&app_dir.join("app.so")).unwrap().unwrap();
    assert_eq!(harness.host.load_count(&app_dir.join("app.so")), 1);
    assert_eq!(early.identity.name, "app");
}

// ---- Test 2: Restart ----

#[tokio::test]
async fn test_second_start_is_warm_and_installs_nothing() {
    let harness = TestHarness::new().unwrap();
    let log = ServerStartLog::default();
    let (lib, app) = (Uuid::new_v4(), Uuid::new_v4());

    harness
        .repository
        .publish(REPO, PluginFixture::new(lib, "Lib", "1.0.0").aware().early());
    harness
        .install(
            &PluginFixture::new(app, "App", "1.0.0")
                .aware()
                .early()
                .depends_on(REPO, lib, &["1.0.0"]),
        )
        .unwrap();
    harness.host.define_file(
        "lib.so",
        MockModule::new("lib", "1.0.0.0").early_load_handler("lib", &log),
    );

    let adapter = harness.adapter();
    let bootstrapper = Bootstrapper::attach(context(&harness), &adapter);
    let start = adapter.start_hook().unwrap();

    start.on_server_start().await.unwrap();
    let first_claims = bootstrapper.claimed_paths();
    start.on_server_start().await.unwrap();

    assert_eq!(harness.repository.install_count(), 1);
    assert_eq!(bootstrapper.claimed_paths(), first_claims);
    assert_eq!(
        *log.lock(),
        vec![("lib".to_string(), true), ("lib".to_string(), false)]
    );
    assert_eq!(harness.host.released(), vec![Boundary::Pool(PoolId(0))]);
}

// ---- Test 3: Resolution failure ----

#[tokio::test]
async fn test_disjoint_versions_stop_startup_before_any_install() {
    let harness = TestHarness::new().unwrap();
    let (lib, a, b) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());

    harness
        .repository
        .publish(REPO, PluginFixture::new(lib, "Lib", "1.0.0").aware());
    harness
        .repository
        .publish(REPO, PluginFixture::new(lib, "Lib", "2.0.0").aware());
    harness
        .install(&PluginFixture::new(a, "A", "1.0.0").aware().depends_on(REPO, lib, &["1.0.0"]))
        .unwrap();
    harness
        .install(&PluginFixture::new(b, "B", "1.0.0").aware().depends_on(REPO, lib, &["2.0.0"]))
        .unwrap();

    let adapter = harness.adapter();
    let bootstrapper = Bootstrapper::attach(context(&harness), &adapter);
    let err = adapter
        .start_hook()
        .unwrap()
        .on_server_start()
        .await
        .unwrap_err();

    assert!(err.to_string().contains("no overlapping versions"));
    assert_eq!(harness.repository.install_count(), 0);
    assert!(harness.host.loads().is_empty());
    assert!(bootstrapper.is_cold_start());
}

// ---- Test 4: Unaware plugins ----

#[tokio::test]
async fn test_unaware_plugins_are_claimed_for_their_own_pool() {
    let harness = TestHarness::new().unwrap();
    let dir = harness
        .install(&PluginFixture::new(Uuid::new_v4(), "Legacy", "3.0.0").module("extra/helper.so"))
        .unwrap();

    let adapter = harness.adapter();
    let bootstrapper: Arc<Bootstrapper> = Bootstrapper::attach(context(&harness), &adapter);
    adapter.start_hook().unwrap().on_server_start().await.unwrap();

    assert_eq!(
        bootstrapper.claimed_paths(),
        vec![dir.join("extra/helper.so"), dir.join("legacy.so")]
    );
    assert!(harness.host.loads().is_empty());

    let hook = adapter.load_hook().unwrap();
    let module = hook.load_from_path(&dir.join("legacy.so")).unwrap().unwrap();
    assert_eq!(module.boundary, Boundary::Pool(PoolId(0)));
}
