// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Integration tests for the ordered bootstrap, the induced per-stage
//! failures, and the end-to-end runtime scenario.

use std::net::TcpListener;
use std::path::Path;
use std::time::{Duration, Instant};

use aulos_core::bank::{BankLoadState, BankManifest};
use aulos_core::error::{BootstrapError, DispatchError, LoadError};
use aulos_core::event::EventReference;
use aulos_core::lifecycle::BootstrapState;
use aulos_core::object::{GameObjectHandle, GameObjectId, LISTENER_ID, OBJECT_ID_BASE};
use aulos_core::settings::{SettingsBundle, MAX_WORKER_THREADS};
use aulos_engine::bootstrap;

fn init_logs() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Settings rooted in `dir`, with remote communication off so tests do not
/// contend for ports, and a fast tick for sampling tests.
fn settings(dir: &Path) -> SettingsBundle {
    let mut settings = SettingsBundle::default();
    settings.base_bank_path = dir.to_path_buf();
    settings.diagnostics.enabled = false;
    settings.core.tick_interval_ms = 5;
    settings.jobs.worker_count = 2;
    settings
}

fn write_bank(dir: &Path, file_name: &str, bank_name: &str, events: &[&str]) {
    let manifest = BankManifest {
        name: bank_name.to_string(),
        events: events.iter().map(|e| e.to_string()).collect(),
    };
    std::fs::write(dir.join(file_name), manifest.encode().unwrap()).unwrap();
}

fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    condition()
}

#[test]
fn successful_bootstrap_is_running_with_a_default_listener() {
    init_logs();
    let dir = tempfile::tempdir().unwrap();
    let handle = bootstrap(settings(dir.path())).expect("bootstrap should succeed");

    assert_eq!(handle.state(), BootstrapState::Running);
    assert_eq!(handle.default_listeners(), vec![LISTENER_ID]);
    assert!(handle.comm_warning().is_none());

    handle.shutdown();
    assert_eq!(handle.state(), BootstrapState::Shutdown);
}

#[test]
fn every_mandatory_stage_failure_unwinds_and_names_the_stage() {
    init_logs();
    let dir = tempfile::tempdir().unwrap();

    let mut s = settings(dir.path());
    s.memory.budget_bytes = 0;
    assert!(matches!(
        bootstrap(s).unwrap_err(),
        BootstrapError::AllocatorInitFailed(_)
    ));

    let mut s = settings(dir.path());
    s.streaming.max_open_streams = 0;
    assert!(matches!(
        bootstrap(s).unwrap_err(),
        BootstrapError::StreamingInitFailed(_)
    ));

    let mut s = settings(dir.path());
    s.device.granularity_bytes = 0;
    assert!(matches!(
        bootstrap(s).unwrap_err(),
        BootstrapError::IoInitFailed(_)
    ));

    let mut s = settings(dir.path());
    s.jobs.worker_count = MAX_WORKER_THREADS + 1;
    assert!(matches!(
        bootstrap(s).unwrap_err(),
        BootstrapError::WorkerPoolInitFailed(_)
    ));

    let mut s = settings(dir.path());
    s.core.max_voices = 0;
    assert!(matches!(
        bootstrap(s).unwrap_err(),
        BootstrapError::CoreInitFailed(_)
    ));

    let mut s = settings(dir.path());
    s.music.transition_lookahead_ms = 0;
    assert!(matches!(
        bootstrap(s).unwrap_err(),
        BootstrapError::MusicInitFailed(_)
    ));

    let mut s = settings(dir.path());
    s.spatial.max_reflection_order = 0;
    assert!(matches!(
        bootstrap(s).unwrap_err(),
        BootstrapError::SpatialInitFailed(_)
    ));

    let mut s = settings(dir.path());
    s.language = String::new();
    assert!(matches!(
        bootstrap(s).unwrap_err(),
        BootstrapError::LanguageInitFailed(_)
    ));
}

#[test]
fn a_failed_stage_releases_earlier_stages_completely() {
    init_logs();
    let dir = tempfile::tempdir().unwrap();

    // Take a fixed port so the communication service really binds, then
    // fail bootstrap at a later stage.
    let probe = TcpListener::bind(("127.0.0.1", 0)).unwrap();
    let port = probe.local_addr().unwrap().port();
    drop(probe);

    let mut failing = settings(dir.path());
    failing.diagnostics.enabled = true;
    failing.diagnostics.port = port;
    failing.spatial.max_reflection_order = 0;
    assert!(matches!(
        bootstrap(failing).unwrap_err(),
        BootstrapError::SpatialInitFailed(_)
    ));

    // If the unwind had leaked the communication service, this second run
    // could not bind the same port again.
    let mut retry = settings(dir.path());
    retry.diagnostics.enabled = true;
    retry.diagnostics.port = port;
    let handle = bootstrap(retry).expect("retry after unwind should succeed");
    assert!(handle.comm_warning().is_none());
    handle.shutdown();
}

#[test]
fn communication_failure_is_soft_and_does_not_change_the_outcome() {
    init_logs();
    let dir = tempfile::tempdir().unwrap();

    // Occupy a port for the failing run.
    let blocker = TcpListener::bind(("127.0.0.1", 0)).unwrap();
    let port = blocker.local_addr().unwrap().port();

    let mut failing = settings(dir.path());
    failing.diagnostics.enabled = true;
    failing.diagnostics.port = port;
    let degraded = bootstrap(failing).expect("comm failure must not abort bootstrap");
    assert_eq!(degraded.state(), BootstrapState::Running);
    assert!(degraded.comm_warning().is_some());
    degraded.shutdown();

    let mut healthy = settings(dir.path());
    healthy.diagnostics.enabled = true;
    healthy.diagnostics.port = 0;
    let handle = bootstrap(healthy).expect("bootstrap should succeed");
    assert_eq!(handle.state(), BootstrapState::Running);
    assert!(handle.comm_warning().is_none());
    handle.shutdown();
}

#[test]
fn missing_bank_reports_not_found_and_records_no_loaded_bank() {
    init_logs();
    let dir = tempfile::tempdir().unwrap();
    let handle = bootstrap(settings(dir.path())).unwrap();

    let err = handle.load_bank("DoesNotExist.bnk").unwrap_err();
    assert!(matches!(err, LoadError::NotFound { .. }));
    assert!(handle
        .loaded_banks()
        .iter()
        .all(|bank| bank.load_state != BankLoadState::Loaded));

    handle.shutdown();
}

#[test]
fn corrupt_bank_charges_nothing_in_the_end() {
    init_logs();
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("Broken.bnk"), [0xff, 0xfe, 0xfd, 0xfc]).unwrap();

    let handle = bootstrap(settings(dir.path())).unwrap();
    let baseline = handle.memory_stats().in_use_bytes;

    let err = handle.load_bank("Broken.bnk").unwrap_err();
    assert!(matches!(err, LoadError::Corrupt { .. }));
    assert_eq!(handle.memory_stats().in_use_bytes, baseline);

    handle.shutdown();
}

#[test]
fn bank_memory_returns_to_baseline_after_shutdown() {
    init_logs();
    let dir = tempfile::tempdir().unwrap();
    write_bank(dir.path(), "Init.bnk", "Init", &["Play_Emitter"]);

    let handle = bootstrap(settings(dir.path())).unwrap();
    assert_eq!(handle.memory_stats().in_use_bytes, 0);

    handle.load_bank("Init.bnk").unwrap();
    assert!(handle.memory_stats().in_use_bytes > 0);

    handle.shutdown();
    assert_eq!(handle.memory_stats().in_use_bytes, 0);
}

#[test]
fn end_to_end_scenario() {
    init_logs();
    let dir = tempfile::tempdir().unwrap();
    write_bank(dir.path(), "Init.bnk", "Init", &["Play_Emitter"]);

    let mut s = settings(dir.path());
    s.jobs.worker_count = 4;
    let handle = bootstrap(s).expect("bootstrap should succeed");

    let emitter = handle.register_game_object("emitter-1");
    assert_eq!(emitter.id, GameObjectId(OBJECT_ID_BASE + 1));

    let bank = handle.load_bank("Init.bnk").unwrap();
    assert_eq!(bank.load_state, BankLoadState::Loaded);

    let event = EventReference::new("Play_Emitter");
    handle.post_event(&emitter, &event).unwrap();

    // The throttled sampler runs on the engine tick; wait for a capture
    // that has seen the dispatched event.
    assert!(wait_until(Duration::from_secs(2), || {
        let sample = handle.latest_sample();
        sample.sequence > 0 && sample.summary.active_events >= 1
    }));
    let sample = handle.latest_sample();
    assert!(sample.summary.memory_used_bytes > 0);
    assert_eq!(sample.summary.spatial_emitters, 1);

    handle.shutdown();
    assert_eq!(handle.state(), BootstrapState::Shutdown);
    // Second shutdown has no effect.
    handle.shutdown();
    assert_eq!(handle.state(), BootstrapState::Shutdown);
}

#[test]
fn unknown_events_and_unregistered_targets_are_rejected() {
    init_logs();
    let dir = tempfile::tempdir().unwrap();
    write_bank(dir.path(), "Init.bnk", "Init", &["Play_Emitter"]);

    let handle = bootstrap(settings(dir.path())).unwrap();
    handle.load_bank("Init.bnk").unwrap();
    let emitter = handle.register_game_object("emitter-1");

    assert!(matches!(
        handle.post_event(&emitter, &EventReference::new("Play_Nothing")),
        Err(DispatchError::UnknownEvent { .. })
    ));

    let stranger = GameObjectHandle {
        id: GameObjectId(9_999),
        display_name: "stranger".to_string(),
    };
    assert!(matches!(
        handle.post_event(&stranger, &EventReference::new("Play_Emitter")),
        Err(DispatchError::InvalidTarget { .. })
    ));

    handle.shutdown();
}

#[test]
fn operations_after_shutdown_are_rejected() {
    init_logs();
    let dir = tempfile::tempdir().unwrap();
    write_bank(dir.path(), "Init.bnk", "Init", &["Play_Emitter"]);

    let handle = bootstrap(settings(dir.path())).unwrap();
    let emitter = handle.register_game_object("emitter-1");
    handle.shutdown();

    assert!(matches!(
        handle.load_bank("Init.bnk"),
        Err(LoadError::EngineNotRunning)
    ));
    assert!(matches!(
        handle.post_event(&emitter, &EventReference::new("Play_Emitter")),
        Err(DispatchError::EngineNotRunning)
    ));
}

#[test]
fn zero_workers_still_dispatches_inline() {
    init_logs();
    let dir = tempfile::tempdir().unwrap();
    write_bank(dir.path(), "Init.bnk", "Init", &["Play_Emitter"]);

    let mut s = settings(dir.path());
    s.jobs.worker_count = 0;
    let handle = bootstrap(s).unwrap();

    let emitter = handle.register_game_object("emitter-1");
    handle.load_bank("Init.bnk").unwrap();
    handle
        .post_event(&emitter, &EventReference::new("Play_Emitter"))
        .unwrap();

    assert!(wait_until(Duration::from_secs(2), || {
        let sample = handle.latest_sample();
        sample.summary.active_events >= 1
    }));

    handle.shutdown();
}
