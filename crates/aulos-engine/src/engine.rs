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

//! The sound-engine facade.
//!
//! [`EngineCore`] owns the game-object table, the event tables contributed
//! by loaded banks, and the voice bookkeeping. It also runs the engine's
//! internal tick thread: the execution context from which the resource
//! summary sampler and the diagnostics sink are invoked, asynchronously
//! with respect to every caller thread.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use aulos_core::bank::BankManifest;
use aulos_core::error::{InitFailure, ResultCode};
use aulos_core::object::{GameObjectId, PlayingId};
use aulos_core::settings::CoreSettings;
use aulos_core::telemetry::{codes, ErrorRecord, ErrorSink, ResourceSummary, SampleSink, Severity};

use crate::jobs::{Job, JobCategory, JobWorkerPool};

/// Longest event path accepted when out-of-range checks are enabled.
const MAX_EVENT_PATH_LEN: usize = 260;

/// Produces the subsystem-external part of a [`ResourceSummary`].
///
/// Installed once during bootstrap; invoked by the tick thread with the
/// elapsed milliseconds since the previous tick.
pub type SummarySource = Box<dyn FnMut(u64) -> ResourceSummary + Send>;

/// Voice bookkeeping for one playing event instance.
#[derive(Debug, Clone)]
struct Voice {
    event: String,
    target: GameObjectId,
    is_virtual: bool,
}

#[derive(Debug, Default)]
struct CoreCounters {
    events_posted: AtomicU64,
    active_voices: AtomicU32,
    virtual_voices: AtomicU32,
}

/// Callback registration points shared with the tick thread.
struct CallbackHub {
    sampler: RwLock<Option<Arc<dyn SampleSink>>>,
    source: Mutex<Option<SummarySource>>,
}

/// The engine core: playback facade and owner of the internal tick thread.
pub struct EngineCore {
    settings: CoreSettings,
    objects: RwLock<HashMap<GameObjectId, String>>,
    default_listeners: RwLock<Vec<GameObjectId>>,
    events: RwLock<HashMap<String, String>>,
    voices: RwLock<HashMap<PlayingId, Voice>>,
    next_playing_id: AtomicU64,
    counters: Arc<CoreCounters>,
    hub: Arc<CallbackHub>,
    pool: Option<Arc<JobWorkerPool>>,
    error_output: RwLock<Option<Arc<dyn ErrorSink>>>,
    tick_stop: Arc<AtomicBool>,
    tick_thread: Mutex<Option<JoinHandle<()>>>,
}

impl EngineCore {
    /// Initializes the core and starts the internal tick thread.
    ///
    /// `pool` is `None` in the degenerate zero-worker configuration; the
    /// core then runs dispatch jobs inline on the submitting thread.
    pub fn init(
        settings: &CoreSettings,
        pool: Option<Arc<JobWorkerPool>>,
    ) -> Result<Arc<Self>, InitFailure> {
        if settings.max_voices == 0 {
            return Err(InitFailure::new(
                ResultCode::InvalidParameter,
                "max_voices must be greater than zero",
            ));
        }
        if settings.tick_interval_ms == 0 {
            return Err(InitFailure::new(
                ResultCode::InvalidParameter,
                "tick_interval_ms must be greater than zero",
            ));
        }

        let counters = Arc::new(CoreCounters::default());
        let hub = Arc::new(CallbackHub {
            sampler: RwLock::new(None),
            source: Mutex::new(None),
        });
        let tick_stop = Arc::new(AtomicBool::new(false));

        let tick_thread = Self::spawn_tick_thread(
            settings.tick_interval_ms,
            Arc::clone(&counters),
            Arc::clone(&hub),
            Arc::clone(&tick_stop),
        )?;

        log::info!(
            "Engine core initialized ({} voices, {} ms tick).",
            settings.max_voices,
            settings.tick_interval_ms
        );
        Ok(Arc::new(Self {
            settings: settings.clone(),
            objects: RwLock::new(HashMap::new()),
            default_listeners: RwLock::new(Vec::new()),
            events: RwLock::new(HashMap::new()),
            voices: RwLock::new(HashMap::new()),
            next_playing_id: AtomicU64::new(0),
            counters,
            hub,
            pool,
            error_output: RwLock::new(None),
            tick_stop,
            tick_thread: Mutex::new(Some(tick_thread)),
        }))
    }

    fn spawn_tick_thread(
        interval_ms: u64,
        counters: Arc<CoreCounters>,
        hub: Arc<CallbackHub>,
        stop: Arc<AtomicBool>,
    ) -> Result<JoinHandle<()>, InitFailure> {
        std::thread::Builder::new()
            .name("aulos-engine-tick".to_string())
            .spawn(move || {
                let started = Instant::now();
                let interval = Duration::from_millis(interval_ms);
                let mut last_tick = started;

                while !stop.load(Ordering::Acquire) {
                    std::thread::sleep(interval);

                    let now = Instant::now();
                    let dt_ms = now.duration_since(last_tick).as_millis() as u64;
                    last_tick = now;

                    let mut source = hub.source.lock().unwrap();
                    let Some(produce) = source.as_mut() else {
                        continue;
                    };
                    let mut summary = produce(dt_ms);
                    drop(source);

                    summary.uptime_ms = started.elapsed().as_millis() as u64;
                    summary.active_events = counters.events_posted.load(Ordering::Acquire);
                    summary.active_voices = counters.active_voices.load(Ordering::Acquire);
                    summary.virtual_voices = counters.virtual_voices.load(Ordering::Acquire);

                    let sampler = hub.sampler.read().unwrap().clone();
                    if let Some(sampler) = sampler {
                        sampler.on_summary(summary);
                    }
                }
            })
            .map_err(|spawn_err| {
                InitFailure::new(
                    ResultCode::DeviceFailure,
                    format!("failed to spawn engine tick thread: {spawn_err}"),
                )
            })
    }

    /// Registers a game object under the given id.
    ///
    /// Fails with [`ResultCode::AlreadyInUse`] if the id is taken.
    pub fn register_object(&self, id: GameObjectId, name: &str) -> Result<(), InitFailure> {
        let mut objects = self.objects.write().unwrap();
        if objects.contains_key(&id) {
            return Err(InitFailure::new(
                ResultCode::AlreadyInUse,
                format!("game object id {id} is already registered"),
            ));
        }
        objects.insert(id, name.to_string());
        log::debug!("Game object {id} registered as '{name}'.");
        Ok(())
    }

    /// Returns `true` if the id is currently registered.
    pub fn is_registered(&self, id: GameObjectId) -> bool {
        self.objects.read().unwrap().contains_key(&id)
    }

    /// Marks the given objects as the engine's default listener set.
    pub fn set_default_listeners(&self, ids: &[GameObjectId]) {
        *self.default_listeners.write().unwrap() = ids.to_vec();
    }

    /// The current default listener set.
    pub fn default_listeners(&self) -> Vec<GameObjectId> {
        self.default_listeners.read().unwrap().clone()
    }

    /// Registers the event paths a loaded bank defines. Later banks win on
    /// path collisions. Returns the number of paths registered.
    pub fn register_bank_events(&self, manifest: &BankManifest) -> usize {
        let mut events = self.events.write().unwrap();
        for path in &manifest.events {
            events.insert(path.clone(), manifest.name.clone());
        }
        log::info!(
            "Bank '{}' registered {} event(s).",
            manifest.name,
            manifest.events.len()
        );
        manifest.events.len()
    }

    /// Returns `true` if some loaded bank defines the event path.
    pub fn resolves_event(&self, path: &str) -> bool {
        self.events.read().unwrap().contains_key(path)
    }

    /// Enqueues playback of an event on a registered target.
    ///
    /// Fire and forget: the work runs on the pool (or inline without one)
    /// and no completion is reported back.
    pub fn dispatch(self: &Arc<Self>, target: GameObjectId, event_path: &str) {
        if self.settings.out_of_range_checks && event_path.len() > MAX_EVENT_PATH_LEN {
            self.report(ErrorRecord {
                code: codes::PARAM_OUT_OF_RANGE,
                severity: Severity::Message,
                playing_id: None,
                game_object: Some(target),
                text: format!("event path length {} exceeds {MAX_EVENT_PATH_LEN}", event_path.len()),
            });
        }

        let core = Arc::clone(self);
        let path = event_path.to_string();
        let work = move || core.start_voice(target, path);

        match &self.pool {
            Some(pool) => pool.submit(Job::new(JobCategory::Playback, work)),
            // Degenerate zero-worker configuration: run inline.
            None => work(),
        }
    }

    fn start_voice(&self, target: GameObjectId, event: String) {
        let max = self.settings.max_voices;
        let is_virtual = self
            .counters
            .active_voices
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                (current < max).then_some(current + 1)
            })
            .is_err();
        if is_virtual {
            self.counters.virtual_voices.fetch_add(1, Ordering::AcqRel);
        }

        let playing = PlayingId(self.next_playing_id.fetch_add(1, Ordering::Relaxed) + 1);
        self.voices.write().unwrap().insert(
            playing,
            Voice {
                event,
                target,
                is_virtual,
            },
        );
        self.counters.events_posted.fetch_add(1, Ordering::AcqRel);
        log::trace!("Voice {playing} started on {target} (virtual: {is_virtual}).");
    }

    /// Total events dispatched since initialization.
    pub fn events_posted(&self) -> u64 {
        self.counters.events_posted.load(Ordering::Acquire)
    }

    /// Voices currently mixed.
    pub fn active_voices(&self) -> u32 {
        self.counters.active_voices.load(Ordering::Acquire)
    }

    /// Voices playing virtual because the physical limit was reached.
    pub fn virtual_voices(&self) -> u32 {
        self.counters.virtual_voices.load(Ordering::Acquire)
    }

    /// Registers the resource-summary sampler invoked from the tick thread.
    pub fn register_sampler(&self, sampler: Arc<dyn SampleSink>) {
        *self.hub.sampler.write().unwrap() = Some(sampler);
    }

    /// Installs the producer of the subsystem-external summary counters.
    pub fn install_summary_source(&self, source: SummarySource) {
        *self.hub.source.lock().unwrap() = Some(source);
    }

    /// Registers the sink that receives every diagnostic record the engine
    /// surfaces.
    pub fn set_error_output(&self, sink: Arc<dyn ErrorSink>) {
        *self.error_output.write().unwrap() = Some(sink);
    }

    /// Forwards a record on the engine's reporting path.
    pub fn report(&self, record: ErrorRecord) {
        let sink = self.error_output.read().unwrap().clone();
        match sink {
            Some(sink) => sink.handle(&record),
            None => log::debug!("No error output registered; record dropped: {}", record.text),
        }
    }

    /// Stops all voices and releases every playback resource.
    pub fn stop_all_voices(&self) {
        let mut voices = self.voices.write().unwrap();
        let stopped = voices.len();
        for (id, voice) in voices.drain() {
            log::trace!(
                "Voice {id} ('{}' on {}, virtual: {}) stopped.",
                voice.event,
                voice.target,
                voice.is_virtual
            );
        }
        self.counters.active_voices.store(0, Ordering::Release);
        self.counters.virtual_voices.store(0, Ordering::Release);
        if stopped > 0 {
            log::info!("Stopped {stopped} voice(s).");
        }
    }

    /// Stops the tick thread and clears every table and registration.
    /// Safe to call more than once.
    pub fn stop(&self) {
        self.tick_stop.store(true, Ordering::Release);
        if let Some(handle) = self.tick_thread.lock().unwrap().take() {
            if handle.join().is_err() {
                log::error!("Engine tick thread panicked during shutdown.");
            }
        }

        self.stop_all_voices();
        self.events.write().unwrap().clear();
        self.objects.write().unwrap().clear();
        self.default_listeners.write().unwrap().clear();
        *self.hub.sampler.write().unwrap() = None;
        *self.hub.source.lock().unwrap() = None;
        *self.error_output.write().unwrap() = None;
        log::info!("Engine core stopped.");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn core() -> Arc<EngineCore> {
        EngineCore::init(
            &CoreSettings {
                max_voices: 2,
                tick_interval_ms: 5,
                out_of_range_checks: true,
            },
            None,
        )
        .expect("init should succeed")
    }

    #[test]
    fn duplicate_object_id_is_rejected() {
        let core = core();
        core.register_object(GameObjectId(33), "a").unwrap();
        let err = core.register_object(GameObjectId(33), "b").unwrap_err();
        assert_eq!(err.code, ResultCode::AlreadyInUse);
        core.stop();
    }

    #[test]
    fn voices_beyond_the_limit_play_virtual() {
        let core = core();
        for _ in 0..5 {
            core.start_voice(GameObjectId(40), "Play_Test".to_string());
        }
        assert_eq!(core.active_voices(), 2);
        assert_eq!(core.virtual_voices(), 3);
        assert_eq!(core.events_posted(), 5);
        core.stop();
    }

    #[test]
    fn bank_events_resolve_after_registration() {
        let core = core();
        let manifest = BankManifest {
            name: "Init".to_string(),
            events: vec!["Play_Emitter".to_string()],
        };
        assert_eq!(core.register_bank_events(&manifest), 1);
        assert!(core.resolves_event("Play_Emitter"));
        assert!(!core.resolves_event("Play_Other"));
        core.stop();
    }

    #[test]
    fn stop_is_idempotent() {
        let core = core();
        core.stop();
        core.stop();
    }
}
