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

//! Ordered construction and teardown of the whole runtime.
//!
//! [`bootstrap`] brings the subsystems up in strict dependency order. Each
//! stage is gated on the previous one; a fatal failure releases exactly the
//! stages already started, in reverse order, and returns the stage-specific
//! error. The single exception is the remote-communication service, whose
//! failure is reported and then ignored.
//!
//! The returned [`EngineHandle`] owns the entire stack. There is no
//! process-wide instance: lifetime and teardown are the caller's, and
//! dropping the handle shuts the runtime down.

use std::sync::Arc;

use aulos_core::bank::Bank;
use aulos_core::error::{BootstrapError, DispatchError, LoadError};
use aulos_core::event::EventReference;
use aulos_core::geometry::GeometryDescriptor;
use aulos_core::lifecycle::{BootstrapState, LifecycleCell};
use aulos_core::memory::MemoryStats;
use aulos_core::object::{GameObjectHandle, GameObjectId, LISTENER_ID};
use aulos_core::settings::SettingsBundle;
use aulos_core::telemetry::{ErrorSink, ResourceSample, ResourceSummary};

use crate::banks::BankLoader;
use crate::diagnostics::DiagnosticsChannel;
use crate::engine::{EngineCore, SummarySource};
use crate::events::EventDispatcher;
use crate::jobs::JobWorkerPool;
use crate::memory::MemoryManager;
use crate::monitor::ResourceMonitor;
use crate::music::MusicLayer;
use crate::registry::GameObjectRegistry;
use crate::spatial::SpatialLayer;
use crate::streaming::{IoDevice, StreamingManager};

/// Brings the audio runtime online.
///
/// On success the runtime is in [`BootstrapState::Running`], the default
/// listener is registered, and the returned handle owns every subsystem.
/// On failure everything already started has been released and the state is
/// back to [`BootstrapState::Uninitialized`].
pub fn bootstrap(settings: SettingsBundle) -> Result<EngineHandle, BootstrapError> {
    let state = Arc::new(LifecycleCell::new());
    state.set(BootstrapState::Initializing);
    log::info!("Audio runtime bootstrap starting.");

    let sequencer = Sequencer {
        state,
        memory: None,
        streaming: None,
        io: None,
        pool: None,
        core: None,
        music: None,
        diagnostics: None,
        spatial: None,
    };
    sequencer.run(settings)
}

struct Sequencer {
    state: Arc<LifecycleCell>,
    memory: Option<Arc<MemoryManager>>,
    streaming: Option<Arc<StreamingManager>>,
    io: Option<Arc<IoDevice>>,
    pool: Option<Arc<JobWorkerPool>>,
    core: Option<Arc<EngineCore>>,
    music: Option<Arc<MusicLayer>>,
    diagnostics: Option<Arc<DiagnosticsChannel>>,
    spatial: Option<Arc<SpatialLayer>>,
}

impl Sequencer {
    fn run(mut self, settings: SettingsBundle) -> Result<EngineHandle, BootstrapError> {
        // Memory allocator.
        let memory = match MemoryManager::init(&settings.memory) {
            Ok(memory) => memory,
            Err(failure) => return Err(self.abort(BootstrapError::AllocatorInitFailed(failure))),
        };
        self.memory = Some(Arc::clone(&memory));

        // Streaming manager.
        let streaming = match StreamingManager::create(&settings.streaming) {
            Ok(streaming) => streaming,
            Err(failure) => return Err(self.abort(BootstrapError::StreamingInitFailed(failure))),
        };
        self.streaming = Some(Arc::clone(&streaming));

        // Low-level I/O device, with stream caching always enabled.
        let mut device_settings = settings.device.clone();
        device_settings.use_stream_cache = true;
        let io = match IoDevice::init(&device_settings, Arc::clone(&streaming)) {
            Ok(io) => io,
            Err(failure) => return Err(self.abort(BootstrapError::IoInitFailed(failure))),
        };
        self.io = Some(Arc::clone(&io));

        // Job worker pool, skipped entirely for the zero-worker
        // configuration.
        let per_category_limit = settings
            .jobs
            .max_active_per_category
            .min(settings.jobs.worker_count.max(1) as u32);
        let pool = if settings.jobs.worker_count > 0 {
            match JobWorkerPool::start(settings.jobs.worker_count, per_category_limit) {
                Ok(pool) => Some(pool),
                Err(pool_err) => {
                    return Err(
                        self.abort(BootstrapError::WorkerPoolInitFailed(pool_err.into()))
                    )
                }
            }
        } else {
            log::info!("Zero workers configured; engine jobs will run inline.");
            None
        };
        self.pool = pool.clone();

        // Engine core.
        let core = match EngineCore::init(&settings.core, pool.clone()) {
            Ok(core) => core,
            Err(failure) => return Err(self.abort(BootstrapError::CoreInitFailed(failure))),
        };
        self.core = Some(Arc::clone(&core));

        // Music layer.
        let music = match MusicLayer::init(&settings.music) {
            Ok(music) => music,
            Err(failure) => return Err(self.abort(BootstrapError::MusicInitFailed(failure))),
        };
        self.music = Some(Arc::clone(&music));

        // Diagnostics and remote communication. A communication failure is
        // soft: reported, never fatal.
        let (diagnostics, comm_warning) = DiagnosticsChannel::init(&settings.diagnostics);
        self.diagnostics = Some(Arc::clone(&diagnostics));

        // Spatial layer.
        let spatial = match SpatialLayer::init(&settings.spatial) {
            Ok(spatial) => spatial,
            Err(failure) => return Err(self.abort(BootstrapError::SpatialInitFailed(failure))),
        };
        self.spatial = Some(Arc::clone(&spatial));

        // Default listener at its reserved id.
        if let Err(failure) = core.register_object(LISTENER_ID, "Listener (Default)") {
            return Err(self.abort(BootstrapError::CoreInitFailed(failure)));
        }
        core.set_default_listeners(&[LISTENER_ID]);

        // Base asset paths: writable fallback first (if configured), the
        // authoritative bank path last so it is queried first. Then the
        // language tag.
        if let Some(writable) = &settings.writable_path {
            io.set_writable_path(writable.clone());
            io.add_base_path(writable.clone());
        }
        io.add_base_path(settings.base_bank_path.clone());
        if let Err(failure) = io.set_language(&settings.language) {
            return Err(self.abort(BootstrapError::LanguageInitFailed(failure)));
        }

        // Callback registration: the throttled sampler and the diagnostics
        // relay, both invoked from the engine's internal context.
        let monitor = ResourceMonitor::new();
        core.register_sampler(monitor.clone());
        core.set_error_output(diagnostics.clone());
        core.install_summary_source(summary_source(
            Arc::clone(&memory),
            Arc::clone(&streaming),
            pool.clone(),
            Arc::clone(&music),
            Arc::clone(&spatial),
        ));
        if let Some(record) = &comm_warning {
            diagnostics.report(record);
        }

        self.state.set(BootstrapState::Running);
        log::info!("Audio runtime bootstrap complete.");

        let registry = GameObjectRegistry::new(Arc::clone(&core), Arc::clone(&self.state));
        let loader = BankLoader::new(
            Arc::clone(&io),
            Arc::clone(&memory),
            Arc::clone(&core),
            Arc::clone(&self.state),
        );
        let dispatcher = EventDispatcher::new(
            Arc::clone(&core),
            Arc::clone(&spatial),
            Arc::clone(&self.state),
        );

        Ok(EngineHandle {
            state: Arc::clone(&self.state),
            memory,
            streaming,
            io,
            pool,
            core,
            music,
            spatial,
            diagnostics,
            monitor,
            registry,
            loader,
            dispatcher,
            comm_warning: comm_warning.map(|record| record.text),
        })
    }

    fn abort(&mut self, error: BootstrapError) -> BootstrapError {
        log::error!("{error}");
        self.unwind();
        error
    }

    /// Releases every stage started so far, newest first.
    fn unwind(&mut self) {
        if let Some(spatial) = self.spatial.take() {
            spatial.release();
        }
        if let Some(diagnostics) = self.diagnostics.take() {
            diagnostics.shutdown();
        }
        if let Some(music) = self.music.take() {
            music.release();
        }
        if let Some(core) = self.core.take() {
            core.stop();
        }
        if let Some(pool) = self.pool.take() {
            pool.stop();
        }
        if let Some(io) = self.io.take() {
            io.release();
        }
        if let Some(streaming) = self.streaming.take() {
            streaming.release();
        }
        if let Some(memory) = self.memory.take() {
            memory.shutdown();
        }
        self.state.set(BootstrapState::Uninitialized);
    }
}

fn summary_source(
    memory: Arc<MemoryManager>,
    streaming: Arc<StreamingManager>,
    pool: Option<Arc<JobWorkerPool>>,
    music: Arc<MusicLayer>,
    spatial: Arc<SpatialLayer>,
) -> SummarySource {
    Box::new(move |dt_ms| {
        music.advance(dt_ms);
        let stats = memory.stats();
        ResourceSummary {
            memory_used_bytes: stats.in_use_bytes,
            memory_peak_bytes: stats.peak_bytes,
            open_streams: streaming.open_count(),
            pending_jobs: pool.as_ref().map(|p| p.pending_jobs()).unwrap_or(0),
            music_beat: music.beat(),
            spatial_emitters: spatial.emitter_count(),
            ..Default::default()
        }
    })
}

/// The opaque owner of a running audio runtime.
///
/// Every runtime operation goes through this handle; dropping it shuts the
/// runtime down.
pub struct EngineHandle {
    state: Arc<LifecycleCell>,
    memory: Arc<MemoryManager>,
    streaming: Arc<StreamingManager>,
    io: Arc<IoDevice>,
    pool: Option<Arc<JobWorkerPool>>,
    core: Arc<EngineCore>,
    music: Arc<MusicLayer>,
    spatial: Arc<SpatialLayer>,
    diagnostics: Arc<DiagnosticsChannel>,
    monitor: Arc<ResourceMonitor>,
    registry: GameObjectRegistry,
    loader: BankLoader,
    dispatcher: EventDispatcher,
    comm_warning: Option<String>,
}

impl EngineHandle {
    /// The current lifecycle state.
    pub fn state(&self) -> BootstrapState {
        self.state.state()
    }

    /// The communication-failure warning from bootstrap, if any.
    pub fn comm_warning(&self) -> Option<&str> {
        self.comm_warning.as_deref()
    }

    /// Registers a playback source and returns its handle. Never fails.
    pub fn register_game_object(&self, name: &str) -> GameObjectHandle {
        self.registry.register(name)
    }

    /// Loads the bank at `path`. Synchronous; see [`BankLoader::load`].
    pub fn load_bank(&self, path: impl AsRef<std::path::Path>) -> Result<Bank, LoadError> {
        self.loader.load(path)
    }

    /// Every bank load attempt so far, with its terminal state.
    pub fn loaded_banks(&self) -> Vec<Bank> {
        self.loader.banks()
    }

    /// Posts `event` on `target`, fire and forget.
    pub fn post_event(
        &self,
        target: &GameObjectHandle,
        event: &EventReference,
    ) -> Result<(), DispatchError> {
        self.dispatcher.post(target, event)
    }

    /// A copy of the most recent throttled resource sample.
    pub fn latest_sample(&self) -> ResourceSample {
        self.monitor.latest()
    }

    /// Registers the sink that receives severity-filtered diagnostics.
    pub fn set_error_sink(&self, sink: Arc<dyn ErrorSink>) {
        self.diagnostics.set_sink(sink);
    }

    /// Moves the default listener.
    pub fn set_listener_position(&self, position: [f32; 3]) -> bool {
        self.spatial.set_listener_position(position)
    }

    /// Replaces the occlusion geometry supplied by the scene importer.
    pub fn set_geometry(&self, descriptors: Vec<GeometryDescriptor>) {
        self.spatial.set_geometry(descriptors)
    }

    /// The engine's current default listener set.
    pub fn default_listeners(&self) -> Vec<GameObjectId> {
        self.core.default_listeners()
    }

    /// A snapshot of the memory counters.
    pub fn memory_stats(&self) -> MemoryStats {
        self.memory.stats()
    }

    /// Tears the runtime down in reverse dependency order, draining the
    /// worker pool to completion first. Idempotent: only the first call
    /// does anything.
    pub fn shutdown(&self) {
        if !self.state.begin_shutdown() {
            log::debug!("Shutdown requested again; nothing to do.");
            return;
        }
        log::info!("Audio runtime shutting down.");

        // Drain in-flight engine jobs before touching anything they use.
        if let Some(pool) = &self.pool {
            pool.stop();
        }

        self.spatial.release();
        self.diagnostics.shutdown();
        self.music.release();
        self.core.stop();
        self.loader.release_all();
        self.io.release();
        self.streaming.release();
        self.memory.shutdown();

        self.state.set(BootstrapState::Shutdown);
        log::info!("Audio runtime shutdown complete.");
    }
}

impl Drop for EngineHandle {
    // Dropping the handle is a controlled shutdown; an explicit earlier
    // call makes this a no-op.
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for EngineHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineHandle")
            .field("state", &self.state())
            .field("workers", &self.pool.as_ref().map_or(0, |p| p.worker_count()))
            .field("comm_warning", &self.comm_warning)
            .finish_non_exhaustive()
    }
}
