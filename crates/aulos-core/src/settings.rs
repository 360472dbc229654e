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

//! Aggregated runtime configuration.
//!
//! A [`SettingsBundle`] is assembled once, from defaults or a deserialized
//! config file, and passed to bootstrap by value. It is never mutated after
//! that point; every subsystem receives its own section during its init
//! stage and validates it there.

use std::path::PathBuf;
use std::thread;

use serde::{Deserialize, Serialize};

use crate::telemetry::Severity;

/// The maximum worker-thread count the platform supports.
///
/// Constrained platforms keep the pool small; desktop targets allow more.
#[cfg(any(target_os = "android", target_os = "ios"))]
pub const MAX_WORKER_THREADS: usize = 2;

/// The maximum worker-thread count the platform supports.
///
/// Constrained platforms keep the pool small; desktop targets allow more.
#[cfg(not(any(target_os = "android", target_os = "ios")))]
pub const MAX_WORKER_THREADS: usize = 8;

/// Memory subsystem settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemorySettings {
    /// Total bytes the runtime may charge for banks and streams.
    pub budget_bytes: u64,
}

impl Default for MemorySettings {
    fn default() -> Self {
        Self {
            budget_bytes: 256 * 1024 * 1024,
        }
    }
}

/// Streaming manager settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamingSettings {
    /// Maximum number of simultaneously open streams.
    pub max_open_streams: u32,
}

impl Default for StreamingSettings {
    fn default() -> Self {
        Self {
            max_open_streams: 32,
        }
    }
}

/// Low-level I/O device settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceSettings {
    /// Read granularity in bytes for file-backed streams.
    pub granularity_bytes: usize,
    /// Whether the device keeps a cache of recently streamed blocks.
    /// Bootstrap always enables this regardless of the configured value.
    pub use_stream_cache: bool,
}

impl Default for DeviceSettings {
    fn default() -> Self {
        Self {
            granularity_bytes: 16 * 1024,
            use_stream_cache: true,
        }
    }
}

/// Job worker pool settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSettings {
    /// Number of worker threads. Zero is valid and means no internal
    /// parallelism: jobs run inline on the submitting thread.
    pub worker_count: usize,
    /// Upper bound on concurrently running jobs per category, applied even
    /// when the pool itself is larger.
    pub max_active_per_category: u32,
}

impl Default for JobSettings {
    fn default() -> Self {
        Self {
            worker_count: default_worker_count(),
            max_active_per_category: 2,
        }
    }
}

/// Returns the default worker count: available parallelism, capped at
/// [`MAX_WORKER_THREADS`].
pub fn default_worker_count() -> usize {
    thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        .min(MAX_WORKER_THREADS)
}

/// Engine core settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoreSettings {
    /// Maximum number of voices mixed simultaneously; further voices play
    /// virtual.
    pub max_voices: u32,
    /// Interval of the engine's internal tick, in milliseconds.
    pub tick_interval_ms: u64,
    /// Enables extra range validation on dispatch parameters. Cheap enough
    /// to leave on outside of release builds.
    pub out_of_range_checks: bool,
}

impl Default for CoreSettings {
    fn default() -> Self {
        Self {
            max_voices: 64,
            tick_interval_ms: 16,
            out_of_range_checks: cfg!(debug_assertions),
        }
    }
}

/// Music layer settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MusicSettings {
    /// How far ahead of the beat grid transitions are scheduled, in
    /// milliseconds.
    pub transition_lookahead_ms: u64,
    /// Tempo of the beat clock in beats per minute.
    pub tempo_bpm: u32,
}

impl Default for MusicSettings {
    fn default() -> Self {
        Self {
            transition_lookahead_ms: 200,
            tempo_bpm: 120,
        }
    }
}

/// Spatial layer settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpatialSettings {
    /// Reflection order for future occlusion processing, valid 1..=4.
    pub max_reflection_order: u8,
}

impl Default for SpatialSettings {
    fn default() -> Self {
        Self {
            max_reflection_order: 1,
        }
    }
}

/// Diagnostics and remote-communication settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagnosticsSettings {
    /// Whether the remote-communication service is started at all. The same
    /// binary supports both modes.
    pub enabled: bool,
    /// The name this runtime announces to connecting authoring tools.
    pub app_network_name: String,
    /// TCP port the communication service listens on.
    pub port: u16,
    /// Records below this severity are dropped before reaching the sink.
    pub min_severity: Severity,
}

impl Default for DiagnosticsSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            app_network_name: "Aulos Runtime".to_string(),
            port: 24024,
            min_severity: Severity::Message,
        }
    }
}

/// The aggregated configuration passed to bootstrap.
///
/// Immutable once handed over; subsystems validate their own sections
/// during their init stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettingsBundle {
    /// Memory subsystem settings.
    pub memory: MemorySettings,
    /// Streaming manager settings.
    pub streaming: StreamingSettings,
    /// Low-level I/O device settings.
    pub device: DeviceSettings,
    /// Job worker pool settings.
    pub jobs: JobSettings,
    /// Engine core settings.
    pub core: CoreSettings,
    /// Music layer settings.
    pub music: MusicSettings,
    /// Spatial layer settings.
    pub spatial: SpatialSettings,
    /// Diagnostics and remote-communication settings.
    pub diagnostics: DiagnosticsSettings,
    /// Authoritative read-only bank directory. Registered last so it is
    /// queried first when resolving bank files.
    pub base_bank_path: PathBuf,
    /// Optional writable directory used only when opening a file for
    /// writing fails against the primary paths.
    pub writable_path: Option<PathBuf>,
    /// Language tag used by the I/O layer to select language-specific asset
    /// variants, for example `"English(US)"`.
    pub language: String,
}

impl Default for SettingsBundle {
    fn default() -> Self {
        Self {
            memory: MemorySettings::default(),
            streaming: StreamingSettings::default(),
            device: DeviceSettings::default(),
            jobs: JobSettings::default(),
            core: CoreSettings::default(),
            music: MusicSettings::default(),
            spatial: SpatialSettings::default(),
            diagnostics: DiagnosticsSettings::default(),
            base_bank_path: PathBuf::from("banks"),
            writable_path: None,
            language: "English(US)".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_worker_count_respects_platform_cap() {
        assert!(default_worker_count() >= 1);
        assert!(default_worker_count() <= MAX_WORKER_THREADS);
    }

    #[test]
    fn defaults_pick_the_documented_language() {
        let settings = SettingsBundle::default();
        assert_eq!(settings.language, "English(US)");
        assert!(settings.device.use_stream_cache);
    }

    #[test]
    fn bundle_round_trips_through_json() {
        let settings = SettingsBundle::default();
        let json = serde_json::to_string(&settings).expect("serialize");
        let back: SettingsBundle = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, settings);
    }
}
