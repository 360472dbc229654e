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

//! The interactive-music extension layered on the engine core.
//!
//! Keeps a beat clock advanced by the engine tick. Transitions are
//! scheduled on beat boundaries at least the configured lookahead ahead of
//! the clock.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use aulos_core::error::{InitFailure, ResultCode};
use aulos_core::settings::MusicSettings;

/// Beat clock and transition scheduling state.
#[derive(Debug)]
pub struct MusicLayer {
    transition_lookahead_ms: u64,
    tempo_bpm: u32,
    clock_ms: AtomicU64,
}

impl MusicLayer {
    /// Initializes the music layer.
    pub fn init(settings: &MusicSettings) -> Result<Arc<Self>, InitFailure> {
        if settings.transition_lookahead_ms == 0 {
            return Err(InitFailure::new(
                ResultCode::InvalidParameter,
                "transition_lookahead_ms must be greater than zero",
            ));
        }
        if settings.tempo_bpm == 0 {
            return Err(InitFailure::new(
                ResultCode::InvalidParameter,
                "tempo_bpm must be greater than zero",
            ));
        }
        log::info!(
            "Music layer initialized ({} bpm, {} ms lookahead).",
            settings.tempo_bpm,
            settings.transition_lookahead_ms
        );
        Ok(Arc::new(Self {
            transition_lookahead_ms: settings.transition_lookahead_ms,
            tempo_bpm: settings.tempo_bpm,
            clock_ms: AtomicU64::new(0),
        }))
    }

    /// Advances the beat clock. Called from the engine tick.
    pub fn advance(&self, dt_ms: u64) {
        self.clock_ms.fetch_add(dt_ms, Ordering::AcqRel);
    }

    fn beat_interval_ms(&self) -> u64 {
        60_000 / u64::from(self.tempo_bpm)
    }

    /// The current beat number.
    pub fn beat(&self) -> u64 {
        self.clock_ms.load(Ordering::Acquire) / self.beat_interval_ms()
    }

    /// The clock time of the earliest beat boundary at least the lookahead
    /// away, where the next transition would land.
    pub fn next_transition_ms(&self) -> u64 {
        let clock = self.clock_ms.load(Ordering::Acquire);
        let earliest = clock + self.transition_lookahead_ms;
        let interval = self.beat_interval_ms();
        earliest.div_ceil(interval) * interval
    }

    /// Resets the layer's state.
    pub fn release(&self) {
        self.clock_ms.store(0, Ordering::Release);
        log::info!("Music layer released.");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_lookahead_is_rejected() {
        let err = MusicLayer::init(&MusicSettings {
            transition_lookahead_ms: 0,
            tempo_bpm: 120,
        })
        .unwrap_err();
        assert_eq!(err.code, ResultCode::InvalidParameter);
    }

    #[test]
    fn beat_clock_advances_with_ticks() {
        // 120 bpm: one beat every 500 ms.
        let music = MusicLayer::init(&MusicSettings {
            transition_lookahead_ms: 200,
            tempo_bpm: 120,
        })
        .unwrap();

        assert_eq!(music.beat(), 0);
        music.advance(1_250);
        assert_eq!(music.beat(), 2);
    }

    #[test]
    fn transitions_land_on_a_beat_after_the_lookahead() {
        let music = MusicLayer::init(&MusicSettings {
            transition_lookahead_ms: 200,
            tempo_bpm: 120,
        })
        .unwrap();

        music.advance(400);
        // Earliest transition time is 600 ms; the next boundary is 1000 ms.
        assert_eq!(music.next_transition_ms(), 1_000);
    }
}
