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

//! Throttled resource-summary sampling.
//!
//! The engine invokes [`ResourceMonitor::on_summary`] once per internal
//! tick. To bound sampling overhead the monitor captures only every
//! `SAMPLE_COOLDOWN + 1` invocations and discards the rest. The captured
//! sample is published as an atomically swapped immutable snapshot, so a
//! reader on any thread gets a complete sample, never a torn one.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwap;

use aulos_core::telemetry::{ResourceSample, ResourceSummary, SampleSink};

/// Invocations discarded between two captures.
///
/// A sample is captured on invocation 0 and then every
/// `SAMPLE_COOLDOWN + 1` invocations after it.
pub const SAMPLE_COOLDOWN: u32 = 7;

/// Cooldown-throttled sampler of the engine's resource summary.
#[derive(Debug)]
pub struct ResourceMonitor {
    cooldown: AtomicU32,
    captures: AtomicU64,
    latest: ArcSwap<ResourceSample>,
}

impl ResourceMonitor {
    /// Creates a monitor holding the zero sample.
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            cooldown: AtomicU32::new(0),
            captures: AtomicU64::new(0),
            latest: ArcSwap::from_pointee(ResourceSample::default()),
        })
    }

    /// Returns a copy of the most recently captured sample, or the zero
    /// sample (sequence 0) before the first capture.
    ///
    /// Callable from any thread; the snapshot is swapped whole, so the read
    /// never observes a partially updated sample.
    pub fn latest(&self) -> ResourceSample {
        **self.latest.load()
    }
}

impl SampleSink for ResourceMonitor {
    // Invoked from the engine's tick thread only; the cooldown counter has
    // a single writer.
    fn on_summary(&self, summary: ResourceSummary) {
        let cooldown = self.cooldown.load(Ordering::Acquire);
        if cooldown == 0 {
            let sequence = self.captures.fetch_add(1, Ordering::AcqRel) + 1;
            self.latest
                .store(Arc::new(ResourceSample { sequence, summary }));
            self.cooldown.store(SAMPLE_COOLDOWN, Ordering::Release);
        } else {
            self.cooldown.store(cooldown - 1, Ordering::Release);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary_with_events(events: u64) -> ResourceSummary {
        ResourceSummary {
            active_events: events,
            ..Default::default()
        }
    }

    #[test]
    fn reads_before_the_first_capture_see_the_zero_sample() {
        let monitor = ResourceMonitor::new();
        assert_eq!(monitor.latest(), ResourceSample::default());
    }

    #[test]
    fn sixteen_summaries_capture_exactly_indices_zero_and_eight() {
        let monitor = ResourceMonitor::new();
        for index in 0..16 {
            monitor.on_summary(summary_with_events(index));
        }

        let sample = monitor.latest();
        assert_eq!(sample.sequence, 2);
        assert_eq!(sample.summary.active_events, 8);
    }

    #[test]
    fn the_first_invocation_is_always_captured() {
        let monitor = ResourceMonitor::new();
        monitor.on_summary(summary_with_events(42));

        let sample = monitor.latest();
        assert_eq!(sample.sequence, 1);
        assert_eq!(sample.summary.active_events, 42);
    }

    #[test]
    fn concurrent_reads_never_observe_torn_samples() {
        let monitor = ResourceMonitor::new();
        let writer = {
            let monitor = Arc::clone(&monitor);
            std::thread::spawn(move || {
                for index in 0..10_000u64 {
                    // Both fields move together; a torn read would show a
                    // sequence that disagrees with the summary.
                    monitor.on_summary(summary_with_events(index));
                }
            })
        };

        for _ in 0..10_000 {
            let sample = monitor.latest();
            if sample.sequence > 0 {
                assert_eq!(sample.summary.active_events % 8, 0);
            }
        }
        writer.join().unwrap();
    }
}
