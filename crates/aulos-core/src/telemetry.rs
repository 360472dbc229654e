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

//! Telemetry contracts: the engine-aggregated resource summary, throttled
//! samples, diagnostic records, and the capability traits through which the
//! engine delivers both.
//!
//! The engine invokes [`SampleSink::on_summary`] and [`ErrorSink::handle`]
//! from its own internal execution context, asynchronously with respect to
//! the caller's threads. Implementations must not block materially.

use serde::{Deserialize, Serialize};

use crate::object::{GameObjectId, PlayingId};

/// Stable numeric codes for the diagnostic records the runtime itself
/// produces. Engine-surfaced records may use further codes.
pub mod codes {
    /// The remote-communication service could not start.
    pub const COMM_INIT_FAILED: u32 = 101;
    /// A dispatch parameter was outside its expected range.
    pub const PARAM_OUT_OF_RANGE: u32 = 102;
}

/// Aggregate resource counters produced by the engine once per internal tick.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ResourceSummary {
    /// Milliseconds since the engine entered the running state.
    pub uptime_ms: u64,
    /// Total events dispatched since bootstrap.
    pub active_events: u64,
    /// Voices currently mixed.
    pub active_voices: u32,
    /// Voices counted but not mixed because the physical voice limit was hit.
    pub virtual_voices: u32,
    /// Bytes currently charged against the memory budget.
    pub memory_used_bytes: u64,
    /// Peak bytes ever charged against the memory budget.
    pub memory_peak_bytes: u64,
    /// Streams currently open on the I/O device.
    pub open_streams: u32,
    /// Jobs queued on the worker pool and not yet completed.
    pub pending_jobs: u64,
    /// The music layer's beat counter.
    pub music_beat: u64,
    /// Emitters currently known to the spatial layer.
    pub spatial_emitters: u32,
}

/// An immutable snapshot captured by the resource monitor.
///
/// `sequence` is 0 for the zero sample returned before the first capture and
/// increments with each captured summary thereafter. A sample is never
/// mutated after capture; readers always receive a copy.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ResourceSample {
    /// Capture sequence number, 0 before the first capture.
    pub sequence: u64,
    /// The counters captured from the engine.
    pub summary: ResourceSummary,
}

/// Severity of a diagnostic record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    /// Informational message; never aborts anything.
    Message,
    /// An error surfaced by the engine or a subsystem.
    Error,
}

/// A diagnostic record produced by the engine or one of its subsystems.
///
/// Records are ephemeral: they are delivered to whatever sink is registered
/// and may be discarded.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorRecord {
    /// Stable numeric code identifying the condition.
    pub code: u32,
    /// Whether this is a message or an error.
    pub severity: Severity,
    /// The playing instance this record relates to, if any.
    pub playing_id: Option<PlayingId>,
    /// The game object this record relates to, if any.
    pub game_object: Option<GameObjectId>,
    /// Human-readable text.
    pub text: String,
}

impl ErrorRecord {
    /// Creates a record with no related playing instance or game object.
    pub fn new(code: u32, severity: Severity, text: impl Into<String>) -> Self {
        Self {
            code,
            severity,
            playing_id: None,
            game_object: None,
            text: text.into(),
        }
    }
}

/// Capability through which the engine delivers the per-tick resource
/// summary.
///
/// Invoked from an engine-internal thread; implementations throttle and
/// store as they see fit but must return promptly.
pub trait SampleSink: Send + Sync {
    /// Called by the engine with a freshly aggregated summary.
    fn on_summary(&self, summary: ResourceSummary);
}

/// Capability through which the engine delivers diagnostic records.
///
/// Executes on the engine's reporting path; implementations must not block
/// materially.
pub trait ErrorSink: Send + Sync {
    /// Called for every record at or above the configured minimum severity.
    fn handle(&self, record: &ErrorRecord);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_orders_message_below_error() {
        assert!(Severity::Message < Severity::Error);
    }

    #[test]
    fn zero_sample_has_sequence_zero() {
        let sample = ResourceSample::default();
        assert_eq!(sample.sequence, 0);
        assert_eq!(sample.summary, ResourceSummary::default());
    }
}
