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

//! Reporting types for the runtime's memory accounting.
//!
//! The counters themselves live on the engine's memory manager instance; no
//! global state is involved. This module only defines the snapshot format
//! handed to telemetry consumers and tests.

/// A snapshot of the memory manager's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemoryStats {
    /// The configured budget in bytes.
    pub budget_bytes: u64,
    /// Bytes currently charged.
    pub in_use_bytes: u64,
    /// The peak number of bytes ever charged simultaneously.
    pub peak_bytes: u64,
    /// The total number of charge operations.
    pub total_charges: u64,
    /// The total number of release operations.
    pub total_releases: u64,
}

impl MemoryStats {
    /// Returns the bytes still available under the budget.
    pub fn headroom_bytes(&self) -> u64 {
        self.budget_bytes.saturating_sub(self.in_use_bytes)
    }

    /// Returns the current usage in megabytes.
    pub fn in_use_mb(&self) -> f64 {
        self.in_use_bytes as f64 / (1024.0 * 1024.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headroom_saturates_at_zero() {
        let stats = MemoryStats {
            budget_bytes: 10,
            in_use_bytes: 25,
            ..Default::default()
        };
        assert_eq!(stats.headroom_bytes(), 0);
    }
}
