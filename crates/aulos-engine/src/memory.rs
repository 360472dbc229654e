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

//! Budgeted memory accounting for the runtime's resource subsystems.
//!
//! Every bank and stream buffer is charged against a single budget owned by
//! the [`MemoryManager`] instance created at bootstrap. The counters are
//! plain atomics so that telemetry and tests can read them from any thread.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use aulos_core::error::{InitFailure, ResultCode};
use aulos_core::memory::MemoryStats;
use aulos_core::settings::MemorySettings;

/// Instance-owned allocator front end.
///
/// Charges are explicit: callers that keep bytes alive call
/// [`charge`](Self::charge) and must pair it with a
/// [`release`](Self::release) of the same size.
#[derive(Debug)]
pub struct MemoryManager {
    budget_bytes: u64,
    in_use: AtomicU64,
    peak: AtomicU64,
    charges: AtomicU64,
    releases: AtomicU64,
}

impl MemoryManager {
    /// Initializes the memory subsystem.
    ///
    /// Fails with [`ResultCode::InvalidParameter`] if the configured budget
    /// is zero.
    pub fn init(settings: &MemorySettings) -> Result<Arc<Self>, InitFailure> {
        if settings.budget_bytes == 0 {
            return Err(InitFailure::new(
                ResultCode::InvalidParameter,
                "memory budget must be greater than zero",
            ));
        }

        log::info!(
            "Memory manager initialized with a {} MiB budget.",
            settings.budget_bytes / (1024 * 1024)
        );
        Ok(Arc::new(Self {
            budget_bytes: settings.budget_bytes,
            in_use: AtomicU64::new(0),
            peak: AtomicU64::new(0),
            charges: AtomicU64::new(0),
            releases: AtomicU64::new(0),
        }))
    }

    /// Charges `bytes` against the budget.
    ///
    /// Fails with [`ResultCode::InsufficientMemory`] when the charge would
    /// exceed the budget; the counters are left untouched in that case.
    pub fn charge(&self, bytes: u64) -> Result<(), InitFailure> {
        let budget = self.budget_bytes;
        let result = self
            .in_use
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                let next = current.checked_add(bytes)?;
                (next <= budget).then_some(next)
            });

        match result {
            Ok(previous) => {
                self.peak.fetch_max(previous + bytes, Ordering::AcqRel);
                self.charges.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            Err(current) => Err(InitFailure::new(
                ResultCode::InsufficientMemory,
                format!(
                    "charge of {bytes} bytes exceeds budget ({current} of {budget} in use)"
                ),
            )),
        }
    }

    /// Releases a previous charge of `bytes`.
    pub fn release(&self, bytes: u64) {
        let result = self
            .in_use
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                current.checked_sub(bytes)
            });

        if result.is_err() {
            log::error!("Memory release of {bytes} bytes underflowed the usage counter!");
        } else {
            self.releases.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Bytes currently charged.
    pub fn in_use(&self) -> u64 {
        self.in_use.load(Ordering::Acquire)
    }

    /// Takes a snapshot of all counters.
    pub fn stats(&self) -> MemoryStats {
        MemoryStats {
            budget_bytes: self.budget_bytes,
            in_use_bytes: self.in_use.load(Ordering::Acquire),
            peak_bytes: self.peak.load(Ordering::Acquire),
            total_charges: self.charges.load(Ordering::Relaxed),
            total_releases: self.releases.load(Ordering::Relaxed),
        }
    }

    /// Releases the subsystem, logging any outstanding charges.
    pub fn shutdown(&self) {
        let remaining = self.in_use();
        if remaining != 0 {
            log::warn!("Memory manager shut down with {remaining} bytes still charged.");
        } else {
            log::info!("Memory manager shut down clean.");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager(budget: u64) -> Arc<MemoryManager> {
        MemoryManager::init(&MemorySettings {
            budget_bytes: budget,
        })
        .expect("init should succeed")
    }

    #[test]
    fn zero_budget_is_rejected() {
        let err = MemoryManager::init(&MemorySettings { budget_bytes: 0 }).unwrap_err();
        assert_eq!(err.code, ResultCode::InvalidParameter);
    }

    #[test]
    fn charge_and_release_return_to_baseline() {
        let memory = manager(1024);
        memory.charge(512).expect("within budget");
        memory.charge(512).expect("exactly at budget");
        memory.release(512);
        memory.release(512);

        let stats = memory.stats();
        assert_eq!(stats.in_use_bytes, 0);
        assert_eq!(stats.peak_bytes, 1024);
        assert_eq!(stats.total_charges, 2);
        assert_eq!(stats.total_releases, 2);
    }

    #[test]
    fn charge_over_budget_is_rejected_and_leaves_counters() {
        let memory = manager(100);
        memory.charge(60).expect("within budget");
        let err = memory.charge(60).unwrap_err();
        assert_eq!(err.code, ResultCode::InsufficientMemory);
        assert_eq!(memory.in_use(), 60);
    }
}
