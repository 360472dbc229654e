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

//! The engine-wide lifecycle flag and its thread-safe cell.
//!
//! Every subsystem operation other than bootstrap and shutdown requires the
//! runtime to be in the [`BootstrapState::Running`] state.

use std::sync::atomic::{AtomicU8, Ordering};

/// The engine-wide lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum BootstrapState {
    /// No subsystem is live. The state after a failed bootstrap.
    Uninitialized = 0,
    /// Bootstrap is in progress; subsystems are coming up in order.
    Initializing = 1,
    /// All mandatory subsystems are live; runtime operations are allowed.
    Running = 2,
    /// Teardown is in progress; new operations are rejected.
    ShuttingDown = 3,
    /// Teardown completed.
    Shutdown = 4,
}

impl BootstrapState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            1 => Self::Initializing,
            2 => Self::Running,
            3 => Self::ShuttingDown,
            4 => Self::Shutdown,
            _ => Self::Uninitialized,
        }
    }
}

/// A shared, atomically updated holder of the lifecycle state.
///
/// One cell is created per bootstrap and shared with every subsystem front
/// end so that runtime operations can gate on [`BootstrapState::Running`]
/// without locking.
#[derive(Debug)]
pub struct LifecycleCell(AtomicU8);

impl LifecycleCell {
    /// Creates a cell in the [`BootstrapState::Uninitialized`] state.
    pub fn new() -> Self {
        Self(AtomicU8::new(BootstrapState::Uninitialized as u8))
    }

    /// Returns the current state.
    pub fn state(&self) -> BootstrapState {
        BootstrapState::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Returns `true` while runtime operations are allowed.
    pub fn is_running(&self) -> bool {
        self.state() == BootstrapState::Running
    }

    /// Unconditionally moves the cell to `state`.
    pub fn set(&self, state: BootstrapState) {
        self.0.store(state as u8, Ordering::Release);
    }

    /// Attempts the `Running` to `ShuttingDown` transition.
    ///
    /// Returns `false` if the runtime was not running, which makes shutdown
    /// idempotent: only the caller that wins this transition performs the
    /// teardown.
    pub fn begin_shutdown(&self) -> bool {
        self.0
            .compare_exchange(
                BootstrapState::Running as u8,
                BootstrapState::ShuttingDown as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }
}

impl Default for LifecycleCell {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_cell_is_uninitialized() {
        let cell = LifecycleCell::new();
        assert_eq!(cell.state(), BootstrapState::Uninitialized);
        assert!(!cell.is_running());
    }

    #[test]
    fn begin_shutdown_only_succeeds_once() {
        let cell = LifecycleCell::new();
        cell.set(BootstrapState::Running);
        assert!(cell.begin_shutdown());
        assert!(!cell.begin_shutdown());
        assert_eq!(cell.state(), BootstrapState::ShuttingDown);
    }

    #[test]
    fn begin_shutdown_rejected_when_not_running() {
        let cell = LifecycleCell::new();
        assert!(!cell.begin_shutdown());
        assert_eq!(cell.state(), BootstrapState::Uninitialized);
    }
}
