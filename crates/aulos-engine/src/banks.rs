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

//! Synchronous sound-bank loading.
//!
//! A load resolves the path through the I/O device, charges the file's
//! bytes against the memory budget, decodes the packed manifest, and
//! registers the bank's events with the engine core. Every attempt is
//! recorded with exactly one terminal state. The same path loaded twice
//! yields two independent records; avoiding duplicate loads is the
//! caller's responsibility.

use std::path::Path;
use std::sync::{Arc, RwLock};

use aulos_core::bank::{Bank, BankLoadState, BankManifest};
use aulos_core::error::{LoadError, ResultCode};
use aulos_core::lifecycle::LifecycleCell;

use crate::engine::EngineCore;
use crate::memory::MemoryManager;
use crate::streaming::IoDevice;

struct LoadRecord {
    bank: Bank,
    charged_bytes: u64,
}

/// Loads serialized bank assets and tracks their terminal load states.
pub struct BankLoader {
    io: Arc<IoDevice>,
    memory: Arc<MemoryManager>,
    core: Arc<EngineCore>,
    state: Arc<LifecycleCell>,
    records: RwLock<Vec<LoadRecord>>,
}

impl BankLoader {
    /// Creates the loader.
    pub fn new(
        io: Arc<IoDevice>,
        memory: Arc<MemoryManager>,
        core: Arc<EngineCore>,
        state: Arc<LifecycleCell>,
    ) -> Self {
        Self {
            io,
            memory,
            core,
            state,
            records: RwLock::new(Vec::new()),
        }
    }

    /// Loads the bank at `path`, blocking until the outcome is terminal.
    pub fn load(&self, path: impl AsRef<Path>) -> Result<Bank, LoadError> {
        let requested = path.as_ref().to_path_buf();

        if !self.state.is_running() {
            return Err(LoadError::EngineNotRunning);
        }

        let Some(resolved) = self.io.resolve(&requested) else {
            self.record_failed(&requested);
            return Err(LoadError::NotFound { path: requested });
        };

        let bytes = match self.io.read(&resolved) {
            Ok(bytes) => bytes,
            Err(read_err) => {
                self.record_failed(&requested);
                return Err(LoadError::Corrupt {
                    path: requested,
                    details: read_err.to_string(),
                });
            }
        };

        let size = bytes.len() as u64;
        if self.memory.charge(size).is_err() {
            self.record_failed(&requested);
            return Err(LoadError::EngineRejected {
                path: requested,
                code: ResultCode::InsufficientMemory,
            });
        }

        let manifest = match BankManifest::decode(&bytes) {
            Ok(manifest) => manifest,
            Err(decode_err) => {
                self.memory.release(size);
                self.record_failed(&requested);
                return Err(LoadError::Corrupt {
                    path: requested,
                    details: decode_err.to_string(),
                });
            }
        };

        self.core.register_bank_events(&manifest);

        let bank = Bank {
            path: requested,
            load_state: BankLoadState::Loaded,
        };
        self.records.write().unwrap().push(LoadRecord {
            bank: bank.clone(),
            charged_bytes: size,
        });
        log::info!("Bank '{}' loaded ({size} bytes).", bank.path.display());
        Ok(bank)
    }

    fn record_failed(&self, path: &Path) {
        self.records.write().unwrap().push(LoadRecord {
            bank: Bank {
                path: path.to_path_buf(),
                load_state: BankLoadState::Failed,
            },
            charged_bytes: 0,
        });
    }

    /// All load attempts, in order, with their terminal states.
    pub fn banks(&self) -> Vec<Bank> {
        self.records
            .read()
            .unwrap()
            .iter()
            .map(|record| record.bank.clone())
            .collect()
    }

    /// Releases the memory charged by every loaded bank.
    pub fn release_all(&self) {
        let mut records = self.records.write().unwrap();
        for record in records.drain(..) {
            if record.charged_bytes > 0 {
                self.memory.release(record.charged_bytes);
            }
        }
    }
}
