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

//! The streaming manager and the file-backed low-level I/O device.
//!
//! The streaming manager accounts for open stream slots. The I/O device is
//! bound to it and owns everything path-related: the ordered base-path list
//! (most recently added queried first), the writable fallback used only when
//! opening a file for writing fails, and the process-wide language tag used
//! to select language-specific asset variants.

use std::collections::HashMap;
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use aulos_core::error::{InitFailure, ResultCode};
use aulos_core::settings::{DeviceSettings, StreamingSettings};

/// Slot accounting for file-backed streams.
#[derive(Debug)]
pub struct StreamingManager {
    max_open_streams: u32,
    open: AtomicU32,
}

impl StreamingManager {
    /// Creates the streaming manager.
    pub fn create(settings: &StreamingSettings) -> Result<Arc<Self>, InitFailure> {
        if settings.max_open_streams == 0 {
            return Err(InitFailure::new(
                ResultCode::InvalidParameter,
                "max_open_streams must be greater than zero",
            ));
        }
        log::info!(
            "Streaming manager created ({} stream slots).",
            settings.max_open_streams
        );
        Ok(Arc::new(Self {
            max_open_streams: settings.max_open_streams,
            open: AtomicU32::new(0),
        }))
    }

    /// Claims a stream slot, released when the returned lease is dropped.
    pub fn open_stream(self: &Arc<Self>) -> Result<StreamLease, InitFailure> {
        let max = self.max_open_streams;
        let claimed = self
            .open
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                (current < max).then_some(current + 1)
            });

        match claimed {
            Ok(_) => Ok(StreamLease {
                manager: Arc::clone(self),
            }),
            Err(_) => Err(InitFailure::new(
                ResultCode::DeviceFailure,
                format!("all {max} stream slots are in use"),
            )),
        }
    }

    /// Streams currently open.
    pub fn open_count(&self) -> u32 {
        self.open.load(Ordering::Acquire)
    }

    /// Releases the subsystem, logging any stream slots still claimed.
    pub fn release(&self) {
        let open = self.open_count();
        if open != 0 {
            log::warn!("Streaming manager released with {open} streams still open.");
        }
    }
}

/// RAII guard for one open stream slot.
#[derive(Debug)]
pub struct StreamLease {
    manager: Arc<StreamingManager>,
}

impl Drop for StreamLease {
    fn drop(&mut self) {
        self.manager.open.fetch_sub(1, Ordering::AcqRel);
    }
}

/// The low-level I/O device bound to the streaming manager.
#[derive(Debug)]
pub struct IoDevice {
    streaming: Arc<StreamingManager>,
    granularity_bytes: usize,
    use_stream_cache: bool,
    base_paths: RwLock<Vec<PathBuf>>,
    writable_path: RwLock<Option<PathBuf>>,
    language: RwLock<Option<String>>,
    cache: Mutex<HashMap<PathBuf, Arc<Vec<u8>>>>,
}

impl IoDevice {
    /// Initializes the device.
    pub fn init(
        settings: &DeviceSettings,
        streaming: Arc<StreamingManager>,
    ) -> Result<Arc<Self>, InitFailure> {
        if settings.granularity_bytes == 0 {
            return Err(InitFailure::new(
                ResultCode::InvalidParameter,
                "stream granularity must be greater than zero",
            ));
        }
        log::info!(
            "I/O device initialized (granularity {} bytes, stream cache {}).",
            settings.granularity_bytes,
            if settings.use_stream_cache { "on" } else { "off" }
        );
        Ok(Arc::new(Self {
            streaming,
            granularity_bytes: settings.granularity_bytes,
            use_stream_cache: settings.use_stream_cache,
            base_paths: RwLock::new(Vec::new()),
            writable_path: RwLock::new(None),
            language: RwLock::new(None),
            cache: Mutex::new(HashMap::new()),
        }))
    }

    /// Appends a base path. The last registered path is queried first.
    pub fn add_base_path(&self, path: impl Into<PathBuf>) {
        let path = path.into();
        log::info!("Base path registered: '{}'", path.display());
        self.base_paths.write().unwrap().push(path);
    }

    /// Remembers the writable fallback directory.
    pub fn set_writable_path(&self, path: impl Into<PathBuf>) {
        *self.writable_path.write().unwrap() = Some(path.into());
    }

    /// Sets the process-wide language tag. Rejects an empty tag.
    pub fn set_language(&self, tag: &str) -> Result<(), InitFailure> {
        if tag.trim().is_empty() {
            return Err(InitFailure::new(
                ResultCode::InvalidParameter,
                "language tag must not be empty",
            ));
        }
        log::info!("Current language set to '{tag}'.");
        *self.language.write().unwrap() = Some(tag.to_string());
        Ok(())
    }

    /// Returns the current language tag, if set.
    pub fn language(&self) -> Option<String> {
        self.language.read().unwrap().clone()
    }

    /// Resolves a requested path against the registered base paths.
    ///
    /// Base paths are tried newest first. Under each base path the
    /// language-specific subdirectory is preferred over the plain location.
    /// An absolute path that exists resolves to itself.
    pub fn resolve(&self, requested: &Path) -> Option<PathBuf> {
        if requested.is_absolute() {
            return requested.is_file().then(|| requested.to_path_buf());
        }

        let language = self.language();
        for base in self.base_paths.read().unwrap().iter().rev() {
            if let Some(tag) = &language {
                let candidate = base.join(tag).join(requested);
                if candidate.is_file() {
                    return Some(candidate);
                }
            }
            let candidate = base.join(requested);
            if candidate.is_file() {
                return Some(candidate);
            }
        }
        None
    }

    /// Reads an already resolved file through a stream slot, in
    /// granularity-sized blocks.
    pub fn read(&self, resolved: &Path) -> io::Result<Vec<u8>> {
        if self.use_stream_cache {
            if let Some(cached) = self.cache.lock().unwrap().get(resolved) {
                log::trace!("Stream cache hit for '{}'.", resolved.display());
                return Ok(cached.as_ref().clone());
            }
        }

        let _lease = self
            .streaming
            .open_stream()
            .map_err(|failure| io::Error::new(io::ErrorKind::Other, failure.to_string()))?;

        let mut file = File::open(resolved)?;
        let mut contents = Vec::new();
        let mut block = vec![0u8; self.granularity_bytes];
        loop {
            let read = file.read(&mut block)?;
            if read == 0 {
                break;
            }
            contents.extend_from_slice(&block[..read]);
        }

        if self.use_stream_cache {
            self.cache
                .lock()
                .unwrap()
                .insert(resolved.to_path_buf(), Arc::new(contents.clone()));
        }
        Ok(contents)
    }

    /// Creates a file for writing under the primary base path, falling back
    /// to the writable directory only when the primary location refuses the
    /// write.
    pub fn create_for_write(&self, relative: &Path) -> io::Result<(File, PathBuf)> {
        let primary = self
            .base_paths
            .read()
            .unwrap()
            .last()
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no base path registered"))?;

        let target = primary.join(relative);
        match File::create(&target) {
            Ok(file) => Ok((file, target)),
            Err(primary_err) => {
                let fallback = self.writable_path.read().unwrap().clone();
                match fallback {
                    Some(dir) => {
                        log::warn!(
                            "Write to '{}' failed ({primary_err}); using writable fallback.",
                            target.display()
                        );
                        let target = dir.join(relative);
                        File::create(&target).map(|file| (file, target))
                    }
                    None => Err(primary_err),
                }
            }
        }
    }

    /// Releases the device, dropping the stream cache.
    pub fn release(&self) {
        self.cache.lock().unwrap().clear();
        log::info!("I/O device released.");
    }
}
