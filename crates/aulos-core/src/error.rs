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

//! Defines the hierarchy of error types for the audio runtime.

use std::fmt;
use std::path::PathBuf;

/// Structured result code carried by subsystem failures.
///
/// Subsystems report failures with one of these codes plus a human-readable
/// message; the numeric value is stable and suitable for operator-facing
/// diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ResultCode {
    /// A settings value was out of its valid range.
    InvalidParameter = 2,
    /// The memory budget was exhausted or too small to operate.
    InsufficientMemory = 3,
    /// An underlying device or OS resource failed.
    DeviceFailure = 4,
    /// A resource (id, port, slot) was already in use.
    AlreadyInUse = 5,
    /// The operation requires a running engine.
    NotInitialized = 6,
}

impl ResultCode {
    /// Returns the stable numeric value of the code.
    pub fn as_u32(self) -> u32 {
        self as u32
    }
}

impl fmt::Display for ResultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} ({})", self, self.as_u32())
    }
}

/// A subsystem initialization failure: the structured code plus a message
/// describing what went wrong.
///
/// The bootstrap sequencer wraps these into the stage-specific
/// [`BootstrapError`] variant for the stage that failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitFailure {
    /// The structured failure code.
    pub code: ResultCode,
    /// Human-readable failure details.
    pub message: String,
}

impl InitFailure {
    /// Creates a failure from a code and message.
    pub fn new(code: ResultCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for InitFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for InitFailure {}

/// A fatal bootstrap failure, identifying the stage that failed.
///
/// Every variant carries the underlying subsystem's result code and message.
/// When one of these is returned, all stages below the failing one have
/// already been released in reverse order; no partially-live engine remains
/// reachable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BootstrapError {
    /// Stage 1: the memory allocator could not be initialized.
    AllocatorInitFailed(InitFailure),
    /// Stage 2: the streaming manager could not be created.
    StreamingInitFailed(InitFailure),
    /// Stage 3: the low-level I/O device could not be initialized.
    IoInitFailed(InitFailure),
    /// Stage 4: the job worker pool could not be started.
    WorkerPoolInitFailed(InitFailure),
    /// Stage 5: the engine core could not be initialized.
    CoreInitFailed(InitFailure),
    /// Stage 6: the music layer could not be initialized.
    MusicInitFailed(InitFailure),
    /// Stage 8: the spatial layer could not be initialized.
    SpatialInitFailed(InitFailure),
    /// Stage 10: the language tag was rejected by the I/O layer.
    LanguageInitFailed(InitFailure),
}

impl BootstrapError {
    /// Returns the underlying subsystem failure.
    pub fn failure(&self) -> &InitFailure {
        match self {
            Self::AllocatorInitFailed(f)
            | Self::StreamingInitFailed(f)
            | Self::IoInitFailed(f)
            | Self::WorkerPoolInitFailed(f)
            | Self::CoreInitFailed(f)
            | Self::MusicInitFailed(f)
            | Self::SpatialInitFailed(f)
            | Self::LanguageInitFailed(f) => f,
        }
    }

    fn stage_name(&self) -> &'static str {
        match self {
            Self::AllocatorInitFailed(_) => "memory allocator",
            Self::StreamingInitFailed(_) => "streaming manager",
            Self::IoInitFailed(_) => "I/O device",
            Self::WorkerPoolInitFailed(_) => "job worker pool",
            Self::CoreInitFailed(_) => "engine core",
            Self::MusicInitFailed(_) => "music layer",
            Self::SpatialInitFailed(_) => "spatial layer",
            Self::LanguageInitFailed(_) => "language selection",
        }
    }
}

impl fmt::Display for BootstrapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "bootstrap failed at {}: {}",
            self.stage_name(),
            self.failure()
        )
    }
}

impl std::error::Error for BootstrapError {}

/// An error starting the job worker pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
    /// More workers were requested than the platform supports.
    TooManyWorkers {
        /// The requested worker count.
        requested: usize,
        /// The platform maximum.
        max: usize,
    },
    /// The OS refused to spawn a worker thread.
    SpawnFailed(String),
}

impl fmt::Display for PoolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PoolError::TooManyWorkers { requested, max } => {
                write!(f, "{requested} workers requested, platform maximum is {max}")
            }
            PoolError::SpawnFailed(details) => {
                write!(f, "failed to spawn worker thread: {details}")
            }
        }
    }
}

impl std::error::Error for PoolError {}

impl From<PoolError> for InitFailure {
    fn from(err: PoolError) -> Self {
        let code = match err {
            PoolError::TooManyWorkers { .. } => ResultCode::InvalidParameter,
            PoolError::SpawnFailed(_) => ResultCode::DeviceFailure,
        };
        InitFailure::new(code, err.to_string())
    }
}

/// An error loading a sound bank.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadError {
    /// The path did not resolve to a file under any registered base path.
    NotFound {
        /// The path as requested by the caller.
        path: PathBuf,
    },
    /// The file was found but its contents could not be decoded.
    Corrupt {
        /// The path as requested by the caller.
        path: PathBuf,
        /// Decoder or I/O details.
        details: String,
    },
    /// The engine refused the bank (for example, the memory budget was
    /// exhausted).
    EngineRejected {
        /// The path as requested by the caller.
        path: PathBuf,
        /// The engine's structured rejection code.
        code: ResultCode,
    },
    /// The engine is not in the running state.
    EngineNotRunning,
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadError::NotFound { path } => {
                write!(f, "bank file not found: '{}'", path.display())
            }
            LoadError::Corrupt { path, details } => {
                write!(f, "bank file '{}' is corrupt: {details}", path.display())
            }
            LoadError::EngineRejected { path, code } => {
                write!(f, "engine rejected bank '{}': {code}", path.display())
            }
            LoadError::EngineNotRunning => {
                write!(f, "cannot load a bank while the engine is not running")
            }
        }
    }
}

impl std::error::Error for LoadError {}

/// An error dispatching an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    /// No loaded bank defines the event path.
    UnknownEvent {
        /// The unresolved event path.
        path: String,
    },
    /// The target handle was never registered or has been released.
    InvalidTarget {
        /// The offending game object id.
        id: crate::object::GameObjectId,
    },
    /// The engine is not in the running state.
    EngineNotRunning,
}

impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchError::UnknownEvent { path } => {
                write!(f, "no loaded bank defines event '{path}'")
            }
            DispatchError::InvalidTarget { id } => {
                write!(f, "event target {id} is not a registered game object")
            }
            DispatchError::EngineNotRunning => {
                write!(f, "cannot post an event while the engine is not running")
            }
        }
    }
}

impl std::error::Error for DispatchError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bootstrap_error_display_names_stage_and_code() {
        let err = BootstrapError::StreamingInitFailed(InitFailure::new(
            ResultCode::InvalidParameter,
            "max_open_streams must be > 0",
        ));
        assert_eq!(
            format!("{err}"),
            "bootstrap failed at streaming manager: InvalidParameter (2): \
             max_open_streams must be > 0"
        );
    }

    #[test]
    fn pool_error_converts_to_init_failure() {
        let failure: InitFailure = PoolError::TooManyWorkers {
            requested: 64,
            max: 8,
        }
        .into();
        assert_eq!(failure.code, ResultCode::InvalidParameter);
    }

    #[test]
    fn load_error_display() {
        let err = LoadError::NotFound {
            path: PathBuf::from("Init.bnk"),
        };
        assert_eq!(format!("{err}"), "bank file not found: 'Init.bnk'");
    }
}
