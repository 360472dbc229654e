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

//! Issues stable identifiers for playback sources.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use aulos_core::lifecycle::LifecycleCell;
use aulos_core::object::{GameObjectHandle, GameObjectId, OBJECT_ID_BASE};

use crate::engine::EngineCore;

/// Issues unique, strictly monotonic game-object handles.
///
/// Ids start just above the reserved listener range and are never reused
/// for the process lifetime. Registration never fails; an id collision on
/// the engine side would be an invariant violation and panics.
pub struct GameObjectRegistry {
    core: Arc<EngineCore>,
    state: Arc<LifecycleCell>,
    next_id: AtomicU64,
}

impl GameObjectRegistry {
    /// Creates the registry. The first issued id is `OBJECT_ID_BASE + 1`.
    pub fn new(core: Arc<EngineCore>, state: Arc<LifecycleCell>) -> Self {
        Self {
            core,
            state,
            next_id: AtomicU64::new(OBJECT_ID_BASE),
        }
    }

    /// Registers a playback source under `name` and returns its handle.
    pub fn register(&self, name: &str) -> GameObjectHandle {
        let id = GameObjectId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);

        if self.state.is_running() {
            if let Err(failure) = self.core.register_object(id, name) {
                // Ids are issued from a single monotonic counter; the
                // engine refusing one means the table is corrupt.
                panic!("game object {id} rejected by the engine: {failure}");
            }
        } else {
            log::warn!("Game object '{name}' registered while the engine is not running.");
        }

        GameObjectHandle {
            id,
            display_name: name.to_string(),
        }
    }
}
