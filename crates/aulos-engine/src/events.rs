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

//! Fire-and-forget event dispatch against registered game objects.

use std::sync::Arc;

use aulos_core::error::DispatchError;
use aulos_core::event::EventReference;
use aulos_core::lifecycle::LifecycleCell;
use aulos_core::object::GameObjectHandle;

use crate::engine::EngineCore;
use crate::spatial::SpatialLayer;

/// Posts named events to the engine.
///
/// `post` returns once the work is enqueued, before anything is audible.
/// No completion notification exists on this path.
pub struct EventDispatcher {
    core: Arc<EngineCore>,
    spatial: Arc<SpatialLayer>,
    state: Arc<LifecycleCell>,
}

impl EventDispatcher {
    /// Creates the dispatcher.
    pub fn new(
        core: Arc<EngineCore>,
        spatial: Arc<SpatialLayer>,
        state: Arc<LifecycleCell>,
    ) -> Self {
        Self {
            core,
            spatial,
            state,
        }
    }

    /// Posts `event` on `target`.
    pub fn post(
        &self,
        target: &GameObjectHandle,
        event: &EventReference,
    ) -> Result<(), DispatchError> {
        if !self.state.is_running() {
            return Err(DispatchError::EngineNotRunning);
        }
        if !self.core.is_registered(target.id) {
            return Err(DispatchError::InvalidTarget { id: target.id });
        }
        if !self.core.resolves_event(event.path()) {
            return Err(DispatchError::UnknownEvent {
                path: event.path().to_string(),
            });
        }

        self.spatial.register_emitter(target.id);
        self.core.dispatch(target.id, event.path());
        log::debug!("Event '{event}' posted to {} ({}).", target.display_name, target.id);
        Ok(())
    }
}
