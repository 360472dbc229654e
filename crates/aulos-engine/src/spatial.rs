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

//! The spatial-audio extension layered on the engine core.
//!
//! Tracks the listener transform, the set of emitting game objects, and
//! the static geometry descriptors supplied by the external scene importer
//! for future occlusion processing. No signal processing happens here.

use std::collections::HashSet;
use std::sync::{Arc, RwLock};

use aulos_core::error::{InitFailure, ResultCode};
use aulos_core::geometry::GeometryDescriptor;
use aulos_core::object::GameObjectId;
use aulos_core::settings::SpatialSettings;

/// Spatial state: listener, emitters, and occlusion geometry.
#[derive(Debug)]
pub struct SpatialLayer {
    max_reflection_order: u8,
    listener_position: RwLock<[f32; 3]>,
    geometry: RwLock<Vec<GeometryDescriptor>>,
    emitters: RwLock<HashSet<GameObjectId>>,
}

impl SpatialLayer {
    /// Initializes the spatial layer. The reflection order is valid in
    /// 1..=4.
    pub fn init(settings: &SpatialSettings) -> Result<Arc<Self>, InitFailure> {
        if !(1..=4).contains(&settings.max_reflection_order) {
            return Err(InitFailure::new(
                ResultCode::InvalidParameter,
                format!(
                    "max_reflection_order {} is outside 1..=4",
                    settings.max_reflection_order
                ),
            ));
        }
        log::info!(
            "Spatial layer initialized (reflection order {}).",
            settings.max_reflection_order
        );
        Ok(Arc::new(Self {
            max_reflection_order: settings.max_reflection_order,
            listener_position: RwLock::new([0.0; 3]),
            geometry: RwLock::new(Vec::new()),
            emitters: RwLock::new(HashSet::new()),
        }))
    }

    /// The configured reflection order.
    pub fn max_reflection_order(&self) -> u8 {
        self.max_reflection_order
    }

    /// Moves the listener. Non-finite coordinates are rejected.
    pub fn set_listener_position(&self, position: [f32; 3]) -> bool {
        if position.iter().any(|c| !c.is_finite()) {
            log::warn!("Ignoring non-finite listener position {position:?}.");
            return false;
        }
        *self.listener_position.write().unwrap() = position;
        true
    }

    /// The current listener position.
    pub fn listener_position(&self) -> [f32; 3] {
        *self.listener_position.read().unwrap()
    }

    /// Replaces the occlusion geometry set supplied by the scene importer.
    pub fn set_geometry(&self, descriptors: Vec<GeometryDescriptor>) {
        log::info!("Spatial geometry set: {} descriptor(s).", descriptors.len());
        *self.geometry.write().unwrap() = descriptors;
    }

    /// The number of geometry descriptors currently held.
    pub fn geometry_count(&self) -> usize {
        self.geometry.read().unwrap().len()
    }

    /// Records a game object as an active emitter.
    pub fn register_emitter(&self, id: GameObjectId) {
        self.emitters.write().unwrap().insert(id);
    }

    /// Emitters currently known to the layer.
    pub fn emitter_count(&self) -> u32 {
        self.emitters.read().unwrap().len() as u32
    }

    /// Clears all spatial state.
    pub fn release(&self) {
        self.emitters.write().unwrap().clear();
        self.geometry.write().unwrap().clear();
        *self.listener_position.write().unwrap() = [0.0; 3];
        log::info!("Spatial layer released.");
    }
}
