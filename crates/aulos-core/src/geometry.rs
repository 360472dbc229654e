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

//! The interface boundary with the external scene importer.
//!
//! The importer hands the spatial layer a list of static geometry
//! descriptors for potential future occlusion processing. It performs no
//! audio work itself, and this crate performs no geometry processing; the
//! descriptors are held as supplied.

/// One piece of static occlusion geometry.
#[derive(Debug, Clone, PartialEq)]
pub struct GeometryDescriptor {
    /// Triangle mesh vertices.
    pub vertices: Vec<[f32; 3]>,
    /// Indices into `vertices`, three per triangle.
    pub indices: Vec<u32>,
}

impl GeometryDescriptor {
    /// The number of triangles described.
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}
