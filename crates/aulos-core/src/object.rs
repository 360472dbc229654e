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

//! Identifier types for playback sources, listeners, and playing instances.

use std::fmt;

/// The engine's addressable identifier for a playback source or listener.
///
/// Ids issued by the registry are strictly monotonic and unique for the
/// process lifetime; they are never reused, even after the engine-side
/// object has been released.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GameObjectId(pub u64);

impl fmt::Display for GameObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "obj:{}", self.0)
    }
}

/// Identifier of a single playing event instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PlayingId(pub u64);

impl fmt::Display for PlayingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "play:{}", self.0)
    }
}

/// The reserved id of the built-in default listener, registered during
/// bootstrap and marked as the engine's default listener set.
pub const LISTENER_ID: GameObjectId = GameObjectId(1);

/// Ids at or below this value are reserved for built-in listeners.
/// The registry issues caller ids starting at `OBJECT_ID_BASE + 1`.
pub const OBJECT_ID_BASE: u64 = 32;

/// A registered playback source: the issued id plus the display name the
/// caller registered it under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameObjectHandle {
    /// The unique id issued by the registry.
    pub id: GameObjectId,
    /// Human-readable name, used in diagnostics output.
    pub display_name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listener_id_is_inside_reserved_range() {
        assert!(LISTENER_ID.0 <= OBJECT_ID_BASE);
    }

    #[test]
    fn game_object_id_display() {
        assert_eq!(format!("{}", GameObjectId(33)), "obj:33");
    }
}
