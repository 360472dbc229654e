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

//! Opaque references to named audio events.

use std::fmt;

/// A reference to an audio event by path.
///
/// The path is opaque to callers: it is resolved against the event tables of
/// loaded banks at dispatch time, never validated ahead of time.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EventReference {
    path: String,
}

impl EventReference {
    /// Creates a reference to the event with the given path.
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the event path.
    pub fn path(&self) -> &str {
        &self.path
    }
}

impl fmt::Display for EventReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path)
    }
}

impl From<&str> for EventReference {
    fn from(path: &str) -> Self {
        Self::new(path)
    }
}
