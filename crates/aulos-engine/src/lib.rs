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

//! # Aulos Engine
//!
//! Concrete implementations of the audio runtime's subsystems and the
//! bootstrap sequencer that brings them online in dependency order:
//! memory accounting, streaming I/O, the job worker pool, the engine core,
//! the music and spatial layers, and the diagnostics channel.
//!
//! The only entry point most callers need is [`bootstrap`], which returns an
//! [`EngineHandle`] owning the whole subsystem stack.

pub mod banks;
pub mod bootstrap;
pub mod diagnostics;
pub mod engine;
pub mod events;
pub mod jobs;
pub mod memory;
pub mod monitor;
pub mod music;
pub mod registry;
pub mod spatial;
pub mod streaming;

pub use bootstrap::{bootstrap, EngineHandle};
