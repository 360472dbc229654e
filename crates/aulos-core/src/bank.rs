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

//! Sound-bank records and the packed manifest format.
//!
//! Bank files are opaque serialized assets from the caller's point of view:
//! the loader records only the path and a terminal load outcome. The engine
//! itself decodes the bincode-packed [`BankManifest`] to learn which event
//! paths the bank defines.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Terminal state of a single load attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BankLoadState {
    /// The bank has not been loaded.
    Unloaded,
    /// The bank loaded and its events were registered with the engine.
    Loaded,
    /// The load attempt failed; nothing was registered.
    Failed,
}

/// The loader's record of one load attempt.
///
/// Each attempt transitions to exactly one terminal state. Loading the same
/// path twice produces two independent records; no deduplication is
/// performed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bank {
    /// The path as requested by the caller.
    pub path: PathBuf,
    /// The terminal outcome of the attempt.
    pub load_state: BankLoadState,
}

/// The decoded contents of a bank file: the bank's name and the event paths
/// it defines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BankManifest {
    /// The bank's own name, independent of its file path.
    pub name: String,
    /// Event paths resolvable through this bank.
    pub events: Vec<String>,
}

impl BankManifest {
    /// Decodes a manifest from the raw bytes of a bank file.
    pub fn decode(bytes: &[u8]) -> Result<Self, bincode::error::DecodeError> {
        let config = bincode::config::standard();
        let (manifest, _) = bincode::serde::decode_from_slice(bytes, config)?;
        Ok(manifest)
    }

    /// Encodes the manifest into the packed on-disk representation.
    pub fn encode(&self) -> Result<Vec<u8>, bincode::error::EncodeError> {
        let config = bincode::config::standard();
        bincode::serde::encode_to_vec(self, config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn garbage_bytes_do_not_decode() {
        assert!(BankManifest::decode(&[0xff, 0xfe, 0xfd]).is_err());
    }

    #[test]
    fn encoded_manifest_decodes_to_itself() {
        let manifest = BankManifest {
            name: "Init".to_string(),
            events: vec!["Play_Emitter".to_string()],
        };
        let bytes = manifest.encode().expect("encode should succeed");
        let decoded = BankManifest::decode(&bytes).expect("decode should succeed");
        assert_eq!(decoded, manifest);
    }
}
