// Copyright 2024 Saptak Santra
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

//! Entity handles and render node identifiers.

use std::fmt;

use serde::{Deserialize, Serialize};
use slotmap::new_key_type;

/// Server-assigned identifier of one replicated game object.
///
/// Handles travel on the wire as numbers, so they are opaque to this crate
/// and never allocated locally.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityHandle(pub u32);

impl EntityHandle {
    pub fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Display for EntityHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for EntityHandle {
    fn from(raw: u32) -> Self {
        Self(raw)
    }
}

new_key_type! {
    /// Render node identifier, generational so stale handles are detected.
    pub struct NodeId;
}
