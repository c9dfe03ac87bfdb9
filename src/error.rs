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

//! Error types

use thiserror::Error;

use crate::component::ComponentType;
use crate::entity::{EntityHandle, NodeId};

/// Broad classification of a [`MirrorError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Cursor misalignment or overrun. The rest of the packet is garbage.
    ProtocolDesync,

    /// A declared contract was broken (missing component, bound exceeded,
    /// tag lookup mismatch). Meant to be caught in testing.
    ContractViolation,

    /// Entity or optional component no longer present. Callers may recover.
    Absent,

    /// Configuration could not be loaded.
    Config,
}

/// Runtime error type
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MirrorError {
    /// Write past the declared packet length
    #[error("packet overrun: writing {requested} bytes at offset {offset} exceeds length {len}")]
    BufferOverrun {
        offset: usize,
        requested: usize,
        len: usize,
    },

    /// Read past the end of the received bytes
    #[error("read overrun: reading {requested} bytes at offset {offset} exceeds length {len}")]
    ReadOverrun {
        offset: usize,
        requested: usize,
        len: usize,
    },

    /// Field access at a cursor that is not 4-byte aligned
    #[error("misaligned field access at offset {offset}")]
    Misaligned { offset: usize },

    /// String payload was not valid UTF-8
    #[error("invalid utf-8 string at offset {offset}")]
    InvalidString { offset: usize },

    /// Number field did not hold the expected kind of value
    #[error("invalid {what}: {value}")]
    InvalidNumber { what: &'static str, value: f64 },

    /// Wire type id outside the closed component set
    #[error("unknown component type id {0}")]
    UnknownComponentType(u32),

    /// Component type appears on the wire but was never registered
    #[error("component type {0:?} is not registered")]
    UnregisteredComponent(ComponentType),

    /// Component type registered twice
    #[error("component type {0:?} registered twice")]
    DuplicateRegistration(ComponentType),

    /// `get` on an entity that does not carry the component
    #[error("entity {entity} has no {component:?} component")]
    MissingComponent {
        entity: EntityHandle,
        component: ComponentType,
    },

    /// Second instance of the same type on one entity
    #[error("entity {entity} already has a {component:?} component")]
    DuplicateComponent {
        entity: EntityHandle,
        component: ComponentType,
    },

    /// More visual nodes attached than the components declared
    #[error("entity {entity} render buffer full: capacity {capacity} visual nodes")]
    CapacityExceeded {
        entity: EntityHandle,
        capacity: usize,
    },

    /// Global vertex pool cannot fit another entity buffer
    #[error("vertex pool exhausted: requested {requested} nodes, pool capacity {capacity}")]
    PoolExhausted { requested: usize, capacity: usize },

    /// Render node handle is stale or belongs to another entity
    #[error("render node {0:?} not found")]
    NodeNotFound(NodeId),

    /// Paint operation on an attach point
    #[error("render node {0:?} is an attach point")]
    NotVisual(NodeId),

    /// `find_by_tag` found nothing
    #[error("no render node tagged {tag:?} on entity {entity}")]
    TagNotFound { entity: EntityHandle, tag: String },

    /// `find_all_by_tag` found a different number of nodes than expected
    #[error("expected {expected} render nodes tagged {tag:?} on entity {entity}, found {found}")]
    TagCountMismatch {
        entity: EntityHandle,
        tag: String,
        expected: usize,
        found: usize,
    },

    /// Parent node missing, or anchor index out of range
    #[error("invalid render node parent: {0}")]
    InvalidParent(String),

    /// Entity handle is not live
    #[error("entity {0} not found")]
    EntityNotFound(EntityHandle),

    /// Snapshot for an entity that is already live (strict mode)
    #[error("entity {0} is already live")]
    EntityAlreadyLive(EntityHandle),

    /// Live entity limit reached
    #[error("entity limit reached: {0}")]
    EntityLimit(usize),

    /// Message kind outside the known set
    #[error("unknown message kind {0}")]
    UnknownMessage(u32),

    /// Configuration could not be parsed or read
    #[error("config error: {0}")]
    Config(String),
}

impl MirrorError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            MirrorError::BufferOverrun { .. }
            | MirrorError::ReadOverrun { .. }
            | MirrorError::Misaligned { .. }
            | MirrorError::InvalidString { .. }
            | MirrorError::InvalidNumber { .. }
            | MirrorError::UnknownComponentType(_)
            | MirrorError::UnknownMessage(_) => ErrorKind::ProtocolDesync,
            MirrorError::EntityNotFound(_) => ErrorKind::Absent,
            MirrorError::Config(_) => ErrorKind::Config,
            _ => ErrorKind::ContractViolation,
        }
    }

    /// Whether this error must abort processing of the current packet.
    pub fn is_fatal(&self) -> bool {
        !matches!(self.kind(), ErrorKind::Absent)
    }
}

impl From<serde_json::Error> for MirrorError {
    fn from(err: serde_json::Error) -> Self {
        MirrorError::Config(err.to_string())
    }
}

impl From<std::io::Error> for MirrorError {
    fn from(err: std::io::Error) -> Self {
        MirrorError::Config(err.to_string())
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, MirrorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        assert_eq!(
            MirrorError::Misaligned { offset: 3 }.kind(),
            ErrorKind::ProtocolDesync
        );
        assert_eq!(
            MirrorError::MissingComponent {
                entity: EntityHandle(1),
                component: ComponentType::Health,
            }
            .kind(),
            ErrorKind::ContractViolation
        );
        assert!(!MirrorError::EntityNotFound(EntityHandle(4)).is_fatal());
        assert!(MirrorError::UnknownMessage(9).is_fatal());
    }

    #[test]
    fn test_error_display() {
        let err = MirrorError::CapacityExceeded {
            entity: EntityHandle(7),
            capacity: 2,
        };
        assert_eq!(
            err.to_string(),
            "entity 7 render buffer full: capacity 2 visual nodes"
        );
    }
}
