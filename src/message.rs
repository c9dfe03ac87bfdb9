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

//! Message framing above the field codec
//!
//! ```text
//! packet   := message_count message*
//! message  := kind entity body
//! snapshot := component_count type_id* fields(type)*   (kind 0)
//! delta    := fields(type)*                            (kind 1)
//! remove   := died:bool                                (kind 2)
//! ```
//!
//! Fields always follow ascending component type order. The builder is the
//! writing side, used by servers, tools and tests.

use std::fmt;

use crate::component::{Component, ComponentType};
use crate::entity::EntityHandle;
use crate::error::{MirrorError, Result};
use crate::packet::{FieldSink, Packet, PacketReader, PacketSizer};

/// Message discriminant on the wire
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MessageKind {
    Snapshot = 0,
    Delta = 1,
    Remove = 2,
}

impl MessageKind {
    pub fn from_wire(raw: usize) -> Result<Self> {
        match raw {
            0 => Ok(MessageKind::Snapshot),
            1 => Ok(MessageKind::Delta),
            2 => Ok(MessageKind::Remove),
            other => Err(MirrorError::UnknownMessage(
                u32::try_from(other).unwrap_or(u32::MAX),
            )),
        }
    }

    pub fn wire_id(self) -> u32 {
        self as u32
    }
}

/// Read an entity handle, which must fit the handle width.
pub fn read_handle(reader: &mut PacketReader<'_>) -> Result<EntityHandle> {
    reader.read_u32("entity handle").map(EntityHandle)
}

/// Read a component type id.
pub fn read_type_id(reader: &mut PacketReader<'_>) -> Result<ComponentType> {
    let raw = reader.read_count("component type")?;
    ComponentType::from_wire(u32::try_from(raw).unwrap_or(u32::MAX))
}

type EncodeFn = Box<dyn Fn(&mut dyn FieldSink) -> Result<()>>;

/// One component's encoded fields, pending a write
pub struct ComponentData {
    ty: ComponentType,
    encode: EncodeFn,
}

impl ComponentData {
    /// Fields of `C` built from its parameters.
    pub fn new<C: Component>(params: C::Params) -> Self {
        Self {
            ty: C::TYPE,
            encode: Box::new(move |out: &mut dyn FieldSink| C::encode_params(&params, out)),
        }
    }

    /// Arbitrary fields tagged as `ty`, for malformed-input tests and tools.
    pub fn raw(
        ty: ComponentType,
        encode: impl Fn(&mut dyn FieldSink) -> Result<()> + 'static,
    ) -> Self {
        Self {
            ty,
            encode: Box::new(encode),
        }
    }

    pub fn component_type(&self) -> ComponentType {
        self.ty
    }
}

impl fmt::Debug for ComponentData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentData")
            .field("ty", &self.ty)
            .finish_non_exhaustive()
    }
}

#[derive(Debug)]
enum Message {
    Snapshot {
        entity: EntityHandle,
        components: Vec<ComponentData>,
    },
    Delta {
        entity: EntityHandle,
        components: Vec<ComponentData>,
    },
    Remove {
        entity: EntityHandle,
        died: bool,
    },
}

/// Writes a packet of messages.
///
/// Components are sorted into wire order on insertion, so callers may list
/// them in any order.
#[derive(Debug, Default)]
pub struct PacketBuilder {
    messages: Vec<Message>,
}

impl PacketBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(mut self, entity: EntityHandle, mut components: Vec<ComponentData>) -> Self {
        components.sort_by_key(|c| c.ty);
        self.messages.push(Message::Snapshot { entity, components });
        self
    }

    /// Delta fields for every declared component, active here or not.
    pub fn delta(mut self, entity: EntityHandle, mut components: Vec<ComponentData>) -> Self {
        components.sort_by_key(|c| c.ty);
        self.messages.push(Message::Delta { entity, components });
        self
    }

    pub fn remove(mut self, entity: EntityHandle, died: bool) -> Self {
        self.messages.push(Message::Remove { entity, died });
        self
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    fn write(&self, out: &mut dyn FieldSink) -> Result<()> {
        out.write_number(self.messages.len() as f64)?;
        for message in &self.messages {
            match message {
                Message::Snapshot { entity, components } => {
                    out.write_number(f64::from(MessageKind::Snapshot.wire_id()))?;
                    out.write_number(f64::from(entity.raw()))?;
                    out.write_number(components.len() as f64)?;
                    for component in components {
                        out.write_number(f64::from(component.ty.wire_id()))?;
                    }
                    for component in components {
                        (component.encode)(&mut *out)?;
                    }
                }
                Message::Delta { entity, components } => {
                    out.write_number(f64::from(MessageKind::Delta.wire_id()))?;
                    out.write_number(f64::from(entity.raw()))?;
                    for component in components {
                        (component.encode)(&mut *out)?;
                    }
                }
                Message::Remove { entity, died } => {
                    out.write_number(f64::from(MessageKind::Remove.wire_id()))?;
                    out.write_number(f64::from(entity.raw()))?;
                    out.write_bool(*died)?;
                }
            }
        }
        Ok(())
    }

    /// Measure, then write into an exactly-sized packet.
    pub fn build(&self) -> Result<Packet> {
        let mut sizer = PacketSizer::new();
        self.write(&mut sizer)?;
        let mut packet = Packet::with_len(sizer.len());
        self.write(&mut packet)?;
        Ok(packet)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(self.build()?.into_bytes())
    }
}
