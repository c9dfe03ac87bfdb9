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

//! Component types and the per-type hook contract
//!
//! Each component type supplies:
//! - a wire layout (`decode_params` / `encode_params` / `pad`), which is
//!   part of the protocol and must match the server byte for byte
//! - an upper bound on the visual nodes it may attach
//! - construction hooks (`build_render_nodes`, `construct`)
//! - delta application (`update_from_data`)
//! - optional event hooks, no-ops by default

use std::any::Any;
use std::fmt;

use glam::Vec2;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::effects::{AssetResolver, EffectSink};
use crate::entity::{EntityHandle, NodeId};
use crate::error::{MirrorError, Result};
use crate::packet::{FieldSink, PacketReader};
use crate::render_buffer::RenderBuffer;
use crate::render_node::{NodeDesc, TextureRef};

/// Closed set of component kinds.
///
/// Declaration order is the wire order: fields of an entity's components
/// are always laid out by ascending type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum ComponentType {
    Transform = 0,
    Health = 1,
    Sprite = 2,
    Ammo = 3,
    Turret = 4,
}

impl ComponentType {
    pub const COUNT: usize = 5;

    pub const ALL: [ComponentType; Self::COUNT] = [
        ComponentType::Transform,
        ComponentType::Health,
        ComponentType::Sprite,
        ComponentType::Ammo,
        ComponentType::Turret,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    /// Decode a wire type id.
    pub fn from_wire(id: u32) -> Result<Self> {
        Self::ALL
            .get(id as usize)
            .copied()
            .ok_or(MirrorError::UnknownComponentType(id))
    }

    pub fn wire_id(self) -> u32 {
        self as u32
    }

    pub fn name(self) -> &'static str {
        match self {
            ComponentType::Transform => "transform",
            ComponentType::Health => "health",
            ComponentType::Sprite => "sprite",
            ComponentType::Ammo => "ammo",
            ComponentType::Turret => "turret",
        }
    }
}

impl fmt::Display for ComponentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Node handles returned by `build_render_nodes` and passed to `construct`
pub type NodeHandles = SmallVec<[NodeId; 4]>;

/// Parameters decoded from one snapshot, indexed by component type.
///
/// Lives only while an entity is being constructed, so hooks can read
/// parameters of sibling components that decoded before them.
#[derive(Default)]
pub struct ScratchParams {
    slots: [Option<Box<dyn Any>>; ComponentType::COUNT],
}

impl ScratchParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, ty: ComponentType, params: Box<dyn Any>) {
        self.slots[ty.index()] = Some(params);
    }

    pub fn get_erased(&self, ty: ComponentType) -> Option<&dyn Any> {
        self.slots[ty.index()].as_deref()
    }

    /// Typed access to a sibling's parameters.
    pub fn get<C: Component>(&self) -> Option<&C::Params> {
        self.get_erased(C::TYPE)?.downcast_ref::<C::Params>()
    }

    /// Types with decoded parameters, in wire order
    pub fn types(&self) -> impl Iterator<Item = ComponentType> + '_ {
        ComponentType::ALL
            .into_iter()
            .filter(move |ty| self.slots[ty.index()].is_some())
    }
}

/// Context for `build_render_nodes` and `construct`
pub struct BuildContext<'a> {
    pub entity: EntityHandle,
    pub buffer: &'a mut RenderBuffer,
    pub scratch: &'a ScratchParams,
    pub assets: &'a mut dyn AssetResolver,
}

impl<'a> BuildContext<'a> {
    /// Parameters of a sibling component decoded from the same snapshot.
    pub fn sibling<C: Component>(&self) -> Option<&C::Params> {
        self.scratch.get::<C>()
    }

    pub fn attach(&mut self, desc: NodeDesc) -> Result<NodeId> {
        self.buffer.attach(desc)
    }

    pub fn resolve(&mut self, name: &str) -> TextureRef {
        self.assets.resolve(name)
    }
}

/// Context for delta application and event hooks
pub struct HookContext<'a> {
    pub entity: EntityHandle,
    pub buffer: &'a mut RenderBuffer,
    pub effects: &'a mut dyn EffectSink,
    pub assets: &'a mut dyn AssetResolver,
    /// Seconds since the previous tick
    pub dt: f32,
}

impl<'a> HookContext<'a> {
    /// World position of the entity's primary hitbox
    pub fn position(&self) -> Vec2 {
        self.buffer
            .anchor(0)
            .map(|anchor| anchor.position)
            .unwrap_or(Vec2::ZERO)
    }
}

/// Event hooks fired by the lifecycle manager or the simulation loop
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Hook {
    Load,
    Spawn,
    Tick,
    Hit(Vec2),
    Die,
    Remove,
    Collision(EntityHandle),
}

impl Hook {
    pub fn name(&self) -> &'static str {
        match self {
            Hook::Load => "on_load",
            Hook::Spawn => "on_spawn",
            Hook::Tick => "on_tick",
            Hook::Hit(_) => "on_hit",
            Hook::Die => "on_die",
            Hook::Remove => "on_remove",
            Hook::Collision(_) => "on_collision",
        }
    }
}

/// Per-type component behavior
///
/// `decode_params`, `pad` and `update_from_data` must consume exactly the
/// bytes `encode_params` writes. Anything else desynchronizes every field
/// that follows in the packet.
pub trait Component: Sized + 'static {
    const TYPE: ComponentType;

    /// Construction-time parameters, decoded from a snapshot
    type Params: Clone + fmt::Debug + PartialEq + 'static;

    /// Live, mutable component value
    type State: fmt::Debug + 'static;

    fn decode_params(reader: &mut PacketReader<'_>) -> Result<Self::Params>;

    fn encode_params<W: FieldSink + ?Sized>(params: &Self::Params, out: &mut W) -> Result<()>;

    /// Skip this type's fields without materializing them.
    fn pad(reader: &mut PacketReader<'_>) -> Result<()>;

    /// Upper bound on visual nodes this component may attach.
    fn max_render_nodes(_params: &Self::Params) -> usize {
        0
    }

    fn build_render_nodes(
        _ctx: &mut BuildContext<'_>,
        _params: &Self::Params,
    ) -> Result<NodeHandles> {
        Ok(NodeHandles::new())
    }

    fn construct(
        ctx: &mut BuildContext<'_>,
        params: &Self::Params,
        nodes: NodeHandles,
    ) -> Result<Self::State>;

    /// Apply a delta to a live component.
    fn update_from_data(
        state: &mut Self::State,
        reader: &mut PacketReader<'_>,
        ctx: &mut HookContext<'_>,
    ) -> Result<()>;

    fn on_load(_state: &mut Self::State, _ctx: &mut HookContext<'_>) -> Result<()> {
        Ok(())
    }

    fn on_spawn(_state: &mut Self::State, _ctx: &mut HookContext<'_>) -> Result<()> {
        Ok(())
    }

    fn on_tick(_state: &mut Self::State, _ctx: &mut HookContext<'_>) -> Result<()> {
        Ok(())
    }

    fn on_hit(_state: &mut Self::State, _ctx: &mut HookContext<'_>, _at: Vec2) -> Result<()> {
        Ok(())
    }

    fn on_die(_state: &mut Self::State, _ctx: &mut HookContext<'_>) -> Result<()> {
        Ok(())
    }

    fn on_remove(_state: &mut Self::State, _ctx: &mut HookContext<'_>) -> Result<()> {
        Ok(())
    }

    fn on_collision(
        _state: &mut Self::State,
        _ctx: &mut HookContext<'_>,
        _other: EntityHandle,
    ) -> Result<()> {
        Ok(())
    }

    /// Route a [`Hook`] to the matching method.
    fn dispatch(state: &mut Self::State, ctx: &mut HookContext<'_>, hook: Hook) -> Result<()> {
        match hook {
            Hook::Load => Self::on_load(state, ctx),
            Hook::Spawn => Self::on_spawn(state, ctx),
            Hook::Tick => Self::on_tick(state, ctx),
            Hook::Hit(at) => Self::on_hit(state, ctx, at),
            Hook::Die => Self::on_die(state, ctx),
            Hook::Remove => Self::on_remove(state, ctx),
            Hook::Collision(other) => Self::on_collision(state, ctx, other),
        }
    }
}
