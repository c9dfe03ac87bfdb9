//! Turret component.
//!
//! Node layout:
//! - a pivot attach point rotated by the turret heading
//! - the barrel, parented to the pivot
//! - one pip per round of ammo capacity, capped at [`MAX_PIPS`]
//!
//! Pip count comes from the sibling ammo parameters decoded earlier in the
//! same snapshot. Ammo decodes first because it precedes the turret in wire
//! order.

use glam::{Vec2, Vec3};

use crate::builtin::ammo::{Ammo, PIP_TAG};
use crate::component::{BuildContext, Component, ComponentType, HookContext, NodeHandles};
use crate::entity::{EntityHandle, NodeId};
use crate::error::Result;
use crate::packet::{FieldSink, PacketReader};
use crate::render_node::{NodeDesc, NodeParent, VisualSource};

pub const MAX_PIPS: usize = 8;
pub const BARREL_SIZE: Vec2 = Vec2::new(0.8, 0.2);
pub const BARREL_Z: f32 = 5.0;
pub const PIP_SIZE: Vec2 = Vec2::new(0.08, 0.08);
const PIP_SPACING: f32 = 0.1;
const PIP_ROW_Y: f32 = -0.7;
const PIP_COLOR: Vec3 = Vec3::new(1.0, 0.85, 0.2);

/// Barrel shake applied on collision, in world units
pub const COLLISION_SHAKE: f32 = 0.15;
/// Shake lost per second
pub const SHAKE_DECAY: f32 = 0.6;

#[derive(Clone, Debug, PartialEq)]
pub struct TurretParams {
    pub rotation: f32,
    pub barrel_texture: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TurretState {
    pub rotation: f32,
    pub barrel_texture: String,
    pub pivot: Option<NodeId>,
    pub barrel: Option<NodeId>,
    pub pips: Vec<NodeId>,
    pub shake: f32,
}

pub struct Turret;

impl Component for Turret {
    const TYPE: ComponentType = ComponentType::Turret;
    type Params = TurretParams;
    type State = TurretState;

    fn decode_params(reader: &mut PacketReader<'_>) -> Result<TurretParams> {
        Ok(TurretParams {
            rotation: reader.read_number()? as f32,
            barrel_texture: reader.read_string()?,
        })
    }

    fn encode_params<W: FieldSink + ?Sized>(params: &TurretParams, out: &mut W) -> Result<()> {
        out.write_number(f64::from(params.rotation))?;
        out.write_string(&params.barrel_texture)
    }

    fn pad(reader: &mut PacketReader<'_>) -> Result<()> {
        reader.pad_numbers(1)?;
        reader.pad_string()
    }

    /// Barrel plus the most pips any turret shows. The pivot is an attach
    /// point and takes no slot.
    fn max_render_nodes(_params: &TurretParams) -> usize {
        1 + MAX_PIPS
    }

    fn build_render_nodes(
        ctx: &mut BuildContext<'_>,
        params: &TurretParams,
    ) -> Result<NodeHandles> {
        let pip_count = ctx
            .sibling::<Ammo>()
            .map_or(0, |ammo| (ammo.capacity as usize).min(MAX_PIPS));

        let pivot = ctx.attach(
            NodeDesc::attach_point()
                .rotation(params.rotation)
                .tag("turret_pivot"),
        )?;
        let texture = ctx.resolve(&params.barrel_texture);
        let barrel = ctx.attach(
            NodeDesc::visual(VisualSource::Texture(texture), BARREL_SIZE)
                .parent(NodeParent::Node(pivot))
                .offset(Vec2::new(BARREL_SIZE.x * 0.5, 0.0))
                .z_index(BARREL_Z)
                .tag("turret_barrel"),
        )?;

        let mut nodes = NodeHandles::new();
        nodes.push(pivot);
        nodes.push(barrel);

        let row_start = -(pip_count.saturating_sub(1) as f32) * PIP_SPACING * 0.5;
        for i in 0..pip_count {
            let pip = ctx.attach(
                NodeDesc::visual(VisualSource::Color(PIP_COLOR), PIP_SIZE)
                    .offset(Vec2::new(row_start + i as f32 * PIP_SPACING, PIP_ROW_Y))
                    .inherit_rotation(false)
                    .z_index(BARREL_Z + 1.0)
                    .tag(PIP_TAG),
            )?;
            nodes.push(pip);
        }
        Ok(nodes)
    }

    fn construct(
        _ctx: &mut BuildContext<'_>,
        params: &TurretParams,
        nodes: NodeHandles,
    ) -> Result<TurretState> {
        Ok(TurretState {
            rotation: params.rotation,
            barrel_texture: params.barrel_texture.clone(),
            pivot: nodes.first().copied(),
            barrel: nodes.get(1).copied(),
            pips: nodes.iter().skip(2).copied().collect(),
            shake: 0.0,
        })
    }

    fn update_from_data(
        state: &mut TurretState,
        reader: &mut PacketReader<'_>,
        ctx: &mut HookContext<'_>,
    ) -> Result<()> {
        let next = Self::decode_params(reader)?;
        if next.rotation != state.rotation {
            if let Some(pivot) = state.pivot {
                ctx.buffer.edit(pivot)?.transform.rotation = next.rotation;
            }
            state.rotation = next.rotation;
        }
        if next.barrel_texture != state.barrel_texture {
            if let Some(barrel) = state.barrel {
                let texture = ctx.assets.resolve(&next.barrel_texture);
                ctx.buffer.set_visual(barrel, VisualSource::Texture(texture))?;
            }
            state.barrel_texture = next.barrel_texture;
        }
        Ok(())
    }

    fn on_remove(state: &mut TurretState, ctx: &mut HookContext<'_>) -> Result<()> {
        // Detaching the pivot takes the barrel with it.
        if let Some(pivot) = state.pivot.take() {
            ctx.buffer.detach(pivot)?;
        }
        state.barrel = None;
        for pip in state.pips.drain(..) {
            ctx.buffer.detach(pip)?;
        }
        Ok(())
    }

    fn on_tick(state: &mut TurretState, ctx: &mut HookContext<'_>) -> Result<()> {
        if state.shake <= 0.0 {
            return Ok(());
        }
        state.shake = (state.shake - SHAKE_DECAY * ctx.dt).max(0.0);
        if let Some(barrel) = state.barrel {
            ctx.buffer.edit(barrel)?.shake = state.shake;
        }
        Ok(())
    }

    fn on_collision(
        state: &mut TurretState,
        ctx: &mut HookContext<'_>,
        other: EntityHandle,
    ) -> Result<()> {
        tracing::trace!(entity = %ctx.entity, %other, "turret collision");
        state.shake = COLLISION_SHAKE;
        if let Some(barrel) = state.barrel {
            ctx.buffer.edit(barrel)?.shake = state.shake;
        }
        Ok(())
    }
}
