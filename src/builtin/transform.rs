//! Transform component: the entity's position and heading.
//!
//! Drives hitbox anchor 0, so every node rooted there follows it.

use glam::Vec2;

use crate::component::{BuildContext, Component, ComponentType, HookContext, NodeHandles};
use crate::error::Result;
use crate::packet::{FieldSink, PacketReader};

/// Transform wire parameters
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub struct TransformParams {
    pub x: f32,
    pub y: f32,
    pub rotation: f32,
}

/// Live transform
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub struct TransformState {
    pub position: Vec2,
    pub rotation: f32,
}

pub struct Transform;

fn read_fields(reader: &mut PacketReader<'_>) -> Result<TransformParams> {
    Ok(TransformParams {
        x: reader.read_number()? as f32,
        y: reader.read_number()? as f32,
        rotation: reader.read_number()? as f32,
    })
}

impl Component for Transform {
    const TYPE: ComponentType = ComponentType::Transform;
    type Params = TransformParams;
    type State = TransformState;

    fn decode_params(reader: &mut PacketReader<'_>) -> Result<TransformParams> {
        read_fields(reader)
    }

    fn encode_params<W: FieldSink + ?Sized>(params: &TransformParams, out: &mut W) -> Result<()> {
        out.write_number(f64::from(params.x))?;
        out.write_number(f64::from(params.y))?;
        out.write_number(f64::from(params.rotation))
    }

    fn pad(reader: &mut PacketReader<'_>) -> Result<()> {
        reader.pad_numbers(3)
    }

    fn construct(
        ctx: &mut BuildContext<'_>,
        params: &TransformParams,
        _nodes: NodeHandles,
    ) -> Result<TransformState> {
        let state = TransformState {
            position: Vec2::new(params.x, params.y),
            rotation: params.rotation,
        };
        ctx.buffer.set_anchor(0, state.position, state.rotation)?;
        Ok(state)
    }

    fn update_from_data(
        state: &mut TransformState,
        reader: &mut PacketReader<'_>,
        ctx: &mut HookContext<'_>,
    ) -> Result<()> {
        let params = read_fields(reader)?;
        state.position = Vec2::new(params.x, params.y);
        state.rotation = params.rotation;
        // No-op for the buffer when the anchor did not actually move.
        ctx.buffer
            .set_anchor(0, state.position, state.rotation)
    }
}
