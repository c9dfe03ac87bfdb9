//! Sprite component: one textured quad on the primary hitbox.

use glam::{Vec2, Vec3};

use crate::component::{BuildContext, Component, ComponentType, HookContext, NodeHandles};
use crate::entity::NodeId;
use crate::error::{MirrorError, Result};
use crate::packet::{FieldSink, PacketReader};
use crate::render_node::{NodeDesc, VisualSource};

#[derive(Clone, Debug, PartialEq)]
pub struct SpriteParams {
    pub texture: String,
    pub width: f32,
    pub height: f32,
    pub z: f32,
    pub tint: Vec3,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SpriteState {
    pub node: Option<NodeId>,
    pub params: SpriteParams,
}

pub struct Sprite;

impl Component for Sprite {
    const TYPE: ComponentType = ComponentType::Sprite;
    type Params = SpriteParams;
    type State = SpriteState;

    fn decode_params(reader: &mut PacketReader<'_>) -> Result<SpriteParams> {
        let texture = reader.read_string()?;
        let width = reader.read_number()? as f32;
        let height = reader.read_number()? as f32;
        let z = reader.read_number()?;
        if !z.is_finite() {
            return Err(MirrorError::InvalidNumber {
                what: "sprite z",
                value: z,
            });
        }
        Ok(SpriteParams {
            texture,
            width,
            height,
            z: z as f32,
            tint: Vec3::new(
                reader.read_number()? as f32,
                reader.read_number()? as f32,
                reader.read_number()? as f32,
            ),
        })
    }

    fn encode_params<W: FieldSink + ?Sized>(params: &SpriteParams, out: &mut W) -> Result<()> {
        out.write_string(&params.texture)?;
        out.write_number(f64::from(params.width))?;
        out.write_number(f64::from(params.height))?;
        out.write_number(f64::from(params.z))?;
        for channel in params.tint.to_array() {
            out.write_number(f64::from(channel))?;
        }
        Ok(())
    }

    fn pad(reader: &mut PacketReader<'_>) -> Result<()> {
        reader.pad_string()?;
        reader.pad_numbers(6)
    }

    fn max_render_nodes(_params: &SpriteParams) -> usize {
        1
    }

    fn build_render_nodes(
        ctx: &mut BuildContext<'_>,
        params: &SpriteParams,
    ) -> Result<NodeHandles> {
        let texture = ctx.resolve(&params.texture);
        let node = ctx.attach(
            NodeDesc::visual(
                VisualSource::Texture(texture),
                Vec2::new(params.width, params.height),
            )
            .z_index(params.z)
            .tint(params.tint)
            .tag("sprite"),
        )?;
        Ok(NodeHandles::from_slice(&[node]))
    }

    fn construct(
        _ctx: &mut BuildContext<'_>,
        params: &SpriteParams,
        nodes: NodeHandles,
    ) -> Result<SpriteState> {
        Ok(SpriteState {
            node: nodes.first().copied(),
            params: params.clone(),
        })
    }

    fn on_remove(state: &mut SpriteState, ctx: &mut HookContext<'_>) -> Result<()> {
        if let Some(node) = state.node.take() {
            ctx.buffer.detach(node)?;
        }
        Ok(())
    }

    /// Only fields that actually changed touch the buffer.
    fn update_from_data(
        state: &mut SpriteState,
        reader: &mut PacketReader<'_>,
        ctx: &mut HookContext<'_>,
    ) -> Result<()> {
        let next = Self::decode_params(reader)?;
        let Some(node) = state.node else {
            state.params = next;
            return Ok(());
        };
        let current = &state.params;

        if next.texture != current.texture {
            let texture = ctx.assets.resolve(&next.texture);
            ctx.buffer.set_visual(node, VisualSource::Texture(texture))?;
        }
        if next.width != current.width || next.height != current.height {
            ctx.buffer
                .set_size(node, Vec2::new(next.width, next.height))?;
        }
        if next.z != current.z {
            ctx.buffer.set_z_index(node, next.z)?;
        }
        if next.tint != current.tint {
            ctx.buffer.edit(node)?.tint = next.tint;
        }
        state.params = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::{Packet, PacketSizer};

    #[test]
    fn test_pad_matches_encoded_width() {
        let params = SpriteParams {
            texture: "tank_body".into(),
            width: 2.0,
            height: 1.5,
            z: 3.0,
            tint: Vec3::new(1.0, 0.5, 0.25),
        };
        let mut sizer = PacketSizer::new();
        Sprite::encode_params(&params, &mut sizer).unwrap();
        let mut packet = Packet::with_len(sizer.len());
        Sprite::encode_params(&params, &mut packet).unwrap();
        let bytes = packet.into_bytes();

        let mut reader = PacketReader::new(&bytes);
        Sprite::pad(&mut reader).unwrap();
        assert!(reader.is_exhausted());

        let mut reader = PacketReader::new(&bytes);
        assert_eq!(Sprite::decode_params(&mut reader).unwrap(), params);
    }

    #[test]
    fn test_nan_z_rejected() {
        let params = SpriteParams {
            texture: "crate".into(),
            width: 1.0,
            height: 1.0,
            z: f32::NAN,
            tint: Vec3::ONE,
        };
        let mut sizer = PacketSizer::new();
        Sprite::encode_params(&params, &mut sizer).unwrap();
        let mut packet = Packet::with_len(sizer.len());
        Sprite::encode_params(&params, &mut packet).unwrap();
        let bytes = packet.into_bytes();

        let mut reader = PacketReader::new(&bytes);
        assert!(matches!(
            Sprite::decode_params(&mut reader),
            Err(MirrorError::InvalidNumber { what: "sprite z", .. })
        ));
    }
}
