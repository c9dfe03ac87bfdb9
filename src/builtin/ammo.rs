//! Ammo component: a round count with no nodes of its own.
//!
//! Pips showing the count are built by the turret, which may or may not be
//! present, so the tick finds them by tag rather than holding handles.

use crate::component::{BuildContext, Component, ComponentType, HookContext, NodeHandles};
use crate::error::Result;
use crate::packet::{FieldSink, PacketReader};

pub const PIP_TAG: &str = "ammo_pip";
/// Opacity of a pip above the current count
pub const EMPTY_PIP_OPACITY: f32 = 0.25;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AmmoParams {
    pub count: u32,
    pub capacity: u32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AmmoState {
    pub count: u32,
    pub capacity: u32,
}

impl From<&AmmoParams> for AmmoState {
    fn from(params: &AmmoParams) -> Self {
        Self {
            count: params.count.min(params.capacity),
            capacity: params.capacity,
        }
    }
}

pub struct Ammo;

fn read_fields(reader: &mut PacketReader<'_>) -> Result<AmmoParams> {
    Ok(AmmoParams {
        count: reader.read_u32("ammo count")?,
        capacity: reader.read_u32("ammo capacity")?,
    })
}

impl Component for Ammo {
    const TYPE: ComponentType = ComponentType::Ammo;
    type Params = AmmoParams;
    type State = AmmoState;

    fn decode_params(reader: &mut PacketReader<'_>) -> Result<AmmoParams> {
        read_fields(reader)
    }

    fn encode_params<W: FieldSink + ?Sized>(params: &AmmoParams, out: &mut W) -> Result<()> {
        out.write_number(f64::from(params.count))?;
        out.write_number(f64::from(params.capacity))
    }

    fn pad(reader: &mut PacketReader<'_>) -> Result<()> {
        reader.pad_numbers(2)
    }

    fn construct(
        _ctx: &mut BuildContext<'_>,
        params: &AmmoParams,
        _nodes: NodeHandles,
    ) -> Result<AmmoState> {
        Ok(AmmoState::from(params))
    }

    fn update_from_data(
        state: &mut AmmoState,
        reader: &mut PacketReader<'_>,
        _ctx: &mut HookContext<'_>,
    ) -> Result<()> {
        *state = AmmoState::from(&read_fields(reader)?);
        Ok(())
    }

    fn on_tick(state: &mut AmmoState, ctx: &mut HookContext<'_>) -> Result<()> {
        let pips = ctx.buffer.find_all_by_tag(PIP_TAG, None)?;
        for (i, pip) in pips.into_iter().enumerate() {
            let opacity = if (i as u32) < state.count {
                1.0
            } else {
                EMPTY_PIP_OPACITY
            };
            if ctx.buffer.node(pip)?.attributes().opacity != opacity {
                ctx.buffer.edit(pip)?.opacity = opacity;
            }
        }
        Ok(())
    }
}
