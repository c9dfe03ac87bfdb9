//! Health component with an optional overhead bar.
//!
//! The bar is two colour nodes: a dark background and a fill parented to
//! it. The fill's tint runs from red at zero to green at full health and
//! its horizontal scale tracks the same fraction.

use glam::{Vec2, Vec3};

use crate::component::{BuildContext, Component, ComponentType, HookContext, NodeHandles};
use crate::entity::NodeId;
use crate::error::Result;
use crate::packet::{FieldSink, PacketReader};
use crate::render_buffer::RenderBuffer;
use crate::render_node::{NodeDesc, NodeParent, VisualSource};

pub const BAR_SIZE: Vec2 = Vec2::new(1.0, 0.12);
/// Distance above the hitbox origin
pub const BAR_OFFSET: f32 = 0.9;
pub const BAR_Z: f32 = 100.0;

const BACKGROUND_COLOR: Vec3 = Vec3::new(0.15, 0.15, 0.15);

pub const HIT_EFFECT: &str = "hit_sparks";
pub const DEATH_SOUND: &str = "death";

#[derive(Clone, Debug, PartialEq)]
pub struct HealthParams {
    pub current: f32,
    pub max: f32,
    pub show_bar: bool,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HealthBar {
    pub background: NodeId,
    pub fill: NodeId,
}

#[derive(Clone, Debug, PartialEq)]
pub struct HealthState {
    pub current: f32,
    pub max: f32,
    pub bar: Option<HealthBar>,
    /// Fraction the fill last displayed
    shown: Option<f32>,
}

impl HealthState {
    /// `current / max` clamped to [0, 1]; zero when `max` is not positive.
    pub fn fraction(&self) -> f32 {
        if self.max > 0.0 {
            (self.current / self.max).clamp(0.0, 1.0)
        } else {
            0.0
        }
    }

    fn refresh_bar(&mut self, buffer: &mut RenderBuffer) -> Result<()> {
        let Some(bar) = self.bar else {
            return Ok(());
        };
        let fraction = self.fraction();
        if self.shown == Some(fraction) {
            return Ok(());
        }
        let fill = buffer.edit(bar.fill)?;
        fill.tint = fill_tint(fraction);
        fill.transform.scale.x = fraction;
        // Keep the fill left-aligned inside the background.
        fill.transform.offset.x = -(1.0 - fraction) * BAR_SIZE.x * 0.5;
        self.shown = Some(fraction);
        Ok(())
    }
}

/// Red at 0, green at 1.
pub fn fill_tint(fraction: f32) -> Vec3 {
    Vec3::new(1.0, 0.0, 0.0).lerp(Vec3::new(0.0, 1.0, 0.0), fraction)
}

pub struct Health;

impl Component for Health {
    const TYPE: ComponentType = ComponentType::Health;
    type Params = HealthParams;
    type State = HealthState;

    fn decode_params(reader: &mut PacketReader<'_>) -> Result<HealthParams> {
        Ok(HealthParams {
            current: reader.read_number()? as f32,
            max: reader.read_number()? as f32,
            show_bar: reader.read_bool()?,
        })
    }

    fn encode_params<W: FieldSink + ?Sized>(params: &HealthParams, out: &mut W) -> Result<()> {
        out.write_number(f64::from(params.current))?;
        out.write_number(f64::from(params.max))?;
        out.write_bool(params.show_bar)
    }

    fn pad(reader: &mut PacketReader<'_>) -> Result<()> {
        reader.pad_numbers(2)?;
        reader.pad_bool()
    }

    fn max_render_nodes(params: &HealthParams) -> usize {
        if params.show_bar {
            2
        } else {
            0
        }
    }

    fn build_render_nodes(
        ctx: &mut BuildContext<'_>,
        params: &HealthParams,
    ) -> Result<NodeHandles> {
        let mut nodes = NodeHandles::new();
        if !params.show_bar {
            return Ok(nodes);
        }
        let background = ctx.attach(
            NodeDesc::visual(VisualSource::Color(BACKGROUND_COLOR), BAR_SIZE)
                .offset(Vec2::new(0.0, BAR_OFFSET))
                .inherit_rotation(false)
                .z_index(BAR_Z)
                .tag("health_bar"),
        )?;
        let fill = ctx.attach(
            NodeDesc::visual(VisualSource::Color(Vec3::ONE), BAR_SIZE)
                .parent(NodeParent::Node(background))
                .z_index(BAR_Z + 1.0)
                .tag("health_fill"),
        )?;
        nodes.push(background);
        nodes.push(fill);
        Ok(nodes)
    }

    fn construct(
        ctx: &mut BuildContext<'_>,
        params: &HealthParams,
        nodes: NodeHandles,
    ) -> Result<HealthState> {
        let bar = match nodes.as_slice() {
            [background, fill] => Some(HealthBar {
                background: *background,
                fill: *fill,
            }),
            _ => None,
        };
        let mut state = HealthState {
            current: params.current,
            max: params.max,
            bar,
            shown: None,
        };
        state.refresh_bar(ctx.buffer)?;
        Ok(state)
    }

    fn update_from_data(
        state: &mut HealthState,
        reader: &mut PacketReader<'_>,
        _ctx: &mut HookContext<'_>,
    ) -> Result<()> {
        state.current = reader.read_number()? as f32;
        state.max = reader.read_number()? as f32;
        // The bar is fixed at construction; a later flag change has no effect.
        reader.pad_bool()
    }

    fn on_remove(state: &mut HealthState, ctx: &mut HookContext<'_>) -> Result<()> {
        if let Some(bar) = state.bar.take() {
            // The fill is a child of the background.
            ctx.buffer.detach(bar.background)?;
        }
        Ok(())
    }

    fn on_tick(state: &mut HealthState, ctx: &mut HookContext<'_>) -> Result<()> {
        state.refresh_bar(ctx.buffer)
    }

    fn on_hit(_state: &mut HealthState, ctx: &mut HookContext<'_>, at: Vec2) -> Result<()> {
        ctx.effects.spawn_particles(ctx.entity, HIT_EFFECT, at);
        Ok(())
    }

    fn on_die(_state: &mut HealthState, ctx: &mut HookContext<'_>) -> Result<()> {
        let at = ctx.position();
        ctx.effects.play_sound(ctx.entity, DEATH_SOUND, at);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(current: f32, max: f32) -> HealthState {
        HealthState {
            current,
            max,
            bar: None,
            shown: None,
        }
    }

    #[test]
    fn test_fraction_clamps() {
        assert_eq!(state(40.0, 100.0).fraction(), 0.4);
        assert_eq!(state(150.0, 100.0).fraction(), 1.0);
        assert_eq!(state(-5.0, 100.0).fraction(), 0.0);
        assert_eq!(state(10.0, 0.0).fraction(), 0.0);
    }

    #[test]
    fn test_fill_tint_endpoints() {
        assert_eq!(fill_tint(0.0), Vec3::new(1.0, 0.0, 0.0));
        assert_eq!(fill_tint(1.0), Vec3::new(0.0, 1.0, 0.0));
        let mid = fill_tint(0.4);
        assert!((mid - Vec3::new(0.6, 0.4, 0.0)).length() < 1e-6);
    }

    #[test]
    fn test_bar_only_when_shown() {
        let hidden = HealthParams {
            current: 1.0,
            max: 1.0,
            show_bar: false,
        };
        assert_eq!(Health::max_render_nodes(&hidden), 0);
        let shown = HealthParams {
            show_bar: true,
            ..hidden
        };
        assert_eq!(Health::max_render_nodes(&shown), 2);
    }
}
