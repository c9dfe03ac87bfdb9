use std::collections::VecDeque;
use std::fmt::Write as _;

use crate::effects::{AssetResolver, EffectSink};
use crate::entity::EntityHandle;
use crate::error::Result;
use crate::lifecycle::EntityManager;
use crate::render_node::{NodeKind, NodeParent, VisualSource};
use crate::render_pass::FrameStats;

/// Entity inspector for debugging
pub struct MirrorInspector;

impl MirrorInspector {
    /// Get live entity count
    pub fn entity_count<E: EffectSink, A: AssetResolver>(manager: &EntityManager<E, A>) -> usize {
        manager.len()
    }

    /// Summarize one entity's components and render buffer.
    pub fn entity_info<E: EffectSink, A: AssetResolver>(
        manager: &EntityManager<E, A>,
        entity: EntityHandle,
    ) -> Result<EntityInfo> {
        let record = manager.record(entity)?;
        let buffer = manager.buffer(entity)?;
        let components = record
            .declared
            .iter()
            .filter_map(|ty| manager.registry().erased(ty).ok()?.describe(entity))
            .collect();

        Ok(EntityInfo {
            entity,
            components,
            declared: record.declared.len(),
            node_count: buffer.tree().len(),
            visual_count: buffer.visual_count(),
            capacity: buffer.capacity(),
            dirty: buffer.is_dirty(),
        })
    }

    /// Render tree of one entity in paint order, one node per line.
    pub fn render_tree<E: EffectSink, A: AssetResolver>(
        manager: &EntityManager<E, A>,
        entity: EntityHandle,
    ) -> Result<String> {
        let buffer = manager.buffer(entity)?;
        let mut out = String::new();
        for (id, node) in buffer.tree().iter_z() {
            let kind = match node.kind() {
                NodeKind::Visual {
                    source: VisualSource::Texture(texture),
                    ..
                } => format!("texture {}", texture.0),
                NodeKind::Visual {
                    source: VisualSource::Color(color),
                    ..
                } => format!("color {color:?}"),
                NodeKind::AttachPoint => "attach".to_string(),
            };
            let parent = match node.parent() {
                NodeParent::Hitbox(index) => format!("hitbox {index}"),
                NodeParent::Node(parent) => format!("{parent:?}"),
            };
            let _ = writeln!(
                out,
                "{id:?} z={} {kind} parent={parent} tags={:?}",
                node.z_index(),
                node.tags()
            );
        }
        Ok(out)
    }

    /// Print manager summary to console
    pub fn print_summary<E: EffectSink, A: AssetResolver>(manager: &EntityManager<E, A>) {
        println!("=== Mirror Summary ===");
        println!("Entities: {}", Self::entity_count(manager));
        println!(
            "Pool: {}/{} node slots free",
            manager.buffers().pool().free_slots(),
            manager.buffers().pool().capacity()
        );
        println!("Dirty buffers: {}", manager.buffers().dirty_count());

        println!("\n=== Entities ===");
        for entity in manager.entities() {
            if let Ok(info) = Self::entity_info(manager, entity) {
                println!(
                    "Entity {}: {} components, {}/{} visual nodes{}",
                    info.entity,
                    info.components.len(),
                    info.visual_count,
                    info.capacity,
                    if info.dirty { " (dirty)" } else { "" }
                );
            }
        }
    }
}

/// Entity information for debugging
#[derive(Clone, Debug)]
pub struct EntityInfo {
    pub entity: EntityHandle,
    /// One line per live component instance
    pub components: Vec<String>,
    /// Types named in the snapshot, live or not
    pub declared: usize,
    pub node_count: usize,
    pub visual_count: usize,
    pub capacity: usize,
    pub dirty: bool,
}

/// Composition diagnostics over recent frames
#[derive(Clone, Debug)]
pub struct Diagnostics {
    frames: VecDeque<FrameStats>,
    max_samples: usize,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self {
            frames: VecDeque::new(),
            max_samples: 60,
        }
    }

    pub fn record(&mut self, stats: FrameStats) {
        self.frames.push_back(stats);
        if self.frames.len() > self.max_samples {
            self.frames.pop_front();
        }
    }

    /// Average buffers recomposed per frame
    pub fn avg_composed(&self) -> f32 {
        if self.frames.is_empty() {
            return 0.0;
        }
        self.frames.iter().map(|f| f.composed).sum::<usize>() as f32 / self.frames.len() as f32
    }

    /// Share of buffers skipped as clean, over all sampled frames
    pub fn skip_ratio(&self) -> f32 {
        let skipped: usize = self.frames.iter().map(|f| f.skipped).sum();
        let total: usize = self.frames.iter().map(|f| f.skipped + f.composed).sum();
        if total == 0 {
            0.0
        } else {
            skipped as f32 / total as f32
        }
    }

    pub fn max_quads(&self) -> usize {
        self.frames.iter().map(|f| f.quads).max().unwrap_or(0)
    }

    /// Print diagnostics
    pub fn print(&self) {
        println!("=== Diagnostics ===");
        println!("Avg composed: {:.1}", self.avg_composed());
        println!("Skip ratio: {:.2}", self.skip_ratio());
        println!("Max quads: {}", self.max_quads());
    }
}

impl Default for Diagnostics {
    fn default() -> Self {
        Self::new()
    }
}
