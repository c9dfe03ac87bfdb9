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

//! Per-entity render buffer
//!
//! Owns the entity's node tree, its hitbox anchors and a fixed-capacity
//! vertex/index block. Capacity is counted in visual nodes and fixed at
//! creation; each visual node uses one quad (4 vertices, 6 indices).

use bytemuck::{Pod, Zeroable};
use glam::{Vec2, Vec3};
use rand::Rng;
use smallvec::{smallvec, SmallVec};

use crate::entity::{EntityHandle, NodeId};
use crate::error::{MirrorError, Result};
use crate::math::WorldTransform;
use crate::node_tree::NodeTree;
use crate::render_node::{NodeAttributes, NodeDesc, NodeKind, NodeParent, RenderNode, VisualSource};

pub const VERTICES_PER_NODE: usize = 4;
pub const INDICES_PER_NODE: usize = 6;

const QUAD_CORNERS: [[f32; 2]; 4] = [[-0.5, -0.5], [0.5, -0.5], [0.5, 0.5], [-0.5, 0.5]];
const QUAD_UVS: [[f32; 2]; 4] = [[0.0, 1.0], [1.0, 1.0], [1.0, 0.0], [0.0, 0.0]];
const QUAD_INDICES: [u32; 6] = [0, 1, 2, 2, 3, 0];

/// GPU vertex layout
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 2],
    pub uv: [f32; 2],
    /// Texture index, or packed 0xRRGGBB when `is_color` is 1
    pub source: u32,
    pub is_color: u32,
    pub tint: [f32; 3],
    pub opacity: f32,
}

/// Slice of the global vertex pool owned by one entity, in node slots.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NodeRange {
    pub start: usize,
    pub len: usize,
}

impl NodeRange {
    pub fn first_vertex(&self) -> usize {
        self.start * VERTICES_PER_NODE
    }

    pub fn first_index(&self) -> usize {
        self.start * INDICES_PER_NODE
    }
}

/// Per-entity render state
#[derive(Debug, Clone)]
pub struct RenderBuffer {
    entity: EntityHandle,
    range: NodeRange,
    tree: NodeTree,
    anchors: SmallVec<[WorldTransform; 1]>,
    vertices: Vec<Vertex>,
    indices: Vec<u32>,
    drawn: usize,
    nodes_changed: bool,
    position_changed: bool,
}

impl RenderBuffer {
    /// Create a buffer holding up to `range.len` visual nodes.
    ///
    /// Starts with a single hitbox anchor at the origin.
    pub fn new(entity: EntityHandle, range: NodeRange) -> Self {
        let capacity = range.len;
        Self {
            entity,
            range,
            tree: NodeTree::new(entity),
            anchors: smallvec![WorldTransform::identity()],
            vertices: vec![Vertex::default(); capacity * VERTICES_PER_NODE],
            indices: vec![0; capacity * INDICES_PER_NODE],
            drawn: 0,
            nodes_changed: false,
            position_changed: false,
        }
    }

    pub fn entity(&self) -> EntityHandle {
        self.entity
    }

    /// Capacity in visual nodes
    pub fn capacity(&self) -> usize {
        self.range.len
    }

    pub fn range(&self) -> NodeRange {
        self.range
    }

    pub fn tree(&self) -> &NodeTree {
        &self.tree
    }

    pub fn visual_count(&self) -> usize {
        self.tree.visual_count()
    }

    pub fn node(&self, id: NodeId) -> Result<&RenderNode> {
        self.tree.get(id)
    }

    pub fn nodes_changed(&self) -> bool {
        self.nodes_changed
    }

    pub fn position_changed(&self) -> bool {
        self.position_changed
    }

    pub fn is_dirty(&self) -> bool {
        self.nodes_changed || self.position_changed
    }

    pub fn mark_nodes_changed(&mut self) {
        self.nodes_changed = true;
    }

    /// Attach a node. Fails once the declared visual capacity is used up.
    pub fn attach(&mut self, desc: NodeDesc) -> Result<NodeId> {
        if desc.kind.is_visual() && self.tree.visual_count() >= self.capacity() {
            return Err(MirrorError::CapacityExceeded {
                entity: self.entity,
                capacity: self.capacity(),
            });
        }
        if let NodeParent::Hitbox(index) = desc.parent {
            if index >= self.anchors.len() {
                return Err(MirrorError::InvalidParent(format!(
                    "hitbox {index} out of range ({} anchors) on entity {}",
                    self.anchors.len(),
                    self.entity
                )));
            }
        }
        let id = self.tree.insert(desc)?;
        self.nodes_changed = true;
        Ok(id)
    }

    /// Detach a node and its descendants, freeing their slots.
    pub fn detach(&mut self, id: NodeId) -> Result<usize> {
        let removed = self.tree.remove(id)?;
        self.nodes_changed = true;
        Ok(removed.len())
    }

    /// Detach every node.
    pub fn clear(&mut self) {
        if !self.tree.is_empty() {
            self.tree.clear();
            self.nodes_changed = true;
        }
    }

    /// Mutable access to a node's paint and transform attributes.
    pub fn edit(&mut self, id: NodeId) -> Result<&mut NodeAttributes> {
        let node = self.tree.get_mut(id)?;
        self.nodes_changed = true;
        Ok(&mut node.attributes)
    }

    /// Swap the texture or color a visual node paints.
    pub fn set_visual(&mut self, id: NodeId, source: VisualSource) -> Result<()> {
        let node = self.tree.get_mut(id)?;
        match &mut node.kind {
            NodeKind::Visual { source: current, .. } => *current = source,
            NodeKind::AttachPoint => return Err(MirrorError::NotVisual(id)),
        }
        self.nodes_changed = true;
        Ok(())
    }

    pub fn set_size(&mut self, id: NodeId, size: Vec2) -> Result<()> {
        let node = self.tree.get_mut(id)?;
        match &mut node.kind {
            NodeKind::Visual { size: current, .. } => *current = size,
            NodeKind::AttachPoint => return Err(MirrorError::NotVisual(id)),
        }
        self.nodes_changed = true;
        Ok(())
    }

    pub fn set_z_index(&mut self, id: NodeId, z_index: f32) -> Result<()> {
        self.tree.set_z_index(id, z_index)?;
        self.nodes_changed = true;
        Ok(())
    }

    pub fn find_by_tag(&self, tag: &str) -> Result<NodeId> {
        self.tree.find_by_tag(tag)
    }

    pub fn find_all_by_tag(&self, tag: &str, expected: Option<usize>) -> Result<Vec<NodeId>> {
        self.tree.find_all_by_tag(tag, expected)
    }

    /// Register another hitbox anchor and return its index.
    pub fn add_anchor(&mut self, position: Vec2, rotation: f32) -> usize {
        self.anchors.push(WorldTransform::anchor(position, rotation));
        self.position_changed = true;
        self.anchors.len() - 1
    }

    /// Physics moved a hitbox.
    pub fn set_anchor(&mut self, index: usize, position: Vec2, rotation: f32) -> Result<()> {
        let entity = self.entity;
        let count = self.anchors.len();
        let anchor = self.anchors.get_mut(index).ok_or_else(|| {
            MirrorError::InvalidParent(format!(
                "hitbox {index} out of range ({count} anchors) on entity {entity}"
            ))
        })?;
        let moved = WorldTransform::anchor(position, rotation);
        if *anchor != moved {
            *anchor = moved;
            self.position_changed = true;
        }
        Ok(())
    }

    pub fn anchor(&self, index: usize) -> Option<WorldTransform> {
        self.anchors.get(index).copied()
    }

    /// Recompose world transforms and rewrite vertex data, then clear both
    /// dirty flags. Returns the number of quads written.
    pub fn compose<R: Rng + ?Sized>(&mut self, rng: &mut R) -> usize {
        self.tree.compose(&self.anchors);

        let first_vertex = self.range.first_vertex() as u32;
        let mut slot = 0;
        for (_, node) in self.tree.iter_z() {
            let NodeKind::Visual { source, size } = node.kind else {
                continue;
            };
            let attrs = &node.attributes;
            let jitter = if attrs.shake > 0.0 {
                Vec2::new(
                    rng.gen_range(-attrs.shake..=attrs.shake),
                    rng.gen_range(-attrs.shake..=attrs.shake),
                )
            } else {
                Vec2::ZERO
            };
            let (source, is_color) = source.encode();
            let tint = attrs.tint.clamp(Vec3::ZERO, Vec3::ONE).to_array();
            let opacity = attrs.opacity.clamp(0.0, 1.0);

            let base = slot * VERTICES_PER_NODE;
            for corner in 0..VERTICES_PER_NODE {
                let local = Vec2::from(QUAD_CORNERS[corner]) * size;
                self.vertices[base + corner] = Vertex {
                    position: (node.world.apply(local) + jitter).to_array(),
                    uv: QUAD_UVS[corner],
                    source,
                    is_color,
                    tint,
                    opacity,
                };
            }
            let index_base = slot * INDICES_PER_NODE;
            for (i, offset) in QUAD_INDICES.iter().enumerate() {
                self.indices[index_base + i] = first_vertex + (base as u32) + offset;
            }
            slot += 1;
        }

        // Zero the quads that fell out of use so stale geometry is degenerate.
        for stale in slot..self.drawn {
            let base = stale * VERTICES_PER_NODE;
            self.vertices[base..base + VERTICES_PER_NODE].fill(Vertex::default());
            let index_base = stale * INDICES_PER_NODE;
            self.indices[index_base..index_base + INDICES_PER_NODE].fill(first_vertex);
        }

        self.drawn = slot;
        self.nodes_changed = false;
        self.position_changed = false;
        slot
    }

    /// Quads written by the last composition
    pub fn drawn(&self) -> usize {
        self.drawn
    }

    /// Vertex data for the quads in use
    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices[..self.drawn * VERTICES_PER_NODE]
    }

    /// Index data for the quads in use, already offset into the global pool
    pub fn indices(&self) -> &[u32] {
        &self.indices[..self.drawn * INDICES_PER_NODE]
    }

    /// Whole block including unused tail, for re-uploads after shrinking
    pub(crate) fn full_block(&self) -> (&[Vertex], &[u32]) {
        (&self.vertices, &self.indices)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render_node::TextureRef;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    fn buffer(capacity: usize) -> RenderBuffer {
        RenderBuffer::new(
            EntityHandle(9),
            NodeRange {
                start: 2,
                len: capacity,
            },
        )
    }

    fn quad() -> NodeDesc {
        NodeDesc::visual(VisualSource::Texture(TextureRef(3)), Vec2::new(2.0, 2.0))
    }

    #[test]
    fn test_capacity_enforced_for_visuals_only() {
        let mut buf = buffer(1);
        buf.attach(quad()).unwrap();
        buf.attach(NodeDesc::attach_point()).unwrap();
        let err = buf.attach(quad()).unwrap_err();
        assert_eq!(
            err,
            MirrorError::CapacityExceeded {
                entity: EntityHandle(9),
                capacity: 1
            }
        );
        assert_eq!(buf.visual_count(), 1);
    }

    #[test]
    fn test_zero_capacity_buffer() {
        let mut buf = buffer(0);
        assert!(buf.attach(quad()).is_err());
        assert!(buf.vertices().is_empty());
    }

    #[test]
    fn test_detach_frees_capacity() {
        let mut buf = buffer(1);
        let id = buf.attach(quad()).unwrap();
        buf.detach(id).unwrap();
        assert!(buf.attach(quad()).is_ok());
    }

    #[test]
    fn test_edit_sets_dirty_and_compose_clears() {
        let mut rng = SmallRng::seed_from_u64(1);
        let mut buf = buffer(2);
        let id = buf.attach(quad()).unwrap();
        assert!(buf.nodes_changed());

        buf.compose(&mut rng);
        assert!(!buf.is_dirty());

        buf.edit(id).unwrap().tint = Vec3::new(1.0, 0.0, 0.0);
        assert!(buf.nodes_changed());
        buf.compose(&mut rng);
        assert!(!buf.nodes_changed());
        assert_eq!(buf.vertices()[0].tint, [1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_anchor_move_sets_position_changed() {
        let mut rng = SmallRng::seed_from_u64(1);
        let mut buf = buffer(1);
        buf.attach(quad()).unwrap();
        buf.compose(&mut rng);

        buf.set_anchor(0, Vec2::new(10.0, 0.0), 0.0).unwrap();
        assert!(buf.position_changed());
        assert!(!buf.nodes_changed());

        buf.compose(&mut rng);
        // Quad of size 2 centered on (10, 0)
        assert_eq!(buf.vertices()[0].position, [9.0, -1.0]);
        assert_eq!(buf.vertices()[2].position, [11.0, 1.0]);

        // Same position again is not a change
        buf.set_anchor(0, Vec2::new(10.0, 0.0), 0.0).unwrap();
        assert!(!buf.is_dirty());
        assert!(buf.set_anchor(4, Vec2::ZERO, 0.0).is_err());
    }

    #[test]
    fn test_indices_offset_into_pool() {
        let mut rng = SmallRng::seed_from_u64(1);
        let mut buf = buffer(2);
        buf.attach(quad()).unwrap();
        buf.attach(quad().z_index(1.0)).unwrap();
        assert_eq!(buf.compose(&mut rng), 2);

        // range.start = 2 → first vertex 8
        assert_eq!(&buf.indices()[..6], &[8, 9, 10, 10, 11, 8]);
        assert_eq!(&buf.indices()[6..], &[12, 13, 14, 14, 15, 12]);
    }

    #[test]
    fn test_paint_order_follows_z() {
        let mut rng = SmallRng::seed_from_u64(1);
        let mut buf = buffer(2);
        let top = buf
            .attach(NodeDesc::visual(VisualSource::Color(Vec3::X), Vec2::ONE).z_index(5.0))
            .unwrap();
        buf.attach(quad()).unwrap();
        buf.compose(&mut rng);
        assert_eq!(buf.vertices()[0].is_color, 0);
        assert_eq!(buf.vertices()[4].is_color, 1);

        buf.set_z_index(top, -1.0).unwrap();
        buf.compose(&mut rng);
        assert_eq!(buf.vertices()[0].is_color, 1);
    }

    #[test]
    fn test_shrinking_zeroes_stale_quads() {
        let mut rng = SmallRng::seed_from_u64(1);
        let mut buf = buffer(2);
        let a = buf.attach(quad()).unwrap();
        buf.attach(quad()).unwrap();
        buf.compose(&mut rng);
        buf.detach(a).unwrap();
        assert_eq!(buf.compose(&mut rng), 1);
        let (vertices, _) = buf.full_block();
        assert_eq!(vertices[4], Vertex::default());
    }

    #[test]
    fn test_shake_stays_within_magnitude() {
        let mut rng = SmallRng::seed_from_u64(7);
        let mut buf = buffer(1);
        let id = buf.attach(quad()).unwrap();
        buf.edit(id).unwrap().shake = 0.5;
        buf.compose(&mut rng);
        let p = buf.vertices()[0].position;
        assert!((p[0] + 1.0).abs() <= 0.5 && (p[1] + 1.0).abs() <= 0.5);
    }

    #[test]
    fn test_set_visual_on_attach_point_fails() {
        let mut buf = buffer(1);
        let pivot = buf.attach(NodeDesc::attach_point()).unwrap();
        assert!(buf
            .set_visual(pivot, VisualSource::Texture(TextureRef(1)))
            .is_err());
    }
}
