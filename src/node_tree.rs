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

//! Per-entity render node tree
//!
//! Nodes are kept in two views that must agree:
//! - `z_order`: every node, ascending z-index, stable for equal z
//! - the parent/child tree, walked from hitbox anchors for composition

use slotmap::SlotMap;
use smallvec::SmallVec;

use crate::entity::{EntityHandle, NodeId};
use crate::error::{MirrorError, Result};
use crate::math::WorldTransform;
use crate::render_node::{NodeDesc, NodeParent, RenderNode};

/// Render nodes of one entity
#[derive(Debug, Clone)]
pub struct NodeTree {
    entity: EntityHandle,
    nodes: SlotMap<NodeId, RenderNode>,
    z_order: Vec<NodeId>,
    visual_count: usize,
}

impl NodeTree {
    pub fn new(entity: EntityHandle) -> Self {
        Self {
            entity,
            nodes: SlotMap::with_key(),
            z_order: Vec::new(),
            visual_count: 0,
        }
    }

    pub fn entity(&self) -> EntityHandle {
        self.entity
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Number of visual (painted) nodes
    pub fn visual_count(&self) -> usize {
        self.visual_count
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn get(&self, id: NodeId) -> Result<&RenderNode> {
        self.nodes.get(id).ok_or(MirrorError::NodeNotFound(id))
    }

    pub(crate) fn get_mut(&mut self, id: NodeId) -> Result<&mut RenderNode> {
        self.nodes.get_mut(id).ok_or(MirrorError::NodeNotFound(id))
    }

    /// Node ids in paint order
    pub fn z_order(&self) -> &[NodeId] {
        &self.z_order
    }

    /// Nodes in paint order
    pub fn iter_z(&self) -> impl Iterator<Item = (NodeId, &RenderNode)> + '_ {
        self.z_order.iter().map(move |&id| (id, &self.nodes[id]))
    }

    /// Insert a node. The caller has already validated capacity and anchors.
    pub(crate) fn insert(&mut self, desc: NodeDesc) -> Result<NodeId> {
        check_z(desc.z_index)?;
        if let NodeParent::Node(parent) = desc.parent {
            if !self.nodes.contains_key(parent) {
                return Err(MirrorError::InvalidParent(format!(
                    "parent node {parent:?} is not attached to entity {}",
                    self.entity
                )));
            }
        }

        let node = RenderNode::from_desc(desc);
        let is_visual = node.kind.is_visual();
        let parent = node.parent;
        let z_index = node.z_index;
        let id = self.nodes.insert(node);

        self.insert_z(id, z_index);
        if let NodeParent::Node(parent) = parent {
            self.nodes[parent].children.push(id);
        }
        if is_visual {
            self.visual_count += 1;
        }
        Ok(id)
    }

    /// Stable insertion: before the first node with a strictly greater z.
    fn insert_z(&mut self, id: NodeId, z_index: f32) {
        let nodes = &self.nodes;
        let position = self
            .z_order
            .iter()
            .position(|other| nodes[*other].z_index > z_index)
            .unwrap_or(self.z_order.len());
        self.z_order.insert(position, id);
    }

    /// Remove a node together with its descendants.
    ///
    /// Returns the removed ids, the requested node first.
    pub(crate) fn remove(&mut self, id: NodeId) -> Result<SmallVec<[NodeId; 8]>> {
        let parent = self.get(id)?.parent;
        if let NodeParent::Node(parent) = parent {
            if let Some(parent) = self.nodes.get_mut(parent) {
                parent.children.retain(|child| *child != id);
            }
        }

        let mut removed = SmallVec::<[NodeId; 8]>::new();
        let mut stack: SmallVec<[NodeId; 8]> = SmallVec::new();
        stack.push(id);
        while let Some(current) = stack.pop() {
            if let Some(node) = self.nodes.remove(current) {
                if node.kind.is_visual() {
                    self.visual_count -= 1;
                }
                stack.extend(node.children.iter().copied());
                removed.push(current);
            }
        }

        self.z_order.retain(|other| !removed.contains(other));
        Ok(removed)
    }

    /// Move a node to a new z-index, keeping the list sorted.
    pub(crate) fn set_z_index(&mut self, id: NodeId, z_index: f32) -> Result<()> {
        check_z(z_index)?;
        self.get_mut(id)?.z_index = z_index;
        self.z_order.retain(|other| *other != id);
        self.insert_z(id, z_index);
        Ok(())
    }

    pub(crate) fn clear(&mut self) {
        self.nodes.clear();
        self.z_order.clear();
        self.visual_count = 0;
    }

    /// First node (in paint order) carrying `tag`.
    pub fn find_by_tag(&self, tag: &str) -> Result<NodeId> {
        self.iter_z()
            .find(|(_, node)| node.has_tag(tag))
            .map(|(id, _)| id)
            .ok_or_else(|| MirrorError::TagNotFound {
                entity: self.entity,
                tag: tag.to_string(),
            })
    }

    /// All nodes carrying `tag`, in paint order.
    ///
    /// With `expected` set, a different match count is a contract violation.
    pub fn find_all_by_tag(&self, tag: &str, expected: Option<usize>) -> Result<Vec<NodeId>> {
        let found: Vec<NodeId> = self
            .iter_z()
            .filter(|(_, node)| node.has_tag(tag))
            .map(|(id, _)| id)
            .collect();

        match expected {
            Some(expected) if expected != found.len() => Err(MirrorError::TagCountMismatch {
                entity: self.entity,
                tag: tag.to_string(),
                expected,
                found: found.len(),
            }),
            _ => Ok(found),
        }
    }

    /// Recompute every node's world transform from the given anchors.
    ///
    /// Nodes rooted at a missing anchor are composed from identity.
    pub(crate) fn compose(&mut self, anchors: &[WorldTransform]) {
        let mut stack: Vec<(NodeId, WorldTransform)> = Vec::with_capacity(self.nodes.len());

        for &id in &self.z_order {
            if let NodeParent::Hitbox(index) = self.nodes[id].parent {
                let anchor = anchors.get(index).copied().unwrap_or_default();
                stack.push((id, anchor));
            }
        }

        while let Some((id, parent_world)) = stack.pop() {
            let node = &mut self.nodes[id];
            node.world = WorldTransform::from_local(&parent_world, &node.attributes.transform);
            let world = node.world;
            for &child in &node.children {
                stack.push((child, world));
            }
        }
    }
}

/// NaN has no place in the sorted list.
fn check_z(z_index: f32) -> Result<()> {
    if z_index.is_finite() {
        Ok(())
    } else {
        Err(MirrorError::InvalidNumber {
            what: "z-index",
            value: f64::from(z_index),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render_node::{NodeDesc, VisualSource};
    use glam::{Vec2, Vec3};

    fn quad(z: f32) -> NodeDesc {
        NodeDesc::visual(VisualSource::Color(Vec3::ONE), Vec2::ONE).z_index(z)
    }

    fn z_values(tree: &NodeTree) -> Vec<f32> {
        tree.iter_z().map(|(_, node)| node.z_index()).collect()
    }

    #[test]
    fn test_equal_z_appends_after_existing() {
        let mut tree = NodeTree::new(EntityHandle(1));
        let a = tree.insert(quad(1.0)).unwrap();
        let b = tree.insert(quad(0.0)).unwrap();
        let c = tree.insert(quad(1.0)).unwrap();
        let d = tree.insert(quad(0.5)).unwrap();

        assert_eq!(tree.z_order(), &[b, d, a, c]);
        assert_eq!(z_values(&tree), vec![0.0, 0.5, 1.0, 1.0]);
    }

    #[test]
    fn test_non_finite_z_rejected() {
        let mut tree = NodeTree::new(EntityHandle(1));
        let a = tree.insert(quad(1.0)).unwrap();
        assert!(matches!(
            tree.insert(quad(f32::NAN)),
            Err(MirrorError::InvalidNumber { what: "z-index", .. })
        ));
        assert!(tree.set_z_index(a, f32::INFINITY).is_err());
        assert_eq!(tree.len(), 1);
        assert_eq!(tree.get(a).unwrap().z_index(), 1.0);
    }

    #[test]
    fn test_remove_takes_descendants() {
        let mut tree = NodeTree::new(EntityHandle(1));
        let pivot = tree.insert(NodeDesc::attach_point()).unwrap();
        let arm = tree
            .insert(quad(2.0).parent(NodeParent::Node(pivot)))
            .unwrap();
        let other = tree.insert(quad(1.0)).unwrap();
        assert_eq!(tree.visual_count(), 2);
        assert_eq!(tree.get(pivot).unwrap().children(), &[arm]);

        let removed = tree.remove(pivot).unwrap();
        assert_eq!(removed.as_slice(), &[pivot, arm]);
        assert_eq!(tree.z_order(), &[other]);
        assert_eq!(tree.visual_count(), 1);
        assert!(!tree.contains(arm));
    }

    #[test]
    fn test_child_removed_from_parent_list() {
        let mut tree = NodeTree::new(EntityHandle(1));
        let pivot = tree.insert(NodeDesc::attach_point()).unwrap();
        let arm = tree
            .insert(quad(0.0).parent(NodeParent::Node(pivot)))
            .unwrap();
        tree.remove(arm).unwrap();
        assert!(tree.get(pivot).unwrap().children().is_empty());
    }

    #[test]
    fn test_unknown_parent_rejected() {
        let mut tree = NodeTree::new(EntityHandle(1));
        let pivot = tree.insert(NodeDesc::attach_point()).unwrap();
        tree.remove(pivot).unwrap();
        let err = tree
            .insert(quad(0.0).parent(NodeParent::Node(pivot)))
            .unwrap_err();
        assert!(matches!(err, MirrorError::InvalidParent(_)));
        assert!(tree.is_empty());
    }

    #[test]
    fn test_set_z_index_resorts() {
        let mut tree = NodeTree::new(EntityHandle(1));
        let a = tree.insert(quad(0.0)).unwrap();
        let b = tree.insert(quad(1.0)).unwrap();
        tree.set_z_index(a, 5.0).unwrap();
        assert_eq!(tree.z_order(), &[b, a]);
    }

    #[test]
    fn test_tag_lookup() {
        let mut tree = NodeTree::new(EntityHandle(3));
        let first = tree.insert(quad(0.0).tag("pip")).unwrap();
        let second = tree.insert(quad(1.0).tag("pip")).unwrap();

        assert_eq!(tree.find_by_tag("pip").unwrap(), first);
        assert_eq!(
            tree.find_all_by_tag("pip", Some(2)).unwrap(),
            vec![first, second]
        );
        assert!(matches!(
            tree.find_all_by_tag("pip", Some(3)),
            Err(MirrorError::TagCountMismatch {
                expected: 3,
                found: 2,
                ..
            })
        ));
        assert!(tree.find_all_by_tag("barrel", None).unwrap().is_empty());
        assert!(matches!(
            tree.find_by_tag("barrel"),
            Err(MirrorError::TagNotFound { .. })
        ));
    }

    #[test]
    fn test_compose_walks_parent_to_child() {
        let mut tree = NodeTree::new(EntityHandle(1));
        let pivot = tree
            .insert(NodeDesc::attach_point().offset(Vec2::new(10.0, 0.0)))
            .unwrap();
        let arm = tree
            .insert(
                quad(0.0)
                    .parent(NodeParent::Node(pivot))
                    .offset(Vec2::new(5.0, 0.0)),
            )
            .unwrap();

        tree.compose(&[WorldTransform::anchor(Vec2::new(1.0, 1.0), 0.0)]);
        let world = tree.get(arm).unwrap().world_transform();
        assert!((world.position - Vec2::new(16.0, 1.0)).length() < 1e-5);
    }
}
